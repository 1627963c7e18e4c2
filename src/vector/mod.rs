//! The deserialized vector family.
//!
//! A wire vector is a `u32` element count followed by `count` element slots,
//! each [`Element::inline_size`] bytes wide. Scalars and structs live directly
//! in their slot; strings, tables, and nested vectors occupy a 4-byte
//! relative offset resolved from the slot's own position.
//!
//! Six materialization strategies share one logical contract
//! ([`VectorStrategy`]: `count`, `get`, `set`) and differ only in when and
//! how much is materialized, and in mutability:
//!
//! | Strategy | Materialization | Mutability |
//! |---|---|---|
//! | [`LazyVector`] | re-parses on every `get` | write-through when permitted |
//! | [`CachedVector`] | parses on first `get`, caches | none |
//! | [`CachedVectorMut`] | parses on first `get`, caches | in-memory `set` |
//! | [`ProgressiveVector`] | parses 32-element chunks on first touch | write-through when permitted |
//! | [`GreedyVector`] | parses everything at construction | none |
//! | [`GreedyVectorMut`] | parses everything at construction | full (`set`/`push`/`insert`/`remove`/`clear`) |
//!
//! Strategy choice never changes observed `get` semantics, only performance,
//! memory footprint, and mutability.

mod cache;
mod greedy;
mod lazy;
mod progressive;

pub use cache::{CachedVector, CachedVectorMut};
pub use greedy::{GreedyVector, GreedyVectorMut};
pub use lazy::LazyVector;
pub use progressive::{CHUNK_LEN, ProgressiveVector};

use std::borrow::Cow;

use crate::buffer::{Buffer, Scalar};
use crate::context::{FieldContext, ReadContext, SharedFieldContext};
use crate::error::{Error, Result};
use crate::layout::{SIZE_LENGTH_PREFIX, SIZE_UOFFSET};
use crate::structs::{StructLayout, StructView};

/// One element type of a deserialized vector.
///
/// `read_at` receives the absolute position of the element's slot. Inline
/// types (scalars, structs) decode directly from the slot; indirected types
/// (strings, tables, nested vectors) first resolve the slot's relative
/// offset. Types that descend into nested tables or vectors must spend one
/// unit of the context's depth budget before doing so.
pub trait Element<'a>: Sized {
    /// Stride of one element slot, in bytes.
    fn inline_size() -> usize;

    /// Decode the element whose slot starts at `slot`.
    fn read_at(buf: Buffer<'a>, slot: usize, ctx: &ReadContext) -> Result<Self>;

    /// Write the element directly over its existing slot bytes.
    ///
    /// Only meaningful for fixed-inline-size types; the default rejects the
    /// write, and indirected types keep it.
    fn write_at(&self, buf: Buffer<'a>, slot: usize) -> Result<()> {
        let _ = (buf, slot);
        Err(Error::NotMutable(
            "element type does not support write-through",
        ))
    }
}

macro_rules! impl_scalar_element {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl<'a> Element<'a> for $ty {
                #[inline]
                fn inline_size() -> usize {
                    <$ty as Scalar>::SIZE
                }

                #[inline]
                fn read_at(buf: Buffer<'a>, slot: usize, _ctx: &ReadContext) -> Result<Self> {
                    buf.read(slot)
                }

                #[inline]
                fn write_at(&self, buf: Buffer<'a>, slot: usize) -> Result<()> {
                    buf.write(slot, *self)
                }
            }
        )+
    };
}

impl_scalar_element!(bool, u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// Zero-copy string element: borrows from a read-only buffer, copies out of
/// a mutable one.
impl<'a> Element<'a> for Cow<'a, str> {
    #[inline]
    fn inline_size() -> usize {
        SIZE_UOFFSET
    }

    fn read_at(buf: Buffer<'a>, slot: usize, _ctx: &ReadContext) -> Result<Self> {
        let abs = buf.read_uoffset(slot)?;
        buf.read_str(abs)
    }
}

/// Owned string element; safe to keep after the buffer is discarded, which
/// is what the greedy strategies need.
impl<'a> Element<'a> for String {
    #[inline]
    fn inline_size() -> usize {
        SIZE_UOFFSET
    }

    fn read_at(buf: Buffer<'a>, slot: usize, _ctx: &ReadContext) -> Result<Self> {
        let abs = buf.read_uoffset(slot)?;
        Ok(buf.read_str(abs)?.into_owned())
    }
}

/// A struct type decodable from (and optionally encodable into) its fixed
/// inline layout. Generated code implements this once per schema struct.
pub trait StructDecode: Sized {
    /// The fixed, padding-aware layout of this struct type.
    fn layout() -> &'static StructLayout;

    /// Decode an owned value from a positioned view.
    fn decode(view: &StructView<'_, '_>) -> Result<Self>;

    /// Write the value back over the view's bytes (write-through).
    fn encode(&self, view: &StructView<'_, '_>) -> Result<()> {
        let _ = view;
        Err(Error::NotMutable("struct type does not support write-through"))
    }
}

/// Adapter making any [`StructDecode`] type usable as a vector element.
///
/// Struct elements are inline at their full padded size, so write-through
/// `set` works on them when the field permits it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Inline<S>(pub S);

impl<'a, S: StructDecode> Element<'a> for Inline<S> {
    #[inline]
    fn inline_size() -> usize {
        S::layout().size()
    }

    fn read_at(buf: Buffer<'a>, slot: usize, _ctx: &ReadContext) -> Result<Self> {
        let view = StructView::new(buf, slot, S::layout())?;
        S::decode(&view).map(Inline)
    }

    fn write_at(&self, buf: Buffer<'a>, slot: usize) -> Result<()> {
        let view = StructView::new(buf, slot, S::layout())?;
        self.0.encode(&view)
    }
}

/// Nested vectors materialize lazily when used as elements; each descent
/// spends one unit of depth budget.
impl<'a, T: Element<'a>> Element<'a> for LazyVector<'a, T> {
    #[inline]
    fn inline_size() -> usize {
        SIZE_UOFFSET
    }

    fn read_at(buf: Buffer<'a>, slot: usize, ctx: &ReadContext) -> Result<Self> {
        let child = ctx.descend()?;
        let abs = buf.read_uoffset(slot)?;
        LazyVector::new(buf, abs, child, FieldContext::read_only())
    }
}

/// Greedily materialized nested vector element.
impl<'a, T: Element<'a>> Element<'a> for GreedyVector<T> {
    #[inline]
    fn inline_size() -> usize {
        SIZE_UOFFSET
    }

    fn read_at(buf: Buffer<'a>, slot: usize, ctx: &ReadContext) -> Result<Self> {
        let child = ctx.descend()?;
        let abs = buf.read_uoffset(slot)?;
        GreedyVector::new(buf, abs, child, FieldContext::read_only())
    }
}

/// Read a vector's length prefix at `pos` and validate the whole element
/// region against the buffer before trusting the count.
///
/// Returns `(count, base)` where `base` is the absolute position of slot 0.
pub(crate) fn read_vector_header(buf: Buffer<'_>, pos: usize, stride: usize) -> Result<(usize, usize)> {
    let count = buf.read_u32(pos)? as usize;
    let base = pos + SIZE_LENGTH_PREFIX;
    let total = count.checked_mul(stride).ok_or_else(|| {
        Error::InvalidData(format!(
            "vector length {count} with stride {stride} overflows"
        ))
    })?;
    buf.check(base, total)?;
    Ok((count, base))
}

/// Reject `index >= count` before any parse or mutation is attempted.
#[inline]
pub(crate) fn check_index(index: usize, count: usize) -> Result<()> {
    if index >= count {
        return Err(Error::IndexOutOfRange { index, count });
    }
    Ok(())
}

/// The chosen materialization strategy for a given parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Re-parse on every access; zero extra memory.
    Lazy,
    /// Materialize fixed-size chunks on first touch.
    Progressive,
    /// Parse on first access, cache, immutable.
    Cached,
    /// Parse on first access, cache, in-memory `set` permitted.
    CachedMutable,
    /// Parse everything at construction, immutable.
    Greedy,
    /// Parse everything at construction, fully mutable and pool-eligible.
    GreedyMutable,
}

/// The contract all six strategies share.
pub trait VectorStrategy<'a, T: Element<'a>> {
    /// Number of elements, fixed at construction for read-oriented
    /// strategies.
    fn count(&self) -> usize;

    /// The element at `index`. Out-of-range indices fail without touching
    /// the buffer.
    fn get(&self, index: usize) -> Result<T>;

    /// Replace the element at `index`.
    ///
    /// The default rejects mutation; strategies that support it override.
    fn set(&mut self, index: usize, value: T) -> Result<()> {
        let _ = (index, value);
        Err(Error::NotMutable("vector strategy is immutable"))
    }

    /// Which strategy this is.
    fn mode(&self) -> ReadMode;
}

/// A vector deserialized under any of the six strategies, unified for
/// mode-driven construction.
#[derive(Debug, Clone)]
pub enum VectorOf<'a, T: Element<'a>> {
    Lazy(LazyVector<'a, T>),
    Progressive(ProgressiveVector<'a, T>),
    Cached(CachedVector<'a, T>),
    CachedMutable(CachedVectorMut<'a, T>),
    Greedy(GreedyVector<T>),
    GreedyMutable(GreedyVectorMut<T>),
}

impl<'a, T: Element<'a> + Clone> VectorOf<'a, T> {
    /// Construct the strategy selected by `mode` from the vector whose
    /// length prefix starts at `pos`.
    pub fn deserialize(
        buf: Buffer<'a>,
        pos: usize,
        mode: ReadMode,
        ctx: ReadContext,
        field: SharedFieldContext,
    ) -> Result<Self> {
        Ok(match mode {
            ReadMode::Lazy => VectorOf::Lazy(LazyVector::new(buf, pos, ctx, field)?),
            ReadMode::Progressive => {
                VectorOf::Progressive(ProgressiveVector::new(buf, pos, ctx, field)?)
            },
            ReadMode::Cached => VectorOf::Cached(CachedVector::new(buf, pos, ctx, field)?),
            ReadMode::CachedMutable => {
                VectorOf::CachedMutable(CachedVectorMut::new(buf, pos, ctx, field)?)
            },
            ReadMode::Greedy => VectorOf::Greedy(GreedyVector::new(buf, pos, ctx, field)?),
            ReadMode::GreedyMutable => {
                VectorOf::GreedyMutable(GreedyVectorMut::from_buffer(buf, pos, ctx, field)?)
            },
        })
    }

    /// Number of elements.
    pub fn count(&self) -> usize {
        match self {
            VectorOf::Lazy(v) => v.count(),
            VectorOf::Progressive(v) => v.count(),
            VectorOf::Cached(v) => v.count(),
            VectorOf::CachedMutable(v) => v.count(),
            VectorOf::Greedy(v) => v.count(),
            VectorOf::GreedyMutable(v) => v.count(),
        }
    }

    /// The element at `index`, whichever strategy is live.
    pub fn get(&self, index: usize) -> Result<T> {
        match self {
            VectorOf::Lazy(v) => v.get(index),
            VectorOf::Progressive(v) => v.get(index),
            VectorOf::Cached(v) => v.get(index),
            VectorOf::CachedMutable(v) => v.get(index),
            VectorOf::Greedy(v) => v.get(index),
            VectorOf::GreedyMutable(v) => v.get(index),
        }
    }

    /// Replace the element at `index`, if the live strategy permits it.
    pub fn set(&mut self, index: usize, value: T) -> Result<()> {
        match self {
            VectorOf::Lazy(v) => v.set(index, value),
            VectorOf::Progressive(v) => v.set(index, value),
            VectorOf::Cached(v) => VectorStrategy::set(v, index, value),
            VectorOf::CachedMutable(v) => v.set(index, value),
            VectorOf::Greedy(v) => VectorStrategy::set(v, index, value),
            VectorOf::GreedyMutable(v) => v.set(index, value),
        }
    }

    /// Which strategy is live.
    pub fn mode(&self) -> ReadMode {
        match self {
            VectorOf::Lazy(_) => ReadMode::Lazy,
            VectorOf::Progressive(_) => ReadMode::Progressive,
            VectorOf::Cached(_) => ReadMode::Cached,
            VectorOf::CachedMutable(_) => ReadMode::CachedMutable,
            VectorOf::Greedy(_) => ReadMode::Greedy,
            VectorOf::GreedyMutable(_) => ReadMode::GreedyMutable,
        }
    }
}
