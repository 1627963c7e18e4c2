//! Caching vector strategies: parse each element once, on first access.
//!
//! Slots are `OnceCell`s, so concurrent first touches of the same index are
//! race-free: whichever initialization wins stores the value every racer
//! computed from the same bytes, and no reader can observe a half-written
//! slot. After the first touch, `get` is an O(1) clone out of the cache.

use std::marker::PhantomData;

use once_cell::sync::OnceCell;

use crate::buffer::Buffer;
use crate::context::{ReadContext, SharedFieldContext};
use crate::error::{Error, Result};
use crate::vector::{Element, ReadMode, VectorStrategy, check_index, read_vector_header};

/// Shared header facts plus one lazily-filled cache slot per element.
#[derive(Debug, Clone)]
struct CacheCore<'a, T: Element<'a>> {
    buf: Buffer<'a>,
    base: usize,
    ctx: ReadContext,
    field: SharedFieldContext,
    slots: Box<[OnceCell<T>]>,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T: Element<'a>> CacheCore<'a, T> {
    fn new(
        buf: Buffer<'a>,
        pos: usize,
        ctx: ReadContext,
        field: SharedFieldContext,
    ) -> Result<Self> {
        let (count, base) = read_vector_header(buf, pos, T::inline_size())?;
        let slots = (0..count).map(|_| OnceCell::new()).collect();
        Ok(Self {
            buf,
            base,
            ctx,
            field,
            slots,
            _marker: PhantomData,
        })
    }

    #[inline]
    fn count(&self) -> usize {
        self.slots.len()
    }

    fn get(&self, index: usize) -> Result<T>
    where
        T: Clone,
    {
        check_index(index, self.count())?;
        self.slots[index]
            .get_or_try_init(|| {
                T::read_at(self.buf, self.base + index * T::inline_size(), &self.ctx)
            })
            .cloned()
    }
}

/// A vector that parses each element on first `get` and answers later reads
/// from its cache. Not mutable: `set` always fails with
/// [`Error::NotMutable`].
///
/// # Examples
///
/// ```
/// use flatpeach::buffer::Buffer;
/// use flatpeach::context::{FieldContext, ReadContext};
/// use flatpeach::vector::CachedVector;
///
/// let mut data = Vec::new();
/// for v in [2u32, 5, 6] {
///     data.extend_from_slice(&v.to_le_bytes());
/// }
/// let vec: CachedVector<'_, u32> = CachedVector::new(
///     Buffer::from_slice(&data),
///     0,
///     ReadContext::new(),
///     FieldContext::read_only(),
/// )?;
/// assert_eq!(vec.get(0)?, 5);
/// assert_eq!(vec.get(0)?, 5); // served from the cache
/// # Ok::<(), flatpeach::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct CachedVector<'a, T: Element<'a>> {
    core: CacheCore<'a, T>,
}

impl<'a, T: Element<'a>> CachedVector<'a, T> {
    /// Construct from the vector whose length prefix starts at `pos`.
    pub fn new(
        buf: Buffer<'a>,
        pos: usize,
        ctx: ReadContext,
        field: SharedFieldContext,
    ) -> Result<Self> {
        Ok(Self {
            core: CacheCore::new(buf, pos, ctx, field)?,
        })
    }

    /// Number of elements.
    #[inline]
    pub fn count(&self) -> usize {
        self.core.count()
    }

    /// Whether the vector has no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.core.count() == 0
    }

    /// The field facts shared by every element of this vector.
    #[inline]
    pub fn field_context(&self) -> &SharedFieldContext {
        &self.core.field
    }

    /// The element at `index`, parsed at most once.
    pub fn get(&self, index: usize) -> Result<T>
    where
        T: Clone,
    {
        self.core.get(index)
    }
}

impl<'a, T: Element<'a> + Clone> VectorStrategy<'a, T> for CachedVector<'a, T> {
    fn count(&self) -> usize {
        self.core.count()
    }

    fn get(&self, index: usize) -> Result<T> {
        self.core.get(index)
    }

    // set: default NotMutable.

    fn mode(&self) -> ReadMode {
        ReadMode::Cached
    }
}

/// Same caching as [`CachedVector`], but element sets are permitted.
///
/// Sets replace the cached value in memory only; there is no write-through
/// to the backing buffer. Mutation requires `&mut self` and is therefore not
/// shareable across threads, which is intentional.
#[derive(Debug, Clone)]
pub struct CachedVectorMut<'a, T: Element<'a>> {
    core: CacheCore<'a, T>,
}

impl<'a, T: Element<'a>> CachedVectorMut<'a, T> {
    /// Construct from the vector whose length prefix starts at `pos`.
    pub fn new(
        buf: Buffer<'a>,
        pos: usize,
        ctx: ReadContext,
        field: SharedFieldContext,
    ) -> Result<Self> {
        Ok(Self {
            core: CacheCore::new(buf, pos, ctx, field)?,
        })
    }

    /// Number of elements.
    #[inline]
    pub fn count(&self) -> usize {
        self.core.count()
    }

    /// Whether the vector has no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.core.count() == 0
    }

    /// The field facts shared by every element of this vector.
    #[inline]
    pub fn field_context(&self) -> &SharedFieldContext {
        &self.core.field
    }

    /// The element at `index`, parsed at most once unless replaced.
    pub fn get(&self, index: usize) -> Result<T>
    where
        T: Clone,
    {
        self.core.get(index)
    }

    /// Replace the cached element at `index` in memory.
    pub fn set(&mut self, index: usize, value: T) -> Result<()> {
        check_index(index, self.core.count())?;
        self.core.slots[index] = OnceCell::with_value(value);
        Ok(())
    }
}

impl<'a, T: Element<'a> + Clone> VectorStrategy<'a, T> for CachedVectorMut<'a, T> {
    fn count(&self) -> usize {
        self.core.count()
    }

    fn get(&self, index: usize) -> Result<T> {
        self.core.get(index)
    }

    fn set(&mut self, index: usize, value: T) -> Result<()> {
        CachedVectorMut::set(self, index, value)
    }

    fn mode(&self) -> ReadMode {
        ReadMode::CachedMutable
    }
}
