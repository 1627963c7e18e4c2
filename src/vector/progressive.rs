//! Progressive vector strategy: materialize in fixed-size chunks.
//!
//! The chunk table is allocated at construction (one pointer-sized cell per
//! chunk), but a chunk's elements are only parsed when an index inside it is
//! first touched, and then the whole chunk is filled eagerly. That bounds
//! peak memory for partially-accessed huge vectors while amortizing repeat
//! reads of nearby indices, sitting between [`LazyVector`]'s full re-parse
//! cost and [`GreedyVector`]'s full materialization.
//!
//! [`LazyVector`]: crate::vector::LazyVector
//! [`GreedyVector`]: crate::vector::GreedyVector

use once_cell::sync::OnceCell;

use crate::buffer::Buffer;
use crate::context::{ReadContext, SharedFieldContext};
use crate::error::{Error, Result};
use crate::vector::{Element, ReadMode, VectorStrategy, check_index, read_vector_header};

/// Number of elements materialized together on first touch.
pub const CHUNK_LEN: usize = 32;

/// A vector that parses 32-element chunks on first touch of any index in
/// them.
///
/// # Examples
///
/// ```
/// use flatpeach::buffer::Buffer;
/// use flatpeach::context::{FieldContext, ReadContext};
/// use flatpeach::vector::ProgressiveVector;
///
/// let mut data = (100u32).to_le_bytes().to_vec();
/// for v in 0..100u32 {
///     data.extend_from_slice(&v.to_le_bytes());
/// }
/// let vec: ProgressiveVector<'_, u32> = ProgressiveVector::new(
///     Buffer::from_slice(&data),
///     0,
///     ReadContext::new(),
///     FieldContext::read_only(),
/// )?;
/// // Touching index 40 materializes only the second chunk (32..64).
/// assert_eq!(vec.get(40)?, 40);
/// # Ok::<(), flatpeach::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct ProgressiveVector<'a, T: Element<'a>> {
    buf: Buffer<'a>,
    base: usize,
    count: usize,
    ctx: ReadContext,
    field: SharedFieldContext,
    chunks: Box<[OnceCell<Box<[T]>>]>,
}

impl<'a, T: Element<'a>> ProgressiveVector<'a, T> {
    /// Construct from the vector whose length prefix starts at `pos`.
    pub fn new(
        buf: Buffer<'a>,
        pos: usize,
        ctx: ReadContext,
        field: SharedFieldContext,
    ) -> Result<Self> {
        let (count, base) = read_vector_header(buf, pos, T::inline_size())?;
        let chunks = (0..count.div_ceil(CHUNK_LEN)).map(|_| OnceCell::new()).collect();
        Ok(Self {
            buf,
            base,
            count,
            ctx,
            field,
            chunks,
        })
    }

    /// Number of elements.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Whether the vector has no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The field facts shared by every element of this vector.
    #[inline]
    pub fn field_context(&self) -> &SharedFieldContext {
        &self.field
    }

    /// Number of chunks whose elements have been materialized so far.
    pub fn materialized_chunks(&self) -> usize {
        self.chunks.iter().filter(|c| c.get().is_some()).count()
    }

    #[inline]
    fn slot(&self, index: usize) -> usize {
        self.base + index * T::inline_size()
    }

    /// Parse every element of chunk `chunk` in one pass.
    fn fill_chunk(&self, chunk: usize) -> Result<Box<[T]>> {
        let start = chunk * CHUNK_LEN;
        let end = (start + CHUNK_LEN).min(self.count);
        let mut elems = Vec::with_capacity(end - start);
        for index in start..end {
            elems.push(T::read_at(self.buf, self.slot(index), &self.ctx)?);
        }
        Ok(elems.into_boxed_slice())
    }

    /// The element at `index`, materializing its chunk on first touch.
    pub fn get(&self, index: usize) -> Result<T>
    where
        T: Clone,
    {
        check_index(index, self.count)?;
        let chunk = index / CHUNK_LEN;
        let elems = self.chunks[chunk].get_or_try_init(|| self.fill_chunk(chunk))?;
        Ok(elems[index % CHUNK_LEN].clone())
    }

    /// Write `value` through to the backing buffer at `index`, keeping any
    /// materialized chunk in sync.
    ///
    /// Requires the field context to permit write-through; fails with
    /// [`Error::NotMutable`] otherwise.
    pub fn set(&mut self, index: usize, value: T) -> Result<()> {
        check_index(index, self.count)?;
        if !self.field.write_through_enabled() {
            return Err(Error::NotMutable("write-through disabled for this field"));
        }
        value.write_at(self.buf, self.slot(index))?;
        if let Some(elems) = self.chunks[index / CHUNK_LEN].get_mut() {
            elems[index % CHUNK_LEN] = value;
        }
        Ok(())
    }
}

impl<'a, T: Element<'a> + Clone> VectorStrategy<'a, T> for ProgressiveVector<'a, T> {
    fn count(&self) -> usize {
        self.count
    }

    fn get(&self, index: usize) -> Result<T> {
        ProgressiveVector::get(self, index)
    }

    fn set(&mut self, index: usize, value: T) -> Result<()> {
        ProgressiveVector::set(self, index, value)
    }

    fn mode(&self) -> ReadMode {
        ReadMode::Progressive
    }
}
