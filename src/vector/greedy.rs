//! Greedy vector strategies: parse every element at construction.
//!
//! Both types copy all data out of the buffer up front and never read it
//! again, so with owned element types (`String`, scalars, decoded structs)
//! they remain valid after the buffer is discarded. [`GreedyVector`] is
//! immutable; [`GreedyVectorMut`] supports the full set of list mutations,
//! disconnected from the buffer (no write-through), and is pool-eligible.

use crate::buffer::Buffer;
use crate::context::{ReadContext, SharedFieldContext};
use crate::error::{Error, Result};
use crate::pool::{ObjectPool, PoolElement, Poolable};
use crate::vector::{Element, ReadMode, VectorStrategy, check_index, read_vector_header};

/// Parse all slots of a vector into an owned `Vec`, reusing `into`'s
/// capacity.
fn parse_all<'a, T: Element<'a>>(
    buf: Buffer<'a>,
    pos: usize,
    ctx: &ReadContext,
    into: &mut Vec<T>,
) -> Result<()> {
    let (count, base) = read_vector_header(buf, pos, T::inline_size())?;
    into.clear();
    into.reserve(count);
    for index in 0..count {
        into.push(T::read_at(buf, base + index * T::inline_size(), ctx)?);
    }
    Ok(())
}

/// A vector fully materialized at construction; immutable thereafter.
///
/// # Examples
///
/// ```
/// use flatpeach::buffer::Buffer;
/// use flatpeach::context::{FieldContext, ReadContext};
/// use flatpeach::vector::GreedyVector;
///
/// let mut data = Vec::new();
/// for v in [2u32, 5, 6] {
///     data.extend_from_slice(&v.to_le_bytes());
/// }
/// let vec: GreedyVector<u32> = GreedyVector::new(
///     Buffer::from_slice(&data),
///     0,
///     ReadContext::new(),
///     FieldContext::read_only(),
/// )?;
/// drop(data); // the vector no longer depends on the buffer
/// assert_eq!(vec.get(1)?, 6);
/// # Ok::<(), flatpeach::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct GreedyVector<T> {
    elems: Vec<T>,
}

impl<T> GreedyVector<T> {
    /// Parse the whole vector whose length prefix starts at `pos`.
    pub fn new<'a>(
        buf: Buffer<'a>,
        pos: usize,
        ctx: ReadContext,
        field: SharedFieldContext,
    ) -> Result<Self>
    where
        T: Element<'a>,
    {
        let _ = field; // greedy vectors never write through
        let mut elems = Vec::new();
        parse_all(buf, pos, &ctx, &mut elems)?;
        Ok(Self { elems })
    }

    /// Number of elements.
    #[inline]
    pub fn count(&self) -> usize {
        self.elems.len()
    }

    /// Whether the vector has no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    /// A borrowed view of the element at `index`.
    pub fn get_ref(&self, index: usize) -> Result<&T> {
        check_index(index, self.elems.len())?;
        Ok(&self.elems[index])
    }

    /// The element at `index`, by clone.
    pub fn get(&self, index: usize) -> Result<T>
    where
        T: Clone,
    {
        self.get_ref(index).cloned()
    }

    /// Iterate over the materialized elements.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.elems.iter()
    }

    /// The materialized elements as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.elems
    }
}

impl<'a, T: Element<'a> + Clone> VectorStrategy<'a, T> for GreedyVector<T> {
    fn count(&self) -> usize {
        self.elems.len()
    }

    fn get(&self, index: usize) -> Result<T> {
        GreedyVector::get(self, index)
    }

    // set: default NotMutable.

    fn mode(&self) -> ReadMode {
        ReadMode::Greedy
    }
}

/// A fully-materialized, fully-mutable vector, disconnected from the buffer.
///
/// `set`, [`push`](Self::push), [`insert`](Self::insert),
/// [`remove`](Self::remove), and [`clear`](Self::clear) all mutate the owned
/// element list only; nothing is ever written back to the wire bytes. The
/// count is therefore mutable, unlike every other strategy. Instances are
/// pool-eligible through [`ObjectPool`].
#[derive(Debug, Clone, PartialEq)]
pub struct GreedyVectorMut<T> {
    elems: Vec<T>,
}

// Manual impl: the derive would demand `T: Default`, which pooled handle
// elements do not provide.
impl<T> Default for GreedyVectorMut<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> GreedyVectorMut<T> {
    /// An empty vector, ready for [`refill`](Self::refill) or manual
    /// population.
    pub fn new() -> Self {
        Self { elems: Vec::new() }
    }

    /// Parse the whole vector whose length prefix starts at `pos`.
    pub fn from_buffer<'a>(
        buf: Buffer<'a>,
        pos: usize,
        ctx: ReadContext,
        field: SharedFieldContext,
    ) -> Result<Self>
    where
        T: Element<'a>,
    {
        let _ = field;
        let mut vec = Self::new();
        parse_all(buf, pos, &ctx, &mut vec.elems)?;
        Ok(vec)
    }

    /// Re-parse from a buffer in place, reusing the allocation. Intended for
    /// pooled instances being bound to new data.
    pub fn refill<'a>(&mut self, buf: Buffer<'a>, pos: usize, ctx: ReadContext) -> Result<()>
    where
        T: Element<'a>,
    {
        parse_all(buf, pos, &ctx, &mut self.elems)
    }

    /// Current number of elements.
    #[inline]
    pub fn count(&self) -> usize {
        self.elems.len()
    }

    /// Whether the vector has no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    /// A borrowed view of the element at `index`.
    pub fn get_ref(&self, index: usize) -> Result<&T> {
        check_index(index, self.elems.len())?;
        Ok(&self.elems[index])
    }

    /// The element at `index`, by clone.
    pub fn get(&self, index: usize) -> Result<T>
    where
        T: Clone,
    {
        self.get_ref(index).cloned()
    }

    /// Replace the element at `index`.
    pub fn set(&mut self, index: usize, value: T) -> Result<()> {
        check_index(index, self.elems.len())?;
        self.elems[index] = value;
        Ok(())
    }

    /// Append an element.
    pub fn push(&mut self, value: T) {
        self.elems.push(value);
    }

    /// Insert an element at `index`, shifting later elements right.
    /// `index == count` appends.
    pub fn insert(&mut self, index: usize, value: T) -> Result<()> {
        if index > self.elems.len() {
            return Err(Error::IndexOutOfRange {
                index,
                count: self.elems.len(),
            });
        }
        self.elems.insert(index, value);
        Ok(())
    }

    /// Remove and return the element at `index`, shifting later elements
    /// left.
    pub fn remove(&mut self, index: usize) -> Result<T> {
        check_index(index, self.elems.len())?;
        Ok(self.elems.remove(index))
    }

    /// Remove all elements, keeping the allocation.
    pub fn clear(&mut self) {
        self.elems.clear();
    }

    /// Iterate over the materialized elements.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.elems.iter()
    }

    /// The materialized elements as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.elems
    }
}

impl<'a, T: Element<'a> + Clone> VectorStrategy<'a, T> for GreedyVectorMut<T> {
    fn count(&self) -> usize {
        self.elems.len()
    }

    fn get(&self, index: usize) -> Result<T> {
        GreedyVectorMut::get(self, index)
    }

    fn set(&mut self, index: usize, value: T) -> Result<()> {
        GreedyVectorMut::set(self, index, value)
    }

    fn mode(&self) -> ReadMode {
        ReadMode::GreedyMutable
    }
}

impl<T: PoolElement> Poolable for GreedyVectorMut<T> {
    /// Recursively hand poolable children back, then empty the list. The
    /// allocation is kept for the next loan.
    fn reset(&mut self, pool: &ObjectPool) {
        for elem in self.elems.drain(..) {
            elem.release(pool);
        }
    }
}
