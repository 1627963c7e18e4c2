//! Lazy vector strategy: re-parse the element on every access.
//!
//! Holds nothing beyond the buffer reference and the header facts, so a lazy
//! vector costs no memory per element; repeated `get` of the same index pays
//! one parse each time. Built from a read-only buffer it is a pure function
//! of the bytes and may be shared across threads.

use std::marker::PhantomData;

use crate::buffer::Buffer;
use crate::context::{ReadContext, SharedFieldContext};
use crate::error::{Error, Result};
use crate::vector::{Element, ReadMode, VectorStrategy, check_index, read_vector_header};

/// A vector that decodes each element straight from the buffer on demand.
///
/// # Examples
///
/// ```
/// use flatpeach::buffer::Buffer;
/// use flatpeach::context::{FieldContext, ReadContext};
/// use flatpeach::vector::LazyVector;
///
/// // [count=2][5][6]
/// let mut data = Vec::new();
/// for v in [2u32, 5, 6] {
///     data.extend_from_slice(&v.to_le_bytes());
/// }
/// let vec: LazyVector<'_, u32> = LazyVector::new(
///     Buffer::from_slice(&data),
///     0,
///     ReadContext::new(),
///     FieldContext::read_only(),
/// )?;
/// assert_eq!(vec.count(), 2);
/// assert_eq!(vec.get(1)?, 6);
/// # Ok::<(), flatpeach::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct LazyVector<'a, T: Element<'a>> {
    buf: Buffer<'a>,
    base: usize,
    count: usize,
    ctx: ReadContext,
    field: SharedFieldContext,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T: Element<'a>> LazyVector<'a, T> {
    /// Construct from the vector whose length prefix starts at `pos`.
    pub fn new(
        buf: Buffer<'a>,
        pos: usize,
        ctx: ReadContext,
        field: SharedFieldContext,
    ) -> Result<Self> {
        let (count, base) = read_vector_header(buf, pos, T::inline_size())?;
        Ok(Self {
            buf,
            base,
            count,
            ctx,
            field,
            _marker: PhantomData,
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

    /// Absolute position of the slot for `index`.
    #[inline]
    fn slot(&self, index: usize) -> usize {
        self.base + index * T::inline_size()
    }

    /// Decode the element at `index` directly from the buffer.
    pub fn get(&self, index: usize) -> Result<T> {
        check_index(index, self.count)?;
        T::read_at(self.buf, self.slot(index), &self.ctx)
    }

    /// Write `value` through to the backing buffer at `index`.
    ///
    /// Requires the field context to permit write-through and the element
    /// type to be fixed-inline; otherwise fails with [`Error::NotMutable`]
    /// rather than silently mutating.
    pub fn set(&mut self, index: usize, value: T) -> Result<()> {
        check_index(index, self.count)?;
        if !self.field.write_through_enabled() {
            return Err(Error::NotMutable("write-through disabled for this field"));
        }
        value.write_at(self.buf, self.slot(index))
    }

    /// Iterate over all elements, decoding lazily.
    pub fn iter(&self) -> impl Iterator<Item = Result<T>> + '_ {
        (0..self.count).map(move |i| self.get(i))
    }
}

impl<'a, T: Element<'a>> VectorStrategy<'a, T> for LazyVector<'a, T> {
    fn count(&self) -> usize {
        self.count
    }

    fn get(&self, index: usize) -> Result<T> {
        LazyVector::get(self, index)
    }

    fn set(&mut self, index: usize, value: T) -> Result<()> {
        LazyVector::set(self, index, value)
    }

    fn mode(&self) -> ReadMode {
        ReadMode::Lazy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::FieldContext;

    fn bytes(values: &[u32]) -> Vec<u8> {
        let mut data = (values.len() as u32).to_le_bytes().to_vec();
        for v in values {
            data.extend_from_slice(&v.to_le_bytes());
        }
        data
    }

    #[test]
    fn test_get_reparses_every_time() {
        let mut data = bytes(&[10, 20]);
        let buf = Buffer::from_mut_slice(&mut data);
        let vec: LazyVector<'_, u32> =
            LazyVector::new(buf, 0, ReadContext::new(), FieldContext::read_only()).unwrap();
        assert_eq!(vec.get(0).unwrap(), 10);
        // Mutating the underlying bytes is visible on the next get; nothing
        // was cached.
        buf.write(4, 11u32).unwrap();
        assert_eq!(vec.get(0).unwrap(), 11);
    }

    #[test]
    fn test_write_through_set() {
        let mut data = bytes(&[1, 2, 3]);
        let buf = Buffer::from_mut_slice(&mut data);
        let mut vec: LazyVector<'_, u32> =
            LazyVector::new(buf, 0, ReadContext::new(), FieldContext::write_through()).unwrap();
        vec.set(1, 99).unwrap();
        assert_eq!(vec.get(1).unwrap(), 99);

        // A fresh view over the same bytes observes the write.
        let fresh: LazyVector<'_, u32> =
            LazyVector::new(buf, 0, ReadContext::new(), FieldContext::read_only()).unwrap();
        assert_eq!(fresh.get(1).unwrap(), 99);
    }

    #[test]
    fn test_set_rejected_without_field_permission() {
        let mut data = bytes(&[1]);
        let buf = Buffer::from_mut_slice(&mut data);
        let mut vec: LazyVector<'_, u32> =
            LazyVector::new(buf, 0, ReadContext::new(), FieldContext::read_only()).unwrap();
        assert!(matches!(
            vec.set(0, 5),
            Err(Error::NotMutable("write-through disabled for this field"))
        ));
        assert_eq!(vec.get(0).unwrap(), 1);
    }

    #[test]
    fn test_set_rejected_on_read_only_buffer() {
        let data = bytes(&[1]);
        let buf = Buffer::from_slice(&data);
        let mut vec: LazyVector<'_, u32> =
            LazyVector::new(buf, 0, ReadContext::new(), FieldContext::write_through()).unwrap();
        assert!(matches!(vec.set(0, 5), Err(Error::NotMutable(_))));
    }

    #[test]
    fn test_set_rejected_for_indirect_elements() {
        // Strings are indirected; write-through is only meaningful for
        // fixed-inline-size element types.
        let mut data = Vec::new();
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&4u32.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(b"x\0");
        let mut copy = data.clone();
        let buf = Buffer::from_mut_slice(&mut copy);
        let mut vec: LazyVector<'_, String> =
            LazyVector::new(buf, 0, ReadContext::new(), FieldContext::write_through()).unwrap();
        assert!(matches!(
            vec.set(0, "y".to_owned()),
            Err(Error::NotMutable(_))
        ));
    }

    #[test]
    fn test_out_of_range_never_reads() {
        let data = bytes(&[]);
        let vec: LazyVector<'_, u32> = LazyVector::new(
            Buffer::from_slice(&data),
            0,
            ReadContext::new(),
            FieldContext::read_only(),
        )
        .unwrap();
        assert!(matches!(
            vec.get(0),
            Err(Error::IndexOutOfRange { index: 0, count: 0 })
        ));
    }

    #[test]
    fn test_iter() {
        let data = bytes(&[4, 5, 6]);
        let vec: LazyVector<'_, u32> = LazyVector::new(
            Buffer::from_slice(&data),
            0,
            ReadContext::new(),
            FieldContext::read_only(),
        )
        .unwrap();
        let values: Result<Vec<u32>> = vec.iter().collect();
        assert_eq!(values.unwrap(), vec![4, 5, 6]);
    }
}
