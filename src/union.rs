//! Union codec: discriminator + value pairs and vectors of them.
//!
//! A union value is a one-byte discriminator selecting among the declared
//! member types in declaration order, plus a payload located through the
//! value field's offset. Discriminator 0 means "unset". In a table, a
//! union-typed field consumes two consecutive field indices (discriminator,
//! then value).
//!
//! A vector of unions is stored as two sibling vectors built and indexed in
//! lockstep: a discriminator vector (byte elements) and a value-offset
//! vector (4-byte relative offsets). Their lengths must be equal; a mismatch
//! marks the buffer corrupt and fails before any element is materialized.

use std::marker::PhantomData;

use crate::buffer::Buffer;
use crate::context::ReadContext;
use crate::error::{Error, Result};
use crate::layout::SIZE_UOFFSET;
use crate::vector::check_index;

/// A type decodable from a union slot. Generated code implements this once
/// per schema union, dispatching on the discriminator to the member types in
/// declaration order.
///
/// `read_union` is only called with a nonzero discriminator; `slot` is the
/// absolute position of the value's relative offset. Implementations should
/// answer [`Error::InvalidData`] for discriminators beyond the declared
/// member count.
pub trait UnionElement<'a>: Sized {
    fn read_union(
        discriminator: u8,
        buf: Buffer<'a>,
        slot: usize,
        ctx: &ReadContext,
    ) -> Result<Self>;
}

/// The two parallel wire vectors of a union-typed vector field, indexed in
/// lockstep.
///
/// Elements decode lazily; `get` reads the discriminator byte and, when it
/// is nonzero, hands the matching value slot to `U::read_union`.
#[derive(Debug, Clone)]
pub struct UnionVector<'a, U> {
    buf: Buffer<'a>,
    ctx: ReadContext,
    count: usize,
    disc_base: usize,
    value_base: usize,
    _marker: PhantomData<fn() -> U>,
}

impl<'a, U: UnionElement<'a>> UnionVector<'a, U> {
    /// Construct from the positions of the two sibling length prefixes.
    ///
    /// Both counts are read and compared first: a length mismatch is a fatal
    /// [`Error::InvalidData`] raised before any element is touched.
    pub fn new(
        buf: Buffer<'a>,
        disc_pos: usize,
        value_pos: usize,
        ctx: ReadContext,
    ) -> Result<Self> {
        let (disc_count, disc_base) = crate::vector::read_vector_header(buf, disc_pos, 1)?;
        let (value_count, value_base) =
            crate::vector::read_vector_header(buf, value_pos, SIZE_UOFFSET)?;
        if disc_count != value_count {
            return Err(Error::InvalidData(format!(
                "union vector length mismatch: {disc_count} discriminator(s) vs {value_count} value offset(s)"
            )));
        }
        Ok(Self {
            buf,
            ctx,
            count: disc_count,
            disc_base,
            value_base,
            _marker: PhantomData,
        })
    }

    /// Number of union elements.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Whether the vector has no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The raw discriminator byte at `index`.
    pub fn discriminator(&self, index: usize) -> Result<u8> {
        check_index(index, self.count)?;
        self.buf.read_u8(self.disc_base + index)
    }

    /// The union element at `index`; `None` when its discriminator is 0.
    pub fn get(&self, index: usize) -> Result<Option<U>> {
        let disc = self.discriminator(index)?;
        if disc == 0 {
            return Ok(None);
        }
        let slot = self.value_base + index * SIZE_UOFFSET;
        U::read_union(disc, self.buf, slot, &self.ctx).map(Some)
    }

    /// Iterate over all union elements.
    pub fn iter(&self) -> impl Iterator<Item = Result<Option<U>>> + '_ {
        (0..self.count).map(move |i| self.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    /// A two-member test union: `1 => Word(string)`, `2 => Number(u32
    /// wrapped in a single-field table-free payload)`.
    ///
    /// For test purposes member 2 reads the 4 bytes at the resolved offset
    /// directly.
    #[derive(Debug, PartialEq)]
    enum Token<'a> {
        Word(Cow<'a, str>),
        Number(u32),
    }

    impl<'a> UnionElement<'a> for Token<'a> {
        fn read_union(
            discriminator: u8,
            buf: Buffer<'a>,
            slot: usize,
            _ctx: &ReadContext,
        ) -> Result<Self> {
            let abs = buf.read_uoffset(slot)?;
            match discriminator {
                1 => Ok(Token::Word(buf.read_str(abs)?)),
                2 => Ok(Token::Number(buf.read_u32(abs)?)),
                other => Err(Error::InvalidData(format!(
                    "unknown Token discriminator {other}"
                ))),
            }
        }
    }

    /// Lay out: disc vector [1, 0, 2], offset vector, "hi" string, 99u32.
    fn union_vector_bytes(disc_count: u32) -> Vec<u8> {
        let mut data = Vec::new();
        // 0: discriminator vector (count + 3 bytes + pad)
        data.extend_from_slice(&disc_count.to_le_bytes());
        data.extend_from_slice(&[1, 0, 2, 0]);
        // 8: value-offset vector: count=3, slots at 12/16/20
        data.extend_from_slice(&3u32.to_le_bytes());
        data.extend_from_slice(&12u32.to_le_bytes()); // 12 -> 24 (string)
        data.extend_from_slice(&0u32.to_le_bytes()); // unset
        data.extend_from_slice(&11u32.to_le_bytes()); // 20 -> 31 (number)
        // 24: string "hi"
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(b"hi\0");
        // 31: u32 payload
        data.extend_from_slice(&99u32.to_le_bytes());
        data
    }

    #[test]
    fn test_lockstep_decode() {
        let data = union_vector_bytes(3);
        let vec: UnionVector<'_, Token<'_>> =
            UnionVector::new(Buffer::from_slice(&data), 0, 8, ReadContext::new()).unwrap();
        assert_eq!(vec.count(), 3);
        assert_eq!(vec.get(0).unwrap(), Some(Token::Word(Cow::Borrowed("hi"))));
        assert_eq!(vec.get(1).unwrap(), None);
        assert_eq!(vec.get(2).unwrap(), Some(Token::Number(99)));
        assert_eq!(vec.discriminator(2).unwrap(), 2);
    }

    #[test]
    fn test_length_mismatch_is_fatal() {
        // The discriminator vector claims 2 elements, the offset vector 3.
        let data = union_vector_bytes(2);
        let res: Result<UnionVector<'_, Token<'_>>> =
            UnionVector::new(Buffer::from_slice(&data), 0, 8, ReadContext::new());
        match res {
            Err(Error::InvalidData(msg)) => {
                assert!(msg.contains("union vector length mismatch"), "{msg}");
            },
            other => panic!("expected invalid-data error, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_discriminator() {
        let mut data = union_vector_bytes(3);
        data[4] = 7; // first discriminator now names no member
        let vec: UnionVector<'_, Token<'_>> =
            UnionVector::new(Buffer::from_slice(&data), 0, 8, ReadContext::new()).unwrap();
        assert!(matches!(vec.get(0), Err(Error::InvalidData(_))));
        // Other elements are unaffected.
        assert_eq!(vec.get(2).unwrap(), Some(Token::Number(99)));
    }

    #[test]
    fn test_out_of_range() {
        let data = union_vector_bytes(3);
        let vec: UnionVector<'_, Token<'_>> =
            UnionVector::new(Buffer::from_slice(&data), 0, 8, ReadContext::new()).unwrap();
        assert!(matches!(
            vec.get(3),
            Err(Error::IndexOutOfRange { index: 3, count: 3 })
        ));
    }
}
