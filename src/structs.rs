//! Fixed inline layout for struct-typed values.
//!
//! Structs are never indirected: their bytes are embedded inline in the
//! parent table, vector slot, or enclosing struct, at offsets computed once
//! from the member sequence with C-style alignment rules. The same
//! [`align_padding`] arithmetic sizes a struct during serialization and
//! locates its members during reads.

use smallvec::SmallVec;

use crate::buffer::{Buffer, Scalar};
use crate::error::{Error, Result};
use crate::layout::{align_padding, align_up};

/// Size and alignment of one declared struct member.
///
/// Scalars use their wire size for both; a nested struct member uses the
/// nested layout's [`StructLayout::size`] and [`StructLayout::align`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberLayout {
    pub size: usize,
    pub align: usize,
}

impl MemberLayout {
    /// Layout of a scalar member.
    #[inline]
    pub const fn scalar<T: Scalar>() -> Self {
        Self {
            size: T::SIZE,
            align: T::SIZE,
        }
    }
}

/// A member's resolved placement within its struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructMember {
    /// Fixed byte offset from the struct's start.
    pub offset: usize,
    pub size: usize,
    pub align: usize,
}

/// Padding-aware fixed offsets for every member of a struct type, computed
/// once at schema-definition time and consulted on every access.
///
/// # Examples
///
/// ```
/// use flatpeach::structs::{MemberLayout, StructLayout};
///
/// // struct { a: u8, b: u32, c: u16 }
/// let layout = StructLayout::compute(&[
///     MemberLayout::scalar::<u8>(),
///     MemberLayout::scalar::<u32>(),
///     MemberLayout::scalar::<u16>(),
/// ]);
/// assert_eq!(layout.member(0).unwrap().offset, 0);
/// assert_eq!(layout.member(1).unwrap().offset, 4); // padded past a
/// assert_eq!(layout.member(2).unwrap().offset, 8);
/// assert_eq!(layout.align(), 4);
/// assert_eq!(layout.size(), 12); // trailing padding to a multiple of 4
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructLayout {
    members: SmallVec<[StructMember; 8]>,
    size: usize,
    align: usize,
}

impl StructLayout {
    /// Assign fixed offsets to the member sequence.
    ///
    /// Each member is aligned to its own alignment, the struct's alignment is
    /// the maximum member alignment, and the total size is padded to a
    /// multiple of that alignment. Alignments must be powers of two.
    pub fn compute(members: &[MemberLayout]) -> Self {
        let mut resolved = SmallVec::with_capacity(members.len());
        let mut cursor = 0usize;
        let mut max_align = 1usize;
        for m in members {
            cursor += align_padding(cursor, m.align);
            resolved.push(StructMember {
                offset: cursor,
                size: m.size,
                align: m.align,
            });
            cursor += m.size;
            max_align = max_align.max(m.align);
        }
        Self {
            members: resolved,
            size: align_up(cursor, max_align),
            align: max_align,
        }
    }

    /// Total inline size in bytes, including trailing padding.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Struct alignment (maximum member alignment).
    #[inline]
    pub fn align(&self) -> usize {
        self.align
    }

    /// Number of members.
    #[inline]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the struct has no members.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// The resolved placement of member `index`, if it exists.
    #[inline]
    pub fn member(&self, index: usize) -> Option<&StructMember> {
        self.members.get(index)
    }
}

/// A zero-copy view of one struct value inside a buffer.
///
/// Valid only while the buffer is valid; carries no copy of the data.
#[derive(Debug, Clone, Copy)]
pub struct StructView<'a, 's> {
    buf: Buffer<'a>,
    pos: usize,
    layout: &'s StructLayout,
}

impl<'a, 's> StructView<'a, 's> {
    /// View the struct whose first byte is at `pos`.
    ///
    /// The full inline extent is bounds-checked up front, so member reads
    /// cannot run past the buffer.
    pub fn new(buf: Buffer<'a>, pos: usize, layout: &'s StructLayout) -> Result<Self> {
        buf.check(pos, layout.size())?;
        Ok(Self { buf, pos, layout })
    }

    /// The layout this view resolves members against.
    #[inline]
    pub fn layout(&self) -> &'s StructLayout {
        self.layout
    }

    /// Absolute position of the struct's first byte.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Absolute position of member `index`.
    pub fn member_pos(&self, index: usize) -> Result<usize> {
        let member = self
            .layout
            .member(index)
            .ok_or(Error::IndexOutOfRange {
                index,
                count: self.layout.len(),
            })?;
        Ok(self.pos + member.offset)
    }

    /// Read scalar member `index`.
    pub fn read_scalar<T: Scalar>(&self, index: usize) -> Result<T> {
        self.buf.read(self.member_pos(index)?)
    }

    /// Write-through scalar member `index`.
    ///
    /// Fails with [`Error::NotMutable`] when the buffer is read-only.
    pub fn write_scalar<T: Scalar>(&self, index: usize, value: T) -> Result<()> {
        self.buf.write(self.member_pos(index)?, value)
    }

    /// View a nested struct member at `index` with its own layout.
    pub fn nested_struct(&self, index: usize, layout: &'s StructLayout) -> Result<StructView<'a, 's>> {
        StructView::new(self.buf, self.member_pos(index)?, layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_member_layout() {
        let layout = StructLayout::compute(&[MemberLayout::scalar::<f64>()]);
        assert_eq!(layout.size(), 8);
        assert_eq!(layout.align(), 8);
        assert_eq!(layout.member(0).unwrap().offset, 0);
    }

    #[test]
    fn test_interleaved_padding() {
        // struct { a: u16, b: u64, c: u8 }
        let layout = StructLayout::compute(&[
            MemberLayout::scalar::<u16>(),
            MemberLayout::scalar::<u64>(),
            MemberLayout::scalar::<u8>(),
        ]);
        assert_eq!(layout.member(0).unwrap().offset, 0);
        assert_eq!(layout.member(1).unwrap().offset, 8);
        assert_eq!(layout.member(2).unwrap().offset, 16);
        assert_eq!(layout.align(), 8);
        assert_eq!(layout.size(), 24);
    }

    #[test]
    fn test_view_reads_fixed_offsets() {
        // struct { a: u8, b: u32 } over hand-laid bytes with 3 pad bytes.
        let layout = StructLayout::compute(&[
            MemberLayout::scalar::<u8>(),
            MemberLayout::scalar::<u32>(),
        ]);
        let data = [0x07, 0x00, 0x00, 0x00, 0x2A, 0x00, 0x00, 0x00];
        let view = StructView::new(Buffer::from_slice(&data), 0, &layout).unwrap();
        assert_eq!(view.read_scalar::<u8>(0).unwrap(), 7);
        assert_eq!(view.read_scalar::<u32>(1).unwrap(), 42);
        assert!(matches!(
            view.read_scalar::<u8>(2),
            Err(Error::IndexOutOfRange { index: 2, count: 2 })
        ));
    }

    #[test]
    fn test_view_bounds_checked_at_construction() {
        let layout = StructLayout::compute(&[MemberLayout::scalar::<u64>()]);
        let data = [0u8; 7];
        assert!(StructView::new(Buffer::from_slice(&data), 0, &layout).is_err());
    }

    #[test]
    fn test_write_through_member() {
        let layout = StructLayout::compute(&[
            MemberLayout::scalar::<u16>(),
            MemberLayout::scalar::<u16>(),
        ]);
        let mut data = [0u8; 4];
        let buf = Buffer::from_mut_slice(&mut data);
        let view = StructView::new(buf, 0, &layout).unwrap();
        view.write_scalar(1, 0xBEEFu16).unwrap();
        assert_eq!(view.read_scalar::<u16>(1).unwrap(), 0xBEEF);
        assert_eq!(view.read_scalar::<u16>(0).unwrap(), 0);
    }

    #[test]
    fn test_nested_struct_member() {
        let inner = StructLayout::compute(&[MemberLayout::scalar::<u32>()]);
        let outer = StructLayout::compute(&[
            MemberLayout::scalar::<u8>(),
            MemberLayout {
                size: inner.size(),
                align: inner.align(),
            },
        ]);
        let data = [0x01, 0, 0, 0, 0x39, 0x05, 0x00, 0x00];
        let view = StructView::new(Buffer::from_slice(&data), 0, &outer).unwrap();
        let nested = view.nested_struct(1, &inner).unwrap();
        assert_eq!(nested.read_scalar::<u32>(0).unwrap(), 1337);
    }
}
