//! Wire layout arithmetic shared by reading and writing paths.
//!
//! All multi-byte values in the format are little-endian. Scalars occupy a
//! fixed number of inline bytes; strings, vectors, and tables occupy a 4-byte
//! relative offset inline; structs occupy their full padded inline size.

/// Size in bytes of a relative offset locating a table, vector, or string.
pub const SIZE_UOFFSET: usize = 4;

/// Size in bytes of the signed offset from a table to its vtable.
pub const SIZE_SOFFSET: usize = 4;

/// Size in bytes of one vtable entry.
pub const SIZE_VOFFSET: usize = 2;

/// Size in bytes of a vector's length prefix.
pub const SIZE_LENGTH_PREFIX: usize = 4;

/// Size in bytes of a file identifier, when one is present after the root
/// offset.
pub const SIZE_FILE_IDENTIFIER: usize = 4;

/// Number of pad bytes needed so that `offset + padding` is a multiple of
/// `alignment`. `alignment` must be a power of two.
///
/// Used identically when sizing a value during serialization and when
/// computing a struct member's fixed offset.
///
/// # Examples
///
/// ```
/// use flatpeach::layout::align_padding;
/// assert_eq!(align_padding(0, 4), 0);
/// assert_eq!(align_padding(1, 4), 3);
/// assert_eq!(align_padding(6, 2), 0);
/// assert_eq!(align_padding(9, 8), 7);
/// ```
#[inline]
pub const fn align_padding(offset: usize, alignment: usize) -> usize {
    (!offset).wrapping_add(1) & (alignment - 1)
}

/// Round `offset` up to the next multiple of `alignment` (a power of two).
#[inline]
pub const fn align_up(offset: usize, alignment: usize) -> usize {
    offset + align_padding(offset, alignment)
}
