//! Bounds-checked little-endian access to a borrowed byte region.
//!
//! [`Buffer`] is the single primitive every view in the crate (tables,
//! vectors, structs, unions) reads through. It never owns the bytes: the
//! caller keeps ownership, and any number of views may alias the same region.
//!
//! A buffer carries a capability:
//!
//! - [`Buffer::from_slice`] yields a read-only buffer.
//! - [`Buffer::from_mut_slice`] yields a mutable buffer backed by
//!   [`AtomicU8`]s, enabling write-through mutation of already-serialized
//!   fields while other views alias the same bytes.
//!
//! Either way the buffer is `Send + Sync`, so views built on it may be
//! shared freely across threads. Mutable-buffer access goes through relaxed
//! per-byte atomics: a reader racing a write-through observes some mix of
//! old and new bytes, never undefined behavior. Callers that need a coherent
//! multi-byte value must not read it concurrently with a write to it.
//!
//! Every read and write checks the computed end position against the buffer
//! length first. Malformed length prefixes are caught exactly here, as
//! [`Error::OutOfBounds`].

use std::borrow::Cow;
use std::sync::atomic::{AtomicU8, Ordering};

use zerocopy::{F32, F64, FromBytes, I16, I32, I64, LE, U16, U32, U64};

use crate::error::{Error, Result};
use crate::layout::SIZE_LENGTH_PREFIX;

/// A borrowed, contiguous byte region plus a read/write capability.
///
/// `Buffer` is `Copy`; handing it to a view hands over an aliasing borrow,
/// never ownership.
///
/// # Examples
///
/// ```
/// use flatpeach::buffer::Buffer;
///
/// let data = [0x34, 0x12, 0x78, 0x56];
/// let buf = Buffer::from_slice(&data);
/// assert_eq!(buf.read_u16(0).unwrap(), 0x1234);
/// assert_eq!(buf.read_u16(2).unwrap(), 0x5678);
/// assert!(buf.read_u16(3).is_err());
/// ```
#[derive(Clone, Copy)]
pub enum Buffer<'a> {
    /// Immutable view; reads only.
    ReadOnly(&'a [u8]),
    /// Mutable view; reads plus write-through writes.
    Mutable(&'a [AtomicU8]),
}

impl<'a> Buffer<'a> {
    /// Create a read-only buffer over a byte slice.
    #[inline]
    pub fn from_slice(data: &'a [u8]) -> Self {
        Buffer::ReadOnly(data)
    }

    /// Create a mutable buffer over an exclusive byte slice.
    ///
    /// The resulting buffer (and all views derived from it) may freely alias;
    /// writes go straight through to the underlying bytes.
    #[inline]
    pub fn from_mut_slice(data: &'a mut [u8]) -> Self {
        // SAFETY: `AtomicU8` has the same size, alignment, and bit validity
        // as `u8`, and the exclusive borrow guarantees no non-atomic access
        // to the region for 'a.
        let atoms = unsafe { &*(std::ptr::from_mut::<[u8]>(data) as *const [AtomicU8]) };
        Buffer::Mutable(atoms)
    }

    /// Total length of the underlying region in bytes.
    #[inline]
    pub fn len(self) -> usize {
        match self {
            Buffer::ReadOnly(data) => data.len(),
            Buffer::Mutable(atoms) => atoms.len(),
        }
    }

    /// Whether the underlying region is empty.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.len() == 0
    }

    /// Whether this buffer permits write-through writes.
    #[inline]
    pub fn is_mutable(self) -> bool {
        matches!(self, Buffer::Mutable(_))
    }

    /// Verify that `len` bytes starting at `offset` lie inside the buffer.
    #[inline]
    pub fn check(self, offset: usize, len: usize) -> Result<()> {
        let end = offset.checked_add(len).ok_or(Error::OutOfBounds {
            offset,
            len,
            available: self.len(),
        })?;
        if end > self.len() {
            return Err(Error::OutOfBounds {
                offset,
                len,
                available: self.len(),
            });
        }
        Ok(())
    }

    /// The atomic byte slice backing a mutable buffer, or
    /// [`Error::NotMutable`].
    #[inline]
    fn atoms(self) -> Result<&'a [AtomicU8]> {
        match self {
            Buffer::Mutable(atoms) => Ok(atoms),
            Buffer::ReadOnly(_) => Err(Error::NotMutable("buffer is read-only")),
        }
    }

    /// Read a typed little-endian scalar at `offset`.
    #[inline]
    pub fn read<T: Scalar>(self, offset: usize) -> Result<T> {
        T::read_le(self, offset)
    }

    /// Write a typed little-endian scalar at `offset`.
    ///
    /// Fails with [`Error::NotMutable`] on a read-only buffer. Used only for
    /// serialization and for write-through mutation of already-serialized
    /// fields.
    #[inline]
    pub fn write<T: Scalar>(self, offset: usize, value: T) -> Result<()> {
        value.write_le(self, offset)
    }

    /// Read `len` raw bytes at `offset`.
    ///
    /// Borrows from the underlying region when the buffer is read-only;
    /// copies out of a mutable buffer.
    pub fn read_bytes(self, offset: usize, len: usize) -> Result<Cow<'a, [u8]>> {
        self.check(offset, len)?;
        match self {
            Buffer::ReadOnly(data) => Ok(Cow::Borrowed(&data[offset..offset + len])),
            Buffer::Mutable(atoms) => Ok(Cow::Owned(
                atoms[offset..offset + len]
                    .iter()
                    .map(|byte| byte.load(Ordering::Relaxed))
                    .collect(),
            )),
        }
    }

    /// Write raw bytes at `offset`.
    pub fn write_bytes(self, offset: usize, bytes: &[u8]) -> Result<()> {
        self.check(offset, bytes.len())?;
        let atoms = self.atoms()?;
        for (atom, byte) in atoms[offset..offset + bytes.len()].iter().zip(bytes) {
            atom.store(*byte, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Read a length-prefixed UTF-8 string whose prefix starts at `offset`.
    ///
    /// The wire encoding is a `u32` byte length followed by that many UTF-8
    /// bytes; a trailing NUL is conventionally reserved by writers but not
    /// required for reads. The computed end position is checked against the
    /// buffer length before the payload is touched.
    ///
    /// # Examples
    ///
    /// ```
    /// use flatpeach::buffer::Buffer;
    ///
    /// let data = [0x02, 0x00, 0x00, 0x00, b'h', b'i', 0x00];
    /// let buf = Buffer::from_slice(&data);
    /// assert_eq!(buf.read_str(0).unwrap(), "hi");
    /// ```
    pub fn read_str(self, offset: usize) -> Result<Cow<'a, str>> {
        let len = self.read_u32(offset)? as usize;
        let body = offset
            .checked_add(SIZE_LENGTH_PREFIX)
            .ok_or(Error::OutOfBounds {
                offset,
                len: SIZE_LENGTH_PREFIX,
                available: self.len(),
            })?;
        match self.read_bytes(body, len)? {
            Cow::Borrowed(bytes) => Ok(Cow::Borrowed(std::str::from_utf8(bytes)?)),
            Cow::Owned(bytes) => match String::from_utf8(bytes) {
                Ok(s) => Ok(Cow::Owned(s)),
                Err(e) => Err(Error::InvalidUtf8(e.utf8_error())),
            },
        }
    }

    /// Resolve a relative offset (uoffset) stored at `offset` into an
    /// absolute byte position.
    ///
    /// The stored `u32` is added to the position at which it was read; this
    /// single indirection is how tables, vectors, and strings are located.
    /// The resolved position must itself lie inside the buffer.
    #[inline]
    pub fn read_uoffset(self, offset: usize) -> Result<usize> {
        let rel = self.read_u32(offset)? as usize;
        let abs = offset.checked_add(rel).ok_or(Error::OutOfBounds {
            offset,
            len: rel,
            available: self.len(),
        })?;
        self.check(abs, 1)?;
        Ok(abs)
    }

    /// Read a `bool` (any nonzero byte is `true`) at `offset`.
    #[inline]
    pub fn read_bool(self, offset: usize) -> Result<bool> {
        self.read(offset)
    }

    /// Read a `u8` at `offset`.
    #[inline]
    pub fn read_u8(self, offset: usize) -> Result<u8> {
        self.read(offset)
    }

    /// Read an `i8` at `offset`.
    #[inline]
    pub fn read_i8(self, offset: usize) -> Result<i8> {
        self.read(offset)
    }

    /// Read a little-endian `u16` at `offset`.
    #[inline]
    pub fn read_u16(self, offset: usize) -> Result<u16> {
        self.read(offset)
    }

    /// Read a little-endian `i16` at `offset`.
    #[inline]
    pub fn read_i16(self, offset: usize) -> Result<i16> {
        self.read(offset)
    }

    /// Read a little-endian `u32` at `offset`.
    #[inline]
    pub fn read_u32(self, offset: usize) -> Result<u32> {
        self.read(offset)
    }

    /// Read a little-endian `i32` at `offset`.
    #[inline]
    pub fn read_i32(self, offset: usize) -> Result<i32> {
        self.read(offset)
    }

    /// Read a little-endian `u64` at `offset`.
    #[inline]
    pub fn read_u64(self, offset: usize) -> Result<u64> {
        self.read(offset)
    }

    /// Read a little-endian `i64` at `offset`.
    #[inline]
    pub fn read_i64(self, offset: usize) -> Result<i64> {
        self.read(offset)
    }

    /// Read a little-endian `f32` at `offset`.
    #[inline]
    pub fn read_f32(self, offset: usize) -> Result<f32> {
        self.read(offset)
    }

    /// Read a little-endian `f64` at `offset`.
    #[inline]
    pub fn read_f64(self, offset: usize) -> Result<f64> {
        self.read(offset)
    }
}

impl std::fmt::Debug for Buffer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Buffer::ReadOnly(data) => f
                .debug_struct("Buffer")
                .field("len", &data.len())
                .field("mutable", &false)
                .finish(),
            Buffer::Mutable(atoms) => f
                .debug_struct("Buffer")
                .field("len", &atoms.len())
                .field("mutable", &true)
                .finish(),
        }
    }
}

/// A fixed-width wire scalar with a little-endian encoding.
///
/// Implemented for `bool` and the ten numeric types the format defines.
/// `SIZE` is the scalar's inline size on the wire, which is also its
/// alignment.
pub trait Scalar: Copy + PartialEq + std::fmt::Debug + 'static {
    /// Inline size (and alignment) in bytes.
    const SIZE: usize;

    /// Bounds-checked little-endian decode at `offset`.
    fn read_le(buf: Buffer<'_>, offset: usize) -> Result<Self>;

    /// Bounds-checked little-endian encode at `offset`.
    fn write_le(self, buf: Buffer<'_>, offset: usize) -> Result<()>;

    /// Copy the value's `SIZE` little-endian bytes into the front of `out`.
    ///
    /// `out` must be at least `SIZE` bytes long.
    fn copy_le(self, out: &mut [u8]);
}

macro_rules! impl_scalar {
    ($ty:ty, $zc:ty, $size:expr) => {
        impl Scalar for $ty {
            const SIZE: usize = $size;

            #[inline]
            fn read_le(buf: Buffer<'_>, offset: usize) -> Result<Self> {
                buf.check(offset, $size)?;
                match buf {
                    Buffer::ReadOnly(data) => {
                        <$zc>::read_from_bytes(&data[offset..offset + $size])
                            .map(|v| v.get())
                            .map_err(|_| Error::OutOfBounds {
                                offset,
                                len: $size,
                                available: data.len(),
                            })
                    },
                    Buffer::Mutable(atoms) => {
                        let mut raw = [0u8; $size];
                        for (i, byte) in raw.iter_mut().enumerate() {
                            *byte = atoms[offset + i].load(Ordering::Relaxed);
                        }
                        Ok(<$ty>::from_le_bytes(raw))
                    },
                }
            }

            #[inline]
            fn write_le(self, buf: Buffer<'_>, offset: usize) -> Result<()> {
                buf.check(offset, $size)?;
                let atoms = buf.atoms()?;
                for (atom, byte) in atoms[offset..offset + $size]
                    .iter()
                    .zip(self.to_le_bytes())
                {
                    atom.store(byte, Ordering::Relaxed);
                }
                Ok(())
            }

            #[inline]
            fn copy_le(self, out: &mut [u8]) {
                out[..$size].copy_from_slice(&self.to_le_bytes());
            }
        }
    };
}

impl_scalar!(u16, U16<LE>, 2);
impl_scalar!(i16, I16<LE>, 2);
impl_scalar!(u32, U32<LE>, 4);
impl_scalar!(i32, I32<LE>, 4);
impl_scalar!(u64, U64<LE>, 8);
impl_scalar!(i64, I64<LE>, 8);
impl_scalar!(f32, F32<LE>, 4);
impl_scalar!(f64, F64<LE>, 8);

impl Scalar for u8 {
    const SIZE: usize = 1;

    #[inline]
    fn read_le(buf: Buffer<'_>, offset: usize) -> Result<Self> {
        buf.check(offset, 1)?;
        match buf {
            Buffer::ReadOnly(data) => Ok(data[offset]),
            Buffer::Mutable(atoms) => Ok(atoms[offset].load(Ordering::Relaxed)),
        }
    }

    #[inline]
    fn write_le(self, buf: Buffer<'_>, offset: usize) -> Result<()> {
        buf.check(offset, 1)?;
        buf.atoms()?[offset].store(self, Ordering::Relaxed);
        Ok(())
    }

    #[inline]
    fn copy_le(self, out: &mut [u8]) {
        out[0] = self;
    }
}

impl Scalar for i8 {
    const SIZE: usize = 1;

    #[inline]
    fn read_le(buf: Buffer<'_>, offset: usize) -> Result<Self> {
        Ok(u8::read_le(buf, offset)? as i8)
    }

    #[inline]
    fn write_le(self, buf: Buffer<'_>, offset: usize) -> Result<()> {
        (self as u8).write_le(buf, offset)
    }

    #[inline]
    fn copy_le(self, out: &mut [u8]) {
        out[0] = self as u8;
    }
}

impl Scalar for bool {
    const SIZE: usize = 1;

    #[inline]
    fn read_le(buf: Buffer<'_>, offset: usize) -> Result<Self> {
        Ok(u8::read_le(buf, offset)? != 0)
    }

    #[inline]
    fn write_le(self, buf: Buffer<'_>, offset: usize) -> Result<()> {
        u8::from(self).write_le(buf, offset)
    }

    #[inline]
    fn copy_le(self, out: &mut [u8]) {
        out[0] = u8::from(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_reads() {
        let data = [
            0x01, // bool / u8
            0xFF, // i8 = -1
            0x34, 0x12, // u16
            0x78, 0x56, 0x34, 0x12, // u32
            0x00, 0x00, 0x80, 0x3F, // f32 = 1.0
        ];
        let buf = Buffer::from_slice(&data);
        assert!(buf.read_bool(0).unwrap());
        assert_eq!(buf.read_u8(0).unwrap(), 1);
        assert_eq!(buf.read_i8(1).unwrap(), -1);
        assert_eq!(buf.read_u16(2).unwrap(), 0x1234);
        assert_eq!(buf.read_u32(4).unwrap(), 0x12345678);
        assert_eq!(buf.read_f32(8).unwrap(), 1.0);
    }

    #[test]
    fn test_bounds_violations() {
        let data = [0u8; 4];
        let buf = Buffer::from_slice(&data);
        assert!(matches!(
            buf.read_u32(1),
            Err(Error::OutOfBounds {
                offset: 1,
                len: 4,
                available: 4
            })
        ));
        assert!(buf.read_u64(0).is_err());
        assert!(buf.read_u8(4).is_err());
        // Offset arithmetic must not wrap.
        assert!(buf.check(usize::MAX, 2).is_err());
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let data = [0u8; 8];
        let buf = Buffer::from_slice(&data);
        assert!(matches!(
            buf.write(0, 7u32),
            Err(Error::NotMutable("buffer is read-only"))
        ));
        assert!(buf.write_bytes(0, &[1, 2]).is_err());
    }

    #[test]
    fn test_write_through_round_trip() {
        let mut data = [0u8; 16];
        let buf = Buffer::from_mut_slice(&mut data);
        buf.write(0, 0xDEADBEEFu32).unwrap();
        buf.write(4, -2i16).unwrap();
        buf.write(8, 2.5f64).unwrap();
        assert_eq!(buf.read_u32(0).unwrap(), 0xDEADBEEF);
        assert_eq!(buf.read_i16(4).unwrap(), -2);
        assert_eq!(buf.read_f64(8).unwrap(), 2.5);
        // Writes land in the underlying bytes, little-endian.
        drop(buf);
        assert_eq!(&data[0..4], &[0xEF, 0xBE, 0xAD, 0xDE]);
    }

    #[test]
    fn test_buffer_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Buffer<'static>>();
    }

    #[test]
    fn test_read_only_view_shared_across_threads() {
        let data = [0x2A, 0x00, 0x00, 0x00];
        let buf = Buffer::from_slice(&data);
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(move || {
                    assert_eq!(buf.read_u32(0).unwrap(), 42);
                });
            }
        });
    }

    #[test]
    fn test_mutable_buffer_crosses_threads() {
        let mut data = [0u8; 4];
        let buf = Buffer::from_mut_slice(&mut data);
        std::thread::scope(|s| {
            s.spawn(move || {
                buf.write(0, 7u32).unwrap();
            });
        });
        assert_eq!(buf.read_u32(0).unwrap(), 7);
    }

    #[test]
    fn test_aliased_views_observe_writes() {
        let mut data = [0u8; 4];
        let buf = Buffer::from_mut_slice(&mut data);
        let alias = buf;
        buf.write(0, 42u32).unwrap();
        assert_eq!(alias.read_u32(0).unwrap(), 42);
    }

    #[test]
    fn test_read_str() {
        let data = [0x03, 0x00, 0x00, 0x00, b'a', b'b', b'c', 0x00];
        let buf = Buffer::from_slice(&data);
        let s = buf.read_str(0).unwrap();
        assert_eq!(s, "abc");
        assert!(matches!(s, Cow::Borrowed(_)));
    }

    #[test]
    fn test_read_str_lying_length_prefix() {
        // Claims 200 bytes of payload, buffer only has 3.
        let data = [0xC8, 0x00, 0x00, 0x00, b'a', b'b', b'c'];
        let buf = Buffer::from_slice(&data);
        assert!(matches!(buf.read_str(0), Err(Error::OutOfBounds { .. })));
    }

    #[test]
    fn test_read_str_invalid_utf8() {
        let data = [0x02, 0x00, 0x00, 0x00, 0xFF, 0xFE];
        let buf = Buffer::from_slice(&data);
        assert!(matches!(buf.read_str(0), Err(Error::InvalidUtf8(_))));
    }

    #[test]
    fn test_read_str_from_mutable_copies() {
        let mut data = [0x02, 0x00, 0x00, 0x00, b'h', b'i'];
        let buf = Buffer::from_mut_slice(&mut data);
        let s = buf.read_str(0).unwrap();
        assert_eq!(s, "hi");
        assert!(matches!(s, Cow::Owned(_)));
    }

    #[test]
    fn test_read_uoffset() {
        // uoffset 4 stored at position 0 resolves to absolute 4.
        let data = [0x04, 0x00, 0x00, 0x00, 0xAA, 0x00, 0x00, 0x00];
        let buf = Buffer::from_slice(&data);
        assert_eq!(buf.read_uoffset(0).unwrap(), 4);

        // A uoffset pointing past the end of the buffer is rejected.
        let data = [0x40, 0x00, 0x00, 0x00];
        let buf = Buffer::from_slice(&data);
        assert!(matches!(
            buf.read_uoffset(0),
            Err(Error::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_read_bytes_borrow_vs_copy() {
        let data = [1u8, 2, 3, 4];
        let buf = Buffer::from_slice(&data);
        assert!(matches!(
            buf.read_bytes(1, 2).unwrap(),
            Cow::Borrowed(&[2, 3])
        ));

        let mut data = [1u8, 2, 3, 4];
        let buf = Buffer::from_mut_slice(&mut data);
        assert_eq!(buf.read_bytes(1, 2).unwrap().as_ref(), &[2, 3]);
    }
}
