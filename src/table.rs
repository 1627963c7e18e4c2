//! Table views and vtable-style field resolution.
//!
//! A table is reached through one level of offset indirection from its
//! container. Its first four bytes are a signed offset back to a vtable:
//! `u16` vtable byte length, `u16` table byte length, then one `u16` entry
//! per declared field holding the field's offset within the table, or 0 when
//! the field was omitted. An omitted field is the only non-error path that
//! produces a default instead of stored data.
//!
//! Generated accessors call [`Table::field_offset`] (the resolver) and the
//! typed helpers below; whether a decoded value is cached across repeated
//! property reads is the accessor's explicit choice, supported by
//! [`FieldCache`]. Raw byte spans are deliberately never cached that way:
//! [`Table::bytes_field`] re-derives the span on every call, since a cached
//! span tied to buffer lifetime risks exposing stale aliased memory.

use std::borrow::Cow;

use once_cell::sync::OnceCell;

use crate::buffer::{Buffer, Scalar};
use crate::context::{ReadContext, SharedFieldContext};
use crate::error::{Error, Result};
use crate::layout::{SIZE_FILE_IDENTIFIER, SIZE_UOFFSET, SIZE_VOFFSET};
use crate::structs::{StructLayout, StructView};
use crate::union::{UnionElement, UnionVector};
use crate::vector::{Element, ReadMode, VectorOf};

/// A field's declaration-order index within its table.
///
/// Indices are assigned at schema-definition time and are sequential; a
/// union-typed field consumes two consecutive indices (discriminator, then
/// value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldIndex(pub u16);

impl FieldIndex {
    /// Byte offset of this field's entry within the vtable.
    #[inline]
    fn voffset(self) -> usize {
        2 * SIZE_VOFFSET + SIZE_VOFFSET * self.0 as usize
    }

    /// The value index paired with a union discriminator at `self`.
    #[inline]
    pub fn paired_value(self) -> FieldIndex {
        FieldIndex(self.0 + 1)
    }
}

/// A zero-copy view of one table inside a buffer.
///
/// Carries no copy of the data and is valid only while the buffer is; the
/// view is `Copy`, so handing it around is free. Each view owns the
/// remaining depth budget for descents below it: a table reached through
/// [`table_field`](Self::table_field) carries one unit less than its parent,
/// so a chain of nested reads runs out of budget instead of stack.
#[derive(Debug, Clone, Copy)]
pub struct Table<'a> {
    buf: Buffer<'a>,
    pos: usize,
    ctx: ReadContext,
}

impl<'a> Table<'a> {
    /// The table a resolved absolute offset points at, with the default
    /// depth budget.
    #[inline]
    pub fn at(buf: Buffer<'a>, pos: usize) -> Self {
        Self {
            buf,
            pos,
            ctx: ReadContext::new(),
        }
    }

    /// The same view with an explicit depth budget for descents below it.
    #[inline]
    pub fn with_context(mut self, ctx: ReadContext) -> Self {
        self.ctx = ctx;
        self
    }

    /// Follow the root offset at the start of a finished buffer.
    pub fn from_root(buf: Buffer<'a>) -> Result<Self> {
        let pos = buf.read_uoffset(0)?;
        Ok(Self::at(buf, pos))
    }

    /// Like [`from_root`](Self::from_root), additionally requiring the
    /// 4-byte file identifier after the root offset to match.
    pub fn from_root_with_identifier(buf: Buffer<'a>, identifier: &[u8; 4]) -> Result<Self> {
        let stored = buf.read_bytes(SIZE_UOFFSET, SIZE_FILE_IDENTIFIER)?;
        if stored.as_ref() != identifier {
            return Err(Error::InvalidData(format!(
                "file identifier mismatch: expected {:?}, found {:?}",
                identifier,
                stored.as_ref()
            )));
        }
        Self::from_root(buf)
    }

    /// The buffer this view reads from.
    #[inline]
    pub fn buffer(&self) -> Buffer<'a> {
        self.buf
    }

    /// Absolute position of the table's soffset word.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// The depth budget governing descents below this view.
    #[inline]
    pub fn context(&self) -> ReadContext {
        self.ctx
    }

    /// Locate and sanity-check this table's vtable.
    fn vtable(&self) -> Result<(usize, usize)> {
        let soffset = self.buf.read_i32(self.pos)?;
        let vt = (self.pos as i64) - i64::from(soffset);
        if vt < 0 || vt as u64 > usize::MAX as u64 {
            return Err(Error::InvalidData(format!(
                "table at {} has vtable offset {} outside the buffer",
                self.pos, soffset
            )));
        }
        let vt = vt as usize;
        let vt_len = self.buf.read_u16(vt)? as usize;
        if vt_len < 2 * SIZE_VOFFSET || vt_len % SIZE_VOFFSET != 0 {
            return Err(Error::InvalidData(format!(
                "malformed vtable of {vt_len} byte(s) at {vt}"
            )));
        }
        self.buf.check(vt, vt_len)?;
        Ok((vt, vt_len))
    }

    /// Resolve `field` to the absolute position of its stored data, or
    /// `None` when the field was omitted (use the declared default).
    ///
    /// This is the vtable lookup; it runs once per call, and callers decide
    /// whether to cache the decoded value across repeated reads.
    pub fn field_offset(&self, field: FieldIndex) -> Result<Option<usize>> {
        let (vt, vt_len) = self.vtable()?;
        let entry = field.voffset();
        if entry + SIZE_VOFFSET > vt_len {
            return Ok(None);
        }
        let rel = self.buf.read_u16(vt + entry)? as usize;
        if rel == 0 {
            return Ok(None);
        }
        let abs = self.pos + rel;
        self.buf.check(abs, 1)?;
        Ok(Some(abs))
    }

    /// Read a scalar field, or `default` when it was omitted.
    ///
    /// The absent path costs the vtable lookup and nothing else.
    pub fn scalar_or<T: Scalar>(&self, field: FieldIndex, default: T) -> Result<T> {
        match self.field_offset(field)? {
            Some(pos) => self.buf.read(pos),
            None => Ok(default),
        }
    }

    /// Write a scalar field through to the backing buffer.
    ///
    /// Fails with [`Error::NotMutable`] on a read-only buffer, and also when
    /// the field was omitted at serialization time: an absent field has no
    /// slot to overwrite.
    pub fn set_scalar<T: Scalar>(&self, field: FieldIndex, value: T) -> Result<()> {
        match self.field_offset(field)? {
            Some(pos) => self.buf.write(pos, value),
            None => Err(Error::NotMutable("cannot write through an absent field")),
        }
    }

    /// Read a string field; `None` when omitted.
    pub fn string(&self, field: FieldIndex) -> Result<Option<Cow<'a, str>>> {
        match self.field_offset(field)? {
            Some(pos) => {
                let abs = self.buf.read_uoffset(pos)?;
                self.buf.read_str(abs).map(Some)
            },
            None => Ok(None),
        }
    }

    /// Read a byte-vector field as a raw span; `None` when omitted.
    ///
    /// Re-derived on every call, never cached.
    pub fn bytes_field(&self, field: FieldIndex) -> Result<Option<Cow<'a, [u8]>>> {
        match self.field_offset(field)? {
            Some(pos) => {
                let abs = self.buf.read_uoffset(pos)?;
                let (count, base) = crate::vector::read_vector_header(self.buf, abs, 1)?;
                self.buf.read_bytes(base, count).map(Some)
            },
            None => Ok(None),
        }
    }

    /// Read a nested-table field; `None` when omitted. The child view
    /// carries one unit less depth budget than this one.
    pub fn table_field(&self, field: FieldIndex) -> Result<Option<Table<'a>>> {
        let child = self.ctx.descend()?;
        match self.field_offset(field)? {
            Some(pos) => {
                let abs = self.buf.read_uoffset(pos)?;
                Ok(Some(Table::at(self.buf, abs).with_context(child)))
            },
            None => Ok(None),
        }
    }

    /// View a struct field inline at its fixed offset; `None` when omitted.
    /// Structs are never indirected.
    pub fn struct_field<'s>(
        &self,
        field: FieldIndex,
        layout: &'s StructLayout,
    ) -> Result<Option<StructView<'a, 's>>> {
        match self.field_offset(field)? {
            Some(pos) => StructView::new(self.buf, pos, layout).map(Some),
            None => Ok(None),
        }
    }

    /// Deserialize a vector field under the requested strategy; `None` when
    /// omitted. Spends one unit of this view's depth budget.
    pub fn vector<T: Element<'a> + Clone>(
        &self,
        field: FieldIndex,
        mode: ReadMode,
        field_ctx: SharedFieldContext,
    ) -> Result<Option<VectorOf<'a, T>>> {
        match self.field_offset(field)? {
            Some(pos) => {
                let child = self.ctx.descend()?;
                let abs = self.buf.read_uoffset(pos)?;
                VectorOf::deserialize(self.buf, abs, mode, child, field_ctx).map(Some)
            },
            None => Ok(None),
        }
    }

    /// Read a union field. `discriminator_field` and the following index
    /// hold the discriminator byte and the value offset; `None` when the
    /// discriminator is 0 or the field pair was omitted.
    pub fn union_field<U: UnionElement<'a>>(
        &self,
        discriminator_field: FieldIndex,
    ) -> Result<Option<U>> {
        let disc = self.scalar_or::<u8>(discriminator_field, 0)?;
        if disc == 0 {
            return Ok(None);
        }
        let value_field = discriminator_field.paired_value();
        let slot = self.field_offset(value_field)?.ok_or_else(|| {
            Error::InvalidData(format!(
                "union discriminator {disc} present but value field {} absent",
                value_field.0
            ))
        })?;
        let child = self.ctx.descend()?;
        U::read_union(disc, self.buf, slot, &child).map(Some)
    }

    /// Read a vector-of-unions field pair; `None` when both sibling vectors
    /// were omitted. One sibling present without the other marks the buffer
    /// corrupt.
    pub fn union_vector<U: UnionElement<'a>>(
        &self,
        discriminator_field: FieldIndex,
    ) -> Result<Option<UnionVector<'a, U>>> {
        let value_field = discriminator_field.paired_value();
        let disc_slot = self.field_offset(discriminator_field)?;
        let value_slot = self.field_offset(value_field)?;
        match (disc_slot, value_slot) {
            (None, None) => Ok(None),
            (Some(d), Some(v)) => {
                let child = self.ctx.descend()?;
                let disc_pos = self.buf.read_uoffset(d)?;
                let value_pos = self.buf.read_uoffset(v)?;
                UnionVector::new(self.buf, disc_pos, value_pos, child).map(Some)
            },
            _ => Err(Error::InvalidData(format!(
                "union vector fields {}/{} must be present together",
                discriminator_field.0, value_field.0
            ))),
        }
    }
}

/// Tables nested in vectors resolve through their slot's offset; each
/// construction spends one unit of depth budget.
impl<'a> Element<'a> for Table<'a> {
    #[inline]
    fn inline_size() -> usize {
        SIZE_UOFFSET
    }

    fn read_at(buf: Buffer<'a>, slot: usize, ctx: &ReadContext) -> Result<Self> {
        let child = ctx.descend()?;
        let abs = buf.read_uoffset(slot)?;
        Ok(Table::at(buf, abs).with_context(child))
    }
}

/// A decoded value plus has-value flag for one generated property, filled on
/// first read.
///
/// "Cached" accessor variants store one of these per property, trading
/// memory for skipping repeat vtable lookups; plain scalars are cheap to
/// re-derive and usually skip it.
#[derive(Debug, Default, Clone)]
pub struct FieldCache<T> {
    cell: OnceCell<T>,
}

impl<T> FieldCache<T> {
    /// An unfilled cache.
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// The cached value, if the first read already happened.
    #[inline]
    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    /// The cached value, decoding it with `decode` on first call.
    pub fn get_or_decode(&self, decode: impl FnOnce() -> Result<T>) -> Result<&T> {
        self.cell.get_or_try_init(decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::FieldContext;

    /// A hand-laid buffer: root table with field 0 = u32(7), field 1 absent.
    ///
    /// ```text
    /// 0:  root uoffset -> 12
    /// 4:  vtable: len=8, table_len=8, entry0=4, entry1=0
    /// 12: table: soffset=8, field0=7u32
    /// ```
    fn one_field_table() -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&12u32.to_le_bytes());
        data.extend_from_slice(&8u16.to_le_bytes());
        data.extend_from_slice(&8u16.to_le_bytes());
        data.extend_from_slice(&4u16.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&8i32.to_le_bytes());
        data.extend_from_slice(&7u32.to_le_bytes());
        data
    }

    #[test]
    fn test_present_and_absent_fields() {
        let data = one_field_table();
        let table = Table::from_root(Buffer::from_slice(&data)).unwrap();
        assert_eq!(table.scalar_or(FieldIndex(0), 0u32).unwrap(), 7);
        // Absent via zero entry: declared default comes back.
        assert_eq!(table.scalar_or(FieldIndex(1), 42u32).unwrap(), 42);
        // Absent via short vtable: same.
        assert_eq!(table.scalar_or(FieldIndex(9), 42u32).unwrap(), 42);
        assert_eq!(table.field_offset(FieldIndex(0)).unwrap(), Some(16));
        assert_eq!(table.field_offset(FieldIndex(1)).unwrap(), None);
    }

    #[test]
    fn test_write_through_scalar() {
        let mut data = one_field_table();
        let buf = Buffer::from_mut_slice(&mut data);
        let table = Table::from_root(buf).unwrap();
        table.set_scalar(FieldIndex(0), 1000u32).unwrap();
        assert_eq!(table.scalar_or(FieldIndex(0), 0u32).unwrap(), 1000);
        // A fresh view over the same bytes observes the write.
        let fresh = Table::from_root(buf).unwrap();
        assert_eq!(fresh.scalar_or(FieldIndex(0), 0u32).unwrap(), 1000);
    }

    #[test]
    fn test_write_through_absent_field_fails() {
        let mut data = one_field_table();
        let table = Table::from_root(Buffer::from_mut_slice(&mut data)).unwrap();
        assert!(matches!(
            table.set_scalar(FieldIndex(1), 5u32),
            Err(Error::NotMutable("cannot write through an absent field"))
        ));
    }

    #[test]
    fn test_write_through_read_only_buffer_fails() {
        let data = one_field_table();
        let table = Table::from_root(Buffer::from_slice(&data)).unwrap();
        assert!(matches!(
            table.set_scalar(FieldIndex(0), 5u32),
            Err(Error::NotMutable("buffer is read-only"))
        ));
    }

    #[test]
    fn test_malformed_vtable() {
        // soffset pulls the vtable position below zero.
        let mut data = one_field_table();
        data[12..16].copy_from_slice(&1000i32.to_le_bytes());
        let table = Table::from_root(Buffer::from_slice(&data)).unwrap();
        assert!(matches!(
            table.field_offset(FieldIndex(0)),
            Err(Error::InvalidData(_))
        ));

        // vtable length smaller than its own header.
        let mut data = one_field_table();
        data[4..6].copy_from_slice(&2u16.to_le_bytes());
        let table = Table::from_root(Buffer::from_slice(&data)).unwrap();
        assert!(matches!(
            table.field_offset(FieldIndex(0)),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn test_identifier_check() {
        // Root offset, identifier "PEAC", then the usual vtable/table,
        // shifted by 4.
        let mut data = Vec::new();
        data.extend_from_slice(&16u32.to_le_bytes());
        data.extend_from_slice(b"PEAC");
        data.extend_from_slice(&8u16.to_le_bytes());
        data.extend_from_slice(&8u16.to_le_bytes());
        data.extend_from_slice(&4u16.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&8i32.to_le_bytes());
        data.extend_from_slice(&7u32.to_le_bytes());
        let buf = Buffer::from_slice(&data);
        let table = Table::from_root_with_identifier(buf, b"PEAC").unwrap();
        assert_eq!(table.scalar_or(FieldIndex(0), 0u32).unwrap(), 7);
        assert!(matches!(
            Table::from_root_with_identifier(buf, b"NOPE"),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn test_nested_chain_exhausts_depth_budget() {
        use crate::builder::Builder;

        let mut b = Builder::new();
        b.start_table().unwrap();
        b.push_slot_scalar(FieldIndex(0), 1u8, 0);
        let mut inner = b.end_table().unwrap();
        for _ in 0..9 {
            b.start_table().unwrap();
            b.push_slot_offset(FieldIndex(0), inner);
            inner = b.end_table().unwrap();
        }
        let bytes = b.finish(inner);

        let root = Table::from_root(Buffer::from_slice(&bytes))
            .unwrap()
            .with_context(ReadContext::with_depth_limit(4));
        let mut table = root;
        let mut depth = 0;
        let err = loop {
            match table.table_field(FieldIndex(0)) {
                Ok(Some(next)) => {
                    table = next;
                    depth += 1;
                },
                Ok(None) => panic!("chain ended before the budget"),
                Err(e) => break e,
            }
        };
        // Each level handed its child one unit less; the budget runs out
        // long before the ten-deep chain does.
        assert_eq!(depth, 4);
        assert!(matches!(err, Error::DepthLimitExceeded { max: 4 }));
        // The root view itself still has its full budget.
        assert!(root.table_field(FieldIndex(0)).is_ok());
    }

    #[test]
    fn test_field_cache() {
        let data = one_field_table();
        let table = Table::from_root(Buffer::from_slice(&data)).unwrap();
        let cache: FieldCache<u32> = FieldCache::new();
        let mut decodes = 0;
        for _ in 0..3 {
            let v = cache
                .get_or_decode(|| {
                    decodes += 1;
                    table.scalar_or(FieldIndex(0), 0u32)
                })
                .unwrap();
            assert_eq!(*v, 7);
        }
        assert_eq!(decodes, 1);
        assert_eq!(cache.get(), Some(&7));
    }
}
