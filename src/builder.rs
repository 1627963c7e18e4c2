//! Serialization support: build buffers the runtime views can read.
//!
//! The wire format serializes children before parents, with relative offsets
//! pointing from later-written data to earlier-written data. The builder
//! therefore works back-to-front: bytes accumulate in reverse and a single
//! `reverse` at [`Builder::finish`] produces the logical buffer. A
//! [`WIPOffset`] identifies an already-written item by its distance from the
//! buffer's end, which keeps all offset arithmetic independent of the final
//! length.
//!
//! The builder is deliberately schema-free: callers (generated code, tests)
//! drive field indices and defaults explicitly, the same facts the reading
//! side's [`Table`] accessors consume.
//!
//! [`Table`]: crate::table::Table

use std::collections::HashMap;

use crate::buffer::Scalar;
use crate::error::{Error, Result};
use crate::layout::{SIZE_LENGTH_PREFIX, SIZE_SOFFSET, SIZE_UOFFSET, SIZE_VOFFSET, align_padding};
use crate::table::FieldIndex;

/// Position of a finished item within a buffer under construction, measured
/// from the buffer's end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WIPOffset(u32);

/// Back-to-front buffer writer with vtable deduplication.
///
/// # Examples
///
/// ```
/// use flatpeach::buffer::Buffer;
/// use flatpeach::builder::Builder;
/// use flatpeach::table::{FieldIndex, Table};
///
/// let mut b = Builder::new();
/// let name = b.create_string("peach");
/// b.start_table()?;
/// b.push_slot_scalar(FieldIndex(0), 7u32, 0);
/// b.push_slot_offset(FieldIndex(1), name);
/// let root = b.end_table()?;
/// let bytes = b.finish(root);
///
/// let table = Table::from_root(Buffer::from_slice(&bytes))?;
/// assert_eq!(table.scalar_or(FieldIndex(0), 0u32)?, 7);
/// assert_eq!(table.string(FieldIndex(1))?.unwrap(), "peach");
/// # Ok::<(), flatpeach::Error>(())
/// ```
#[derive(Debug)]
pub struct Builder {
    /// The buffer in reverse byte order; `rev.len()` is the end-distance of
    /// the most recently written byte.
    rev: Vec<u8>,
    /// Largest alignment requested so far; the finished buffer is padded to
    /// a multiple of it.
    min_align: usize,
    /// Field slots of the table under construction.
    slots: Vec<(FieldIndex, u32)>,
    /// End-distance of the table body's start, pinned when the first field
    /// slot is recorded.
    object_start: u32,
    nested: bool,
    /// Structural vtable deduplication: identical vtables are stored once.
    vtables: HashMap<Vec<u8>, u32>,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    /// An empty builder.
    pub fn new() -> Self {
        Self {
            rev: Vec::new(),
            min_align: 1,
            slots: Vec::new(),
            object_start: 0,
            nested: false,
            vtables: HashMap::new(),
        }
    }

    /// Current end-distance cursor.
    #[inline]
    fn cursor(&self) -> u32 {
        self.rev.len() as u32
    }

    /// Append logical bytes (they will appear in `bytes` order in the
    /// finished buffer, in front of everything written earlier).
    fn push_logical(&mut self, bytes: &[u8]) {
        self.rev.extend(bytes.iter().rev());
    }

    /// Pad so that the next `additional + n` bytes written end up with the
    /// first of them `align`-aligned from the buffer end, and track the
    /// buffer-wide alignment.
    fn prep(&mut self, align: usize, additional: usize) {
        self.min_align = self.min_align.max(align);
        let pad = align_padding(self.rev.len() + additional, align);
        for _ in 0..pad {
            self.rev.push(0);
        }
    }

    /// Write a relative offset pointing at `target` from the position the
    /// offset itself will occupy.
    fn push_uoffset_to(&mut self, target: WIPOffset) {
        let rel = self.cursor() + SIZE_UOFFSET as u32 - target.0;
        self.push_logical(&rel.to_le_bytes());
    }

    /// Overwrite the already-written 4 bytes whose end-distance is
    /// `end_distance` with `value`, little-endian.
    fn patch_i32(&mut self, end_distance: u32, value: i32) {
        let end = end_distance as usize;
        for (k, byte) in value.to_le_bytes().into_iter().enumerate() {
            self.rev[end - 1 - k] = byte;
        }
    }

    /// Write one aligned scalar and return its position.
    pub fn push_scalar<T: Scalar>(&mut self, value: T) -> WIPOffset {
        self.prep(T::SIZE, 0);
        let mut raw = [0u8; 8];
        value.copy_le(&mut raw);
        self.push_logical(&raw[..T::SIZE]);
        WIPOffset(self.cursor())
    }

    /// Write a length-prefixed UTF-8 string with its conventional trailing
    /// NUL and return its position.
    pub fn create_string(&mut self, value: &str) -> WIPOffset {
        self.prep(SIZE_LENGTH_PREFIX, value.len() + 1);
        self.push_logical(&[0]);
        self.push_logical(value.as_bytes());
        self.push_logical(&(value.len() as u32).to_le_bytes());
        WIPOffset(self.cursor())
    }

    /// Write a vector of scalars and return its position.
    pub fn create_vector<T: Scalar>(&mut self, values: &[T]) -> WIPOffset {
        let body = values.len() * T::SIZE;
        self.prep(SIZE_LENGTH_PREFIX, body);
        self.prep(T::SIZE, body);
        for value in values.iter().rev() {
            let mut raw = [0u8; 8];
            value.copy_le(&mut raw);
            self.push_logical(&raw[..T::SIZE]);
        }
        self.push_logical(&(values.len() as u32).to_le_bytes());
        WIPOffset(self.cursor())
    }

    /// Write a vector of relative offsets (strings, tables, nested vectors)
    /// and return its position.
    pub fn create_vector_of_offsets(&mut self, items: &[WIPOffset]) -> WIPOffset {
        let body = items.len() * SIZE_UOFFSET;
        self.prep(SIZE_LENGTH_PREFIX, body);
        for item in items.iter().rev() {
            self.push_uoffset_to(*item);
        }
        self.push_logical(&(items.len() as u32).to_le_bytes());
        WIPOffset(self.cursor())
    }

    /// Write a vector of fixed-stride inline elements (structs) from their
    /// concatenated logical bytes and return its position.
    ///
    /// `data.len()` must be a multiple of `stride`.
    pub fn create_vector_raw(&mut self, stride: usize, align: usize, data: &[u8]) -> Result<WIPOffset> {
        if stride == 0 || data.len() % stride != 0 {
            return Err(Error::InvalidData(format!(
                "raw vector of {} byte(s) is not a whole number of {stride}-byte elements",
                data.len()
            )));
        }
        self.prep(SIZE_LENGTH_PREFIX, data.len());
        self.prep(align, data.len());
        self.push_logical(data);
        self.push_logical(&((data.len() / stride) as u32).to_le_bytes());
        Ok(WIPOffset(self.cursor()))
    }

    /// Begin a table. Field slots are pushed between this call and
    /// [`end_table`](Self::end_table); tables do not nest inside one
    /// another (finish the inner table first and reference it by offset).
    pub fn start_table(&mut self) -> Result<()> {
        if self.nested {
            return Err(Error::InvalidData(
                "a table is already under construction".to_owned(),
            ));
        }
        self.nested = true;
        self.slots.clear();
        self.object_start = 0;
        Ok(())
    }

    /// Record a just-written field slot of `size` bytes. The first slot also
    /// pins the table's body start, measured after that slot's alignment
    /// padding so padding between objects never counts toward the table.
    fn record_slot(&mut self, field: FieldIndex, size: usize) {
        let slot_end = self.cursor();
        if self.slots.is_empty() {
            self.object_start = slot_end - size as u32;
        }
        self.slots.push((field, slot_end));
    }

    /// Write a scalar field slot, unless `value` equals the declared
    /// `default`: omitted fields take zero table bytes, and readers
    /// reconstruct them from the default.
    pub fn push_slot_scalar<T: Scalar>(&mut self, field: FieldIndex, value: T, default: T) {
        if value == default {
            return;
        }
        self.push_scalar(value);
        self.record_slot(field, T::SIZE);
    }

    /// Write an offset-valued field slot (string, vector, nested table).
    pub fn push_slot_offset(&mut self, field: FieldIndex, value: WIPOffset) {
        self.prep(SIZE_UOFFSET, 0);
        self.push_uoffset_to(value);
        self.record_slot(field, SIZE_UOFFSET);
    }

    /// Write a struct field slot inline from its logical bytes.
    pub fn push_slot_struct(&mut self, field: FieldIndex, data: &[u8], align: usize) {
        self.prep(align, 0);
        self.push_logical(data);
        self.record_slot(field, data.len());
    }

    /// Finish the table under construction: emit (or reuse) its vtable and
    /// return the table's position.
    pub fn end_table(&mut self) -> Result<WIPOffset> {
        if !self.nested {
            return Err(Error::InvalidData(
                "no table under construction".to_owned(),
            ));
        }
        self.nested = false;

        // The table starts with its soffset word; patched below once the
        // vtable position is known.
        self.prep(SIZE_SOFFSET, 0);
        self.push_logical(&[0; SIZE_SOFFSET]);
        let table_end = self.cursor();

        let slot_count = self
            .slots
            .iter()
            .map(|(field, _)| field.0 as usize + 1)
            .max()
            .unwrap_or(0);
        let vt_len = 2 * SIZE_VOFFSET + SIZE_VOFFSET * slot_count;
        let object_start = if self.slots.is_empty() {
            table_end - SIZE_SOFFSET as u32
        } else {
            self.object_start
        };
        let table_len = (table_end - object_start) as usize;
        // Vtable entries and the table length are u16 on the wire; a body
        // this large cannot be represented, only corrupted by truncation.
        if table_len > u16::MAX as usize {
            return Err(Error::InvalidData(format!(
                "table body of {table_len} byte(s) exceeds the 65535-byte limit"
            )));
        }

        let mut vtable = Vec::with_capacity(vt_len);
        vtable.extend_from_slice(&(vt_len as u16).to_le_bytes());
        vtable.extend_from_slice(&(table_len as u16).to_le_bytes());
        let mut entries = vec![0u16; slot_count];
        for (field, slot_end) in self.slots.drain(..) {
            entries[field.0 as usize] = (table_end - slot_end) as u16;
        }
        for entry in entries {
            vtable.extend_from_slice(&entry.to_le_bytes());
        }

        let vt_pos = match self.vtables.get(&vtable) {
            Some(&existing) => existing,
            None => {
                self.prep(SIZE_VOFFSET, 0);
                self.push_logical(&vtable);
                let pos = self.cursor();
                self.vtables.insert(vtable, pos);
                pos
            },
        };
        // Reused vtables sit at a higher logical address than the table, so
        // the back-reference can be negative.
        let soffset = i64::from(vt_pos) - i64::from(table_end);
        self.patch_i32(table_end, soffset as i32);
        Ok(WIPOffset(table_end))
    }

    /// Write the root offset and produce the finished buffer.
    pub fn finish(self, root: WIPOffset) -> Vec<u8> {
        self.finish_inner(root, None)
    }

    /// Like [`finish`](Self::finish), with a 4-byte file identifier after
    /// the root offset.
    pub fn finish_with_identifier(self, root: WIPOffset, identifier: &[u8; 4]) -> Vec<u8> {
        self.finish_inner(root, Some(identifier))
    }

    fn finish_inner(mut self, root: WIPOffset, identifier: Option<&[u8; 4]>) -> Vec<u8> {
        let header = SIZE_UOFFSET + identifier.map_or(0, |id| id.len());
        self.prep(self.min_align, header);
        if let Some(id) = identifier {
            self.push_logical(id);
        }
        self.push_uoffset_to(root);
        self.rev.reverse();
        self.rev
    }
}
