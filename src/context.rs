//! Per-deserialization context threaded through every nested construction.
//!
//! Two small records travel alongside the buffer: [`ReadContext`] carries the
//! remaining nesting budget, and [`FieldContext`] carries per-field facts the
//! elements of one vector share. Both are explicit parameters rather than
//! process-wide state, so concurrent deserializations never interfere.

use std::sync::Arc;

use bitflags::bitflags;

use crate::error::{Error, Result};

/// Default nesting budget per root deserialize call.
pub const DEFAULT_DEPTH_LIMIT: u32 = 64;

/// A decrementing depth budget guarding against unbounded nested descent.
///
/// The budget starts at a configured maximum and loses one unit on every
/// descent into a nested table, struct-vector, or vector-of-tables.
/// Exhaustion is a fatal, user-visible [`Error::DepthLimitExceeded`], never a
/// stack overflow. The context is `Copy`; restoring the budget after a nested
/// call is by-value and automatic.
///
/// # Examples
///
/// ```
/// use flatpeach::context::ReadContext;
///
/// let ctx = ReadContext::with_depth_limit(2);
/// let one = ctx.descend().unwrap();
/// let zero = one.descend().unwrap();
/// assert!(zero.descend().is_err());
/// // The original context is unaffected by descents below it.
/// assert!(ctx.descend().is_ok());
/// ```
#[derive(Clone, Copy, Debug)]
pub struct ReadContext {
    depth_remaining: u32,
    depth_limit: u32,
}

impl ReadContext {
    /// Context with the default nesting budget.
    #[inline]
    pub fn new() -> Self {
        Self::with_depth_limit(DEFAULT_DEPTH_LIMIT)
    }

    /// Context with an explicit nesting budget.
    #[inline]
    pub fn with_depth_limit(limit: u32) -> Self {
        Self {
            depth_remaining: limit,
            depth_limit: limit,
        }
    }

    /// Remaining budget.
    #[inline]
    pub fn depth_remaining(&self) -> u32 {
        self.depth_remaining
    }

    /// A child context with one unit of budget spent, or
    /// [`Error::DepthLimitExceeded`] if none remains.
    ///
    /// Called before every nested table/vector/union construction.
    #[inline]
    pub fn descend(&self) -> Result<Self> {
        if self.depth_remaining == 0 {
            return Err(Error::DepthLimitExceeded {
                max: self.depth_limit,
            });
        }
        Ok(Self {
            depth_remaining: self.depth_remaining - 1,
            depth_limit: self.depth_limit,
        })
    }
}

impl Default for ReadContext {
    fn default() -> Self {
        Self::new()
    }
}

bitflags! {
    /// Per-field capability flags declared by the schema compiler.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FieldFlags: u8 {
        /// Write-through mutation of the backing buffer is permitted for
        /// this field.
        const WRITE_THROUGH = 1 << 0;
        /// The field is a vector kept sorted by its key; carried for
        /// generated code, not interpreted by the engine.
        const SORTED = 1 << 1;
    }
}

/// Immutable-after-construction facts about one table field, shared by
/// reference across all elements a vector strategy materializes for it.
#[derive(Debug, Clone)]
pub struct FieldContext {
    flags: FieldFlags,
}

impl FieldContext {
    /// A field context with the given capability flags.
    #[inline]
    pub const fn new(flags: FieldFlags) -> Self {
        Self { flags }
    }

    /// A field context permitting write-through mutation.
    #[inline]
    pub fn write_through() -> SharedFieldContext {
        Arc::new(Self::new(FieldFlags::WRITE_THROUGH))
    }

    /// A field context permitting nothing beyond plain reads.
    #[inline]
    pub fn read_only() -> SharedFieldContext {
        Arc::new(Self::new(FieldFlags::empty()))
    }

    /// The raw capability flags.
    #[inline]
    pub fn flags(&self) -> FieldFlags {
        self.flags
    }

    /// Whether write-through mutation is permitted for this field.
    #[inline]
    pub fn write_through_enabled(&self) -> bool {
        self.flags.contains(FieldFlags::WRITE_THROUGH)
    }
}

impl Default for FieldContext {
    fn default() -> Self {
        Self::new(FieldFlags::empty())
    }
}

/// The shared handle one vector instance hands to each of its elements.
pub type SharedFieldContext = Arc<FieldContext>;
