//! Flatpeach - A Rust runtime for reading and writing flat binary tables
//!
//! This library decodes the vtable-based flat wire format directly from byte
//! buffers, without an intermediate parse tree. All reads resolve offsets on
//! demand against the original bytes.
//!
//! # Features
//!
//! - **Zero-copy reads**: Tables, strings, and vectors are views over the
//!   buffer; nothing is decoded until asked for
//! - **Six vector strategies**: From fully lazy re-parsing to fully greedy
//!   materialization, with per-slot and per-chunk caching in between
//! - **Write-through mutation**: Fixed-size fields and vector elements can be
//!   updated in place when the buffer and field allow it
//! - **Union decoding**: Single values and lockstep discriminator/offset
//!   vector pairs
//! - **Object pooling**: Reusable decoded containers with idempotent return
//! - **Depth limiting**: Nested table and vector traversal is bounded, so
//!   adversarial buffers cannot overflow the stack
//! - **Schema-free builder**: Construct buffers the readers accept, with
//!   vtable deduplication
//!
//! # Example - Building and reading a table
//!
//! ```
//! use flatpeach::buffer::Buffer;
//! use flatpeach::builder::Builder;
//! use flatpeach::table::{FieldIndex, Table};
//!
//! # fn main() -> Result<(), flatpeach::Error> {
//! let mut builder = Builder::new();
//! let name = builder.create_string("peach");
//! builder.start_table()?;
//! builder.push_slot_scalar(FieldIndex(0), 3u32, 0);
//! builder.push_slot_offset(FieldIndex(1), name);
//! let root = builder.end_table()?;
//! let bytes = builder.finish(root);
//!
//! let table = Table::from_root(Buffer::from_slice(&bytes))?;
//! assert_eq!(table.scalar_or(FieldIndex(0), 0u32)?, 3);
//! assert_eq!(table.string(FieldIndex(1))?.unwrap(), "peach");
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Reading a vector lazily
//!
//! ```
//! use flatpeach::buffer::Buffer;
//! use flatpeach::builder::Builder;
//! use flatpeach::context::{FieldContext, ReadContext};
//! use flatpeach::vector::{ReadMode, VectorOf};
//!
//! # fn main() -> Result<(), flatpeach::Error> {
//! let mut builder = Builder::new();
//! let vec = builder.create_vector(&[10u32, 20, 30]);
//! let bytes = builder.finish(vec);
//!
//! let buf = Buffer::from_slice(&bytes);
//! let pos = buf.read_uoffset(0)?;
//! let vec: VectorOf<'_, u32> = VectorOf::deserialize(
//!     buf,
//!     pos,
//!     ReadMode::Lazy,
//!     ReadContext::new(),
//!     FieldContext::read_only(),
//! )?;
//! assert_eq!(vec.count(), 3);
//! assert_eq!(vec.get(1)?, 20);
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Mutating in place
//!
//! ```
//! use flatpeach::buffer::Buffer;
//! use flatpeach::builder::Builder;
//! use flatpeach::table::{FieldIndex, Table};
//!
//! # fn main() -> Result<(), flatpeach::Error> {
//! let mut builder = Builder::new();
//! builder.start_table()?;
//! builder.push_slot_scalar(FieldIndex(0), 1u16, 0);
//! let root = builder.end_table()?;
//! let mut bytes = builder.finish(root);
//!
//! let table = Table::from_root(Buffer::from_mut_slice(&mut bytes))?;
//! table.set_scalar(FieldIndex(0), 2u16)?;
//! assert_eq!(table.scalar_or(FieldIndex(0), 0u16)?, 2);
//! # Ok(())
//! # }
//! ```

/// Byte buffer abstraction: bounds-checked little-endian scalar and string
/// access over read-only or mutable backing storage.
pub mod buffer;

/// Back-to-front buffer construction with vtable deduplication.
pub mod builder;

/// Read-time knobs: recursion depth budget and per-field access policy.
pub mod context;

/// Unified error type for every fallible operation in the crate.
pub mod error;

/// Wire-format size constants and alignment arithmetic.
pub mod layout;

/// Thread-safe object pool for reusing decoded containers.
pub mod pool;

/// Inline struct layout computation and field access.
pub mod structs;

/// Table views: vtable resolution and typed field accessors.
pub mod table;

/// Union values and lockstep union vectors.
pub mod union;

/// The vector strategy family, from fully lazy to fully greedy.
pub mod vector;

// Re-export commonly used types for convenience
pub use buffer::{Buffer, Scalar};
pub use builder::{Builder, WIPOffset};
pub use context::{FieldContext, FieldFlags, ReadContext, SharedFieldContext};
pub use error::{Error, Result};
pub use pool::{ObjectPool, PoolElement, PoolHandle, Poolable};
pub use structs::{MemberLayout, StructLayout, StructView};
pub use table::{FieldCache, FieldIndex, Table};
pub use union::{UnionElement, UnionVector};
pub use vector::{
    CachedVector, CachedVectorMut, Element, GreedyVector, GreedyVectorMut, Inline, LazyVector,
    ProgressiveVector, ReadMode, StructDecode, VectorOf, VectorStrategy,
};
