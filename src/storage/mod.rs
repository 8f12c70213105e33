//! # Storage Layer
//!
//! The two building blocks underneath the MMV encoder:
//!
//! - [`MappedRegion`]: a file-backed shared mapping of fixed size. The only
//!   platform-specific code in the crate lives behind it (via `memmap2`).
//!   Writes through the mapping are visible to any other process mapping
//!   the same file, which is the entire transport to the PCP MMV PMDA.
//! - [`RegionWriter`]: positioned little-endian writes of fixed-width
//!   primitives and fixed-size strings into a byte region, used by the
//!   serializer during the exclusive write phase.
//!
//! ## Safety model
//!
//! During serialization the region is exclusively borrowed (`&mut [u8]`)
//! and the borrow checker rules out aliasing, the same borrow-checked pager
//! discipline an mmap'd storage engine uses. Once the file is started, mutation narrows
//! to two shapes: 8-aligned `AtomicU64` payload stores, and per-metric
//! string-slot rewrites serialized by that metric's lock. The region is
//! never remapped or resized after creation, so raw pointers taken at map
//! time stay valid for the mapping's lifetime.

mod mmap;
mod writer;

pub use mmap::MappedRegion;
pub use writer::RegionWriter;
