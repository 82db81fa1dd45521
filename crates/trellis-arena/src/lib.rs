//! Generational, double-buffered fiber storage for Trellis.
//!
//! Every logical tree node owns one slot in a [`FiberArena`]. A slot
//! holds two fiber buffers, so the committed ("current") tree and the
//! tree being built ("work in progress") live side by side without
//! copying whole subtrees:
//!
//! ```text
//! FiberArena
//! ├── Slot × N (free list for reuse, generation bumped on free)
//! │   ├── generation
//! │   └── buffers: [Option<Fiber>; 2]   (Side::A, Side::B)
//! └── ArenaStats (slot/buffer allocation counters)
//! ```
//!
//! A [`FiberRef`] names one buffer of one slot. The alternate of a fiber
//! is the same slot on the other side, so pairing is structural: a fiber
//! and its alternate can never disagree about who they belong to.
//!
//! Stale references (a slot freed and reused since the reference was
//! taken) are rejected with [`ArenaError::StaleInstance`] rather than
//! silently resolving to the new occupant.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod arena;
pub mod config;
pub mod error;
pub mod fiber;
pub mod handle;

pub use arena::{ArenaStats, FiberArena};
pub use config::ArenaConfig;
pub use error::ArenaError;
pub use fiber::{Fiber, StateNode};
pub use handle::{FiberRef, Side};
