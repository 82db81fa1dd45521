//! Trellis: an incremental tree reconciler with prioritized, interruptible
//! rendering.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Trellis sub-crates. For most users, adding `trellis` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use trellis::prelude::*;
//!
//! // A host that keeps a flat log of what it was asked to do.
//! #[derive(Default)]
//! struct LogHost {
//!     next: u64,
//!     log: Vec<String>,
//! }
//!
//! impl LogHost {
//!     fn handle(&mut self) -> HostHandle {
//!         self.next += 1;
//!         HostHandle(self.next)
//!     }
//! }
//!
//! impl HostConfig for LogHost {
//!     fn create_instance(&mut self, _: &str, _: &Props) -> Result<HostHandle, HostError> {
//!         Ok(self.handle())
//!     }
//!     fn create_text_instance(&mut self, _: &str) -> Result<HostHandle, HostError> {
//!         Ok(self.handle())
//!     }
//!     // Detached subtrees are not logged; only live mutations are.
//!     fn append_initial_child(&mut self, _: HostHandle, _: HostHandle) -> Result<(), HostError> {
//!         Ok(())
//!     }
//!     fn append_child(&mut self, parent: HostHandle, child: HostHandle) -> Result<(), HostError> {
//!         self.log.push(format!("append {child} to {parent}"));
//!         Ok(())
//!     }
//!     fn insert_before(
//!         &mut self,
//!         parent: HostHandle,
//!         child: HostHandle,
//!         before: HostHandle,
//!     ) -> Result<(), HostError> {
//!         self.log.push(format!("insert {child} before {before} in {parent}"));
//!         Ok(())
//!     }
//!     fn remove_child(&mut self, parent: HostHandle, child: HostHandle) -> Result<(), HostError> {
//!         self.log.push(format!("remove {child} from {parent}"));
//!         Ok(())
//!     }
//!     fn commit_update(
//!         &mut self,
//!         instance: HostHandle,
//!         payload: &UpdatePayload,
//!         _: &str,
//!         _: &Props,
//!         _: &Props,
//!     ) -> Result<(), HostError> {
//!         self.log.push(format!("update {instance} ({} changes)", payload.len()));
//!         Ok(())
//!     }
//!     fn commit_text_update(&mut self, instance: HostHandle, _: &str, new: &str) -> Result<(), HostError> {
//!         self.log.push(format!("text {instance} = {new}"));
//!         Ok(())
//!     }
//! }
//!
//! // A scheduler that never asks the reconciler to yield.
//! #[derive(Default)]
//! struct Eager(u64);
//!
//! impl Scheduler for Eager {
//!     fn now_ms(&self) -> u64 { 0 }
//!     fn should_yield(&mut self) -> bool { false }
//!     fn schedule_callback(&mut self, _: PriorityLevel, _: Option<u64>) -> TaskId {
//!         self.0 += 1;
//!         TaskId(self.0)
//!     }
//!     fn cancel_callback(&mut self, _: TaskId) {}
//! }
//!
//! let mut rec = Reconciler::new(LogHost::default(), Eager::default(), ReconcilerConfig::default())
//!     .unwrap();
//! let root = rec.create_root(HostHandle(0), RootOptions::LEGACY).unwrap();
//!
//! let list = |keys: &[&str]| -> Node {
//!     Element::host("ul")
//!         .children(keys.iter().map(|k| Element::host("li").key(*k).text(*k)))
//!         .into()
//! };
//! rec.schedule_update(root, list(&["a", "b", "c"]), None).unwrap();
//! assert_eq!(rec.host().log.len(), 1);
//!
//! // Moving "a" to the end moves one host node and creates nothing.
//! rec.host_mut().log.clear();
//! rec.schedule_update(root, list(&["b", "c", "a"]), None).unwrap();
//! assert_eq!(rec.last_metrics().unwrap().placements, 1);
//! assert_eq!(rec.last_metrics().unwrap().fibers_created, 0);
//! assert_eq!(rec.host().log.len(), 1);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `trellis-core` | IDs, expiration times, elements, updates, host traits |
//! | [`arena`] | `trellis-arena` | Double-buffered fiber storage |
//! | [`engine`] | `trellis-engine` | The reconciler, its configuration, errors, and inspection views |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types and traits (`trellis-core`).
///
/// Contains element descriptions, state updates, expiration times, effect
/// tags, and the two traits an embedder implements:
/// [`types::HostConfig`] and [`types::Scheduler`].
pub use trellis_core as types;

/// Fiber storage (`trellis-arena`).
///
/// Most users never touch this directly; [`arena::FiberArena`] is owned by
/// the reconciler.
pub use trellis_arena as arena;

/// The reconciliation engine (`trellis-engine`).
///
/// [`engine::Reconciler`] drives rendering and commits; [`engine::TreeSnapshot`]
/// and [`engine::EffectSummary`] expose read-only views for tests and tooling.
pub use trellis_engine as engine;

/// Common imports for typical Trellis usage.
///
/// ```rust
/// use trellis::prelude::*;
/// ```
///
/// This imports the element builders, the host and scheduler traits and
/// the types their methods use, state updates, and the reconciler with its
/// configuration and errors.
pub mod prelude {
    // Elements
    pub use trellis_core::{
        value_map, Callback, Component, Element, ElementBuilder, Key, Node, Props, RefCallback,
        RenderContext, Value, ValueMap,
    };

    // Host and scheduler seams
    pub use trellis_core::{
        HostConfig, HostError, HostHandle, PriorityLevel, Scheduler, TaskId, UpdatePayload,
    };

    // State
    pub use trellis_core::{ComponentError, ExpirationTime, InstanceId, RootId, Update};

    // Engine
    pub use trellis_engine::{
        ReconcileError, Reconciler, ReconcilerConfig, RootOptions, UpdateSender, WorkStatus,
    };
}
