//! Incremental tree reconciliation engine for Trellis.
//!
//! Provides the [`Reconciler`], which turns element descriptions into a
//! fiber tree, diffs successive renders, and applies the minimal set of
//! host mutations. Rendering is split into units of work that can pause
//! between any two fibers, so urgent updates can interrupt long renders.
//!
//! ```text
//! schedule_update / enqueue_update / UpdateSender
//!         │
//!         ▼
//!   PriorityClock ──► ExpirationTime ──► Root pending range
//!         │
//!         ▼
//!   work loop: begin_work ─► child reconciler ─► complete_work
//!         │                 (effect list)
//!         ▼
//!   commit: mutation pass ─► swap current ─► layout pass
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod clock;
pub mod config;
pub mod error;
pub mod inbox;
pub mod inspect;
pub mod metrics;
pub mod reconciler;
pub mod root;

mod begin_work;
mod child_reconciler;
mod commit;
mod complete_work;
mod session;
mod update_queue;
mod work_loop;

pub use clock::PriorityClock;
pub use config::{ConfigError, ReconcilerConfig};
pub use error::{CommitError, ReconcileError, RenderError, ScheduleError};
pub use inbox::{InboxError, UpdateSender};
pub use inspect::{EffectRecord, EffectSummary, FiberView, TreeSnapshot};
pub use metrics::{ReconcilerTotals, RenderMetrics};
pub use reconciler::{Reconciler, WorkStatus};
pub use root::RootOptions;
