//! Core types and traits for the Trellis reconciliation engine.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by the rest of the workspace: identifiers,
//! expiration times, effect bitsets, element descriptions, state
//! updates, and the two host-facing traits ([`HostConfig`] and
//! [`Scheduler`]).

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod effect;
pub mod error;
pub mod expiration;
pub mod host;
pub mod id;
pub mod node;
pub mod scheduler;
pub mod tag;
pub mod update;
pub mod value;

pub use effect::EffectTag;
pub use error::{ComponentError, HostError};
pub use expiration::{ExpirationTime, PriorityLevel};
pub use host::{diff_properties, HostConfig, PropChange, UpdatePayload};
pub use id::{HostHandle, InstanceId, RootId, TaskId};
pub use node::{
    Callback, Component, Element, ElementBuilder, ElementType, Key, Node, Props, RefCallback,
    RenderContext,
};
pub use scheduler::Scheduler;
pub use tag::WorkTag;
pub use update::{ProcessedQueue, StatePayload, Update, UpdateQueue, UpdateTag};
pub use value::{value_map, Value, ValueMap};
