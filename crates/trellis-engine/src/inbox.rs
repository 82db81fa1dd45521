//! Cross-thread update inbox.
//!
//! The reconciler is single-threaded. Other threads (and commit
//! callbacks, which cannot borrow the reconciler) submit updates through
//! a cloneable [`UpdateSender`] over a bounded crossbeam channel. The
//! reconciler drains the channel at the start of every
//! `perform_sync_work` / `perform_async_work` call and after each commit.
//!
//! ```text
//!   any thread                      reconciler thread
//!   ----------                      -----------------
//!   sender.schedule_update() --->   [bounded(N)] ---> drain_inbox()
//!   sender.enqueue()         --->                      -> enqueue + schedule
//! ```

use std::error::Error;
use std::fmt;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use trellis_core::{InstanceId, Node, PriorityLevel, RootId, Update};

/// A message waiting to be applied by the reconciler.
pub(crate) enum InboxMessage {
    Root {
        root: RootId,
        element: Node,
        priority: PriorityLevel,
    },
    Instance {
        instance: InstanceId,
        update: Update,
        priority: PriorityLevel,
    },
}

/// Why an update could not be submitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboxError {
    /// The inbox is at capacity; retry after the reconciler drains it.
    Full,
    /// The reconciler has been dropped.
    Disconnected,
}

impl fmt::Display for InboxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "update inbox is full"),
            Self::Disconnected => write!(f, "reconciler has shut down"),
        }
    }
}

impl Error for InboxError {}

/// Submits updates to a [`Reconciler`](crate::Reconciler) from anywhere.
///
/// Messages are applied the next time the reconciler performs work. A
/// target that has unmounted by then is skipped with a warning.
#[derive(Clone)]
pub struct UpdateSender {
    tx: Sender<InboxMessage>,
}

impl UpdateSender {
    /// Ask `root` to display `element`.
    pub fn schedule_update(
        &self,
        root: RootId,
        element: impl Into<Node>,
        priority: PriorityLevel,
    ) -> Result<(), InboxError> {
        self.send(InboxMessage::Root {
            root,
            element: element.into(),
            priority,
        })
    }

    /// Queue a state update on a stateful instance.
    pub fn enqueue(
        &self,
        instance: InstanceId,
        update: Update,
        priority: PriorityLevel,
    ) -> Result<(), InboxError> {
        self.send(InboxMessage::Instance {
            instance,
            update,
            priority,
        })
    }

    fn send(&self, message: InboxMessage) -> Result<(), InboxError> {
        self.tx.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => InboxError::Full,
            TrySendError::Disconnected(_) => InboxError::Disconnected,
        })
    }
}

impl fmt::Debug for UpdateSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateSender")
            .field("queued", &self.tx.len())
            .finish()
    }
}

pub(crate) struct Inbox {
    tx: Sender<InboxMessage>,
    rx: Receiver<InboxMessage>,
}

impl Inbox {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        Self { tx, rx }
    }

    pub(crate) fn sender(&self) -> UpdateSender {
        UpdateSender {
            tx: self.tx.clone(),
        }
    }

    /// Everything queued right now. Messages sent while the batch is
    /// being applied wait for the next drain.
    pub(crate) fn drain(&self) -> Vec<InboxMessage> {
        self.rx.try_iter().take(self.rx.len()).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.rx.len()
    }
}
