// crates/grafton-connector/src/callbacks.rs
// ============================================================================
// Module: Callback Registry
// Description: Actor that owns every in-flight callback and its transitions.
// Purpose: Serialize callback state changes without shared mutable records.
// Dependencies: grafton-core, tokio
// ============================================================================

//! ## Overview
//! A single owner thread holds the callback table and applies commands sent
//! over a channel. Handles are cheap clones; sync callers (test bodies) and
//! async callers (HTTP handlers) talk to the same owner.
//!
//! Resolution rules:
//! - `pending` callbacks take the incoming state, message, and credentials,
//!   and are published on the notification channel.
//! - Resolved callbacks accept an identical replay as success and reject any
//!   other content with [`CallbackError::AlreadyResolved`].
//!
//! The notification channel is unbounded so a resolving handler never blocks
//! on publish.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::mpsc;
use std::thread;

use grafton_core::IdKind;
use grafton_core::ObjectId;
use tokio::sync::mpsc as command;
use tokio::sync::oneshot;

use crate::error::CallbackError;
use crate::types::Callback;
use crate::types::CallbackRequest;
use crate::types::CallbackState;
use crate::types::CallbackType;

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Requests processed by the owner thread.
enum Command {
    /// Register a new pending callback.
    Add {
        /// Operation kind.
        kind: CallbackType,
        /// Reply slot.
        reply: oneshot::Sender<Callback>,
    },
    /// Look up a callback snapshot.
    Get {
        /// Callback id.
        id: ObjectId,
        /// Reply slot.
        reply: oneshot::Sender<Option<Callback>>,
    },
    /// Apply a provider resolution.
    Trigger {
        /// Callback id.
        id: ObjectId,
        /// Incoming resolution.
        resolution: CallbackRequest,
        /// Reply slot.
        reply: oneshot::Sender<Result<(), CallbackError>>,
    },
}

// ============================================================================
// SECTION: Registry Handle
// ============================================================================

/// Handle to the callback owner thread.
///
/// # Invariants
/// - A callback leaves `pending` at most once.
/// - Every transition out of `pending` is published exactly once.
#[derive(Clone)]
pub struct CallbackRegistry {
    /// Command channel into the owner.
    commands: command::UnboundedSender<Command>,
    /// Resolved callbacks, in resolution order.
    pub(crate) notifications: Arc<Mutex<mpsc::Receiver<Callback>>>,
}

impl CallbackRegistry {
    /// Spawns the owner thread and returns a handle to it.
    ///
    /// The owner exits once every handle has been dropped.
    #[must_use]
    pub fn spawn() -> Self {
        let (commands, inbox) = command::unbounded_channel();
        let (publisher, notifications) = mpsc::channel();
        thread::spawn(move || run_owner(inbox, &publisher));
        Self {
            commands,
            notifications: Arc::new(Mutex::new(notifications)),
        }
    }

    /// Registers a pending callback for an operation of `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`CallbackError::Unavailable`] if the owner has stopped.
    pub fn add(&self, kind: CallbackType) -> Result<Callback, CallbackError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Add {
            kind,
            reply,
        })?;
        response.blocking_recv().map_err(|_| CallbackError::Unavailable)
    }

    /// Returns a snapshot of callback `id`.
    ///
    /// # Errors
    ///
    /// Returns [`CallbackError::Unavailable`] if the owner has stopped.
    pub fn get(&self, id: ObjectId) -> Result<Option<Callback>, CallbackError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Get {
            id,
            reply,
        })?;
        response.blocking_recv().map_err(|_| CallbackError::Unavailable)
    }

    /// Async form of [`Self::get`] for request handlers.
    ///
    /// # Errors
    ///
    /// Returns [`CallbackError::Unavailable`] if the owner has stopped.
    pub async fn get_async(&self, id: ObjectId) -> Result<Option<Callback>, CallbackError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Get {
            id,
            reply,
        })?;
        response.await.map_err(|_| CallbackError::Unavailable)
    }

    /// Applies a provider resolution to callback `id`.
    ///
    /// # Errors
    ///
    /// Returns [`CallbackError::NotFound`] for unknown ids and
    /// [`CallbackError::AlreadyResolved`] for conflicting replays.
    pub fn trigger(&self, id: ObjectId, resolution: CallbackRequest) -> Result<(), CallbackError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Trigger {
            id,
            resolution,
            reply,
        })?;
        response.blocking_recv().map_err(|_| CallbackError::Unavailable)?
    }

    /// Async form of [`Self::trigger`] for request handlers.
    ///
    /// # Errors
    ///
    /// Same as [`Self::trigger`].
    pub async fn trigger_async(
        &self,
        id: ObjectId,
        resolution: CallbackRequest,
    ) -> Result<(), CallbackError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Trigger {
            id,
            resolution,
            reply,
        })?;
        response.await.map_err(|_| CallbackError::Unavailable)?
    }

    /// Queues a command for the owner.
    fn send(&self, command: Command) -> Result<(), CallbackError> {
        self.commands.send(command).map_err(|_| CallbackError::Unavailable)
    }
}

// ============================================================================
// SECTION: Owner
// ============================================================================

/// Owner loop; the table lives and dies with this thread.
fn run_owner(mut inbox: command::UnboundedReceiver<Command>, publisher: &mpsc::Sender<Callback>) {
    let mut table = CallbackTable::default();
    while let Some(command) = inbox.blocking_recv() {
        match command {
            Command::Add {
                kind,
                reply,
            } => {
                let _ = reply.send(table.add(kind));
            }
            Command::Get {
                id,
                reply,
            } => {
                let _ = reply.send(table.get(id).cloned());
            }
            Command::Trigger {
                id,
                resolution,
                reply,
            } => {
                let result = table.trigger(id, resolution).map(|published| {
                    if let Some(callback) = published {
                        let _ = publisher.send(callback);
                    }
                });
                let _ = reply.send(result);
            }
        }
    }
}

/// Append-only callback table.
#[derive(Default)]
struct CallbackTable {
    /// Callbacks in registration order.
    entries: Vec<Callback>,
}

impl CallbackTable {
    /// Appends a pending callback.
    fn add(&mut self, kind: CallbackType) -> Callback {
        let callback = Callback {
            id: ObjectId::generate(IdKind::Callback),
            kind,
            state: CallbackState::Pending,
            message: String::new(),
            credentials: BTreeMap::new(),
        };
        self.entries.push(callback.clone());
        callback
    }

    /// Finds a callback by id.
    fn get(&self, id: ObjectId) -> Option<&Callback> {
        self.entries.iter().find(|callback| callback.id == id)
    }

    /// Applies a resolution; returns the snapshot to publish, if any.
    fn trigger(
        &mut self,
        id: ObjectId,
        resolution: CallbackRequest,
    ) -> Result<Option<Callback>, CallbackError> {
        let callback = self
            .entries
            .iter_mut()
            .find(|callback| callback.id == id)
            .ok_or(CallbackError::NotFound(id))?;
        if callback.is_resolved() {
            return if same_resolution(callback, &resolution) {
                Ok(None)
            } else {
                Err(CallbackError::AlreadyResolved(id))
            };
        }
        callback.state = resolution.state;
        callback.message = resolution.message;
        callback.credentials.extend(resolution.credentials);
        Ok(Some(callback.clone()))
    }
}

/// Field-by-field comparison used for replay detection.
fn same_resolution(callback: &Callback, resolution: &CallbackRequest) -> bool {
    callback.state == resolution.state
        && callback.message == resolution.message
        && callback.credentials == resolution.credentials
}

// ============================================================================
// SECTION: Tests
// ============================================================================
