// crates/grafton-connector/src/rendezvous.rs
// ============================================================================
// Module: Callback Rendezvous
// Description: Blocking wait for a specific callback to resolve.
// Purpose: Pair a test body with the provider's out-of-band completion.
// Dependencies: grafton-core
// ============================================================================

//! ## Overview
//! [`CallbackRegistry::wait_for_callback`] is the only blocking point in a
//! test run. It drains the notification channel, discarding callbacks for
//! other ids and pending snapshots, until the awaited callback resolves or
//! the deadline passes. Cancellation is timeout-only; a timed-out callback
//! keeps its last state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::PoisonError;
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;
use std::time::Instant;

use grafton_core::ObjectId;

use crate::callbacks::CallbackRegistry;
use crate::error::CallbackError;
use crate::types::Callback;

// ============================================================================
// SECTION: Rendezvous
// ============================================================================

impl CallbackRegistry {
    /// Blocks until callback `id` resolves or `max_wait` elapses.
    ///
    /// A callback that resolved before the wait started is returned without
    /// blocking. The ceiling on `max_wait` is enforced by configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CallbackError::Timeout`] when the deadline passes,
    /// [`CallbackError::NotFound`] for ids never registered, and
    /// [`CallbackError::Unavailable`] when the owner has stopped.
    pub fn wait_for_callback(
        &self,
        id: ObjectId,
        max_wait: Duration,
    ) -> Result<Callback, CallbackError> {
        let started = Instant::now();
        let receiver = self.notifications.lock().unwrap_or_else(PoisonError::into_inner);
        match self.get(id)? {
            None => return Err(CallbackError::NotFound(id)),
            Some(callback) if callback.is_resolved() => return Ok(callback),
            Some(_) => {}
        }
        loop {
            let remaining = max_wait.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                return Err(timeout(id, started));
            }
            match receiver.recv_timeout(remaining) {
                Ok(callback) if callback.id == id && callback.is_resolved() => return Ok(callback),
                Ok(_) => {}
                Err(RecvTimeoutError::Timeout) => return Err(timeout(id, started)),
                Err(RecvTimeoutError::Disconnected) => return Err(CallbackError::Unavailable),
            }
        }
    }
}

/// Builds the timeout error for a wait that began at `started`.
fn timeout(id: ObjectId, started: Instant) -> CallbackError {
    CallbackError::Timeout {
        id,
        waited: started.elapsed(),
    }
}
