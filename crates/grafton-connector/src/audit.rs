// crates/grafton-connector/src/audit.rs
// ============================================================================
// Module: Connector Audit Logging
// Description: Structured audit events for connector request handling.
// Purpose: Emit JSON-line server events without a logging framework.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Handlers report grant decisions, callback resolutions, and rejected
//! bearers as [`ConnectorAuditEvent`]s. Sinks decide where the JSON lines go;
//! secrets and bearer values are never recorded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Events
// ============================================================================

/// Connector audit event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectorAuditEvent {
    /// Event identifier, e.g. `token_issued`.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Route template that handled the request.
    pub route: &'static str,
    /// Grant type for token events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grant_type: Option<String>,
    /// Object the request addressed, when any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Error type or callback state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ConnectorAuditEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(event: &'static str, route: &'static str) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).map(|elapsed| elapsed.as_millis()).unwrap_or(0);
        Self {
            event,
            timestamp_ms,
            route,
            grant_type: None,
            subject: None,
            detail: None,
        }
    }

    /// Sets the grant type.
    #[must_use]
    pub fn with_grant_type(mut self, grant_type: impl Into<String>) -> Self {
        self.grant_type = Some(grant_type.into());
        self
    }

    /// Sets the addressed object.
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Sets the detail label.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for connector events.
pub trait ConnectorAuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: &ConnectorAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl ConnectorAuditSink for StderrAuditSink {
    fn record(&self, event: &ConnectorAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that appends JSON lines to a file.
pub struct FileAuditSink {
    /// Append-only file handle.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens `path` for appending, creating it when missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl ConnectorAuditSink for FileAuditSink {
    fn record(&self, event: &ConnectorAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// Sink that drops every event.
pub struct NoopAuditSink;

impl ConnectorAuditSink for NoopAuditSink {
    fn record(&self, _event: &ConnectorAuditEvent) {}
}

// ============================================================================
// SECTION: Tests
// ============================================================================
