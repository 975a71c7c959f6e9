// crates/grafton-connector/src/capture.rs
// ============================================================================
// Module: Request Capture
// Description: Per-route recording of parsed inbound requests.
// Purpose: Let features assert on what a provider actually sent.
// Dependencies: grafton-core
// ============================================================================

//! ## Overview
//! Every token request (including rejected grant types) and every parsed
//! callback body is recorded under its route template, e.g.
//! `/v1/oauth/tokens` or `/v1/callbacks/{id}`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::PoisonError;

use grafton_core::ObjectId;

use crate::types::CallbackRequest;
use crate::types::TokenRequest;

// ============================================================================
// SECTION: Routes
// ============================================================================

/// Route template for token requests.
pub const TOKEN_ROUTE: &str = "/v1/oauth/tokens";
/// Route template for callback resolutions.
pub const CALLBACK_ROUTE: &str = "/v1/callbacks/{id}";

// ============================================================================
// SECTION: Capturer
// ============================================================================

/// One recorded request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapturedRequest {
    /// Token endpoint request.
    Token(TokenRequest),
    /// Callback resolution body.
    Callback {
        /// Addressed callback.
        id: ObjectId,
        /// Parsed body.
        request: CallbackRequest,
    },
}

/// Request recorder keyed by route template.
#[derive(Debug, Default)]
pub struct RequestCapturer {
    /// Captured requests per route.
    routes: Mutex<BTreeMap<&'static str, Vec<CapturedRequest>>>,
}

impl RequestCapturer {
    /// Creates an empty capturer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a request under `route`.
    pub fn capture(&self, route: &'static str, request: CapturedRequest) {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(route)
            .or_default()
            .push(request);
    }

    /// Returns everything captured under `route`.
    #[must_use]
    pub fn get(&self, route: &str) -> Vec<CapturedRequest> {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(route)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the captured token requests.
    #[must_use]
    pub fn token_requests(&self) -> Vec<TokenRequest> {
        self.get(TOKEN_ROUTE)
            .into_iter()
            .filter_map(|captured| match captured {
                CapturedRequest::Token(request) => Some(request),
                CapturedRequest::Callback { .. } => None,
            })
            .collect()
    }

    /// Forgets everything captured under `route`.
    pub fn clear(&self, route: &str) {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner).remove(route);
    }
}
