// system-tests/tests/helpers/mod.rs
// ============================================================================
// Module: System Test Helpers
// Description: Shared helpers for Grafton system-tests.
// Purpose: Provide the stub provider and the run harness around it.
// Dependencies: system-tests, grafton-acceptance, grafton-connector
// ============================================================================

//! ## Overview
//! Shared helpers for Grafton system-tests. Each run gets its own connector,
//! stub provider, and master key, all bound to loopback ports chosen by the
//! OS.

#![allow(dead_code, reason = "Shared helpers are reused across multiple test suites.")]

pub mod harness;
pub mod provider_stub;
