// system-tests/src/lib.rs
// ============================================================================
// Module: Grafton System Tests Library
// Description: Shared configuration for end-to-end acceptance runs.
// Purpose: Give the system-test binaries one place to read their settings.
// Dependencies: grafton-core
// ============================================================================

//! ## Overview
//! This crate hosts the configuration used by the system-test binaries in
//! `system-tests/tests`. The binaries start a stub provider, the fake
//! connector, and a full acceptance run in one process.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
