// crates/grafton-core/src/lib.rs
// ============================================================================
// Module: Grafton Core
// Description: Feature DSL, graph builder, walker, and executor.
// Purpose: Turn declared provider features into an ordered, paired test run.
// Dependencies: rand, serde, thiserror
// ============================================================================

//! ## Overview
//! Grafton core is the deterministic half of the conformance harness. Test
//! authors declare [`Feature`]s with a default case, optional error cases, an
//! optional teardown, and ordering relationships; a [`FeatureRegistry`] holds
//! them; [`Graph`] places every feature as an entry/teardown pair; and the
//! executor walks the graph running bodies inside guarded blocks.
//!
//! Invariants:
//! - A feature `runs_inside` a parent executes and tears down strictly within
//!   the parent's window.
//! - A feature that `runs_before` a sibling runs and tears down ahead of it.
//! - Assertion failures stop only their guarded block; fatal errors stop the
//!   run.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod error;
pub mod executor;
pub mod feature;
pub mod graph;
pub mod identifiers;
pub mod outcome;
pub mod registry;
pub mod report;
pub mod validate;
pub mod walker;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use error::GraphError;
pub use error::HarnessError;
pub use error::UnattachedFeature;
pub use executor::RunOptions;
pub use executor::RunSummary;
pub use feature::Feature;
pub use graph::Graph;
pub use graph::RunState;
pub use identifiers::FeatureLabel;
pub use identifiers::IdError;
pub use identifiers::IdKind;
pub use identifiers::ObjectId;
pub use outcome::CaseResult;
pub use outcome::Failure;
pub use outcome::Outcome;
pub use registry::FeatureRegistry;
pub use report::LogLevel;
pub use report::MemorySink;
pub use report::Reporter;
pub use validate::ValidationError;
pub use walker::walk;
