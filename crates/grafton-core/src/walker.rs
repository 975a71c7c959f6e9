// crates/grafton-core/src/walker.rs
// ============================================================================
// Module: Graph Walker
// Description: Depth-first, pre-order traversal over the feature graph.
// Purpose: Drive a visitor over entry and teardown nodes in execution order.
// Dependencies: crate::{graph, feature, error}
// ============================================================================

//! ## Overview
//! [`walk`] traverses a [`Graph`] with an explicit deque seeded with the root's
//! children. Excluded features are skipped together with their subtree. After a
//! visit, a node's children are spliced onto the front of the deque when the
//! visit passed, or unconditionally when `descend_on_failure` is set (used by
//! validation, which must see every declared feature).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::VecDeque;

use crate::error::HarnessError;
use crate::feature::Feature;
use crate::graph::Graph;
use crate::graph::RunState;
use crate::identifiers::FeatureLabel;

// ============================================================================
// SECTION: Walk
// ============================================================================

/// Walks `graph`, calling `visit` for each non-excluded node.
///
/// The visitor receives the node's feature and its mutable run state. A
/// visitor returning `Ok(false)` marks the feature failed.
///
/// Returns `Ok(true)` when every visit passed.
///
/// # Errors
///
/// Returns the first [`HarnessError`] raised by `visit`; the walk stops there.
pub fn walk<C, V>(
    graph: &mut Graph<'_, C>,
    exclude: &[FeatureLabel],
    descend_on_failure: bool,
    mut visit: V,
) -> Result<bool, HarnessError>
where
    V: FnMut(&Feature<C>, &mut RunState) -> Result<bool, HarnessError>,
{
    let mut stack: VecDeque<_> = graph.roots().iter().copied().collect();
    let mut all_passed = true;

    while let Some(index) = stack.pop_front() {
        let feature_index = graph.node(index).feature();
        let feature = graph.feature(feature_index);
        if exclude.contains(feature.label()) {
            continue;
        }

        let state = graph.state_mut(feature_index);
        let ok = visit(feature, state)?;
        if !ok {
            state.failed = true;
            all_passed = false;
        }

        if ok || descend_on_failure {
            for child in graph.node(index).children().iter().rev() {
                stack.push_front(*child);
            }
        }
    }

    Ok(all_passed)
}
