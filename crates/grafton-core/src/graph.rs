// crates/grafton-core/src/graph.rs
// ============================================================================
// Module: Feature Graph
// Description: Arena-backed execution tree built from feature declarations.
// Purpose: Place every feature as an entry/teardown pair under its parent.
// Dependencies: crate::{feature, registry, error}
// ============================================================================

//! ## Overview
//! [`Graph::build`] turns a flat [`FeatureRegistry`] into a rooted tree held in
//! a flat node arena. Each placed feature contributes two sibling nodes: an
//! entry node and a teardown node. Features declared `runs_inside` a parent are
//! attached only beneath that parent. Siblings keep registration order except
//! where a `runs_before` declaration moves a feature's pair ahead of the
//! sibling it names. Each entry node is immediately followed by its teardown
//! node among siblings.
//!
//! Invariants:
//! - Every node index stored in the arena is in bounds.
//! - Per-feature run state is indexed by registration position.
//! - A feature that no parent claims is a [`GraphError::Unattached`] error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use crate::error::GraphError;
use crate::error::UnattachedFeature;
use crate::feature::Feature;
use crate::registry::FeatureRegistry;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Index of a node in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(usize);

/// Index of a feature in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureIndex(usize);

impl FeatureIndex {
    /// Returns the registration position.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }
}

/// A position in the execution tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Feature bound to this node.
    feature: FeatureIndex,
    /// True for the teardown half of the pair.
    is_teardown: bool,
    /// Ordered child nodes; always empty for teardown nodes.
    children: Vec<NodeIndex>,
}

impl Node {
    /// Returns the bound feature index.
    #[must_use]
    pub const fn feature(&self) -> FeatureIndex {
        self.feature
    }

    /// Returns true for teardown nodes.
    #[must_use]
    pub const fn is_teardown(&self) -> bool {
        self.is_teardown
    }

    /// Returns the ordered children.
    #[must_use]
    pub fn children(&self) -> &[NodeIndex] {
        &self.children
    }
}

/// Mutable per-feature state for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunState {
    /// Set once the entry node has been visited.
    pub has_run: bool,
    /// Set when a visit for this feature reported failure.
    pub failed: bool,
}

/// Execution tree over a borrowed feature registry.
pub struct Graph<'a, C> {
    /// Registered features, indexed by [`FeatureIndex`].
    features: &'a [Feature<C>],
    /// Node arena.
    nodes: Vec<Node>,
    /// Ordered children of the implicit root.
    roots: Vec<NodeIndex>,
    /// Run state, indexed by [`FeatureIndex`].
    state: Vec<RunState>,
}

// ============================================================================
// SECTION: Construction
// ============================================================================

impl<'a, C> Graph<'a, C> {
    /// Builds a fresh execution tree for `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DuplicateLabel`] when two features share a label
    /// and [`GraphError::Unattached`] when any feature names a parent that is
    /// never placed in the tree.
    pub fn build(registry: &'a FeatureRegistry<C>) -> Result<Self, GraphError> {
        let features = registry.features();
        let mut seen = BTreeSet::new();
        for feature in features {
            if !seen.insert(feature.label()) {
                return Err(GraphError::DuplicateLabel(feature.label().clone()));
            }
        }

        let mut graph = Self {
            features,
            nodes: Vec::with_capacity(features.len() * 2),
            roots: Vec::new(),
            state: vec![RunState::default(); features.len()],
        };
        let pool = (0 .. features.len()).map(FeatureIndex).collect();
        let leftover = graph.attach(None, pool);
        if leftover.is_empty() {
            return Ok(graph);
        }
        let unattached = leftover
            .into_iter()
            .filter_map(|index| {
                let feature = &features[index.0];
                feature.inside().map(|inside| UnattachedFeature {
                    label: feature.label().clone(),
                    inside: inside.clone(),
                })
            })
            .collect();
        Err(GraphError::Unattached(unattached))
    }

    /// Attaches every pooled feature that names `parent`, then recurses into
    /// the new entry nodes with whatever is left. Returns the unclaimed pool.
    fn attach(&mut self, parent: Option<NodeIndex>, pool: Vec<FeatureIndex>) -> Vec<FeatureIndex> {
        let features = self.features;
        let parent_label = parent.map(|node| features[self.nodes[node.0].feature.0].label());
        let (claimed, mut leftover): (Vec<_>, Vec<_>) =
            pool.into_iter().partition(|index| features[index.0].inside() == parent_label);

        let mut children = Vec::with_capacity(claimed.len() * 2);
        for index in order_siblings(features, claimed) {
            let entry = self.push_node(index, false);
            leftover = self.attach(Some(entry), leftover);
            children.push(entry);
            children.push(self.push_node(index, true));
        }

        match parent {
            Some(node) => self.nodes[node.0].children = children,
            None => self.roots = children,
        }
        leftover
    }

    /// Appends a childless node to the arena.
    fn push_node(&mut self, feature: FeatureIndex, is_teardown: bool) -> NodeIndex {
        self.nodes.push(Node {
            feature,
            is_teardown,
            children: Vec::new(),
        });
        NodeIndex(self.nodes.len() - 1)
    }
}

/// Orders sibling features so each `runs_before` target follows its source.
///
/// Picks, at every step, the earliest remaining sibling that no other
/// remaining sibling must precede; undeclared pairs keep registration order.
/// A `runs_before` cycle falls back to registration order for its members.
///
/// This is a topological pick, not a pairwise comparator or insertion sort:
/// a blocked target waits while unrelated siblings registered after it go
/// first, so `a, b, c` with `c` before `a` yields `b, c, a`.
fn order_siblings<C>(features: &[Feature<C>], mut remaining: Vec<FeatureIndex>) -> Vec<FeatureIndex> {
    let mut ordered = Vec::with_capacity(remaining.len());
    while !remaining.is_empty() {
        let pick = remaining
            .iter()
            .position(|candidate| {
                let label = features[candidate.0].label();
                !remaining.iter().any(|other| {
                    other != candidate && features[other.0].before() == Some(label)
                })
            })
            .unwrap_or(0);
        ordered.push(remaining.remove(pick));
    }
    ordered
}

// ============================================================================
// SECTION: Accessors
// ============================================================================

impl<'a, C> Graph<'a, C> {
    /// Returns the ordered children of the root.
    #[must_use]
    pub fn roots(&self) -> &[NodeIndex] {
        &self.roots
    }

    /// Returns the node at `index`.
    #[must_use]
    pub fn node(&self, index: NodeIndex) -> &Node {
        &self.nodes[index.0]
    }

    /// Returns the feature bound to `index`.
    #[must_use]
    pub fn feature(&self, index: FeatureIndex) -> &'a Feature<C> {
        &self.features[index.0]
    }

    /// Returns the run state for `index`.
    #[must_use]
    pub fn state(&self, index: FeatureIndex) -> RunState {
        self.state[index.0]
    }

    /// Returns mutable run state for `index`.
    pub fn state_mut(&mut self, index: FeatureIndex) -> &mut RunState {
        &mut self.state[index.0]
    }

    /// Returns the number of nodes in the arena.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}
