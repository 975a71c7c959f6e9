// crates/grafton-core/tests/proptest_graph.rs
// ============================================================================
// Module: Graph Property-Based Tests
// Description: Ordering and nesting properties over random feature forests.
// Purpose: Check walk order invariants across arbitrary declarations.
// ============================================================================

//! Property-based tests for graph ordering invariants.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

mod support;

use std::collections::BTreeSet;

use grafton_core::Feature;
use grafton_core::FeatureRegistry;
use proptest::prelude::*;
use support::walk_order;

/// One generated declaration: optional parent and `runs_before` target, both
/// referring to an earlier feature so declarations are always acyclic.
#[derive(Debug, Clone)]
struct Declaration {
    /// Earlier feature this one runs inside.
    inside: Option<usize>,
    /// Earlier feature this one runs before.
    before: Option<usize>,
    /// Number of required flags.
    flags: usize,
}

fn declarations() -> impl Strategy<Value = Vec<Declaration>> {
    (1usize .. 9).prop_flat_map(|count| {
        (0 .. count)
            .map(|index| {
                let earlier = if index == 0 {
                    Just(None).boxed()
                } else {
                    prop::option::of(0 .. index).boxed()
                };
                (earlier.clone(), earlier, 0usize .. 3).prop_map(|(inside, before, flags)| {
                    Declaration {
                        inside,
                        before,
                        flags,
                    }
                })
            })
            .collect::<Vec<_>>()
    })
}

fn label(index: usize) -> String {
    format!("f{index}")
}

fn registry_for(declarations: &[Declaration]) -> FeatureRegistry<()> {
    let mut registry = FeatureRegistry::new();
    for (index, declaration) in declarations.iter().enumerate() {
        let flags: Vec<String> = (0 .. declaration.flags).map(|flag| format!("{index}-{flag}")).collect();
        let mut feature = Feature::new(label(index), "generated", |_| Ok(())).required_flags(flags);
        if let Some(parent) = declaration.inside {
            feature = feature.runs_inside(label(parent));
        }
        if let Some(target) = declaration.before {
            feature = feature.runs_before(label(target));
        }
        registry.register(feature);
    }
    registry
}

fn position(order: &[String], entry: &str) -> usize {
    order.iter().position(|item| item == entry).unwrap()
}

proptest! {
    #[test]
    fn every_feature_appears_as_entry_then_teardown(declarations in declarations()) {
        let registry = registry_for(&declarations);
        let order = walk_order(&registry, &[]).unwrap();
        prop_assert_eq!(order.len(), declarations.len() * 2);
        for index in 0 .. declarations.len() {
            let entry = label(index);
            let teardown = format!("{entry}-td");
            prop_assert!(position(&order, &entry) < position(&order, &teardown));
        }
    }

    #[test]
    fn children_nest_strictly_within_parents(declarations in declarations()) {
        let registry = registry_for(&declarations);
        let order = walk_order(&registry, &[]).unwrap();
        for (index, declaration) in declarations.iter().enumerate() {
            let Some(parent) = declaration.inside else { continue };
            let parent = label(parent);
            let child = label(index);
            let parent_entry = position(&order, &parent);
            let parent_teardown = position(&order, &format!("{parent}-td"));
            let child_entry = position(&order, &child);
            let child_teardown = position(&order, &format!("{child}-td"));
            prop_assert!(parent_entry < child_entry && child_teardown < parent_teardown);
        }
    }

    #[test]
    fn runs_before_orders_entries_and_teardowns(declarations in declarations()) {
        let registry = registry_for(&declarations);
        let order = walk_order(&registry, &[]).unwrap();
        for (index, declaration) in declarations.iter().enumerate() {
            let Some(target) = declaration.before else { continue };
            if declarations[target].inside != declaration.inside {
                continue;
            }
            let source = label(index);
            let target = label(target);
            prop_assert!(position(&order, &source) < position(&order, &target));
            let source_teardown = format!("{source}-td");
            let target_teardown = format!("{target}-td");
            prop_assert!(position(&order, &source_teardown) < position(&order, &target_teardown));
        }
    }

    #[test]
    fn validation_counts_every_flag_and_honours_exclusion(declarations in declarations()) {
        let registry = registry_for(&declarations);
        let total: usize = declarations.iter().map(|declaration| declaration.flags).sum();
        let errors = registry.validate(&BTreeSet::new(), &[]).unwrap();
        prop_assert_eq!(errors.len(), total);

        let roots: Vec<usize> = (0 .. declarations.len())
            .filter(|index| declarations[*index].inside.is_none())
            .collect();
        let excluded = roots[0];
        let mut removed = BTreeSet::from([excluded]);
        for (index, declaration) in declarations.iter().enumerate() {
            if declaration.inside.is_some_and(|parent| removed.contains(&parent)) {
                removed.insert(index);
            }
        }
        let remaining: usize = total - removed.iter().map(|index| declarations[*index].flags).sum::<usize>();
        let errors = registry
            .validate(&BTreeSet::new(), &[grafton_core::FeatureLabel::from(label(excluded))])
            .unwrap();
        prop_assert_eq!(errors.len(), remaining);
    }
}
