// crates/grafton-core/src/feature.rs
// ============================================================================
// Module: Feature Declarations
// Description: Author-facing builder for features, cases, and teardowns.
// Purpose: Capture a feature's bodies and ordering relationships as data.
// Dependencies: crate::{identifiers, outcome}
// ============================================================================

//! ## Overview
//! A [`Feature`] is a named test unit: a default case, optional error cases,
//! an optional [`Teardown`] with the same shape, ordering declarations
//! (`runs_inside`, `runs_before`) and the external flags it needs. Features
//! are plain values; nothing is registered until they are handed to a
//! [`FeatureRegistry`](crate::registry::FeatureRegistry).
//!
//! ```
//! use grafton_core::Feature;
//! use grafton_core::outcome::ensure;
//!
//! let feature: Feature<u32> = Feature::new("provision", "Provision a resource", |count| {
//!     *count += 1;
//!     Ok(())
//! })
//! .error_case("with a faulty plan", |count| ensure(*count > 0, "must run after default"))
//! .teardown("Deprovision a resource", |_| Ok(()))
//! .required_flags(["product", "plan"]);
//! assert_eq!(feature.label().as_str(), "provision");
//! ```

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::identifiers::FeatureLabel;
use crate::outcome::CaseResult;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Boxed test body operating on the harness context `C`.
pub type CaseFn<C> = Box<dyn Fn(&mut C) -> CaseResult>;

/// Named error case.
pub struct Case<C> {
    /// Human-readable case name.
    name: String,
    /// Case body.
    body: CaseFn<C>,
}

impl<C> Case<C> {
    /// Returns the case name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the case body.
    ///
    /// # Errors
    ///
    /// Returns the body's failure.
    pub fn run(&self, context: &mut C) -> CaseResult {
        (self.body)(context)
    }
}

/// Default case plus error cases, shared by entries and teardowns.
pub struct Body<C> {
    /// Default case body.
    default: CaseFn<C>,
    /// Error cases in declaration order.
    error_cases: Vec<Case<C>>,
}

impl<C> Body<C> {
    /// Creates a body from its default case.
    fn new(default: CaseFn<C>) -> Self {
        Self {
            default,
            error_cases: Vec::new(),
        }
    }

    /// Runs the default case.
    ///
    /// # Errors
    ///
    /// Returns the default case's failure.
    pub fn run_default(&self, context: &mut C) -> CaseResult {
        (self.default)(context)
    }

    /// Returns the error cases in declaration order.
    #[must_use]
    pub fn error_cases(&self) -> &[Case<C>] {
        &self.error_cases
    }
}

/// Optional teardown attached to a feature.
pub struct Teardown<C> {
    /// Human-readable teardown name.
    name: String,
    /// Teardown bodies.
    body: Body<C>,
}

impl<C> Teardown<C> {
    /// Returns the teardown name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the teardown bodies.
    #[must_use]
    pub const fn body(&self) -> &Body<C> {
        &self.body
    }
}

/// A testable feature with ordering declarations.
///
/// # Invariants
/// - `required_flags` contains no duplicates.
pub struct Feature<C> {
    /// Stable feature label.
    label: FeatureLabel,
    /// Human-readable name.
    name: String,
    /// Entry bodies.
    body: Body<C>,
    /// Optional teardown.
    teardown: Option<Teardown<C>>,
    /// Label of the feature this one runs inside.
    inside: Option<FeatureLabel>,
    /// Label of the sibling this one runs before.
    before: Option<FeatureLabel>,
    /// External configuration flags that must be supplied.
    required_flags: Vec<String>,
}

impl<C> Feature<C> {
    /// Declares a feature with its default case.
    #[must_use]
    pub fn new<F>(label: impl Into<FeatureLabel>, name: impl Into<String>, default: F) -> Self
    where
        F: Fn(&mut C) -> CaseResult + 'static,
    {
        Self {
            label: label.into(),
            name: name.into(),
            body: Body::new(Box::new(default)),
            teardown: None,
            inside: None,
            before: None,
            required_flags: Vec::new(),
        }
    }

    /// Adds an error case to the entry body.
    #[must_use]
    pub fn error_case<F>(mut self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut C) -> CaseResult + 'static,
    {
        self.body.error_cases.push(Case {
            name: name.into(),
            body: Box::new(body),
        });
        self
    }

    /// Attaches a teardown with its default case, replacing any previous one.
    #[must_use]
    pub fn teardown<F>(mut self, name: impl Into<String>, default: F) -> Self
    where
        F: Fn(&mut C) -> CaseResult + 'static,
    {
        self.teardown = Some(Teardown {
            name: name.into(),
            body: Body::new(Box::new(default)),
        });
        self
    }

    /// Adds an error case to the teardown; ignored when no teardown exists.
    #[must_use]
    pub fn teardown_error_case<F>(mut self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut C) -> CaseResult + 'static,
    {
        if let Some(teardown) = self.teardown.as_mut() {
            teardown.body.error_cases.push(Case {
                name: name.into(),
                body: Box::new(body),
            });
        }
        self
    }

    /// Declares that this feature executes inside the feature `label`.
    #[must_use]
    pub fn runs_inside(mut self, label: impl Into<FeatureLabel>) -> Self {
        self.inside = Some(label.into());
        self
    }

    /// Declares that this feature runs and tears down before sibling `label`.
    #[must_use]
    pub fn runs_before(mut self, label: impl Into<FeatureLabel>) -> Self {
        self.before = Some(label.into());
        self
    }

    /// Marks configuration flags this feature requires.
    #[must_use]
    pub fn required_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for flag in flags {
            let flag = flag.into();
            if !self.needs_flag(&flag) {
                self.required_flags.push(flag);
            }
        }
        self
    }

    /// Returns true when `flag` is among the required flags.
    #[must_use]
    pub fn needs_flag(&self, flag: &str) -> bool {
        self.required_flags.iter().any(|required| required == flag)
    }

    /// Returns the feature label.
    #[must_use]
    pub const fn label(&self) -> &FeatureLabel {
        &self.label
    }

    /// Returns the human-readable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the entry bodies.
    #[must_use]
    pub const fn body(&self) -> &Body<C> {
        &self.body
    }

    /// Returns the teardown, if any.
    #[must_use]
    pub const fn teardown_body(&self) -> Option<&Teardown<C>> {
        self.teardown.as_ref()
    }

    /// Returns the parent label, if any.
    #[must_use]
    pub const fn inside(&self) -> Option<&FeatureLabel> {
        self.inside.as_ref()
    }

    /// Returns the sibling this feature precedes, if any.
    #[must_use]
    pub const fn before(&self) -> Option<&FeatureLabel> {
        self.before.as_ref()
    }

    /// Returns the required flags in declaration order.
    #[must_use]
    pub fn flags(&self) -> &[String] {
        &self.required_flags
    }
}
