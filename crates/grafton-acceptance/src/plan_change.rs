// crates/grafton-acceptance/src/plan_change.rs
// ============================================================================
// Module: Plan Change Feature
// Description: Resizes the provisioned resource and restores it afterwards.
// Purpose: Exercise `PATCH /resources/{id}` on the provider.
// Dependencies: grafton-client, grafton-config, grafton-connector, grafton-core
// ============================================================================

//! ## Overview
//! Runs inside `provision` and ahead of `credentials`: the resize and its
//! restore both finish before any credential set is issued.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use grafton_client::ProviderErrorKind;
use grafton_config::flags;
use grafton_connector::CallbackState;
use grafton_connector::CallbackType;
use grafton_core::CaseResult;
use grafton_core::Feature;
use grafton_core::IdKind;
use grafton_core::ObjectId;
use serde_json::Value;

use crate::checks::CredentialRule;
use crate::checks::DEFERRED_VALIDATION;
use crate::checks::Exchange;
use crate::checks::StepResult;
use crate::checks::check_resolved;
use crate::checks::expect_refusal;
use crate::checks::expect_success;
use crate::checks::expect_synchronous;
use crate::context::AcceptanceContext;
use crate::context::Signing;
use crate::credentials::CREDENTIALS;
use crate::provisioning::PROVISION;

/// Label of the plan change feature.
pub const PLAN_CHANGE: &str = "plan-change";

// ============================================================================
// SECTION: Steps
// ============================================================================

/// Moves `resource_id` to `plan` and waits out a deferred answer.
///
/// # Errors
///
/// Returns a provider error for refusals and a harness failure for registry
/// failures or callback timeouts.
pub fn change_plan(
    context: &AcceptanceContext,
    signing: Signing,
    resource_id: ObjectId,
    plan: &str,
    features: &BTreeMap<String, Value>,
) -> StepResult<()> {
    context.info(&format!("Attempting to resize resource {resource_id} to {plan}"));
    let callback_id = context.open_callback(CallbackType::ResourceResize)?;
    let reply = context.client(signing).change_plan(callback_id, resource_id, plan, features)?;
    let (message, callback) = context.settle(callback_id, reply.message, reply.callback)?;
    if callback.as_ref().is_none_or(|callback| callback.state == CallbackState::Done) {
        context.connector.store().change_plan(resource_id, plan, features.clone());
    }
    context.info("Successfully resized!");
    if !message.is_empty() {
        context.info(&format!("Message: {message}"));
    }
    Ok(Exchange {
        value: (),
        callback,
    })
}

/// Resizes the shared resource and checks the answer.
fn attempt_resize(context: &AcceptanceContext, plan: &str, features: &BTreeMap<String, Value>) -> CaseResult {
    let id = context.resource_id()?;
    let exchange = expect_success(
        change_plan(context, Signing::Endorsed, id, plan, features),
        "Expected a successful plan change",
    )?;
    match &exchange.callback {
        Some(callback) => check_resolved(
            callback,
            CredentialRule::Forbidden("Credentials cannot be returned on a resource plan change callback"),
        ),
        None => Ok(()),
    }
}

// ============================================================================
// SECTION: Feature
// ============================================================================

/// Builds the `plan-change` feature.
#[must_use]
pub fn plan_change_feature() -> Feature<AcceptanceContext> {
    Feature::new(PLAN_CHANGE, "Change a resource's plan", |context: &mut AcceptanceContext| {
        let settings = &context.settings;
        attempt_resize(context, &settings.new_plan, &settings.new_plan_features)
    })
    .error_case("with existing plan - returns success", |context: &mut AcceptanceContext| {
        let id = context.resource_id()?;
        let settings = &context.settings;
        let exchange = expect_success(
            change_plan(context, Signing::Endorsed, id, &settings.new_plan, &settings.new_plan_features),
            "If the current plan matches the requested plan a 204 No Content should be returned (Repeatable Action)",
        )?;
        expect_synchronous(&exchange, "Same content should be evaluated during the initial call")
    })
    .error_case("with a non existing resource", |context: &mut AcceptanceContext| {
        let settings = &context.settings;
        let unknown = ObjectId::generate(IdKind::Resource);
        expect_refusal(
            change_plan(context, Signing::Endorsed, unknown, &settings.new_plan, &settings.new_plan_features),
            ProviderErrorKind::NotFound,
            DEFERRED_VALIDATION,
        )
    })
    .error_case("with a non existing plan", |context: &mut AcceptanceContext| {
        let id = context.resource_id()?;
        expect_refusal(
            change_plan(context, Signing::Endorsed, id, "non-existing", &BTreeMap::new()),
            ProviderErrorKind::BadRequest,
            DEFERRED_VALIDATION,
        )
    })
    .error_case("with a bad signature", |context: &mut AcceptanceContext| {
        let id = context.resource_id()?;
        let settings = &context.settings;
        expect_refusal(
            change_plan(context, Signing::Unendorsed, id, &settings.new_plan, &settings.new_plan_features),
            ProviderErrorKind::Unauthorized,
            DEFERRED_VALIDATION,
        )
    })
    .teardown("Change the resource's plan back to the original", |context: &mut AcceptanceContext| {
        let settings = &context.settings;
        attempt_resize(context, &settings.plan, &settings.plan_features)
    })
    .runs_inside(PROVISION)
    .runs_before(CREDENTIALS)
    .required_flags([flags::NEW_PLAN])
}
