// crates/grafton-acceptance/src/provisioning.rs
// ============================================================================
// Module: Resource Provisioning Features
// Description: The `provision` and `cleanup` features and their steps.
// Purpose: Create and destroy resources through the provider API.
// Dependencies: grafton-client, grafton-config, grafton-connector, grafton-core, regex
// ============================================================================

//! ## Overview
//! `provision` creates the resource every nested feature works against and
//! deprovisions it in its teardown. `cleanup` runs the same pair on its own
//! resource. A resource is mirrored into the connector store while its
//! provisioning is in flight, so the provider can read it back during a
//! callback; it is withdrawn again if the provider refuses.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::LazyLock;

use grafton_client::ProviderErrorKind;
use grafton_client::ResourceBody;
use grafton_config::flags;
use grafton_connector::CallbackState;
use grafton_connector::CallbackType;
use grafton_connector::Resource;
use grafton_connector::now_rfc3339;
use grafton_core::CaseResult;
use grafton_core::Failure;
use grafton_core::Feature;
use grafton_core::IdKind;
use grafton_core::ObjectId;
use grafton_core::outcome::ensure_eq;
use regex::Regex;
use serde_json::Value;

use crate::checks::CredentialRule;
use crate::checks::DEFERRED_VALIDATION;
use crate::checks::Exchange;
use crate::checks::StepResult;
use crate::checks::check_resolved;
use crate::checks::expect_refusal;
use crate::checks::expect_success;
use crate::context::AcceptanceContext;
use crate::context::AcceptanceSettings;
use crate::context::Signing;

// ============================================================================
// SECTION: Labels
// ============================================================================

/// Label of the provisioning feature.
pub const PROVISION: &str = "provision";
/// Label of the standalone provision/deprovision feature.
pub const CLEANUP: &str = "cleanup";

/// Hex digits of the resource id used in generated labels.
const LABEL_SUFFIX_LEN: usize = 8;

/// Platform label grammar for products and plans.
static LABEL: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| Regex::new("^[a-z0-9][a-z0-9_-]{1,128}$"));

/// Returns true for platform labels: `[a-z0-9][a-z0-9_-]{1,128}`.
#[must_use]
pub fn valid_label(label: &str) -> bool {
    LABEL.as_ref().is_ok_and(|pattern| pattern.is_match(label))
}

/// Builds the resource label `<product>-<id suffix>`.
fn resource_label(product: &str, id: ObjectId) -> String {
    let text = id.to_string();
    let suffix = text.get(text.len().saturating_sub(LABEL_SUFFIX_LEN)..).unwrap_or(&text);
    format!("{product}-{suffix}")
}

// ============================================================================
// SECTION: Steps
// ============================================================================

/// What a provisioning request asks for.
#[derive(Debug, Clone, Copy)]
pub struct ResourceRequest<'a> {
    /// Product label.
    pub product: &'a str,
    /// Plan label.
    pub plan: &'a str,
    /// Plan features.
    pub features: &'a BTreeMap<String, Value>,
    /// Region.
    pub region: &'a str,
}

impl<'a> ResourceRequest<'a> {
    /// The configured product, plan, and region.
    #[must_use]
    pub fn planned(settings: &'a AcceptanceSettings) -> Self {
        Self {
            product: &settings.product,
            plan: &settings.plan,
            features: &settings.plan_features,
            region: &settings.region,
        }
    }
}

/// Provisions resource `id` and waits out a deferred answer.
///
/// # Errors
///
/// Returns a provider error for refusals and a harness failure for invalid
/// labels, registry failures, or callback timeouts.
pub fn provision_resource(
    context: &AcceptanceContext,
    signing: Signing,
    id: ObjectId,
    request: &ResourceRequest<'_>,
) -> StepResult<Resource> {
    context.info("Attempting to provision resource");
    let callback_id = context.open_callback(CallbackType::ResourceProvision)?;
    if !valid_label(request.product) {
        return Err(Failure::fatal(format!("Product label is not a valid label: {}", request.product)).into());
    }
    if !valid_label(request.plan) {
        return Err(Failure::fatal(format!("Plan label is not a valid label: {}", request.plan)).into());
    }

    let label = resource_label(request.product, id);
    let created = now_rfc3339();
    let record = Resource {
        id,
        name: label.clone(),
        label,
        plan: request.plan.to_string(),
        product: request.product.to_string(),
        region: request.region.to_string(),
        features: request.features.clone(),
        created_at: created.clone(),
        updated_at: created,
    };

    let store = context.connector.store();
    let previous = store.resource(id);
    store.put_resource(record.clone());
    let result = deliver_provision(context, signing, callback_id, record);
    let kept = result.as_ref().is_ok_and(|exchange| {
        exchange.callback.as_ref().is_none_or(|callback| callback.state == CallbackState::Done)
    });
    if !kept {
        match previous {
            Some(previous) => store.put_resource(previous),
            None => {
                store.delete_resource(id);
            }
        }
    }
    result
}

/// Sends the provisioning request for `record`.
fn deliver_provision(
    context: &AcceptanceContext,
    signing: Signing,
    callback_id: ObjectId,
    record: Resource,
) -> StepResult<Resource> {
    let body = ResourceBody {
        id: record.id,
        product: record.product.clone(),
        plan: record.plan.clone(),
        region: record.region.clone(),
        features: record.features.clone(),
    };
    let reply = context.client(signing).provision_resource(callback_id, &body)?;
    let (message, callback) = context.settle(callback_id, reply.message, reply.callback)?;
    if callback.as_ref().is_some_and(|callback| callback.state == CallbackState::Error) {
        context.info(&format!("Resource provision reported an error: {}", record.id));
    } else {
        context.info(&format!("Resource Provisioned Successfully: {}", record.id));
    }
    if !message.is_empty() {
        context.info(&format!("Message: {message}"));
    }
    Ok(Exchange {
        value: record,
        callback,
    })
}

/// Deprovisions resource `id` and waits out a deferred answer.
///
/// # Errors
///
/// Same taxonomy as [`provision_resource`].
pub fn deprovision_resource(context: &AcceptanceContext, id: ObjectId) -> StepResult<()> {
    context.info(&format!("Attempting to deprovision resource: {id}"));
    let callback_id = context.open_callback(CallbackType::ResourceDeprovision)?;
    let reply = context.api.deprovision_resource(callback_id, id)?;
    let (message, callback) = context.settle(callback_id, reply.message, reply.callback)?;
    if callback.as_ref().is_none_or(|callback| callback.state == CallbackState::Done) {
        context.connector.store().delete_resource(id);
    }
    context.info("Resource Deprovisioned.");
    if !message.is_empty() {
        context.info(&format!("Callback Message: {message}"));
    }
    Ok(Exchange {
        value: (),
        callback,
    })
}

/// Provisions a fresh resource and checks the answer.
fn attempt_provision(context: &AcceptanceContext) -> Result<ObjectId, Failure> {
    let request = ResourceRequest::planned(&context.settings);
    let id = ObjectId::generate(IdKind::Resource);
    let exchange = expect_success(
        provision_resource(context, Signing::Endorsed, id, &request),
        "Expected a successful provision of a resource",
    )?;
    if let Some(callback) = &exchange.callback {
        check_resolved(
            callback,
            CredentialRule::Forbidden("Credentials cannot be returned on a resource provisioning callback"),
        )?;
    }
    Ok(exchange.value.id)
}

/// Deprovisions `id` and checks the answer.
fn attempt_deprovision(context: &AcceptanceContext, id: ObjectId) -> CaseResult {
    let exchange = expect_success(deprovision_resource(context, id), "No error is expected")?;
    if let Some(callback) = &exchange.callback {
        check_resolved(
            callback,
            CredentialRule::Forbidden("Credentials cannot be returned on a resource deprovisioning callback"),
        )?;
    }
    Ok(())
}

// ============================================================================
// SECTION: Provision Feature
// ============================================================================

/// Builds the `provision` feature.
#[must_use]
pub fn provision_feature() -> Feature<AcceptanceContext> {
    Feature::new(PROVISION, "Provision a resource", provision_default)
        .error_case("with a faulty product name", |context: &mut AcceptanceContext| {
            let request = ResourceRequest {
                product: "not-your-product",
                ..ResourceRequest::planned(&context.settings)
            };
            refuse_fresh(context, Signing::Endorsed, &request, ProviderErrorKind::BadRequest)
        })
        .error_case("with a faulty plan name", |context: &mut AcceptanceContext| {
            let no_features = BTreeMap::new();
            let request = ResourceRequest {
                plan: "faulty-plan-name",
                features: &no_features,
                ..ResourceRequest::planned(&context.settings)
            };
            refuse_fresh(context, Signing::Endorsed, &request, ProviderErrorKind::BadRequest)
        })
        .error_case("with a faulty region", |context: &mut AcceptanceContext| {
            let request = ResourceRequest {
                region: "faulty-region",
                ..ResourceRequest::planned(&context.settings)
            };
            refuse_fresh(context, Signing::Endorsed, &request, ProviderErrorKind::BadRequest)
        })
        .error_case("with a bad signature", |context: &mut AcceptanceContext| {
            let request = ResourceRequest::planned(&context.settings);
            refuse_fresh(context, Signing::Unendorsed, &request, ProviderErrorKind::Unauthorized)
        })
        .error_case(
            "with an already provisioned resource - same content acts as created",
            repeat_same_content,
        )
        .error_case(
            "with an already provisioned resource - different content results in conflict",
            repeat_different_content,
        )
        .teardown("Deprovision a resource", |context: &mut AcceptanceContext| {
            let id = context.resource_id()?;
            attempt_deprovision(context, id)
        })
        .teardown_error_case("delete a non existing resource", |context: &mut AcceptanceContext| {
            expect_refusal(
                deprovision_resource(context, ObjectId::generate(IdKind::Resource)),
                ProviderErrorKind::NotFound,
                "Resource existence should be evaluated during the initial call",
            )
        })
        .required_flags([flags::PRODUCT, flags::PLAN, flags::REGION, flags::NEW_PLAN])
}

/// Default case: provision the shared resource.
fn provision_default(context: &mut AcceptanceContext) -> CaseResult {
    let id = attempt_provision(context)?;
    context.ids.resource = Some(id);
    Ok(())
}

/// Provisions a fresh id and expects a synchronous refusal.
fn refuse_fresh(
    context: &AcceptanceContext,
    signing: Signing,
    request: &ResourceRequest<'_>,
    kind: ProviderErrorKind,
) -> CaseResult {
    let id = ObjectId::generate(IdKind::Resource);
    expect_refusal(provision_resource(context, signing, id, request), kind, DEFERRED_VALIDATION)
}

/// Re-provisions the shared resource unchanged.
fn repeat_same_content(context: &mut AcceptanceContext) -> CaseResult {
    let id = context.resource_id()?;
    let request = ResourceRequest::planned(&context.settings);
    let exchange = expect_success(
        provision_resource(context, Signing::Endorsed, id, &request),
        "Create response should be returned (Repeatable Action)",
    )?;
    match &exchange.callback {
        Some(callback) => {
            ensure_eq(&callback.state, &CallbackState::Done, "Expected to receive 'done' as the state")
        }
        None => Ok(()),
    }
}

/// Re-provisions the shared resource on a different plan.
fn repeat_different_content(context: &mut AcceptanceContext) -> CaseResult {
    let id = context.resource_id()?;
    let settings = &context.settings;
    let request = ResourceRequest {
        plan: &settings.new_plan,
        features: &settings.new_plan_features,
        ..ResourceRequest::planned(settings)
    };
    match provision_resource(context, Signing::Endorsed, id, &request) {
        Ok(Exchange {
            callback: Some(callback),
            ..
        }) => ensure_eq(&callback.state, &CallbackState::Error, "Expected to receive 'error' as the state"),
        other => expect_refusal(other, ProviderErrorKind::Conflict, DEFERRED_VALIDATION),
    }
}

// ============================================================================
// SECTION: Cleanup Feature
// ============================================================================

/// Builds the `cleanup` feature.
#[must_use]
pub fn cleanup_feature() -> Feature<AcceptanceContext> {
    Feature::new(CLEANUP, "Can provision and deprovision a resource", |context: &mut AcceptanceContext| {
        let id = attempt_provision(context)?;
        attempt_deprovision(context, id)
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use grafton_core::IdKind;
    use grafton_core::ObjectId;

    use super::resource_label;
    use super::valid_label;

    #[test]
    fn labels_follow_the_platform_grammar() {
        assert!(valid_label("bonnets"));
        assert!(valid_label("9-lives_plan"));
        assert!(!valid_label("b"));
        assert!(!valid_label("Bonnets"));
        assert!(!valid_label("-bonnets"));
        assert!(!valid_label("bon nets"));
        assert!(!valid_label(""));
        assert!(!valid_label(&format!("a{}", "b".repeat(129))));
    }

    #[test]
    fn label_bounds_are_inclusive_and_anchored() {
        assert!(valid_label("ab"));
        assert!(valid_label(&format!("a{}", "b".repeat(128))));
        assert!(!valid_label("bonnets\n"));
        assert!(!valid_label("bonnets!"));
        assert!(!valid_label("bönnets"));
    }

    #[test]
    fn generated_resource_labels_are_valid() {
        let id = ObjectId::generate(IdKind::Resource);
        let label = resource_label("bonnets", id);
        assert!(label.starts_with("bonnets-"));
        assert_eq!(label.len(), "bonnets-".len() + 8);
        assert!(valid_label(&label));
    }
}
