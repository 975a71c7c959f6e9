// crates/grafton-acceptance/src/credentials.rs
// ============================================================================
// Module: Credential Features
// Description: The `credentials` and `credentials_rotation` features.
// Purpose: Issue and delete credential sets for the provisioned resource.
// Dependencies: grafton-client, grafton-connector, grafton-core
// ============================================================================

//! ## Overview
//! Both features issue a credential set against the resource created by
//! `provision` and share their error cases. Only `credentials` deletes its
//! set again; the rotated set is left for the resource deprovision to drop.
//! Issued sets are mirrored into the connector store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use grafton_client::CREDENTIAL_NAME_PATTERN;
use grafton_client::ProviderErrorKind;
use grafton_client::valid_credential_name;
use grafton_connector::CallbackState;
use grafton_connector::CallbackType;
use grafton_connector::Credential;
use grafton_connector::now_rfc3339;
use grafton_core::Failure;
use grafton_core::Feature;
use grafton_core::IdKind;
use grafton_core::ObjectId;
use grafton_core::outcome::ensure;

use crate::checks::CredentialRule;
use crate::checks::DEFERRED_VALIDATION;
use crate::checks::Exchange;
use crate::checks::StepResult;
use crate::checks::check_resolved;
use crate::checks::expect_refusal;
use crate::checks::expect_success;
use crate::checks::expect_synchronous;
use crate::context::AcceptanceContext;
use crate::context::RunIds;
use crate::context::Signing;
use crate::provisioning::PROVISION;

/// Label of the credential set feature.
pub const CREDENTIALS: &str = "credentials";
/// Label of the credential rotation feature.
pub const CREDENTIALS_ROTATION: &str = "credentials_rotation";

// ============================================================================
// SECTION: Steps
// ============================================================================

/// Issues credential set `credential_id` for `resource_id`.
///
/// # Errors
///
/// Returns a provider error for refusals and a harness failure for registry
/// failures or callback timeouts.
pub fn provision_credentials(
    context: &AcceptanceContext,
    signing: Signing,
    resource_id: ObjectId,
    credential_id: ObjectId,
) -> StepResult<BTreeMap<String, String>> {
    context.info(&format!("Attempting to provision credentials for resource: {resource_id}"));
    let callback_id = context.open_callback(CallbackType::CredentialProvision)?;
    let reply = context.client(signing).provision_credentials(callback_id, resource_id, credential_id)?;
    let (message, callback) = context.settle(callback_id, reply.message, reply.callback)?;
    let credentials = match &callback {
        Some(callback) => callback.credentials.clone(),
        None => reply.credentials,
    };

    context.info("Provisioned Credentials Successfully");
    if !message.is_empty() {
        context.info(&format!("Message: {message}"));
    }
    context.info("Credentials:");
    for name in credentials.keys() {
        context.info(&format!("  {name}"));
    }

    let resolved = callback.as_ref().is_none_or(|callback| callback.state == CallbackState::Done);
    if resolved && !credentials.is_empty() {
        context.connector.store().put_credential(Credential {
            id: credential_id,
            resource_id: Some(resource_id),
            keys: credentials.clone(),
            custom_names: BTreeMap::new(),
            created_on: now_rfc3339(),
        });
    }
    Ok(Exchange {
        value: credentials,
        callback,
    })
}

/// Deletes credential set `credential_id`.
///
/// # Errors
///
/// Same taxonomy as [`provision_credentials`].
pub fn deprovision_credentials(context: &AcceptanceContext, credential_id: ObjectId) -> StepResult<()> {
    context.info(&format!("Attempting to deprovision credentials: {credential_id}"));
    let callback_id = context.open_callback(CallbackType::CredentialDeprovision)?;
    let reply = context.api.deprovision_credentials(callback_id, credential_id)?;
    let (message, callback) = context.settle(callback_id, reply.message, reply.callback)?;
    if callback.as_ref().is_none_or(|callback| callback.state == CallbackState::Done) {
        context.connector.store().delete_credential(credential_id);
    }
    context.info("Credential Deprovisioned.");
    if !message.is_empty() {
        context.info(&format!("Message: {message}"));
    }
    Ok(Exchange {
        value: (),
        callback,
    })
}

/// Issues a fresh credential set and checks the answer.
fn attempt_credentials(context: &AcceptanceContext) -> Result<ObjectId, Failure> {
    let resource_id = context.resource_id()?;
    let credential_id = ObjectId::generate(IdKind::Credential);
    let exchange = expect_success(
        provision_credentials(context, Signing::Endorsed, resource_id, credential_id),
        "Expected a successful provision of a new set of Credentials",
    )?;
    if let Some(callback) = &exchange.callback {
        check_resolved(callback, CredentialRule::Required)?;
    }
    ensure(
        !exchange.value.is_empty(),
        "One or more credentials should be returned during provision of a new Credential set",
    )?;
    for name in exchange.value.keys() {
        ensure(
            valid_credential_name(name),
            format!("Credential name must be of the form {CREDENTIAL_NAME_PATTERN}"),
        )?;
    }
    Ok(credential_id)
}

// ============================================================================
// SECTION: Features
// ============================================================================

/// Which recorded credential set a feature owns.
#[derive(Debug, Clone, Copy)]
enum Slot {
    /// Set issued by `credentials`.
    Primary,
    /// Set issued by `credentials_rotation`.
    Rotated,
}

impl Slot {
    /// Returns the recorded id.
    const fn get(self, ids: &RunIds) -> Option<ObjectId> {
        match self {
            Self::Primary => ids.credential,
            Self::Rotated => ids.rotated_credential,
        }
    }

    /// Records `id`.
    const fn set(self, ids: &mut RunIds, id: ObjectId) {
        match self {
            Self::Primary => ids.credential = Some(id),
            Self::Rotated => ids.rotated_credential = Some(id),
        }
    }

    /// Returns the recorded id or fails.
    fn require(self, ids: &RunIds) -> Result<ObjectId, Failure> {
        self.get(ids).ok_or_else(|| Failure::assertion("no credential set has been provisioned"))
    }
}

/// Default case and error cases shared by both credential features.
fn credential_set_feature(label: &'static str, name: &'static str, slot: Slot) -> Feature<AcceptanceContext> {
    Feature::new(label, name, move |context: &mut AcceptanceContext| {
        let id = attempt_credentials(context)?;
        slot.set(&mut context.ids, id);
        Ok(())
    })
    .error_case("with an invalid resource ID", |context: &mut AcceptanceContext| {
        let unknown = ObjectId::generate(IdKind::Resource);
        expect_refusal(
            provision_credentials(context, Signing::Endorsed, unknown, ObjectId::generate(IdKind::Credential)),
            ProviderErrorKind::NotFound,
            DEFERRED_VALIDATION,
        )
    })
    .error_case(
        "with already provisioned credentials - same content acts as created",
        move |context: &mut AcceptanceContext| {
            let resource_id = context.resource_id()?;
            let credential_id = slot.require(&context.ids)?;
            let exchange = expect_success(
                provision_credentials(context, Signing::Endorsed, resource_id, credential_id),
                "Create response should be returned (Repeatable Action)",
            )?;
            expect_synchronous(&exchange, "Same content should be evaluated during the initial call")
        },
    )
    .error_case("with a bad signature", |context: &mut AcceptanceContext| {
        let resource_id = context.resource_id()?;
        expect_refusal(
            provision_credentials(
                context,
                Signing::Unendorsed,
                resource_id,
                ObjectId::generate(IdKind::Credential),
            ),
            ProviderErrorKind::Unauthorized,
            DEFERRED_VALIDATION,
        )
    })
    .runs_inside(PROVISION)
}

/// Builds the `credentials` feature.
#[must_use]
pub fn credentials_feature() -> Feature<AcceptanceContext> {
    credential_set_feature(CREDENTIALS, "Create a credential set", Slot::Primary)
        .teardown("Delete a credential set", |context: &mut AcceptanceContext| {
            let id = Slot::Primary.require(&context.ids)?;
            let exchange = expect_success(deprovision_credentials(context, id), "No error is expected")?;
            match &exchange.callback {
                Some(callback) => check_resolved(
                    callback,
                    CredentialRule::Forbidden("Credentials cannot be returned on a deprovisioning callback"),
                ),
                None => Ok(()),
            }
        })
        .teardown_error_case("delete credentials that do not exist", |context: &mut AcceptanceContext| {
            expect_refusal(
                deprovision_credentials(context, ObjectId::generate(IdKind::Credential)),
                ProviderErrorKind::NotFound,
                DEFERRED_VALIDATION,
            )
        })
}

/// Builds the `credentials_rotation` feature.
#[must_use]
pub fn rotation_feature() -> Feature<AcceptanceContext> {
    credential_set_feature(CREDENTIALS_ROTATION, "Credential rotation", Slot::Rotated)
}
