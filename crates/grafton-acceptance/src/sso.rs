// crates/grafton-acceptance/src/sso.rs
// ============================================================================
// Module: Single Sign-On Feature
// Description: Drives the provider's SSO endpoint with connector-issued codes.
// Purpose: Check the authorization code exchange against the connector.
// Dependencies: grafton-client, grafton-connector, grafton-core, reqwest, time
// ============================================================================

//! ## Overview
//! The default case hands the provider a fresh authorization code through
//! its SSO URL and then inspects the token request the provider made to the
//! connector. Each error case breaks one side of the exchange (client
//! credentials, code validity, connector health) and expects the provider to
//! answer `401`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write as _;

use grafton_client::client::REQUEST_TIMEOUT;
use grafton_config::flags;
use grafton_connector::ClientCredentials;
use grafton_connector::GrantType;
use grafton_connector::TOKEN_ROUTE;
use grafton_connector::TokenRequest;
use grafton_core::CaseResult;
use grafton_core::Failure;
use grafton_core::Feature;
use grafton_core::outcome::ensure;
use grafton_core::outcome::ensure_eq;
use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use time::OffsetDateTime;

use crate::context::AcceptanceContext;
use crate::context::AcceptanceSettings;
use crate::provisioning::PROVISION;

/// Label of the SSO feature.
pub const SSO: &str = "sso";

/// Content type a provider must use on the token endpoint.
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

// ============================================================================
// SECTION: Steps
// ============================================================================

/// Opens the SSO URL for `code` without following redirects.
///
/// # Errors
///
/// Transport failures are assertions; URL or client construction is fatal.
fn visit_sso(context: &AcceptanceContext, code: &str) -> Result<u16, Failure> {
    let resource_id = context.resource_id()?;
    let url = context
        .api
        .sso_url(code, resource_id)
        .map_err(|err| Failure::fatal(format!("could not build sso url: {err}")))?;
    context.info(&format!("Attempting to SSO into URL: {url}"));
    let client = Client::builder()
        .redirect(Policy::none())
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|err| Failure::fatal(format!("got error building new request: {err}")))?;
    let response = client
        .get(url)
        .send()
        .map_err(|err| Failure::assertion(format!("SSO request failed: {err}")))?;
    let status = response.status().as_u16();
    let body = response.text().unwrap_or_default();
    context.info(&format!("<-- {status} {body}"));
    Ok(status)
}

/// Describes every field of `actual` that differs from the expected request.
fn token_request_mismatches(actual: &TokenRequest, code: &str, settings: &AcceptanceSettings) -> String {
    let source = if actual.auth_header { " (read from Authorization header)" } else { "" };
    let mut report = String::new();
    if actual.content_type != FORM_CONTENT_TYPE {
        let _ = writeln!(
            report,
            "Expected content-type of '{FORM_CONTENT_TYPE}', but got '{}'.",
            actual.content_type
        );
    }
    if actual.client_id != settings.client_id {
        let _ = writeln!(
            report,
            "Expected client_id of '{}', but got '{}'{source}.",
            settings.client_id, actual.client_id
        );
    }
    if actual.client_secret != settings.client_secret {
        let _ = writeln!(
            report,
            "Expected client_secret of '{}', but got '{}'{source}.",
            settings.client_secret, actual.client_secret
        );
    }
    if actual.code != code {
        let _ = writeln!(report, "Expected code of '{code}', but got '{}'.", actual.code);
    }
    if actual.grant_type != GrantType::AuthorizationCode {
        let _ = writeln!(
            report,
            "Expected grant_type of '{}', but got '{}'.",
            GrantType::AuthorizationCode,
            actual.grant_type
        );
    }
    report
}

/// Visits the SSO URL for `code` and requires a `401`.
fn expect_unauthorized(context: &AcceptanceContext, code: &str) -> CaseResult {
    let status = visit_sso(context, code)?;
    ensure_eq(&status, &401, "Status code should be 401 unauthorized")
}

/// Runs `body` with the connector expecting `credentials`, then restores them.
fn with_client_credentials<F>(context: &AcceptanceContext, credentials: ClientCredentials, body: F) -> CaseResult
where
    F: FnOnce(&AcceptanceContext) -> CaseResult,
{
    let original = context.connector.client_credentials();
    context.connector.set_client_credentials(credentials);
    let result = body(context);
    context.connector.set_client_credentials(original);
    result
}

// ============================================================================
// SECTION: Feature
// ============================================================================

/// Builds the `sso` feature.
#[must_use]
pub fn sso_feature() -> Feature<AcceptanceContext> {
    Feature::new(SSO, "Single Sign-On Flow", sso_default)
        .error_case("with wrong client id", |context: &mut AcceptanceContext| {
            let credentials = ClientCredentials::new("fake-client", context.settings.client_secret.clone());
            with_client_credentials(context, credentials, |context| {
                let code = context.connector.create_code();
                expect_unauthorized(context, &code.code)
            })
        })
        .error_case("with wrong client secret", |context: &mut AcceptanceContext| {
            let credentials = ClientCredentials::new(context.settings.client_id.clone(), "fake-secret");
            with_client_credentials(context, credentials, |context| {
                let code = context.connector.create_code();
                expect_unauthorized(context, &code.code)
            })
        })
        .error_case("with expired token", |context: &mut AcceptanceContext| {
            let expired = OffsetDateTime::now_utc() - time::Duration::minutes(1);
            let code = context.connector.create_code_expiring_at(expired);
            expect_unauthorized(context, &code.code)
        })
        .error_case("with non-existing code", |context: &mut AcceptanceContext| {
            let _unused = context.connector.create_code();
            expect_unauthorized(context, "non-existing")
        })
        .error_case("with connector response error", |context: &mut AcceptanceContext| {
            context.connector.set_failing(true);
            let code = context.connector.create_code();
            let result = expect_unauthorized(context, &code.code);
            context.connector.set_failing(false);
            result
        })
        .runs_inside(PROVISION)
        .required_flags([flags::CLIENT_ID, flags::CLIENT_SECRET, flags::CONNECTOR_PORT])
}

/// Default case: a valid code yields exactly one well-formed token request.
fn sso_default(context: &mut AcceptanceContext) -> CaseResult {
    let capturer = context.connector.capturer();
    capturer.clear(TOKEN_ROUTE);
    let code = context.connector.create_code();
    let status = visit_sso(context, &code.code)?;
    ensure(
        matches!(status, 200 | 302 | 303),
        "Status code should be success (200) or redirect (302 or 303)",
    )?;

    let requests: Vec<TokenRequest> = capturer
        .token_requests()
        .into_iter()
        .filter(|request| request.grant_type == GrantType::AuthorizationCode)
        .collect();
    ensure_eq(&requests.len(), &1, "Zero or more than one token request should be received")?;
    let request = requests
        .first()
        .ok_or_else(|| Failure::assertion("Did not receive an OAuth2 token request"))?;
    let mismatches = token_request_mismatches(request, &code.code, &context.settings);
    ensure(mismatches.is_empty(), format!("Invalid token request\n{mismatches}"))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
