// system-tests/tests/suites/acceptance.rs
// ============================================================================
// Module: Acceptance Run Tests
// Description: Full feature-suite runs against the stub provider.
// Purpose: Validate the harness end to end, sync and callback answers alike.
// Dependencies: system-tests helpers
// ============================================================================

//! Full acceptance runs for Grafton system-tests.

use std::error::Error;
use std::time::Duration;

use grafton_acceptance::run_suite;
use grafton_connector::CALLBACK_ROUTE;
use grafton_core::FeatureLabel;
use grafton_core::RunOptions;
use grafton_core::RunSummary;

use crate::helpers::harness::Run;
use crate::helpers::harness::default_credential_names;
use crate::helpers::harness::start_run;
use crate::helpers::provider_stub::Delivery;

fn run_to_completion(run: &mut Run, options: &RunOptions) -> Result<RunSummary, Box<dyn Error>> {
    let summary = run_suite(&mut run.context, options)?;
    Ok(summary)
}

fn require_clean_pass(run: &Run, summary: RunSummary) -> Result<(), Box<dyn Error>> {
    if !summary.passed || summary.failures != 0 {
        return Err(format!(
            "expected a clean run, got {} failures in {} blocks:\n{}",
            summary.failures,
            summary.blocks,
            run.output.contents()
        )
        .into());
    }
    if run.provider.resource_count() != 0 {
        return Err("provider still holds resources after teardown".into());
    }
    if run.context.connector.store().resource_count() != 0 {
        return Err("connector store still holds resources after teardown".into());
    }
    Ok(())
}

#[test]
fn immediate_provider_passes_every_feature() -> Result<(), Box<dyn Error>> {
    let mut run = start_run(Delivery::Immediate, default_credential_names())?;
    let summary = run_to_completion(&mut run, &RunOptions::default())?;
    require_clean_pass(&run, summary)?;

    let requests = run.provider.requests();
    if !requests.iter().any(|request| request.status == 401) {
        return Err("bad-signature cases never reached the provider".into());
    }
    if !requests.iter().any(|request| request.path == "/v1/sso" && request.status == 302) {
        return Err("no successful single sign-on was recorded".into());
    }
    if !requests.iter().any(|request| request.path.ends_with("/measures") && request.status == 200) {
        return Err("resource measures were never pulled".into());
    }
    if !run.provider.callback_statuses().is_empty() {
        return Err("immediate provider should not resolve callbacks".into());
    }
    if !run.output.contents().contains(&format!("{} features, 0 failures", summary.blocks)) {
        return Err(format!("missing run summary line:\n{}", run.output.contents()).into());
    }
    Ok(())
}

#[test]
fn callback_provider_passes_every_feature() -> Result<(), Box<dyn Error>> {
    let mut run = start_run(Delivery::Callback, default_credential_names())?;
    let summary = run_to_completion(&mut run, &RunOptions::default())?;
    require_clean_pass(&run, summary)?;

    let captured = run.context.connector.capturer().get(CALLBACK_ROUTE);
    let statuses = run.provider.await_callback_statuses(captured.len(), Duration::from_secs(5));
    if statuses.is_empty() {
        return Err("callback provider resolved no callbacks".into());
    }
    if let Some(status) = statuses.iter().find(|status| **status != 204) {
        return Err(format!("connector rejected a callback resolution with {status}").into());
    }
    if captured.len() != statuses.len() {
        return Err(format!(
            "connector captured {} callbacks, provider sent {}",
            captured.len(),
            statuses.len()
        )
        .into());
    }
    Ok(())
}

#[test]
fn excluded_features_send_no_requests() -> Result<(), Box<dyn Error>> {
    let mut run = start_run(Delivery::Immediate, default_credential_names())?;
    let options = RunOptions {
        exclude: vec![FeatureLabel::from("sso"), FeatureLabel::from("resource-measures")],
        run_error_cases: false,
    };
    let summary = run_to_completion(&mut run, &options)?;
    require_clean_pass(&run, summary)?;

    for request in run.provider.requests() {
        if request.path == "/v1/sso" || request.path.ends_with("/measures") {
            return Err(format!("excluded feature sent {} {}", request.method, request.path).into());
        }
        if request.status >= 400 {
            return Err(format!(
                "error cases are off but {} {} answered {}",
                request.method, request.path, request.status
            )
            .into());
        }
    }
    Ok(())
}

#[test]
fn lowercase_credential_names_fail_the_credential_features() -> Result<(), Box<dyn Error>> {
    let mut run = start_run(Delivery::Immediate, vec!["database_url".to_string()])?;
    let summary = run_to_completion(&mut run, &RunOptions::default())?;
    if summary.passed {
        return Err("lowercase credential names should fail the run".into());
    }
    let output = run.output.contents();
    if !output.contains("Credential name must be of the form") {
        return Err(format!("missing credential name failure:\n{output}").into());
    }
    if run.provider.resource_count() != 0 {
        return Err("the resource should still be deprovisioned".into());
    }
    Ok(())
}
