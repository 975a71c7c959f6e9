// crates/grafton-acceptance/src/measures.rs
// ============================================================================
// Module: Resource Measures Feature
// Description: Pulls usage measures for the provisioned resource.
// Purpose: Exercise `GET /resources/{id}/measures` on the provider.
// Dependencies: grafton-connector, grafton-core, time
// ============================================================================

//! ## Overview
//! The configured usage is seeded into the connector for the current
//! calendar month, so a provider polling the platform sees it. The provider's
//! own report for the same period must name the resource and carry only
//! non-negative values.

// ============================================================================
// SECTION: Imports
// ============================================================================

use grafton_connector::MeasureReport;
use grafton_core::CaseResult;
use grafton_core::Failure;
use grafton_core::Feature;
use grafton_core::outcome::ensure;
use grafton_core::outcome::ensure_eq;
use grafton_core::outcome::ensure_ok;
use time::Month;
use time::OffsetDateTime;
use time::Time;
use time::UtcOffset;
use time::format_description::well_known::Rfc3339;

use crate::context::AcceptanceContext;
use crate::provisioning::PROVISION;

/// Label of the measures feature.
pub const RESOURCE_MEASURES: &str = "resource-measures";

// ============================================================================
// SECTION: Period
// ============================================================================

/// RFC3339 bounds of the UTC calendar month containing `now`.
///
/// # Errors
///
/// Returns a fatal failure if the bounds cannot be represented.
pub fn current_period(now: OffsetDateTime) -> Result<(String, String), Failure> {
    let out_of_range = |err: time::error::ComponentRange| Failure::fatal(format!("invalid measures period: {err}"));
    let start = now.to_offset(UtcOffset::UTC).replace_time(Time::MIDNIGHT).replace_day(1).map_err(out_of_range)?;
    let (year, month) = match start.month() {
        Month::December => (start.year() + 1, Month::January),
        month => (start.year(), month.next()),
    };
    let end = start.replace_year(year).map_err(out_of_range)?.replace_month(month).map_err(out_of_range)?;
    let format = |moment: OffsetDateTime| {
        moment.format(&Rfc3339).map_err(|err| Failure::fatal(format!("invalid measures period: {err}")))
    };
    Ok((format(start)?, format(end)?))
}

// ============================================================================
// SECTION: Feature
// ============================================================================

/// Builds the `resource-measures` feature.
#[must_use]
pub fn measures_feature() -> Feature<AcceptanceContext> {
    Feature::new(RESOURCE_MEASURES, "Pull usage measures from a Resource", pull_measures).runs_inside(PROVISION)
}

/// Default case: the provider reports sane usage for the current period.
fn pull_measures(context: &mut AcceptanceContext) -> CaseResult {
    let resource_id = context.resource_id()?;
    let (period_start, period_end) = current_period(OffsetDateTime::now_utc())?;
    context.connector.store().put_measures(
        resource_id,
        MeasureReport {
            period_start: period_start.clone(),
            period_end: period_end.clone(),
            measures: context.settings.resource_measures.clone(),
        },
    );

    context.info(&format!("Attempting to pull measures for resource: {resource_id}"));
    let report = ensure_ok(
        context.api.resource_measures(resource_id, &period_start, &period_end),
        "No error is expected",
    )?;
    ensure_eq(&report.resource_id, &resource_id, "Measures must be reported for the requested resource")?;
    for (feature, usage) in &report.measures {
        ensure(*usage >= 0, format!("Usage for `{feature}` cannot be negative, got {usage}"))?;
        context.info(&format!("  {feature} = {usage}"));
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
