//! Year-to-date payroll aggregation.
//!
//! Two ways of answering "how much so far":
//!
//! * [`year_to_date`] sums the stored snapshot of every paystub created this
//!   calendar year on top of the baseline. Each period keeps the federal
//!   percent it was created with.
//! * [`year_to_date_through`] sums only gross up to and including one
//!   paystub, then recomputes withholding once on the running total using
//!   the baseline's federal percent.
//!
//! When federal percentages varied between periods the two answers differ.
//! Both are kept as-is.

use crate::{
    core::{
        client::require_client,
        money::finite_or_zero,
        payroll::{TaxBreakdown, taxes_on_gross},
        paystub::{list_paystubs_for_client, require_paystub},
        rates::PayrollRates,
    },
    entities::{YtdBaseline, paystub, ytd_baseline},
    errors::{Error, Result},
};
use chrono::{Datelike, Utc};
use sea_orm::{Set, prelude::*};
use serde::Serialize;
use tracing::{debug, info, instrument};

/// Cumulative payroll figures. Components mean the same as in
/// [`TaxBreakdown`].
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct YtdSummary {
    pub gross: f64,
    pub taxes: f64,
    pub net: f64,
    pub federal: f64,
    pub state_tax: f64,
    pub ss: f64,
    pub medicare: f64,
    /// Regular-time share of `gross`
    pub regular_gross: f64,
    /// Overtime share of `gross`
    pub overtime_gross: f64,
}

impl YtdSummary {
    fn with_breakdown(regular_gross: f64, overtime_gross: f64, t: &TaxBreakdown) -> Self {
        Self {
            gross: t.gross,
            taxes: t.taxes,
            net: t.net,
            federal: t.federal,
            state_tax: t.state_tax,
            ss: t.ss,
            medicare: t.medicare,
            regular_gross,
            overtime_gross,
        }
    }
}

fn baseline_for_year(
    baseline: Option<&ytd_baseline::Model>,
    year: i32,
) -> Option<&ytd_baseline::Model> {
    baseline.filter(|b| b.year == year)
}

/// Year to date as of now: baseline for `year` plus every stored paystub
/// snapshot created in `year`.
#[must_use]
pub fn year_to_date(
    baseline: Option<&ytd_baseline::Model>,
    paystubs: &[paystub::Model],
    year: i32,
) -> YtdSummary {
    let mut summary = YtdSummary::default();

    if let Some(b) = baseline_for_year(baseline, year) {
        let (regular, overtime) = b.gross_split();
        summary.regular_gross = regular;
        summary.overtime_gross = overtime;
        summary.gross = regular + overtime;
        summary.federal = b.federal;
        summary.state_tax = b.state_tax;
        summary.ss = b.ss;
        summary.medicare = b.medicare;
        summary.taxes = b.taxes;
        summary.net = b.net;
    }

    for stub in paystubs {
        let Some(created_at) = stub.created_at else {
            continue;
        };
        if created_at.year() != year {
            continue;
        }
        summary.gross += finite_or_zero(stub.gross);
        summary.regular_gross += stub.regular_gross();
        summary.overtime_gross += stub.overtime_gross();
        summary.federal += finite_or_zero(stub.federal);
        summary.state_tax += finite_or_zero(stub.state_tax);
        summary.ss += finite_or_zero(stub.ss);
        summary.medicare += finite_or_zero(stub.medicare);
        summary.taxes += finite_or_zero(stub.taxes);
        summary.net += finite_or_zero(stub.net);
    }

    summary
}

/// Year to date through `target`: cumulative gross of the baseline and every
/// same-year paystub created at or before `target`, taxed afresh.
///
/// Returns `None` when `target` has no creation timestamp.
#[must_use]
pub fn year_to_date_through(
    baseline: Option<&ytd_baseline::Model>,
    paystubs: &[paystub::Model],
    target: &paystub::Model,
    state: &str,
    rates: &PayrollRates,
) -> Option<YtdSummary> {
    let cutoff = target.created_at?;
    let year = cutoff.year();

    let same_year = baseline_for_year(baseline, year);
    let mut gross = same_year.map_or(0.0, |b| finite_or_zero(b.gross));
    let (mut regular, mut overtime) = same_year.map_or((0.0, 0.0), ytd_baseline::Model::gross_split);

    let included = paystubs
        .iter()
        .filter(|stub| stub.id != target.id)
        .filter(|stub| {
            stub.created_at
                .is_some_and(|at| at.year() == year && at <= cutoff)
        })
        .chain(std::iter::once(target));
    for stub in included {
        gross += finite_or_zero(stub.gross);
        regular += stub.regular_gross();
        overtime += stub.overtime_gross();
    }

    let federal_pct = baseline.and_then(|b| b.federal_pct);
    let breakdown = taxes_on_gross(rates, gross, state, federal_pct);
    Some(YtdSummary::with_breakdown(regular, overtime, &breakdown))
}

/// The stored baseline for a client, if any.
pub async fn get_baseline<C>(db: &C, client_id: i64) -> Result<Option<ytd_baseline::Model>>
where
    C: ConnectionTrait,
{
    YtdBaseline::find()
        .filter(ytd_baseline::Column::ClientId.eq(client_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Mode A for a stored client and calendar year.
pub async fn ytd_for_client(db: &DatabaseConnection, client_id: i64, year: i32) -> Result<YtdSummary> {
    let baseline = get_baseline(db, client_id).await?;
    let paystubs = list_paystubs_for_client(db, client_id).await?;
    Ok(year_to_date(baseline.as_ref(), &paystubs, year))
}

/// Mode A for the current calendar year.
pub async fn ytd_current_year(db: &DatabaseConnection, client_id: i64) -> Result<YtdSummary> {
    ytd_for_client(db, client_id, Utc::now().year()).await
}

/// Mode B for a stored paystub.
#[instrument(skip(db, rates))]
pub async fn ytd_through_paystub(
    db: &DatabaseConnection,
    rates: &PayrollRates,
    paystub_id: i64,
) -> Result<Option<YtdSummary>> {
    let target = require_paystub(db, paystub_id).await?;
    let client = require_client(db, target.client_id).await?;
    let baseline = get_baseline(db, client.id).await?;
    let paystubs = list_paystubs_for_client(db, client.id).await?;

    let summary = year_to_date_through(baseline.as_ref(), &paystubs, &target, &client.state, rates);
    if summary.is_none() {
        debug!("Paystub {paystub_id} has no creation timestamp; no YTD");
    }
    Ok(summary)
}

/// Baseline adjustment form.
#[derive(Debug, Clone, PartialEq)]
pub struct BaselineInput {
    /// Calendar year the baseline applies to
    pub year: i32,
    /// Regular-time gross accrued before tracking started
    pub regular_gross: f64,
    /// Overtime gross accrued before tracking started
    pub overtime_gross: f64,
    /// Federal withholding fraction; the rate book default when `None`
    pub federal_pct: Option<f64>,
}

/// Overwrites a client's baseline, computing its withholding on the combined
/// gross with the client's state.
#[instrument(skip(db, rates, input))]
pub async fn adjust_baseline(
    db: &DatabaseConnection,
    rates: &PayrollRates,
    client_id: i64,
    input: &BaselineInput,
) -> Result<ytd_baseline::Model> {
    if [input.regular_gross, input.overtime_gross]
        .iter()
        .any(|v| !v.is_finite() || *v < 0.0)
    {
        return Err(Error::validation("baseline gross must be a non-negative number"));
    }
    let client = require_client(db, client_id).await?;
    let federal_pct = input.federal_pct.unwrap_or(rates.default_federal_pct);
    let t = taxes_on_gross(
        rates,
        input.regular_gross + input.overtime_gross,
        &client.state,
        Some(federal_pct),
    );

    let existing = get_baseline(db, client_id).await?;
    let is_new = existing.is_none();
    let mut active_model: ytd_baseline::ActiveModel = match existing {
        Some(baseline) => baseline.into(),
        None => ytd_baseline::ActiveModel {
            client_id: Set(client_id),
            ..Default::default()
        },
    };
    active_model.year = Set(input.year);
    active_model.regular_gross = Set(Some(input.regular_gross));
    active_model.overtime_gross = Set(Some(input.overtime_gross));
    active_model.gross = Set(t.gross);
    active_model.federal_pct = Set(Some(federal_pct));
    active_model.federal = Set(t.federal);
    active_model.state_tax = Set(t.state_tax);
    active_model.ss = Set(t.ss);
    active_model.medicare = Set(t.medicare);
    active_model.taxes = Set(t.taxes);
    active_model.net = Set(t.net);
    active_model.updated_at = Set(Some(Utc::now()));

    let baseline = if is_new {
        active_model.insert(db).await?
    } else {
        active_model.update(db).await?
    };
    info!("Adjusted {} baseline for client {client_id}", input.year);
    Ok(baseline)
}
