//! Dashboard counters: recent activity against the 30 days before it.

use crate::{
    core::insurance::count_active_policies,
    entities::{Client, Paystub, client, paystub},
    errors::Result,
};
use chrono::{DateTime, Duration, Utc};
use sea_orm::prelude::*;
use serde::Serialize;

/// Length of one comparison window.
pub const WINDOW_DAYS: i64 = 30;

/// Headline numbers for the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    /// Every client, archived included
    pub clients_total: u64,
    /// Clients created in the last window
    pub clients_30d: u64,
    /// Clients created in the window before that
    pub clients_prev_30d: u64,
    /// Paystubs created in the last window
    pub paystubs_30d: u64,
    /// Paystubs created in the window before that
    pub paystubs_prev_30d: u64,
    /// Policies with status `active`
    pub active_policies: u64,
    /// Percent change of new clients between windows
    pub client_growth_pct: f64,
    /// Percent change of new paystubs between windows
    pub paystub_growth_pct: f64,
}

/// Percent change from `prev` to `curr`; 100 when growing from zero.
#[must_use]
pub fn pct_change(curr: u64, prev: u64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let (curr, prev) = (curr as f64, prev as f64);
    if prev == 0.0 {
        return if curr > 0.0 { 100.0 } else { 0.0 };
    }
    (curr - prev) / prev * 100.0
}

/// Formats a percent change as `+12.5%`.
#[must_use]
pub fn format_pct(value: f64) -> String {
    let sign = if value >= 0.0 { "+" } else { "" };
    format!("{sign}{value:.1}%")
}

/// Computes the dashboard counters relative to `now`.
///
/// The current window is `(now − 30d, ∞)`, the previous one
/// `[now − 60d, now − 30d)`.
pub async fn dashboard_stats(db: &DatabaseConnection, now: DateTime<Utc>) -> Result<DashboardStats> {
    let since = now - Duration::days(WINDOW_DAYS);
    let prev_since = since - Duration::days(WINDOW_DAYS);

    let clients_total = Client::find().count(db).await?;
    let clients_30d = Client::find()
        .filter(client::Column::CreatedAt.gt(since))
        .count(db)
        .await?;
    let clients_prev_30d = Client::find()
        .filter(client::Column::CreatedAt.gte(prev_since))
        .filter(client::Column::CreatedAt.lt(since))
        .count(db)
        .await?;

    let paystubs_30d = Paystub::find()
        .filter(paystub::Column::CreatedAt.gt(since))
        .count(db)
        .await?;
    let paystubs_prev_30d = Paystub::find()
        .filter(paystub::Column::CreatedAt.gte(prev_since))
        .filter(paystub::Column::CreatedAt.lt(since))
        .count(db)
        .await?;

    Ok(DashboardStats {
        clients_total,
        clients_30d,
        clients_prev_30d,
        paystubs_30d,
        paystubs_prev_30d,
        active_policies: count_active_policies(db).await?,
        client_growth_pct: pct_change(clients_30d, clients_prev_30d),
        paystub_growth_pct: pct_change(paystubs_30d, paystubs_prev_30d),
    })
}
