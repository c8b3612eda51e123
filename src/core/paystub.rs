//! Paystub business logic.
//!
//! A paystub freezes the withholding computed at creation time. Rate changes
//! made afterwards never touch existing rows.

use crate::{
    core::{
        client::require_client,
        payroll::{PayPeriodInput, compute_pay_period},
        rates::PayrollRates,
    },
    entities::{Paystub, client, paystub},
    errors::{Error, Result},
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{info, instrument};

/// Number of paystubs created by one bulk request.
pub const BATCH_SIZE: usize = 4;

/// Pay amounts for a period, as entered on the paystub form.
#[derive(Debug, Clone, PartialEq)]
pub struct PayAmounts {
    /// Regular hours
    pub hours: f64,
    /// Regular hourly rate
    pub rate: f64,
    /// Overtime hours
    pub overtime_hours: f64,
    /// Overtime hourly rate
    pub overtime_rate: f64,
    /// Federal withholding fraction; the rate book default when `None`
    pub federal_pct: Option<f64>,
}

/// How far apart bulk-created periods are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayCadence {
    /// 7-day periods
    Weekly,
    /// 14-day periods
    Biweekly,
}

impl PayCadence {
    /// Period length in days.
    #[must_use]
    pub const fn days(self) -> i64 {
        match self {
            Self::Weekly => 7,
            Self::Biweekly => 14,
        }
    }

    /// Start and end of the `index`-th period after `first_start`.
    #[must_use]
    pub fn period(self, first_start: NaiveDate, index: usize) -> (NaiveDate, NaiveDate) {
        let len = self.days();
        #[allow(clippy::cast_possible_wrap)]
        let start = first_start + Duration::days(len * index as i64);
        (start, start + Duration::days(len - 1))
    }
}

impl std::str::FromStr for PayCadence {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weekly" => Ok(Self::Weekly),
            "biweekly" => Ok(Self::Biweekly),
            other => Err(Error::validation(format!("unknown pay cadence '{other}'"))),
        }
    }
}

fn validate_amounts(amounts: &PayAmounts) -> Result<()> {
    let fields = [
        ("hours", amounts.hours),
        ("rate", amounts.rate),
        ("overtime hours", amounts.overtime_hours),
        ("overtime rate", amounts.overtime_rate),
    ];
    for (name, value) in fields {
        if !value.is_finite() || value < 0.0 {
            return Err(Error::validation(format!(
                "{name} must be a non-negative number"
            )));
        }
    }
    if amounts
        .federal_pct
        .is_some_and(|pct| !(0.0..=1.0).contains(&pct))
    {
        return Err(Error::validation("federal percent must be between 0 and 100"));
    }
    Ok(())
}

fn build_paystub(
    rates: &PayrollRates,
    client: &client::Model,
    period: (NaiveDate, NaiveDate),
    amounts: &PayAmounts,
    created_at: DateTime<Utc>,
) -> Result<paystub::ActiveModel> {
    validate_amounts(amounts)?;
    let (period_start, period_end) = period;
    if period_end < period_start {
        return Err(Error::validation("period end is before period start"));
    }

    let federal_pct = amounts.federal_pct.unwrap_or(rates.default_federal_pct);
    let breakdown = compute_pay_period(
        rates,
        &PayPeriodInput {
            hours: amounts.hours,
            rate: amounts.rate,
            overtime_hours: amounts.overtime_hours,
            overtime_rate: amounts.overtime_rate,
            state: client.state.clone(),
            federal_pct: Some(federal_pct),
        },
    );

    Ok(paystub::ActiveModel {
        client_id: Set(client.id),
        client_name: Set(client.full_name.clone()),
        period_start: Set(period_start),
        period_end: Set(period_end),
        hours: Set(amounts.hours),
        rate: Set(amounts.rate),
        overtime_hours: Set(amounts.overtime_hours),
        overtime_rate: Set(amounts.overtime_rate),
        federal_pct: Set(federal_pct),
        gross: Set(breakdown.gross),
        federal: Set(breakdown.federal),
        state_tax: Set(breakdown.state_tax),
        ss: Set(breakdown.ss),
        medicare: Set(breakdown.medicare),
        taxes: Set(breakdown.taxes),
        net: Set(breakdown.net),
        created_at: Set(Some(created_at)),
        ..Default::default()
    })
}

/// Creates one paystub for a client, snapshotting its withholding.
#[instrument(skip(db, rates, amounts))]
pub async fn create_paystub(
    db: &DatabaseConnection,
    rates: &PayrollRates,
    client_id: i64,
    period_start: NaiveDate,
    period_end: NaiveDate,
    amounts: &PayAmounts,
) -> Result<paystub::Model> {
    let client = require_client(db, client_id).await?;
    let paystub = build_paystub(rates, &client, (period_start, period_end), amounts, Utc::now())?
        .insert(db)
        .await?;
    info!("Created paystub {} for client {}", paystub.id, client_id);
    Ok(paystub)
}

/// Creates [`BATCH_SIZE`] consecutive paystubs with the same amounts.
///
/// All rows are written in one transaction. Creation timestamps step by one
/// millisecond so the periods sort in chronological order.
#[instrument(skip(db, rates, amounts))]
pub async fn create_paystub_batch(
    db: &DatabaseConnection,
    rates: &PayrollRates,
    client_id: i64,
    first_start: NaiveDate,
    cadence: PayCadence,
    amounts: &PayAmounts,
) -> Result<Vec<paystub::Model>> {
    let txn = db.begin().await?;
    let client = require_client(&txn, client_id).await?;
    let now = Utc::now();

    let mut created = Vec::with_capacity(BATCH_SIZE);
    for index in 0..BATCH_SIZE {
        #[allow(clippy::cast_possible_wrap)]
        let created_at = now + Duration::milliseconds(index as i64);
        let model = build_paystub(
            rates,
            &client,
            cadence.period(first_start, index),
            amounts,
            created_at,
        )?;
        created.push(model.insert(&txn).await?);
    }

    txn.commit().await?;
    info!("Created {} paystubs for client {}", created.len(), client_id);
    Ok(created)
}

/// A client's paystubs, newest first.
pub async fn list_paystubs_for_client<C>(db: &C, client_id: i64) -> Result<Vec<paystub::Model>>
where
    C: ConnectionTrait,
{
    Paystub::find()
        .filter(paystub::Column::ClientId.eq(client_id))
        .order_by_desc(paystub::Column::CreatedAt)
        .order_by_desc(paystub::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Every paystub, newest first.
pub async fn list_paystubs(db: &DatabaseConnection) -> Result<Vec<paystub::Model>> {
    Paystub::find()
        .order_by_desc(paystub::Column::CreatedAt)
        .order_by_desc(paystub::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds a paystub by id, erroring when it does not exist.
pub async fn require_paystub<C>(db: &C, paystub_id: i64) -> Result<paystub::Model>
where
    C: ConnectionTrait,
{
    Paystub::find_by_id(paystub_id)
        .one(db)
        .await?
        .ok_or(Error::PaystubNotFound { id: paystub_id })
}

/// Deletes a paystub. This is the only mutation a paystub ever sees.
pub async fn delete_paystub(db: &DatabaseConnection, paystub_id: i64) -> Result<()> {
    let paystub = require_paystub(db, paystub_id).await?;
    paystub.delete(db).await?;
    info!("Deleted paystub {paystub_id}");
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::{create_test_client, date, pay_amounts, setup_test_db};

    #[test]
    fn test_cadence_periods() {
        let first = date(2025, 1, 6);
        assert_eq!(
            PayCadence::Weekly.period(first, 0),
            (date(2025, 1, 6), date(2025, 1, 12))
        );
        assert_eq!(
            PayCadence::Weekly.period(first, 3),
            (date(2025, 1, 27), date(2025, 2, 2))
        );
        assert_eq!(
            PayCadence::Biweekly.period(first, 1),
            (date(2025, 1, 20), date(2025, 2, 2))
        );
        assert_eq!("BiWeekly".parse::<PayCadence>().unwrap(), PayCadence::Biweekly);
        assert!("monthly".parse::<PayCadence>().is_err());
    }

    #[tokio::test]
    async fn test_create_paystub_snapshots_taxes() -> Result<()> {
        let db = setup_test_db().await?;
        let rates = PayrollRates::default();
        let client = create_test_client(&db, "Jane Doe").await?;

        let mut amounts = pay_amounts(40.0, 25.0);
        amounts.overtime_hours = 2.0;
        amounts.overtime_rate = 37.5;
        let stub = create_paystub(&db, &rates, client.id, date(2025, 3, 1), date(2025, 3, 14), &amounts)
            .await?;

        assert_eq!(stub.gross, 1075.0);
        assert_eq!(stub.regular_gross(), 1000.0);
        assert_eq!(stub.overtime_gross(), 75.0);
        assert_eq!(stub.client_name, "Jane Doe");
        assert_eq!(stub.federal_pct, 0.12);
        assert!((stub.state_tax - 1075.0 * 0.044).abs() < 1e-9);
        assert!((stub.net - (stub.gross - stub.taxes)).abs() < 1e-9);
        assert!(stub.created_at.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_create_paystub_rejects_bad_input() -> Result<()> {
        let db = setup_test_db().await?;
        let rates = PayrollRates::default();
        let client = create_test_client(&db, "Jane Doe").await?;

        let negative = pay_amounts(-1.0, 25.0);
        assert!(matches!(
            create_paystub(&db, &rates, client.id, date(2025, 3, 1), date(2025, 3, 7), &negative).await,
            Err(Error::Validation { .. })
        ));

        let ok = pay_amounts(40.0, 25.0);
        assert!(matches!(
            create_paystub(&db, &rates, client.id, date(2025, 3, 7), date(2025, 3, 1), &ok).await,
            Err(Error::Validation { .. })
        ));
        assert!(matches!(
            create_paystub(&db, &rates, 42, date(2025, 3, 1), date(2025, 3, 7), &ok).await,
            Err(Error::ClientNotFound { id: 42 })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_batch_creates_four_ordered_periods() -> Result<()> {
        let db = setup_test_db().await?;
        let rates = PayrollRates::default();
        let client = create_test_client(&db, "Jane Doe").await?;

        let created = create_paystub_batch(
            &db,
            &rates,
            client.id,
            date(2025, 1, 6),
            PayCadence::Biweekly,
            &pay_amounts(80.0, 20.0),
        )
        .await?;
        assert_eq!(created.len(), BATCH_SIZE);
        assert_eq!(created[3].period_start, date(2025, 2, 17));
        assert_eq!(created[3].period_end, date(2025, 3, 2));

        // Newest first: the last period created sorts first
        let listed = list_paystubs_for_client(&db, client.id).await?;
        assert_eq!(listed.len(), 4);
        assert_eq!(listed[0].id, created[3].id);
        assert!(listed.windows(2).all(|w| w[0].created_at > w[1].created_at));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_paystub() -> Result<()> {
        let db = setup_test_db().await?;
        let rates = PayrollRates::default();
        let client = create_test_client(&db, "Jane Doe").await?;
        let stub = create_paystub(
            &db,
            &rates,
            client.id,
            date(2025, 3, 1),
            date(2025, 3, 7),
            &pay_amounts(10.0, 10.0),
        )
        .await?;

        delete_paystub(&db, stub.id).await?;
        assert!(list_paystubs_for_client(&db, client.id).await?.is_empty());
        assert!(matches!(
            delete_paystub(&db, stub.id).await,
            Err(Error::PaystubNotFound { .. })
        ));
        Ok(())
    }
}
