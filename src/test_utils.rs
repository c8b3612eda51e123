//! Shared test utilities for `AgencyDesk`.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test records with sensible defaults.

#![allow(clippy::unwrap_used)]

use crate::{
    core::{
        buy_order::BuyOrderInput,
        client::{self, ClientInput},
        insurance::PolicyInput,
        payroll::taxes_on_gross,
        paystub::PayAmounts,
        rates::PayrollRates,
    },
    entities::{self, BuyOrderStatus, PolicyStatus, TaxItems},
    errors::Result,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use sea_orm::DatabaseConnection;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Calendar date shorthand.
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Midnight UTC on the given day.
pub fn ts(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).single().unwrap()
}

/// A valid client form.
///
/// # Defaults
/// * state: "CO", zip: "80202"
/// * ssn last 4: "1234", account last 4: "5678"
pub fn client_input(name: &str) -> ClientInput {
    ClientInput {
        full_name: name.to_string(),
        address: "1 Main St".to_string(),
        state: "CO".to_string(),
        zip: "80202".to_string(),
        ssn_last4: "1234".to_string(),
        account_last4: "5678".to_string(),
    }
}

/// Creates an active Colorado client.
pub async fn create_test_client(
    db: &DatabaseConnection,
    name: &str,
) -> Result<entities::client::Model> {
    client::create_client(db, &client_input(name)).await
}

/// Regular-time pay with the default federal percent.
pub const fn pay_amounts(hours: f64, rate: f64) -> PayAmounts {
    PayAmounts {
        hours,
        rate,
        overtime_hours: 0.0,
        overtime_rate: 0.0,
        federal_pct: None,
    }
}

/// An unsaved Colorado paystub whose regular gross equals `gross`.
pub fn paystub_model(
    id: i64,
    gross: f64,
    federal_pct: f64,
    created_at: Option<DateTime<Utc>>,
) -> entities::paystub::Model {
    let t = taxes_on_gross(&PayrollRates::default(), gross, "CO", Some(federal_pct));
    entities::paystub::Model {
        id,
        client_id: 1,
        client_name: "Jane Doe".to_string(),
        period_start: date(2025, 1, 1),
        period_end: date(2025, 1, 14),
        hours: gross,
        rate: 1.0,
        overtime_hours: 0.0,
        overtime_rate: 0.0,
        federal_pct,
        gross: t.gross,
        federal: t.federal,
        state_tax: t.state_tax,
        ss: t.ss,
        medicare: t.medicare,
        taxes: t.taxes,
        net: t.net,
        created_at,
    }
}

/// An unsaved Colorado baseline with its withholding computed.
pub fn baseline_model(
    year: i32,
    regular_gross: f64,
    overtime_gross: f64,
    federal_pct: Option<f64>,
) -> entities::ytd_baseline::Model {
    let t = taxes_on_gross(
        &PayrollRates::default(),
        regular_gross + overtime_gross,
        "CO",
        federal_pct,
    );
    entities::ytd_baseline::Model {
        id: 1,
        client_id: 1,
        year,
        regular_gross: Some(regular_gross),
        overtime_gross: Some(overtime_gross),
        gross: t.gross,
        federal_pct,
        federal: t.federal,
        state_tax: t.state_tax,
        ss: t.ss,
        medicare: t.medicare,
        taxes: t.taxes,
        net: t.net,
        updated_at: None,
    }
}

/// A Denver sale form with the default filing fee.
pub fn buy_order_input(buyer: &str, price: f64) -> BuyOrderInput {
    BuyOrderInput {
        buyer_name: buyer.to_string(),
        address: "1 Main St".to_string(),
        city: "Denver".to_string(),
        state: "CO".to_string(),
        zip: "80202".to_string(),
        vin: "1HGCM82633A004352".to_string(),
        year: "2018".to_string(),
        make: "Honda".to_string(),
        model: "Accord".to_string(),
        price,
        ..BuyOrderInput::default()
    }
}

/// An unsaved buy order with zero amounts and no tax items.
pub fn buy_order_model(buyer: &str) -> entities::buy_order::Model {
    entities::buy_order::Model {
        id: 1,
        buyer_name: buyer.to_string(),
        address: "1 Main St".to_string(),
        phone: "303-555-0100".to_string(),
        city: "Denver".to_string(),
        state: "CO".to_string(),
        zip: "80202".to_string(),
        license_number: "123456789".to_string(),
        birth_date: "1990-04-01".to_string(),
        vin: "1HGCM82633A004352".to_string(),
        year: "2018".to_string(),
        make: "Honda".to_string(),
        model: "Accord".to_string(),
        body: "Sedan".to_string(),
        color: "Blue".to_string(),
        mileage: "64000".to_string(),
        cylinders: "4".to_string(),
        fuel_type: "Gas".to_string(),
        stock_number: "A-101".to_string(),
        salesman: "Sam".to_string(),
        source: String::new(),
        price: 0.0,
        fee: 0.0,
        down_payment: 0.0,
        trade_allowance: None,
        tax_items: TaxItems::default(),
        state_tax: 0.0,
        city_tax: 0.0,
        total_taxes: 0.0,
        subtotal: 0.0,
        total_with_fees: 0.0,
        balance_due: 0.0,
        status: BuyOrderStatus::Draft,
        created_at: Some(ts(2025, 3, 1)),
        updated_at: None,
    }
}

/// An active policy form.
pub fn policy_input(holder: &str, policy_number: &str) -> PolicyInput {
    PolicyInput {
        holder_name: holder.to_string(),
        carrier: "Acme Mutual".to_string(),
        policy_number: policy_number.to_string(),
        vin: "1HGCM82633A004352".to_string(),
        year: "2018".to_string(),
        make: "Honda".to_string(),
        model: "Accord".to_string(),
        address: "1 Main St".to_string(),
        state: "CO".to_string(),
        start_date: Some(date(2025, 1, 1)),
        end_date: Some(date(2025, 12, 31)),
        premium: 1_200.0,
        status: PolicyStatus::Active,
    }
}
