//! Buy order entity - A vehicle sale transaction.
//!
//! Tax line items are computed from the rate book while the order is being
//! edited and frozen into the row when it is saved.

use sea_orm::FromJsonQueryResult;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One jurisdiction tax component applied to a sale.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaxLineItem {
    /// Component key in the rate table (`state`, `county`, ...)
    pub key: String,
    /// Display name shown on screens and documents
    pub name: String,
    /// Decimal fraction (0.029 for 2.90%)
    pub pct: f64,
    /// Percentage points as stored in the rate table (2.90)
    pub pct_percent: f64,
    /// `price × pct`
    pub amount: f64,
}

/// Ordered tax line items, stored as a JSON column.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct TaxItems(pub Vec<TaxLineItem>);

impl TaxItems {
    /// Finds the line item for a component key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&TaxLineItem> {
        self.0.iter().find(|item| item.key == key)
    }

    /// Amount for a component key, zero when the component is absent.
    #[must_use]
    pub fn amount(&self, key: &str) -> f64 {
        self.get(key).map_or(0.0, |item| item.amount)
    }

    /// Iterates the line items in rate-table order.
    pub fn iter(&self) -> std::slice::Iter<'_, TaxLineItem> {
        self.0.iter()
    }
}

/// Registration status of a buy order
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum BuyOrderStatus {
    /// Saved but not yet registered with the state
    #[default]
    #[sea_orm(string_value = "draft")]
    Draft,
    /// Registration completed
    #[sea_orm(string_value = "registered")]
    Registered,
}

impl std::fmt::Display for BuyOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => f.write_str("draft"),
            Self::Registered => f.write_str("registered"),
        }
    }
}

/// Buy order database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "buy_orders")]
pub struct Model {
    /// Unique identifier for the buy order
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Purchaser full name
    pub buyer_name: String,
    /// Purchaser street address
    pub address: String,
    /// Purchaser phone
    pub phone: String,
    /// Jurisdiction key used for sales tax (e.g. `Colorado_Springs`)
    pub city: String,
    /// Purchaser state code
    pub state: String,
    /// Purchaser ZIP
    pub zip: String,
    /// Purchaser driver license number
    pub license_number: String,
    /// Purchaser date of birth as entered
    pub birth_date: String,
    /// Vehicle identification number
    pub vin: String,
    /// Model year as entered
    pub year: String,
    /// Vehicle make
    pub make: String,
    /// Vehicle model
    pub model: String,
    /// Body style
    pub body: String,
    /// Exterior color
    pub color: String,
    /// Odometer reading as entered
    pub mileage: String,
    /// Cylinder count as entered
    pub cylinders: String,
    /// Fuel type
    pub fuel_type: String,
    /// Dealer stock number
    pub stock_number: String,
    /// Salesperson name
    pub salesman: String,
    /// Lead source
    pub source: String,
    /// Vehicle selling price
    pub price: f64,
    /// Flat filing fee
    pub fee: f64,
    /// Cash down payment
    pub down_payment: f64,
    /// Trade-in allowance, if any
    pub trade_allowance: Option<f64>,
    /// Frozen tax line items
    pub tax_items: TaxItems,
    /// State component amount, kept for list views
    pub state_tax: f64,
    /// City component amount, kept for list views
    pub city_tax: f64,
    /// Sum of all tax line items
    pub total_taxes: f64,
    /// `price + total_taxes`
    pub subtotal: f64,
    /// `subtotal + fee`
    pub total_with_fees: f64,
    /// `max(0, total_with_fees − down_payment)`
    pub balance_due: f64,
    /// Registration status
    pub status: BuyOrderStatus,
    /// Assigned by the store at insert time
    pub created_at: Option<DateTimeUtc>,
    /// Last modification time
    pub updated_at: Option<DateTimeUtc>,
}

/// Buy orders have no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
