//! Paystub entity - One pay period for one client.
//!
//! Every derived figure is a snapshot taken when the paystub was created.
//! Nothing here is recomputed if rate tables change later.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Paystub database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "paystubs")]
pub struct Model {
    /// Unique identifier for the paystub
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning client
    pub client_id: i64,
    /// Client name at the time the paystub was issued
    pub client_name: String,
    /// First day of the pay period
    pub period_start: Date,
    /// Last day of the pay period
    pub period_end: Date,
    /// Regular hours worked
    pub hours: f64,
    /// Regular hourly rate
    pub rate: f64,
    /// Overtime hours worked
    pub overtime_hours: f64,
    /// Overtime hourly rate
    pub overtime_rate: f64,
    /// Federal withholding as a fraction (0.12 = 12%)
    pub federal_pct: f64,
    /// `hours × rate + overtime_hours × overtime_rate`
    pub gross: f64,
    /// Federal withholding amount
    pub federal: f64,
    /// State withholding amount
    pub state_tax: f64,
    /// Social Security amount
    pub ss: f64,
    /// Medicare amount
    pub medicare: f64,
    /// Sum of the four tax components
    pub taxes: f64,
    /// `gross − taxes`
    pub net: f64,
    /// Assigned by the store at insert time; `None` while unresolved
    pub created_at: Option<DateTimeUtc>,
}

/// Defines relationships between Paystub and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each paystub belongs to one client
    #[sea_orm(
        belongs_to = "super::client::Entity",
        from = "Column::ClientId",
        to = "super::client::Column::Id"
    )]
    Client,
}

impl Related<super::client::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Client.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Regular-time portion of gross.
    #[must_use]
    pub fn regular_gross(&self) -> f64 {
        self.hours * self.rate
    }

    /// Overtime portion of gross.
    #[must_use]
    pub fn overtime_gross(&self) -> f64 {
        self.overtime_hours * self.overtime_rate
    }
}
