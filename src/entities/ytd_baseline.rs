//! YTD baseline entity - Payroll accrued before the tracked paystub history.
//!
//! One row per client, overwritten on every adjustment. Older rows may only
//! carry the combined `gross`; newer rows split it into regular and overtime.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// YTD baseline database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ytd_baselines")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning client (one baseline per client)
    #[sea_orm(unique)]
    pub client_id: i64,
    /// Calendar year the baseline applies to
    pub year: i32,
    /// Regular-time gross, absent on legacy rows
    pub regular_gross: Option<f64>,
    /// Overtime gross, absent on legacy rows
    pub overtime_gross: Option<f64>,
    /// Combined gross
    pub gross: f64,
    /// Federal withholding fraction used for the baseline
    pub federal_pct: Option<f64>,
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
    /// Last time the baseline was adjusted
    pub updated_at: Option<DateTimeUtc>,
}

/// Defines relationships between `YtdBaseline` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each baseline belongs to one client
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
    /// Regular/overtime split of the baseline gross.
    ///
    /// Legacy rows without a split count their whole gross as regular.
    #[must_use]
    pub fn gross_split(&self) -> (f64, f64) {
        if self.regular_gross.is_some() || self.overtime_gross.is_some() {
            (
                self.regular_gross.unwrap_or(0.0),
                self.overtime_gross.unwrap_or(0.0),
            )
        } else {
            (self.gross, 0.0)
        }
    }

    /// Combined gross, preferring the split columns when present.
    #[must_use]
    pub fn total_gross(&self) -> f64 {
        let (regular, overtime) = self.gross_split();
        regular + overtime
    }
}
