//! Insurance policy entity - Holder, vehicle and policy metadata.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum PolicyStatus {
    /// In force
    #[sea_orm(string_value = "active")]
    Active,
    /// Past its end date
    #[sea_orm(string_value = "expired")]
    Expired,
    /// Awaiting carrier confirmation
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Archived by the agency
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl PolicyStatus {
    /// Storage/display label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Pending => "pending",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for PolicyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PolicyStatus {
    type Err = crate::errors::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "expired" => Ok(Self::Expired),
            "pending" => Ok(Self::Pending),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(crate::errors::Error::validation(format!(
                "unknown policy status '{other}'"
            ))),
        }
    }
}

/// Insurance policy database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "insurance_policies")]
pub struct Model {
    /// Unique identifier for the policy
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Policy holder name
    pub holder_name: String,
    /// Insurance carrier
    pub carrier: String,
    /// Carrier policy number
    pub policy_number: String,
    /// Insured vehicle VIN
    pub vin: String,
    /// Vehicle model year as entered
    pub year: String,
    /// Vehicle make
    pub make: String,
    /// Vehicle model
    pub model: String,
    /// Holder address
    pub address: String,
    /// Holder state code
    pub state: String,
    /// Coverage start
    pub start_date: Option<Date>,
    /// Coverage end
    pub end_date: Option<Date>,
    /// Premium amount
    pub premium: Option<f64>,
    /// Lifecycle status
    pub status: PolicyStatus,
    /// Assigned by the store at insert time
    pub created_at: Option<DateTimeUtc>,
    /// Last modification time
    pub updated_at: Option<DateTimeUtc>,
}

/// Policies have no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
