//! Client entity - A person the agency runs payroll for.
//!
//! Clients are never hard-deleted; archiving flips `active` to false so their
//! paystub history stays intact.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Client database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "clients")]
pub struct Model {
    /// Unique identifier for the client
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Full legal name
    pub full_name: String,
    /// Street address
    pub address: String,
    /// Two-letter state code, always uppercase
    pub state: String,
    /// ZIP or ZIP+4
    pub zip: String,
    /// Last four digits of the SSN
    pub ssn_last4: String,
    /// Last four digits of the deposit account
    pub account_last4: String,
    /// Soft delete flag - false once the client is archived
    pub active: bool,
    /// Assigned by the store at insert time
    pub created_at: Option<DateTimeUtc>,
    /// Last modification time
    pub updated_at: Option<DateTimeUtc>,
}

/// Defines relationships between Client and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One client has many paystubs
    #[sea_orm(has_many = "super::paystub::Entity")]
    Paystubs,
    /// One client has at most one YTD baseline
    #[sea_orm(has_one = "super::ytd_baseline::Entity")]
    YtdBaseline,
}

impl Related<super::paystub::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Paystubs.def()
    }
}

impl Related<super::ytd_baseline::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::YtdBaseline.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
