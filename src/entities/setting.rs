//! Settings entity - Singleton documents keyed by name.
//!
//! Holds the persisted override of the jurisdiction rate table under the
//! `tax_rates` key. Values are JSON text.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Settings database model - stores key/JSON-value pairs
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "settings")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Document key (e.g., `"tax_rates"`)
    #[sea_orm(unique)]
    pub key: String,
    /// Document body as JSON text
    pub value: String,
    /// When this document was last saved
    pub updated_at: DateTimeUtc,
}

/// `Setting` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
