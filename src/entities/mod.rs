//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities stand in for the agency's document collections.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod buy_order;
pub mod client;
pub mod insurance_policy;
pub mod paystub;
pub mod setting;
pub mod ytd_baseline;

// Re-export specific types to avoid conflicts
pub use buy_order::{
    BuyOrderStatus, Column as BuyOrderColumn, Entity as BuyOrder, Model as BuyOrderModel,
    TaxItems, TaxLineItem,
};
pub use client::{Column as ClientColumn, Entity as Client, Model as ClientModel};
pub use insurance_policy::{
    Column as InsurancePolicyColumn, Entity as InsurancePolicy, Model as InsurancePolicyModel,
    PolicyStatus,
};
pub use paystub::{Column as PaystubColumn, Entity as Paystub, Model as PaystubModel};
pub use setting::{Column as SettingColumn, Entity as Setting, Model as SettingModel};
pub use ytd_baseline::{
    Column as YtdBaselineColumn, Entity as YtdBaseline, Model as YtdBaselineModel,
};
