//! Insurance policy tracking.

use crate::{
    entities::{InsurancePolicy, PolicyStatus, insurance_policy},
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::info;

/// Policy form fields.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyInput {
    /// Policy holder name
    pub holder_name: String,
    /// Insurance carrier
    pub carrier: String,
    /// Carrier policy number
    pub policy_number: String,
    /// Insured vehicle VIN
    pub vin: String,
    /// Vehicle year as entered
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
    pub start_date: Option<NaiveDate>,
    /// Coverage end
    pub end_date: Option<NaiveDate>,
    /// Premium amount
    pub premium: f64,
    /// Lifecycle status
    pub status: PolicyStatus,
}

fn validate(input: &PolicyInput) -> Result<()> {
    for (label, value) in [
        ("holder name", &input.holder_name),
        ("carrier", &input.carrier),
        ("policy number", &input.policy_number),
        ("state", &input.state),
    ] {
        if value.trim().is_empty() {
            return Err(Error::validation(format!("{label} is required")));
        }
    }
    if !input.premium.is_finite() || input.premium < 0.0 {
        return Err(Error::validation("premium must be a non-negative number"));
    }
    if let (Some(start), Some(end)) = (input.start_date, input.end_date) {
        if end < start {
            return Err(Error::validation("coverage ends before it starts"));
        }
    }
    Ok(())
}

fn apply(model: &mut insurance_policy::ActiveModel, input: &PolicyInput) {
    model.holder_name = Set(input.holder_name.trim().to_string());
    model.carrier = Set(input.carrier.trim().to_string());
    model.policy_number = Set(input.policy_number.trim().to_string());
    model.vin = Set(input.vin.trim().to_string());
    model.year = Set(input.year.trim().to_string());
    model.make = Set(input.make.trim().to_string());
    model.model = Set(input.model.trim().to_string());
    model.address = Set(input.address.trim().to_string());
    model.state = Set(input.state.trim().to_ascii_uppercase());
    model.start_date = Set(input.start_date);
    model.end_date = Set(input.end_date);
    model.premium = Set(Some(input.premium));
    model.status = Set(input.status);
    model.updated_at = Set(Some(Utc::now()));
}

/// Creates a policy.
pub async fn create_policy(
    db: &DatabaseConnection,
    input: &PolicyInput,
) -> Result<insurance_policy::Model> {
    validate(input)?;
    let mut model = insurance_policy::ActiveModel {
        created_at: Set(Some(Utc::now())),
        ..Default::default()
    };
    apply(&mut model, input);
    let policy = model.insert(db).await?;
    info!("Created policy {} ({})", policy.id, policy.policy_number);
    Ok(policy)
}

/// Replaces a policy's fields.
pub async fn update_policy(
    db: &DatabaseConnection,
    policy_id: i64,
    input: &PolicyInput,
) -> Result<insurance_policy::Model> {
    validate(input)?;
    let mut model: insurance_policy::ActiveModel = require_policy(db, policy_id).await?.into();
    apply(&mut model, input);
    Ok(model.update(db).await?)
}

/// Finds a policy by id, erroring when it does not exist.
pub async fn require_policy(
    db: &DatabaseConnection,
    policy_id: i64,
) -> Result<insurance_policy::Model> {
    InsurancePolicy::find_by_id(policy_id)
        .one(db)
        .await?
        .ok_or(Error::PolicyNotFound { id: policy_id })
}

/// Moves a policy to `status`.
pub async fn set_policy_status(
    db: &DatabaseConnection,
    policy_id: i64,
    status: PolicyStatus,
) -> Result<insurance_policy::Model> {
    let mut model: insurance_policy::ActiveModel = require_policy(db, policy_id).await?.into();
    model.status = Set(status);
    model.updated_at = Set(Some(Utc::now()));
    let policy = model.update(db).await?;
    info!("Policy {policy_id} is now {status}");
    Ok(policy)
}

/// Archives a policy by cancelling it.
pub async fn archive_policy(
    db: &DatabaseConnection,
    policy_id: i64,
) -> Result<insurance_policy::Model> {
    set_policy_status(db, policy_id, PolicyStatus::Cancelled).await
}

/// Deletes a policy.
pub async fn delete_policy(db: &DatabaseConnection, policy_id: i64) -> Result<()> {
    require_policy(db, policy_id).await?.delete(db).await?;
    info!("Deleted policy {policy_id}");
    Ok(())
}

/// Every policy, grouped by status name, newest first within a status.
pub async fn list_policies(db: &DatabaseConnection) -> Result<Vec<insurance_policy::Model>> {
    InsurancePolicy::find()
        .order_by_asc(insurance_policy::Column::Status)
        .order_by_desc(insurance_policy::Column::CreatedAt)
        .order_by_desc(insurance_policy::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Number of policies currently in force.
pub async fn count_active_policies(db: &DatabaseConnection) -> Result<u64> {
    InsurancePolicy::find()
        .filter(insurance_policy::Column::Status.eq(PolicyStatus::Active))
        .count(db)
        .await
        .map_err(Into::into)
}

/// Case-insensitive match over holder, carrier, policy number, state and status.
#[must_use]
pub fn search_policies<'a>(
    policies: &'a [insurance_policy::Model],
    query: &str,
) -> Vec<&'a insurance_policy::Model> {
    let needle = query.trim().to_lowercase();
    policies
        .iter()
        .filter(|p| {
            needle.is_empty()
                || [
                    p.holder_name.as_str(),
                    p.carrier.as_str(),
                    p.policy_number.as_str(),
                    p.state.as_str(),
                    p.status.as_str(),
                ]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
        })
        .collect()
}
