//! Client business logic - validation, records, search and CSV export.

use crate::{
    entities::{Client, client},
    errors::{Error, Result},
};
use chrono::Utc;
use csv::{QuoteStyle, WriterBuilder};
use regex::Regex;
use sea_orm::{QueryOrder, Set, prelude::*};
use std::io::Write;
use tracing::{info, instrument};

const ZIP_PATTERN: &str = r"^\d{5}(-\d{4})?$";
const LAST4_PATTERN: &str = r"^\d{4}$";
const MIN_NAME_LEN: usize = 3;

/// US state codes accepted on a client record (50 states plus DC).
pub const US_STATES: [&str; 51] = [
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "DC", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
    "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ", "NM",
    "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT", "VA", "WA",
    "WV", "WI", "WY",
];

/// CSV column headers, in export order.
pub const CSV_HEADER: [&str; 6] = ["Name", "Address", "State", "ZIP", "SSN_last4", "Account_last4"];

/// Client form fields as entered.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientInput {
    /// Full legal name
    pub full_name: String,
    /// Street address
    pub address: String,
    /// Two-letter state code, any case
    pub state: String,
    /// `12345` or `12345-6789`
    pub zip: String,
    /// Last four digits of the SSN
    pub ssn_last4: String,
    /// Last four digits of the bank account
    pub account_last4: String,
}

/// Trims and uppercases the input, then checks every field.
///
/// # Errors
/// Returns [`Error::Validation`] describing the first invalid field.
pub fn validate_client(input: &ClientInput) -> Result<ClientInput> {
    let normalized = ClientInput {
        full_name: input.full_name.trim().to_string(),
        address: input.address.trim().to_string(),
        state: input.state.trim().to_ascii_uppercase(),
        zip: input.zip.trim().to_string(),
        ssn_last4: input.ssn_last4.trim().to_string(),
        account_last4: input.account_last4.trim().to_string(),
    };

    if normalized.full_name.chars().count() < MIN_NAME_LEN {
        return Err(Error::validation(format!(
            "full name must be at least {MIN_NAME_LEN} characters"
        )));
    }
    if normalized.address.is_empty() {
        return Err(Error::validation("address is required"));
    }
    if !US_STATES.contains(&normalized.state.as_str()) {
        return Err(Error::validation(format!(
            "'{}' is not a US state code",
            normalized.state
        )));
    }
    if !Regex::new(ZIP_PATTERN)?.is_match(&normalized.zip) {
        return Err(Error::validation("ZIP must be 12345 or 12345-6789"));
    }
    let last4 = Regex::new(LAST4_PATTERN)?;
    if !last4.is_match(&normalized.ssn_last4) {
        return Err(Error::validation("SSN last 4 must be exactly 4 digits"));
    }
    if !last4.is_match(&normalized.account_last4) {
        return Err(Error::validation("account last 4 must be exactly 4 digits"));
    }

    Ok(normalized)
}

/// Creates a client after validation. New clients are active.
#[instrument(skip(db, input), fields(name = %input.full_name))]
pub async fn create_client(db: &DatabaseConnection, input: &ClientInput) -> Result<client::Model> {
    let input = validate_client(input)?;
    let now = Utc::now();

    let client = client::ActiveModel {
        full_name: Set(input.full_name),
        address: Set(input.address),
        state: Set(input.state),
        zip: Set(input.zip),
        ssn_last4: Set(input.ssn_last4),
        account_last4: Set(input.account_last4),
        active: Set(true),
        created_at: Set(Some(now)),
        updated_at: Set(Some(now)),
        ..Default::default()
    };

    let created = client.insert(db).await?;
    info!("Created client {}", created.id);
    Ok(created)
}

/// Replaces a client's fields after validation.
pub async fn update_client(
    db: &DatabaseConnection,
    client_id: i64,
    input: &ClientInput,
) -> Result<client::Model> {
    let input = validate_client(input)?;
    let existing = require_client(db, client_id).await?;

    let mut active_model: client::ActiveModel = existing.into();
    active_model.full_name = Set(input.full_name);
    active_model.address = Set(input.address);
    active_model.state = Set(input.state);
    active_model.zip = Set(input.zip);
    active_model.ssn_last4 = Set(input.ssn_last4);
    active_model.account_last4 = Set(input.account_last4);
    active_model.updated_at = Set(Some(Utc::now()));
    Ok(active_model.update(db).await?)
}

/// Finds a client by id regardless of archive state.
pub async fn get_client_by_id<C>(db: &C, client_id: i64) -> Result<Option<client::Model>>
where
    C: ConnectionTrait,
{
    Client::find_by_id(client_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Like [`get_client_by_id`] but a missing client is an error.
pub async fn require_client<C>(db: &C, client_id: i64) -> Result<client::Model>
where
    C: ConnectionTrait,
{
    get_client_by_id(db, client_id)
        .await?
        .ok_or(Error::ClientNotFound { id: client_id })
}

/// Lists active or archived clients, newest first.
pub async fn list_clients(db: &DatabaseConnection, active: bool) -> Result<Vec<client::Model>> {
    Client::find()
        .filter(client::Column::Active.eq(active))
        .order_by_desc(client::Column::CreatedAt)
        .order_by_desc(client::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

async fn set_active(db: &DatabaseConnection, client_id: i64, active: bool) -> Result<client::Model> {
    let existing = require_client(db, client_id).await?;
    let mut active_model: client::ActiveModel = existing.into();
    active_model.active = Set(active);
    active_model.updated_at = Set(Some(Utc::now()));
    let updated = active_model.update(db).await?;
    info!("Client {client_id} active = {active}");
    Ok(updated)
}

/// Soft-deletes a client. Paystubs and baseline are kept.
pub async fn archive_client(db: &DatabaseConnection, client_id: i64) -> Result<client::Model> {
    set_active(db, client_id, false).await
}

/// Brings an archived client back.
pub async fn restore_client(db: &DatabaseConnection, client_id: i64) -> Result<client::Model> {
    set_active(db, client_id, true).await
}

/// Case-insensitive substring match over the searchable client fields.
#[must_use]
pub fn search_clients<'a>(clients: &'a [client::Model], query: &str) -> Vec<&'a client::Model> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return clients.iter().collect();
    }
    clients
        .iter()
        .filter(|c| {
            [
                &c.full_name,
                &c.address,
                &c.state,
                &c.zip,
                &c.ssn_last4,
                &c.account_last4,
            ]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
        })
        .collect()
}

/// Writes clients as CSV with every field quoted.
pub fn export_clients_csv<W: Write>(clients: &[client::Model], writer: W) -> Result<()> {
    let mut csv = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_writer(writer);

    csv.write_record(CSV_HEADER)?;
    for c in clients {
        csv.write_record([
            &c.full_name,
            &c.address,
            &c.state,
            &c.zip,
            &c.ssn_last4,
            &c.account_last4,
        ])?;
    }
    csv.flush()?;
    Ok(())
}
