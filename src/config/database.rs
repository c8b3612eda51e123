//! Database configuration module.
//!
//! This module handles the `SQLite` connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust
//! structs. Creation is idempotent (`IF NOT EXISTS`) so it can run on every start.

use crate::entities::{BuyOrder, Client, InsurancePolicy, Paystub, Setting, YtdBaseline};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use tracing::{debug, info, instrument};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/agency_desk.sqlite?mode=rwc";

/// Gets the database URL from the `DATABASE_URL` environment variable or
/// returns the default local `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by [`get_database_url`].
#[instrument]
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    debug!("Connecting to {database_url}");
    Database::connect(&database_url).await.map_err(Into::into)
}

async fn create_table<E: EntityTrait>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<()> {
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

/// Creates every collection table if it does not exist yet.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let schema = Schema::new(db.get_database_backend());

    create_table(db, &schema, Client).await?;
    create_table(db, &schema, Paystub).await?;
    create_table(db, &schema, YtdBaseline).await?;
    create_table(db, &schema, BuyOrder).await?;
    create_table(db, &schema, InsurancePolicy).await?;
    create_table(db, &schema, Setting).await?;

    info!("Database tables ensured.");
    Ok(())
}
