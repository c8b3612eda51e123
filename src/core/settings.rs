//! Persisted settings documents.
//!
//! Each document is a JSON string stored under a unique key in the
//! `settings` table.

use crate::{
    entities::{Setting, setting},
    errors::Result,
};
use chrono::Utc;
use sea_orm::{Set, prelude::*};

/// Reads the raw JSON body stored under `key`.
///
/// # Returns
/// * `Ok(Some(value))` - The stored document
/// * `Ok(None)` - Nothing has been saved under this key
pub async fn get_setting<C>(db: &C, key: &str) -> Result<Option<String>>
where
    C: ConnectionTrait,
{
    let stored = Setting::find()
        .filter(setting::Column::Key.eq(key))
        .one(db)
        .await?;
    Ok(stored.map(|s| s.value))
}

/// Writes `value` under `key`, replacing any previous document.
pub async fn put_setting<C>(db: &C, key: &str, value: String) -> Result<()>
where
    C: ConnectionTrait,
{
    let now = Utc::now();

    let existing = Setting::find()
        .filter(setting::Column::Key.eq(key))
        .one(db)
        .await?;

    if let Some(stored) = existing {
        let mut active_model: setting::ActiveModel = stored.into();
        active_model.value = Set(value);
        active_model.updated_at = Set(now);
        active_model.update(db).await?;
    } else {
        let new_setting = setting::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value),
            updated_at: Set(now),
            ..Default::default()
        };
        new_setting.insert(db).await?;
    }

    Ok(())
}
