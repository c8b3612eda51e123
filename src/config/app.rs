//! Application configuration loading from config.toml
//!
//! `config.toml` carries the dealer's static letterhead, business defaults and
//! optional overrides of the built-in rate tables. A missing file is not an
//! error: the built-in defaults are used and a warning is logged.

use crate::core::rates::JurisdictionRates;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// Environment variable naming an alternative config file
pub const CONFIG_PATH_ENV: &str = "AGENCY_CONFIG";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Dealer letterhead printed on buy order documents
    #[serde(default)]
    pub dealer: DealerProfile,
    /// Business defaults
    #[serde(default)]
    pub defaults: Defaults,
    /// State code → withholding percentage points, merged over the built-ins
    #[serde(default)]
    pub payroll_rates: BTreeMap<String, f64>,
    /// Replaces the built-in jurisdiction table when present
    #[serde(default)]
    pub city_rates: Option<JurisdictionRates>,
}

/// Static dealer information for the buy order form header
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DealerProfile {
    /// Dealer legal name
    pub name: String,
    /// Street address line
    pub address: String,
    /// "City, ST ZIP" line
    pub city_state_zip: String,
    /// Phone number
    pub phone: String,
}

impl Default for DealerProfile {
    fn default() -> Self {
        Self {
            name: "WEST AUTOMOTIVE LLC".to_string(),
            address: "1826 E Platte Ave Suite 224 E".to_string(),
            city_state_zip: "Colorado Springs, CO 80909".to_string(),
            phone: "719-822-6527".to_string(),
        }
    }
}

/// Business defaults applied when a form leaves a value unspecified
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Flat filing fee added to every sale
    pub filing_fee: f64,
    /// Jurisdiction used when a sale's city has no rate record
    pub jurisdiction: String,
    /// Federal withholding in percentage points (12 = 12%)
    pub federal_pct: f64,
    /// Purchaser state assumed for new buy orders
    pub buyer_state: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            filing_fee: 47.20,
            jurisdiction: "Denver".to_string(),
            federal_pct: 12.0,
            buyer_state: "CO".to_string(),
        }
    }
}

/// Loads the application configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse {}: {e}", path_ref.display()),
    })
}

/// Loads the configuration from `$AGENCY_CONFIG` or `./config.toml`.
///
/// Falls back to [`AppConfig::default`] when the file does not exist.
pub fn load_default_config() -> Result<AppConfig> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config.toml".to_string());
    if !Path::new(&path).exists() {
        warn!("No configuration file at {path}; using built-in defaults");
        return Ok(AppConfig::default());
    }
    load_config(path)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            [dealer]
            name = "EAST MOTORS"
            phone = "555-0100"

            [defaults]
            filing_fee = 50.0
            jurisdiction = "Aurora"

            [payroll_rates]
            CO = 4.25
            WA = 0.0

            [city_rates.Aurora]
            state = 2.9
            county = 0.25
            city = 3.75

            [city_rates.Boulder]
            state = 2.9
            city = 3.86
        "#;

        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.dealer.name, "EAST MOTORS");
        // Unspecified dealer fields keep their defaults
        assert_eq!(config.dealer.address, "1826 E Platte Ave Suite 224 E");
        assert_eq!(config.defaults.filing_fee, 50.0);
        assert_eq!(config.defaults.jurisdiction, "Aurora");
        assert_eq!(config.defaults.federal_pct, 12.0);
        assert_eq!(config.payroll_rates.get("CO"), Some(&4.25));

        let cities = config.city_rates.unwrap();
        let names: Vec<&str> = cities.names().collect();
        assert_eq!(names, vec!["Aurora", "Boulder"]);
        let aurora = cities.get("Aurora").unwrap();
        let keys: Vec<&str> = aurora.components().iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["state", "county", "city"]);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.defaults, Defaults::default());
        assert_eq!(config.dealer, DealerProfile::default());
        assert!(config.city_rates.is_none());
        assert!(config.payroll_rates.is_empty());
    }

    #[test]
    fn test_load_config_missing_file_is_error() {
        let result = load_config("/definitely/not/here/config.toml");
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
