//! Rate tables for payroll withholding and vehicle sales tax.
//!
//! A [`RateBook`] is loaded once per session (built-ins, then `config.toml`,
//! then the persisted settings document) and passed explicitly into every
//! computation. Edits only take effect after [`RateBook::reload`].
//!
//! Jurisdiction records keep their component keys in the order they were
//! written, because buy order line items are emitted in that order.

use crate::{
    config::AppConfig,
    core::{money::finite_or_zero, settings},
    errors::{Error, Result},
};
use sea_orm::ConnectionTrait;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

/// Social Security withholding fraction, applied regardless of state
pub const SOCIAL_SECURITY_PCT: f64 = 0.062;
/// Medicare withholding fraction, applied regardless of state
pub const MEDICARE_PCT: f64 = 0.0145;
/// Federal withholding fraction used when none is selected
pub const DEFAULT_FEDERAL_PCT: f64 = 0.12;
/// Flat filing fee used when a sale does not specify one
pub const DEFAULT_FILING_FEE: f64 = 47.20;
/// Jurisdiction used when a sale's city has no rate record
pub const DEFAULT_JURISDICTION: &str = "Denver";
/// Settings document key holding the jurisdiction override
pub const TAX_RATES_SETTING_KEY: &str = "tax_rates";

const COMPONENT_KEYS: [&str; 5] = ["state", "county", "city", "cd", "rtd"];

// Colorado sales tax, percentage points per component
const BUILTIN_CITY_RATES: &[(&str, [f64; 5])] = &[
    ("Arvada", [2.90, 0.50, 3.46, 0.10, 1.00]),
    ("Denver", [2.90, 0.00, 5.15, 0.10, 1.00]),
    ("Aurora", [2.90, 0.25, 3.75, 0.10, 1.00]),
    ("Colorado_Springs", [2.90, 1.23, 3.07, 0.00, 1.00]),
    ("Lakewood", [2.90, 0.50, 3.00, 0.10, 1.00]),
    ("Westminster", [2.90, 0.75, 3.85, 0.10, 1.00]),
    ("Thornton", [2.90, 0.75, 3.75, 0.10, 1.00]),
    ("Littleton", [2.90, 0.25, 3.75, 0.10, 1.00]),
    ("Englewood", [2.90, 0.25, 3.80, 0.10, 1.00]),
    ("Wheat_Ridge", [2.90, 0.50, 3.50, 0.10, 1.00]),
    ("Broomfield", [2.90, 0.00, 4.15, 0.10, 1.00]),
    ("Centennial", [2.90, 0.25, 2.50, 0.10, 1.00]),
    ("Parker", [2.90, 1.00, 3.00, 0.10, 1.00]),
    ("Brighton", [2.90, 0.75, 3.75, 0.10, 1.00]),
    ("Golden", [2.90, 0.50, 3.00, 0.10, 1.00]),
    ("Longmont", [2.90, 1.19, 3.53, 0.10, 1.00]),
    ("Boulder", [2.90, 1.19, 3.86, 0.10, 1.00]),
    ("Fort_Collins", [2.90, 0.80, 4.35, 0.00, 0.00]),
    ("Pueblo", [2.90, 1.00, 3.70, 0.00, 0.00]),
    ("Greeley", [2.90, 0.00, 4.11, 0.00, 0.00]),
];

// State income tax withholding, percentage points
const BUILTIN_STATE_RATES: &[(&str, f64)] = &[
    ("TX", 0.0),
    ("CO", 4.4),
    ("UT", 4.85),
    ("FL", 0.0),
    ("NY", 6.33),
    ("CA", 6.0),
    ("NJ", 5.5),
];

/// A named percentage component of a jurisdiction's sales tax.
#[derive(Debug, Clone, PartialEq)]
pub struct RateComponent {
    /// Component key (`state`, `county`, `city`, `cd`, `rtd`, ...)
    pub key: String,
    /// Percentage points, e.g. `2.90` for 2.90%
    pub percent: f64,
}

/// Ordered tax components for one jurisdiction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RateRecord {
    components: Vec<RateComponent>,
}

impl RateRecord {
    /// Builds a record from `(key, percent)` pairs, keeping their order.
    pub fn new<K: Into<String>>(pairs: impl IntoIterator<Item = (K, f64)>) -> Self {
        let mut record = Self::default();
        for (key, percent) in pairs {
            record.set(key, percent);
        }
        record
    }

    /// Components in insertion order.
    #[must_use]
    pub fn components(&self) -> &[RateComponent] {
        &self.components
    }

    /// Percentage points for a component key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<f64> {
        self.components
            .iter()
            .find(|c| c.key == key)
            .map(|c| c.percent)
    }

    /// Sets a component, replacing it in place or appending a new key.
    pub fn set(&mut self, key: impl Into<String>, percent: f64) {
        let key = key.into();
        let percent = finite_or_zero(percent);
        match self.components.iter_mut().find(|c| c.key == key) {
            Some(existing) => existing.percent = percent,
            None => self.components.push(RateComponent { key, percent }),
        }
    }

    /// Sum of all components in percentage points.
    #[must_use]
    pub fn total_percent(&self) -> f64 {
        self.components.iter().map(|c| c.percent).sum()
    }
}

/// Percentages may be stored as numbers or as the raw text typed into the
/// settings form.
#[derive(Deserialize)]
#[serde(untagged)]
enum PercentInput {
    Number(f64),
    Text(String),
}

impl PercentInput {
    fn into_percent(self) -> f64 {
        match self {
            Self::Number(n) => finite_or_zero(n),
            Self::Text(text) => crate::core::money::coerce(&text),
        }
    }
}

impl Serialize for RateRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.components.len()))?;
        for component in &self.components {
            map.serialize_entry(&component.key, &component.percent)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RateRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct RecordVisitor;

        impl<'de> Visitor<'de> for RecordVisitor {
            type Value = RateRecord;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of tax component percentages")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<RateRecord, A::Error> {
                let mut record = RateRecord::default();
                while let Some((key, value)) = map.next_entry::<String, Option<PercentInput>>()? {
                    record.set(key, value.map_or(0.0, PercentInput::into_percent));
                }
                Ok(record)
            }
        }

        deserializer.deserialize_map(RecordVisitor)
    }
}

/// Jurisdiction (city) → rate record, in display order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JurisdictionRates {
    records: Vec<(String, RateRecord)>,
}

impl JurisdictionRates {
    /// The built-in Colorado table.
    #[must_use]
    pub fn builtin() -> Self {
        let mut rates = Self::default();
        for (city, percents) in BUILTIN_CITY_RATES {
            rates.insert(*city, builtin_record(percents));
        }
        rates
    }

    /// Looks up a jurisdiction by exact key.
    #[must_use]
    pub fn get(&self, city: &str) -> Option<&RateRecord> {
        self.records
            .iter()
            .find(|(name, _)| name == city)
            .map(|(_, record)| record)
    }

    /// Mutable lookup by exact key.
    pub fn get_mut(&mut self, city: &str) -> Option<&mut RateRecord> {
        self.records
            .iter_mut()
            .find(|(name, _)| name == city)
            .map(|(_, record)| record)
    }

    /// Inserts or replaces a jurisdiction, keeping the position of an existing key.
    pub fn insert(&mut self, city: impl Into<String>, record: RateRecord) {
        let city = city.into();
        match self.get_mut(&city) {
            Some(existing) => *existing = record,
            None => self.records.push((city, record)),
        }
    }

    /// Jurisdiction keys in display order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|(name, _)| name.as_str())
    }

    /// `(city, record)` pairs in display order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RateRecord)> {
        self.records.iter().map(|(name, record)| (name.as_str(), record))
    }

    /// Number of jurisdictions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when the table has no jurisdictions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Resolves the record for `city`.
    ///
    /// Falls back to `default_key` when the city is blank or unknown, and to
    /// the built-in Denver record when the default is missing too.
    #[must_use]
    pub fn resolve(&self, city: Option<&str>, default_key: &str) -> Cow<'_, RateRecord> {
        let requested = city
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(default_key);

        if let Some(record) = self.get(requested) {
            return Cow::Borrowed(record);
        }
        if let Some(record) = self.get(default_key) {
            debug!("No rates for '{requested}', using default jurisdiction '{default_key}'");
            return Cow::Borrowed(record);
        }
        warn!("No rates for '{requested}' or '{default_key}', using built-in default");
        Cow::Owned(builtin_default_record())
    }
}

impl Serialize for JurisdictionRates {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.records.len()))?;
        for (city, record) in &self.records {
            map.serialize_entry(city, record)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for JurisdictionRates {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = JurisdictionRates;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of jurisdiction rate records")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<JurisdictionRates, A::Error> {
                let mut rates = JurisdictionRates::default();
                while let Some((city, record)) = map.next_entry::<String, RateRecord>()? {
                    rates.insert(city, record);
                }
                Ok(rates)
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

fn builtin_record(percents: &[f64; 5]) -> RateRecord {
    RateRecord::new(COMPONENT_KEYS.iter().copied().zip(percents.iter().copied()))
}

/// The hardcoded last-resort jurisdiction record (Denver).
#[must_use]
pub fn builtin_default_record() -> RateRecord {
    BUILTIN_CITY_RATES
        .iter()
        .find(|(city, _)| *city == DEFAULT_JURISDICTION)
        .map_or_else(
            || RateRecord::new([("state", 2.90), ("city", 5.15), ("cd", 0.10), ("rtd", 1.00)]),
            |(_, percents)| builtin_record(percents),
        )
}

/// Flat payroll withholding by state plus the fixed FICA fractions.
#[derive(Debug, Clone, PartialEq)]
pub struct PayrollRates {
    /// State code → percentage points
    states: BTreeMap<String, f64>,
    /// Social Security fraction
    pub social_security_pct: f64,
    /// Medicare fraction
    pub medicare_pct: f64,
    /// Federal fraction used when a period or baseline does not carry one
    pub default_federal_pct: f64,
}

impl Default for PayrollRates {
    fn default() -> Self {
        Self {
            states: BUILTIN_STATE_RATES
                .iter()
                .map(|(state, pct)| ((*state).to_string(), *pct))
                .collect(),
            social_security_pct: SOCIAL_SECURITY_PCT,
            medicare_pct: MEDICARE_PCT,
            default_federal_pct: DEFAULT_FEDERAL_PCT,
        }
    }
}

impl PayrollRates {
    /// Merges state overrides (percentage points) over the current table.
    #[must_use]
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, f64>) -> Self {
        for (state, pct) in overrides {
            self.states
                .insert(state.trim().to_ascii_uppercase(), finite_or_zero(*pct));
        }
        self
    }

    /// State withholding as a fraction; zero for unknown states.
    #[must_use]
    pub fn state_pct(&self, state: &str) -> f64 {
        self.states
            .get(&state.trim().to_ascii_uppercase())
            .map_or(0.0, |pct| pct / 100.0)
    }

    /// `(state, percentage points)` pairs in alphabetical order.
    pub fn states(&self) -> impl Iterator<Item = (&str, f64)> {
        self.states.iter().map(|(state, pct)| (state.as_str(), *pct))
    }
}

/// Settings document body as persisted under [`TAX_RATES_SETTING_KEY`].
#[derive(Debug, Serialize, Deserialize)]
struct TaxRatesDocument {
    rates: JurisdictionRates,
}

/// Every rate table and default a computation needs.
#[derive(Debug, Clone, PartialEq)]
pub struct RateBook {
    /// Sales tax by jurisdiction
    pub jurisdictions: JurisdictionRates,
    /// Fallback jurisdiction key
    pub default_jurisdiction: String,
    /// Payroll withholding
    pub payroll: PayrollRates,
    /// Filing fee applied when a sale leaves it unspecified
    pub filing_fee: f64,
}

impl Default for RateBook {
    fn default() -> Self {
        Self {
            jurisdictions: JurisdictionRates::builtin(),
            default_jurisdiction: DEFAULT_JURISDICTION.to_string(),
            payroll: PayrollRates::default(),
            filing_fee: DEFAULT_FILING_FEE,
        }
    }
}

impl RateBook {
    /// Built-in tables with the `config.toml` overrides applied.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        let mut payroll = PayrollRates::default().with_overrides(&config.payroll_rates);
        payroll.default_federal_pct = finite_or_zero(config.defaults.federal_pct) / 100.0;

        Self {
            jurisdictions: config
                .city_rates
                .clone()
                .unwrap_or_else(JurisdictionRates::builtin),
            default_jurisdiction: config.defaults.jurisdiction.clone(),
            payroll,
            filing_fee: finite_or_zero(config.defaults.filing_fee),
        }
    }

    /// Loads the book for a session: config overrides, then the persisted
    /// jurisdiction table if one has been saved.
    ///
    /// A settings document that cannot be parsed is logged and ignored.
    pub async fn load<C: ConnectionTrait>(db: &C, config: &AppConfig) -> Result<Self> {
        let mut book = Self::from_config(config);
        if let Some(stored) = settings::get_setting(db, TAX_RATES_SETTING_KEY).await? {
            match serde_json::from_str::<TaxRatesDocument>(&stored) {
                Ok(document) if !document.rates.is_empty() => {
                    info!(
                        "Loaded {} jurisdictions from stored tax rates",
                        document.rates.len()
                    );
                    book.jurisdictions = document.rates;
                }
                Ok(_) => debug!("Stored tax rates are empty; keeping configured table"),
                Err(e) => warn!("Ignoring unreadable stored tax rates: {e}"),
            }
        }
        Ok(book)
    }

    /// Re-reads the configuration and stored settings, replacing this book.
    pub async fn reload<C: ConnectionTrait>(&mut self, db: &C, config: &AppConfig) -> Result<()> {
        *self = Self::load(db, config).await?;
        Ok(())
    }

    /// Persists the jurisdiction table as the stored override.
    pub async fn save_jurisdictions<C: ConnectionTrait>(&self, db: &C) -> Result<()> {
        let document = TaxRatesDocument {
            rates: self.jurisdictions.clone(),
        };
        settings::put_setting(db, TAX_RATES_SETTING_KEY, serde_json::to_string(&document)?).await
    }

    /// Resolves a city's record through the fallback chain.
    #[must_use]
    pub fn resolve_jurisdiction(&self, city: Option<&str>) -> Cow<'_, RateRecord> {
        self.jurisdictions.resolve(city, &self.default_jurisdiction)
    }

    /// Edits one component of an existing jurisdiction.
    ///
    /// # Errors
    /// Returns a validation error when the jurisdiction is unknown.
    pub fn set_component(&mut self, city: &str, key: &str, percent: f64) -> Result<()> {
        let record = self
            .jurisdictions
            .get_mut(city)
            .ok_or_else(|| Error::validation(format!("unknown jurisdiction '{city}'")))?;
        record.set(key, percent);
        Ok(())
    }
}
