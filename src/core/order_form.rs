//! Buy order document: maps a stored order onto the dealer's form fields.
//!
//! Every text field is resolved in this order:
//!
//! 1. `TotalFees` and `Payoff` (by normalized name) are always left blank.
//! 2. A non-blank value from the direct field-name table.
//! 3. A non-blank value from the normalized alias table.
//! 4. Name heuristics: trade allowance, selling price, subtotal, ambiguous
//!    "total" names, cash down, amount to finance.
//!
//! Ambiguous "total" names fill two slots in turn, tracked by [`TotalSlot`]:
//! the first one (or a `SubTotal` field) takes the selling price, the next
//! one takes the tax-inclusive total, and any later ones stay blank.

use crate::{
    config::DealerProfile,
    core::{
        form_template::{Alignment, FieldKind, FormField, FormTemplate, TemplateSource},
        money::{finite_or_zero, format_currency, format_nonzero},
    },
    entities::buy_order,
    errors::Result,
};
use chrono::Utc;
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

const DEALER_NAME_FONT: f32 = 14.0;
const VIN_FONT: f32 = 11.5;
const DEFAULT_FONT: f32 = 12.0;
const DEBUG_LABEL_FONT: f32 = 8.0;

/// Normalized names that are never filled.
const FORCED_BLANK: [&str; 2] = ["totalfees", "payoff"];

/// Derived money figures printed on the form.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OrderFigures {
    /// State component
    pub state_tax: f64,
    /// City component
    pub city_tax: f64,
    /// County component, printed as "misc" tax
    pub county_tax: f64,
    /// RTD plus CD components
    pub rtd_combined: f64,
    /// Sum of the four printed tax amounts
    pub total_taxes: f64,
    /// `price + total_taxes`
    pub total_price: f64,
    /// `total_price + fee`
    pub total_other_fees: f64,
    /// Cash down payment
    pub cash_down: f64,
    /// `total_other_fees − cash_down`, not clamped
    pub amount_to_finance: f64,
}

impl OrderFigures {
    /// Figures for a stored order, from its frozen tax items.
    #[must_use]
    pub fn from_order(order: &buy_order::Model) -> Self {
        let items = &order.tax_items;
        let state_tax = finite_or_zero(items.amount("state"));
        let city_tax = finite_or_zero(items.amount("city"));
        let county_tax = finite_or_zero(items.amount("county"));
        let rtd_combined = finite_or_zero(items.amount("rtd")) + finite_or_zero(items.amount("cd"));

        let total_taxes = state_tax + city_tax + county_tax + rtd_combined;
        let total_price = finite_or_zero(order.price) + total_taxes;
        let total_other_fees = total_price + finite_or_zero(order.fee);
        let cash_down = finite_or_zero(order.down_payment);

        Self {
            state_tax,
            city_tax,
            county_tax,
            rtd_combined,
            total_taxes,
            total_price,
            total_other_fees,
            cash_down,
            amount_to_finance: total_other_fees - cash_down,
        }
    }
}

/// Lowercases and strips everything that is not an ASCII letter or digit.
#[must_use]
pub fn normalize_field_name(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Which slot the next ambiguous "total" field fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TotalSlot {
    /// Nothing filled yet; the next total shows the selling price
    #[default]
    AwaitingSubtotal,
    /// Subtotal filled; the next total shows the tax-inclusive total
    AwaitingTotal,
    /// Both slots filled; later totals repeat the tax-inclusive total
    Done,
}

/// Figure assigned to an ambiguous "total" field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalFigure {
    /// Vehicle price before taxes
    SellingPrice,
    /// Price plus taxes
    TotalWithTaxes,
}

impl TotalSlot {
    /// State after a subtotal field received a value.
    #[must_use]
    pub const fn subtotal_filled(self) -> Self {
        match self {
            Self::AwaitingSubtotal => Self::AwaitingTotal,
            other => other,
        }
    }

    /// Claims the figure for an ambiguous total field and advances.
    #[must_use]
    pub const fn claim_total(self) -> (TotalFigure, Self) {
        match self {
            Self::AwaitingSubtotal => (TotalFigure::SellingPrice, Self::AwaitingTotal),
            Self::AwaitingTotal | Self::Done => (TotalFigure::TotalWithTaxes, Self::Done),
        }
    }
}

/// Where a field's value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    /// Always blank
    Forced,
    /// Exact field name
    Direct,
    /// Normalized name or known variant
    Alias,
    /// Field name pattern
    Heuristic,
    /// Nothing matched
    Unresolved,
}

/// The resolved content of one text field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldAssignment {
    /// Field name in the template
    pub name: String,
    /// Text to write; blank means leave the field untouched
    pub value: String,
    /// Which rule produced `value`
    pub source: ValueSource,
    /// Font size in points
    pub font_size: f32,
    /// Numeric fields are right-aligned
    pub right_align: bool,
}

struct HeuristicRules {
    trade: Regex,
    selling_price: Regex,
    subtotal: Regex,
    total: Regex,
    other: Regex,
    cash_down: Regex,
    amount_to_finance: Regex,
    vin: Regex,
    right_align: Regex,
}

impl HeuristicRules {
    fn compile() -> Result<Self> {
        let ci = |pattern: &str| RegexBuilder::new(pattern).case_insensitive(true).build();
        Ok(Self {
            trade: ci(
                r"\b(allow|trade|used vehicle allowance|usedvehicleallowance|allowance)\b",
            )?,
            selling_price: ci(r"^(price|salesprice|sellingprice)$")?,
            subtotal: ci(r"^subtotal$")?,
            total: ci(r"\b(total|balanceowed|pluspayoff|totalwithtaxes|totalamount)\b")?,
            other: ci("other")?,
            cash_down: ci(r"^cashdn$")?,
            amount_to_finance: ci(r"^amtfin$")?,
            vin: ci("vin")?,
            right_align: ci(
                r"\b(Price|Allow|CityTax|StTax|SalesPrice|CashDn|AmtFin|FilingFee|Fees|TotalFees)\b",
            )?,
        })
    }
}

/// Resolves field names to values for one order.
pub struct FieldMapper {
    direct: HashMap<&'static str, String>,
    aliases: HashMap<String, String>,
    selling_price: String,
    total_with_taxes: String,
    trade_allowance: String,
    cash_down: String,
    amount_to_finance: String,
    rules: HeuristicRules,
}

fn rate_text(order: &buy_order::Model, key: &str) -> String {
    order
        .tax_items
        .get(key)
        .map_or_else(String::new, |item| format!("{:.2}", item.pct_percent))
}

fn deal_date(order: &buy_order::Model) -> String {
    order
        .created_at
        .unwrap_or_else(Utc::now)
        .format("%-m/%-d/%Y")
        .to_string()
}

fn mileage_text(mileage: &str) -> String {
    let mileage = mileage.trim();
    if !mileage.is_empty() && mileage.parse::<f64>().is_ok() {
        mileage.to_string()
    } else {
        String::new()
    }
}

impl FieldMapper {
    /// Builds the lookup tables for `order`.
    pub fn new(order: &buy_order::Model, dealer: &DealerProfile) -> Result<Self> {
        let figures = OrderFigures::from_order(order);
        let selling_price = format_nonzero(order.price);
        let total_with_taxes = format_nonzero(figures.total_price);
        let total_other_fees = format_nonzero(figures.total_other_fees);
        let cash_down = format_nonzero(figures.cash_down);
        let amount_to_finance = format_nonzero(figures.amount_to_finance);

        let rtd_rate = order.tax_items.get("rtd").map_or(0.0, |i| i.pct_percent)
            + order.tax_items.get("cd").map_or(0.0, |i| i.pct_percent);
        let buyer_csz = format!(
            "{}, {} {}",
            order.city.replace('_', " "),
            order.state,
            order.zip
        )
        .trim()
        .to_string();

        let direct: HashMap<&'static str, String> = [
            ("DlrName", dealer.name.clone()),
            ("DlrAddress", dealer.address.clone()),
            ("DlrCSZ", dealer.city_state_zip.clone()),
            ("DlrPh", dealer.phone.clone()),
            ("Slsmn", order.salesman.clone()),
            ("StockNo", order.stock_number.clone()),
            ("DealDate", deal_date(order)),
            ("Buyer", order.buyer_name.clone()),
            ("Address", order.address.clone()),
            ("BuyerCSZ", buyer_csz),
            ("HomePh", order.phone.clone()),
            ("BuyerDL", order.license_number.clone()),
            ("BuyerDOB", order.birth_date.clone()),
            ("Yr", order.year.clone()),
            ("Make", order.make.clone()),
            ("Model", order.model.clone()),
            ("Body", order.body.clone()),
            ("Color", order.color.clone()),
            ("Miles", mileage_text(&order.mileage)),
            ("VIN", order.vin.clone()),
            ("Cyl", order.cylinders.clone()),
            ("FuelType", order.fuel_type.clone()),
            ("Price", selling_price.clone()),
            ("SalesPrice", total_with_taxes.clone()),
            ("StTax", format_nonzero(figures.state_tax)),
            ("StTaxRate", rate_text(order, "state")),
            ("CityTax", format_nonzero(figures.city_tax)),
            ("CityTaxRate", rate_text(order, "city")),
            ("MiscTax", format_nonzero(figures.county_tax)),
            ("MiscTaxRate", rate_text(order, "county")),
            ("RTDTax", format_nonzero(figures.rtd_combined)),
            (
                "RTDTaxRate",
                if rtd_rate == 0.0 {
                    String::new()
                } else {
                    format!("{rtd_rate:.2}")
                },
            ),
            ("FilingFee", format_nonzero(order.fee)),
            (
                "FilingFeeDesc",
                if order.fee == 0.0 {
                    String::new()
                } else {
                    "Filing Fee".to_string()
                },
            ),
            ("TotalFees", String::new()),
            ("Payoff", String::new()),
            ("Fees", total_other_fees.clone()),
            ("Total", total_with_taxes.clone()),
            ("CashDn", cash_down.clone()),
            ("AmtFin", amount_to_finance.clone()),
        ]
        .into_iter()
        .collect();

        let mut aliases: HashMap<String, String> = direct
            .iter()
            .map(|(name, value)| (normalize_field_name(name), value.clone()))
            .collect();
        for (alias, value) in [
            ("total", &total_with_taxes),
            ("subtotal", &selling_price),
            ("balanceowed", &total_with_taxes),
            ("pluspayoff", &total_with_taxes),
            ("totalwithtaxes", &total_with_taxes),
            ("totalotherfees", &total_other_fees),
            ("totalother", &total_other_fees),
            ("otherfees", &total_other_fees),
            ("fees", &total_other_fees),
            ("cashdn", &cash_down),
            ("totalcashdownpayment", &cash_down),
            ("amounttofinance", &amount_to_finance),
            ("amtfin", &amount_to_finance),
            ("salesprice", &total_with_taxes),
        ] {
            aliases.insert(alias.to_string(), value.clone());
        }

        Ok(Self {
            direct,
            aliases,
            selling_price,
            total_with_taxes,
            trade_allowance: format_currency(order.trade_allowance.map_or(0.0, finite_or_zero)),
            cash_down,
            amount_to_finance,
            rules: HeuristicRules::compile()?,
        })
    }

    fn total_figure(&self, figure: TotalFigure) -> String {
        match figure {
            TotalFigure::SellingPrice => self.selling_price.clone(),
            TotalFigure::TotalWithTaxes => self.total_with_taxes.clone(),
        }
    }

    fn heuristic(&self, name: &str, slot: &mut TotalSlot) -> String {
        let trimmed = name.trim();
        let lower = trimmed.to_lowercase();
        let mut value = String::new();

        if self.rules.trade.is_match(&lower) {
            value.clone_from(&self.trade_allowance);
        }
        if value.is_empty() && self.rules.selling_price.is_match(trimmed) {
            value.clone_from(&self.selling_price);
        }
        if value.is_empty() && self.rules.subtotal.is_match(trimmed) {
            value.clone_from(&self.selling_price);
        }
        if value.is_empty() && self.rules.total.is_match(&lower) && !self.rules.other.is_match(&lower)
        {
            let (figure, next) = slot.claim_total();
            *slot = next;
            value = self.total_figure(figure);
        }
        if value.is_empty() && self.rules.cash_down.is_match(trimmed) {
            value.clone_from(&self.cash_down);
        }
        if value.is_empty() && self.rules.amount_to_finance.is_match(trimmed) {
            value.clone_from(&self.amount_to_finance);
        }
        value
    }

    /// Resolves one field, advancing `slot` when a total slot is consumed.
    pub fn resolve(&self, name: &str, slot: &mut TotalSlot) -> (String, ValueSource) {
        let normalized = normalize_field_name(name);
        if FORCED_BLANK.contains(&normalized.as_str()) {
            return (String::new(), ValueSource::Forced);
        }

        let (value, source) = match self.direct.get(name).filter(|v| !v.trim().is_empty()) {
            Some(value) => (value.clone(), ValueSource::Direct),
            None => match self.aliases.get(&normalized).filter(|v| !v.trim().is_empty()) {
                Some(value) => (value.clone(), ValueSource::Alias),
                None => {
                    let value = self.heuristic(name, slot);
                    if value.trim().is_empty() {
                        (String::new(), ValueSource::Unresolved)
                    } else {
                        (value, ValueSource::Heuristic)
                    }
                }
            },
        };

        if normalized == "subtotal" && !value.is_empty() {
            *slot = slot.subtotal_filled();
        }
        (value, source)
    }

    /// Font size for a field.
    #[must_use]
    pub fn font_size(&self, name: &str) -> f32 {
        if name.eq_ignore_ascii_case("DlrName") {
            DEALER_NAME_FONT
        } else if self.rules.vin.is_match(name) {
            VIN_FONT
        } else {
            DEFAULT_FONT
        }
    }

    /// Whether a field holds a right-aligned figure.
    #[must_use]
    pub fn right_aligned(&self, name: &str) -> bool {
        self.rules.right_align.is_match(name)
    }
}

/// Resolves every text field of a template, in template order.
///
/// Non-text fields are skipped. Blank assignments are included so callers
/// can see what was left empty.
pub fn map_fields(
    order: &buy_order::Model,
    dealer: &DealerProfile,
    fields: &[FormField],
) -> Result<Vec<FieldAssignment>> {
    let mapper = FieldMapper::new(order, dealer)?;
    let mut slot = TotalSlot::default();

    Ok(fields
        .iter()
        .filter(|field| {
            let is_text = field.kind == FieldKind::Text;
            if !is_text {
                debug!("Skipping non-text field '{}' ({:?})", field.name, field.kind);
            }
            is_text
        })
        .map(|field| {
            let (value, source) = mapper.resolve(&field.name, &mut slot);
            FieldAssignment {
                font_size: mapper.font_size(&field.name),
                right_align: mapper.right_aligned(&field.name),
                name: field.name.clone(),
                value,
                source,
            }
        })
        .collect())
}

/// Options for filling a form.
#[derive(Debug, Clone, Copy, Default)]
pub struct FillOptions {
    /// Write each field's own name at 8pt instead of its value
    pub debug_labels: bool,
}

/// Outcome of filling a form.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FillReport {
    /// Fields written
    pub filled: usize,
    /// Fields in the template
    pub total: usize,
    /// Fields whose write failed
    pub failed: Vec<String>,
    /// Set when nothing at all was written
    pub warning: Option<String>,
}

fn write_debug_label<T: FormTemplate>(template: &mut T, name: &str) -> Result<()> {
    template.set_text(name, name)?;
    template.set_font_size(name, DEBUG_LABEL_FONT)
}

fn write_assignment<T: FormTemplate>(template: &mut T, assignment: &FieldAssignment) -> Result<()> {
    template.set_text(&assignment.name, &assignment.value)?;
    if let Err(e) = template.set_font_size(&assignment.name, assignment.font_size) {
        debug!("Font size not applied to '{}': {e}", assignment.name);
    }
    if assignment.right_align {
        if let Err(e) = template.set_alignment(&assignment.name, Alignment::Right) {
            debug!("Alignment not applied to '{}': {e}", assignment.name);
        }
    }
    Ok(())
}

/// Writes an order into a loaded template. Does not flatten.
///
/// A failed field is logged and skipped; the remaining fields are still
/// written.
pub fn fill_form<T: FormTemplate>(
    template: &mut T,
    order: &buy_order::Model,
    dealer: &DealerProfile,
    options: FillOptions,
) -> Result<FillReport> {
    let fields = template.fields();
    let assignments = map_fields(order, dealer, &fields)?;
    let mut report = FillReport {
        total: fields.len(),
        ..FillReport::default()
    };

    for assignment in &assignments {
        if options.debug_labels {
            match write_debug_label(template, &assignment.name) {
                Ok(()) => {
                    report.filled += 1;
                    continue;
                }
                Err(e) => warn!("Debug label not written to '{}': {e}", assignment.name),
            }
        }

        if assignment.value.trim().is_empty() {
            debug!("'{}' left blank ({:?})", assignment.name, assignment.source);
            continue;
        }

        match write_assignment(template, assignment) {
            Ok(()) => {
                debug!("'{}' = '{}'", assignment.name, assignment.value);
                report.filled += 1;
            }
            Err(e) => {
                error!("Failed to write '{}': {e}", assignment.name);
                report.failed.push(assignment.name.clone());
            }
        }
    }

    info!("Filled {}/{} form fields", report.filled, report.total);
    if report.filled == 0 {
        let message = "No form field could be filled; check the template field names".to_string();
        warn!("{message}");
        report.warning = Some(message);
    }
    Ok(report)
}

/// `BUY_ORDER_<buyer>_<millis>.<extension>`, with whitespace runs in the
/// buyer name replaced by underscores.
#[must_use]
pub fn document_file_name(buyer_name: &str, unix_millis: i64, extension: &str) -> String {
    let buyer = buyer_name.split_whitespace().collect::<Vec<_>>().join("_");
    let buyer = if buyer.is_empty() { "unknown" } else { &buyer };
    format!("BUY_ORDER_{buyer}_{unix_millis}.{extension}")
}

/// A saved, flattened buy order document.
#[derive(Debug, Clone)]
pub struct GeneratedDocument {
    /// Suggested download name
    pub file_name: String,
    /// Document bytes
    pub bytes: Vec<u8>,
    /// What was written
    pub report: FillReport,
}

/// Loads a template, fills it with `order`, flattens and saves it.
///
/// Template load and save failures abort; per-field failures do not.
pub fn generate_buy_order_document<S: TemplateSource>(
    source: &S,
    order: &buy_order::Model,
    dealer: &DealerProfile,
    options: FillOptions,
) -> Result<GeneratedDocument> {
    let mut template = source.load()?;
    let report = fill_form(&mut template, order, dealer, options)?;
    template.flatten()?;
    let bytes = template.save()?;
    let file_name = document_file_name(
        &order.buyer_name,
        Utc::now().timestamp_millis(),
        template.extension(),
    );
    info!("Generated {file_name} ({} bytes)", bytes.len());

    Ok(GeneratedDocument {
        file_name,
        bytes,
        report,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::form_template::{BuiltinBuyOrderSheet, FieldSheet, ManifestFile};
    use crate::entities::{TaxItems, TaxLineItem};
    use crate::errors::Error;
    use crate::test_utils::buy_order_model;

    fn state_only_order() -> buy_order::Model {
        let mut order = buy_order_model("Jane Doe");
        order.price = 10_000.0;
        order.fee = 47.2;
        order.down_payment = 1_100.0;
        order.tax_items = TaxItems(vec![TaxLineItem {
            key: "state".to_string(),
            name: "State Tax (CO)".to_string(),
            pct: 0.029,
            pct_percent: 2.9,
            amount: 290.0,
        }]);
        order
    }

    fn values(assignments: &[FieldAssignment]) -> HashMap<&str, &str> {
        assignments
            .iter()
            .map(|a| (a.name.as_str(), a.value.as_str()))
            .collect()
    }

    #[test]
    fn test_figures_and_core_fields() {
        let order = state_only_order();
        let fields: Vec<FormField> = ["Price", "SalesPrice", "Fees", "AmtFin", "TotalFees", "Payoff"]
            .into_iter()
            .map(FormField::text)
            .collect();
        let assignments = map_fields(&order, &DealerProfile::default(), &fields).unwrap();
        let v = values(&assignments);

        assert_eq!(v["Price"], "10,000.00");
        assert_eq!(v["SalesPrice"], "10,290.00");
        assert_eq!(v["Fees"], "10,337.20");
        assert_eq!(v["AmtFin"], "9,237.20");
        assert_eq!(v["TotalFees"], "");
        assert_eq!(v["Payoff"], "");
    }

    #[test]
    fn test_forced_blank_beats_every_rule() {
        let order = state_only_order();
        let fields: Vec<FormField> = ["Total Fees", "PAY_OFF", "TotalFees"]
            .into_iter()
            .map(FormField::text)
            .collect();
        let assignments = map_fields(&order, &DealerProfile::default(), &fields).unwrap();
        assert!(assignments.iter().all(|a| a.value.is_empty()));
        assert!(assignments.iter().all(|a| a.source == ValueSource::Forced));
    }

    #[test]
    fn test_precedence_direct_alias_heuristic() {
        let order = state_only_order();
        let mapper = FieldMapper::new(&order, &DealerProfile::default()).unwrap();
        let mut slot = TotalSlot::default();

        // Direct name wins
        assert_eq!(
            mapper.resolve("SalesPrice", &mut slot),
            ("10,290.00".to_string(), ValueSource::Direct)
        );
        // Normalized spelling of a direct name goes through the alias table
        assert_eq!(
            mapper.resolve("Sales Price", &mut slot),
            ("10,290.00".to_string(), ValueSource::Alias)
        );
        assert_eq!(
            mapper.resolve("Balance Owed", &mut slot),
            ("10,290.00".to_string(), ValueSource::Alias)
        );
        // Only the heuristics recognize these
        assert_eq!(
            mapper.resolve("SellingPrice", &mut slot),
            ("10,000.00".to_string(), ValueSource::Heuristic)
        );
        assert_eq!(
            mapper.resolve("Trade Allowance", &mut slot),
            ("0.00".to_string(), ValueSource::Heuristic)
        );
        assert_eq!(slot, TotalSlot::AwaitingSubtotal);
    }

    #[test]
    fn test_total_slot_transitions() {
        let slot = TotalSlot::AwaitingSubtotal;
        let (figure, slot) = slot.claim_total();
        assert_eq!(figure, TotalFigure::SellingPrice);
        assert_eq!(slot, TotalSlot::AwaitingTotal);
        let (figure, slot) = slot.claim_total();
        assert_eq!(figure, TotalFigure::TotalWithTaxes);
        assert_eq!(slot, TotalSlot::Done);
        assert_eq!(slot.claim_total(), (TotalFigure::TotalWithTaxes, TotalSlot::Done));

        assert_eq!(TotalSlot::AwaitingSubtotal.subtotal_filled(), TotalSlot::AwaitingTotal);
        assert_eq!(TotalSlot::Done.subtotal_filled(), TotalSlot::Done);
    }

    #[test]
    fn test_ambiguous_totals_fill_in_turn() {
        let order = state_only_order();
        let fields: Vec<FormField> = ["Total 1", "Total 2", "Total 3", "Other Total"]
            .into_iter()
            .map(FormField::text)
            .collect();
        let v = map_fields(&order, &DealerProfile::default(), &fields).unwrap();
        assert_eq!(v[0].value, "10,000.00");
        assert_eq!(v[1].value, "10,290.00");
        assert_eq!(v[2].value, "10,290.00");
        // Fields mentioning "other" never take a total
        assert_eq!(v[3].value, "");
    }

    #[test]
    fn test_subtotal_field_claims_first_slot() {
        let order = state_only_order();
        let fields: Vec<FormField> = ["SubTotal", "Total 2", "Total 3"]
            .into_iter()
            .map(FormField::text)
            .collect();
        let v = map_fields(&order, &DealerProfile::default(), &fields).unwrap();
        assert_eq!(v[0].value, "10,000.00");
        assert_eq!(v[0].source, ValueSource::Alias);
        assert_eq!(v[1].value, "10,290.00");
        assert_eq!(v[2].value, "10,290.00");
        assert_eq!(v[2].source, ValueSource::Heuristic);
    }

    #[test]
    fn test_fonts_and_alignment() {
        let order = state_only_order();
        let mapper = FieldMapper::new(&order, &DealerProfile::default()).unwrap();
        assert_eq!(mapper.font_size("DlrName"), 14.0);
        assert_eq!(mapper.font_size("VIN"), 11.5);
        assert_eq!(mapper.font_size("Buyer"), 12.0);
        assert!(mapper.right_aligned("Price"));
        assert!(mapper.right_aligned("AmtFin"));
        assert!(!mapper.right_aligned("Buyer"));
    }

    #[test]
    fn test_zero_amounts_stay_blank() {
        let mut order = buy_order_model("Jane Doe");
        order.price = 0.0;
        order.fee = 0.0;
        order.mileage = "about 40k".to_string();
        let fields: Vec<FormField> = ["Price", "FilingFee", "FilingFeeDesc", "Miles", "CashDn"]
            .into_iter()
            .map(FormField::text)
            .collect();
        let v = map_fields(&order, &DealerProfile::default(), &fields).unwrap();
        assert!(v.iter().all(|a| a.value.is_empty()), "{v:?}");
    }

    #[test]
    fn test_non_text_fields_are_skipped() {
        let order = state_only_order();
        let fields = vec![
            FormField::text("Buyer"),
            FormField {
                name: "Signed".to_string(),
                kind: FieldKind::Checkbox,
            },
        ];
        let v = map_fields(&order, &DealerProfile::default(), &fields).unwrap();
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].value, "Jane Doe");
    }

    struct FlakySheet {
        inner: FieldSheet,
        broken: &'static str,
        disk_full: bool,
    }

    impl FormTemplate for FlakySheet {
        fn fields(&self) -> Vec<FormField> {
            self.inner.fields()
        }
        fn set_text(&mut self, field: &str, value: &str) -> Result<()> {
            if field == self.broken {
                return Err(Error::FieldWrite {
                    field: field.to_string(),
                    message: "corrupt widget".to_string(),
                });
            }
            self.inner.set_text(field, value)
        }
        fn set_font_size(&mut self, field: &str, size: f32) -> Result<()> {
            self.inner.set_font_size(field, size)
        }
        fn set_alignment(&mut self, _field: &str, _alignment: Alignment) -> Result<()> {
            Err(Error::Template {
                message: "alignment unsupported".to_string(),
            })
        }
        fn flatten(&mut self) -> Result<()> {
            self.inner.flatten()
        }
        fn save(&mut self) -> Result<Vec<u8>> {
            if self.disk_full {
                return Err(Error::Io(std::io::Error::other("disk full")));
            }
            self.inner.save()
        }
    }

    struct FullDisk;

    impl TemplateSource for FullDisk {
        type Template = FlakySheet;

        fn load(&self) -> Result<FlakySheet> {
            Ok(FlakySheet {
                inner: BuiltinBuyOrderSheet.load()?,
                broken: "",
                disk_full: true,
            })
        }
    }

    #[test]
    fn test_field_failure_does_not_abort() {
        let mut sheet = FlakySheet {
            inner: BuiltinBuyOrderSheet.load().unwrap(),
            broken: "Buyer",
            disk_full: false,
        };
        let report = fill_form(
            &mut sheet,
            &state_only_order(),
            &DealerProfile::default(),
            FillOptions::default(),
        )
        .unwrap();

        assert_eq!(report.failed, vec!["Buyer".to_string()]);
        assert!(report.filled > 10);
        assert_eq!(sheet.inner.value("Price"), Some("10,000.00"));
        // Unsupported alignment is ignored
        assert_eq!(sheet.inner.field("Price").unwrap().alignment, None);
        assert_eq!(sheet.inner.field("DlrName").unwrap().font_size, Some(14.0));
    }

    #[test]
    fn test_warning_when_nothing_filled() {
        let mut sheet = FieldSheet::new([FormField::text("Unrelated")]);
        let report = fill_form(
            &mut sheet,
            &state_only_order(),
            &DealerProfile::default(),
            FillOptions::default(),
        )
        .unwrap();
        assert_eq!(report.filled, 0);
        assert!(report.warning.is_some());
    }

    #[test]
    fn test_debug_labels() {
        let mut sheet = BuiltinBuyOrderSheet.load().unwrap();
        let report = fill_form(
            &mut sheet,
            &state_only_order(),
            &DealerProfile::default(),
            FillOptions { debug_labels: true },
        )
        .unwrap();
        assert_eq!(report.filled, report.total);
        assert_eq!(sheet.value("TotalFees"), Some("TotalFees"));
        assert_eq!(sheet.field("VIN").unwrap().font_size, Some(8.0));
    }

    #[test]
    fn test_generate_document() {
        let document = generate_buy_order_document(
            &BuiltinBuyOrderSheet,
            &state_only_order(),
            &DealerProfile::default(),
            FillOptions::default(),
        )
        .unwrap();
        assert!(document.file_name.starts_with("BUY_ORDER_Jane_Doe_"));
        assert!(document.file_name.ends_with(".json"));

        let saved: FieldSheet = serde_json::from_slice(&document.bytes).unwrap();
        assert!(saved.is_flattened());
        assert_eq!(saved.value("DlrName"), Some("WEST AUTOMOTIVE LLC"));
        assert_eq!(saved.value("PlusPayOff"), Some("10,290.00"));
        assert_eq!(saved.value("Allow"), Some("0.00"));
    }

    #[test]
    fn test_missing_template_aborts() {
        let source = ManifestFile {
            path: "/nonexistent/agency-desk/buy_order.json".into(),
        };
        let result = generate_buy_order_document(
            &source,
            &state_only_order(),
            &DealerProfile::default(),
            FillOptions::default(),
        );
        assert!(matches!(result, Err(Error::Template { .. })), "{result:?}");
    }

    #[test]
    fn test_save_failure_aborts() {
        let result = generate_buy_order_document(
            &FullDisk,
            &state_only_order(),
            &DealerProfile::default(),
            FillOptions::default(),
        );
        assert!(matches!(result, Err(Error::Io(_))), "{result:?}");
    }

    #[test]
    fn test_document_file_name() {
        assert_eq!(
            document_file_name("Jane  Q Doe", 1_700_000_000_000, "pdf"),
            "BUY_ORDER_Jane_Q_Doe_1700000000000.pdf"
        );
        assert_eq!(document_file_name("  ", 5, "pdf"), "BUY_ORDER_unknown_5.pdf");
    }
}
