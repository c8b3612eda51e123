//! Vehicle buy orders: sales tax quote and stored records.
//!
//! A quote is recomputed from the current [`RateBook`] whenever price, city,
//! fee or down payment change. Saving freezes the quote into the row.

use crate::{
    core::{money::finite_or_zero, rates::RateBook},
    entities::{BuyOrder, BuyOrderStatus, TaxItems, TaxLineItem, buy_order},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Inputs to a buy order quote.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuoteInput {
    /// Vehicle price
    pub price: f64,
    /// Jurisdiction key; the default jurisdiction when blank
    pub city: Option<String>,
    /// Filing fee; the rate book fee when `None`
    pub fee: Option<f64>,
    /// Cash down payment
    pub down_payment: f64,
    /// Buyer state code, shown in the state tax line name
    pub state: String,
}

/// A computed buy order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuyOrderQuote {
    /// Vehicle price after coercion
    pub price: f64,
    /// One line per jurisdiction component, in rate record order
    pub tax_items: TaxItems,
    /// Sum of line item amounts
    pub total_taxes: f64,
    /// `price + total_taxes`
    pub subtotal: f64,
    /// Filing fee applied
    pub fee: f64,
    /// `subtotal + fee`
    pub total_with_fees: f64,
    /// Cash down payment
    pub down_payment: f64,
    /// Never negative
    pub balance_due: f64,
}

/// Display name for a tax component key. Unknown keys are shown as-is.
#[must_use]
pub fn tax_display_name(key: &str, state: &str) -> String {
    match key {
        "state" => format!("State Tax ({})", state.trim().to_ascii_uppercase()),
        "county" => "County Tax".to_string(),
        "city" => "City Tax".to_string(),
        "cd" => "CD Tax".to_string(),
        "rtd" => "RTD Tax".to_string(),
        other => other.to_string(),
    }
}

/// Computes tax line items and totals for a sale.
#[must_use]
pub fn compute_buy_order(book: &RateBook, input: &QuoteInput) -> BuyOrderQuote {
    let price = finite_or_zero(input.price);
    let fee = finite_or_zero(input.fee.unwrap_or(book.filing_fee));
    let down_payment = finite_or_zero(input.down_payment);
    let record = book.resolve_jurisdiction(input.city.as_deref());

    let tax_items = TaxItems(
        record
            .components()
            .iter()
            .map(|component| {
                let pct = component.percent / 100.0;
                TaxLineItem {
                    key: component.key.clone(),
                    name: tax_display_name(&component.key, &input.state),
                    pct,
                    pct_percent: component.percent,
                    amount: price * pct,
                }
            })
            .collect(),
    );

    let total_taxes: f64 = tax_items.iter().map(|item| item.amount).sum();
    let subtotal = price + total_taxes;
    let total_with_fees = subtotal + fee;

    BuyOrderQuote {
        price,
        tax_items,
        total_taxes,
        subtotal,
        fee,
        total_with_fees,
        down_payment,
        balance_due: (total_with_fees - down_payment).max(0.0),
    }
}

/// Buy order form fields.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuyOrderInput {
    pub buyer_name: String,
    pub address: String,
    pub phone: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub license_number: String,
    pub birth_date: String,
    pub vin: String,
    pub year: String,
    pub make: String,
    pub model: String,
    pub body: String,
    pub color: String,
    pub mileage: String,
    pub cylinders: String,
    pub fuel_type: String,
    pub stock_number: String,
    pub salesman: String,
    pub source: String,
    pub price: f64,
    /// Filing fee; the rate book fee when absent
    pub fee: Option<f64>,
    pub down_payment: f64,
    pub trade_allowance: Option<f64>,
    pub status: BuyOrderStatus,
}

impl BuyOrderInput {
    /// The quote inputs for this form.
    #[must_use]
    pub fn quote_input(&self, default_state: &str) -> QuoteInput {
        QuoteInput {
            price: self.price,
            city: Some(self.city.clone()),
            fee: self.fee,
            down_payment: self.down_payment,
            state: self.state_or(default_state),
        }
    }

    fn state_or(&self, default_state: &str) -> String {
        let state = self.state.trim();
        if state.is_empty() {
            default_state.to_string()
        } else {
            state.to_ascii_uppercase()
        }
    }

    fn validate(&self) -> Result<()> {
        if self.buyer_name.trim().is_empty() {
            return Err(Error::validation("buyer name is required"));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(Error::validation("price must be a non-negative number"));
        }
        Ok(())
    }
}

fn apply_input(
    model: &mut buy_order::ActiveModel,
    book: &RateBook,
    input: &BuyOrderInput,
    default_state: &str,
) {
    let quote = compute_buy_order(book, &input.quote_input(default_state));

    model.buyer_name = Set(input.buyer_name.trim().to_string());
    model.address = Set(input.address.trim().to_string());
    model.phone = Set(input.phone.trim().to_string());
    model.city = Set(input.city.trim().to_string());
    model.state = Set(input.state_or(default_state));
    model.zip = Set(input.zip.trim().to_string());
    model.license_number = Set(input.license_number.trim().to_string());
    model.birth_date = Set(input.birth_date.trim().to_string());
    model.vin = Set(input.vin.trim().to_string());
    model.year = Set(input.year.trim().to_string());
    model.make = Set(input.make.trim().to_string());
    model.model = Set(input.model.trim().to_string());
    model.body = Set(input.body.trim().to_string());
    model.color = Set(input.color.trim().to_string());
    model.mileage = Set(input.mileage.trim().to_string());
    model.cylinders = Set(input.cylinders.trim().to_string());
    model.fuel_type = Set(input.fuel_type.trim().to_string());
    model.stock_number = Set(input.stock_number.trim().to_string());
    model.salesman = Set(input.salesman.trim().to_string());
    model.source = Set(input.source.trim().to_string());
    model.trade_allowance = Set(input.trade_allowance.map(finite_or_zero));
    model.status = Set(input.status);

    model.price = Set(quote.price);
    model.fee = Set(quote.fee);
    model.down_payment = Set(quote.down_payment);
    model.state_tax = Set(quote.tax_items.amount("state"));
    model.city_tax = Set(quote.tax_items.amount("city"));
    model.total_taxes = Set(quote.total_taxes);
    model.subtotal = Set(quote.subtotal);
    model.total_with_fees = Set(quote.total_with_fees);
    model.balance_due = Set(quote.balance_due);
    model.tax_items = Set(quote.tax_items);
    model.updated_at = Set(Some(Utc::now()));
}

/// Saves a new buy order with its quote frozen in.
#[instrument(skip(db, book, input), fields(buyer = %input.buyer_name))]
pub async fn create_buy_order(
    db: &DatabaseConnection,
    book: &RateBook,
    input: &BuyOrderInput,
    default_state: &str,
) -> Result<buy_order::Model> {
    input.validate()?;
    let mut model = buy_order::ActiveModel {
        created_at: Set(Some(Utc::now())),
        ..Default::default()
    };
    apply_input(&mut model, book, input, default_state);
    let order = model.insert(db).await?;
    info!("Created buy order {} ({})", order.id, order.status);
    Ok(order)
}

/// Replaces an order's fields and re-freezes its quote from `book`.
pub async fn update_buy_order(
    db: &DatabaseConnection,
    book: &RateBook,
    order_id: i64,
    input: &BuyOrderInput,
    default_state: &str,
) -> Result<buy_order::Model> {
    input.validate()?;
    let mut model: buy_order::ActiveModel = require_buy_order(db, order_id).await?.into();
    apply_input(&mut model, book, input, default_state);
    Ok(model.update(db).await?)
}

/// Finds a buy order by id, erroring when it does not exist.
pub async fn require_buy_order(db: &DatabaseConnection, order_id: i64) -> Result<buy_order::Model> {
    BuyOrder::find_by_id(order_id)
        .one(db)
        .await?
        .ok_or(Error::BuyOrderNotFound { id: order_id })
}

/// Every buy order, newest first.
pub async fn list_buy_orders(db: &DatabaseConnection) -> Result<Vec<buy_order::Model>> {
    BuyOrder::find()
        .order_by_desc(buy_order::Column::CreatedAt)
        .order_by_desc(buy_order::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Marks an order as registered. Stored amounts are left untouched.
pub async fn mark_registered(db: &DatabaseConnection, order_id: i64) -> Result<buy_order::Model> {
    let mut model: buy_order::ActiveModel = require_buy_order(db, order_id).await?.into();
    model.status = Set(BuyOrderStatus::Registered);
    model.updated_at = Set(Some(Utc::now()));
    let order = model.update(db).await?;
    info!("Buy order {order_id} registered");
    Ok(order)
}

/// Deletes a buy order.
pub async fn delete_buy_order(db: &DatabaseConnection, order_id: i64) -> Result<()> {
    require_buy_order(db, order_id).await?.delete(db).await?;
    info!("Deleted buy order {order_id}");
    Ok(())
}

/// Case-insensitive match over buyer name, address, VIN, city and status.
#[must_use]
pub fn search_buy_orders<'a>(
    orders: &'a [buy_order::Model],
    query: &str,
) -> Vec<&'a buy_order::Model> {
    let needle = query.trim().to_lowercase();
    orders
        .iter()
        .filter(|o| {
            let status = o.status.to_string();
            needle.is_empty()
                || [
                    o.buyer_name.as_str(),
                    o.address.as_str(),
                    o.vin.as_str(),
                    o.city.as_str(),
                    status.as_str(),
                ]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::rates::{JurisdictionRates, RateRecord};
    use crate::test_utils::{buy_order_input, setup_test_db};

    fn quote(price: f64, city: &str, fee: Option<f64>, down_payment: f64) -> QuoteInput {
        QuoteInput {
            price,
            city: Some(city.to_string()),
            fee,
            down_payment,
            state: "CO".to_string(),
        }
    }

    #[test]
    fn test_totals_follow_component_sum() {
        let book = RateBook::default();
        let denver_total = book.jurisdictions.get("Denver").unwrap().total_percent();
        for price in [0.0, 1.0, 10_000.0, 23_456.78] {
            let q = compute_buy_order(&book, &quote(price, "Denver", Some(47.2), 500.0));
            assert!((q.total_taxes - price * denver_total / 100.0).abs() < 1e-6);
            assert_eq!(q.subtotal, price + q.total_taxes);
            assert_eq!(q.total_with_fees, q.subtotal + 47.2);
            assert_eq!(q.balance_due, (q.total_with_fees - 500.0).max(0.0));
        }
    }

    #[test]
    fn test_balance_due_never_negative() {
        let q = compute_buy_order(&RateBook::default(), &quote(1000.0, "Denver", None, 50_000.0));
        assert_eq!(q.balance_due, 0.0);
        assert_eq!(q.fee, 47.2);
    }

    #[test]
    fn test_line_items_keep_record_order_and_names() {
        let q = compute_buy_order(&RateBook::default(), &quote(10_000.0, "Aurora", None, 0.0));
        let keys: Vec<&str> = q.tax_items.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(keys, vec!["state", "county", "city", "cd", "rtd"]);
        let state = q.tax_items.get("state").unwrap();
        assert_eq!(state.name, "State Tax (CO)");
        assert_eq!(state.pct_percent, 2.9);
        assert!((state.amount - 290.0).abs() < 1e-9);
        assert_eq!(q.tax_items.get("rtd").unwrap().name, "RTD Tax");
    }

    #[test]
    fn test_unknown_key_uses_raw_name() {
        let mut book = RateBook::default();
        let mut rates = JurisdictionRates::default();
        rates.insert("Denver", RateRecord::new([("state", 2.9), ("special_district", 0.5)]));
        book.jurisdictions = rates;
        let q = compute_buy_order(&book, &quote(100.0, "Denver", None, 0.0));
        assert_eq!(q.tax_items.get("special_district").unwrap().name, "special_district");
    }

    #[test]
    fn test_unknown_city_matches_default() {
        let book = RateBook::default();
        let unknown = compute_buy_order(&book, &quote(1000.0, "Nowhere", None, 0.0));
        let denver = compute_buy_order(&book, &quote(1000.0, "Denver", None, 0.0));
        assert_eq!(unknown, denver);
    }

    #[test]
    fn test_quote_is_repeatable() {
        let book = RateBook::default();
        let input = quote(18_999.99, "Boulder", Some(47.2), 2_000.0);
        let first = compute_buy_order(&book, &input);
        let second = compute_buy_order(&book, &input);
        for (a, b) in first.tax_items.iter().zip(second.tax_items.iter()) {
            assert_eq!(a.amount.to_bits(), b.amount.to_bits());
        }
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_saved_quote_is_frozen() -> Result<()> {
        let db = setup_test_db().await?;
        let mut book = RateBook::default();
        let order = create_buy_order(&db, &book, &buy_order_input("Jane Doe", 10_000.0), "CO").await?;
        assert_eq!(order.status, BuyOrderStatus::Draft);
        assert!((order.state_tax - 290.0).abs() < 1e-9);

        // Rate edits do not touch stored rows
        book.set_component("Denver", "state", 5.0)?;
        let stored = require_buy_order(&db, order.id).await?;
        assert_eq!(stored.tax_items, order.tax_items);

        // Saving again re-freezes with the current book
        let updated = update_buy_order(&db, &book, order.id, &buy_order_input("Jane Doe", 10_000.0), "CO").await?;
        assert!((updated.state_tax - 500.0).abs() < 1e-9);
        assert_eq!(updated.created_at, order.created_at);
        Ok(())
    }

    #[tokio::test]
    async fn test_register_search_delete() -> Result<()> {
        let db = setup_test_db().await?;
        let book = RateBook::default();
        let jane = create_buy_order(&db, &book, &buy_order_input("Jane Doe", 5_000.0), "CO").await?;
        create_buy_order(&db, &book, &buy_order_input("John Roe", 7_000.0), "CO").await?;

        let registered = mark_registered(&db, jane.id).await?;
        assert_eq!(registered.status, BuyOrderStatus::Registered);
        assert_eq!(registered.balance_due, jane.balance_due);

        let orders = list_buy_orders(&db).await?;
        assert_eq!(search_buy_orders(&orders, "registered").len(), 1);
        assert_eq!(search_buy_orders(&orders, "draft")[0].buyer_name, "John Roe");
        assert_eq!(search_buy_orders(&orders, "denver").len(), 2);

        delete_buy_order(&db, jane.id).await?;
        assert!(matches!(
            require_buy_order(&db, jane.id).await,
            Err(Error::BuyOrderNotFound { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_create_requires_buyer() -> Result<()> {
        let db = setup_test_db().await?;
        let input = buy_order_input("  ", 5_000.0);
        assert!(matches!(
            create_buy_order(&db, &RateBook::default(), &input, "CO").await,
            Err(Error::Validation { .. })
        ));
        Ok(())
    }
}
