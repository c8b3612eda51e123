//! Application context shared by every command.
//!
//! Holds the database connection, the loaded configuration, the session's
//! [`RateBook`] and one live [`Feed`] per collection. Mutations go through
//! the context so that subscribers receive a fresh snapshot after each write.

use crate::{
    config::AppConfig,
    core::{
        buy_order::{self, BuyOrderInput},
        client::{self, ClientInput},
        insurance::{self, PolicyInput},
        live::{Feed, Subscription},
        paystub::{self, PayAmounts, PayCadence},
        rates::RateBook,
    },
    entities::{
        BuyOrderModel, ClientModel, InsurancePolicyModel, PaystubModel, PolicyStatus,
    },
    errors::Result,
};
use chrono::NaiveDate;
use sea_orm::DatabaseConnection;
use tracing::info;

/// Shared state for one session.
pub struct AppContext {
    /// Database connection for all persistence
    pub database: DatabaseConnection,
    /// Configuration loaded at startup
    pub config: AppConfig,
    rates: RateBook,
    clients: Feed<ClientModel>,
    paystubs: Feed<PaystubModel>,
    buy_orders: Feed<BuyOrderModel>,
    insurances: Feed<InsurancePolicyModel>,
}

async fn watch<T, Fut>(feed: &Feed<T>, snapshot: Fut) -> Result<Subscription<T>>
where
    Fut: std::future::Future<Output = Result<Vec<T>>>,
{
    feed.publish(snapshot.await?);
    Ok(feed.subscribe())
}

impl AppContext {
    /// Builds the context and loads the session's rate book.
    pub async fn new(database: DatabaseConnection, config: AppConfig) -> Result<Self> {
        let rates = RateBook::load(&database, &config).await?;
        info!(
            "Rate book loaded: {} jurisdictions, default '{}'",
            rates.jurisdictions.len(),
            rates.default_jurisdiction
        );
        Ok(Self {
            database,
            config,
            rates,
            clients: Feed::new(),
            paystubs: Feed::new(),
            buy_orders: Feed::new(),
            insurances: Feed::new(),
        })
    }

    /// The session's rate book.
    #[must_use]
    pub const fn rates(&self) -> &RateBook {
        &self.rates
    }

    /// Picks up rate edits saved since the session started.
    pub async fn reload_rates(&mut self) -> Result<()> {
        self.rates.reload(&self.database, &self.config).await
    }

    /// Edits one jurisdiction component and persists the whole table.
    pub async fn set_rate_component(&mut self, city: &str, key: &str, percent: f64) -> Result<()> {
        self.rates.set_component(city, key, percent)?;
        self.rates.save_jurisdictions(&self.database).await?;
        info!("Saved {city}.{key} = {percent}");
        Ok(())
    }

    // Clients

    /// Subscribes to the active client list, starting from the current one.
    pub async fn watch_clients(&self) -> Result<Subscription<ClientModel>> {
        watch(&self.clients, client::list_clients(&self.database, true)).await
    }

    async fn refresh_clients(&self) -> Result<()> {
        self.clients
            .publish(client::list_clients(&self.database, true).await?);
        Ok(())
    }

    /// Creates a client.
    pub async fn add_client(&self, input: &ClientInput) -> Result<ClientModel> {
        let created = client::create_client(&self.database, input).await?;
        self.refresh_clients().await?;
        Ok(created)
    }

    /// Updates a client.
    pub async fn edit_client(&self, client_id: i64, input: &ClientInput) -> Result<ClientModel> {
        let updated = client::update_client(&self.database, client_id, input).await?;
        self.refresh_clients().await?;
        Ok(updated)
    }

    /// Archives a client.
    pub async fn archive_client(&self, client_id: i64) -> Result<ClientModel> {
        let archived = client::archive_client(&self.database, client_id).await?;
        self.refresh_clients().await?;
        Ok(archived)
    }

    /// Restores an archived client.
    pub async fn restore_client(&self, client_id: i64) -> Result<ClientModel> {
        let restored = client::restore_client(&self.database, client_id).await?;
        self.refresh_clients().await?;
        Ok(restored)
    }

    // Paystubs

    /// Subscribes to every paystub, newest first.
    pub async fn watch_paystubs(&self) -> Result<Subscription<PaystubModel>> {
        watch(&self.paystubs, paystub::list_paystubs(&self.database)).await
    }

    async fn refresh_paystubs(&self) -> Result<()> {
        self.paystubs
            .publish(paystub::list_paystubs(&self.database).await?);
        Ok(())
    }

    /// Creates one paystub with the session's payroll rates.
    pub async fn add_paystub(
        &self,
        client_id: i64,
        period_start: NaiveDate,
        period_end: NaiveDate,
        amounts: &PayAmounts,
    ) -> Result<PaystubModel> {
        let created = paystub::create_paystub(
            &self.database,
            &self.rates.payroll,
            client_id,
            period_start,
            period_end,
            amounts,
        )
        .await?;
        self.refresh_paystubs().await?;
        Ok(created)
    }

    /// Creates four consecutive paystubs.
    pub async fn add_paystub_batch(
        &self,
        client_id: i64,
        first_start: NaiveDate,
        cadence: PayCadence,
        amounts: &PayAmounts,
    ) -> Result<Vec<PaystubModel>> {
        let created = paystub::create_paystub_batch(
            &self.database,
            &self.rates.payroll,
            client_id,
            first_start,
            cadence,
            amounts,
        )
        .await?;
        self.refresh_paystubs().await?;
        Ok(created)
    }

    /// Deletes a paystub.
    pub async fn remove_paystub(&self, paystub_id: i64) -> Result<()> {
        paystub::delete_paystub(&self.database, paystub_id).await?;
        self.refresh_paystubs().await
    }

    // Buy orders

    /// Subscribes to every buy order, newest first.
    pub async fn watch_buy_orders(&self) -> Result<Subscription<BuyOrderModel>> {
        watch(&self.buy_orders, buy_order::list_buy_orders(&self.database)).await
    }

    async fn refresh_buy_orders(&self) -> Result<()> {
        self.buy_orders
            .publish(buy_order::list_buy_orders(&self.database).await?);
        Ok(())
    }

    /// Creates (`order_id == None`) or updates a buy order, freezing its
    /// quote from the session's rate book.
    pub async fn save_buy_order(
        &self,
        order_id: Option<i64>,
        input: &BuyOrderInput,
    ) -> Result<BuyOrderModel> {
        let state = &self.config.defaults.buyer_state;
        let saved = match order_id {
            Some(id) => {
                buy_order::update_buy_order(&self.database, &self.rates, id, input, state).await?
            }
            None => buy_order::create_buy_order(&self.database, &self.rates, input, state).await?,
        };
        self.refresh_buy_orders().await?;
        Ok(saved)
    }

    /// Marks a buy order as registered.
    pub async fn register_buy_order(&self, order_id: i64) -> Result<BuyOrderModel> {
        let registered = buy_order::mark_registered(&self.database, order_id).await?;
        self.refresh_buy_orders().await?;
        Ok(registered)
    }

    /// Deletes a buy order.
    pub async fn remove_buy_order(&self, order_id: i64) -> Result<()> {
        buy_order::delete_buy_order(&self.database, order_id).await?;
        self.refresh_buy_orders().await
    }

    // Insurance

    /// Subscribes to every policy, by status then newest first.
    pub async fn watch_insurances(&self) -> Result<Subscription<InsurancePolicyModel>> {
        watch(&self.insurances, insurance::list_policies(&self.database)).await
    }

    async fn refresh_insurances(&self) -> Result<()> {
        self.insurances
            .publish(insurance::list_policies(&self.database).await?);
        Ok(())
    }

    /// Creates (`policy_id == None`) or updates a policy.
    pub async fn save_policy(
        &self,
        policy_id: Option<i64>,
        input: &PolicyInput,
    ) -> Result<InsurancePolicyModel> {
        let saved = match policy_id {
            Some(id) => insurance::update_policy(&self.database, id, input).await?,
            None => insurance::create_policy(&self.database, input).await?,
        };
        self.refresh_insurances().await?;
        Ok(saved)
    }

    /// Moves a policy to a new status.
    pub async fn set_policy_status(
        &self,
        policy_id: i64,
        status: PolicyStatus,
    ) -> Result<InsurancePolicyModel> {
        let updated = insurance::set_policy_status(&self.database, policy_id, status).await?;
        self.refresh_insurances().await?;
        Ok(updated)
    }

    /// Deletes a policy.
    pub async fn remove_policy(&self, policy_id: i64) -> Result<()> {
        insurance::delete_policy(&self.database, policy_id).await?;
        self.refresh_insurances().await
    }
}
