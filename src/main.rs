#![allow(clippy::result_large_err)]

use agency_desk::{
    app::AppContext,
    config::{self, database},
    core::{
        buy_order::{self, BuyOrderInput, QuoteInput, compute_buy_order},
        client::{self, ClientInput},
        dashboard::{dashboard_stats, format_pct},
        form_template::{BuiltinBuyOrderSheet, FormTemplate, ManifestFile, TemplateSource},
        insurance::{self, PolicyInput},
        money::format_money,
        order_form::{FillOptions, generate_buy_order_document, map_fields},
        paystub::{self, PayAmounts, PayCadence},
        ytd::{self, BaselineInput, YtdSummary},
    },
    entities::{BuyOrderModel, PolicyStatus},
    errors::{Error, Result},
};
use chrono::{Datelike, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use dotenvy::dotenv;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Back-office desk for a small auto dealership and insurance agency.
#[derive(Parser)]
#[command(name = "agency-desk", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage payroll clients
    #[command(subcommand)]
    Clients(ClientCommand),
    /// Create and inspect paystubs
    #[command(subcommand)]
    Paystub(PaystubCommand),
    /// Year-to-date totals
    #[command(subcommand)]
    Ytd(YtdCommand),
    /// Overwrite a client's year-to-date baseline
    Baseline(BaselineArgs),
    /// Quote, save and print vehicle buy orders
    #[command(subcommand)]
    BuyOrder(BuyOrderCommand),
    /// Jurisdiction sales tax rates
    #[command(subcommand)]
    Rates(RatesCommand),
    /// Insurance policies
    #[command(subcommand)]
    Insurance(InsuranceCommand),
    /// Headline counts for the last 30 days
    Dashboard,
}

#[derive(Args)]
struct ClientArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    address: String,
    #[arg(long)]
    state: String,
    #[arg(long)]
    zip: String,
    #[arg(long = "ssn-last4")]
    ssn_last4: String,
    #[arg(long = "account-last4")]
    account_last4: String,
}

impl From<ClientArgs> for ClientInput {
    fn from(args: ClientArgs) -> Self {
        Self {
            full_name: args.name,
            address: args.address,
            state: args.state,
            zip: args.zip,
            ssn_last4: args.ssn_last4,
            account_last4: args.account_last4,
        }
    }
}

#[derive(Subcommand)]
enum ClientCommand {
    /// Add a client
    Add(ClientArgs),
    /// Replace a client's details
    Edit {
        id: i64,
        #[command(flatten)]
        details: ClientArgs,
    },
    /// List active (or archived) clients
    List {
        #[arg(long)]
        archived: bool,
        /// Case-insensitive filter on name, state, ZIP or last 4 digits
        #[arg(long)]
        search: Option<String>,
    },
    /// Archive a client
    Archive { id: i64 },
    /// Restore an archived client
    Restore { id: i64 },
    /// Write active clients as CSV to stdout or a file
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Args)]
struct PayArgs {
    #[arg(long)]
    hours: f64,
    #[arg(long)]
    rate: f64,
    #[arg(long, default_value_t = 0.0)]
    overtime_hours: f64,
    #[arg(long, default_value_t = 0.0)]
    overtime_rate: f64,
    /// Federal withholding in percent; the configured default when omitted
    #[arg(long)]
    federal_pct: Option<f64>,
}

impl From<&PayArgs> for PayAmounts {
    fn from(args: &PayArgs) -> Self {
        Self {
            hours: args.hours,
            rate: args.rate,
            overtime_hours: args.overtime_hours,
            overtime_rate: args.overtime_rate,
            federal_pct: args.federal_pct.map(|pct| pct / 100.0),
        }
    }
}

#[derive(Subcommand)]
enum PaystubCommand {
    /// Create one paystub
    Add {
        #[arg(long)]
        client: i64,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        #[command(flatten)]
        pay: PayArgs,
    },
    /// Create four consecutive paystubs
    Bulk {
        #[arg(long)]
        client: i64,
        /// First period start date
        #[arg(long)]
        start: NaiveDate,
        /// `weekly` or `biweekly`
        #[arg(long, default_value = "biweekly")]
        cadence: String,
        #[command(flatten)]
        pay: PayArgs,
    },
    /// List paystubs, optionally for one client
    List {
        #[arg(long)]
        client: Option<i64>,
    },
    /// Delete a paystub
    Delete { id: i64 },
}

#[derive(Subcommand)]
enum YtdCommand {
    /// Baseline plus this year's paystubs
    Client {
        id: i64,
        #[arg(long)]
        year: Option<i32>,
    },
    /// Cumulative totals through one paystub
    Through { paystub: i64 },
}

#[derive(Args)]
struct BaselineArgs {
    #[arg(long)]
    client: i64,
    #[arg(long)]
    year: Option<i32>,
    #[arg(long)]
    regular_gross: f64,
    #[arg(long, default_value_t = 0.0)]
    overtime_gross: f64,
    /// Federal withholding in percent
    #[arg(long)]
    federal_pct: Option<f64>,
}

#[derive(Args)]
struct OrderArgs {
    /// JSON file with the full buy order form
    #[arg(long)]
    input: Option<PathBuf>,
    #[arg(long)]
    buyer: Option<String>,
    #[arg(long)]
    price: Option<f64>,
    /// Jurisdiction key, e.g. `Colorado_Springs`
    #[arg(long)]
    city: Option<String>,
    #[arg(long)]
    state: Option<String>,
    #[arg(long)]
    fee: Option<f64>,
    #[arg(long)]
    down: Option<f64>,
    #[arg(long)]
    vin: Option<String>,
}

impl OrderArgs {
    fn into_input(self) -> Result<BuyOrderInput> {
        let mut input: BuyOrderInput = match &self.input {
            Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
            None => BuyOrderInput::default(),
        };
        if let Some(buyer) = self.buyer {
            input.buyer_name = buyer;
        }
        if let Some(price) = self.price {
            input.price = price;
        }
        if let Some(city) = self.city {
            input.city = city;
        }
        if let Some(state) = self.state {
            input.state = state;
        }
        if self.fee.is_some() {
            input.fee = self.fee;
        }
        if let Some(down) = self.down {
            input.down_payment = down;
        }
        if let Some(vin) = self.vin {
            input.vin = vin;
        }
        Ok(input)
    }
}

#[derive(Subcommand)]
enum BuyOrderCommand {
    /// Show the tax breakdown for a price without saving
    Quote {
        #[arg(long)]
        price: f64,
        #[arg(long)]
        city: Option<String>,
        #[arg(long)]
        state: Option<String>,
        #[arg(long)]
        fee: Option<f64>,
        #[arg(long, default_value_t = 0.0)]
        down: f64,
    },
    /// Save a new buy order
    Add(OrderArgs),
    /// Replace a saved buy order
    Edit {
        id: i64,
        #[command(flatten)]
        order: OrderArgs,
    },
    /// List buy orders
    List {
        #[arg(long)]
        search: Option<String>,
    },
    /// Mark a buy order registered
    Register { id: i64 },
    /// Delete a buy order
    Delete { id: i64 },
    /// Print the value each template field would receive, as JSON
    Fields {
        id: i64,
        #[arg(long)]
        template: Option<PathBuf>,
    },
    /// Fill, flatten and save the buy order document
    Document {
        id: i64,
        /// JSON field manifest; the built-in buy order form when omitted
        #[arg(long)]
        template: Option<PathBuf>,
        /// Write field names instead of values
        #[arg(long)]
        debug_labels: bool,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
}

#[derive(Subcommand)]
enum RatesCommand {
    /// Show one jurisdiction, or every jurisdiction
    Show { city: Option<String> },
    /// Set one component of a jurisdiction, in percent
    Set {
        city: String,
        key: String,
        percent: f64,
    },
}

#[derive(Args)]
struct PolicyArgs {
    #[arg(long)]
    holder: String,
    #[arg(long)]
    carrier: String,
    #[arg(long)]
    number: String,
    #[arg(long, default_value = "")]
    vin: String,
    #[arg(long, default_value = "")]
    year: String,
    #[arg(long, default_value = "")]
    make: String,
    #[arg(long, default_value = "")]
    model: String,
    #[arg(long, default_value = "")]
    address: String,
    #[arg(long)]
    state: String,
    #[arg(long)]
    start: Option<NaiveDate>,
    #[arg(long)]
    end: Option<NaiveDate>,
    #[arg(long, default_value_t = 0.0)]
    premium: f64,
    #[arg(long, default_value = "active")]
    status: String,
}

impl PolicyArgs {
    fn into_input(self) -> Result<PolicyInput> {
        Ok(PolicyInput {
            status: self.status.parse()?,
            holder_name: self.holder,
            carrier: self.carrier,
            policy_number: self.number,
            vin: self.vin,
            year: self.year,
            make: self.make,
            model: self.model,
            address: self.address,
            state: self.state,
            start_date: self.start,
            end_date: self.end,
            premium: self.premium,
        })
    }
}

#[derive(Subcommand)]
enum InsuranceCommand {
    /// Add a policy
    Add(PolicyArgs),
    /// Replace a policy
    Edit {
        id: i64,
        #[command(flatten)]
        policy: PolicyArgs,
    },
    /// List policies
    List {
        #[arg(long)]
        search: Option<String>,
    },
    /// Change a policy's status
    Status { id: i64, status: String },
    /// Cancel a policy
    Archive { id: i64 },
    /// Delete a policy
    Delete { id: i64 },
}

fn print_ytd(label: &str, summary: &YtdSummary) {
    println!("{label}");
    println!("  Gross:      {}", format_money(summary.gross));
    println!("    Regular:  {}", format_money(summary.regular_gross));
    println!("    Overtime: {}", format_money(summary.overtime_gross));
    println!("  Federal:    {}", format_money(summary.federal));
    println!("  State:      {}", format_money(summary.state_tax));
    println!("  SS:         {}", format_money(summary.ss));
    println!("  Medicare:   {}", format_money(summary.medicare));
    println!("  Taxes:      {}", format_money(summary.taxes));
    println!("  Net:        {}", format_money(summary.net));
}

fn print_order(order: &BuyOrderModel) {
    println!(
        "#{} {} [{}] {} {} {} | price {} taxes {} total {} due {}",
        order.id,
        order.buyer_name,
        order.status,
        order.year,
        order.make,
        order.model,
        format_money(order.price),
        format_money(order.total_taxes),
        format_money(order.total_with_fees),
        format_money(order.balance_due),
    );
}

async fn run_clients(ctx: &AppContext, command: ClientCommand) -> Result<()> {
    match command {
        ClientCommand::Add(args) => {
            let created = ctx.add_client(&args.into()).await?;
            println!("Added client #{} {}", created.id, created.full_name);
        }
        ClientCommand::Edit { id, details } => {
            let updated = ctx.edit_client(id, &details.into()).await?;
            println!("Updated client #{} {}", updated.id, updated.full_name);
        }
        ClientCommand::List { archived, search } => {
            let clients = client::list_clients(&ctx.database, !archived).await?;
            let shown = client::search_clients(&clients, search.as_deref().unwrap_or(""));
            for c in shown {
                println!(
                    "#{} {} | {} {} | SSN ...{} | Acct ...{}",
                    c.id, c.full_name, c.state, c.zip, c.ssn_last4, c.account_last4
                );
            }
        }
        ClientCommand::Archive { id } => {
            let archived = ctx.archive_client(id).await?;
            println!("Archived {}", archived.full_name);
        }
        ClientCommand::Restore { id } => {
            let restored = ctx.restore_client(id).await?;
            println!("Restored {}", restored.full_name);
        }
        ClientCommand::Export { out } => {
            let clients = client::list_clients(&ctx.database, true).await?;
            match out {
                Some(path) => {
                    client::export_clients_csv(&clients, std::fs::File::create(&path)?)?;
                    info!("Exported {} clients to {}", clients.len(), path.display());
                }
                None => client::export_clients_csv(&clients, std::io::stdout().lock())?,
            }
        }
    }
    Ok(())
}

async fn run_paystubs(ctx: &AppContext, command: PaystubCommand) -> Result<()> {
    match command {
        PaystubCommand::Add {
            client,
            start,
            end,
            pay,
        } => {
            let stub = ctx.add_paystub(client, start, end, &(&pay).into()).await?;
            println!(
                "Paystub #{} for {}: gross {} net {}",
                stub.id,
                stub.client_name,
                format_money(stub.gross),
                format_money(stub.net)
            );
        }
        PaystubCommand::Bulk {
            client,
            start,
            cadence,
            pay,
        } => {
            let cadence: PayCadence = cadence.parse()?;
            let stubs = ctx
                .add_paystub_batch(client, start, cadence, &(&pay).into())
                .await?;
            for stub in &stubs {
                println!(
                    "Paystub #{} {} to {}: net {}",
                    stub.id,
                    stub.period_start,
                    stub.period_end,
                    format_money(stub.net)
                );
            }
        }
        PaystubCommand::List { client } => {
            let stubs = match client {
                Some(id) => paystub::list_paystubs_for_client(&ctx.database, id).await?,
                None => paystub::list_paystubs(&ctx.database).await?,
            };
            for stub in &stubs {
                println!(
                    "#{} {} | {} to {} | gross {} taxes {} net {}",
                    stub.id,
                    stub.client_name,
                    stub.period_start,
                    stub.period_end,
                    format_money(stub.gross),
                    format_money(stub.taxes),
                    format_money(stub.net)
                );
            }
        }
        PaystubCommand::Delete { id } => {
            ctx.remove_paystub(id).await?;
            println!("Deleted paystub #{id}");
        }
    }
    Ok(())
}

async fn run_ytd(ctx: &AppContext, command: YtdCommand) -> Result<()> {
    match command {
        YtdCommand::Client { id, year } => {
            let client = client::require_client(&ctx.database, id).await?;
            let summary = match year {
                Some(year) => ytd::ytd_for_client(&ctx.database, id, year).await?,
                None => ytd::ytd_current_year(&ctx.database, id).await?,
            };
            print_ytd(&format!("YTD for {}", client.full_name), &summary);
        }
        YtdCommand::Through { paystub } => {
            match ytd::ytd_through_paystub(&ctx.database, &ctx.rates().payroll, paystub).await? {
                Some(summary) => print_ytd(&format!("YTD through paystub #{paystub}"), &summary),
                None => println!("Paystub #{paystub} has no timestamp; YTD unavailable"),
            }
        }
    }
    Ok(())
}

async fn run_buy_orders(ctx: &mut AppContext, command: BuyOrderCommand) -> Result<()> {
    match command {
        BuyOrderCommand::Quote {
            price,
            city,
            state,
            fee,
            down,
        } => {
            let state = state.unwrap_or_else(|| ctx.config.defaults.buyer_state.clone());
            let quote = compute_buy_order(
                ctx.rates(),
                &QuoteInput {
                    price,
                    city,
                    fee,
                    down_payment: down,
                    state,
                },
            );
            println!("Price:       {}", format_money(quote.price));
            for item in quote.tax_items.iter() {
                println!(
                    "  {} ({:.2}%): {}",
                    item.name,
                    item.pct_percent,
                    format_money(item.amount)
                );
            }
            println!("Total taxes: {}", format_money(quote.total_taxes));
            println!("Subtotal:    {}", format_money(quote.subtotal));
            println!("Filing fee:  {}", format_money(quote.fee));
            println!("Total:       {}", format_money(quote.total_with_fees));
            println!("Down:        {}", format_money(quote.down_payment));
            println!("Balance due: {}", format_money(quote.balance_due));
        }
        BuyOrderCommand::Add(args) => {
            let order = ctx.save_buy_order(None, &args.into_input()?).await?;
            print_order(&order);
        }
        BuyOrderCommand::Edit { id, order } => {
            let order = ctx.save_buy_order(Some(id), &order.into_input()?).await?;
            print_order(&order);
        }
        BuyOrderCommand::List { search } => {
            let orders = buy_order::list_buy_orders(&ctx.database).await?;
            for order in buy_order::search_buy_orders(&orders, search.as_deref().unwrap_or("")) {
                print_order(order);
            }
        }
        BuyOrderCommand::Register { id } => {
            let order = ctx.register_buy_order(id).await?;
            print_order(&order);
        }
        BuyOrderCommand::Delete { id } => {
            ctx.remove_buy_order(id).await?;
            println!("Deleted buy order #{id}");
        }
        BuyOrderCommand::Fields { id, template } => {
            let order = buy_order::require_buy_order(&ctx.database, id).await?;
            let fields = match template {
                Some(path) => ManifestFile { path }.load()?.fields(),
                None => BuiltinBuyOrderSheet.load()?.fields(),
            };
            let assignments = map_fields(&order, &ctx.config.dealer, &fields)?;
            println!("{}", serde_json::to_string_pretty(&assignments)?);
        }
        BuyOrderCommand::Document {
            id,
            template,
            debug_labels,
            out_dir,
        } => {
            let order = buy_order::require_buy_order(&ctx.database, id).await?;
            let options = FillOptions { debug_labels };
            let document = match template {
                Some(path) => generate_buy_order_document(
                    &ManifestFile { path },
                    &order,
                    &ctx.config.dealer,
                    options,
                )?,
                None => generate_buy_order_document(
                    &BuiltinBuyOrderSheet,
                    &order,
                    &ctx.config.dealer,
                    options,
                )?,
            };
            let path = out_dir.join(&document.file_name);
            std::fs::write(&path, &document.bytes)?;
            println!(
                "Wrote {} ({}/{} fields)",
                path.display(),
                document.report.filled,
                document.report.total
            );
            if !document.report.failed.is_empty() {
                println!("Failed fields: {}", document.report.failed.join(", "));
            }
            if let Some(warning) = &document.report.warning {
                println!("Warning: {warning}");
            }
        }
    }
    Ok(())
}

async fn run_rates(ctx: &mut AppContext, command: RatesCommand) -> Result<()> {
    match command {
        RatesCommand::Show { city } => {
            let book = ctx.rates();
            let names: Vec<String> = match city {
                Some(city) => vec![city],
                None => book.jurisdictions.names().map(str::to_string).collect(),
            };
            for name in names {
                let record = book.resolve_jurisdiction(Some(&name));
                let components = record
                    .components()
                    .iter()
                    .map(|c| format!("{} {:.3}%", c.key, c.percent))
                    .collect::<Vec<_>>()
                    .join(", ");
                println!("{name}: {components} (total {:.3}%)", record.total_percent());
            }
        }
        RatesCommand::Set { city, key, percent } => {
            ctx.set_rate_component(&city, &key, percent).await?;
            println!("{city}.{key} = {percent}%");
        }
    }
    Ok(())
}

async fn run_insurance(ctx: &AppContext, command: InsuranceCommand) -> Result<()> {
    match command {
        InsuranceCommand::Add(args) => {
            let policy = ctx.save_policy(None, &args.into_input()?).await?;
            println!("Added policy #{} {}", policy.id, policy.policy_number);
        }
        InsuranceCommand::Edit { id, policy } => {
            let policy = ctx.save_policy(Some(id), &policy.into_input()?).await?;
            println!("Updated policy #{} {}", policy.id, policy.policy_number);
        }
        InsuranceCommand::List { search } => {
            let policies = insurance::list_policies(&ctx.database).await?;
            for p in insurance::search_policies(&policies, search.as_deref().unwrap_or("")) {
                println!(
                    "#{} [{}] {} | {} {} | {} {} {} | premium {}",
                    p.id,
                    p.status,
                    p.holder_name,
                    p.carrier,
                    p.policy_number,
                    p.year,
                    p.make,
                    p.model,
                    format_money(p.premium.unwrap_or(0.0))
                );
            }
        }
        InsuranceCommand::Status { id, status } => {
            let status: PolicyStatus = status.parse()?;
            let policy = ctx.set_policy_status(id, status).await?;
            println!("Policy #{} is now {}", policy.id, policy.status);
        }
        InsuranceCommand::Archive { id } => {
            let policy = ctx.set_policy_status(id, PolicyStatus::Cancelled).await?;
            println!("Policy #{} cancelled", policy.id);
        }
        InsuranceCommand::Delete { id } => {
            ctx.remove_policy(id).await?;
            println!("Deleted policy #{id}");
        }
    }
    Ok(())
}

async fn run(ctx: &mut AppContext, command: Command) -> Result<()> {
    match command {
        Command::Clients(command) => run_clients(ctx, command).await,
        Command::Paystub(command) => run_paystubs(ctx, command).await,
        Command::Ytd(command) => run_ytd(ctx, command).await,
        Command::Baseline(args) => {
            let input = BaselineInput {
                year: args.year.unwrap_or_else(|| Utc::now().year()),
                regular_gross: args.regular_gross,
                overtime_gross: args.overtime_gross,
                federal_pct: args.federal_pct.map(|pct| pct / 100.0),
            };
            let baseline =
                ytd::adjust_baseline(&ctx.database, &ctx.rates().payroll, args.client, &input)
                    .await?;
            println!(
                "Baseline {} for client #{}: gross {} taxes {}",
                baseline.year,
                baseline.client_id,
                format_money(baseline.gross),
                format_money(baseline.taxes)
            );
            Ok(())
        }
        Command::BuyOrder(command) => run_buy_orders(ctx, command).await,
        Command::Rates(command) => run_rates(ctx, command).await,
        Command::Insurance(command) => run_insurance(ctx, command).await,
        Command::Dashboard => {
            let stats = dashboard_stats(&ctx.database, Utc::now()).await?;
            println!("Clients:         {}", stats.clients_total);
            println!(
                "New clients:     {} ({})",
                stats.clients_30d,
                format_pct(stats.client_growth_pct)
            );
            println!(
                "Paystubs:        {} ({})",
                stats.paystubs_30d,
                format_pct(stats.paystub_growth_pct)
            );
            println!("Active policies: {}", stats.active_policies);
            Ok(())
        }
    }
}

/// Creates the parent directory of a local `SQLite` file URL.
fn ensure_sqlite_dir(url: &str) -> Result<()> {
    let Some(path) = url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or(path);
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    let cli = Cli::parse();

    // 3. Load the application configuration
    let app_config = config::load_default_config()?;

    // 4. Initialize database
    ensure_sqlite_dir(&database::get_database_url())?;
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {}", e))?;

    // 5. Run the command
    let mut ctx = AppContext::new(db, app_config).await?;
    run(&mut ctx, cli.command).await.inspect_err(|e| match e {
        Error::Validation { .. } => error!("{e}"),
        _ => error!("Command failed: {e}"),
    })
}
