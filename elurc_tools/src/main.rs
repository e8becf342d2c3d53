use std::{path::PathBuf, time::Duration};

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use elurc_common::{Lamports, Secret};
use elurc_market_engine::{
    db_types::{OrderId, OrderStatusType},
    order_objects::{DiscrepancyDecision, OrderRequest, PaymentConfirmation},
};
use elurc_market_server::data_objects::OrderSearchParams;
use url::Url;

mod client;
mod formatting;
mod poller;

use crate::{
    client::MarketClient,
    formatting::{
        format_history,
        format_order,
        format_orders,
        format_payment_result,
        format_poll_outcome,
        format_products,
    },
    poller::PaymentPoller,
};

#[derive(Parser, Debug)]
#[command(version, about = "Command-line client for the ELURC marketplace server")]
pub struct Arguments {
    /// The base URL of the marketplace server
    #[arg(short, long, env = "ELURC_SERVER_URL", default_value = "http://127.0.0.1:8470")]
    server: Url,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check that the server is up
    Health,
    /// List the product catalog
    Products {
        /// Leave out sold-out products
        #[arg(long)]
        in_stock: bool,
    },
    /// Place an order. The file holds the checkout request as JSON: customer_wallet, shipping_address and items.
    Order {
        #[arg(required = true, index = 1)]
        file: PathBuf,
    },
    /// Show an order
    Show {
        #[arg(required = true, index = 1)]
        order_id: OrderId,
    },
    /// Poll the status of an order until it is paid, cancelled, times out or needs review
    Poll(PollParams),
    /// [Admin] Search orders
    Search(SearchParams),
    /// [Admin] Show the status history of an order
    History {
        #[arg(required = true, index = 1)]
        order_id: OrderId,
    },
    /// [Admin] Mark a paid order as shipped
    Fulfil {
        #[arg(required = true, index = 1)]
        order_id: OrderId,
        #[arg(short, long, default_value = "Order shipped")]
        reason: String,
    },
    /// [Admin] Cancel an order
    Cancel {
        #[arg(required = true, index = 1)]
        order_id: OrderId,
        #[arg(short, long)]
        reason: String,
    },
    /// [Admin] Move an order to any status the state machine allows
    SetStatus {
        #[arg(required = true, index = 1)]
        order_id: OrderId,
        #[arg(required = true, index = 2)]
        status: OrderStatusType,
        #[arg(short, long)]
        reason: String,
    },
    /// [Admin] Approve or reject an underpaid order
    Resolve {
        #[arg(required = true, index = 1)]
        order_id: OrderId,
        #[arg(required = true, index = 2, value_enum)]
        decision: Decision,
        #[arg(short, long, default_value = "")]
        notes: String,
    },
    /// Send a signed payment confirmation to the webhook, as the ledger verifier would
    Confirm(ConfirmParams),
}

#[derive(Debug, Args)]
pub struct PollParams {
    #[arg(required = true, index = 1)]
    order_id: OrderId,
    /// Seconds between polls
    #[arg(short, long, default_value = "5")]
    interval: u64,
    /// Minutes to wait before giving up
    #[arg(short, long, default_value = "30")]
    deadline: u64,
}

#[derive(Debug, Args)]
pub struct SearchParams {
    /// Comma-separated list of statuses, e.g. pending,timeout
    #[arg(short, long)]
    status: Option<String>,
    #[arg(short, long)]
    wallet: Option<String>,
    #[arg(short = 'n', long)]
    order_number: Option<String>,
    /// Only underpaid orders waiting for a decision
    #[arg(short, long)]
    awaiting_review: bool,
}

#[derive(Debug, Args)]
pub struct ConfirmParams {
    #[arg(required = true, index = 1)]
    order_id: OrderId,
    /// The transaction signature
    #[arg(short = 't', long = "txid")]
    signature: String,
    /// The amount received, in lamports
    #[arg(short, long)]
    amount: i64,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Decision {
    Approve,
    Reject,
}

impl From<Decision> for DiscrepancyDecision {
    fn from(d: Decision) -> Self {
        match d {
            Decision::Approve => DiscrepancyDecision::Approve,
            Decision::Reject => DiscrepancyDecision::Reject,
        }
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();
    let cli = Arguments::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Arguments) -> Result<()> {
    let admin_key = Secret::new(std::env::var("ELURC_ADMIN_API_KEY").unwrap_or_default());
    let hmac_secret = Secret::new(std::env::var("ELURC_WEBHOOK_HMAC_SECRET").unwrap_or_default());
    let client = MarketClient::new(cli.server, admin_key, hmac_secret)?;
    match cli.command {
        Command::Health => println!("{} says {}", client.server(), client.health().await?.trim()),
        Command::Products { in_stock } => println!("{}", format_products(&client.products(in_stock).await?)),
        Command::Order { file } => {
            let contents = std::fs::read_to_string(&file)
                .map_err(|e| anyhow!("Could not read {}. {e}", file.display()))?;
            let request: OrderRequest = serde_json::from_str(&contents)?;
            let order = client.create_order(&request).await?;
            println!("Order placed. Please send {} to complete it.", order.amount_elurc);
            println!("{}", format_order(&order)?);
        },
        Command::Show { order_id } => println!("{}", format_order(&client.order(&order_id).await?)?),
        Command::Poll(params) => {
            let poller = PaymentPoller::new(client)
                .with_interval(Duration::from_secs(params.interval))
                .with_deadline(Duration::from_secs(params.deadline * 60));
            println!("Waiting for payment of order {}", params.order_id);
            let outcome = poller.wait_for_payment(&params.order_id).await;
            println!("{}", format_poll_outcome(&outcome));
        },
        Command::Search(params) => {
            let query = OrderSearchParams {
                order_number: params.order_number,
                customer_wallet: params.wallet,
                status: params.status,
                awaiting_review: params.awaiting_review,
                ..Default::default()
            };
            println!("{}", format_orders(&client.search_orders(&query).await?));
        },
        Command::History { order_id } => println!("{}", format_history(&client.order_history(&order_id).await?)),
        Command::Fulfil { order_id, reason } => {
            println!("{}", format_order(&client.fulfil_order(&order_id, &reason).await?)?)
        },
        Command::Cancel { order_id, reason } => {
            println!("{}", format_order(&client.cancel_order(&order_id, &reason).await?)?)
        },
        Command::SetStatus { order_id, status, reason } => {
            println!("{}", format_order(&client.set_order_status(&order_id, status, &reason).await?)?)
        },
        Command::Resolve { order_id, decision, notes } => {
            let order = client.resolve_discrepancy(&order_id, decision.into(), &notes).await?;
            println!("{}", format_order(&order)?)
        },
        Command::Confirm(params) => {
            let payment = PaymentConfirmation {
                order_id: params.order_id,
                transaction_signature: params.signature,
                amount_received: Lamports::from(params.amount),
            };
            println!("{}", format_payment_result(&client.confirm_payment(&payment).await?)?);
        },
    }
    Ok(())
}
