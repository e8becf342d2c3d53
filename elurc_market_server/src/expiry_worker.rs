use elurc_market_engine::{db_types::Order, events::EventProducers, OrderFlowApi, OrderFlowOptions, SqliteDatabase};
use log::*;
use tokio::task::JoinHandle;

pub const EXPIRY_CHECK_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

/// Starts the payment timeout worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Once a minute, every `pending` order older than the payment timeout is moved to `timeout`. Orders with an
/// underpayment awaiting review are left alone.
pub fn start_expiry_worker(db: SqliteDatabase, producers: EventProducers, options: OrderFlowOptions) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(EXPIRY_CHECK_INTERVAL);
        let api = OrderFlowApi::new(db, producers).with_options(options);
        let minutes = options.payment_timeout.num_minutes();
        info!("🕰️ Payment timeout worker started. Orders time out after {minutes} minutes");
        loop {
            timer.tick().await;
            trace!("🕰️ Running payment timeout job");
            match api.expire_pending_orders().await {
                Ok(expired) if expired.is_empty() => trace!("🕰️ No orders timed out"),
                Ok(expired) => {
                    info!("🕰️ {} orders timed out", expired.len());
                    debug!("🕰️ Timed out orders: {}", order_list(&expired));
                },
                Err(e) => {
                    error!("🕰️ Error running payment timeout job: {e}");
                },
            }
        }
    })
}

fn order_list(orders: &[Order]) -> String {
    orders
        .iter()
        .map(|o| format!("[{}] {} wallet: {}", o.id, o.order_number, o.customer_wallet))
        .collect::<Vec<String>>()
        .join(", ")
}
