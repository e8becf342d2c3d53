use std::fmt::Write;

use anyhow::Result;
use elurc_market_engine::db_types::{Order, Product, StatusLogEntry};
use elurc_market_server::data_objects::PaymentResult;
use prettytable::{
    format::{LinePosition, LineSeparator, TableFormat},
    row,
    Table,
};

use crate::poller::PollOutcome;

fn markdown_format() -> TableFormat {
    prettytable::format::FormatBuilder::new()
        .column_separator('|')
        .borders('|')
        .separator(LinePosition::Title, LineSeparator::new('-', '|', '|', '|'))
        .padding(1, 1)
        .build()
}

pub fn format_products(products: &[Product]) -> String {
    if products.is_empty() {
        return "The catalog is empty".to_string();
    }
    let mut table = Table::new();
    table.set_format(markdown_format());
    table.set_titles(row!["ID", "Slug", "Name", "Price", "EUR", "Stock"]);
    for p in products {
        let stock = if p.in_stock { p.stock.to_string() } else { "sold out".to_string() };
        table.add_row(row![p.id, p.slug, p.name, p.price_elurc, p.price_eur, stock]);
    }
    table.to_string()
}

pub fn format_orders(orders: &[Order]) -> String {
    if orders.is_empty() {
        return "No orders found".to_string();
    }
    let mut table = Table::new();
    table.set_format(markdown_format());
    table.set_titles(row!["ID", "Number", "Status", "Amount", "Wallet", "Review", "Created"]);
    for o in orders {
        let review = if o.is_awaiting_review() { "⚠️" } else { "" };
        table.add_row(row![
            o.id,
            o.order_number,
            o.status,
            o.amount_elurc,
            o.customer_wallet,
            review,
            o.created_at.format("%Y-%m-%d %H:%M")
        ]);
    }
    table.to_string()
}

pub fn format_order(order: &Order) -> Result<String> {
    let mut f = String::new();
    writeln!(f, "===============================================================================")?;
    writeln!(f, "Order {} [{}]", order.order_number, order.id)?;
    writeln!(f, "===============================================================================")?;
    writeln!(f, "Status     : {}", order.status)?;
    writeln!(f, "Amount     : {} ({})", order.amount_elurc, order.amount_eur)?;
    writeln!(f, "Wallet     : {}", order.customer_wallet)?;
    let address = &order.shipping_address;
    writeln!(f, "Ship to    : {}, {} {}", address.name, address.city, address.country)?;
    if let Some(sig) = &order.transaction_signature {
        writeln!(f, "Transaction: {sig}")?;
    }
    if let Some(paid_at) = order.paid_at {
        writeln!(f, "Paid at    : {paid_at}")?;
    }
    let discrepancy = &order.payment_discrepancy;
    if discrepancy.has_discrepancy {
        let kind = discrepancy.discrepancy_type.map(|t| t.to_string()).unwrap_or_default();
        let resolution = discrepancy.resolution.map(|r| r.to_string()).unwrap_or_default();
        writeln!(f, "Discrepancy: {kind} of {} ({resolution})", discrepancy.difference_amount)?;
    }
    if let Some(notes) = &order.admin_notes {
        writeln!(f, "Notes      : {notes}")?;
    }
    let mut table = Table::new();
    table.set_format(markdown_format());
    table.set_titles(row!["Product", "Qty", "Price", "Total"]);
    for item in &order.items {
        table.add_row(row![item.product_name, item.quantity, item.price_elurc, item.line_total_elurc()]);
    }
    writeln!(f, "{table}")?;
    Ok(f)
}

pub fn format_history(history: &[StatusLogEntry]) -> String {
    let mut table = Table::new();
    table.set_format(markdown_format());
    table.set_titles(row!["When", "From", "To", "Reason"]);
    for e in history {
        let from = e.old_status.map(|s| s.to_string()).unwrap_or_else(|| "-".into());
        table.add_row(row![e.created_at.format("%Y-%m-%d %H:%M:%S"), from, e.new_status, e.reason]);
    }
    table.to_string()
}

pub fn format_payment_result(result: &PaymentResult) -> Result<String> {
    let mut f = String::new();
    writeln!(f, "Result: {}", serde_json::to_string(&result.result)?.trim_matches('"'))?;
    write!(f, "{}", format_order(&result.order)?)?;
    Ok(f)
}

pub fn format_poll_outcome(outcome: &PollOutcome) -> String {
    match outcome {
        PollOutcome::Paid(s) => format!("✅️ Order {} is paid ({})", s.order_number, s.status),
        PollOutcome::Cancelled(s) => format!("❌️ Order {} was cancelled", s.order_number),
        PollOutcome::TimedOut(s) => format!("⌛️ Order {} timed out before a payment arrived", s.order_number),
        PollOutcome::UnderReview(s) => format!(
            "⚠️ Order {} was underpaid by {} and is waiting for review",
            s.order_number, s.payment_discrepancy.difference_amount
        ),
        PollOutcome::NotFound => "❓️ The order does not exist".to_string(),
        PollOutcome::Deadline => "⏳️ Gave up waiting for the payment".to_string(),
    }
}
