use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use elurc_common::{EuroCents, Lamports};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value for {kind}: {value}")]
pub struct ConversionError {
    kind: &'static str,
    value: String,
}

impl ConversionError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self { kind, value: value.to_string() }
    }
}

//--------------------------------------        OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    /// Generates a fresh, random order identifier.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OrderId {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConversionError::new("order id", s));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------       ProductId       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct ProductId(pub String);

impl ProductId {
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatusType {
    /// The order has been placed and is awaiting payment.
    Pending,
    /// Payment for the order has been confirmed.
    Paid,
    /// The order is being picked and packed. Inventory has been committed.
    Processing,
    /// The order has shipped.
    Fulfilled,
    /// The order was cancelled by an admin, or a payment discrepancy was rejected.
    Cancelled,
    /// The payment window elapsed before a payment was confirmed.
    Timeout,
}

impl OrderStatusType {
    pub const ALL: [OrderStatusType; 6] = [
        OrderStatusType::Pending,
        OrderStatusType::Paid,
        OrderStatusType::Processing,
        OrderStatusType::Fulfilled,
        OrderStatusType::Cancelled,
        OrderStatusType::Timeout,
    ];

    /// Terminal orders accept no further status changes.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatusType::Fulfilled | OrderStatusType::Cancelled)
    }

    /// Whether a payment confirmation may still be applied to an order in this state.
    pub fn accepts_payment(&self) -> bool {
        matches!(self, OrderStatusType::Pending | OrderStatusType::Timeout)
    }

    /// Whether stock for the order's items is currently held back from the catalog.
    pub fn holds_inventory(&self) -> bool {
        matches!(self, OrderStatusType::Processing | OrderStatusType::Fulfilled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatusType::Pending => "pending",
            OrderStatusType::Paid => "paid",
            OrderStatusType::Processing => "processing",
            OrderStatusType::Fulfilled => "fulfilled",
            OrderStatusType::Cancelled => "cancelled",
            OrderStatusType::Timeout => "timeout",
        }
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "processing" => Ok(Self::Processing),
            "fulfilled" => Ok(Self::Fulfilled),
            "cancelled" => Ok(Self::Cancelled),
            "timeout" => Ok(Self::Timeout),
            _ => Err(ConversionError::new("order status", s)),
        }
    }
}

//--------------------------------------    DiscrepancyType    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscrepancyType {
    Underpayment,
    Overpayment,
}

impl Display for DiscrepancyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscrepancyType::Underpayment => write!(f, "underpayment"),
            DiscrepancyType::Overpayment => write!(f, "overpayment"),
        }
    }
}

impl FromStr for DiscrepancyType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "underpayment" => Ok(Self::Underpayment),
            "overpayment" => Ok(Self::Overpayment),
            _ => Err(ConversionError::new("discrepancy type", s)),
        }
    }
}

//-------------------------------------- DiscrepancyResolution ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyResolution {
    /// An underpayment beyond the tolerance is waiting for an admin decision.
    Pending,
    /// Overpayments and small underpayments are accepted without review.
    AutoAccepted,
    Approved,
    Rejected,
}

impl Display for DiscrepancyResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DiscrepancyResolution::Pending => "pending",
            DiscrepancyResolution::AutoAccepted => "auto_accepted",
            DiscrepancyResolution::Approved => "approved",
            DiscrepancyResolution::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}

impl FromStr for DiscrepancyResolution {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "auto_accepted" => Ok(Self::AutoAccepted),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(ConversionError::new("discrepancy resolution", s)),
        }
    }
}

//--------------------------------------  PaymentDiscrepancy   ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDiscrepancy {
    pub has_discrepancy: bool,
    pub discrepancy_type: Option<DiscrepancyType>,
    /// The absolute difference between the expected and the received amount.
    pub difference_amount: Lamports,
    pub received_amount: Option<Lamports>,
    pub resolution: Option<DiscrepancyResolution>,
    pub resolution_notes: Option<String>,
}

impl PaymentDiscrepancy {
    /// A payment that matched the order total exactly.
    pub fn exact(received: Lamports) -> Self {
        Self { received_amount: Some(received), ..Default::default() }
    }

    pub fn is_awaiting_review(&self) -> bool {
        self.has_discrepancy && self.resolution == Some(DiscrepancyResolution::Pending)
    }

    pub fn is_underpayment(&self) -> bool {
        self.discrepancy_type == Some(DiscrepancyType::Underpayment)
    }
}

//--------------------------------------    ShippingAddress    ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub name: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl ShippingAddress {
    /// Returns the names of required fields that are blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("name", &self.name),
            ("line1", &self.line1),
            ("city", &self.city),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k)
        .collect()
    }
}

//--------------------------------------       OrderItem       ---------------------------------------------------------
/// A line on an order. Name and prices are a snapshot taken when the order was placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i64,
    pub price_elurc: Lamports,
    pub price_eur: EuroCents,
}

impl OrderItem {
    pub fn line_total_elurc(&self) -> Lamports {
        self.price_elurc * self.quantity
    }

    pub fn line_total_eur(&self) -> EuroCents {
        self.price_eur * self.quantity
    }

    /// Both line totals, or `None` if either does not fit in an `i64`.
    pub fn checked_line_totals(&self) -> Option<(Lamports, EuroCents)> {
        Some((self.price_elurc.checked_mul(self.quantity)?, self.price_eur.checked_mul(self.quantity)?))
    }
}

//--------------------------------------         Order         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub status: OrderStatusType,
    pub amount_elurc: Lamports,
    pub amount_eur: EuroCents,
    pub customer_wallet: String,
    pub shipping_address: ShippingAddress,
    pub items: Vec<OrderItem>,
    pub transaction_signature: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_discrepancy: PaymentDiscrepancy,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_awaiting_review(&self) -> bool {
        self.payment_discrepancy.is_awaiting_review()
    }
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: OrderId,
    pub order_number: String,
    pub customer_wallet: String,
    pub shipping_address: ShippingAddress,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn total_elurc(&self) -> Lamports {
        self.items.iter().map(OrderItem::line_total_elurc).sum()
    }

    pub fn total_eur(&self) -> EuroCents {
        self.items.iter().map(OrderItem::line_total_eur).sum()
    }

    /// The order totals, or `None` if any line or the sum overflows.
    pub fn checked_totals(&self) -> Option<(Lamports, EuroCents)> {
        self.items.iter().try_fold((Lamports::default(), EuroCents::default()), |(elurc, eur), item| {
            let (line_elurc, line_eur) = item.checked_line_totals()?;
            Some((elurc.checked_add(line_elurc)?, eur.checked_add(line_eur)?))
        })
    }
}

//--------------------------------------        Product        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub price_elurc: Lamports,
    pub price_eur: EuroCents,
    pub stock: i64,
    pub in_stock: bool,
    pub category: Option<String>,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn can_supply(&self, quantity: i64) -> bool {
        quantity > 0 && self.in_stock && self.stock >= quantity
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub slug: String,
    pub price_elurc: Lamports,
    pub price_eur: EuroCents,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

//--------------------------------------    StatusLogEntry     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusLogEntry {
    pub order_id: OrderId,
    pub old_status: Option<OrderStatusType>,
    pub new_status: OrderStatusType,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in OrderStatusType::ALL {
            assert_eq!(status.to_string().parse::<OrderStatusType>().unwrap(), status);
        }
        assert_eq!("PAID".parse::<OrderStatusType>().unwrap(), OrderStatusType::Paid);
        assert!("shipped".parse::<OrderStatusType>().is_err());
    }

    #[test]
    fn terminal_states() {
        let terminal = OrderStatusType::ALL.into_iter().filter(|s| s.is_terminal()).collect::<Vec<_>>();
        assert_eq!(terminal, vec![OrderStatusType::Fulfilled, OrderStatusType::Cancelled]);
    }

    #[test]
    fn missing_address_fields() {
        let address = ShippingAddress {
            name: "Ada".into(),
            line1: " ".into(),
            city: "Brussels".into(),
            postal_code: "".into(),
            country: "BE".into(),
            ..Default::default()
        };
        assert_eq!(address.missing_fields(), vec!["line1", "postal_code"]);
    }

    #[test]
    fn resolution_serializes_in_snake_case() {
        let json = serde_json::to_string(&DiscrepancyResolution::AutoAccepted).unwrap();
        assert_eq!(json, "\"auto_accepted\"");
        assert_eq!("auto_accepted".parse::<DiscrepancyResolution>().unwrap(), DiscrepancyResolution::AutoAccepted);
    }

    #[test]
    fn new_order_totals() {
        let order = NewOrder {
            id: OrderId::random(),
            order_number: "ELR-20240101-AAAAAA".into(),
            customer_wallet: "wallet".into(),
            shipping_address: ShippingAddress::default(),
            items: vec![
                OrderItem {
                    product_id: "a".into(),
                    product_name: "Apples".into(),
                    quantity: 3,
                    price_elurc: Lamports::from(2_000_000),
                    price_eur: EuroCents::from(150),
                },
                OrderItem {
                    product_id: "b".into(),
                    product_name: "Bread".into(),
                    quantity: 1,
                    price_elurc: Lamports::from(4_500_000),
                    price_eur: EuroCents::from(320),
                },
            ],
            created_at: Utc::now(),
        };
        assert_eq!(order.total_elurc(), Lamports::from(10_500_000));
        assert_eq!(order.total_eur(), EuroCents::from(770));
    }
}
