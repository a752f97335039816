use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use stz_common::{Money, NAIRA_CURRENCY_CODE};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------     OrderNumber     ---------------------------------------------------------
/// The human-readable, immutable order identifier, e.g. `STZ-20260829-7QX1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderNumber(pub String);

impl FromStr for OrderNumber {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderNumber {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl OrderNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------     OrderStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// The order has been created, but no successful payment has been captured yet.
    PendingPayment,
    /// Payment has been captured and is held in escrow. The designer has not responded yet.
    Paid,
    /// The designer has accepted the order.
    Accepted,
    /// The designer declined the order.
    Rejected,
    /// The designer has started work on the garment.
    InProgress,
    /// The garment is finished and waiting for courier pickup.
    ReadyForPickup,
    /// The courier has collected the garment from the designer.
    PickedUp,
    /// The garment is on its way to the customer.
    InTransit,
    /// The garment has been delivered. The confirmation/return window is open.
    Delivered,
    /// The customer confirmed satisfaction. Funds have been released.
    Confirmed,
    /// The confirmation window lapsed and the system confirmed on the customer's behalf.
    AutoConfirmed,
    /// The customer has asked to return the garment.
    ReturnRequested,
    /// A courier has been dispatched to collect the return.
    ReturnPickup,
    /// The return is complete. The customer has been refunded.
    Returned,
    /// The customer cancelled before the designer accepted.
    Cancelled,
}

impl OrderStatus {
    /// Terminal states retain their full history but permit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Rejected |
                OrderStatus::Confirmed |
                OrderStatus::AutoConfirmed |
                OrderStatus::Returned |
                OrderStatus::Cancelled
        )
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::PendingPayment => "PENDING_PAYMENT",
            OrderStatus::Paid => "PAID",
            OrderStatus::Accepted => "ACCEPTED",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::InProgress => "IN_PROGRESS",
            OrderStatus::ReadyForPickup => "READY_FOR_PICKUP",
            OrderStatus::PickedUp => "PICKED_UP",
            OrderStatus::InTransit => "IN_TRANSIT",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::AutoConfirmed => "AUTO_CONFIRMED",
            OrderStatus::ReturnRequested => "RETURN_REQUESTED",
            OrderStatus::ReturnPickup => "RETURN_PICKUP",
            OrderStatus::Returned => "RETURNED",
            OrderStatus::Cancelled => "CANCELLED",
        };
        write!(f, "{s}")
    }
}

impl FromStr for OrderStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING_PAYMENT" => Ok(Self::PendingPayment),
            "PAID" => Ok(Self::Paid),
            "ACCEPTED" => Ok(Self::Accepted),
            "REJECTED" => Ok(Self::Rejected),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "READY_FOR_PICKUP" => Ok(Self::ReadyForPickup),
            "PICKED_UP" => Ok(Self::PickedUp),
            "IN_TRANSIT" => Ok(Self::InTransit),
            "DELIVERED" => Ok(Self::Delivered),
            "CONFIRMED" => Ok(Self::Confirmed),
            "AUTO_CONFIRMED" => Ok(Self::AutoConfirmed),
            "RETURN_REQUESTED" => Ok(Self::ReturnRequested),
            "RETURN_PICKUP" => Ok(Self::ReturnPickup),
            "RETURNED" => Ok(Self::Returned),
            "CANCELLED" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------     Role / Actor    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Customer,
    Designer,
    Admin,
    System,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Customer => "CUSTOMER",
            Role::Designer => "DESIGNER",
            Role::Admin => "ADMIN",
            Role::System => "SYSTEM",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CUSTOMER" => Ok(Self::Customer),
            "DESIGNER" => Ok(Self::Designer),
            "ADMIN" => Ok(Self::Admin),
            "SYSTEM" => Ok(Self::System),
            s => Err(ConversionError(format!("Invalid role: {s}"))),
        }
    }
}

/// The authenticated party performing an operation. The scheduler and webhook handlers act as
/// [`Actor::system`], everything else carries a user id from the auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: i64,
    pub role: Role,
}

impl Actor {
    pub fn new(id: i64, role: Role) -> Self {
        Self { id, role }
    }

    pub fn system() -> Self {
        Self { id: 0, role: Role::System }
    }

    /// The value recorded in the `changed_by` column of the status history.
    pub fn label(&self) -> String {
        match self.role {
            Role::System => "SYSTEM".to_string(),
            _ => self.id.to_string(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

//--------------------------------------        Order        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_number: OrderNumber,
    pub customer_id: i64,
    pub designer_id: i64,
    pub design_id: i64,
    pub delivery_address_id: i64,
    pub status: OrderStatus,
    pub base_price: Money,
    pub fabric_adjustment: Money,
    pub size_adjustment: Money,
    pub add_ons_total: Money,
    pub delivery_fee: Money,
    pub total_price: Money,
    pub platform_commission: Money,
    pub currency: String,
    pub size_label: Option<String>,
    pub special_instructions: Option<String>,
    /// JSON snapshot of the customer's measurements, frozen at creation time.
    pub measurement_snapshot: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub ready_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub auto_confirm_deadline: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn designer_earnings(&self) -> Money {
        self.total_price - self.platform_commission
    }

    pub fn is_owned_by_customer(&self, actor: &Actor) -> bool {
        actor.role == Role::Customer && self.customer_id == actor.id
    }

    pub fn is_owned_by_designer(&self, actor: &Actor) -> bool {
        actor.role == Role::Designer && self.designer_id == actor.id
    }
}

//--------------------------------------       NewOrder      ---------------------------------------------------------
/// A fully validated and priced order, ready to be persisted. Produced by
/// [`crate::OrderFlowApi::create_order`]; the monetary breakdown is computed once here and never
/// recalculated.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: OrderNumber,
    pub customer_id: i64,
    pub designer_id: i64,
    pub design_id: i64,
    pub delivery_address_id: i64,
    pub base_price: Money,
    pub fabric_adjustment: Money,
    pub size_adjustment: Money,
    pub add_ons_total: Money,
    pub delivery_fee: Money,
    pub total_price: Money,
    pub platform_commission: Money,
    pub currency: String,
    pub size_label: Option<String>,
    pub special_instructions: Option<String>,
    pub measurement_snapshot: Option<String>,
    pub fabric_option_id: Option<i64>,
    /// `(add_on_id, price at selection time)`
    pub add_on_selections: Vec<(i64, Money)>,
}

//--------------------------------------       Payment       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    HeldInEscrow,
    Released,
    Refunded,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::HeldInEscrow => "HELD_IN_ESCROW",
            PaymentStatus::Released => "RELEASED",
            PaymentStatus::Refunded => "REFUNDED",
        };
        write!(f, "{s}")
    }
}

/// The escrow record for one order. Created lazily on the first payment initialization; exactly
/// one per order.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub order_id: i64,
    /// The gateway transaction reference. Unique across all payments.
    pub reference: String,
    pub amount: Money,
    pub currency: String,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub released_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------     LedgerEntry     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerEntryType {
    EscrowHold,
    EscrowRelease,
    CommissionDeduction,
    Refund,
    ReturnFeeDeduction,
    Withdrawal,
}

impl Display for LedgerEntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LedgerEntryType::EscrowHold => "ESCROW_HOLD",
            LedgerEntryType::EscrowRelease => "ESCROW_RELEASE",
            LedgerEntryType::CommissionDeduction => "COMMISSION_DEDUCTION",
            LedgerEntryType::Refund => "REFUND",
            LedgerEntryType::ReturnFeeDeduction => "RETURN_FEE_DEDUCTION",
            LedgerEntryType::Withdrawal => "WITHDRAWAL",
        };
        write!(f, "{s}")
    }
}

/// One immutable monetary movement (a wallet transaction). Ledger rows are only ever appended;
/// balances are always derived by summation.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub user_id: i64,
    pub payment_id: i64,
    pub entry_type: LedgerEntryType,
    pub amount: Money,
    pub currency: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------    ReturnRequest    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnStatus {
    Pending,
    Approved,
    PickupDispatched,
    Returned,
    Rejected,
}

impl Display for ReturnStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReturnStatus::Pending => "PENDING",
            ReturnStatus::Approved => "APPROVED",
            ReturnStatus::PickupDispatched => "PICKUP_DISPATCHED",
            ReturnStatus::Returned => "RETURNED",
            ReturnStatus::Rejected => "REJECTED",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ReturnStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "PICKUP_DISPATCHED" => Ok(Self::PickupDispatched),
            "RETURNED" => Ok(Self::Returned),
            "REJECTED" => Ok(Self::Rejected),
            s => Err(ConversionError(format!("Invalid return status: {s}"))),
        }
    }
}

/// A post-delivery return. At most one per order.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ReturnRequest {
    pub id: i64,
    pub order_id: i64,
    pub reason: String,
    pub status: ReturnStatus,
    pub admin_notes: Option<String>,
    pub courier_fee: Option<Money>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//-------------------------------------- StatusHistoryEntry  ---------------------------------------------------------
/// One row per status change, written in the same transaction as the change itself.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub id: i64,
    pub order_id: i64,
    pub from_status: Option<OrderStatus>,
    pub to_status: OrderStatus,
    pub note: String,
    pub changed_by: String,
    pub created_at: DateTime<Utc>,
}

//-------------------------------------- Collaborator records --------------------------------------------------------
// Thin records for the entities the order flow collaborates with. Their CRUD surfaces live
// outside this crate; order creation only ever reads them.

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub open_tailor_email: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Address {
    pub id: i64,
    pub user_id: i64,
    pub line1: String,
    pub city: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Design {
    pub id: i64,
    pub designer_id: i64,
    pub title: String,
    pub base_price: Money,
    pub currency: String,
    pub is_published: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct FabricOption {
    pub id: i64,
    pub design_id: i64,
    pub name: String,
    pub price_adjustment: Money,
    pub is_available: bool,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AddOn {
    pub id: i64,
    pub design_id: i64,
    pub name: String,
    pub price: Money,
    pub is_available: bool,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SizePricing {
    pub id: i64,
    pub design_id: i64,
    pub size_label: String,
    pub price_adjustment: Money,
}

/// A design together with its selectable options, as needed to price an order.
#[derive(Debug, Clone)]
pub struct DesignRecord {
    pub design: Design,
    pub fabric_options: Vec<FabricOption>,
    pub add_ons: Vec<AddOn>,
    pub size_pricings: Vec<SizePricing>,
}

pub fn default_currency() -> String {
    NAIRA_CURRENCY_CODE.to_string()
}
