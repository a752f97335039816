use chrono::{DateTime, Duration, Utc};
use stz_common::Money;
use thiserror::Error;

use crate::{
    db_types::{
        Actor,
        Address,
        DesignRecord,
        LedgerEntry,
        NewOrder,
        Order,
        OrderNumber,
        Payment,
        ReturnRequest,
        StatusHistoryEntry,
        User,
    },
    order_objects::{CaptureOutcome, EarningsSummary, OrderQueryFilter, ReturnQueryFilter},
    state_machine::OrderEvent,
};

/// The seeded platform-setting keys. Values are stored as text and parsed at the point of use.
pub const COMMISSION_PERCENTAGE: &str = "commission_percentage";
pub const RETURN_COURIER_FEE: &str = "return_courier_fee";
pub const AUTO_CONFIRM_DAYS: &str = "auto_confirm_days";

/// Fallbacks used when a setting row is missing. The migrations seed the same values, so these
/// only matter on a database that has had its settings rows deleted.
pub const DEFAULT_COMMISSION_PERCENTAGE: f64 = 10.0;
/// In kobo.
pub const DEFAULT_RETURN_COURIER_FEE: i64 = 250_000;
pub const DEFAULT_AUTO_CONFIRM_DAYS: i64 = 2;

/// The storage backend contract for the order and escrow engine.
///
/// Invariants every implementation must uphold:
/// * Each method runs in a single atomic transaction. A failure anywhere inside the method leaves
///   no observable partial state.
/// * Transition methods re-read the order's status inside the transaction and assert the expected
///   `from` state before writing, so a concurrent writer that got there first causes a
///   [`OrderFlowError::PreconditionFailed`] rather than a double-apply.
/// * Every status change writes exactly one status-history row in the same transaction.
/// * Ledger rows are append-only; nothing ever updates or deletes them.
#[allow(async_fn_in_trait)]
pub trait MarketplaceDatabase: Clone {
    /// The URL of the database.
    fn url(&self) -> &str;

    //------------------------------------ Collaborator reads ------------------------------------
    async fn fetch_user(&self, user_id: i64) -> Result<Option<User>, OrderFlowError>;

    /// Fetches a design together with its fabric options, add-ons and size pricings.
    async fn fetch_design(&self, design_id: i64) -> Result<Option<DesignRecord>, OrderFlowError>;

    /// Fetches the address only if it belongs to `user_id`.
    async fn fetch_address_for_user(&self, address_id: i64, user_id: i64) -> Result<Option<Address>, OrderFlowError>;

    //------------------------------------ Orders ------------------------------------------------
    /// Persists a priced order, its option selections and the initial `PENDING_PAYMENT` history
    /// row in one transaction.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, OrderFlowError>;

    async fn fetch_order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, OrderFlowError>;

    async fn fetch_order_by_id(&self, id: i64) -> Result<Option<Order>, OrderFlowError>;

    async fn search_orders(&self, filter: OrderQueryFilter) -> Result<Vec<Order>, OrderFlowError>;

    async fn count_orders(&self, filter: &OrderQueryFilter) -> Result<i64, OrderFlowError>;

    async fn fetch_status_history(&self, order_id: i64) -> Result<Vec<StatusHistoryEntry>, OrderFlowError>;

    /// Applies one state-machine edge to the order: status update (guarded on the expected `from`
    /// state), event-specific timestamps, one history row, and — for `Confirm`/`AutoConfirm` —
    /// the escrow release, all in the same transaction.
    ///
    /// `MarkDelivered` reads `auto_confirm_days` inside the transaction to stamp the
    /// auto-confirmation deadline. Money-bearing events other than confirmation
    /// (`PaymentCaptured`, the return events) have dedicated methods below and are rejected here.
    async fn apply_transition(
        &self,
        number: &OrderNumber,
        event: OrderEvent,
        actor: &Actor,
        note: Option<String>,
    ) -> Result<Order, OrderFlowError>;

    /// Orders sitting in `DELIVERED` with `delivered_at <= cutoff`, i.e. due for auto-confirmation.
    async fn fetch_due_auto_confirmations(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, OrderFlowError>;

    //------------------------------------ Payments / escrow -------------------------------------
    /// Creates the 1:1 payment record for the order in `PENDING` status, or re-points an existing
    /// still-`PENDING` record at a fresh gateway reference. Any other payment state is a conflict.
    async fn upsert_pending_payment(
        &self,
        order_id: i64,
        reference: &str,
        amount: Money,
        currency: &str,
    ) -> Result<Payment, OrderFlowError>;

    async fn fetch_payment_for_order(&self, order_id: i64) -> Result<Option<Payment>, OrderFlowError>;

    async fn fetch_payment_by_reference(&self, reference: &str) -> Result<Option<Payment>, OrderFlowError>;

    /// Handles a gateway-confirmed successful charge: payment `PENDING` → `HELD_IN_ESCROW`, one
    /// `ESCROW_HOLD` ledger row, order → `PAID`, history row — one transaction.
    ///
    /// Idempotent: if the payment is already `HELD_IN_ESCROW` (duplicate webhook delivery,
    /// verify-after-webhook), nothing is written and `applied` is false in the result. A payment
    /// in `RELEASED`/`REFUNDED` is a conflict.
    async fn capture_payment(&self, reference: &str) -> Result<CaptureOutcome, OrderFlowError>;

    //------------------------------------ Returns -----------------------------------------------
    /// Creates the return request and moves the order `DELIVERED` → `RETURN_REQUESTED`. The
    /// delivery-window check (`now − delivered_at <= window`) runs inside the transaction; the
    /// boundary itself is inside the window.
    async fn create_return_request(
        &self,
        number: &OrderNumber,
        actor: &Actor,
        reason: &str,
        window: Duration,
    ) -> Result<ReturnRequest, OrderFlowError>;

    async fn fetch_return_request(&self, id: i64) -> Result<Option<(ReturnRequest, Order)>, OrderFlowError>;

    async fn search_return_requests(&self, filter: ReturnQueryFilter) -> Result<Vec<ReturnRequest>, OrderFlowError>;

    /// `PENDING` → `APPROVED`. The order stays in `RETURN_REQUESTED`.
    async fn approve_return(
        &self,
        id: i64,
        actor: &Actor,
        notes: Option<String>,
    ) -> Result<ReturnRequest, OrderFlowError>;

    /// `PENDING` → `REJECTED`; the order reverts to `DELIVERED`. The return window is not
    /// extended by the round-trip.
    async fn reject_return(
        &self,
        id: i64,
        actor: &Actor,
        notes: Option<String>,
    ) -> Result<ReturnRequest, OrderFlowError>;

    /// `APPROVED` → `PICKUP_DISPATCHED`; the order moves to `RETURN_PICKUP`.
    async fn dispatch_return_pickup(
        &self,
        id: i64,
        actor: &Actor,
        notes: Option<String>,
    ) -> Result<ReturnRequest, OrderFlowError>;

    /// `PICKUP_DISPATCHED` → `RETURNED`; the order moves to `RETURNED` and the escrow refund
    /// (refund to customer, courier-fee deduction from designer) is written in the same
    /// transaction. The payment must still be `HELD_IN_ESCROW`.
    async fn complete_return(
        &self,
        id: i64,
        actor: &Actor,
        notes: Option<String>,
        courier_fee: Money,
    ) -> Result<ReturnRequest, OrderFlowError>;

    //------------------------------------ Ledger ------------------------------------------------
    async fn fetch_ledger_entries(&self, user_id: i64) -> Result<Vec<LedgerEntry>, OrderFlowError>;

    async fn earnings_summary(&self, designer_id: i64) -> Result<EarningsSummary, OrderFlowError>;

    //------------------------------------ Settings ----------------------------------------------
    async fn fetch_setting(&self, key: &str) -> Result<Option<String>, OrderFlowError>;

    async fn update_setting(&self, key: &str, value: &str, actor: &Actor) -> Result<(), OrderFlowError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), OrderFlowError> {
        Ok(())
    }
}

/// The error taxonomy for the whole engine. Server layers map these onto HTTP statuses; nothing
/// here is ever retried automatically except `ExternalUnavailable`.
#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("{0} is currently unavailable")]
    ExternalUnavailable(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl OrderFlowError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn forbidden(why: impl Into<String>) -> Self {
        Self::Forbidden(why.into())
    }

    pub fn precondition(why: impl Into<String>) -> Self {
        Self::PreconditionFailed(why.into())
    }

    pub fn conflict(why: impl Into<String>) -> Self {
        Self::Conflict(why.into())
    }
}

impl From<sqlx::Error> for OrderFlowError {
    fn from(e: sqlx::Error) -> Self {
        OrderFlowError::DatabaseError(e.to_string())
    }
}
