//! Request, response and query objects for the engine's public APIs.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stz_common::Money;

use crate::db_types::{Order, OrderStatus, ReturnStatus};

/// What a customer submits at checkout. Everything here is validated against the design before
/// any pricing happens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub design_id: i64,
    pub delivery_address_id: i64,
    #[serde(default)]
    pub fabric_option_id: Option<i64>,
    #[serde(default)]
    pub add_on_ids: Vec<i64>,
    #[serde(default)]
    pub size_label: Option<String>,
    #[serde(default)]
    pub delivery_fee: Option<Money>,
    #[serde(default)]
    pub special_instructions: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl Pagination {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(20).clamp(1, 100)
    }

    pub fn offset(&self) -> u32 {
        (self.page() - 1).saturating_mul(self.limit())
    }
}

/// Filter for order list/search queries. Role filtering is applied by the caller: customers are
/// pinned to their own `customer_id`, designers to their `designer_id`, admins see everything.
#[derive(Debug, Clone, Default)]
pub struct OrderQueryFilter {
    pub customer_id: Option<i64>,
    pub designer_id: Option<i64>,
    pub status: Option<OrderStatus>,
    pub pagination: Pagination,
}

impl OrderQueryFilter {
    pub fn with_customer_id(mut self, id: i64) -> Self {
        self.customer_id = Some(id);
        self
    }

    pub fn with_designer_id(mut self, id: i64) -> Self {
        self.designer_id = Some(id);
        self
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResult {
    pub orders: Vec<Order>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}

/// Filter for return request listings. Same role-pinning convention as [`OrderQueryFilter`].
#[derive(Debug, Clone, Default)]
pub struct ReturnQueryFilter {
    pub customer_id: Option<i64>,
    pub designer_id: Option<i64>,
    pub status: Option<ReturnStatus>,
    pub pagination: Pagination,
}

impl ReturnQueryFilter {
    pub fn with_customer_id(mut self, id: i64) -> Self {
        self.customer_id = Some(id);
        self
    }

    pub fn with_designer_id(mut self, id: i64) -> Self {
        self.designer_id = Some(id);
        self
    }

    pub fn with_status(mut self, status: ReturnStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// The outcome of handling a gateway capture event. `applied` is false when the capture had
/// already been processed and this call was an idempotent no-op.
#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    pub order: Order,
    pub applied: bool,
}

/// What the customer needs to complete payment on the gateway's hosted page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInitResult {
    pub payment_id: i64,
    pub reference: String,
    pub authorization_url: String,
    pub access_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentVerifyResult {
    pub reference: String,
    pub gateway_status: String,
    pub amount: Money,
    pub paid_at: Option<DateTime<Utc>>,
    pub order_status: OrderStatus,
}

/// A designer's net position, derived entirely from the ledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EarningsSummary {
    pub released: Money,
    pub commission_deducted: Money,
    pub return_fees_deducted: Money,
    pub net_earnings: Money,
    /// Funds currently held in escrow on this designer's open orders.
    pub pending_escrow: Money,
}

#[cfg(test)]
mod test {
    use super::Pagination;

    #[test]
    fn pagination_normalises_its_inputs() {
        let p = Pagination::default();
        assert_eq!(p.page(), 1);
        assert_eq!(p.limit(), 20);
        assert_eq!(p.offset(), 0);

        let p = Pagination { page: Some(0), limit: Some(500) };
        assert_eq!(p.page(), 1);
        assert_eq!(p.limit(), 100);
        assert_eq!(p.offset(), 0);

        let p = Pagination { page: Some(3), limit: Some(25) };
        assert_eq!(p.offset(), 50);
    }

    #[test]
    fn pagination_offset_does_not_overflow() {
        let p = Pagination { page: Some(u32::MAX), limit: Some(100) };
        assert_eq!(p.offset(), u32::MAX);
    }
}
