use std::fmt::Display;

use serde::{Deserialize, Serialize};
use stz_order_engine::{
    db_types::{OrderNumber, OrderStatus, ReturnStatus},
    order_objects::{OrderQueryFilter, Pagination, ReturnQueryFilter},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// Optional free-text note accompanying a lifecycle transition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransitionRequest {
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReturnRequest {
    pub reason: String,
}

/// Optional admin notes accompanying a return workflow action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReturnActionRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializePaymentRequest {
    pub order_number: OrderNumber,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingUpdateRequest {
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingResponse {
    pub key: String,
    pub value: String,
}

/// Query parameters for `GET /api/orders`. The customer and designer filters only take effect
/// for admins; other callers are pinned to their own records by the engine.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderSearchQuery {
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub customer_id: Option<i64>,
    #[serde(default)]
    pub designer_id: Option<i64>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl From<OrderSearchQuery> for OrderQueryFilter {
    fn from(q: OrderSearchQuery) -> Self {
        OrderQueryFilter {
            customer_id: q.customer_id,
            designer_id: q.designer_id,
            status: q.status,
            pagination: Pagination { page: q.page, limit: q.limit },
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReturnSearchQuery {
    #[serde(default)]
    pub status: Option<ReturnStatus>,
    #[serde(default)]
    pub customer_id: Option<i64>,
    #[serde(default)]
    pub designer_id: Option<i64>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl From<ReturnSearchQuery> for ReturnQueryFilter {
    fn from(q: ReturnSearchQuery) -> Self {
        ReturnQueryFilter {
            customer_id: q.customer_id,
            designer_id: q.designer_id,
            status: q.status,
            pagination: Pagination { page: q.page, limit: q.limit },
        }
    }
}

/// Admins may pass `user_id` to inspect another wallet. Everyone else gets their own.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WalletQuery {
    #[serde(default)]
    pub user_id: Option<i64>,
}
