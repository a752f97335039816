use std::fmt::Display;

use log::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderUpdate,
    PaymentUpdate,
    ReturnUpdate,
}

impl Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NotificationKind::OrderUpdate => "order_update",
            NotificationKind::PaymentUpdate => "payment_update",
            NotificationKind::ReturnUpdate => "return_update",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: i64,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

/// Fire-and-forget notification delivery. Implementations must never block the caller on
/// delivery and must never surface an error: a lost notification is logged, not propagated, so
/// the owning transaction can never fail because of one.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// The default sink: writes the notification to the log and nothing else.
#[derive(Debug, Clone, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, n: Notification) {
        info!("🔔️ [{}] → user #{}: {} — {}", n.kind, n.user_id, n.title, n.body);
    }
}
