//! The order lifecycle as an explicit finite-state machine.
//!
//! Every status change on the platform goes through [`next_status`]: there is no other way to move
//! an order, so the set of reachable transitions is exactly the set of edges encoded here. The
//! table is pure and synchronous; the storage layer re-asserts the `from` state inside its
//! transaction so that two racing callers cannot both take the same edge.
//!
//! | From             | Event                | To              | Actor            |
//! |------------------|----------------------|-----------------|------------------|
//! | PendingPayment   | PaymentCaptured      | Paid            | System           |
//! | Paid             | Accept               | Accepted        | Designer (owner) |
//! | Paid             | Reject               | Rejected        | Designer (owner) |
//! | PendingPayment/Paid | Cancel            | Cancelled       | Customer (owner) |
//! | Accepted         | StartWork            | InProgress      | Designer (owner) |
//! | InProgress       | MarkReady            | ReadyForPickup  | Designer (owner) |
//! | ReadyForPickup   | MarkPickedUp         | PickedUp        | Admin/System     |
//! | PickedUp         | MarkInTransit        | InTransit       | Admin/System     |
//! | InTransit        | MarkDelivered        | Delivered       | Admin/System     |
//! | Delivered        | Confirm              | Confirmed       | Customer (owner) |
//! | Delivered        | AutoConfirm          | AutoConfirmed   | System           |
//! | Delivered        | RequestReturn        | ReturnRequested | Customer (owner) |
//! | ReturnRequested  | RejectReturn         | Delivered       | Admin            |
//! | ReturnRequested  | DispatchReturnPickup | ReturnPickup    | Admin            |
//! | ReturnPickup     | CompleteReturn       | Returned        | Admin            |
use std::fmt::Display;

use crate::db_types::{Actor, Order, OrderStatus, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderEvent {
    PaymentCaptured,
    Accept,
    Reject,
    Cancel,
    StartWork,
    MarkReady,
    MarkPickedUp,
    MarkInTransit,
    MarkDelivered,
    Confirm,
    AutoConfirm,
    RequestReturn,
    RejectReturn,
    DispatchReturnPickup,
    CompleteReturn,
}

impl Display for OrderEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderEvent::PaymentCaptured => "payment captured",
            OrderEvent::Accept => "accept",
            OrderEvent::Reject => "reject",
            OrderEvent::Cancel => "cancel",
            OrderEvent::StartWork => "start work",
            OrderEvent::MarkReady => "mark ready",
            OrderEvent::MarkPickedUp => "mark picked up",
            OrderEvent::MarkInTransit => "mark in transit",
            OrderEvent::MarkDelivered => "mark delivered",
            OrderEvent::Confirm => "confirm",
            OrderEvent::AutoConfirm => "auto-confirm",
            OrderEvent::RequestReturn => "request return",
            OrderEvent::RejectReturn => "reject return",
            OrderEvent::DispatchReturnPickup => "dispatch return pickup",
            OrderEvent::CompleteReturn => "complete return",
        };
        write!(f, "{s}")
    }
}

/// Who may fire a given event. Ownership refers to the order being acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleRequirement {
    CustomerOwner,
    DesignerOwner,
    AdminOrSystem,
    Admin,
    System,
}

/// The transition table. Returns the target status for a valid `(from, event)` edge and `None`
/// for everything else. `None` always surfaces as a `PreconditionFailed` error to the caller.
pub fn next_status(from: OrderStatus, event: OrderEvent) -> Option<OrderStatus> {
    use OrderEvent::*;
    use OrderStatus::*;
    match (from, event) {
        (PendingPayment, PaymentCaptured) => Some(Paid),
        (Paid, Accept) => Some(Accepted),
        (Paid, Reject) => Some(Rejected),
        (PendingPayment | Paid, Cancel) => Some(Cancelled),
        (Accepted, StartWork) => Some(InProgress),
        (InProgress, MarkReady) => Some(ReadyForPickup),
        (ReadyForPickup, MarkPickedUp) => Some(PickedUp),
        (PickedUp, MarkInTransit) => Some(InTransit),
        (InTransit, MarkDelivered) => Some(Delivered),
        (Delivered, Confirm) => Some(Confirmed),
        (Delivered, AutoConfirm) => Some(AutoConfirmed),
        (Delivered, RequestReturn) => Some(ReturnRequested),
        (ReturnRequested, RejectReturn) => Some(Delivered),
        (ReturnRequested, DispatchReturnPickup) => Some(ReturnPickup),
        (ReturnPickup, CompleteReturn) => Some(Returned),
        (_, _) => None,
    }
}

pub fn required_role(event: OrderEvent) -> RoleRequirement {
    use OrderEvent::*;
    match event {
        PaymentCaptured | AutoConfirm => RoleRequirement::System,
        Accept | Reject | StartWork | MarkReady => RoleRequirement::DesignerOwner,
        Cancel | Confirm | RequestReturn => RoleRequirement::CustomerOwner,
        MarkPickedUp | MarkInTransit | MarkDelivered => RoleRequirement::AdminOrSystem,
        RejectReturn | DispatchReturnPickup | CompleteReturn => RoleRequirement::Admin,
    }
}

/// Checks the actor rule for an event against a concrete order.
pub fn actor_may_fire(event: OrderEvent, actor: &Actor, order: &Order) -> bool {
    match required_role(event) {
        RoleRequirement::CustomerOwner => order.is_owned_by_customer(actor),
        RoleRequirement::DesignerOwner => order.is_owned_by_designer(actor),
        RoleRequirement::AdminOrSystem => matches!(actor.role, Role::Admin | Role::System),
        RoleRequirement::Admin => actor.role == Role::Admin,
        RoleRequirement::System => actor.role == Role::System,
    }
}

/// The default history note recorded when the caller does not supply one.
pub fn default_note(event: OrderEvent) -> &'static str {
    use OrderEvent::*;
    match event {
        PaymentCaptured => "Payment successful",
        Accept => "Designer accepted the order",
        Reject => "Designer rejected the order",
        Cancel => "Customer cancelled the order",
        StartWork => "Work started on the garment",
        MarkReady => "Garment ready for courier pickup",
        MarkPickedUp => "Courier picked up from designer",
        MarkInTransit => "Order in transit to customer",
        MarkDelivered => "Order delivered to customer",
        Confirm => "Customer confirmed satisfaction",
        AutoConfirm => "Order auto-confirmed after confirmation window lapsed",
        RequestReturn => "Return requested",
        RejectReturn => "Return rejected",
        DispatchReturnPickup => "Courier dispatched for return pickup",
        CompleteReturn => "Return completed, refund processed",
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db_types::{Actor, OrderStatus, Role};

    const ALL_STATUSES: [OrderStatus; 15] = [
        OrderStatus::PendingPayment,
        OrderStatus::Paid,
        OrderStatus::Accepted,
        OrderStatus::Rejected,
        OrderStatus::InProgress,
        OrderStatus::ReadyForPickup,
        OrderStatus::PickedUp,
        OrderStatus::InTransit,
        OrderStatus::Delivered,
        OrderStatus::Confirmed,
        OrderStatus::AutoConfirmed,
        OrderStatus::ReturnRequested,
        OrderStatus::ReturnPickup,
        OrderStatus::Returned,
        OrderStatus::Cancelled,
    ];

    const ALL_EVENTS: [OrderEvent; 15] = [
        OrderEvent::PaymentCaptured,
        OrderEvent::Accept,
        OrderEvent::Reject,
        OrderEvent::Cancel,
        OrderEvent::StartWork,
        OrderEvent::MarkReady,
        OrderEvent::MarkPickedUp,
        OrderEvent::MarkInTransit,
        OrderEvent::MarkDelivered,
        OrderEvent::Confirm,
        OrderEvent::AutoConfirm,
        OrderEvent::RequestReturn,
        OrderEvent::RejectReturn,
        OrderEvent::DispatchReturnPickup,
        OrderEvent::CompleteReturn,
    ];

    #[test]
    fn table_edges() {
        use OrderEvent::*;
        use OrderStatus::*;
        let edges = [
            (PendingPayment, PaymentCaptured, Paid),
            (Paid, Accept, Accepted),
            (Paid, Reject, Rejected),
            (PendingPayment, Cancel, Cancelled),
            (Paid, Cancel, Cancelled),
            (Accepted, StartWork, InProgress),
            (InProgress, MarkReady, ReadyForPickup),
            (ReadyForPickup, MarkPickedUp, PickedUp),
            (PickedUp, MarkInTransit, InTransit),
            (InTransit, MarkDelivered, Delivered),
            (Delivered, Confirm, Confirmed),
            (Delivered, AutoConfirm, AutoConfirmed),
            (Delivered, RequestReturn, ReturnRequested),
            (ReturnRequested, RejectReturn, Delivered),
            (ReturnRequested, DispatchReturnPickup, ReturnPickup),
            (ReturnPickup, CompleteReturn, Returned),
        ];
        for (from, event, to) in edges {
            assert_eq!(next_status(from, event), Some(to), "{from} --{event}--> should be {to}");
        }
        // Everything not in the table is rejected
        let in_table = |from: OrderStatus, event: OrderEvent| edges.iter().any(|(f, e, _)| *f == from && *e == event);
        for from in ALL_STATUSES {
            for event in ALL_EVENTS {
                if !in_table(from, event) {
                    assert_eq!(next_status(from, event), None, "{from} --{event}--> should be rejected");
                }
            }
        }
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for from in ALL_STATUSES.into_iter().filter(OrderStatus::is_terminal) {
            for event in ALL_EVENTS {
                assert_eq!(next_status(from, event), None, "terminal {from} must reject {event}");
            }
        }
    }

    #[test]
    fn actor_rules() {
        let mut order = crate::test_utils::fixtures::bare_order();
        order.customer_id = 10;
        order.designer_id = 20;

        let customer = Actor::new(10, Role::Customer);
        let other_customer = Actor::new(11, Role::Customer);
        let designer = Actor::new(20, Role::Designer);
        let other_designer = Actor::new(21, Role::Designer);
        let admin = Actor::new(1, Role::Admin);
        let system = Actor::system();

        assert!(actor_may_fire(OrderEvent::Confirm, &customer, &order));
        assert!(!actor_may_fire(OrderEvent::Confirm, &other_customer, &order));
        assert!(!actor_may_fire(OrderEvent::Confirm, &admin, &order));

        assert!(actor_may_fire(OrderEvent::Accept, &designer, &order));
        assert!(!actor_may_fire(OrderEvent::Accept, &other_designer, &order));
        assert!(!actor_may_fire(OrderEvent::Accept, &customer, &order));

        assert!(actor_may_fire(OrderEvent::MarkDelivered, &admin, &order));
        assert!(actor_may_fire(OrderEvent::MarkDelivered, &system, &order));
        assert!(!actor_may_fire(OrderEvent::MarkDelivered, &designer, &order));

        assert!(actor_may_fire(OrderEvent::AutoConfirm, &system, &order));
        assert!(!actor_may_fire(OrderEvent::AutoConfirm, &admin, &order));

        assert!(actor_may_fire(OrderEvent::CompleteReturn, &admin, &order));
        assert!(!actor_may_fire(OrderEvent::CompleteReturn, &system, &order));
    }
}
