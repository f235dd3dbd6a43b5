use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    TransactionTrait,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    entities::{order, Order, OrderStatus},
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Validates if a status transition is allowed. SUCCESS is the initial state
/// set at checkout; CANCELLED is terminal.
pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
    match (from, to) {
        (OrderStatus::Success, OrderStatus::Cancelled) => true,

        // Re-applying the current status is a no-op, not an error
        _ if from == to => true,

        // All other transitions are invalid
        _ => false,
    }
}

#[derive(Clone)]
pub struct OrderStatusService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl OrderStatusService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Cancels an order. Cancelling an order that is already CANCELLED
    /// succeeds without touching the row. Cancellation does not restock,
    /// refund, or touch the payment record.
    #[instrument(skip(self, auth), fields(order_id = %order_id))]
    pub async fn cancel_order(
        &self,
        auth: &AuthUser,
        order_id: Uuid,
    ) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let mut query = Order::find_by_id(order_id);
        if !auth.is_admin {
            query = query.filter(order::Column::CustomerId.eq(auth.id));
        }

        let order = query.one(&txn).await?.ok_or_else(|| {
            warn!("Order not found for cancellation");
            ServiceError::NotFound(format!("Order {} not found", order_id))
        })?;

        if !is_valid_transition(order.status, OrderStatus::Cancelled) {
            return Err(ServiceError::ValidationError(format!(
                "Cannot transition order from {:?} to {:?}",
                order.status,
                OrderStatus::Cancelled
            )));
        }

        if order.status == OrderStatus::Cancelled {
            txn.commit().await?;
            return Ok(order);
        }

        let mut active: order::ActiveModel = order.into();
        active.status = Set(OrderStatus::Cancelled);
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        info!("Order cancelled");
        self.event_sender
            .send_or_log(Event::OrderCancelled(order_id))
            .await;

        Ok(updated)
    }
}
