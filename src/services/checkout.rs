use crate::{
    entities::{
        cart_item, order, order_item, payment, CartItem, Order, OrderStatus, Payment, Product,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    gateway::{self, ChargeRequest, PaymentGateway},
};
use chrono::{SubsecRound, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

/// A cart line priced against the catalog at checkout time. The snapshot is
/// the sole input to the commit unit; the cart is never re-read mid-commit,
/// so a cart mutated by a concurrent request cannot invalidate the total
/// already being charged.
#[derive(Debug, Clone, Serialize)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutInput {
    pub payment_token: String,
    pub note: Option<String>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug)]
pub struct CheckoutOutcome {
    pub order: order::Model,
    pub payment_id: Uuid,
    /// None when the outcome replays an already-committed attempt.
    pub gateway_reference: Option<String>,
}

/// Converts a customer's cart into a payment record, an order, and immutable
/// order-item snapshots, then charges the external gateway.
///
/// The local writes (payment insert, order insert, payment link backfill,
/// order item inserts, cart clearing) commit as one transaction; the gateway
/// charge runs strictly after that commit because it is not transactionally
/// controllable.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    gateway: Arc<dyn PaymentGateway>,
    event_sender: Arc<EventSender>,
    currency: String,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        gateway: Arc<dyn PaymentGateway>,
        event_sender: Arc<EventSender>,
        currency: String,
    ) -> Self {
        Self {
            db,
            gateway,
            event_sender,
            currency,
        }
    }

    #[instrument(skip(self, input), fields(customer_id = %customer_id))]
    pub async fn checkout(
        &self,
        customer_id: Uuid,
        input: CheckoutInput,
    ) -> Result<CheckoutOutcome, ServiceError> {
        let token = input.payment_token.trim().to_string();
        if token.is_empty() {
            return Err(ServiceError::ValidationError(
                "A payment token is required".to_string(),
            ));
        }

        // A retry carrying the same idempotency key returns the order already
        // committed by the first attempt instead of charging again.
        if let Some(key) = input.idempotency_key.as_deref() {
            if let Some(existing) = self.find_committed_attempt(key).await? {
                info!(
                    order_id = %existing.order.id,
                    "Replaying committed checkout for idempotency key"
                );
                return Ok(existing);
            }
        }

        let (lines, total) = self.price_cart(customer_id).await?;
        let amount_minor = gateway::to_minor_units(total)?;

        let txn = self.db.begin().await?;
        let (order, payment_id) = match self
            .commit_unit(&txn, customer_id, &lines, total, &token, &input)
            .await
        {
            Ok(committed) => committed,
            Err(err) => {
                if let Err(rollback_err) = txn.rollback().await {
                    error!(
                        error = %rollback_err,
                        "Rollback after failed checkout commit also failed"
                    );
                }
                return Err(err);
            }
        };
        txn.commit().await.map_err(|e| ServiceError::CommitFailed {
            step: "transaction commit",
            source: e,
        })?;

        info!(order_id = %order.id, %payment_id, %total, "Order committed");
        self.event_sender
            .send_or_log(Event::OrderCreated(order.id))
            .await;

        match self
            .gateway
            .charge(ChargeRequest {
                amount_minor,
                currency: self.currency.clone(),
                token,
                description: format!("Order {}", order.id),
            })
            .await
        {
            Ok(charge) => {
                self.event_sender
                    .send_or_log(Event::PaymentCaptured {
                        payment_id,
                        order_id: order.id,
                    })
                    .await;
                Ok(CheckoutOutcome {
                    order,
                    payment_id,
                    gateway_reference: Some(charge.reference),
                })
            }
            Err(err) => {
                // The local rows are already durable. Cancel the order so no
                // uncharged order stays SUCCESS; the payment row remains for
                // reconciliation.
                error!(
                    order_id = %order.id,
                    %payment_id,
                    error = %err,
                    "Gateway charge failed after local commit; cancelling order"
                );
                if let Err(cancel_err) = self.cancel_after_charge_failure(&order, &err).await {
                    error!(
                        order_id = %order.id,
                        error = %cancel_err,
                        "Failed to cancel order after charge failure; manual reconciliation required"
                    );
                }
                self.event_sender
                    .send_or_log(Event::PaymentFailed {
                        payment_id,
                        order_id: order.id,
                        reason: err.to_string(),
                    })
                    .await;
                self.event_sender
                    .send_or_log(Event::OrderCancelled(order.id))
                    .await;
                Err(err)
            }
        }
    }

    /// Reads the cart joined with current catalog prices and computes the
    /// total. Rejects an empty cart before any write happens.
    async fn price_cart(
        &self,
        customer_id: Uuid,
    ) -> Result<(Vec<PricedLine>, Decimal), ServiceError> {
        let rows = CartItem::find()
            .filter(cart_item::Column::CustomerId.eq(customer_id))
            .find_also_related(Product)
            .order_by_asc(cart_item::Column::CreatedAt)
            .order_by_asc(cart_item::Column::ProductId)
            .all(&*self.db)
            .await?;

        if rows.is_empty() {
            return Err(ServiceError::EmptyCart);
        }

        let mut lines = Vec::with_capacity(rows.len());
        let mut total = Decimal::ZERO;
        for (item, product) in rows {
            let product = product.ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Product {} is no longer in the catalog",
                    item.product_id
                ))
            })?;
            total += product.price * Decimal::from(item.quantity);
            lines.push(PricedLine {
                product_id: item.product_id,
                name: product.name,
                unit_price: product.price,
                quantity: item.quantity,
            });
        }

        Ok((lines, total))
    }

    /// Executes the writes that must succeed or fail together. Every step
    /// maps its failure to `CommitFailed` with the step name so the caller
    /// can tell which write aborted the unit.
    async fn commit_unit(
        &self,
        txn: &DatabaseTransaction,
        customer_id: Uuid,
        lines: &[PricedLine],
        total: Decimal,
        token: &str,
        input: &CheckoutInput,
    ) -> Result<(order::Model, Uuid), ServiceError> {
        let now = Utc::now();

        // Payment first: the charge description references ids that must
        // exist, and the two-phase link (insert payment, insert order, then
        // backfill payment.order_id) avoids a forward reference to an order
        // row that is not committed yet.
        let payment = payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(None),
            amount: Set(total),
            gateway_token: Set(token.to_string()),
            payment_date: Set(now),
            idempotency_key: Set(input.idempotency_key.clone()),
        }
        .insert(txn)
        .await
        .map_err(|e| ServiceError::CommitFailed {
            step: "payment insert",
            source: e,
        })?;

        // Second precision keeps the stored date stable across formatters.
        let order = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            total: Set(total),
            order_date: Set(now.trunc_subsecs(0)),
            status: Set(OrderStatus::Success),
            note: Set(input.note.clone()),
            payment_id: Set(payment.id),
            customer_id: Set(customer_id),
        }
        .insert(txn)
        .await
        .map_err(|e| ServiceError::CommitFailed {
            step: "order insert",
            source: e,
        })?;

        let payment_id = payment.id;
        let mut link: payment::ActiveModel = payment.into();
        link.order_id = Set(Some(order.id));
        link.update(txn)
            .await
            .map_err(|e| ServiceError::CommitFailed {
                step: "payment link backfill",
                source: e,
            })?;

        for line in lines {
            order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id),
                name: Set(line.name.clone()),
                price: Set(line.unit_price),
                quantity: Set(line.quantity),
                created_at: Set(now),
            }
            .insert(txn)
            .await
            .map_err(|e| ServiceError::CommitFailed {
                step: "order item insert",
                source: e,
            })?;
        }

        // Last step of the unit: the cart is the pricing input and must not
        // be destroyed before the order is durable.
        CartItem::delete_many()
            .filter(cart_item::Column::CustomerId.eq(customer_id))
            .exec(txn)
            .await
            .map_err(|e| ServiceError::CommitFailed {
                step: "cart clearing",
                source: e,
            })?;

        Ok((order, payment_id))
    }

    async fn find_committed_attempt(
        &self,
        key: &str,
    ) -> Result<Option<CheckoutOutcome>, ServiceError> {
        let payment = match Payment::find()
            .filter(payment::Column::IdempotencyKey.eq(key))
            .one(&*self.db)
            .await?
        {
            Some(payment) => payment,
            None => return Ok(None),
        };

        let order_id = match payment.order_id {
            Some(order_id) => order_id,
            None => return Ok(None),
        };

        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "Payment {} references missing order {}",
                    payment.id, order_id
                ))
            })?;

        Ok(Some(CheckoutOutcome {
            order,
            payment_id: payment.id,
            gateway_reference: None,
        }))
    }

    async fn cancel_after_charge_failure(
        &self,
        order: &order::Model,
        cause: &ServiceError,
    ) -> Result<(), ServiceError> {
        let mut active: order::ActiveModel = order.clone().into();
        active.status = Set(OrderStatus::Cancelled);
        active.note = Set(Some(format!("Payment charge failed: {}", cause)));
        active.update(&*self.db).await?;
        Ok(())
    }
}
