use crate::{
    entities::{cart_item, CartItem, Product},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Cart line joined with the current catalog price.
#[derive(Debug, Clone, Serialize)]
pub struct CartLineView {
    pub product_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// A customer's cart with its running total.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub total: Decimal,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddToCartInput {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

/// Cart store for per-customer cart lines. All mutations are keyed by
/// (customer_id, product_id) and run inside a transaction so concurrent
/// quantity updates cannot lose increments.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Returns the customer's cart lines priced against the current catalog.
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn get_cart(&self, customer_id: Uuid) -> Result<CartView, ServiceError> {
        let rows = CartItem::find()
            .filter(cart_item::Column::CustomerId.eq(customer_id))
            .find_also_related(Product)
            .order_by_asc(cart_item::Column::CreatedAt)
            .order_by_asc(cart_item::Column::ProductId)
            .all(&*self.db)
            .await?;

        let mut lines = Vec::with_capacity(rows.len());
        let mut total = Decimal::ZERO;
        for (item, product) in rows {
            let product = product.ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Product {} is no longer in the catalog",
                    item.product_id
                ))
            })?;
            let line_total = product.price * Decimal::from(item.quantity);
            total += line_total;
            lines.push(CartLineView {
                product_id: item.product_id,
                name: product.name,
                price: product.price,
                quantity: item.quantity,
                line_total,
            });
        }

        Ok(CartView { lines, total })
    }

    /// Adds an item to the cart, incrementing the quantity if the product is
    /// already present.
    #[instrument(skip(self, input), fields(customer_id = %customer_id, product_id = %input.product_id))]
    pub async fn add_item(
        &self,
        customer_id: Uuid,
        input: AddToCartInput,
    ) -> Result<CartView, ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let txn = self.db.begin().await?;

        let product = Product::find_by_id(input.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", input.product_id))
            })?;

        match CartItem::find_by_id((customer_id, input.product_id))
            .one(&txn)
            .await?
        {
            Some(line) => {
                let quantity = line.quantity + input.quantity;
                let mut line: cart_item::ActiveModel = line.into();
                line.quantity = Set(quantity);
                line.updated_at = Set(Utc::now());
                line.update(&txn).await?;
            }
            None => {
                cart_item::ActiveModel {
                    customer_id: Set(customer_id),
                    product_id: Set(input.product_id),
                    quantity: Set(input.quantity),
                    created_at: Set(Utc::now()),
                    updated_at: Set(Utc::now()),
                }
                .insert(&txn)
                .await?;
            }
        }

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                customer_id,
                product_id: product.id,
            })
            .await;

        info!("Added {} x{} to cart", product.name, input.quantity);
        self.get_cart(customer_id).await
    }

    /// Removes one unit of a product from the cart; the line is deleted when
    /// its quantity reaches zero. Removing an absent line is a no-op.
    #[instrument(skip(self), fields(customer_id = %customer_id, product_id = %product_id))]
    pub async fn remove_item(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
    ) -> Result<CartView, ServiceError> {
        let txn = self.db.begin().await?;

        Product::find_by_id(product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        match CartItem::find_by_id((customer_id, product_id)).one(&txn).await? {
            None => {}
            Some(line) if line.quantity > 1 => {
                let quantity = line.quantity - 1;
                let mut line: cart_item::ActiveModel = line.into();
                line.quantity = Set(quantity);
                line.updated_at = Set(Utc::now());
                line.update(&txn).await?;
            }
            Some(_) => {
                CartItem::delete_by_id((customer_id, product_id))
                    .exec(&txn)
                    .await?;
            }
        }

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved {
                customer_id,
                product_id,
            })
            .await;

        self.get_cart(customer_id).await
    }
}
