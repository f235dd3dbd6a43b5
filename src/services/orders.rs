use crate::{
    auth::AuthUser,
    entities::{customer, order, order_item, Order, OrderStatus},
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, JoinType, QueryFilter,
    QueryOrder, QuerySelect, RelationTrait, Select,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// One flattened (order, order_item) join row, with the owning customer's
/// identity columns along for the admin view.
#[derive(Debug, Clone, FromQueryResult)]
pub struct OrderFlatRow {
    pub order_id: Uuid,
    pub total: Decimal,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,
    pub note: Option<String>,
    pub payment_id: Uuid,
    pub customer_id: Uuid,
    pub item_id: Uuid,
    pub item_name: String,
    pub item_price: Decimal,
    pub item_quantity: i32,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub customer_street: Option<String>,
    pub customer_city: Option<String>,
    pub customer_postal_code: Option<String>,
    pub customer_country: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderItemView {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerSummary {
    pub id: Uuid,
    pub email: Option<String>,
    pub name: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

/// Nested order view reconstructed from flattened join rows.
#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    pub id: Uuid,
    pub total: Decimal,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,
    pub note: Option<String>,
    pub payment_id: Uuid,
    pub customer_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<CustomerSummary>,
    pub order_items: Vec<OrderItemView>,
}

/// Folds flattened join rows into nested orders. Orders keep their first-seen
/// position; each order's items keep the incoming row order and are never
/// deduplicated. The id -> accumulator index map keeps this O(n).
pub fn group_rows(rows: Vec<OrderFlatRow>, include_customer: bool) -> Vec<OrderView> {
    let mut index: HashMap<Uuid, usize> = HashMap::new();
    let mut orders: Vec<OrderView> = Vec::new();

    for row in rows {
        let slot = match index.get(&row.order_id) {
            Some(&slot) => slot,
            None => {
                let customer = if include_customer {
                    Some(CustomerSummary {
                        id: row.customer_id,
                        email: row.customer_email.clone(),
                        name: row.customer_name.clone(),
                        street: row.customer_street.clone(),
                        city: row.customer_city.clone(),
                        postal_code: row.customer_postal_code.clone(),
                        country: row.customer_country.clone(),
                    })
                } else {
                    None
                };
                orders.push(OrderView {
                    id: row.order_id,
                    total: row.total,
                    order_date: row.order_date,
                    status: row.status,
                    note: row.note.clone(),
                    payment_id: row.payment_id,
                    customer_id: row.customer_id,
                    customer,
                    order_items: Vec::new(),
                });
                index.insert(row.order_id, orders.len() - 1);
                orders.len() - 1
            }
        };

        orders[slot].order_items.push(OrderItemView {
            id: row.item_id,
            name: row.item_name,
            price: row.item_price,
            quantity: row.item_quantity,
        });
    }

    orders
}

/// Read side for orders. Visibility is enforced by scoping the query to the
/// caller's customer id, never by filtering after the fetch.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Lists orders visible to the caller: all orders with customer identity
    /// for admins, only the caller's own orders otherwise.
    #[instrument(skip(self, auth), fields(customer_id = %auth.id, is_admin = auth.is_admin))]
    pub async fn get_orders(&self, auth: &AuthUser) -> Result<Vec<OrderView>, ServiceError> {
        let mut query = Self::flat_select();
        if !auth.is_admin {
            query = query.filter(order::Column::CustomerId.eq(auth.id));
        }

        let rows = query.into_model::<OrderFlatRow>().all(&*self.db).await?;
        info!(row_count = rows.len(), "Fetched order join rows");

        Ok(group_rows(rows, auth.is_admin))
    }

    /// Fetches a single order with its items. A non-admin asking for another
    /// customer's order gets `NotFound`, indistinguishable from a missing id.
    #[instrument(skip(self, auth), fields(order_id = %order_id))]
    pub async fn get_order(
        &self,
        auth: &AuthUser,
        order_id: Uuid,
    ) -> Result<OrderView, ServiceError> {
        let mut query = Self::flat_select().filter(order::Column::Id.eq(order_id));
        if !auth.is_admin {
            query = query.filter(order::Column::CustomerId.eq(auth.id));
        }

        let rows = query.into_model::<OrderFlatRow>().all(&*self.db).await?;
        if rows.is_empty() {
            return Err(ServiceError::NotFound(format!(
                "Order {} not found",
                order_id
            )));
        }

        let mut orders = group_rows(rows, auth.is_admin);
        Ok(orders.remove(0))
    }

    fn flat_select() -> Select<order::Entity> {
        Order::find()
            .select_only()
            .column_as(order::Column::Id, "order_id")
            .column_as(order::Column::Total, "total")
            .column_as(order::Column::OrderDate, "order_date")
            .column_as(order::Column::Status, "status")
            .column_as(order::Column::Note, "note")
            .column_as(order::Column::PaymentId, "payment_id")
            .column_as(order::Column::CustomerId, "customer_id")
            .column_as(order_item::Column::Id, "item_id")
            .column_as(order_item::Column::Name, "item_name")
            .column_as(order_item::Column::Price, "item_price")
            .column_as(order_item::Column::Quantity, "item_quantity")
            .column_as(customer::Column::Email, "customer_email")
            .column_as(customer::Column::Name, "customer_name")
            .column_as(customer::Column::Street, "customer_street")
            .column_as(customer::Column::City, "customer_city")
            .column_as(customer::Column::PostalCode, "customer_postal_code")
            .column_as(customer::Column::Country, "customer_country")
            .join(JoinType::InnerJoin, order::Relation::OrderItems.def())
            .join(JoinType::LeftJoin, order::Relation::Customer.def())
            .order_by_asc(order::Column::OrderDate)
            .order_by_asc(order::Column::Id)
            .order_by_asc(order_item::Column::CreatedAt)
            .order_by_asc(order_item::Column::Id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn row(order_id: Uuid, item_name: &str) -> OrderFlatRow {
        OrderFlatRow {
            order_id,
            total: dec!(10.00),
            order_date: Utc::now(),
            status: OrderStatus::Success,
            note: None,
            payment_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            item_id: Uuid::new_v4(),
            item_name: item_name.to_string(),
            item_price: dec!(5.00),
            item_quantity: 1,
            customer_email: Some("c@example.com".to_string()),
            customer_name: Some("Customer".to_string()),
            customer_street: None,
            customer_city: None,
            customer_postal_code: None,
            customer_country: None,
        }
    }

    #[test]
    fn grouping_preserves_first_seen_order_and_item_order() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let rows = vec![row(first, "A"), row(first, "B"), row(second, "C")];

        let orders = group_rows(rows, false);

        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].id, first);
        assert_eq!(
            orders[0]
                .order_items
                .iter()
                .map(|i| i.name.as_str())
                .collect::<Vec<_>>(),
            vec!["A", "B"]
        );
        assert_eq!(orders[1].id, second);
        assert_eq!(orders[1].order_items.len(), 1);
        assert_eq!(orders[1].order_items[0].name, "C");
    }

    #[test]
    fn grouping_does_not_deduplicate_equal_items() {
        let order_id = Uuid::new_v4();
        let rows = vec![row(order_id, "A"), row(order_id, "A")];

        let orders = group_rows(rows, false);

        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].order_items.len(), 2);
    }

    #[test]
    fn customer_identity_only_present_for_admin_scope() {
        let rows = vec![row(Uuid::new_v4(), "A")];
        let without = group_rows(rows.clone(), false);
        assert!(without[0].customer.is_none());

        let with = group_rows(rows, true);
        let customer = with[0].customer.as_ref().expect("admin view has customer");
        assert_eq!(customer.email.as_deref(), Some("c@example.com"));
    }
}
