use crate::handlers::common::{created_response, success_response, validate_input};
use crate::{
    auth::AuthUser,
    entities::OrderStatus,
    errors::ServiceError,
    services::{
        checkout::{CheckoutInput, CheckoutOutcome},
        orders::OrderView,
    },
    AppState,
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(checkout).get(list_orders))
        .route("/:id", get(get_order))
        .route("/:id/cancel", post(cancel_order))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutRequest {
    #[validate(length(min = 1, message = "Payment token is required"))]
    pub payment_token: String,
    pub note: Option<String>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order_id: Uuid,
    pub payment_id: Uuid,
    pub total: Decimal,
    pub status: OrderStatus,
    pub order_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_reference: Option<String>,
}

impl From<CheckoutOutcome> for CheckoutResponse {
    fn from(outcome: CheckoutOutcome) -> Self {
        Self {
            order_id: outcome.order.id,
            payment_id: outcome.payment_id,
            total: outcome.order.total,
            status: outcome.order.status,
            order_date: outcome.order.order_date,
            gateway_reference: outcome.gateway_reference,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderListResponse {
    pub orders: Vec<OrderView>,
}

async fn checkout(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let outcome = state
        .services
        .checkout
        .checkout(
            user.id,
            CheckoutInput {
                payment_token: payload.payment_token,
                note: payload.note,
                idempotency_key: payload.idempotency_key,
            },
        )
        .await?;

    Ok(created_response(CheckoutResponse::from(outcome)))
}

async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let orders = state.services.orders.get_orders(&user).await?;
    Ok(success_response(OrderListResponse { orders }))
}

async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.services.orders.get_order(&user, id).await?;
    Ok(success_response(order))
}

async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.services.order_status.cancel_order(&user, id).await?;

    Ok(success_response(serde_json::json!({
        "message": "Order cancelled successfully",
        "order_id": order.id,
        "status": order.status,
    })))
}
