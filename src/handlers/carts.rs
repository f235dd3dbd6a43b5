use crate::handlers::common::{success_response, validate_input};
use crate::{auth::AuthUser, errors::ServiceError, services::carts::AddToCartInput, AppState};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

pub fn carts_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart))
        .route("/items", post(add_item))
        .route("/items/:product_id", delete(remove_item))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    #[serde(default = "default_quantity")]
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

async fn get_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state.services.carts.get_cart(user.id).await?;
    Ok(success_response(cart))
}

async fn add_item(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddItemRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let cart = state
        .services
        .carts
        .add_item(
            user.id,
            AddToCartInput {
                product_id: payload.product_id,
                quantity: payload.quantity,
            },
        )
        .await?;

    Ok(success_response(cart))
}

async fn remove_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state.services.carts.remove_item(user.id, product_id).await?;
    Ok(success_response(cart))
}
