use crate::handlers::common::{success_response, PaginationParams};
use crate::{errors::ServiceError, AppState};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use uuid::Uuid;

/// Read-only catalog endpoints. Product maintenance belongs to the catalog
/// service and is not exposed here.
pub fn products_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/:id", get(get_product))
}

async fn list_products(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let products = state
        .services
        .catalog
        .list_products(pagination.page, pagination.per_page)
        .await?;

    Ok(success_response(products))
}

async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.services.catalog.get_product(id).await?;
    Ok(success_response(product))
}
