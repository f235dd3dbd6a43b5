use crate::{
    entities::{product, Product, ProductModel},
    errors::ServiceError,
};
use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait, QueryOrder};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct ProductListResponse {
    pub products: Vec<ProductModel>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Read-only catalog lookup. Product maintenance lives in the catalog
/// service; checkout and cart only ever read name and price from here.
#[derive(Clone)]
pub struct ProductCatalogService {
    db: Arc<DatabaseConnection>,
}

impl ProductCatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn get_product(&self, product_id: Uuid) -> Result<ProductModel, ServiceError> {
        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }

    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<ProductListResponse, ServiceError> {
        let paginator = Product::find()
            .order_by_asc(product::Column::Name)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let products = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok(ProductListResponse {
            products,
            total,
            page,
            per_page,
        })
    }
}
