pub mod carts;
pub mod common;
pub mod orders;
pub mod products;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{
    config::AppConfig,
    events::EventSender,
    gateway::PaymentGateway,
    services::{
        carts::CartService, catalog::ProductCatalogService, checkout::CheckoutService,
        order_status::OrderStatusService, orders::OrderService,
    },
};

/// Aggregated services used by the HTTP handlers. Constructed once at startup
/// with explicitly injected dependencies; nothing here is ambient.
#[derive(Clone)]
pub struct AppServices {
    pub carts: Arc<CartService>,
    pub catalog: Arc<ProductCatalogService>,
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
    pub order_status: Arc<OrderStatusService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        gateway: Arc<dyn PaymentGateway>,
        config: &AppConfig,
    ) -> Self {
        Self {
            carts: Arc::new(CartService::new(db.clone(), event_sender.clone())),
            catalog: Arc::new(ProductCatalogService::new(db.clone())),
            checkout: Arc::new(CheckoutService::new(
                db.clone(),
                gateway,
                event_sender.clone(),
                config.currency.clone(),
            )),
            orders: Arc::new(OrderService::new(db.clone())),
            order_status: Arc::new(OrderStatusService::new(db, event_sender)),
        }
    }
}
