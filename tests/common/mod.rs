#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use storefront_api::{
    auth::AuthUser,
    config::AppConfig,
    db,
    entities::{customer, product},
    errors::ServiceError,
    events::{self, EventSender},
    gateway::{ChargeRequest, GatewayCharge, PaymentGateway},
    handlers::AppServices,
    services::carts::AddToCartInput,
    AppState,
};
use tokio::sync::mpsc;
use uuid::Uuid;

pub const JWT_SECRET: &str = "test_secret_key_for_testing_purposes_only";

/// Gateway double that records every charge attempt and can be told to
/// decline the next one.
#[derive(Default)]
pub struct RecordingGateway {
    charges: Mutex<Vec<ChargeRequest>>,
    fail_with: Mutex<Option<String>>,
}

impl RecordingGateway {
    pub fn decline_next(&self, reason: &str) {
        *self.fail_with.lock().unwrap() = Some(reason.to_string());
    }

    pub fn charge_count(&self) -> usize {
        self.charges.lock().unwrap().len()
    }

    pub fn last_charge(&self) -> Option<ChargeRequest> {
        self.charges.lock().unwrap().last().cloned()
    }
}

#[async_trait::async_trait]
impl PaymentGateway for RecordingGateway {
    async fn charge(&self, request: ChargeRequest) -> Result<GatewayCharge, ServiceError> {
        let amount_minor = request.amount_minor;
        self.charges.lock().unwrap().push(request);

        if let Some(reason) = self.fail_with.lock().unwrap().take() {
            return Err(ServiceError::GatewayError(reason));
        }

        Ok(GatewayCharge {
            reference: format!("ch_test_{}", amount_minor),
            amount_minor,
        })
    }
}

/// Helper harness for spinning up application state backed by an in-memory
/// SQLite database and a recording payment gateway.
pub struct TestApp {
    pub state: AppState,
    pub gateway: Arc<RecordingGateway>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let cfg = AppConfig::new("sqlite::memory:", JWT_SECRET, "127.0.0.1", 18_080, "test");

        // An in-memory sqlite database exists per connection, so the pool
        // must stay at exactly one connection.
        let db_cfg = db::DbConfig {
            url: cfg.database_url.clone(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        };
        let db = db::establish_connection_with_config(&db_cfg)
            .await
            .expect("Failed to connect to test database");
        db::create_schema(&db)
            .await
            .expect("Failed to create test schema");
        let db = Arc::new(db);

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let gateway = Arc::new(RecordingGateway::default());
        let services = AppServices::new(
            db.clone(),
            Arc::new(event_sender.clone()),
            gateway.clone(),
            &cfg,
        );

        let state = AppState {
            db,
            config: cfg,
            event_sender,
            services,
        };

        Self {
            state,
            gateway,
            _event_task: event_task,
        }
    }

    /// Inserts a customer row and returns the matching acting identity.
    pub async fn seed_customer(&self, name: &str, is_admin: bool) -> AuthUser {
        let id = Uuid::new_v4();
        let email = format!("{}-{}@example.com", name.to_lowercase(), id.simple());

        customer::ActiveModel {
            id: Set(id),
            email: Set(email.clone()),
            name: Set(name.to_string()),
            is_admin: Set(is_admin),
            street: Set(Some("1 Main St".to_string())),
            city: Set(Some("Springfield".to_string())),
            postal_code: Set(Some("12345".to_string())),
            country: Set(Some("US".to_string())),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("Failed to insert test customer");

        AuthUser {
            id,
            name: Some(name.to_string()),
            email: Some(email),
            is_admin,
        }
    }

    /// Inserts a catalog product and returns its id.
    pub async fn seed_product(&self, name: &str, price: Decimal) -> Uuid {
        let id = Uuid::new_v4();

        product::ActiveModel {
            id: Set(id),
            name: Set(name.to_string()),
            price: Set(price),
            description: Set(format!("{} description", name)),
            image: Set(None),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("Failed to insert test product");

        id
    }

    /// Puts `quantity` of a product into the customer's cart.
    pub async fn add_to_cart(&self, customer: &AuthUser, product_id: Uuid, quantity: i32) {
        self.state
            .services
            .carts
            .add_item(
                customer.id,
                AddToCartInput {
                    product_id,
                    quantity,
                },
            )
            .await
            .expect("Failed to add item to cart");
    }
}
