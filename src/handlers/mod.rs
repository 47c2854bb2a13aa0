pub mod auth;
pub mod carts;
pub mod orders;
pub mod products;

use crate::{
    auth::{AuthConfig, AuthService},
    config::AppConfig,
    errors::ServiceError,
    events::EventSender,
    services::{
        CartService, InventoryService, OrderService, OrderStatusService, PaymentGateway,
        PricingService, ProductService, UserService,
    },
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Aggregated services used by HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub auth: Arc<AuthService>,
    pub users: Arc<UserService>,
    pub products: Arc<ProductService>,
    pub carts: Arc<CartService>,
    pub orders: Arc<OrderService>,
    pub order_status: Arc<OrderStatusService>,
}

impl AppServices {
    /// Wires every service against the shared pool, event channel and the
    /// configuration loaded at startup.
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        config: &AppConfig,
    ) -> Result<Self, ServiceError> {
        let auth = Arc::new(AuthService::new(AuthConfig::new(
            config.jwt_secret.clone(),
            config.jwt_expiration as u64,
        )));

        let pricing = Arc::new(PricingService::new(db.clone(), config.pricing.clone()));
        let inventory = Arc::new(InventoryService::new(db.clone()));
        let gateway = config
            .gateway
            .clone()
            .map(PaymentGateway::new)
            .transpose()?
            .map(Arc::new);

        let orders = Arc::new(OrderService::new(
            db.clone(),
            event_sender.clone(),
            pricing,
            inventory,
            gateway,
            config.pricing.clone(),
        ));

        Ok(Self {
            users: Arc::new(UserService::new(
                db.clone(),
                auth.clone(),
                event_sender.clone(),
            )),
            products: Arc::new(ProductService::new(db.clone(), event_sender.clone())),
            carts: Arc::new(CartService::new(db.clone(), event_sender.clone())),
            order_status: Arc::new(OrderStatusService::new(db, event_sender)),
            orders,
            auth,
        })
    }
}
