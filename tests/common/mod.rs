//! Shared fixture for database-backed integration tests.
//!
//! Builds an in-memory SQLite schema mirroring the entity definitions and
//! wires the full service stack against it.

#![allow(dead_code)]

use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};
use std::sync::Arc;
use storefront_api::config::PricingConfig;
use storefront_api::entities::product::{AttributeMap, StringList};
use storefront_api::entities::{product, user};
use storefront_api::events::EventSender;
use storefront_api::services::{
    CartService, InventoryService, OrderService, OrderStatusService, PricingService,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set};
use tokio::sync::mpsc;
use uuid::Uuid;

const SCHEMA: &[&str] = &[
    "CREATE TABLE users (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        is_admin INTEGER NOT NULL,
        shipping_address TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE products (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        brand TEXT NOT NULL,
        category TEXT NOT NULL,
        description TEXT NOT NULL,
        image TEXT NOT NULL,
        images TEXT NOT NULL,
        price NUMERIC NOT NULL,
        count_in_stock INTEGER NOT NULL,
        tags TEXT NOT NULL,
        sizes TEXT NOT NULL,
        colors TEXT NOT NULL,
        attributes TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE carts (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL UNIQUE,
        total_price NUMERIC NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE cart_items (
        id TEXT PRIMARY KEY,
        cart_id TEXT NOT NULL,
        product_id TEXT NOT NULL,
        quantity INTEGER NOT NULL,
        unit_price NUMERIC NOT NULL,
        selected_size TEXT,
        selected_color TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE orders (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        status TEXT NOT NULL,
        payment_method TEXT NOT NULL,
        shipping_address TEXT NOT NULL,
        items_price NUMERIC NOT NULL,
        tax_price NUMERIC NOT NULL,
        shipping_price NUMERIC NOT NULL,
        total_price NUMERIC NOT NULL,
        is_paid INTEGER NOT NULL,
        paid_at TEXT,
        gateway_order_id TEXT,
        gateway_payment_id TEXT,
        gateway_signature TEXT,
        is_delivered INTEGER NOT NULL,
        delivered_at TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT
    )",
    "CREATE TABLE order_items (
        id TEXT PRIMARY KEY,
        order_id TEXT NOT NULL,
        product_id TEXT NOT NULL,
        name TEXT NOT NULL,
        image TEXT NOT NULL,
        quantity INTEGER NOT NULL,
        unit_price NUMERIC NOT NULL,
        total_price NUMERIC NOT NULL,
        selected_size TEXT,
        selected_color TEXT,
        created_at TEXT NOT NULL
    )",
];

pub struct TestApp {
    pub db: Arc<DatabaseConnection>,
    pub events: EventSender,
    pub carts: CartService,
    pub orders: OrderService,
    pub order_status: OrderStatusService,
    pub inventory: InventoryService,
}

impl TestApp {
    pub async fn new() -> Self {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("sqlite in-memory connection");

        for ddl in SCHEMA {
            db.execute(Statement::from_string(
                db.get_database_backend(),
                (*ddl).to_owned(),
            ))
            .await
            .expect("schema statement");
        }

        let db = Arc::new(db);
        let (tx, mut rx) = mpsc::channel(64);
        // Drain events so senders never block
        tokio::spawn(async move { while rx.recv().await.is_some() {} });
        let events = EventSender::new(tx);

        let policy = PricingConfig::default();
        let pricing = Arc::new(PricingService::new(db.clone(), policy.clone()));
        let inventory = Arc::new(InventoryService::new(db.clone()));
        let orders = OrderService::new(
            db.clone(),
            events.clone(),
            pricing,
            inventory.clone(),
            None,
            policy,
        );

        Self {
            carts: CartService::new(db.clone(), events.clone()),
            order_status: OrderStatusService::new(db.clone(), events.clone()),
            inventory: (*inventory).clone(),
            orders,
            events,
            db,
        }
    }

    /// Service stack variant with gateway credentials, for payment
    /// verification tests that never hit the network.
    pub fn orders_with_gateway(&self, key_secret: &str) -> OrderService {
        use storefront_api::config::GatewayConfig;
        use storefront_api::services::PaymentGateway;

        let policy = PricingConfig::default();
        let pricing = Arc::new(PricingService::new(self.db.clone(), policy.clone()));
        let inventory = Arc::new(InventoryService::new(self.db.clone()));
        let gateway = PaymentGateway::new(GatewayConfig {
            key_id: "rzp_test_key".into(),
            key_secret: key_secret.into(),
            api_base: "http://127.0.0.1:1".into(),
            currency: "INR".into(),
        })
        .expect("gateway construction");

        OrderService::new(
            self.db.clone(),
            self.events.clone(),
            pricing,
            inventory,
            Some(Arc::new(gateway)),
            policy,
        )
    }

    pub async fn seed_user(&self, is_admin: bool) -> user::Model {
        let user = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set("Test Shopper".into()),
            email: Set(format!("{}@example.com", Uuid::new_v4())),
            password_hash: Set("unused".into()),
            is_admin: Set(is_admin),
            shipping_address: Set(None),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };
        user.insert(&*self.db).await.expect("seed user")
    }

    pub async fn seed_product(&self, price: Decimal, count_in_stock: i32) -> product::Model {
        self.seed_product_with_options(price, count_in_stock, vec![], vec![])
            .await
    }

    pub async fn seed_product_with_options(
        &self,
        price: Decimal,
        count_in_stock: i32,
        sizes: Vec<&str>,
        colors: Vec<&str>,
    ) -> product::Model {
        let product = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set("Seeded Product".into()),
            brand: Set("Acme".into()),
            category: Set("general".into()),
            description: Set("Seeded for integration tests".into()),
            image: Set("/img/seeded.jpg".into()),
            images: Set(StringList::default()),
            price: Set(price),
            count_in_stock: Set(count_in_stock),
            tags: Set(StringList::default()),
            sizes: Set(StringList(sizes.into_iter().map(String::from).collect())),
            colors: Set(StringList(colors.into_iter().map(String::from).collect())),
            attributes: Set(AttributeMap::default()),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };
        product.insert(&*self.db).await.expect("seed product")
    }
}
