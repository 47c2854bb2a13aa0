//! Integration tests for marking orders paid from gateway callbacks. The
//! gateway is configured but never reached: signature verification is local.

mod common;

use common::TestApp;
use hmac::{Hmac, Mac};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use sha2::Sha256;
use storefront_api::entities::order::OrderStatus;
use storefront_api::entities::{order, Order};
use storefront_api::errors::ServiceError;
use storefront_api::services::orders::{AddressInput, CreateOrderInput, VerifyPaymentInput};
use storefront_api::services::pricing::QuoteItem;

const SECRET: &str = "verification_test_secret";
const GATEWAY_ORDER_ID: &str = "order_remote_42";

fn sign(order_id: &str, payment_id: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
    mac.update(format!("{}|{}", order_id, payment_id).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn verify_input(payment_id: &str, signature: String) -> VerifyPaymentInput {
    VerifyPaymentInput {
        razorpay_order_id: GATEWAY_ORDER_ID.into(),
        razorpay_payment_id: payment_id.into(),
        razorpay_signature: signature,
    }
}

/// Creates a pending order and stamps gateway fields onto it as if the
/// payment intent had been opened remotely.
async fn seed_payable_order(app: &TestApp, user_id: uuid::Uuid) -> order::Model {
    let product = app.seed_product(dec!(100), 5).await;
    let created = app
        .orders
        .create_order(
            user_id,
            CreateOrderInput {
                items: vec![QuoteItem {
                    product_id: product.id,
                    quantity: 1,
                    selected_size: None,
                    selected_color: None,
                }],
                shipping_address: AddressInput {
                    address: "12 MG Road".into(),
                    city: "Pune".into(),
                    postal_code: "411001".into(),
                    country: None,
                },
                payment_method: "cod".into(),
            },
        )
        .await
        .expect("order created");

    let mut active: order::ActiveModel = created.order.into();
    active.payment_method = Set("razorpay".into());
    active.gateway_order_id = Set(Some(GATEWAY_ORDER_ID.into()));
    active.update(&*app.db).await.expect("order stamped payable")
}

#[tokio::test]
#[ignore = "requires SQLite integration environment"]
async fn valid_signature_marks_order_paid_and_processing() {
    let app = TestApp::new().await;
    let user = app.seed_user(false).await;
    let order = seed_payable_order(&app, user.id).await;
    let orders = app.orders_with_gateway(SECRET);

    let updated = orders
        .verify_payment(
            order.id,
            user.id,
            verify_input("pay_123", sign(GATEWAY_ORDER_ID, "pay_123")),
        )
        .await
        .expect("payment verified");

    assert!(updated.is_paid);
    assert!(updated.paid_at.is_some());
    assert_eq!(updated.status, OrderStatus::Processing);
    assert_eq!(updated.gateway_payment_id.as_deref(), Some("pay_123"));
}

#[tokio::test]
#[ignore = "requires SQLite integration environment"]
async fn bad_signature_rejects_with_no_state_change() {
    let app = TestApp::new().await;
    let user = app.seed_user(false).await;
    let order = seed_payable_order(&app, user.id).await;
    let orders = app.orders_with_gateway(SECRET);

    let mut signature = sign(GATEWAY_ORDER_ID, "pay_123");
    signature.replace_range(0..1, if signature.starts_with('0') { "1" } else { "0" });

    let err = orders
        .verify_payment(order.id, user.id, verify_input("pay_123", signature))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::PaymentFailed(_)));

    let reloaded = Order::find_by_id(order.id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert!(!reloaded.is_paid);
    assert_eq!(reloaded.status, OrderStatus::Pending);
    assert!(reloaded.gateway_payment_id.is_none());
}

#[tokio::test]
#[ignore = "requires SQLite integration environment"]
async fn foreign_order_verification_is_forbidden() {
    let app = TestApp::new().await;
    let owner = app.seed_user(false).await;
    let stranger = app.seed_user(false).await;
    let order = seed_payable_order(&app, owner.id).await;
    let orders = app.orders_with_gateway(SECRET);

    let err = orders
        .verify_payment(
            order.id,
            stranger.id,
            verify_input("pay_123", sign(GATEWAY_ORDER_ID, "pay_123")),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
}

#[tokio::test]
#[ignore = "requires SQLite integration environment"]
async fn already_paid_order_cannot_be_verified_twice() {
    let app = TestApp::new().await;
    let user = app.seed_user(false).await;
    let order = seed_payable_order(&app, user.id).await;
    let orders = app.orders_with_gateway(SECRET);

    orders
        .verify_payment(
            order.id,
            user.id,
            verify_input("pay_123", sign(GATEWAY_ORDER_ID, "pay_123")),
        )
        .await
        .unwrap();

    let err = orders
        .verify_payment(
            order.id,
            user.id,
            verify_input("pay_456", sign(GATEWAY_ORDER_ID, "pay_456")),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidOperation(_)));
}

#[tokio::test]
#[ignore = "requires SQLite integration environment"]
async fn mismatched_gateway_order_id_is_rejected() {
    let app = TestApp::new().await;
    let user = app.seed_user(false).await;
    let order = seed_payable_order(&app, user.id).await;
    let orders = app.orders_with_gateway(SECRET);

    let err = orders
        .verify_payment(
            order.id,
            user.id,
            VerifyPaymentInput {
                razorpay_order_id: "order_someone_elses".into(),
                razorpay_payment_id: "pay_123".into(),
                razorpay_signature: sign("order_someone_elses", "pay_123"),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));
}
