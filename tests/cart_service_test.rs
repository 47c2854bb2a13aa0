//! Integration tests for the cart service, including the silent pruning of
//! selections invalidated by catalog edits.

mod common;

use common::TestApp;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use storefront_api::entities::product::StringList;
use storefront_api::entities::Product;
use storefront_api::errors::ServiceError;
use storefront_api::services::carts::{AddToCartInput, UpdateCartItemInput};

fn add_input(
    product_id: uuid::Uuid,
    quantity: i32,
    size: Option<&str>,
    color: Option<&str>,
) -> AddToCartInput {
    AddToCartInput {
        product_id,
        quantity,
        selected_size: size.map(String::from),
        selected_color: color.map(String::from),
    }
}

#[tokio::test]
#[ignore = "requires SQLite integration environment"]
async fn add_item_captures_price_and_totals() {
    let app = TestApp::new().await;
    let user = app.seed_user(false).await;
    let product = app.seed_product(dec!(59.99), 10).await;

    let cart = app
        .carts
        .add_item(user.id, add_input(product.id, 2, None, None))
        .await
        .expect("item added");

    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].unit_price, dec!(59.99));
    assert_eq!(cart.total_price, dec!(119.98));
}

#[tokio::test]
#[ignore = "requires SQLite integration environment"]
async fn adding_same_selection_merges_quantities() {
    let app = TestApp::new().await;
    let user = app.seed_user(false).await;
    let product = app
        .seed_product_with_options(dec!(20), 10, vec!["S", "M"], vec![])
        .await;

    app.carts
        .add_item(user.id, add_input(product.id, 1, Some("S"), None))
        .await
        .unwrap();
    let cart = app
        .carts
        .add_item(user.id, add_input(product.id, 2, Some("S"), None))
        .await
        .unwrap();

    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 3);

    // A different size is a separate line
    let cart = app
        .carts
        .add_item(user.id, add_input(product.id, 1, Some("M"), None))
        .await
        .unwrap();
    assert_eq!(cart.items.len(), 2);
}

#[tokio::test]
#[ignore = "requires SQLite integration environment"]
async fn merged_quantity_cannot_exceed_stock() {
    let app = TestApp::new().await;
    let user = app.seed_user(false).await;
    let product = app.seed_product(dec!(20), 3).await;

    app.carts
        .add_item(user.id, add_input(product.id, 2, None, None))
        .await
        .unwrap();
    let err = app
        .carts
        .add_item(user.id, add_input(product.id, 2, None, None))
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::InsufficientStock(_)));
}

#[tokio::test]
#[ignore = "requires SQLite integration environment"]
async fn missing_required_size_is_rejected() {
    let app = TestApp::new().await;
    let user = app.seed_user(false).await;
    let product = app
        .seed_product_with_options(dec!(20), 10, vec!["S", "M"], vec![])
        .await;

    let err = app
        .carts
        .add_item(user.id, add_input(product.id, 1, None, None))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));
}

#[tokio::test]
#[ignore = "requires SQLite integration environment"]
async fn invalidated_selection_is_pruned_on_read_and_total_recomputed() {
    let app = TestApp::new().await;
    let user = app.seed_user(false).await;
    let keep = app.seed_product(dec!(10), 10).await;
    let resized = app
        .seed_product_with_options(dec!(30), 10, vec!["S", "M"], vec![])
        .await;

    app.carts
        .add_item(user.id, add_input(keep.id, 1, None, None))
        .await
        .unwrap();
    app.carts
        .add_item(user.id, add_input(resized.id, 1, Some("M"), None))
        .await
        .unwrap();

    // Remove size "M" from the catalog entry
    let mut active: storefront_api::entities::product::ActiveModel =
        Product::find_by_id(resized.id)
            .one(&*app.db)
            .await
            .unwrap()
            .unwrap()
            .into();
    active.sizes = Set(StringList(vec!["S".into()]));
    active.update(&*app.db).await.unwrap();

    // Next read self-heals without surfacing an error
    let cart = app.carts.get_cart(user.id).await.unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].product_id, keep.id);
    assert_eq!(cart.total_price, dec!(10));
}

#[tokio::test]
#[ignore = "requires SQLite integration environment"]
async fn update_and_remove_recompute_totals() {
    let app = TestApp::new().await;
    let user = app.seed_user(false).await;
    let product = app.seed_product(dec!(25), 10).await;

    let cart = app
        .carts
        .add_item(user.id, add_input(product.id, 1, None, None))
        .await
        .unwrap();
    let item_id = cart.items[0].id;

    let cart = app
        .carts
        .update_item(
            user.id,
            item_id,
            UpdateCartItemInput {
                quantity: 4,
                selected_size: None,
                selected_color: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(cart.total_price, dec!(100));

    let cart = app.carts.remove_item(user.id, item_id).await.unwrap();
    assert!(cart.items.is_empty());
    assert_eq!(cart.total_price, dec!(0));
}

#[tokio::test]
#[ignore = "requires SQLite integration environment"]
async fn clear_cart_destroys_the_cart() {
    let app = TestApp::new().await;
    let user = app.seed_user(false).await;
    let product = app.seed_product(dec!(25), 10).await;

    app.carts
        .add_item(user.id, add_input(product.id, 1, None, None))
        .await
        .unwrap();
    app.carts.clear_cart(user.id).await.unwrap();

    let cart = app.carts.get_cart(user.id).await.unwrap();
    assert!(cart.cart.is_none());
    assert!(cart.items.is_empty());
    assert_eq!(cart.total_price, dec!(0));
}
