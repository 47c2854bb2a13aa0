use crate::{
    entities::{cart, cart_item, product, Cart, CartItem, Product},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Input for adding an item to the cart
#[derive(Debug, Deserialize)]
pub struct AddToCartInput {
    pub product_id: Uuid,
    pub quantity: i32,
    #[serde(default)]
    pub selected_size: Option<String>,
    #[serde(default)]
    pub selected_color: Option<String>,
}

/// Input for updating a cart item
#[derive(Debug, Deserialize)]
pub struct UpdateCartItemInput {
    pub quantity: i32,
    #[serde(default)]
    pub selected_size: Option<String>,
    #[serde(default)]
    pub selected_color: Option<String>,
}

/// Cart with its line items
#[derive(Debug, Serialize)]
pub struct CartWithItems {
    pub cart: Option<cart::Model>,
    pub items: Vec<cart_item::Model>,
    pub total_price: Decimal,
}

/// Shopping cart service: one active cart per user.
///
/// Reads self-heal: items whose size/color selection is no longer a member
/// of the product's option lists (or whose product is gone) are silently
/// dropped and the running total recomputed.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Returns the user's cart, pruning entries invalidated by catalog edits.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, user_id: Uuid) -> Result<CartWithItems, ServiceError> {
        let Some(cart) = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
        else {
            return Ok(CartWithItems {
                cart: None,
                items: Vec::new(),
                total_price: Decimal::ZERO,
            });
        };

        let items = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .all(&*self.db)
            .await?;

        let mut kept = Vec::with_capacity(items.len());
        let mut dropped = Vec::new();
        for item in items {
            match Product::find_by_id(item.product_id).one(&*self.db).await? {
                Some(product)
                    if product.selection_is_valid(
                        item.selected_size.as_deref(),
                        item.selected_color.as_deref(),
                    ) =>
                {
                    kept.push(item)
                }
                _ => dropped.push(item),
            }
        }

        if dropped.is_empty() {
            let total_price = cart.total_price;
            return Ok(CartWithItems {
                cart: Some(cart),
                items: kept,
                total_price,
            });
        }

        // Self-heal: remove invalidated entries and recompute the total
        let txn = self.db.begin().await?;
        for item in &dropped {
            CartItem::delete_by_id(item.id).exec(&txn).await?;
        }
        let cart = recalculate_total(&txn, cart).await?;
        txn.commit().await?;

        info!(
            "Pruned {} invalid item(s) from cart {}",
            dropped.len(),
            cart.id
        );

        let total_price = cart.total_price;
        Ok(CartWithItems {
            cart: Some(cart),
            items: kept,
            total_price,
        })
    }

    /// Adds an item, merging with an existing line that has the same product
    /// and selection.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        input: AddToCartInput,
    ) -> Result<CartWithItems, ServiceError> {
        if input.quantity < 1 {
            return Err(ServiceError::ValidationError(
                "Quantity must be at least 1".to_string(),
            ));
        }

        let product = Product::find_by_id(input.product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", input.product_id))
            })?;

        validate_selection(&product, input.selected_size.as_deref(), input.selected_color.as_deref())?;
        ensure_stock(&product, input.quantity)?;

        let txn = self.db.begin().await?;
        let cart = self.get_or_create_cart(&txn, user_id).await?;

        // NULL selections have to be matched with IS NULL, not `=`
        let mut existing_query = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(input.product_id));
        existing_query = match &input.selected_size {
            Some(size) => existing_query.filter(cart_item::Column::SelectedSize.eq(size.clone())),
            None => existing_query.filter(cart_item::Column::SelectedSize.is_null()),
        };
        existing_query = match &input.selected_color {
            Some(color) => {
                existing_query.filter(cart_item::Column::SelectedColor.eq(color.clone()))
            }
            None => existing_query.filter(cart_item::Column::SelectedColor.is_null()),
        };
        let existing = existing_query.one(&txn).await?;

        if let Some(item) = existing {
            let new_quantity = item.quantity + input.quantity;
            ensure_stock(&product, new_quantity)?;

            let mut active: cart_item::ActiveModel = item.into();
            active.quantity = Set(new_quantity);
            active.updated_at = Set(Utc::now());
            active.update(&txn).await?;
        } else {
            let item = cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                product_id: Set(input.product_id),
                quantity: Set(input.quantity),
                unit_price: Set(product.price),
                selected_size: Set(input.selected_size.clone()),
                selected_color: Set(input.selected_color.clone()),
                created_at: Set(Utc::now()),
                updated_at: Set(Utc::now()),
            };
            item.insert(&txn).await?;
        }

        let cart = recalculate_total(&txn, cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_id: cart.id,
                product_id: input.product_id,
            })
            .await;

        self.get_cart(user_id).await
    }

    /// Updates quantity and/or selection of an item in the user's cart.
    #[instrument(skip(self))]
    pub async fn update_item(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        input: UpdateCartItemInput,
    ) -> Result<CartWithItems, ServiceError> {
        let cart = self.require_cart(user_id).await?;

        let item = CartItem::find_by_id(item_id)
            .one(&*self.db)
            .await?
            .filter(|item| item.cart_id == cart.id)
            .ok_or_else(|| ServiceError::NotFound(format!("Cart item {} not found", item_id)))?;

        let product = Product::find_by_id(item.product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", item.product_id))
            })?;

        if input.quantity < 1 {
            return Err(ServiceError::ValidationError(
                "Quantity must be at least 1".to_string(),
            ));
        }
        ensure_stock(&product, input.quantity)?;

        let selected_size = input.selected_size.or(item.selected_size.clone());
        let selected_color = input.selected_color.or(item.selected_color.clone());
        validate_selection(&product, selected_size.as_deref(), selected_color.as_deref())?;

        let txn = self.db.begin().await?;
        let mut active: cart_item::ActiveModel = item.into();
        active.quantity = Set(input.quantity);
        active.selected_size = Set(selected_size);
        active.selected_color = Set(selected_color);
        active.updated_at = Set(Utc::now());
        active.update(&txn).await?;

        let cart = recalculate_total(&txn, cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemUpdated {
                cart_id: cart.id,
                item_id,
            })
            .await;

        self.get_cart(user_id).await
    }

    /// Removes one item from the user's cart.
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: Uuid,
        item_id: Uuid,
    ) -> Result<CartWithItems, ServiceError> {
        let cart = self.require_cart(user_id).await?;

        let item = CartItem::find_by_id(item_id)
            .one(&*self.db)
            .await?
            .filter(|item| item.cart_id == cart.id)
            .ok_or_else(|| ServiceError::NotFound(format!("Cart item {} not found", item_id)))?;

        let txn = self.db.begin().await?;
        CartItem::delete_by_id(item.id).exec(&txn).await?;
        let cart = recalculate_total(&txn, cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved {
                cart_id: cart.id,
                item_id,
            })
            .await;

        self.get_cart(user_id).await
    }

    /// Destroys the user's cart and all of its items.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self, user_id: Uuid) -> Result<(), ServiceError> {
        let Some(cart) = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
        else {
            return Ok(());
        };

        let txn = self.db.begin().await?;
        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;
        Cart::delete_by_id(cart.id).exec(&txn).await?;
        txn.commit().await?;

        self.event_sender.send_or_log(Event::CartCleared(cart.id)).await;
        info!("Cleared cart for user {}", user_id);
        Ok(())
    }

    async fn require_cart(&self, user_id: Uuid) -> Result<cart::Model, ServiceError> {
        Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cart not found".to_string()))
    }

    async fn get_or_create_cart<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: Uuid,
    ) -> Result<cart::Model, ServiceError> {
        if let Some(cart) = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(conn)
            .await?
        {
            return Ok(cart);
        }

        let cart = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            total_price: Set(Decimal::ZERO),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };
        Ok(cart.insert(conn).await?)
    }
}

/// Recomputes the running total from the captured line prices.
async fn recalculate_total<C: ConnectionTrait>(
    conn: &C,
    cart: cart::Model,
) -> Result<cart::Model, ServiceError> {
    let items = CartItem::find()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .all(conn)
        .await?;

    let total: Decimal = items
        .iter()
        .map(|item| item.unit_price * Decimal::from(item.quantity))
        .sum();

    let mut active: cart::ActiveModel = cart.into();
    active.total_price = Set(total);
    active.updated_at = Set(Utc::now());
    Ok(active.update(conn).await?)
}

fn ensure_stock(product: &product::Model, requested: i32) -> Result<(), ServiceError> {
    if requested > product.count_in_stock {
        return Err(ServiceError::InsufficientStock(format!(
            "Not enough stock for {}",
            product.name
        )));
    }
    Ok(())
}

/// Selection rules: an option kind with a non-empty list requires a
/// selection, and the selection must be a current member of the list.
fn validate_selection(
    product: &product::Model,
    size: Option<&str>,
    color: Option<&str>,
) -> Result<(), ServiceError> {
    if !product.sizes.is_empty() && size.is_none() {
        return Err(ServiceError::ValidationError("Size required".to_string()));
    }
    if !product.colors.is_empty() && color.is_none() {
        return Err(ServiceError::ValidationError("Color required".to_string()));
    }
    if let Some(size) = size {
        if !product.sizes.contains(size) {
            return Err(ServiceError::ValidationError("Invalid size".to_string()));
        }
    }
    if let Some(color) = color {
        if !product.colors.contains(color) {
            return Err(ServiceError::ValidationError("Invalid color".to_string()));
        }
    }
    Ok(())
}
