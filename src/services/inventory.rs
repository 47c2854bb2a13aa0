use crate::{
    entities::{product, Product},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DatabaseConnection, EntityTrait, Set};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// A requested (product, quantity) pair checked against catalog stock.
#[derive(Debug, Clone, Copy)]
pub struct StockLine {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Outcome of a stock decrement, used for event emission after commit.
#[derive(Debug, Clone, Copy)]
pub struct StockDecrement {
    pub product_id: Uuid,
    pub quantity: i32,
    pub remaining: i32,
}

/// Guards the `count_in_stock >= 0` invariant. Validation runs once at quote
/// time and again at order creation to close the race between the two; the
/// decrement itself re-checks inside the commit transaction.
#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DatabaseConnection>,
}

impl InventoryService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Checks every line against current stock, naming the first product
    /// that cannot be fulfilled.
    #[instrument(skip(self))]
    pub async fn validate_stock(&self, lines: &[StockLine]) -> Result<(), ServiceError> {
        self.validate_stock_on(&*self.db, lines).await
    }

    /// Same as [`validate_stock`](Self::validate_stock) but against an
    /// explicit connection, so callers can run it inside a transaction.
    pub async fn validate_stock_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        lines: &[StockLine],
    ) -> Result<(), ServiceError> {
        for line in lines {
            let product = fetch_product(conn, line.product_id).await?;
            ensure_available(&product, line.quantity)?;
        }
        Ok(())
    }

    /// Decrements stock for every line inside the caller's transaction.
    ///
    /// Re-checks availability on each row; any shortfall errors out so the
    /// surrounding transaction rolls back the order as well.
    pub async fn decrement_stock<C: ConnectionTrait>(
        &self,
        conn: &C,
        lines: &[StockLine],
    ) -> Result<Vec<StockDecrement>, ServiceError> {
        let mut decrements = Vec::with_capacity(lines.len());

        for line in lines {
            let product = fetch_product(conn, line.product_id).await?;
            ensure_available(&product, line.quantity)?;

            let remaining = product.count_in_stock - line.quantity;
            let product_id = product.id;
            let mut active: product::ActiveModel = product.into();
            active.count_in_stock = Set(remaining);
            active.updated_at = Set(Utc::now());
            active.update(conn).await?;

            info!(
                "Decremented stock for {}: -{} (remaining {})",
                product_id, line.quantity, remaining
            );
            decrements.push(StockDecrement {
                product_id,
                quantity: line.quantity,
                remaining,
            });
        }

        Ok(decrements)
    }
}

async fn fetch_product<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
) -> Result<product::Model, ServiceError> {
    Product::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
}

fn ensure_available(product: &product::Model, requested: i32) -> Result<(), ServiceError> {
    if requested > product.count_in_stock {
        return Err(ServiceError::InsufficientStock(format!(
            "Not enough stock for {}",
            product.name
        )));
    }
    Ok(())
}
