use crate::{
    entities::{
        product::{self, AttributeMap, StringList},
        Product,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    Order as SortOrder, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Input for creating a product (admin surface)
#[derive(Debug, Deserialize)]
pub struct CreateProductInput {
    pub name: String,
    pub brand: String,
    pub category: String,
    pub description: String,
    pub image: String,
    #[serde(default)]
    pub images: Vec<String>,
    pub price: Decimal,
    #[serde(default)]
    pub count_in_stock: i32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// Input for updating a product; absent fields keep their current value
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductInput {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub images: Option<Vec<String>>,
    pub price: Option<Decimal>,
    pub count_in_stock: Option<i32>,
    pub tags: Option<Vec<String>>,
    pub sizes: Option<Vec<String>>,
    pub colors: Option<Vec<String>>,
    pub attributes: Option<BTreeMap<String, String>>,
}

/// A page of catalog results
#[derive(Debug)]
pub struct ProductPage {
    pub products: Vec<product::Model>,
    pub page: u64,
    pub pages: u64,
    pub count: u64,
}

/// Catalog maintenance and storefront reads.
#[derive(Clone)]
pub struct ProductService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl ProductService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Paginated catalog listing with optional case-insensitive name search.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        page: u64,
        page_size: u64,
        keyword: Option<&str>,
    ) -> Result<ProductPage, ServiceError> {
        let mut query = Product::find().order_by_desc(product::Column::CreatedAt);
        if let Some(keyword) = keyword.map(str::trim).filter(|k| !k.is_empty()) {
            query = query.filter(product::Column::Name.contains(keyword));
        }

        let paginator = query.paginate(&*self.db, page_size.max(1));
        let count = paginator.num_items().await?;
        let pages = paginator.num_pages().await?;
        let products = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok(ProductPage {
            products,
            page,
            pages,
            count,
        })
    }

    pub async fn get(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }

    /// Highest-priced products, used for the storefront's featured rail.
    pub async fn top(&self, limit: u64) -> Result<Vec<product::Model>, ServiceError> {
        Ok(Product::find()
            .order_by_desc(product::Column::Price)
            .limit(limit)
            .all(&*self.db)
            .await?)
    }

    /// Random sample for the landing page.
    pub async fn random(&self, limit: u64) -> Result<Vec<product::Model>, ServiceError> {
        Ok(Product::find()
            .order_by(Expr::cust("RANDOM()"), SortOrder::Asc)
            .limit(limit)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, input: CreateProductInput) -> Result<product::Model, ServiceError> {
        if input.price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Price cannot be negative".to_string(),
            ));
        }
        if input.count_in_stock < 0 {
            return Err(ServiceError::ValidationError(
                "Stock count cannot be negative".to_string(),
            ));
        }

        let product = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            brand: Set(input.brand),
            category: Set(input.category),
            description: Set(input.description),
            image: Set(input.image),
            images: Set(StringList(input.images)),
            price: Set(input.price),
            count_in_stock: Set(input.count_in_stock),
            tags: Set(StringList(input.tags)),
            sizes: Set(StringList(input.sizes)),
            colors: Set(StringList(input.colors)),
            attributes: Set(AttributeMap(input.attributes)),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };

        let product = product.insert(&*self.db).await?;
        self.event_sender
            .send_or_log(Event::ProductCreated(product.id))
            .await;

        info!("Created product {}", product.id);
        Ok(product)
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> Result<product::Model, ServiceError> {
        if matches!(input.price, Some(p) if p < Decimal::ZERO) {
            return Err(ServiceError::ValidationError(
                "Price cannot be negative".to_string(),
            ));
        }
        if matches!(input.count_in_stock, Some(c) if c < 0) {
            return Err(ServiceError::ValidationError(
                "Stock count cannot be negative".to_string(),
            ));
        }

        let product = self.get(product_id).await?;
        let mut active: product::ActiveModel = product.into();

        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(brand) = input.brand {
            active.brand = Set(brand);
        }
        if let Some(category) = input.category {
            active.category = Set(category);
        }
        if let Some(description) = input.description {
            active.description = Set(description);
        }
        if let Some(image) = input.image {
            active.image = Set(image);
        }
        if let Some(images) = input.images {
            active.images = Set(StringList(images));
        }
        if let Some(price) = input.price {
            active.price = Set(price);
        }
        if let Some(count_in_stock) = input.count_in_stock {
            active.count_in_stock = Set(count_in_stock);
        }
        if let Some(tags) = input.tags {
            active.tags = Set(StringList(tags));
        }
        if let Some(sizes) = input.sizes {
            active.sizes = Set(StringList(sizes));
        }
        if let Some(colors) = input.colors {
            active.colors = Set(StringList(colors));
        }
        if let Some(attributes) = input.attributes {
            active.attributes = Set(AttributeMap(attributes));
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(&*self.db).await?;
        self.event_sender
            .send_or_log(Event::ProductUpdated(product_id))
            .await;
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, product_id: Uuid) -> Result<(), ServiceError> {
        let product = self.get(product_id).await?;
        Product::delete_by_id(product.id).exec(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ProductDeleted(product_id))
            .await;
        info!("Deleted product {}", product_id);
        Ok(())
    }
}
