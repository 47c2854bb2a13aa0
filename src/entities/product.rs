use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Catalog entry. `count_in_stock` is the single source of truth for
/// availability and must never go negative.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub brand: String,
    pub category: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    /// Main image URL
    pub image: String,
    /// Additional gallery image URLs
    #[sea_orm(column_type = "Json")]
    pub images: StringList,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub price: Decimal,
    pub count_in_stock: i32,
    #[sea_orm(column_type = "Json")]
    pub tags: StringList,
    /// Selectable size options; empty list means the product has no sizes
    #[sea_orm(column_type = "Json")]
    pub sizes: StringList,
    /// Selectable color options; empty list means the product has no colors
    #[sea_orm(column_type = "Json")]
    pub colors: StringList,
    /// Arbitrary key/value attributes shown on the product page
    #[sea_orm(column_type = "Json")]
    pub attributes: AttributeMap,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
    #[sea_orm(has_many = "super::cart_item::Entity")]
    CartItems,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::cart_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CartItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// JSON-backed list of strings (tags, sizes, colors, gallery images)
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult,
)]
pub struct StringList(pub Vec<String>);

impl StringList {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, value: &str) -> bool {
        self.0.iter().any(|v| v == value)
    }
}

impl From<Vec<String>> for StringList {
    fn from(values: Vec<String>) -> Self {
        Self(values)
    }
}

/// JSON-backed key/value attribute map
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult,
)]
pub struct AttributeMap(pub BTreeMap<String, String>);

impl Model {
    /// Checks a size/color selection against the current option lists.
    /// A selection is valid when the product has no options of that kind, or
    /// when the selection is a current member of the list.
    pub fn selection_is_valid(&self, size: Option<&str>, color: Option<&str>) -> bool {
        let size_ok = self.sizes.is_empty() || size.is_some_and(|s| self.sizes.contains(s));
        let color_ok = self.colors.is_empty() || color.is_some_and(|c| self.colors.contains(c));
        size_ok && color_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn product_with_options(sizes: Vec<&str>, colors: Vec<&str>) -> Model {
        Model {
            id: Uuid::new_v4(),
            name: "Trail Shoe".into(),
            brand: "Acme".into(),
            category: "footwear".into(),
            description: "A shoe".into(),
            image: "/img/shoe.jpg".into(),
            images: StringList::default(),
            price: dec!(100),
            count_in_stock: 5,
            tags: StringList::default(),
            sizes: StringList(sizes.into_iter().map(String::from).collect()),
            colors: StringList(colors.into_iter().map(String::from).collect()),
            attributes: AttributeMap::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn selection_valid_when_product_has_no_options() {
        let product = product_with_options(vec![], vec![]);
        assert!(product.selection_is_valid(None, None));
        // A stale selection on an option-less product is also fine
        assert!(product.selection_is_valid(Some("42"), Some("red")));
    }

    #[test]
    fn selection_must_be_member_of_current_lists() {
        let product = product_with_options(vec!["40", "41"], vec!["red"]);
        assert!(product.selection_is_valid(Some("40"), Some("red")));
        assert!(!product.selection_is_valid(Some("43"), Some("red")));
        assert!(!product.selection_is_valid(Some("40"), Some("blue")));
        // Missing selection while options exist is invalid
        assert!(!product.selection_is_valid(None, Some("red")));
    }
}
