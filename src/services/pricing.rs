use crate::{
    config::PricingConfig,
    entities::{product, Product},
    errors::ServiceError,
};
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

/// Rounds a monetary amount to two decimal places.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Price breakdown derived from an item subtotal.
///
/// Tax is a flat percentage of the subtotal; shipping is free only when the
/// subtotal strictly exceeds the threshold, so a subtotal of exactly the
/// threshold still pays the flat fee.
pub fn price_breakdown(subtotal: Decimal, policy: &PricingConfig) -> (Decimal, Decimal, Decimal) {
    let tax = round_money(subtotal * policy.tax_rate);
    let shipping = if subtotal > policy.free_shipping_threshold {
        Decimal::ZERO
    } else {
        policy.flat_shipping_fee
    };
    let total = round_money(subtotal + tax + shipping);
    (tax, shipping, total)
}

/// A line requested for quoting: product reference plus quantity and the
/// shopper's option selection.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct QuoteItem {
    pub product_id: Uuid,
    pub quantity: i32,
    #[serde(default)]
    pub selected_size: Option<String>,
    #[serde(default)]
    pub selected_color: Option<String>,
}

/// A quoted line with the catalog price and display fields captured at
/// quote time.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuotedLine {
    pub product_id: Uuid,
    pub name: String,
    pub image: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_color: Option<String>,
}

/// Computed price breakdown returned before an order is committed.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Quote {
    pub items: Vec<QuotedLine>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

/// Derives quotes from the catalog of record. Client-submitted prices are
/// never consulted; every unit price comes from the current product row.
#[derive(Clone)]
pub struct PricingService {
    db: Arc<DatabaseConnection>,
    policy: PricingConfig,
}

impl PricingService {
    pub fn new(db: Arc<DatabaseConnection>, policy: PricingConfig) -> Self {
        Self { db, policy }
    }

    pub fn policy(&self) -> &PricingConfig {
        &self.policy
    }

    /// Computes a quote for the given lines.
    ///
    /// Any missing product rejects the whole computation; there is no
    /// partial quote.
    #[instrument(skip(self))]
    pub async fn quote_items(&self, items: &[QuoteItem]) -> Result<Quote, ServiceError> {
        if items.is_empty() {
            return Err(ServiceError::ValidationError("Cart is empty".to_string()));
        }

        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            if item.quantity < 1 {
                return Err(ServiceError::ValidationError(format!(
                    "Invalid quantity {} for product {}",
                    item.quantity, item.product_id
                )));
            }

            let product = self.fetch_product(item.product_id).await?;
            lines.push(QuotedLine {
                product_id: product.id,
                name: product.name,
                image: product.image,
                unit_price: product.price,
                quantity: item.quantity,
                selected_size: item.selected_size.clone(),
                selected_color: item.selected_color.clone(),
            });
        }

        Ok(quote_from_lines(lines, &self.policy))
    }

    async fn fetch_product(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }
}

/// Assembles a quote from already-priced lines.
pub fn quote_from_lines(lines: Vec<QuotedLine>, policy: &PricingConfig) -> Quote {
    let subtotal = round_money(
        lines
            .iter()
            .map(|line| line.unit_price * Decimal::from(line.quantity))
            .sum(),
    );
    let (tax, shipping, total) = price_breakdown(subtotal, policy);

    Quote {
        items: lines,
        subtotal,
        tax,
        shipping,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use test_case::test_case;

    fn policy() -> PricingConfig {
        PricingConfig::default()
    }

    fn line(price: Decimal, quantity: i32) -> QuotedLine {
        QuotedLine {
            product_id: Uuid::new_v4(),
            name: "Item".into(),
            image: "/img.jpg".into(),
            unit_price: price,
            quantity,
            selected_size: None,
            selected_color: None,
        }
    }

    #[test]
    fn quote_for_price_100_qty_2() {
        let quote = quote_from_lines(vec![line(dec!(100), 2)], &policy());
        assert_eq!(quote.subtotal, dec!(200));
        assert_eq!(quote.tax, dec!(30.00));
        assert_eq!(quote.shipping, dec!(50));
        assert_eq!(quote.total, dec!(280.00));
    }

    #[test]
    fn quote_above_free_shipping_threshold() {
        let quote = quote_from_lines(vec![line(dec!(1200), 1)], &policy());
        assert_eq!(quote.tax, dec!(180.00));
        assert_eq!(quote.shipping, Decimal::ZERO);
        assert_eq!(quote.total, dec!(1380.00));
    }

    // Exactly 1000 still pays the flat fee; free shipping needs a strictly
    // greater subtotal.
    #[test_case(dec!(999.99), dec!(50) ; "just below threshold")]
    #[test_case(dec!(1000.00), dec!(50) ; "exactly at threshold")]
    #[test_case(dec!(1000.01), dec!(0) ; "just above threshold")]
    fn shipping_at_threshold_boundary(subtotal: Decimal, expected: Decimal) {
        let (_, shipping, _) = price_breakdown(subtotal, &policy());
        assert_eq!(shipping, expected);
    }

    #[test]
    fn tax_is_rounded_to_two_decimals() {
        // 33.33 * 3 = 99.99; 15% = 14.9985 -> 15.00
        let quote = quote_from_lines(vec![line(dec!(33.33), 3)], &policy());
        assert_eq!(quote.subtotal, dec!(99.99));
        assert_eq!(quote.tax, dec!(15.00));
        assert_eq!(quote.total, dec!(164.99));
    }

    #[test]
    fn total_sums_mixed_lines() {
        let quote = quote_from_lines(
            vec![line(dec!(25.50), 3), line(dec!(99.99), 1)],
            &policy(),
        );
        // 76.50 + 99.99 = 176.49
        assert_eq!(quote.subtotal, dec!(176.49));
        assert_eq!(quote.tax, round_money(dec!(176.49) * dec!(0.15)));
        assert_eq!(
            quote.total,
            round_money(quote.subtotal + quote.tax + quote.shipping)
        );
    }
}
