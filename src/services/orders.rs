use crate::{
    config::PricingConfig,
    entities::{
        order::{self, OrderStatus, ShippingAddress},
        order_item, Order, OrderItem,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        inventory::{InventoryService, StockLine},
        payments::PaymentGateway,
        pricing::{PricingService, Quote, QuoteItem},
    },
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

const GATEWAY_PAYMENT_METHOD: &str = "razorpay";

/// Shipping address as submitted at checkout. Street, city and postal code
/// are mandatory; country falls back to the configured default.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AddressInput {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub country: Option<String>,
}

/// Input for creating an order
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateOrderInput {
    pub items: Vec<QuoteItem>,
    pub shipping_address: AddressInput,
    pub payment_method: String,
}

/// Callback fields submitted by the client after paying at the gateway
#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyPaymentInput {
    #[serde(alias = "razorpayOrderId")]
    pub razorpay_order_id: String,
    #[serde(alias = "razorpayPaymentId")]
    pub razorpay_payment_id: String,
    #[serde(alias = "razorpaySignature")]
    pub razorpay_signature: String,
}

/// Order with its line items
#[derive(Debug, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

/// Builds and reads order records.
///
/// Creation recomputes all prices from the catalog, revalidates stock, and
/// commits the order insert together with the stock decrement in a single
/// transaction. Payment verification trusts nothing but the gateway
/// signature.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    pricing: Arc<PricingService>,
    inventory: Arc<InventoryService>,
    gateway: Option<Arc<PaymentGateway>>,
    policy: PricingConfig,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        pricing: Arc<PricingService>,
        inventory: Arc<InventoryService>,
        gateway: Option<Arc<PaymentGateway>>,
        policy: PricingConfig,
    ) -> Self {
        Self {
            db,
            event_sender,
            pricing,
            inventory,
            gateway,
            policy,
        }
    }

    /// Creates an order from validated input.
    ///
    /// Pipeline: recompute quote from the catalog, revalidate stock, open a
    /// gateway transaction when paying through the gateway, then commit
    /// {order insert, item inserts, stock decrement} atomically. A gateway
    /// failure rejects the request before anything is persisted.
    #[instrument(skip(self, input), fields(user_id = %user_id))]
    pub async fn create_order(
        &self,
        user_id: Uuid,
        input: CreateOrderInput,
    ) -> Result<OrderWithItems, ServiceError> {
        if input.items.is_empty() {
            return Err(ServiceError::ValidationError("No order items".to_string()));
        }

        let shipping_address = validate_address(&input.shipping_address, &self.policy)?;
        let quote = self.pricing.quote_items(&input.items).await?;

        let stock_lines: Vec<StockLine> = input
            .items
            .iter()
            .map(|item| StockLine {
                product_id: item.product_id,
                quantity: item.quantity,
            })
            .collect();
        self.inventory.validate_stock(&stock_lines).await?;

        let order_id = Uuid::new_v4();
        let gateway_order_id = if input.payment_method.eq_ignore_ascii_case(GATEWAY_PAYMENT_METHOD)
        {
            let gateway = self.gateway.as_ref().ok_or_else(|| {
                ServiceError::InvalidOperation("Payment gateway is not configured".to_string())
            })?;
            let transaction = gateway
                .open_transaction(quote.total, &order_id.to_string())
                .await?;
            Some(transaction.id)
        } else {
            None
        };

        let txn = self.db.begin().await?;

        let order = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(user_id),
            status: Set(OrderStatus::Pending),
            payment_method: Set(input.payment_method.clone()),
            shipping_address: Set(shipping_address),
            items_price: Set(quote.subtotal),
            tax_price: Set(quote.tax),
            shipping_price: Set(quote.shipping),
            total_price: Set(quote.total),
            is_paid: Set(false),
            paid_at: Set(None),
            gateway_order_id: Set(gateway_order_id),
            gateway_payment_id: Set(None),
            gateway_signature: Set(None),
            is_delivered: Set(false),
            delivered_at: Set(None),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        };
        let order = order.insert(&txn).await?;

        let mut items = Vec::with_capacity(quote.items.len());
        for line in &quote.items {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.product_id),
                name: Set(line.name.clone()),
                image: Set(line.image.clone()),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                total_price: Set(line.unit_price * rust_decimal::Decimal::from(line.quantity)),
                selected_size: Set(line.selected_size.clone()),
                selected_color: Set(line.selected_color.clone()),
                created_at: Set(Utc::now()),
            };
            items.push(item.insert(&txn).await?);
        }

        // Same transaction as the insert: a shortfall here rolls the order back
        let decrements = self.inventory.decrement_stock(&txn, &stock_lines).await?;

        txn.commit().await?;

        self.event_sender.send_or_log(Event::OrderCreated(order_id)).await;
        for d in decrements {
            self.event_sender
                .send_or_log(Event::StockDecremented {
                    product_id: d.product_id,
                    quantity: d.quantity,
                    remaining: d.remaining,
                })
                .await;
        }

        info!("Created order {} for user {}", order_id, user_id);
        Ok(OrderWithItems { order, items })
    }

    /// Marks an order paid after verifying the gateway callback signature.
    #[instrument(skip(self, input), fields(order_id = %order_id))]
    pub async fn verify_payment(
        &self,
        order_id: Uuid,
        user_id: Uuid,
        input: VerifyPaymentInput,
    ) -> Result<order::Model, ServiceError> {
        let order = self.find_order(order_id).await?;

        if order.user_id != user_id {
            return Err(ServiceError::Forbidden(
                "Not authorized to verify this payment".to_string(),
            ));
        }
        if order.is_paid {
            return Err(ServiceError::InvalidOperation(
                "Order is already paid".to_string(),
            ));
        }
        if !order
            .payment_method
            .eq_ignore_ascii_case(GATEWAY_PAYMENT_METHOD)
        {
            return Err(ServiceError::InvalidOperation(
                "Invalid payment method".to_string(),
            ));
        }
        if order.gateway_order_id.as_deref() != Some(input.razorpay_order_id.as_str()) {
            return Err(ServiceError::ValidationError(
                "Invalid gateway order ID".to_string(),
            ));
        }

        let gateway = self.gateway.as_ref().ok_or_else(|| {
            ServiceError::InvalidOperation("Payment gateway is not configured".to_string())
        })?;
        let valid = gateway.verify_signature(
            &input.razorpay_order_id,
            &input.razorpay_payment_id,
            &input.razorpay_signature,
        )?;
        if !valid {
            return Err(ServiceError::PaymentFailed(
                "Invalid payment signature".to_string(),
            ));
        }

        let old_status = order.status;
        let mut active: order::ActiveModel = order.into();
        active.is_paid = Set(true);
        active.paid_at = Set(Some(Utc::now()));
        active.gateway_payment_id = Set(Some(input.razorpay_payment_id));
        active.gateway_signature = Set(Some(input.razorpay_signature));
        active.status = Set(OrderStatus::Processing);
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&*self.db).await?;

        self.event_sender.send_or_log(Event::OrderPaid(order_id)).await;
        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status: old_status.to_string(),
                new_status: updated.status.to_string(),
            })
            .await;

        info!("Order {} verified as paid", order_id);
        Ok(updated)
    }

    /// Fetches one order with its items.
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderWithItems, ServiceError> {
        let order = self.find_order(order_id).await?;
        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;
        Ok(OrderWithItems { order, items })
    }

    /// Lists a user's orders, newest first.
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<order::Model>, ServiceError> {
        Ok(Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Lists every order, newest first. Admin surface.
    pub async fn list_all(&self) -> Result<Vec<order::Model>, ServiceError> {
        Ok(Order::find()
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Computes a checkout quote without persisting anything.
    pub async fn quote(&self, items: &[QuoteItem]) -> Result<Quote, ServiceError> {
        self.pricing.quote_items(items).await
    }

    /// Stock validation re-exposed for the quote endpoint's cart path.
    pub async fn validate_stock(&self, items: &[QuoteItem]) -> Result<(), ServiceError> {
        let lines: Vec<StockLine> = items
            .iter()
            .map(|item| StockLine {
                product_id: item.product_id,
                quantity: item.quantity,
            })
            .collect();
        self.inventory.validate_stock(&lines).await
    }

    async fn find_order(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }
}

/// Applies the address requirements: street, city and postal code must be
/// present; a missing country gets the configured default.
fn validate_address(
    input: &AddressInput,
    policy: &PricingConfig,
) -> Result<ShippingAddress, ServiceError> {
    if input.address.trim().is_empty()
        || input.city.trim().is_empty()
        || input.postal_code.trim().is_empty()
    {
        return Err(ServiceError::ValidationError(
            "Please provide complete shipping address".to_string(),
        ));
    }

    let country = input
        .country
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(&policy.default_country)
        .to_string();

    Ok(ShippingAddress {
        address: input.address.trim().to_string(),
        city: input.city.trim().to_string(),
        postal_code: input.postal_code.trim().to_string(),
        country,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> PricingConfig {
        PricingConfig::default()
    }

    fn address(address: &str, city: &str, postal_code: &str, country: Option<&str>) -> AddressInput {
        AddressInput {
            address: address.into(),
            city: city.into(),
            postal_code: postal_code.into(),
            country: country.map(String::from),
        }
    }

    #[test]
    fn complete_address_passes_and_is_trimmed() {
        let validated =
            validate_address(&address(" 12 MG Road ", "Pune", "411001", Some("India")), &policy())
                .unwrap();
        assert_eq!(validated.address, "12 MG Road");
        assert_eq!(validated.city, "Pune");
        assert_eq!(validated.postal_code, "411001");
        assert_eq!(validated.country, "India");
    }

    #[test]
    fn missing_city_is_rejected() {
        let err = validate_address(&address("12 MG Road", "", "411001", None), &policy())
            .unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[test]
    fn whitespace_only_fields_are_rejected() {
        assert!(validate_address(&address("  ", "Pune", "411001", None), &policy()).is_err());
        assert!(validate_address(&address("12 MG Road", "Pune", "\t", None), &policy()).is_err());
    }

    #[test]
    fn missing_country_gets_the_default() {
        let validated =
            validate_address(&address("12 MG Road", "Pune", "411001", None), &policy()).unwrap();
        assert_eq!(validated.country, "India");

        let validated =
            validate_address(&address("12 MG Road", "Pune", "411001", Some("  ")), &policy())
                .unwrap();
        assert_eq!(validated.country, "India");
    }
}
