use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    entities::{
        order::{self, OrderStatus},
        Order,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Advances the status tag on order records.
///
/// Overrides are deliberately permissive: any recognized status may replace
/// any other. Unrecognized values never reach this service; they are
/// rejected when the request is parsed.
#[derive(Clone)]
pub struct OrderStatusService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl OrderStatusService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Sets the status of an order. A `delivered` target also stamps the
    /// delivered flag and timestamp; other targets leave them untouched.
    #[instrument(skip(self), fields(order_id = %order_id, new_status = %new_status))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        let order = self.find_order(order_id).await?;
        let old_status = order.status;

        let mut active: order::ActiveModel = order.into();
        active.status = Set(new_status);
        if new_status == OrderStatus::Delivered {
            active.is_delivered = Set(true);
            active.delivered_at = Set(Some(Utc::now()));
        }
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status: old_status.to_string(),
                new_status: new_status.to_string(),
            })
            .await;

        info!(
            "Order {} status updated from '{}' to '{}'",
            order_id, old_status, new_status
        );
        Ok(updated)
    }

    /// Marks an order delivered: status, flag and timestamp.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn mark_delivered(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        let updated = self.update_status(order_id, OrderStatus::Delivered).await?;
        self.event_sender.send_or_log(Event::OrderDelivered(order_id)).await;
        Ok(updated)
    }

    async fn find_order(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }
}
