use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::Date;
use uuid::Uuid;

use crate::entity::{dmy_date, BaseEntity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Inbound,
    #[default]
    Outbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
    Returned,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Returned => "RETURNED",
        }
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Shipped)
                | (Confirmed, Cancelled)
                | (Shipped, Delivered)
                | (Shipped, Returned)
                | (Delivered, Returned)
        )
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub base: BaseEntity,
    pub order_number: String, // set once at insert, never updated
    #[serde(rename = "type")]
    pub order_type: OrderType,
    #[serde(rename = "status")]
    pub order_status: OrderStatus,
    #[serde(with = "dmy_date::option")]
    pub expected_delivery: Option<Date>,
    pub user_id: i64,
    #[serde(skip_serializing)]
    pub delivery_schedule_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderDetails {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub base: BaseEntity,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Invoice {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub base: BaseEntity,
    pub order_id: i64,
    pub user_id: i64,
    pub total_amount: Decimal,
    pub paid: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOrderLine {
    pub product_id: i64,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: String,
    pub order_type: OrderType,
    pub expected_delivery: Option<Date>,
    pub user_id: i64,
    pub lines: Vec<NewOrderLine>,
}

impl NewOrder {
    pub fn new(user_id: i64, order_type: OrderType, expected_delivery: Option<Date>) -> Self {
        Self {
            order_number: Uuid::new_v4().to_string(),
            order_type,
            expected_delivery,
            user_id,
            lines: Vec::new(),
        }
    }

    pub fn total(&self) -> Decimal {
        self.lines
            .iter()
            .map(|l| l.unit_price * Decimal::from(l.quantity))
            .sum()
    }
}
