use serde::{Deserialize, Serialize};
use time::Date;

use crate::entity::dmy_date;
use crate::orders::repo_types::{Invoice, Order, OrderDetails, OrderStatus, OrderType};

#[derive(Debug, Deserialize)]
pub struct OrderLineRequest {
    pub product_id: i64,
    pub quantity: i32,
}

/// Body of `POST /orders`. Unit prices are taken from the products, never from the client.
#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    #[serde(default, rename = "type")]
    pub order_type: Option<OrderType>,
    #[serde(default, with = "dmy_date::option")]
    pub expected_delivery: Option<Date>,
    #[serde(default)]
    pub details: Vec<OrderLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub details: Vec<OrderDetails>,
    pub invoice: Option<Invoice>,
}
