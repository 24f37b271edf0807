use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Order, OrderItem};

#[derive(Debug, Default, Deserialize)]
pub struct PlaceOrderRequest {
    pub contact_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct OrderList {
    pub items: Vec<Order>,
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct ShopOrderList {
    pub items: Vec<OrderWithItems>,
}
