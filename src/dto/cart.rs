use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub const MAX_LINE_QUANTITY: i32 = 10_000;

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddToCartRequest {
    pub product_info_id: Uuid,
    #[serde(default = "default_quantity")]
    #[validate(range(min = 1, max = MAX_LINE_QUANTITY))]
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct CartDto {
    pub order_id: Uuid,
    pub items: Vec<CartItemDto>,
    pub total: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct CartItemDto {
    pub id: Uuid,
    pub product_info_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub shop_id: Uuid,
    pub shop_name: String,
    pub quantity: i32,
    pub unit_price: i64,
}
