use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{Category, Product, ProductInfo, ProductParameter};

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct ProductList {
    pub items: Vec<Product>,
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct CategoryList {
    pub items: Vec<Category>,
}

#[derive(Debug, Serialize)]
pub struct ProductOffer {
    #[serde(flatten)]
    pub info: ProductInfo,
    pub shop_name: String,
}

#[derive(Debug, Serialize)]
pub struct ProductDetail {
    pub product: Product,
    pub offers: Vec<ProductOffer>,
}

#[derive(Debug, Serialize)]
pub struct ShopProductInfo {
    #[serde(flatten)]
    pub info: ProductInfo,
    pub product_name: String,
    pub parameters: Vec<ProductParameter>,
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct ShopProductInfoList {
    pub items: Vec<ShopProductInfo>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BulkPriceUpdateRequest {
    #[validate(length(min = 1, max = 1000), nested)]
    pub entries: Vec<PriceUpdateEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PriceUpdateEntry {
    pub id: Uuid,
    #[validate(range(min = 0))]
    pub price: Option<i64>,
    #[validate(range(min = 0))]
    pub price_rrc: Option<i64>,
    #[validate(range(min = 0))]
    pub quantity: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct BulkPriceUpdateResult {
    pub updated: Vec<Uuid>,
    pub skipped: Vec<Uuid>,
}
