use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::Shop;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateShopRequest {
    #[validate(length(min = 1, max = 60))]
    pub name: String,
    #[validate(url)]
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateShopRequest {
    #[validate(length(min = 1, max = 60))]
    pub name: Option<String>,
    #[validate(url)]
    pub url: Option<String>,
}

impl CreateShopRequest {
    pub fn trimmed(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.url = self.url.map(|u| u.trim().to_string());
        self
    }
}

impl UpdateShopRequest {
    pub fn trimmed(mut self) -> Self {
        self.name = self.name.map(|n| n.trim().to_string());
        self.url = self.url.map(|u| u.trim().to_string());
        self
    }
}

#[derive(Debug, Deserialize)]
pub struct ShopStatusRequest {
    pub is_active: bool,
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct ShopList {
    pub items: Vec<Shop>,
}
