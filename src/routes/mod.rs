use axum::{Router, routing::get};

use crate::state::AppState;

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod contacts;
pub mod health;
pub mod orders;
pub mod params;
pub mod profile;
pub mod shops;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .nest("/auth", auth::router())
        .nest("/profile", profile::router())
        .nest("/products", catalog::product_router())
        .nest("/categories", catalog::category_router())
        .nest("/cart", cart::router())
        .nest("/orders", orders::router())
        .nest("/contacts", contacts::router())
        .nest("/shops", shops::router())
}
