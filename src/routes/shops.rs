use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
};
use uuid::Uuid;

use crate::{
    dto::{
        catalog::{BulkPriceUpdateRequest, BulkPriceUpdateResult, ShopProductInfoList},
        orders::ShopOrderList,
        shops::{CreateShopRequest, ShopList, ShopStatusRequest, UpdateShopRequest},
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::Shop,
    response::ApiResponse,
    routes::params::Pagination,
    services::{catalog_service, order_service, shop_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_my_shops).post(create_shop))
        .route("/orders", get(list_shop_orders))
        .route("/{id}", put(update_shop))
        .route("/{id}/status", put(set_shop_status))
        .route("/{id}/products", get(list_shop_products))
        .route("/{id}/prices", put(bulk_update_prices))
}

pub async fn list_my_shops(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<ShopList>>> {
    let resp = shop_service::list_my_shops(&state, &user).await?;
    Ok(Json(resp))
}

pub async fn create_shop(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateShopRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Shop>>)> {
    let resp = shop_service::create_shop(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

pub async fn update_shop(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateShopRequest>,
) -> AppResult<Json<ApiResponse<Shop>>> {
    let resp = shop_service::update_shop(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

pub async fn set_shop_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ShopStatusRequest>,
) -> AppResult<Json<ApiResponse<Shop>>> {
    let resp = shop_service::set_shop_status(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

pub async fn list_shop_products(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ShopProductInfoList>>> {
    let resp = catalog_service::list_shop_product_infos(&state, id).await?;
    Ok(Json(resp))
}

pub async fn bulk_update_prices(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<BulkPriceUpdateRequest>,
) -> AppResult<Json<ApiResponse<BulkPriceUpdateResult>>> {
    let resp = catalog_service::bulk_update_prices(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

pub async fn list_shop_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<ShopOrderList>>> {
    let resp = order_service::list_shop_orders(&state, &user, pagination).await?;
    Ok(Json(resp))
}
