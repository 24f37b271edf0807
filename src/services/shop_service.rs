use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit,
    dto::shops::{CreateShopRequest, ShopList, ShopStatusRequest, UpdateShopRequest},
    entity::shops::{ActiveModel, Column, Entity as Shops, Model as ShopModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_shop},
    models::Shop,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub async fn create_shop(
    state: &AppState,
    user: &AuthUser,
    payload: CreateShopRequest,
) -> AppResult<ApiResponse<Shop>> {
    ensure_shop(user)?;
    let payload = payload.trimmed();
    payload.validate()?;

    let active = ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        name: Set(payload.name),
        url: Set(payload.url),
        is_active: Set(true),
        created_at: NotSet,
    };
    let shop = active.insert(&state.orm).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "shop_create",
        "shops",
        serde_json::json!({ "shop_id": shop.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Shop created",
        shop_from_entity(shop),
        Some(Meta::empty()),
    ))
}

pub async fn update_shop(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateShopRequest,
) -> AppResult<ApiResponse<Shop>> {
    let payload = payload.trimmed();
    payload.validate()?;
    let existing = owned_shop(state, user, id).await?;

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(url) = payload.url {
        active.url = Set(Some(url));
    }
    let shop = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "shop_update",
        "shops",
        serde_json::json!({ "shop_id": shop.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Shop updated",
        shop_from_entity(shop),
        Some(Meta::empty()),
    ))
}

/// Toggle whether the shop accepts new cart additions. Existing carts keep
/// their lines.
pub async fn set_shop_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: ShopStatusRequest,
) -> AppResult<ApiResponse<Shop>> {
    let existing = owned_shop(state, user, id).await?;

    let mut active: ActiveModel = existing.into();
    active.is_active = Set(payload.is_active);
    let shop = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "shop_status",
        "shops",
        serde_json::json!({ "shop_id": shop.id, "is_active": shop.is_active }),
    )
    .await;

    Ok(ApiResponse::success(
        "Shop status updated",
        shop_from_entity(shop),
        Some(Meta::empty()),
    ))
}

pub async fn list_my_shops(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<ShopList>> {
    let items = Shops::find()
        .filter(Column::UserId.eq(user.user_id))
        .order_by_asc(Column::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(shop_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Shops",
        ShopList { items },
        Some(Meta::empty()),
    ))
}

// Another owner's shop reads as missing.
async fn owned_shop(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<ShopModel> {
    let shop = Shops::find_by_id(id)
        .filter(Column::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?;
    shop.ok_or(AppError::NotFound)
}

fn shop_from_entity(model: ShopModel) -> Shop {
    Shop {
        id: model.id,
        user_id: model.user_id,
        name: model.name,
        url: model.url,
        is_active: model.is_active,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
