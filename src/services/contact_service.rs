use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit,
    dto::contacts::{ContactList, CreateContactRequest},
    entity::contacts::{ActiveModel, Column, Entity as Contacts, Model as ContactModel},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Contact,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub async fn list_contacts(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<ContactList>> {
    let items = Contacts::find()
        .filter(Column::UserId.eq(user.user_id))
        .order_by_asc(Column::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(contact_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Contacts",
        ContactList { items },
        Some(Meta::empty()),
    ))
}

pub async fn create_contact(
    state: &AppState,
    user: &AuthUser,
    payload: CreateContactRequest,
) -> AppResult<ApiResponse<Contact>> {
    payload.validate()?;

    let active = ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        city: Set(payload.city),
        street: Set(payload.street),
        house: Set(payload.house),
        structure: Set(payload.structure),
        building: Set(payload.building),
        apartment: Set(payload.apartment),
        phone: Set(payload.phone),
        created_at: NotSet,
    };
    let contact = active.insert(&state.orm).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "contact_create",
        "contacts",
        serde_json::json!({ "contact_id": contact.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Contact created",
        contact_from_entity(contact),
        Some(Meta::empty()),
    ))
}

pub async fn delete_contact(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = Contacts::delete_many()
        .filter(Column::Id.eq(id))
        .filter(Column::UserId.eq(user.user_id))
        .exec(&state.orm)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.pool,
        user.user_id,
        "contact_delete",
        "contacts",
        serde_json::json!({ "contact_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Contact deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

fn contact_from_entity(model: ContactModel) -> Contact {
    Contact {
        id: model.id,
        user_id: model.user_id,
        city: model.city,
        street: model.street,
        house: model.house,
        structure: model.structure,
        building: model.building,
        apartment: model.apartment,
        phone: model.phone,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
