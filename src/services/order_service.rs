use std::collections::HashMap;

use chrono::Utc;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, FromQueryResult, JoinType,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    domain::order::{LineItem, OrderRecord, OrderState},
    dto::orders::{OrderList, OrderWithItems, PlaceOrderRequest, ShopOrderList},
    entity::{
        contacts::{Column as ContactCol, Entity as Contacts},
        order_items::{self, Column as OrderItemCol, Entity as OrderItems, Model as OrderItemModel},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        product_infos::{Column as InfoCol, Entity as ProductInfos},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_shop},
    models::{Order, OrderItem},
    notify::DomainEvent,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

#[derive(Debug, FromQueryResult)]
struct CartLineRow {
    product_info_id: Uuid,
    quantity: i32,
    price: i64,
    stock: i32,
}

/// Turn the caller's cart into a placed order.
///
/// Runs in one transaction holding locks on the cart row and on every
/// product info it references. `OrderPlaced` is emitted only after commit.
pub async fn place_order(
    state: &AppState,
    user: &AuthUser,
    payload: PlaceOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;

    let cart = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::State.eq(OrderState::Cart.as_str())),
        )
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let cart = match cart {
        Some(c) => c,
        None => return Err(AppError::BadRequest("Cart is empty".into())),
    };

    if let Some(contact_id) = payload.contact_id {
        let contact = Contacts::find_by_id(contact_id)
            .filter(ContactCol::UserId.eq(user.user_id))
            .one(&txn)
            .await?;
        if contact.is_none() {
            return Err(AppError::NotFound);
        }
    }

    let rows = OrderItems::find()
        .select_only()
        .column_as(OrderItemCol::ProductInfoId, "product_info_id")
        .column_as(OrderItemCol::Quantity, "quantity")
        .join(JoinType::InnerJoin, order_items::Relation::ProductInfos.def())
        .column_as(InfoCol::Price, "price")
        .column_as(InfoCol::Quantity, "stock")
        .filter(OrderItemCol::OrderId.eq(cart.id))
        .lock(LockType::Update)
        .into_model::<CartLineRow>()
        .all(&txn)
        .await?;

    let lines = rows
        .iter()
        .map(|row| LineItem {
            product_info_id: row.product_info_id,
            quantity: row.quantity,
            unit_price: row.price,
        })
        .collect();
    let record = OrderRecord::from_parts(
        cart.id,
        cart.user_id,
        &cart.state,
        cart.contact_id,
        cart.total_amount,
        None,
        lines,
    )?;
    let placed = record.into_cart()?.place(payload.contact_id, Utc::now())?;

    for row in &rows {
        if row.stock < row.quantity {
            return Err(AppError::BadRequest(format!(
                "Insufficient stock for product {}",
                row.product_info_id
            )));
        }
    }

    let mut active: OrderActive = cart.into();
    active.state = Set(OrderState::Placed.as_str().to_string());
    active.contact_id = Set(placed.contact_id);
    active.total_amount = Set(Some(placed.total_amount));
    active.placed_at = Set(Some(placed.placed_at.into()));
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    for line in &placed.items {
        // freeze the unit price the order was placed at
        OrderItems::update_many()
            .col_expr(OrderItemCol::Price, Expr::value(line.unit_price))
            .filter(OrderItemCol::OrderId.eq(order.id))
            .filter(OrderItemCol::ProductInfoId.eq(line.product_info_id))
            .exec(&txn)
            .await?;

        ProductInfos::update_many()
            .col_expr(InfoCol::Quantity, Expr::col(InfoCol::Quantity).sub(line.quantity))
            .filter(InfoCol::Id.eq(line.product_info_id))
            .exec(&txn)
            .await?;
    }

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(&txn)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "order_placed",
        "orders",
        serde_json::json!({ "order_id": order.id, "total_amount": placed.total_amount }),
    )
    .await;

    state
        .events
        .emit(DomainEvent::OrderPlaced {
            user_id: user.user_id,
            order_id: order.id,
            total_amount: placed.total_amount,
        })
        .await;

    Ok(ApiResponse::success(
        "Order placed",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_user_orders(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = pagination.normalize();
    let finder = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::State.eq(OrderState::Placed.as_str())),
        )
        .order_by_desc(OrderCol::PlacedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_user_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id))
                .add(OrderCol::State.eq(OrderState::Placed.as_str())),
        )
        .one(&state.orm)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

/// Placed orders that contain items sold by the caller's shops. Each order
/// carries only those items.
pub async fn list_shop_orders(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<ShopOrderList>> {
    ensure_shop(user)?;
    let (page, limit, offset) = pagination.normalize();

    let orders = sqlx::query_as::<_, Order>(
        r#"
        SELECT o.* FROM orders o
        WHERE o.state = 'placed' AND EXISTS (
            SELECT 1 FROM order_items oi
            JOIN product_infos pi ON pi.id = oi.product_info_id
            JOIN shops s ON s.id = pi.shop_id
            WHERE oi.order_id = o.id AND s.user_id = $1
        )
        ORDER BY o.placed_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user.user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(DISTINCT oi.order_id) FROM order_items oi
        JOIN orders o ON o.id = oi.order_id
        JOIN product_infos pi ON pi.id = oi.product_info_id
        JOIN shops s ON s.id = pi.shop_id
        WHERE o.state = 'placed' AND s.user_id = $1
        "#,
    )
    .bind(user.user_id)
    .fetch_one(&state.pool)
    .await?;

    let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let items = sqlx::query_as::<_, OrderItem>(
        r#"
        SELECT oi.* FROM order_items oi
        JOIN product_infos pi ON pi.id = oi.product_info_id
        JOIN shops s ON s.id = pi.shop_id
        WHERE oi.order_id = ANY($1) AND s.user_id = $2
        ORDER BY oi.created_at
        "#,
    )
    .bind(&order_ids)
    .bind(user.user_id)
    .fetch_all(&state.pool)
    .await?;

    let mut by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for item in items {
        by_order.entry(item.order_id).or_default().push(item);
    }

    let data = orders
        .into_iter()
        .map(|order| OrderWithItems {
            items: by_order.remove(&order.id).unwrap_or_default(),
            order,
        })
        .collect();

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success(
        "Shop orders",
        ShopOrderList { items: data },
        Some(meta),
    ))
}

fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        state: model.state,
        contact_id: model.contact_id,
        total_amount: model.total_amount,
        placed_at: model.placed_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_info_id: model.product_info_id,
        quantity: model.quantity,
        price: model.price,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
