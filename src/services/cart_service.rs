use sqlx::PgConnection;
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit,
    db::DbPool,
    domain::order::{Cart, LineItem},
    dto::cart::{AddToCartRequest, CartDto, CartItemDto, MAX_LINE_QUANTITY},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::OrderItem,
    response::{ApiResponse, Meta},
    state::AppState,
};

const CART_LOCK_ATTEMPTS: usize = 3;

pub async fn get_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartDto>> {
    match load_cart(&state.pool, user.user_id).await? {
        Some(cart) => Ok(ApiResponse::success("OK", cart, Some(Meta::empty()))),
        None => Ok(ApiResponse::empty("Cart is empty")),
    }
}

/// The caller's cart with priced lines, or `None` when no cart exists.
pub async fn load_cart(pool: &DbPool, user_id: Uuid) -> AppResult<Option<CartDto>> {
    let cart: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM orders WHERE user_id = $1 AND state = 'cart'")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
    let Some((order_id,)) = cart else {
        return Ok(None);
    };

    let items = sqlx::query_as::<_, CartItemDto>(
        r#"
        SELECT oi.id, oi.product_info_id, pi.product_id, p.name AS product_name,
               pi.shop_id, s.name AS shop_name, oi.quantity, pi.price AS unit_price
        FROM order_items oi
        JOIN product_infos pi ON pi.id = oi.product_info_id
        JOIN products p ON p.id = pi.product_id
        JOIN shops s ON s.id = pi.shop_id
        WHERE oi.order_id = $1
        ORDER BY oi.created_at
        "#,
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;

    let priced = Cart {
        order_id,
        user_id,
        items: items
            .iter()
            .map(|item| LineItem {
                product_info_id: item.product_info_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect(),
    };
    let total = priced
        .total()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("cart total overflows")))?;

    Ok(Some(CartDto {
        order_id,
        items,
        total,
    }))
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<OrderItem>> {
    payload.validate()?;

    let mut txn = state.pool.begin().await?;

    // Holding the shop row in share mode keeps a concurrent status change
    // from landing before this line is written.
    let offer: Option<(bool,)> = sqlx::query_as(
        r#"
        SELECT s.is_active
        FROM product_infos pi
        JOIN shops s ON s.id = pi.shop_id
        WHERE pi.id = $1
        FOR SHARE OF s
        "#,
    )
    .bind(payload.product_info_id)
    .fetch_optional(&mut *txn)
    .await?;
    match offer {
        None => return Err(AppError::NotFound),
        Some((false,)) => {
            return Err(AppError::BadRequest(
                "shop is not accepting orders".to_string(),
            ));
        }
        Some((true,)) => {}
    }

    let cart_id = lock_or_create_cart(&mut txn, user.user_id).await?;

    // Combine with an existing line, refusing to grow past the per-line cap.
    let item: Option<OrderItem> = sqlx::query_as(
        r#"
        INSERT INTO order_items (order_id, product_info_id, quantity)
        VALUES ($1, $2, $3)
        ON CONFLICT (order_id, product_info_id)
        DO UPDATE SET quantity = order_items.quantity + EXCLUDED.quantity
        WHERE order_items.quantity + EXCLUDED.quantity <= $4
        RETURNING *
        "#,
    )
    .bind(cart_id)
    .bind(payload.product_info_id)
    .bind(payload.quantity)
    .bind(MAX_LINE_QUANTITY)
    .fetch_optional(&mut *txn)
    .await?;
    let item = item.ok_or_else(|| {
        AppError::BadRequest(format!(
            "quantity must not exceed {MAX_LINE_QUANTITY} per item"
        ))
    })?;

    sqlx::query("UPDATE orders SET updated_at = NOW() WHERE id = $1")
        .bind(cart_id)
        .execute(&mut *txn)
        .await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "cart_update",
        "order_items",
        serde_json::json!({
            "product_info_id": payload.product_info_id,
            "quantity": item.quantity,
        }),
    )
    .await;

    Ok(ApiResponse::success("Product added to cart", item, None))
}

pub async fn remove_from_cart(
    state: &AppState,
    user: &AuthUser,
    product_info_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let mut txn = state.pool.begin().await?;
    let cart: Option<(Uuid,)> = sqlx::query_as(
        "SELECT id FROM orders WHERE user_id = $1 AND state = 'cart' FOR UPDATE",
    )
    .bind(user.user_id)
    .fetch_optional(&mut *txn)
    .await?;
    let Some((cart_id,)) = cart else {
        return Err(AppError::NotFound);
    };

    let result =
        sqlx::query("DELETE FROM order_items WHERE order_id = $1 AND product_info_id = $2")
            .bind(cart_id)
            .bind(product_info_id)
            .execute(&mut *txn)
            .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "cart_remove",
        "order_items",
        serde_json::json!({ "product_info_id": product_info_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// Resolve the user's cart, creating it if needed, and hold its row lock
/// until the surrounding transaction ends.
///
/// The partial unique index on `orders (user_id) WHERE state = 'cart'` turns a
/// concurrent creation into a no-op. If the cart is placed between the insert
/// and the lock, the locked select finds nothing and the loop creates a fresh
/// cart.
async fn lock_or_create_cart(conn: &mut PgConnection, user_id: Uuid) -> AppResult<Uuid> {
    for _ in 0..CART_LOCK_ATTEMPTS {
        sqlx::query(
            r#"
            INSERT INTO orders (user_id, state)
            VALUES ($1, 'cart')
            ON CONFLICT (user_id) WHERE state = 'cart' DO NOTHING
            "#,
        )
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

        let cart: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM orders WHERE user_id = $1 AND state = 'cart' FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;
        if let Some((id,)) = cart {
            return Ok(id);
        }
    }

    Err(AppError::Internal(anyhow::anyhow!(
        "could not acquire cart for user {user_id}"
    )))
}
