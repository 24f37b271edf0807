use std::sync::Arc;

use shop_orders_api::{
    config::{AppConfig, MailConfig},
    db::{DbPool, create_pool, orm_from_pool},
    dto::{
        auth::{
            ConfirmEmailRequest, LoginRequest, PasswordResetConfirmRequest, PasswordResetRequest,
            RegisterRequest,
        },
        cart::{AddToCartRequest, MAX_LINE_QUANTITY},
        catalog::{BulkPriceUpdateRequest, PriceUpdateEntry},
        contacts::CreateContactRequest,
        orders::PlaceOrderRequest,
        shops::{CreateShopRequest, ShopStatusRequest, UpdateShopRequest},
    },
    error::AppError,
    middleware::auth::AuthUser,
    models::Role,
    notify::{EmailJob, MailQueue, notification_bus},
    routes::params::Pagination,
    services::{
        auth_service, cart_service, catalog_service, contact_service, order_service,
        shop_service, token_service,
    },
    state::AppState,
};
use tokio::sync::mpsc;
use uuid::Uuid;

struct Harness {
    state: AppState,
    outbox: mpsc::Receiver<EmailJob>,
}

impl Harness {
    fn next_email(&mut self) -> EmailJob {
        self.outbox.try_recv().expect("an email was queued")
    }
}

// Allow skipping when no DB is configured in the environment.
async fn harness() -> anyhow::Result<Option<Harness>> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(None);
        }
    };

    let pool = create_pool(&database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let (queue, outbox) = MailQueue::channel(64);
    let events = notification_bus(pool.clone(), queue, "shop@test.local");
    let state = AppState {
        orm: orm_from_pool(pool.clone()),
        pool,
        config: Arc::new(AppConfig {
            database_url,
            host: "127.0.0.1".to_string(),
            port: 0,
            jwt_secret: "flow-test-secret".to_string(),
            password_reset_ttl: chrono::Duration::minutes(30),
            mail: MailConfig::default(),
        }),
        events: Arc::new(events),
    };
    Ok(Some(Harness { state, outbox }))
}

fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@example.com", Uuid::new_v4().simple())
}

async fn active_user(pool: &DbPool, role: Role) -> anyhow::Result<AuthUser> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (email, username, password_hash, role, is_active)
        VALUES ($1, 'fixture', 'not-a-hash', $2, TRUE)
        RETURNING id
        "#,
    )
    .bind(unique_email(role.as_str()))
    .bind(role.as_str())
    .fetch_one(pool)
    .await?;
    Ok(AuthUser {
        user_id: id,
        role: role.as_str().to_string(),
    })
}

struct Catalog {
    shop_id: Uuid,
    owner: AuthUser,
    offer_id: Uuid,
    price: i64,
}

async fn catalog(pool: &DbPool, stock: i32, price: i64) -> anyhow::Result<Catalog> {
    let owner = active_user(pool, Role::Shop).await?;
    let (shop_id,): (Uuid,) =
        sqlx::query_as("INSERT INTO shops (user_id, name) VALUES ($1, 'Fixture Shop') RETURNING id")
            .bind(owner.user_id)
            .fetch_one(pool)
            .await?;
    let (category_id,): (Uuid,) =
        sqlx::query_as("INSERT INTO categories (name) VALUES ($1) RETURNING id")
            .bind(format!("Category {}", Uuid::new_v4()))
            .fetch_one(pool)
            .await?;
    let (product_id,): (Uuid,) =
        sqlx::query_as("INSERT INTO products (name, category_id) VALUES ($1, $2) RETURNING id")
            .bind(format!("Widget {}", Uuid::new_v4()))
            .bind(category_id)
            .fetch_one(pool)
            .await?;
    let (offer_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO product_infos (product_id, shop_id, quantity, price, price_rrc)
        VALUES ($1, $2, $3, $4, $4)
        RETURNING id
        "#,
    )
    .bind(product_id)
    .bind(shop_id)
    .bind(stock)
    .bind(price)
    .fetch_one(pool)
    .await?;

    Ok(Catalog {
        shop_id,
        owner,
        offer_id,
        price,
    })
}

fn add(product_info_id: Uuid, quantity: i32) -> AddToCartRequest {
    AddToCartRequest {
        product_info_id,
        quantity,
    }
}

#[tokio::test]
async fn register_confirm_login_and_place_order() -> anyhow::Result<()> {
    let Some(mut h) = harness().await? else {
        return Ok(());
    };
    let email = unique_email("buyer");
    let password = "correct-horse-battery";

    let registered = auth_service::register_user(
        &h.state,
        RegisterRequest {
            email: email.clone(),
            username: "buyer".into(),
            password: password.into(),
            role: Role::Buyer,
        },
    )
    .await?;
    let user = registered.data.expect("user");
    assert!(!user.is_active);

    let login = |password: &str| LoginRequest {
        email: email.clone(),
        password: password.to_string(),
    };
    let err = auth_service::login_user(&h.state, login(password))
        .await
        .err()
        .expect("inactive user cannot log in");
    assert!(matches!(err, AppError::Forbidden));

    let mail = h.next_email();
    assert_eq!(mail.to, email);
    assert_eq!(mail.body.len(), 64);

    auth_service::confirm_email(&h.state, ConfirmEmailRequest { key: mail.body.clone() }).await?;
    // redeeming the same key again is still a success
    auth_service::confirm_email(&h.state, ConfirmEmailRequest { key: mail.body }).await?;

    let err = auth_service::login_user(&h.state, login("wrong-password"))
        .await
        .err()
        .expect("bad password");
    assert!(matches!(err, AppError::Unauthorized(_)));

    let token = auth_service::login_user(&h.state, login(password))
        .await?
        .data
        .expect("token")
        .token;
    assert!(token.starts_with("Bearer "));

    let buyer = AuthUser {
        user_id: user.id,
        role: Role::Buyer.as_str().to_string(),
    };
    let shop = catalog(&h.state.pool, 10, 1500).await?;

    let empty = cart_service::get_cart(&h.state, &buyer).await?;
    assert!(empty.data.is_none());

    cart_service::add_to_cart(&h.state, &buyer, add(shop.offer_id, 2)).await?;
    let cart = cart_service::get_cart(&h.state, &buyer)
        .await?
        .data
        .expect("cart");
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 2);
    assert_eq!(cart.total, 2 * shop.price);

    let placed = order_service::place_order(&h.state, &buyer, PlaceOrderRequest::default())
        .await?
        .data
        .expect("order");
    assert_eq!(placed.order.state, "placed");
    assert_eq!(placed.order.total_amount, Some(2 * shop.price));
    assert!(placed.order.placed_at.is_some());
    assert_eq!(placed.items[0].price, Some(shop.price));

    let (stock,): (i32,) = sqlx::query_as("SELECT quantity FROM product_infos WHERE id = $1")
        .bind(shop.offer_id)
        .fetch_one(&h.state.pool)
        .await?;
    assert_eq!(stock, 8);

    let mail = h.next_email();
    assert_eq!(mail.subject, "Order status update");
    assert!(mail.body.contains(&placed.order.id.to_string()));

    let orders = order_service::list_user_orders(&h.state, &buyer, Pagination::default())
        .await?
        .data
        .expect("orders");
    assert_eq!(orders.items.len(), 1);
    assert_eq!(orders.items[0].state, "placed");

    assert!(cart_service::get_cart(&h.state, &buyer).await?.data.is_none());
    Ok(())
}

#[tokio::test]
async fn adding_the_same_offer_twice_combines_quantities() -> anyhow::Result<()> {
    let Some(h) = harness().await? else {
        return Ok(());
    };
    let buyer = active_user(&h.state.pool, Role::Buyer).await?;
    let shop = catalog(&h.state.pool, 100, 200).await?;

    cart_service::add_to_cart(&h.state, &buyer, add(shop.offer_id, 2)).await?;
    let line = cart_service::add_to_cart(&h.state, &buyer, add(shop.offer_id, 3))
        .await?
        .data
        .expect("line");
    assert_eq!(line.quantity, 5);

    let cart = cart_service::get_cart(&h.state, &buyer)
        .await?
        .data
        .expect("cart");
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.total, 5 * 200);
    Ok(())
}

#[tokio::test]
async fn removing_an_absent_line_is_not_found() -> anyhow::Result<()> {
    let Some(h) = harness().await? else {
        return Ok(());
    };
    let buyer = active_user(&h.state.pool, Role::Buyer).await?;
    let shop = catalog(&h.state.pool, 5, 100).await?;

    let err = cart_service::remove_from_cart(&h.state, &buyer, shop.offer_id)
        .await
        .err()
        .expect("no cart yet");
    assert!(matches!(err, AppError::NotFound));

    cart_service::add_to_cart(&h.state, &buyer, add(shop.offer_id, 1)).await?;
    let err = cart_service::remove_from_cart(&h.state, &buyer, Uuid::new_v4())
        .await
        .err()
        .expect("unknown line");
    assert!(matches!(err, AppError::NotFound));

    let cart = cart_service::get_cart(&h.state, &buyer)
        .await?
        .data
        .expect("cart");
    assert_eq!(cart.items.len(), 1);

    cart_service::remove_from_cart(&h.state, &buyer, shop.offer_id).await?;
    let cart = cart_service::get_cart(&h.state, &buyer)
        .await?
        .data
        .expect("cart row survives");
    assert!(cart.items.is_empty());
    Ok(())
}

#[tokio::test]
async fn concurrent_adds_share_one_cart() -> anyhow::Result<()> {
    let Some(h) = harness().await? else {
        return Ok(());
    };
    let buyer = active_user(&h.state.pool, Role::Buyer).await?;
    let shop = catalog(&h.state.pool, 100, 100).await?;

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..8 {
        let state = h.state.clone();
        let buyer = buyer.clone();
        let offer_id = shop.offer_id;
        tasks.spawn(async move { cart_service::add_to_cart(&state, &buyer, add(offer_id, 1)).await });
    }
    while let Some(joined) = tasks.join_next().await {
        joined??;
    }

    let (carts,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM orders WHERE user_id = $1 AND state = 'cart'")
            .bind(buyer.user_id)
            .fetch_one(&h.state.pool)
            .await?;
    assert_eq!(carts, 1);

    let cart = cart_service::get_cart(&h.state, &buyer)
        .await?
        .data
        .expect("cart");
    assert_eq!(cart.items[0].quantity, 8);
    Ok(())
}

#[tokio::test]
async fn placing_an_empty_cart_or_over_stock_fails() -> anyhow::Result<()> {
    let Some(h) = harness().await? else {
        return Ok(());
    };
    let buyer = active_user(&h.state.pool, Role::Buyer).await?;

    let err = order_service::place_order(&h.state, &buyer, PlaceOrderRequest::default())
        .await
        .err()
        .expect("no cart");
    assert!(matches!(err, AppError::BadRequest(_)));

    let shop = catalog(&h.state.pool, 1, 100).await?;
    cart_service::add_to_cart(&h.state, &buyer, add(shop.offer_id, 3)).await?;
    let err = order_service::place_order(&h.state, &buyer, PlaceOrderRequest::default())
        .await
        .err()
        .expect("not enough stock");
    assert!(matches!(err, AppError::BadRequest(_)));

    // the cart is left untouched
    let cart = cart_service::get_cart(&h.state, &buyer)
        .await?
        .data
        .expect("cart");
    assert_eq!(cart.items[0].quantity, 3);
    Ok(())
}

#[tokio::test]
async fn bulk_price_update_skips_foreign_offers_and_rejects_invalid_batches() -> anyhow::Result<()> {
    let Some(h) = harness().await? else {
        return Ok(());
    };
    let mine = catalog(&h.state.pool, 10, 1000).await?;
    let theirs = catalog(&h.state.pool, 10, 1000).await?;

    let entry = |id: Uuid, price: i64| PriceUpdateEntry {
        id,
        price: Some(price),
        price_rrc: None,
        quantity: None,
    };

    let result = catalog_service::bulk_update_prices(
        &h.state,
        &mine.owner,
        mine.shop_id,
        BulkPriceUpdateRequest {
            entries: vec![entry(mine.offer_id, 900), entry(theirs.offer_id, 1)],
        },
    )
    .await?
    .data
    .expect("result");
    assert_eq!(result.updated, vec![mine.offer_id]);
    assert_eq!(result.skipped, vec![theirs.offer_id]);

    let price_of = |id: Uuid| {
        let pool = h.state.pool.clone();
        async move {
            let (price,): (i64,) = sqlx::query_as("SELECT price FROM product_infos WHERE id = $1")
                .bind(id)
                .fetch_one(&pool)
                .await?;
            anyhow::Ok(price)
        }
    };
    assert_eq!(price_of(mine.offer_id).await?, 900);
    assert_eq!(price_of(theirs.offer_id).await?, 1000);

    let err = catalog_service::bulk_update_prices(
        &h.state,
        &mine.owner,
        mine.shop_id,
        BulkPriceUpdateRequest {
            entries: vec![entry(mine.offer_id, 500), entry(mine.offer_id, -1)],
        },
    )
    .await
    .err()
    .expect("negative price");
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(price_of(mine.offer_id).await?, 900);

    let err = catalog_service::bulk_update_prices(
        &h.state,
        &theirs.owner,
        mine.shop_id,
        BulkPriceUpdateRequest {
            entries: vec![entry(mine.offer_id, 1)],
        },
    )
    .await
    .err()
    .expect("not the owner");
    assert!(matches!(err, AppError::Forbidden));
    Ok(())
}

#[tokio::test]
async fn password_reset_key_works_once() -> anyhow::Result<()> {
    let Some(mut h) = harness().await? else {
        return Ok(());
    };
    let email = unique_email("reset");
    auth_service::register_user(
        &h.state,
        RegisterRequest {
            email: email.clone(),
            username: "reset".into(),
            password: "old-password-1".into(),
            role: Role::Buyer,
        },
    )
    .await?;
    let confirm = h.next_email();
    auth_service::confirm_email(&h.state, ConfirmEmailRequest { key: confirm.body }).await?;

    auth_service::request_password_reset(&h.state, PasswordResetRequest { email: email.clone() })
        .await?;
    let reset = h.next_email();
    assert!(reset.subject.starts_with("Password reset"));

    let confirm_reset = |key: String| PasswordResetConfirmRequest {
        key,
        password: "new-password-2".into(),
    };
    auth_service::confirm_password_reset(&h.state, confirm_reset(reset.body.clone())).await?;
    let err = auth_service::confirm_password_reset(&h.state, confirm_reset(reset.body))
        .await
        .err()
        .expect("key already used");
    assert!(matches!(err, AppError::NotFound));

    auth_service::login_user(
        &h.state,
        LoginRequest {
            email,
            password: "new-password-2".into(),
        },
    )
    .await?;

    // unknown emails get the same answer and no mail
    auth_service::request_password_reset(
        &h.state,
        PasswordResetRequest {
            email: unique_email("nobody"),
        },
    )
    .await?;
    assert!(h.outbox.try_recv().is_err());
    Ok(())
}

fn contact_request() -> CreateContactRequest {
    CreateContactRequest {
        city: "Berlin".into(),
        street: "Ferrisstrasse".into(),
        house: "7".into(),
        structure: None,
        building: None,
        apartment: Some("12".into()),
        phone: "+49301234567".into(),
    }
}

#[tokio::test]
async fn issuing_a_confirmation_token_twice_returns_the_same_key() -> anyhow::Result<()> {
    let Some(h) = harness().await? else {
        return Ok(());
    };
    let user = active_user(&h.state.pool, Role::Buyer).await?;

    let first = token_service::issue(&h.state.pool, user.user_id).await?;
    let second = token_service::issue(&h.state.pool, user.user_id).await?;
    assert_eq!(first.key, second.key);
    assert_eq!(first.key.len(), 64);
    Ok(())
}

#[tokio::test]
async fn inactive_shop_refuses_new_cart_lines() -> anyhow::Result<()> {
    let Some(h) = harness().await? else {
        return Ok(());
    };
    let buyer = active_user(&h.state.pool, Role::Buyer).await?;
    let shop = catalog(&h.state.pool, 10, 100).await?;

    shop_service::set_shop_status(
        &h.state,
        &shop.owner,
        shop.shop_id,
        ShopStatusRequest { is_active: false },
    )
    .await?;

    let err = cart_service::add_to_cart(&h.state, &buyer, add(shop.offer_id, 1))
        .await
        .err()
        .expect("shop is closed");
    assert!(matches!(err, AppError::BadRequest(_)));
    assert!(cart_service::get_cart(&h.state, &buyer).await?.data.is_none());

    let err = cart_service::add_to_cart(&h.state, &buyer, add(Uuid::new_v4(), 1))
        .await
        .err()
        .expect("unknown offer");
    assert!(matches!(err, AppError::NotFound));
    Ok(())
}

#[tokio::test]
async fn combined_quantity_is_capped_per_line() -> anyhow::Result<()> {
    let Some(h) = harness().await? else {
        return Ok(());
    };
    let buyer = active_user(&h.state.pool, Role::Buyer).await?;
    let shop = catalog(&h.state.pool, 10, 100).await?;

    let err = cart_service::add_to_cart(&h.state, &buyer, add(shop.offer_id, MAX_LINE_QUANTITY + 1))
        .await
        .err()
        .expect("over the cap in one go");
    assert!(matches!(err, AppError::Validation(_)));

    cart_service::add_to_cart(&h.state, &buyer, add(shop.offer_id, MAX_LINE_QUANTITY - 1)).await?;
    let err = cart_service::add_to_cart(&h.state, &buyer, add(shop.offer_id, 2))
        .await
        .err()
        .expect("over the cap when combined");
    assert!(matches!(err, AppError::BadRequest(_)));

    let cart = cart_service::get_cart(&h.state, &buyer)
        .await?
        .data
        .expect("cart");
    assert_eq!(cart.items[0].quantity, MAX_LINE_QUANTITY - 1);
    Ok(())
}

#[tokio::test]
async fn placing_with_someone_elses_contact_is_not_found() -> anyhow::Result<()> {
    let Some(h) = harness().await? else {
        return Ok(());
    };
    let buyer = active_user(&h.state.pool, Role::Buyer).await?;
    let other = active_user(&h.state.pool, Role::Buyer).await?;
    let shop = catalog(&h.state.pool, 10, 100).await?;

    let foreign = contact_service::create_contact(&h.state, &other, contact_request())
        .await?
        .data
        .expect("contact");
    let mine = contact_service::create_contact(&h.state, &buyer, contact_request())
        .await?
        .data
        .expect("contact");

    cart_service::add_to_cart(&h.state, &buyer, add(shop.offer_id, 1)).await?;
    let err = order_service::place_order(
        &h.state,
        &buyer,
        PlaceOrderRequest {
            contact_id: Some(foreign.id),
        },
    )
    .await
    .err()
    .expect("contact of another user");
    assert!(matches!(err, AppError::NotFound));

    let placed = order_service::place_order(
        &h.state,
        &buyer,
        PlaceOrderRequest {
            contact_id: Some(mine.id),
        },
    )
    .await?
    .data
    .expect("order");
    assert_eq!(placed.order.contact_id, Some(mine.id));
    Ok(())
}

#[tokio::test]
async fn shop_orders_show_only_the_callers_lines() -> anyhow::Result<()> {
    let Some(h) = harness().await? else {
        return Ok(());
    };
    let buyer = active_user(&h.state.pool, Role::Buyer).await?;
    let first = catalog(&h.state.pool, 10, 100).await?;
    let second = catalog(&h.state.pool, 10, 300).await?;

    cart_service::add_to_cart(&h.state, &buyer, add(first.offer_id, 1)).await?;
    cart_service::add_to_cart(&h.state, &buyer, add(second.offer_id, 2)).await?;
    let placed = order_service::place_order(&h.state, &buyer, PlaceOrderRequest::default())
        .await?
        .data
        .expect("order");
    assert_eq!(placed.items.len(), 2);

    let seen = order_service::list_shop_orders(&h.state, &first.owner, Pagination::default())
        .await?
        .data
        .expect("shop orders");
    assert_eq!(seen.items.len(), 1);
    assert_eq!(seen.items[0].order.id, placed.order.id);
    assert_eq!(seen.items[0].items.len(), 1);
    assert_eq!(seen.items[0].items[0].product_info_id, first.offer_id);

    let err = order_service::list_shop_orders(&h.state, &buyer, Pagination::default())
        .await
        .err()
        .expect("buyers have no shop orders");
    assert!(matches!(err, AppError::Forbidden));
    Ok(())
}

#[tokio::test]
async fn shops_are_managed_by_their_owner_only() -> anyhow::Result<()> {
    let Some(h) = harness().await? else {
        return Ok(());
    };
    let buyer = active_user(&h.state.pool, Role::Buyer).await?;
    let owner = active_user(&h.state.pool, Role::Shop).await?;
    let rival = active_user(&h.state.pool, Role::Shop).await?;

    let request = || CreateShopRequest {
        name: "Ferris Electronics".into(),
        url: Some("https://ferris.example.com".into()),
    };
    let err = shop_service::create_shop(&h.state, &buyer, request())
        .await
        .err()
        .expect("buyers cannot open shops");
    assert!(matches!(err, AppError::Forbidden));

    let shop = shop_service::create_shop(&h.state, &owner, request())
        .await?
        .data
        .expect("shop");
    assert!(shop.is_active);

    let rename = || UpdateShopRequest {
        name: Some("Ferris Outlet".into()),
        url: None,
    };
    let err = shop_service::update_shop(&h.state, &rival, shop.id, rename())
        .await
        .err()
        .expect("not the owner");
    assert!(matches!(err, AppError::NotFound));
    let err = shop_service::set_shop_status(
        &h.state,
        &rival,
        shop.id,
        ShopStatusRequest { is_active: false },
    )
    .await
    .err()
    .expect("not the owner");
    assert!(matches!(err, AppError::NotFound));

    let renamed = shop_service::update_shop(&h.state, &owner, shop.id, rename())
        .await?
        .data
        .expect("shop");
    assert_eq!(renamed.name, "Ferris Outlet");
    assert_eq!(renamed.url.as_deref(), Some("https://ferris.example.com"));

    let closed = shop_service::set_shop_status(
        &h.state,
        &owner,
        shop.id,
        ShopStatusRequest { is_active: false },
    )
    .await?
    .data
    .expect("shop");
    assert!(!closed.is_active);

    let listed = shop_service::list_my_shops(&h.state, &owner)
        .await?
        .data
        .expect("shops");
    assert_eq!(listed.items.len(), 1);
    assert!(
        shop_service::list_my_shops(&h.state, &rival)
            .await?
            .data
            .expect("shops")
            .items
            .is_empty()
    );
    Ok(())
}

#[tokio::test]
async fn contacts_are_deleted_by_their_owner_only() -> anyhow::Result<()> {
    let Some(h) = harness().await? else {
        return Ok(());
    };
    let owner = active_user(&h.state.pool, Role::Buyer).await?;
    let other = active_user(&h.state.pool, Role::Buyer).await?;

    let contact = contact_service::create_contact(&h.state, &owner, contact_request())
        .await?
        .data
        .expect("contact");

    let err = contact_service::delete_contact(&h.state, &other, contact.id)
        .await
        .err()
        .expect("not the owner");
    assert!(matches!(err, AppError::NotFound));
    let listed = contact_service::list_contacts(&h.state, &owner)
        .await?
        .data
        .expect("contacts");
    assert_eq!(listed.items.len(), 1);

    contact_service::delete_contact(&h.state, &owner, contact.id).await?;
    let listed = contact_service::list_contacts(&h.state, &owner)
        .await?
        .data
        .expect("contacts");
    assert!(listed.items.is_empty());
    Ok(())
}

#[tokio::test]
async fn offers_in_placed_orders_cannot_be_deleted() -> anyhow::Result<()> {
    let Some(h) = harness().await? else {
        return Ok(());
    };
    let buyer = active_user(&h.state.pool, Role::Buyer).await?;
    let shop = catalog(&h.state.pool, 10, 100).await?;

    cart_service::add_to_cart(&h.state, &buyer, add(shop.offer_id, 1)).await?;
    let placed = order_service::place_order(&h.state, &buyer, PlaceOrderRequest::default())
        .await?
        .data
        .expect("order");

    let deleted = sqlx::query("DELETE FROM product_infos WHERE id = $1")
        .bind(shop.offer_id)
        .execute(&h.state.pool)
        .await;
    let err = deleted.err().expect("offer is referenced by an order line");
    assert!(
        err.as_database_error()
            .is_some_and(|db| db.is_foreign_key_violation())
    );

    let order = order_service::get_user_order(&h.state, &buyer, placed.order.id)
        .await?
        .data
        .expect("order");
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.order.total_amount, Some(100));
    Ok(())
}
