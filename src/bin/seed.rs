use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use shop_orders_api::{config::AppConfig, db::create_pool};
use sqlx::PgPool;
use uuid::Uuid;

struct Offer {
    category: &'static str,
    product: &'static str,
    model: &'static str,
    external_id: i64,
    quantity: i32,
    price: i64,
    price_rrc: i64,
    parameters: &'static [(&'static str, &'static str)],
}

const OFFERS: &[Offer] = &[
    Offer {
        category: "Smartphones",
        product: "Ferris Phone 12",
        model: "fp-12/128",
        external_id: 4216292,
        quantity: 14,
        price: 110_000,
        price_rrc: 116_990,
        parameters: &[("Storage", "128 GB"), ("Color", "orange")],
    },
    Offer {
        category: "Smartphones",
        product: "Crab Mini",
        model: "cm-2/64",
        external_id: 4216313,
        quantity: 9,
        price: 65_000,
        price_rrc: 69_990,
        parameters: &[("Storage", "64 GB"), ("Color", "red")],
    },
    Offer {
        category: "Accessories",
        product: "USB-C Cable 1m",
        model: "usbc-1",
        external_id: 4672670,
        quantity: 250,
        price: 900,
        price_rrc: 1_290,
        parameters: &[("Length", "1 m")],
    },
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let shop_user = ensure_user(&pool, "shop@example.com", "shop12345", "shop").await?;
    let buyer = ensure_user(&pool, "buyer@example.com", "buyer12345", "buyer").await?;
    let shop_id = ensure_shop(&pool, shop_user, "Ferris Electronics").await?;
    seed_catalog(&pool, shop_id).await?;

    println!("Seed completed. Shop ID: {shop_id}, Buyer ID: {buyer}");
    Ok(())
}

// Seeded accounts skip email confirmation.
async fn ensure_user(pool: &PgPool, email: &str, password: &str, role: &str) -> anyhow::Result<Uuid> {
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, username, password_hash, role, is_active)
        VALUES ($1, $2, $3, $4, $5, TRUE)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role, is_active = TRUE
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(email.split('@').next().unwrap_or(email))
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn ensure_shop(pool: &PgPool, user_id: Uuid, name: &str) -> anyhow::Result<Uuid> {
    let existing: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM shops WHERE user_id = $1 AND name = $2")
            .bind(user_id)
            .bind(name)
            .fetch_optional(pool)
            .await?;
    if let Some((id,)) = existing {
        return Ok(id);
    }

    let (id,): (Uuid,) =
        sqlx::query_as("INSERT INTO shops (user_id, name) VALUES ($1, $2) RETURNING id")
            .bind(user_id)
            .bind(name)
            .fetch_one(pool)
            .await?;
    println!("Created shop {name}");
    Ok(id)
}

async fn seed_catalog(pool: &PgPool, shop_id: Uuid) -> anyhow::Result<()> {
    for offer in OFFERS {
        let (category_id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO categories (name) VALUES ($1)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(offer.category)
        .fetch_one(pool)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO category_shops (category_id, shop_id) VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(category_id)
        .bind(shop_id)
        .execute(pool)
        .await?;

        let (product_id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO products (name, category_id) VALUES ($1, $2)
            ON CONFLICT (name, category_id) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(offer.product)
        .bind(category_id)
        .fetch_one(pool)
        .await?;

        let (info_id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO product_infos (product_id, shop_id, model, external_id, quantity, price, price_rrc)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (product_id, shop_id) DO UPDATE
            SET quantity = EXCLUDED.quantity, price = EXCLUDED.price, price_rrc = EXCLUDED.price_rrc
            RETURNING id
            "#,
        )
        .bind(product_id)
        .bind(shop_id)
        .bind(offer.model)
        .bind(offer.external_id)
        .bind(offer.quantity)
        .bind(offer.price)
        .bind(offer.price_rrc)
        .fetch_one(pool)
        .await?;

        for (name, value) in offer.parameters {
            let (parameter_id,): (Uuid,) = sqlx::query_as(
                r#"
                INSERT INTO parameters (name) VALUES ($1)
                ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
                RETURNING id
                "#,
            )
            .bind(*name)
            .fetch_one(pool)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO product_parameters (product_info_id, parameter_id, value)
                VALUES ($1, $2, $3)
                ON CONFLICT (product_info_id, parameter_id) DO UPDATE SET value = EXCLUDED.value
                "#,
            )
            .bind(info_id)
            .bind(parameter_id)
            .bind(*value)
            .execute(pool)
            .await?;
        }
    }

    println!("Seeded {} offers", OFFERS.len());
    Ok(())
}
