use anyhow::Context;
use axum_storefront_api::{
    db::{create_pool, run_migrations},
    services::auth_service::hash_password,
};
use chrono::{Duration, Utc};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;

    let pool = create_pool(&database_url).await?;
    run_migrations(&pool).await?;

    let admin_id = ensure_admin(&pool, "Store Admin", "admin@example.com", "admin123").await?;
    let user_id = ensure_user(
        &pool,
        "Demo User",
        "user@example.com",
        "+15550001111",
        "user123",
    )
    .await?;
    let category_id = ensure_category(&pool, "Merch").await?;
    seed_products(&pool, category_id).await?;
    seed_coupon(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

fn hash(password: &str) -> anyhow::Result<String> {
    hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))
}

async fn ensure_admin(
    pool: &sqlx::PgPool,
    name: &str,
    email: &str,
    password: &str,
) -> anyhow::Result<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO admins (id, name, email, password_hash)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(email)
    .bind(hash(password)?)
    .fetch_one(pool)
    .await?;

    println!("Ensured admin {email}");
    Ok(id)
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    name: &str,
    email: &str,
    phone: &str,
    password: &str,
) -> anyhow::Result<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, name, email, phone, password_hash)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(email)
    .bind(phone)
    .bind(hash(password)?)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email}");
    Ok(id)
}

async fn ensure_category(pool: &sqlx::PgPool, name: &str) -> anyhow::Result<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO categories (id, name)
        VALUES ($1, $2)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

async fn seed_products(pool: &sqlx::PgPool, category_id: Uuid) -> anyhow::Result<()> {
    let products = vec![
        ("Axum Hoodie", "Warm hoodie for Rustaceans", "Tokio", 5500, 50),
        ("Ferris Mug", "Coffee tastes better with Ferris", "Ferris", 1200, 100),
        ("Rust Sticker Pack", "Decorate your laptop", "Ferris", 500, 200),
        ("E-book: Async Rust", "Learn async Rust patterns", "Tokio", 2500, 75),
    ];

    for (name, desc, brand, price, stock) in products {
        sqlx::query(
            r#"
            INSERT INTO products (id, category_id, name, description, brand, price, stock)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(category_id)
        .bind(name)
        .bind(desc)
        .bind(brand)
        .bind(price as i64)
        .bind(stock as i32)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}

async fn seed_coupon(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO coupons
            (id, code, discount_percent, usage_limit, maximum_discount_price,
             minimum_purchase_price, expiry_date)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (code) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind("WELCOME10")
    .bind(0.10_f64)
    .bind(100_i32)
    .bind(2000_i64)
    .bind(5000_i64)
    .bind(Utc::now() + Duration::days(90))
    .execute(pool)
    .await?;

    println!("Seeded coupon WELCOME10");
    Ok(())
}
