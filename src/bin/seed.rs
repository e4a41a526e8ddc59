use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use rust_decimal::Decimal;
use souq_api::db::create_pool;
use std::str::FromStr;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL")?;

    let pool = create_pool(&database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let admin_id = ensure_user_with_role(&pool, "admin@example.com", "admin123", "ADMIN").await?;
    let user_id = ensure_user_with_role(&pool, "user@example.com", "user123", "USER").await?;
    seed_catalog(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user_with_role(
    pool: &sqlx::PgPool,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let row: (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, role)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(row.0)
}

async fn ensure_category(
    pool: &sqlx::PgPool,
    name: &str,
    name_ar: &str,
    slug: &str,
) -> anyhow::Result<Uuid> {
    let row: (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO categories (id, name, name_ar, slug)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (slug) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(name_ar)
    .bind(slug)
    .fetch_one(pool)
    .await?;

    Ok(row.0)
}

async fn seed_catalog(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let electronics = ensure_category(pool, "Electronics", "إلكترونيات", "electronics").await?;
    let grocery = ensure_category(pool, "Grocery", "بقالة", "grocery").await?;
    let lifestyle = ensure_category(pool, "Lifestyle", "نمط الحياة", "lifestyle").await?;

    let products = vec![
        (
            "Premium Coffee Beans",
            "حبوب القهوة المميزة",
            "High-quality Arabica coffee beans, freshly roasted.",
            "حبوب قهوة عربية عالية الجودة، محمصة حديثاً.",
            "89.99",
            50,
            true,
            grocery,
        ),
        (
            "Wireless Bluetooth Headphones",
            "سماعات لاسلكية بلوتوث",
            "Noise-canceling wireless headphones with long battery life.",
            "سماعات لاسلكية بإلغاء الضوضاء وعمر بطارية طويل.",
            "299.99",
            30,
            true,
            electronics,
        ),
        (
            "Smart Watch Series 9",
            "ساعة ذكية سلسلة 9",
            "Smartwatch with health monitoring, GPS, and fitness tracking.",
            "ساعة ذكية مع مراقبة الصحة ونظام تحديد المواقع وتتبع اللياقة.",
            "449.99",
            25,
            true,
            electronics,
        ),
        (
            "Organic Honey Jar",
            "عسل عضوي",
            "Pure organic honey from local beekeepers.",
            "عسل عضوي نقي من مربي النحل المحليين.",
            "45.99",
            100,
            false,
            grocery,
        ),
        (
            "Leather Wallet",
            "محفظة جلدية",
            "Genuine leather wallet with multiple card slots.",
            "محفظة جلدية أصلية مع عدة جيوب للبطاقات.",
            "79.99",
            60,
            false,
            lifestyle,
        ),
    ];

    for (name, name_ar, desc, desc_ar, price, stock, featured, category_id) in products {
        let exist: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE name = $1")
            .bind(name)
            .fetch_optional(pool)
            .await?;
        if exist.is_some() {
            continue;
        }

        sqlx::query(
            r#"
            INSERT INTO products
                (id, name, name_ar, description, description_ar, price, category_id, stock, featured)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(name_ar)
        .bind(desc)
        .bind(desc_ar)
        .bind(Decimal::from_str(price)?)
        .bind(category_id)
        .bind(stock)
        .bind(featured)
        .execute(pool)
        .await?;
    }

    println!("Seeded categories and products");
    Ok(())
}
