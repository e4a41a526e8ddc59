use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::categories::{CategoryList, CategoryWithCount, CreateCategoryRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Category,
    response::{ApiResponse, Meta},
};

pub async fn list_categories(pool: &DbPool) -> AppResult<ApiResponse<CategoryList>> {
    let items = sqlx::query_as::<_, CategoryWithCount>(
        r#"
        SELECT c.id, c.name, c.name_ar, c.description, c.description_ar,
               c.image, c.slug, c.created_at,
               COUNT(p.id) AS product_count
        FROM categories c
        LEFT JOIN products p ON p.category_id = c.id
        GROUP BY c.id
        ORDER BY c.name ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(ApiResponse::success(
        "Categories",
        CategoryList { items },
        Some(Meta::empty()),
    ))
}

pub async fn create_category(
    pool: &DbPool,
    user: &AuthUser,
    payload: CreateCategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    let exist: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM categories WHERE slug = $1")
        .bind(payload.slug.as_str())
        .fetch_optional(pool)
        .await?;
    if exist.is_some() {
        return Err(AppError::BadRequest("Slug is already taken".into()));
    }

    let category: Category = sqlx::query_as(
        r#"
        INSERT INTO categories (id, name, name_ar, description, description_ar, image, slug)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(payload.name)
    .bind(payload.name_ar)
    .bind(payload.description)
    .bind(payload.description_ar)
    .bind(payload.image)
    .bind(payload.slug)
    .fetch_one(pool)
    .await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "category_create",
        Some("categories"),
        Some(serde_json::json!({ "category_id": category.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Category created",
        category,
        Some(Meta::empty()),
    ))
}
