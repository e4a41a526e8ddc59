use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::users::{UpdateProfileRequest, UserProfile},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    response::{ApiResponse, Meta},
};

pub async fn get_profile(pool: &DbPool, user: &AuthUser) -> AppResult<ApiResponse<UserProfile>> {
    let profile: Option<UserProfile> =
        sqlx::query_as("SELECT id, email, name, role, created_at FROM users WHERE id = $1")
            .bind(user.user_id)
            .fetch_optional(pool)
            .await?;

    let profile = match profile {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    Ok(ApiResponse::success("OK", profile, None))
}

pub async fn update_profile(
    pool: &DbPool,
    user: &AuthUser,
    payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<UserProfile>> {
    if let Some(email) = payload.email.as_deref() {
        let taken: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM users WHERE email = $1 AND id <> $2")
                .bind(email)
                .bind(user.user_id)
                .fetch_optional(pool)
                .await?;
        if taken.is_some() {
            return Err(AppError::BadRequest("Email already in use".into()));
        }
    }

    let profile: Option<UserProfile> = sqlx::query_as(
        r#"
        UPDATE users
        SET name = COALESCE($2, name), email = COALESCE($3, email)
        WHERE id = $1
        RETURNING id, email, name, role, created_at
        "#,
    )
    .bind(user.user_id)
    .bind(payload.name)
    .bind(payload.email)
    .fetch_optional(pool)
    .await?;

    let profile = match profile {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "profile_update",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.user_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Profile updated",
        profile,
        Some(Meta::empty()),
    ))
}
