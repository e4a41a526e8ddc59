use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use souq_api::{
    db::{create_orm_conn, create_pool},
    dto::auth::Claims,
    payments::{PaymentError, PaymentGateway, PaymentIntent},
    routes::create_api_router,
    state::AppState,
};
use tower::ServiceExt;
use uuid::Uuid;

struct NullGateway;

#[async_trait]
impl PaymentGateway for NullGateway {
    async fn create_intent(
        &self,
        _amount_minor: i64,
        _currency: &str,
        _user_id: Uuid,
    ) -> Result<PaymentIntent, PaymentError> {
        Err(PaymentError::Rejected("not expected in this test".into()))
    }
}

// Every admin-gated endpoint rejects anonymous and USER-role sessions
// with 401 before any handler logic runs.
#[tokio::test]
async fn admin_routes_reject_non_admin_sessions() -> anyhow::Result<()> {
    let database_url =
        match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
            Ok(url) => url,
            Err(_) => {
                eprintln!(
                    "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
                );
                return Ok(());
            }
        };

    if std::env::var("JWT_SECRET").is_err() {
        unsafe {
            std::env::set_var("JWT_SECRET", "integration-test-secret");
        }
    }

    let pool = create_pool(&database_url).await?;
    let orm = create_orm_conn(&database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let state = AppState {
        pool,
        orm,
        payments: Arc::new(NullGateway),
    };
    let app = Router::new()
        .nest("/api", create_api_router())
        .with_state(state);

    let user_token = mint_token("USER")?;

    let endpoints: Vec<(Method, String)> = vec![
        (Method::POST, "/api/products".into()),
        (Method::PUT, format!("/api/products/{}", Uuid::new_v4())),
        (Method::DELETE, format!("/api/products/{}", Uuid::new_v4())),
        (Method::POST, "/api/categories".into()),
        (Method::GET, "/api/admin/orders".into()),
        (Method::GET, format!("/api/admin/orders/{}", Uuid::new_v4())),
        (Method::PUT, format!("/api/admin/orders/{}", Uuid::new_v4())),
        (Method::GET, "/api/admin/users".into()),
    ];

    for (method, uri) in &endpoints {
        let anonymous = Request::builder()
            .method(method.clone())
            .uri(uri)
            .body(Body::empty())?;
        let response = app.clone().oneshot(anonymous).await?;
        assert_eq!(
            response.status(),
            StatusCode::UNAUTHORIZED,
            "{method} {uri} without a session"
        );

        let as_user = Request::builder()
            .method(method.clone())
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {user_token}"))
            .body(Body::empty())?;
        let response = app.clone().oneshot(as_user).await?;
        assert_eq!(
            response.status(),
            StatusCode::UNAUTHORIZED,
            "{method} {uri} with a USER session"
        );
    }

    // The same token is accepted when carried by the session cookie.
    let admin_token = mint_token("ADMIN")?;
    let via_cookie = Request::builder()
        .method(Method::GET)
        .uri("/api/admin/users")
        .header(header::COOKIE, format!("session={admin_token}"))
        .body(Body::empty())?;
    let response = app.clone().oneshot(via_cookie).await?;
    assert_eq!(response.status(), StatusCode::OK);

    Ok(())
}

fn mint_token(role: &str) -> anyhow::Result<String> {
    let secret = std::env::var("JWT_SECRET")?;
    let expiration = Utc::now() + Duration::hours(1);
    let claims = Claims {
        sub: Uuid::new_v4().to_string(),
        role: role.to_string(),
        exp: expiration.timestamp() as usize,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}
