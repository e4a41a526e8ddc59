use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use super::{PaymentError, PaymentGateway, PaymentIntent};

const DEFAULT_BASE_URL: &str = "https://api.stripe.com";

/// Stripe-backed gateway using the form-encoded payment_intents API.
pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: String,
    base_url: String,
}

impl StripeGateway {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key: secret_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the gateway at a different host. Used against stub servers.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct IntentBody {
    id: String,
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    error: GatewayErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorDetail {
    message: Option<String>,
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        user_id: Uuid,
    ) -> Result<PaymentIntent, PaymentError> {
        let params = [
            ("amount", amount_minor.to_string()),
            ("currency", currency.to_string()),
            ("metadata[user_id]", user_id.to_string()),
        ];

        let response = self
            .client
            .post(format!("{}/v1/payment_intents", self.base_url))
            .bearer_auth(&self.secret_key)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .json::<GatewayErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| status.to_string());
            return Err(PaymentError::Rejected(message));
        }

        let body: IntentBody = response.json().await?;
        let client_secret = body.client_secret.ok_or(PaymentError::Malformed)?;

        Ok(PaymentIntent {
            id: body.id,
            client_secret,
        })
    }
}
