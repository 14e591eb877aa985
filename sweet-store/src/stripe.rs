use async_trait::async_trait;
use serde::Deserialize;
use sweet_core::payment::{NewPaymentIntent, PaymentAdapter, PaymentIntent};
use sweet_core::{CoreError, CoreResult};
use tracing::{info, instrument, warn};

/// Payment intents over the processor's REST API.
#[derive(Clone)]
pub struct StripePaymentAdapter {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
    code: Option<String>,
}

impl StripePaymentAdapter {
    pub fn new(http: reqwest::Client, api_base: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        }
    }

    async fn read_intent(&self, response: reqwest::Response) -> CoreResult<PaymentIntent> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<PaymentIntent>()
                .await
                .map_err(|e| CoreError::ProviderError {
                    status: status.as_u16(),
                    message: format!("unreadable payment intent: {}", e),
                });
        }

        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<StripeErrorBody>(&body) {
            Ok(parsed) => {
                let text = parsed.error.message.unwrap_or_else(|| "unknown error".to_string());
                match parsed.error.code {
                    Some(code) => format!("{} ({})", text, code),
                    None => text,
                }
            }
            Err(_) => body,
        };
        warn!("Payment provider returned {}: {}", status, message);
        Err(CoreError::ProviderError {
            status: status.as_u16(),
            message,
        })
    }
}

fn transport_error(err: reqwest::Error) -> CoreError {
    CoreError::UpstreamUnavailable(format!("payment provider: {}", err))
}

fn is_valid_intent_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[async_trait]
impl PaymentAdapter for StripePaymentAdapter {
    #[instrument(skip(self, request), fields(order_number = %request.order_number))]
    async fn create_intent(&self, request: &NewPaymentIntent) -> CoreResult<PaymentIntent> {
        let mut form = vec![
            ("amount", request.amount.to_string()),
            ("currency", request.currency.to_lowercase()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
            ("metadata[order_id]", request.order_id.to_string()),
            ("metadata[order_number]", request.order_number.clone()),
        ];
        if let Some(email) = &request.receipt_email {
            form.push(("receipt_email", email.clone()));
        }

        let response = self
            .http
            .post(format!("{}/v1/payment_intents", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(transport_error)?;

        let intent = self.read_intent(response).await?;
        info!("Created payment intent {} for order {}", intent.id, request.order_number);
        Ok(intent)
    }

    #[instrument(skip(self))]
    async fn get_intent(&self, intent_id: &str) -> CoreResult<PaymentIntent> {
        if !is_valid_intent_id(intent_id) {
            return Err(CoreError::ValidationError(format!(
                "malformed payment intent id: {}",
                intent_id
            )));
        }

        let response = self
            .http
            .get(format!("{}/v1/payment_intents/{}", self.api_base, intent_id))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(transport_error)?;

        self.read_intent(response).await
    }
}
