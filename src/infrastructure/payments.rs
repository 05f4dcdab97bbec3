//! Payment processor access through the platform's backend functions.
//!
//! `create-payment-intent` turns an invoice payment token into a processor
//! intent (the backend decides the amount from the token); `confirm-payment`
//! confirms that intent with a tokenized card.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;
use crate::domain::ports::{PaymentConfirmation, PaymentGateway, PaymentIntent};

#[derive(Debug, Serialize)]
struct CreateIntentRequest<'a> {
    payment_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateIntentResponse {
    payment_intent_id: Option<String>,
    client_secret: Option<String>,
    #[serde(default)]
    amount: i64,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ConfirmRequest<'a> {
    payment_intent_id: &'a str,
    client_secret: &'a str,
    payment_method: &'a str,
}

#[derive(Debug, Deserialize)]
struct ConfirmResponse {
    status: Option<String>,
    error: Option<String>,
}

#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: Client,
    functions_base_url: String,
    api_key: String,
}

impl HttpPaymentGateway {
    pub fn new(client: Client, functions_base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            functions_base_url: functions_base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    async fn call<B: Serialize + ?Sized>(
        &self,
        function: &str,
        body: &B,
    ) -> Result<(reqwest::StatusCode, String), DomainError> {
        let response = self
            .client
            .post(format!("{}/{}", self.functions_base_url, function))
            .header("apikey", &self.api_key)
            .json(body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        log::debug!("{} responded {}: {}", function, status, text);
        Ok((status, text))
    }
}

fn parse<T: for<'de> Deserialize<'de>>(function: &str, body: &str) -> Result<T, DomainError> {
    serde_json::from_str(body)
        .map_err(|e| DomainError::Remote(format!("{} returned malformed JSON: {}", function, e)))
}

/// Statuses that mean the processor accepted the charge.
fn is_accepted(status: &str) -> bool {
    matches!(status, "succeeded" | "processing")
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_intent(&self, payment_token: &str) -> Result<PaymentIntent, DomainError> {
        let (status, body) = self
            .call("create-payment-intent", &CreateIntentRequest { payment_token })
            .await?;
        let parsed: CreateIntentResponse = parse("create-payment-intent", &body)?;

        if let Some(error) = parsed.error {
            return Err(DomainError::PaymentFailed(error));
        }
        if !status.is_success() {
            return Err(DomainError::Remote(format!(
                "create-payment-intent returned {}",
                status
            )));
        }
        match (parsed.payment_intent_id, parsed.client_secret) {
            (Some(id), Some(client_secret)) => Ok(PaymentIntent {
                id,
                client_secret,
                amount: parsed.amount,
            }),
            _ => Err(DomainError::Remote(
                "create-payment-intent response is missing the intent".to_string(),
            )),
        }
    }

    async fn confirm_intent(
        &self,
        intent: &PaymentIntent,
        payment_method: &str,
    ) -> Result<PaymentConfirmation, DomainError> {
        let (status, body) = self
            .call(
                "confirm-payment",
                &ConfirmRequest {
                    payment_intent_id: &intent.id,
                    client_secret: &intent.client_secret,
                    payment_method,
                },
            )
            .await?;
        let parsed: ConfirmResponse = parse("confirm-payment", &body)?;

        if let Some(error) = parsed.error {
            return Err(DomainError::PaymentFailed(error));
        }
        if !status.is_success() {
            return Err(DomainError::Remote(format!(
                "confirm-payment returned {}",
                status
            )));
        }
        match parsed.status {
            Some(s) if is_accepted(&s) => Ok(PaymentConfirmation {
                intent_id: intent.id.clone(),
                status: s,
                amount: intent.amount,
            }),
            Some(s) => Err(DomainError::PaymentFailed(format!("payment {}", s))),
            None => Err(DomainError::Remote(
                "confirm-payment response is missing a status".to_string(),
            )),
        }
    }
}
