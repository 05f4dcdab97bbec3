//! Client for the `send-invoice-email` backend function.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::ports::InvoiceMailer;

impl From<reqwest::Error> for DomainError {
    fn from(e: reqwest::Error) -> Self {
        DomainError::Remote(e.to_string())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendInvoiceEmailRequest {
    invoice_id: Uuid,
}

#[derive(Debug, Default, Deserialize)]
struct FunctionResponse {
    #[serde(default)]
    error: Option<String>,
}

#[derive(Clone)]
pub struct HttpInvoiceMailer {
    client: Client,
    functions_base_url: String,
    api_key: String,
}

impl HttpInvoiceMailer {
    pub fn new(client: Client, functions_base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            functions_base_url: functions_base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/send-invoice-email", self.functions_base_url)
    }
}

#[async_trait]
impl InvoiceMailer for HttpInvoiceMailer {
    async fn send_invoice_email(
        &self,
        invoice_id: Uuid,
        caller_token: &str,
    ) -> Result<(), DomainError> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(caller_token)
            .header("apikey", &self.api_key)
            .json(&SendInvoiceEmailRequest { invoice_id })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        log::debug!("send-invoice-email responded {}: {}", status, body);

        let parsed: FunctionResponse = serde_json::from_str(&body).unwrap_or_default();
        match (status.is_success(), parsed.error) {
            (true, None) => Ok(()),
            (_, Some(error)) => Err(DomainError::Remote(format!("send-invoice-email: {}", error))),
            (false, None) => Err(DomainError::Remote(format!(
                "send-invoice-email returned {}",
                status
            ))),
        }
    }
}
