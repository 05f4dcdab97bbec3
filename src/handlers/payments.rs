use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::invoice_service::InvoiceService;
use crate::domain::invoice::Settlement;
use crate::domain::money::format_cents;
use crate::errors::AppError;
use crate::infrastructure::webhook::WebhookVerifier;

pub const SIGNATURE_HEADER: &str = "X-Signature";

#[derive(Debug, Deserialize, ToSchema)]
pub struct PayRequest {
    /// Tokenized card from the processor's client SDK.
    pub payment_method: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PayResponse {
    pub payment_intent_id: String,
    pub status: String,
    /// Major units, e.g. "150.00".
    pub amount: String,
}

/// Processor callback. `amount` is in cents.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct WebhookPayload {
    pub payment_token: String,
    pub amount: i64,
    pub processor_reference: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SettlementResponse {
    pub invoice_id: Uuid,
    pub status: String,
    pub remaining_balance: String,
    pub duplicate: bool,
}

/// POST /pay/{payment_token}
///
/// Public: the payment token in the link is the only credential. The invoice
/// becomes `paid` once the processor's webhook settles it.
#[utoipa::path(
    post,
    path = "/pay/{payment_token}",
    params(("payment_token" = String, Path, description = "Token from the payment link")),
    request_body = PayRequest,
    responses(
        (status = 200, description = "Payment accepted by the processor", body = PayResponse),
        (status = 402, description = "Payment declined"),
        (status = 404, description = "Unknown payment token"),
        (status = 409, description = "Invoice not payable or a payment is in progress"),
        (status = 502, description = "Processor unreachable"),
    ),
    tag = "payments"
)]
pub async fn pay_invoice(
    service: web::Data<InvoiceService>,
    path: web::Path<String>,
    body: web::Json<PayRequest>,
) -> Result<HttpResponse, AppError> {
    let payment_method = body.into_inner().payment_method;
    if payment_method.trim().is_empty() {
        return Err(AppError::Validation(
            "payment_method must not be empty".to_string(),
        ));
    }

    let confirmation = service
        .pay_invoice(&path.into_inner(), payment_method.trim())
        .await?;

    Ok(HttpResponse::Ok().json(PayResponse {
        payment_intent_id: confirmation.intent_id,
        status: confirmation.status,
        amount: format_cents(confirmation.amount),
    }))
}

/// POST /payments/webhook
///
/// The raw body must carry a valid `X-Signature` HMAC. Replays of the same
/// `processor_reference` are acknowledged without being applied twice.
#[utoipa::path(
    post,
    path = "/payments/webhook",
    request_body = WebhookPayload,
    params(("X-Signature" = String, Header, description = "Hex HMAC-SHA256 of the body")),
    responses(
        (status = 200, description = "Settlement applied or acknowledged", body = SettlementResponse),
        (status = 401, description = "Missing or invalid signature"),
        (status = 404, description = "Unknown payment token"),
        (status = 409, description = "Invoice is not awaiting payment"),
        (status = 422, description = "Malformed payload"),
    ),
    tag = "payments"
)]
pub async fn payment_webhook(
    req: HttpRequest,
    body: web::Bytes,
    verifier: web::Data<WebhookVerifier>,
    service: web::Data<InvoiceService>,
) -> Result<HttpResponse, AppError> {
    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing webhook signature".to_string()))?;

    if !verifier.verify(&body, signature) {
        return Err(AppError::Unauthorized(
            "invalid webhook signature".to_string(),
        ));
    }

    let payload: WebhookPayload = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("Malformed webhook payload: {}", e)))?;

    let outcome = service
        .settle(Settlement {
            payment_token: payload.payment_token,
            amount: payload.amount,
            processor_reference: payload.processor_reference,
        })
        .await?;

    Ok(HttpResponse::Ok().json(SettlementResponse {
        invoice_id: outcome.invoice_id,
        status: outcome.status.to_string(),
        remaining_balance: format_cents(outcome.remaining_balance),
        duplicate: outcome.duplicate,
    }))
}
