use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::application::invoice_service::{InvoiceService, ReviseRequest};
use crate::auth::AdminSession;
use crate::domain::calculator::Totals;
use crate::domain::composer::{ComposeRequest, LineItemRequest};
use crate::domain::errors::DomainError;
use crate::domain::invoice::{
    Discount, DiscountMode, InvoiceStatus, InvoiceView, LineItem, LineItemType, Recipient,
    RecipientType,
};
use crate::domain::money::{format_cents, parse_major_units};
use crate::errors::AppError;

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

// ── Request DTOs ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LineItemInput {
    #[serde(rename = "type")]
    pub item_type: LineItemType,
    pub service_package_id: Option<Uuid>,
    pub store_product_id: Option<Uuid>,
    /// Turns a `service_package` item into a booking-linked one.
    pub booking_id: Option<Uuid>,
    pub custom_description: Option<String>,
    /// Decimal price as a string, e.g. "150.00". Only read for custom items.
    pub custom_price: Option<String>,
    pub quantity: Option<i32>,
}

impl LineItemInput {
    fn into_request(self) -> Result<LineItemRequest, DomainError> {
        let custom_price = self
            .custom_price
            .as_deref()
            .map(parse_major_units)
            .transpose()?;
        Ok(LineItemRequest {
            item_type: self.item_type,
            service_package_id: self.service_package_id,
            store_product_id: self.store_product_id,
            booking_id: self.booking_id,
            custom_description: self.custom_description,
            custom_price,
            quantity: self.quantity,
        })
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DiscountInput {
    Flat {
        /// Decimal amount as a string, e.g. "25.00"
        amount: String,
    },
    Percentage {
        percentage: i32,
    },
}

impl DiscountInput {
    fn into_discount(self) -> Result<Discount, DomainError> {
        match self {
            DiscountInput::Flat { amount } => Ok(Discount::Flat(parse_major_units(&amount)?)),
            DiscountInput::Percentage { percentage } => Ok(Discount::Percentage(percentage)),
        }
    }
}

fn line_requests(items: Vec<LineItemInput>) -> Result<Vec<LineItemRequest>, DomainError> {
    items.into_iter().map(LineItemInput::into_request).collect()
}

fn discount_or_default(discount: Option<DiscountInput>) -> Result<Discount, DomainError> {
    discount
        .map(DiscountInput::into_discount)
        .transpose()
        .map(Option::unwrap_or_default)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateInvoiceRequest {
    pub recipient_type: Option<RecipientType>,
    pub recipient_id: Option<Uuid>,
    #[serde(default)]
    pub line_items: Vec<LineItemInput>,
    pub discount: Option<DiscountInput>,
    #[serde(default)]
    pub deposit_percentage: i32,
}

impl CreateInvoiceRequest {
    fn into_compose(self) -> Result<ComposeRequest, DomainError> {
        let recipient = match (self.recipient_type, self.recipient_id) {
            (Some(kind), Some(id)) => Some(Recipient::new(kind, id)),
            _ => None,
        };
        Ok(ComposeRequest {
            recipient,
            items: line_requests(self.line_items)?,
            discount: discount_or_default(self.discount)?,
            deposit_percentage: self.deposit_percentage,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReplaceLineItemsRequest {
    pub line_items: Vec<LineItemInput>,
    pub discount: Option<DiscountInput>,
    #[serde(default)]
    pub deposit_percentage: i32,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListInvoicesParams {
    /// Page number (1-based). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: i64,
    /// Number of items per page. Defaults to 20, maximum 100.
    #[serde(default = "default_limit")]
    pub limit: i64,
    /// One of `draft`, `sent`, `paid`.
    pub status: Option<String>,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    20
}

// ── Response DTOs ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, ToSchema)]
pub struct TotalsResponse {
    pub subtotal: String,
    pub discount: String,
    pub total: String,
    pub deposit: String,
    pub remaining_balance: String,
}

impl From<Totals> for TotalsResponse {
    fn from(t: Totals) -> Self {
        Self {
            subtotal: format_cents(t.subtotal),
            discount: format_cents(t.discount),
            total: format_cents(t.total),
            deposit: format_cents(t.deposit),
            remaining_balance: format_cents(t.remaining),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LineItemResponse {
    pub id: Option<Uuid>,
    pub position: i32,
    #[serde(rename = "type")]
    pub item_type: LineItemType,
    pub from_booking: bool,
    pub service_package_id: Option<Uuid>,
    pub store_product_id: Option<Uuid>,
    pub booking_id: Option<Uuid>,
    pub custom_description: Option<String>,
    pub custom_price: String,
    pub quantity: i32,
    pub line_total: String,
    pub vendor_id: Option<Uuid>,
    pub stripe_account_id: Option<String>,
}

impl LineItemResponse {
    fn build(id: Option<Uuid>, position: i32, item: &LineItem) -> Self {
        Self {
            id,
            position,
            item_type: item.item_type,
            from_booking: item.from_booking,
            service_package_id: item.service_package_id,
            store_product_id: item.store_product_id,
            booking_id: item.booking_id,
            custom_description: item.custom_description.clone(),
            custom_price: format_cents(item.custom_price),
            quantity: item.quantity,
            line_total: format_cents(item.line_total()),
            vendor_id: item.vendor_id,
            stripe_account_id: item.stripe_account_id.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DiscountResponse {
    pub mode: DiscountMode,
    pub amount: String,
    pub percentage: i32,
}

impl From<Discount> for DiscountResponse {
    fn from(d: Discount) -> Self {
        Self {
            mode: d.mode(),
            amount: format_cents(d.amount()),
            percentage: d.percentage(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PreviewResponse {
    pub line_items: Vec<LineItemResponse>,
    pub totals: TotalsResponse,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateInvoiceResponse {
    pub id: Uuid,
    pub payment_token: String,
    pub payment_link: String,
    pub totals: TotalsResponse,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InvoiceResponse {
    pub id: Uuid,
    pub recipient_type: RecipientType,
    pub recipient_id: Uuid,
    pub status: String,
    pub discount: DiscountResponse,
    pub deposit_percentage: i32,
    pub total_amount: String,
    pub deposit_amount: String,
    pub remaining_balance: String,
    pub payment_token: String,
    pub payment_link: String,
    pub created_at: String,
    pub updated_at: String,
    pub sent_at: Option<String>,
    pub paid_at: Option<String>,
    pub line_items: Vec<LineItemResponse>,
}

impl InvoiceResponse {
    fn build(view: InvoiceView, service: &InvoiceService) -> Self {
        Self {
            id: view.id,
            recipient_type: view.recipient.kind(),
            recipient_id: view.recipient.id(),
            status: view.status.to_string(),
            discount: view.discount.into(),
            deposit_percentage: view.deposit_percentage,
            total_amount: format_cents(view.total_amount),
            deposit_amount: format_cents(view.deposit_amount),
            remaining_balance: format_cents(view.remaining_balance),
            payment_link: service.payment_link(&view.payment_token),
            payment_token: view.payment_token,
            created_at: view.created_at.to_rfc3339(),
            updated_at: view.updated_at.to_rfc3339(),
            sent_at: view.sent_at.map(|t| t.to_rfc3339()),
            paid_at: view.paid_at.map(|t| t.to_rfc3339()),
            line_items: view
                .lines
                .iter()
                .map(|l| LineItemResponse::build(Some(l.id), l.position, &l.item))
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListInvoicesResponse {
    pub items: Vec<InvoiceResponse>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentLinkResponse {
    pub payment_link: String,
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /invoices
///
/// Prices are recomputed from the catalog; the invoice, its line items and
/// an `InvoiceCreated` outbox event commit together. A repeated
/// `Idempotency-Key` returns the invoice created the first time.
#[utoipa::path(
    post,
    path = "/invoices",
    request_body = CreateInvoiceRequest,
    params(
        ("Idempotency-Key" = Option<String>, Header, description = "Client-generated key for safe retries"),
    ),
    responses(
        (status = 201, description = "Invoice created", body = CreateInvoiceResponse),
        (status = 200, description = "Replay of an earlier create", body = CreateInvoiceResponse),
        (status = 422, description = "Invoice failed validation"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Caller is not an administrator"),
    ),
    security(("bearer_auth" = [])),
    tag = "invoices"
)]
pub async fn create_invoice(
    _admin: AdminSession,
    service: web::Data<InvoiceService>,
    req: HttpRequest,
    body: web::Json<CreateInvoiceRequest>,
) -> Result<HttpResponse, AppError> {
    let idempotency_key = req
        .headers()
        .get(IDEMPOTENCY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string);

    let compose = body.into_inner().into_compose()?;
    let created = service.create_invoice(compose, idempotency_key).await?;

    let response = CreateInvoiceResponse {
        id: created.id,
        payment_link: service.payment_link(&created.payment_token),
        payment_token: created.payment_token,
        totals: created.totals.into(),
    };
    if created.replayed {
        Ok(HttpResponse::Ok().json(response))
    } else {
        Ok(HttpResponse::Created().json(response))
    }
}

/// POST /invoices/preview
///
/// Runs the same composition and validation as create without persisting.
#[utoipa::path(
    post,
    path = "/invoices/preview",
    request_body = CreateInvoiceRequest,
    responses(
        (status = 200, description = "Computed line items and totals", body = PreviewResponse),
        (status = 422, description = "Invoice failed validation"),
    ),
    security(("bearer_auth" = [])),
    tag = "invoices"
)]
pub async fn preview_invoice(
    _admin: AdminSession,
    service: web::Data<InvoiceService>,
    body: web::Json<CreateInvoiceRequest>,
) -> Result<HttpResponse, AppError> {
    let compose = body.into_inner().into_compose()?;
    let preview = service.preview(compose).await?;

    Ok(HttpResponse::Ok().json(PreviewResponse {
        line_items: preview
            .items
            .iter()
            .zip(1..)
            .map(|(item, position)| LineItemResponse::build(None, position, item))
            .collect(),
        totals: preview.totals.into(),
    }))
}

/// GET /invoices
#[utoipa::path(
    get,
    path = "/invoices",
    params(ListInvoicesParams),
    responses(
        (status = 200, description = "Paginated list of invoices", body = ListInvoicesResponse),
        (status = 422, description = "Unknown status filter"),
    ),
    security(("bearer_auth" = [])),
    tag = "invoices"
)]
pub async fn list_invoices(
    _admin: AdminSession,
    service: web::Data<InvoiceService>,
    query: web::Query<ListInvoicesParams>,
) -> Result<HttpResponse, AppError> {
    let params = query.into_inner();
    let status = params
        .status
        .as_deref()
        .map(str::parse::<InvoiceStatus>)
        .transpose()?;

    let result = service
        .list_invoices(params.page, params.limit, status)
        .await?;

    Ok(HttpResponse::Ok().json(ListInvoicesResponse {
        items: result
            .items
            .into_iter()
            .map(|v| InvoiceResponse::build(v, &service))
            .collect(),
        total: result.total,
        page: result.page,
        limit: result.limit,
    }))
}

/// GET /invoices/{id}
#[utoipa::path(
    get,
    path = "/invoices/{id}",
    params(("id" = Uuid, Path, description = "Invoice UUID")),
    responses(
        (status = 200, description = "Invoice found", body = InvoiceResponse),
        (status = 404, description = "Invoice not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "invoices"
)]
pub async fn get_invoice(
    _admin: AdminSession,
    service: web::Data<InvoiceService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let view = service.get_invoice(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(InvoiceResponse::build(view, &service)))
}

/// PUT /invoices/{id}/line-items
///
/// Replaces the line items, discount and deposit of a draft and recomputes
/// every derived amount.
#[utoipa::path(
    put,
    path = "/invoices/{id}/line-items",
    params(("id" = Uuid, Path, description = "Invoice UUID")),
    request_body = ReplaceLineItemsRequest,
    responses(
        (status = 200, description = "Invoice revised", body = InvoiceResponse),
        (status = 404, description = "Invoice not found"),
        (status = 409, description = "Invoice is no longer a draft"),
        (status = 422, description = "Invoice failed validation"),
    ),
    security(("bearer_auth" = [])),
    tag = "invoices"
)]
pub async fn replace_line_items(
    _admin: AdminSession,
    service: web::Data<InvoiceService>,
    path: web::Path<Uuid>,
    body: web::Json<ReplaceLineItemsRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let request = ReviseRequest {
        items: line_requests(body.line_items)?,
        discount: discount_or_default(body.discount)?,
        deposit_percentage: body.deposit_percentage,
    };
    let view = service.revise_invoice(path.into_inner(), request).await?;
    Ok(HttpResponse::Ok().json(InvoiceResponse::build(view, &service)))
}

/// DELETE /invoices/{id}
#[utoipa::path(
    delete,
    path = "/invoices/{id}",
    params(("id" = Uuid, Path, description = "Invoice UUID")),
    responses(
        (status = 204, description = "Draft deleted"),
        (status = 404, description = "Invoice not found"),
        (status = 409, description = "Invoice is no longer a draft"),
    ),
    security(("bearer_auth" = [])),
    tag = "invoices"
)]
pub async fn delete_invoice(
    _admin: AdminSession,
    service: web::Data<InvoiceService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    service.delete_invoice(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// POST /invoices/{id}/send
///
/// Emails the invoice using the caller's own token, then marks it sent.
#[utoipa::path(
    post,
    path = "/invoices/{id}/send",
    params(("id" = Uuid, Path, description = "Invoice UUID")),
    responses(
        (status = 200, description = "Invoice sent", body = InvoiceResponse),
        (status = 404, description = "Invoice not found"),
        (status = 409, description = "Invoice already paid or a send is in progress"),
        (status = 502, description = "Email function failed"),
    ),
    security(("bearer_auth" = [])),
    tag = "invoices"
)]
pub async fn send_invoice(
    admin: AdminSession,
    service: web::Data<InvoiceService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let view = service.send_invoice(path.into_inner(), &admin.token).await?;
    Ok(HttpResponse::Ok().json(InvoiceResponse::build(view, &service)))
}

/// GET /invoices/{id}/payment-link
#[utoipa::path(
    get,
    path = "/invoices/{id}/payment-link",
    params(("id" = Uuid, Path, description = "Invoice UUID")),
    responses(
        (status = 200, description = "Public payment URL", body = PaymentLinkResponse),
        (status = 404, description = "Invoice not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "invoices"
)]
pub async fn payment_link(
    _admin: AdminSession,
    service: web::Data<InvoiceService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let payment_link = service.payment_link_for(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(PaymentLinkResponse { payment_link }))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use actix_web::http::{header, StatusCode};
    use actix_web::test;
    use serde_json::{json, Value};

    use super::*;
    use crate::auth::tests::{admin_token, token_with};
    use crate::test_utils::harness;

    fn bearer(token: &str) -> (header::HeaderName, String) {
        (header::AUTHORIZATION, format!("Bearer {}", token))
    }

    #[actix_web::test]
    async fn create_prices_package_from_catalog_and_applies_discount() {
        let h = harness();
        let couple = h.store.add_couple();
        let package = h.store.add_package("Full day", 15000);
        let app = test_app!(h);

        let req = test::TestRequest::post()
            .uri("/invoices")
            .insert_header(bearer(&admin_token()))
            .set_json(json!({
                "recipient_type": "couple",
                "recipient_id": couple,
                "line_items": [
                    { "type": "service_package", "service_package_id": package, "quantity": 1 },
                    { "type": "custom", "custom_description": "Travel", "custom_price": "25.00", "quantity": 2 }
                ],
                "discount": { "mode": "percentage", "percentage": 10 },
                "deposit_percentage": 20
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["totals"]["subtotal"], "200.00");
        assert_eq!(body["totals"]["discount"], "20.00");
        assert_eq!(body["totals"]["total"], "180.00");
        assert_eq!(body["totals"]["deposit"], "36.00");
        assert_eq!(body["totals"]["remaining_balance"], "144.00");
        let token = body["payment_token"].as_str().unwrap();
        assert_eq!(
            body["payment_link"],
            format!("https://app.example.com/invoice/{}", token)
        );
        assert_eq!(h.store.invoice_count(), 1);
    }

    #[actix_web::test]
    async fn repeated_idempotency_key_returns_first_invoice() {
        let h = harness();
        let couple = h.store.add_couple();
        let app = test_app!(h);
        let payload = json!({
            "recipient_type": "couple",
            "recipient_id": couple,
            "line_items": [
                { "type": "custom", "custom_description": "Officiant", "custom_price": "300" }
            ]
        });

        let first = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/invoices")
                .insert_header(bearer(&admin_token()))
                .insert_header((IDEMPOTENCY_HEADER, "submit-1"))
                .set_json(&payload)
                .to_request(),
        )
        .await;
        assert_eq!(first.status(), StatusCode::CREATED);
        let first: Value = test::read_body_json(first).await;

        let second = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/invoices")
                .insert_header(bearer(&admin_token()))
                .insert_header((IDEMPOTENCY_HEADER, "submit-1"))
                .set_json(&payload)
                .to_request(),
        )
        .await;
        assert_eq!(second.status(), StatusCode::OK);
        let second: Value = test::read_body_json(second).await;

        assert_eq!(first["id"], second["id"]);
        assert_eq!(second["totals"]["total"], "300.00");
        assert_eq!(h.store.invoice_count(), 1);
    }

    #[actix_web::test]
    async fn custom_item_without_description_is_unprocessable() {
        let h = harness();
        let couple = h.store.add_couple();
        let app = test_app!(h);

        let req = test::TestRequest::post()
            .uri("/invoices")
            .insert_header(bearer(&admin_token()))
            .set_json(json!({
                "recipient_type": "couple",
                "recipient_id": couple,
                "line_items": [{ "type": "custom", "custom_price": "10.00" }]
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("line item 1"));
        assert_eq!(h.store.invoice_count(), 0);
    }

    #[actix_web::test]
    async fn negative_flat_discount_is_rejected() {
        let h = harness();
        let couple = h.store.add_couple();
        let app = test_app!(h);

        let req = test::TestRequest::post()
            .uri("/invoices/preview")
            .insert_header(bearer(&admin_token()))
            .set_json(json!({
                "recipient_type": "couple",
                "recipient_id": couple,
                "line_items": [{ "type": "custom", "custom_description": "x", "custom_price": "10.00" }],
                "discount": { "mode": "flat", "amount": "-5" }
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[actix_web::test]
    async fn preview_does_not_persist() {
        let h = harness();
        let couple = h.store.add_couple();
        let product = h.store.add_product("Guest book", 4550);
        let app = test_app!(h);

        let req = test::TestRequest::post()
            .uri("/invoices/preview")
            .insert_header(bearer(&admin_token()))
            .set_json(json!({
                "recipient_type": "couple",
                "recipient_id": couple,
                "line_items": [{ "type": "store_product", "store_product_id": product, "quantity": 2 }],
                "discount": { "mode": "flat", "amount": "1.00" }
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["line_items"][0]["custom_price"], "45.50");
        assert_eq!(body["line_items"][0]["line_total"], "91.00");
        assert_eq!(body["totals"]["total"], "90.00");
        assert_eq!(h.store.invoice_count(), 0);
    }

    #[actix_web::test]
    async fn routes_require_admin_role() {
        let h = harness();
        let app = test_app!(h);

        let anonymous = test::call_service(
            &app,
            test::TestRequest::get().uri("/invoices").to_request(),
        )
        .await;
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

        let couple_token = token_with(Some("couple"), &[], chrono::Duration::minutes(5));
        let forbidden = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/invoices")
                .insert_header(bearer(&couple_token))
                .to_request(),
        )
        .await;
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn send_forwards_caller_token_and_marks_sent() {
        let h = harness();
        let couple = h.store.add_couple();
        let created = h
            .service
            .create_invoice(
                ComposeRequest {
                    recipient: Some(Recipient::Couple(couple)),
                    items: vec![LineItemRequest {
                        item_type: LineItemType::Custom,
                        service_package_id: None,
                        store_product_id: None,
                        booking_id: None,
                        custom_description: Some("Flowers".to_string()),
                        custom_price: Some(12000),
                        quantity: None,
                    }],
                    discount: Discount::default(),
                    deposit_percentage: 0,
                },
                None,
            )
            .await
            .unwrap();
        let app = test_app!(h);
        let token = admin_token();

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri(&format!("/invoices/{}/send", created.id))
                .insert_header(bearer(&token))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "sent");
        assert!(body["sent_at"].is_string());

        let sent = h.mailer.sent.lock().unwrap();
        assert_eq!(sent.as_slice(), &[(created.id, token)]);
    }

    #[actix_web::test]
    async fn failed_email_leaves_draft_and_reports_bad_gateway() {
        let h = harness();
        let couple = h.store.add_couple();
        let created = h
            .service
            .create_invoice(
                ComposeRequest {
                    recipient: Some(Recipient::Couple(couple)),
                    items: vec![LineItemRequest {
                        item_type: LineItemType::Custom,
                        service_package_id: None,
                        store_product_id: None,
                        booking_id: None,
                        custom_description: Some("DJ".to_string()),
                        custom_price: Some(50000),
                        quantity: None,
                    }],
                    discount: Discount::default(),
                    deposit_percentage: 0,
                },
                None,
            )
            .await
            .unwrap();
        h.mailer.fail.store(true, Ordering::SeqCst);
        let app = test_app!(h);

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri(&format!("/invoices/{}/send", created.id))
                .insert_header(bearer(&admin_token()))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

        let view = h.service.get_invoice(created.id).await.unwrap();
        assert_eq!(view.status, InvoiceStatus::Draft);
    }

    #[actix_web::test]
    async fn get_list_and_payment_link() {
        let h = harness();
        let couple = h.store.add_couple();
        let package = h.store.add_package("Photography", 250000);
        let app = test_app!(h);

        let created = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/invoices")
                .insert_header(bearer(&admin_token()))
                .set_json(json!({
                    "recipient_type": "couple",
                    "recipient_id": couple,
                    "line_items": [{ "type": "service_package", "service_package_id": package }]
                }))
                .to_request(),
        )
        .await;
        let created: Value = test::read_body_json(created).await;
        let id = created["id"].as_str().unwrap();

        let fetched = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&format!("/invoices/{}", id))
                .insert_header(bearer(&admin_token()))
                .to_request(),
        )
        .await;
        assert_eq!(fetched.status(), StatusCode::OK);
        let fetched: Value = test::read_body_json(fetched).await;
        assert_eq!(fetched["status"], "draft");
        assert_eq!(fetched["recipient_type"], "couple");
        assert_eq!(fetched["total_amount"], "2500.00");
        assert_eq!(fetched["line_items"][0]["position"], 1);

        let listed = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/invoices?status=draft&limit=500")
                .insert_header(bearer(&admin_token()))
                .to_request(),
        )
        .await;
        let listed: Value = test::read_body_json(listed).await;
        assert_eq!(listed["total"], 1);
        assert_eq!(listed["limit"], 100);

        let link = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&format!("/invoices/{}/payment-link", id))
                .insert_header(bearer(&admin_token()))
                .to_request(),
        )
        .await;
        let link: Value = test::read_body_json(link).await;
        assert_eq!(link["payment_link"], created["payment_link"]);
    }

    #[actix_web::test]
    async fn unknown_status_filter_is_unprocessable() {
        let h = harness();
        let app = test_app!(h);
        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/invoices?status=void")
                .insert_header(bearer(&admin_token()))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[actix_web::test]
    async fn only_drafts_can_be_revised_or_deleted() {
        let h = harness();
        let couple = h.store.add_couple();
        let app = test_app!(h);

        let created = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/invoices")
                .insert_header(bearer(&admin_token()))
                .set_json(json!({
                    "recipient_type": "couple",
                    "recipient_id": couple,
                    "line_items": [{ "type": "custom", "custom_description": "Cake", "custom_price": "400" }]
                }))
                .to_request(),
        )
        .await;
        let created: Value = test::read_body_json(created).await;
        let id: Uuid = created["id"].as_str().unwrap().parse().unwrap();

        let revised = test::call_service(
            &app,
            test::TestRequest::put()
                .uri(&format!("/invoices/{}/line-items", id))
                .insert_header(bearer(&admin_token()))
                .set_json(json!({
                    "line_items": [{ "type": "custom", "custom_description": "Cake", "custom_price": "450", "quantity": 2 }],
                    "deposit_percentage": 50
                }))
                .to_request(),
        )
        .await;
        assert_eq!(revised.status(), StatusCode::OK);
        let revised: Value = test::read_body_json(revised).await;
        assert_eq!(revised["total_amount"], "900.00");
        assert_eq!(revised["deposit_amount"], "450.00");

        h.store.set_status(id, InvoiceStatus::Sent);

        let frozen = test::call_service(
            &app,
            test::TestRequest::put()
                .uri(&format!("/invoices/{}/line-items", id))
                .insert_header(bearer(&admin_token()))
                .set_json(json!({
                    "line_items": [{ "type": "custom", "custom_description": "Cake", "custom_price": "1" }]
                }))
                .to_request(),
        )
        .await;
        assert_eq!(frozen.status(), StatusCode::CONFLICT);

        let delete = test::call_service(
            &app,
            test::TestRequest::delete()
                .uri(&format!("/invoices/{}", id))
                .insert_header(bearer(&admin_token()))
                .to_request(),
        )
        .await;
        assert_eq!(delete.status(), StatusCode::CONFLICT);
    }

    #[actix_web::test]
    async fn missing_invoice_is_not_found() {
        let h = harness();
        let app = test_app!(h);
        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&format!("/invoices/{}", Uuid::new_v4()))
                .insert_header(bearer(&admin_token()))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
