use actix_web::{web, HttpResponse};
use serde_json::json;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[cfg(test)]
macro_rules! test_app {
    ($harness:expr) => {
        ::actix_web::test::init_service(
            ::actix_web::App::new()
                .app_data(::actix_web::web::Data::new($harness.service.clone()))
                .app_data(::actix_web::web::Data::new(
                    $crate::auth::AuthConfig::new($crate::auth::tests::SECRET, "admin"),
                ))
                .app_data(::actix_web::web::Data::new(
                    $crate::infrastructure::webhook::WebhookVerifier::new(
                        $crate::handlers::TEST_WEBHOOK_SECRET,
                    )
                    .unwrap(),
                ))
                .configure($crate::handlers::configure),
        )
        .await
    };
}

pub mod invoices;
pub mod payments;

#[cfg(test)]
pub(crate) const TEST_WEBHOOK_SECRET: &str = "whsec_test";

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        invoices::create_invoice,
        invoices::preview_invoice,
        invoices::list_invoices,
        invoices::get_invoice,
        invoices::replace_line_items,
        invoices::delete_invoice,
        invoices::send_invoice,
        invoices::payment_link,
        payments::pay_invoice,
        payments::payment_webhook,
    ),
    components(schemas(
        invoices::LineItemInput,
        invoices::DiscountInput,
        invoices::CreateInvoiceRequest,
        invoices::ReplaceLineItemsRequest,
        invoices::TotalsResponse,
        invoices::LineItemResponse,
        invoices::DiscountResponse,
        invoices::CreateInvoiceResponse,
        invoices::PreviewResponse,
        invoices::InvoiceResponse,
        invoices::ListInvoicesResponse,
        invoices::PaymentLinkResponse,
        payments::PayRequest,
        payments::PayResponse,
        payments::WebhookPayload,
        payments::SettlementResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "invoices", description = "Invoice composition and delivery"),
        (name = "payments", description = "Public payment and processor callbacks"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// GET /health
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up")),
    tag = "invoices"
)]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

/// Register every route. Shared by the server and the handler tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .service(
            web::scope("/invoices")
                .route("", web::post().to(invoices::create_invoice))
                .route("", web::get().to(invoices::list_invoices))
                .route("/preview", web::post().to(invoices::preview_invoice))
                .route("/{id}", web::get().to(invoices::get_invoice))
                .route("/{id}", web::delete().to(invoices::delete_invoice))
                .route(
                    "/{id}/line-items",
                    web::put().to(invoices::replace_line_items),
                )
                .route("/{id}/send", web::post().to(invoices::send_invoice))
                .route("/{id}/payment-link", web::get().to(invoices::payment_link)),
        )
        .route("/pay/{payment_token}", web::post().to(payments::pay_invoice))
        .route("/payments/webhook", web::post().to(payments::payment_webhook))
        .service(
            SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
        );
}
