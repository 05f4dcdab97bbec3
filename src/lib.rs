pub mod application;
pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod infrastructure;
pub mod schema;

#[cfg(test)]
mod test_utils;

use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::application::invoice_service::InvoiceService;
use crate::auth::AuthConfig;
use crate::config::AppConfig;
use crate::domain::payment_link::PaymentLinks;
use crate::infrastructure::invoice_repo::DieselInvoiceRepository;
use crate::infrastructure::mailer::HttpInvoiceMailer;
use crate::infrastructure::payments::HttpPaymentGateway;
use crate::infrastructure::webhook::WebhookVerifier;

pub use db::{create_pool, DbPool};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Run any pending Diesel migrations against the pool's database.
pub fn run_migrations(pool: &DbPool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut conn = pool.get()?;
    let applied = conn.run_pending_migrations(MIGRATIONS)?;
    log::info!("Applied {} pending migration(s)", applied.len());
    Ok(())
}

/// Everything the HTTP workers share.
#[derive(Clone)]
pub struct AppState {
    pub service: InvoiceService,
    pub auth: AuthConfig,
    pub webhook: WebhookVerifier,
}

impl AppState {
    /// Wire the Diesel store and the backend-function clients behind the
    /// invoice service.
    pub fn from_config(config: &AppConfig, pool: DbPool) -> std::io::Result<Self> {
        let repo = Arc::new(DieselInvoiceRepository::new(pool));
        let client = reqwest::Client::new();

        let service = InvoiceService::new(
            repo.clone(),
            repo,
            Arc::new(HttpInvoiceMailer::new(
                client.clone(),
                &config.functions_base_url,
                &config.service_api_key,
            )),
            Arc::new(HttpPaymentGateway::new(
                client,
                &config.functions_base_url,
                &config.service_api_key,
            )),
            PaymentLinks::new(&config.public_app_url, config.payment_link_style),
        );

        let webhook = WebhookVerifier::new(&config.payment_webhook_secret)
            .map_err(|e| std::io::Error::other(format!("PAYMENT_WEBHOOK_SECRET: {}", e)))?;

        Ok(Self {
            service,
            auth: AuthConfig::new(&config.admin_jwt_secret, &config.admin_role),
            webhook,
        })
    }
}

/// Build and return an actix-web `Server` bound to `host:port`.
///
/// The caller is responsible for `.await`-ing (or `tokio::spawn`-ing) the
/// returned server.
pub fn build_server(
    state: AppState,
    host: &str,
    port: u16,
) -> std::io::Result<actix_web::dev::Server> {
    Ok(HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.service.clone()))
            .app_data(web::Data::new(state.auth.clone()))
            .app_data(web::Data::new(state.webhook.clone()))
            .wrap(Logger::default())
            .configure(handlers::configure)
    })
    .bind((host.to_string(), port))?
    .run())
}
