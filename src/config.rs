//! Environment-driven configuration.
//!
//! `.env` is loaded by `main` through `dotenvy` before [`AppConfig::from_env`]
//! runs, so local development only needs a `.env` file.

use std::env;
use std::str::FromStr;

use thiserror::Error;

use crate::domain::payment_link::PaymentLinkStyle;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{var} has an invalid value '{value}'")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub db_pool_size: u32,
    pub host: String,
    pub port: u16,
    /// Origin of the public site that serves payment pages.
    pub public_app_url: String,
    pub payment_link_style: PaymentLinkStyle,
    /// Root URL of the callable backend functions.
    pub functions_base_url: String,
    pub service_api_key: String,
    pub admin_jwt_secret: String,
    pub admin_role: String,
    pub payment_webhook_secret: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |var: &'static str| lookup(var).ok_or(ConfigError::Missing(var));
        let or_default = |var: &str, default: &str| lookup(var).unwrap_or_else(|| default.to_string());

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            db_pool_size: parsed("DB_POOL_SIZE", or_default("DB_POOL_SIZE", "10"))?,
            host: or_default("HOST", "0.0.0.0"),
            port: parsed("PORT", or_default("PORT", "8080"))?,
            public_app_url: or_default("PUBLIC_APP_URL", "http://localhost:3000"),
            payment_link_style: parsed(
                "PAYMENT_LINK_STYLE",
                or_default("PAYMENT_LINK_STYLE", "invoice"),
            )?,
            functions_base_url: required("FUNCTIONS_BASE_URL")?,
            service_api_key: or_default("SERVICE_API_KEY", ""),
            admin_jwt_secret: required("ADMIN_JWT_SECRET")?,
            admin_role: or_default("ADMIN_ROLE", "admin"),
            payment_webhook_secret: required("PAYMENT_WEBHOOK_SECRET")?,
        })
    }
}

fn parsed<T: FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Invalid { var, value })
}
