use std::str::FromStr;

use uuid::Uuid;

use super::errors::DomainError;

/// Path segment used in links that have already gone out to recipients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaymentLinkStyle {
    /// `/invoice/<token>`
    #[default]
    Invoice,
    /// `/invoice-payment/<token>`
    InvoicePayment,
}

impl PaymentLinkStyle {
    fn segment(self) -> &'static str {
        match self {
            PaymentLinkStyle::Invoice => "invoice",
            PaymentLinkStyle::InvoicePayment => "invoice-payment",
        }
    }
}

impl FromStr for PaymentLinkStyle {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "invoice" => Ok(PaymentLinkStyle::Invoice),
            "invoice-payment" => Ok(PaymentLinkStyle::InvoicePayment),
            other => Err(DomainError::InvalidInput(format!(
                "Unknown payment link style '{}'",
                other
            ))),
        }
    }
}

/// Builds public payment URLs from an invoice's payment token.
#[derive(Debug, Clone)]
pub struct PaymentLinks {
    base_url: String,
    style: PaymentLinkStyle,
}

impl PaymentLinks {
    pub fn new(base_url: &str, style: PaymentLinkStyle) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            style,
        }
    }

    pub fn link_for(&self, payment_token: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.style.segment(), payment_token)
    }
}

/// Fresh opaque token for a new invoice.
pub fn generate_payment_token() -> String {
    Uuid::new_v4().simple().to_string()
}
