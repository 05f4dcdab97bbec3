use async_trait::async_trait;
use uuid::Uuid;

use super::errors::DomainError;
use super::invoice::{
    Booking, InvoiceRevision, InvoiceStatus, InvoiceView, ListResult, NewInvoice, Recipient,
    ServicePackage, Settlement, SettlementOutcome, StoreProduct,
};
use super::money::Cents;

pub trait InvoiceRepository: Send + Sync + 'static {
    /// Persist the invoice, its line items and the creation event as one unit.
    fn create(&self, invoice: NewInvoice) -> Result<Uuid, DomainError>;
    fn find_by_id(&self, id: Uuid) -> Result<Option<InvoiceView>, DomainError>;
    fn find_by_payment_token(&self, token: &str) -> Result<Option<InvoiceView>, DomainError>;
    fn find_by_idempotency_key(&self, key: &str) -> Result<Option<InvoiceView>, DomainError>;
    fn list(
        &self,
        page: i64,
        limit: i64,
        status: Option<InvoiceStatus>,
    ) -> Result<ListResult, DomainError>;
    /// Swap a draft's line items and derived totals. Fails unless still draft.
    fn replace_line_items(
        &self,
        id: Uuid,
        revision: InvoiceRevision,
    ) -> Result<InvoiceView, DomainError>;
    fn delete_draft(&self, id: Uuid) -> Result<(), DomainError>;
    fn mark_sent(&self, id: Uuid) -> Result<InvoiceView, DomainError>;
    fn record_settlement(&self, settlement: &Settlement) -> Result<SettlementOutcome, DomainError>;
}

/// Read-only lookups of the things a line item can point at.
pub trait Catalog: Send + Sync + 'static {
    fn service_package(&self, id: Uuid) -> Result<Option<ServicePackage>, DomainError>;
    fn store_product(&self, id: Uuid) -> Result<Option<StoreProduct>, DomainError>;
    fn booking(&self, id: Uuid) -> Result<Option<Booking>, DomainError>;
    fn recipient_exists(&self, recipient: Recipient) -> Result<bool, DomainError>;
}

#[async_trait]
pub trait InvoiceMailer: Send + Sync + 'static {
    /// Ask the backend to email the invoice, acting as the caller.
    async fn send_invoice_email(&self, invoice_id: Uuid, caller_token: &str)
        -> Result<(), DomainError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
    pub amount: Cents,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentConfirmation {
    pub intent_id: String,
    pub status: String,
    /// Amount charged, as quoted by the intent.
    pub amount: Cents,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    async fn create_intent(&self, payment_token: &str) -> Result<PaymentIntent, DomainError>;
    /// Returns `DomainError::PaymentFailed` when the processor declines.
    async fn confirm_intent(
        &self,
        intent: &PaymentIntent,
        payment_method: &str,
    ) -> Result<PaymentConfirmation, DomainError>;
}
