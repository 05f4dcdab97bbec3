use std::sync::Arc;

use dashmap::DashSet;
use uuid::Uuid;

use crate::domain::calculator::Totals;
use crate::domain::composer::{ComposeRequest, InvoiceComposer, LineItemRequest};
use crate::domain::errors::{DomainError, ValidationError};
use crate::domain::invoice::{
    Discount, InvoiceRevision, InvoiceStatus, InvoiceView, LineItem, ListResult, NewInvoice,
    Settlement, SettlementOutcome,
};
use crate::domain::payment_link::{generate_payment_token, PaymentLinks};
use crate::domain::ports::{
    Catalog, InvoiceMailer, InvoiceRepository, PaymentConfirmation, PaymentGateway,
};

const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone)]
pub struct Preview {
    pub items: Vec<LineItem>,
    pub totals: Totals,
}

#[derive(Debug, Clone)]
pub struct CreatedInvoice {
    pub id: Uuid,
    pub payment_token: String,
    pub totals: Totals,
    /// The idempotency key matched an earlier create; nothing was inserted.
    pub replayed: bool,
}

/// One page of invoices, with the paging actually applied.
#[derive(Debug, Clone)]
pub struct InvoicePage {
    pub items: Vec<InvoiceView>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

#[derive(Debug, Clone)]
pub struct ReviseRequest {
    pub items: Vec<LineItemRequest>,
    pub discount: Discount,
    pub deposit_percentage: i32,
}

/// Marks an invoice as having a remote call in flight until dropped.
struct InFlight<'a> {
    set: &'a DashSet<Uuid>,
    id: Uuid,
}

impl<'a> InFlight<'a> {
    fn begin(set: &'a DashSet<Uuid>, id: Uuid) -> Result<Self, DomainError> {
        if !set.insert(id) {
            return Err(DomainError::Conflict(format!(
                "Another request for invoice {} is still in progress",
                id
            )));
        }
        Ok(Self { set, id })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.id);
    }
}

#[derive(Clone)]
pub struct InvoiceService {
    repo: Arc<dyn InvoiceRepository>,
    catalog: Arc<dyn Catalog>,
    mailer: Arc<dyn InvoiceMailer>,
    gateway: Arc<dyn PaymentGateway>,
    links: PaymentLinks,
    in_flight: Arc<DashSet<Uuid>>,
}

impl InvoiceService {
    pub fn new(
        repo: Arc<dyn InvoiceRepository>,
        catalog: Arc<dyn Catalog>,
        mailer: Arc<dyn InvoiceMailer>,
        gateway: Arc<dyn PaymentGateway>,
        links: PaymentLinks,
    ) -> Self {
        Self {
            repo,
            catalog,
            mailer,
            gateway,
            links,
            in_flight: Arc::new(DashSet::new()),
        }
    }

    /// Run store work on the blocking pool.
    async fn blocking<T, F>(&self, work: F) -> Result<T, DomainError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn InvoiceRepository, &dyn Catalog) -> Result<T, DomainError> + Send + 'static,
    {
        let repo = Arc::clone(&self.repo);
        let catalog = Arc::clone(&self.catalog);
        tokio::task::spawn_blocking(move || work(repo.as_ref(), catalog.as_ref()))
            .await
            .map_err(|e| DomainError::Internal(e.to_string()))?
    }

    pub fn payment_link(&self, payment_token: &str) -> String {
        self.links.link_for(payment_token)
    }

    pub async fn preview(&self, request: ComposeRequest) -> Result<Preview, DomainError> {
        self.blocking(move |_, catalog| {
            let composer = InvoiceComposer::from_request(&request, catalog)?;
            let totals = composer.totals();
            let (_, items, _, _) = composer.into_parts();
            Ok(Preview { items, totals })
        })
        .await
    }

    pub async fn create_invoice(
        &self,
        request: ComposeRequest,
        idempotency_key: Option<String>,
    ) -> Result<CreatedInvoice, DomainError> {
        let created = self
            .blocking(move |repo, catalog| {
                if let Some(key) = idempotency_key.as_deref() {
                    if let Some(existing) = repo.find_by_idempotency_key(key)? {
                        return Ok(replayed(existing));
                    }
                }

                let composer = InvoiceComposer::from_request(&request, catalog)?;
                let totals = composer.totals();
                let (recipient, items, discount, deposit_percentage) = composer.into_parts();
                let recipient = recipient.ok_or(ValidationError::MissingRecipient)?;
                if !catalog.recipient_exists(recipient)? {
                    return Err(ValidationError::UnknownRecipient(recipient.id()).into());
                }

                let payment_token = generate_payment_token();
                let new_invoice = NewInvoice {
                    recipient,
                    discount,
                    deposit_percentage,
                    totals,
                    payment_token: payment_token.clone(),
                    idempotency_key: idempotency_key.clone(),
                    items,
                };

                match repo.create(new_invoice) {
                    Ok(id) => Ok(CreatedInvoice {
                        id,
                        payment_token,
                        totals,
                        replayed: false,
                    }),
                    // Lost a race with an identical submission.
                    Err(DomainError::Conflict(msg)) => match idempotency_key.as_deref() {
                        Some(key) => repo
                            .find_by_idempotency_key(key)?
                            .map(replayed)
                            .ok_or(DomainError::Conflict(msg)),
                        None => Err(DomainError::Conflict(msg)),
                    },
                    Err(e) => Err(e),
                }
            })
            .await?;

        if created.replayed {
            log::info!(
                "Create for invoice {} replayed from idempotency key",
                created.id
            );
        } else {
            log::info!(
                "Created invoice {} (total {}, deposit {})",
                created.id,
                created.totals.total,
                created.totals.deposit
            );
        }
        Ok(created)
    }

    pub async fn get_invoice(&self, id: Uuid) -> Result<InvoiceView, DomainError> {
        self.blocking(move |repo, _| repo.find_by_id(id)?.ok_or(DomainError::NotFound))
            .await
    }

    /// `page` is 1-based; `limit` is held to 1..=100.
    pub async fn list_invoices(
        &self,
        page: i64,
        limit: i64,
        status: Option<InvoiceStatus>,
    ) -> Result<InvoicePage, DomainError> {
        let page = page.max(1);
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let ListResult { items, total } = self
            .blocking(move |repo, _| repo.list(page, limit, status))
            .await?;
        Ok(InvoicePage {
            items,
            total,
            page,
            limit,
        })
    }

    /// Re-compose a draft. Totals, deposit and remaining balance are derived
    /// from scratch; sent or paid invoices are frozen.
    pub async fn revise_invoice(
        &self,
        id: Uuid,
        request: ReviseRequest,
    ) -> Result<InvoiceView, DomainError> {
        let _guard = InFlight::begin(&self.in_flight, id)?;
        let view = self
            .blocking(move |repo, catalog| {
                let current = repo.find_by_id(id)?.ok_or(DomainError::NotFound)?;
                if current.status != InvoiceStatus::Draft {
                    return Err(DomainError::Conflict(format!(
                        "Invoice {} is {} and can no longer be edited",
                        id, current.status
                    )));
                }

                let compose = ComposeRequest {
                    recipient: Some(current.recipient),
                    items: request.items,
                    discount: request.discount,
                    deposit_percentage: request.deposit_percentage,
                };
                let composer = InvoiceComposer::from_request(&compose, catalog)?;
                let totals = composer.totals();
                let (_, items, discount, deposit_percentage) = composer.into_parts();

                repo.replace_line_items(
                    id,
                    InvoiceRevision {
                        discount,
                        deposit_percentage,
                        totals,
                        items,
                    },
                )
            })
            .await?;
        log::info!("Revised invoice {} (total {})", view.id, view.total_amount);
        Ok(view)
    }

    pub async fn delete_invoice(&self, id: Uuid) -> Result<(), DomainError> {
        let _guard = InFlight::begin(&self.in_flight, id)?;
        self.blocking(move |repo, _| repo.delete_draft(id)).await?;
        log::info!("Deleted draft invoice {}", id);
        Ok(())
    }

    /// Email the invoice and move it to `sent`. A failed dispatch leaves the
    /// status untouched.
    pub async fn send_invoice(
        &self,
        id: Uuid,
        caller_token: &str,
    ) -> Result<InvoiceView, DomainError> {
        let _guard = InFlight::begin(&self.in_flight, id)?;

        let invoice = self.get_invoice(id).await?;
        if invoice.status == InvoiceStatus::Paid {
            return Err(DomainError::InvalidTransition {
                id,
                from: invoice.status,
                to: InvoiceStatus::Sent,
            });
        }

        if let Err(e) = self.mailer.send_invoice_email(id, caller_token).await {
            log::error!("Sending invoice {} failed: {}", id, e);
            return Err(e);
        }

        let view = self.blocking(move |repo, _| repo.mark_sent(id)).await?;
        log::info!("Invoice {} sent", id);
        Ok(view)
    }

    pub async fn payment_link_for(&self, id: Uuid) -> Result<String, DomainError> {
        let invoice = self.get_invoice(id).await?;
        Ok(self.payment_link(&invoice.payment_token))
    }

    /// Charge the invoice behind `payment_token`. The move to `paid` happens
    /// when the processor's confirmation arrives through [`Self::settle`].
    pub async fn pay_invoice(
        &self,
        payment_token: &str,
        payment_method: &str,
    ) -> Result<PaymentConfirmation, DomainError> {
        let token = payment_token.to_string();
        let invoice = self
            .blocking(move |repo, _| {
                repo.find_by_payment_token(&token)?
                    .ok_or(DomainError::NotFound)
            })
            .await?;

        if invoice.status != InvoiceStatus::Sent {
            return Err(DomainError::InvalidTransition {
                id: invoice.id,
                from: invoice.status,
                to: InvoiceStatus::Paid,
            });
        }

        let _guard = InFlight::begin(&self.in_flight, invoice.id)?;

        let intent = self
            .gateway
            .create_intent(payment_token)
            .await
            .inspect_err(|e| log::error!("Creating payment intent for {} failed: {}", invoice.id, e))?;

        match self.gateway.confirm_intent(&intent, payment_method).await {
            Ok(confirmation) => {
                log::info!(
                    "Payment intent {} for invoice {} confirmed ({}, {} cents)",
                    confirmation.intent_id,
                    invoice.id,
                    confirmation.status,
                    confirmation.amount
                );
                Ok(confirmation)
            }
            Err(e) => {
                log::warn!("Payment for invoice {} failed: {}", invoice.id, e);
                Err(e)
            }
        }
    }

    /// Apply a processor-confirmed payment.
    pub async fn settle(&self, settlement: Settlement) -> Result<SettlementOutcome, DomainError> {
        if settlement.amount <= 0 {
            return Err(ValidationError::NonPositiveSettlement.into());
        }
        let outcome = self
            .blocking(move |repo, _| repo.record_settlement(&settlement))
            .await?;

        if outcome.duplicate {
            log::info!(
                "Ignoring replayed settlement for invoice {}",
                outcome.invoice_id
            );
        } else {
            log::info!(
                "Settlement recorded for invoice {}: remaining {}, status {}",
                outcome.invoice_id,
                outcome.remaining_balance,
                outcome.status
            );
        }
        Ok(outcome)
    }
}

fn replayed(existing: InvoiceView) -> CreatedInvoice {
    let subtotal: i64 = existing.lines.iter().map(|l| l.item.line_total()).sum();
    CreatedInvoice {
        id: existing.id,
        totals: Totals {
            subtotal,
            discount: subtotal - existing.total_amount,
            total: existing.total_amount,
            deposit: existing.deposit_amount,
            remaining: existing.remaining_balance,
        },
        payment_token: existing.payment_token,
        replayed: true,
    }
}
