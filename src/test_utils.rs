//! In-memory stand-ins for the ports, shared by unit and handler tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::application::invoice_service::InvoiceService;
use crate::domain::errors::DomainError;
use crate::domain::invoice::{
    Booking, InvoiceRevision, InvoiceStatus, InvoiceView, LineItemView, ListResult, NewInvoice,
    Recipient, ServicePackage, Settlement, SettlementOutcome, StoreProduct,
};
use crate::domain::payment_link::{PaymentLinkStyle, PaymentLinks};
use crate::domain::ports::{
    Catalog, InvoiceMailer, InvoiceRepository, PaymentConfirmation, PaymentGateway, PaymentIntent,
};

#[derive(Default)]
struct State {
    couples: HashSet<Uuid>,
    vendors: HashMap<Uuid, Option<String>>,
    packages: HashMap<Uuid, ServicePackage>,
    products: HashMap<Uuid, StoreProduct>,
    bookings: HashMap<Uuid, Booking>,
    invoices: Vec<InvoiceView>,
    idempotency: HashMap<String, Uuid>,
    payments: HashMap<String, Uuid>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
    pub fail_writes: AtomicBool,
}

impl InMemoryStore {
    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("store mutex poisoned")
    }

    fn check_writable(&self) -> Result<(), DomainError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DomainError::Internal("write failed".to_string()));
        }
        Ok(())
    }

    pub fn add_couple(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.state().couples.insert(id);
        id
    }

    pub fn add_vendor(&self, stripe_account_id: Option<&str>) -> Uuid {
        let id = Uuid::new_v4();
        self.state()
            .vendors
            .insert(id, stripe_account_id.map(str::to_string));
        id
    }

    pub fn add_package(&self, name: &str, price: i64) -> Uuid {
        let id = Uuid::new_v4();
        self.state().packages.insert(
            id,
            ServicePackage {
                id,
                name: name.to_string(),
                price,
            },
        );
        id
    }

    pub fn add_product(&self, name: &str, price: i64) -> Uuid {
        let id = Uuid::new_v4();
        self.state().products.insert(
            id,
            StoreProduct {
                id,
                name: name.to_string(),
                price,
            },
        );
        id
    }

    /// Returns `(booking_id, vendor_id)`.
    pub fn add_booking(
        &self,
        couple_id: Uuid,
        amount: i64,
        initial_payment: Option<i64>,
        stripe_account_id: Option<&str>,
    ) -> (Uuid, Uuid) {
        let vendor_id = self.add_vendor(stripe_account_id);
        let package_id = self.add_package("Booked package", amount);
        let id = Uuid::new_v4();
        self.state().bookings.insert(
            id,
            Booking {
                id,
                couple_id,
                vendor_id,
                service_package_id: Some(package_id),
                amount,
                initial_payment,
                vendor_stripe_account_id: stripe_account_id.map(str::to_string),
            },
        );
        (id, vendor_id)
    }

    pub fn invoice_count(&self) -> usize {
        self.state().invoices.len()
    }

    pub fn set_status(&self, id: Uuid, status: InvoiceStatus) {
        if let Some(inv) = self.state().invoices.iter_mut().find(|i| i.id == id) {
            inv.status = status;
        }
    }
}

fn to_lines(items: Vec<crate::domain::invoice::LineItem>) -> Vec<LineItemView> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| LineItemView {
            id: Uuid::new_v4(),
            position: i as i32,
            item,
        })
        .collect()
}

impl Catalog for InMemoryStore {
    fn service_package(&self, id: Uuid) -> Result<Option<ServicePackage>, DomainError> {
        Ok(self.state().packages.get(&id).cloned())
    }

    fn store_product(&self, id: Uuid) -> Result<Option<StoreProduct>, DomainError> {
        Ok(self.state().products.get(&id).cloned())
    }

    fn booking(&self, id: Uuid) -> Result<Option<Booking>, DomainError> {
        Ok(self.state().bookings.get(&id).cloned())
    }

    fn recipient_exists(&self, recipient: Recipient) -> Result<bool, DomainError> {
        let state = self.state();
        Ok(match recipient {
            Recipient::Couple(id) => state.couples.contains(&id),
            Recipient::Vendor(id) => state.vendors.contains_key(&id),
        })
    }
}

impl InvoiceRepository for InMemoryStore {
    fn create(&self, invoice: NewInvoice) -> Result<Uuid, DomainError> {
        self.check_writable()?;
        let mut state = self.state();
        if let Some(key) = &invoice.idempotency_key {
            if state.idempotency.contains_key(key) {
                return Err(DomainError::Conflict(format!(
                    "Idempotency key '{}' already used",
                    key
                )));
            }
        }
        let id = Uuid::new_v4();
        let now = Utc::now();
        state.invoices.push(InvoiceView {
            id,
            recipient: invoice.recipient,
            status: InvoiceStatus::Draft,
            discount: invoice.discount,
            deposit_percentage: invoice.deposit_percentage,
            total_amount: invoice.totals.total,
            deposit_amount: invoice.totals.deposit,
            remaining_balance: invoice.totals.remaining,
            payment_token: invoice.payment_token,
            created_at: now,
            updated_at: now,
            sent_at: None,
            paid_at: None,
            lines: to_lines(invoice.items),
        });
        if let Some(key) = invoice.idempotency_key {
            state.idempotency.insert(key, id);
        }
        Ok(id)
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<InvoiceView>, DomainError> {
        Ok(self.state().invoices.iter().find(|i| i.id == id).cloned())
    }

    fn find_by_payment_token(&self, token: &str) -> Result<Option<InvoiceView>, DomainError> {
        Ok(self
            .state()
            .invoices
            .iter()
            .find(|i| i.payment_token == token)
            .cloned())
    }

    fn find_by_idempotency_key(&self, key: &str) -> Result<Option<InvoiceView>, DomainError> {
        let state = self.state();
        Ok(state
            .idempotency
            .get(key)
            .and_then(|id| state.invoices.iter().find(|i| i.id == *id))
            .cloned())
    }

    fn list(
        &self,
        page: i64,
        limit: i64,
        status: Option<InvoiceStatus>,
    ) -> Result<ListResult, DomainError> {
        let state = self.state();
        let mut matching: Vec<InvoiceView> = state
            .invoices
            .iter()
            .filter(|i| status.map_or(true, |s| i.status == s))
            .cloned()
            .collect();
        matching.reverse();
        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(((page - 1) * limit) as usize)
            .take(limit as usize)
            .map(|mut i| {
                i.lines.clear();
                i
            })
            .collect();
        Ok(ListResult { items, total })
    }

    fn replace_line_items(
        &self,
        id: Uuid,
        revision: InvoiceRevision,
    ) -> Result<InvoiceView, DomainError> {
        self.check_writable()?;
        let mut state = self.state();
        let invoice = state
            .invoices
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(DomainError::NotFound)?;
        if invoice.status != InvoiceStatus::Draft {
            return Err(DomainError::Conflict(format!(
                "Invoice {} is {} and can no longer be edited",
                id, invoice.status
            )));
        }
        invoice.discount = revision.discount;
        invoice.deposit_percentage = revision.deposit_percentage;
        invoice.total_amount = revision.totals.total;
        invoice.deposit_amount = revision.totals.deposit;
        invoice.remaining_balance = revision.totals.remaining;
        invoice.lines = to_lines(revision.items);
        invoice.updated_at = Utc::now();
        Ok(invoice.clone())
    }

    fn delete_draft(&self, id: Uuid) -> Result<(), DomainError> {
        let mut state = self.state();
        let pos = state
            .invoices
            .iter()
            .position(|i| i.id == id)
            .ok_or(DomainError::NotFound)?;
        if state.invoices[pos].status != InvoiceStatus::Draft {
            return Err(DomainError::Conflict(format!(
                "Invoice {} is no longer a draft",
                id
            )));
        }
        state.invoices.remove(pos);
        Ok(())
    }

    fn mark_sent(&self, id: Uuid) -> Result<InvoiceView, DomainError> {
        self.check_writable()?;
        let mut state = self.state();
        let invoice = state
            .invoices
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(DomainError::NotFound)?;
        if invoice.status == InvoiceStatus::Draft {
            invoice.status = invoice.status.transition(id, InvoiceStatus::Sent)?;
            invoice.sent_at = Some(Utc::now());
            if invoice.remaining_balance == 0 {
                invoice.status = invoice.status.transition(id, InvoiceStatus::Paid)?;
                invoice.paid_at = invoice.sent_at;
            }
        }
        Ok(invoice.clone())
    }

    fn record_settlement(&self, settlement: &Settlement) -> Result<SettlementOutcome, DomainError> {
        let mut state = self.state();
        let recorded_for = state
            .payments
            .get(&settlement.processor_reference)
            .copied();
        let invoice = state
            .invoices
            .iter_mut()
            .find(|i| i.payment_token == settlement.payment_token)
            .ok_or(DomainError::NotFound)?;
        if let Some(owner) = recorded_for.filter(|owner| *owner != invoice.id) {
            return Err(DomainError::Conflict(format!(
                "Processor reference {} already settled invoice {}",
                settlement.processor_reference, owner
            )));
        }
        if recorded_for.is_some() {
            return Ok(SettlementOutcome {
                invoice_id: invoice.id,
                status: invoice.status,
                remaining_balance: invoice.remaining_balance,
                duplicate: true,
            });
        }
        if invoice.status != InvoiceStatus::Sent {
            return Err(DomainError::InvalidTransition {
                id: invoice.id,
                from: invoice.status,
                to: InvoiceStatus::Paid,
            });
        }
        invoice.remaining_balance = (invoice.remaining_balance - settlement.amount).max(0);
        if invoice.remaining_balance == 0 {
            invoice.status = InvoiceStatus::Paid;
            invoice.paid_at = Some(Utc::now());
        }
        let outcome = SettlementOutcome {
            invoice_id: invoice.id,
            status: invoice.status,
            remaining_balance: invoice.remaining_balance,
            duplicate: false,
        };
        state
            .payments
            .insert(settlement.processor_reference.clone(), outcome.invoice_id);
        Ok(outcome)
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<(Uuid, String)>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl InvoiceMailer for RecordingMailer {
    async fn send_invoice_email(
        &self,
        invoice_id: Uuid,
        caller_token: &str,
    ) -> Result<(), DomainError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DomainError::Remote(
                "send-invoice-email returned 500".to_string(),
            ));
        }
        self.sent
            .lock()
            .expect("mailer mutex poisoned")
            .push((invoice_id, caller_token.to_string()));
        Ok(())
    }
}

/// Amount every scripted intent quotes, in cents.
pub const SCRIPTED_INTENT_AMOUNT: i64 = 12_345;

#[derive(Default)]
pub struct ScriptedGateway {
    pub decline_with: Mutex<Option<String>>,
    pub confirmations: AtomicUsize,
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create_intent(&self, payment_token: &str) -> Result<PaymentIntent, DomainError> {
        Ok(PaymentIntent {
            id: format!("pi_{}", payment_token),
            client_secret: format!("pi_{}_secret", payment_token),
            amount: SCRIPTED_INTENT_AMOUNT,
        })
    }

    async fn confirm_intent(
        &self,
        intent: &PaymentIntent,
        _payment_method: &str,
    ) -> Result<PaymentConfirmation, DomainError> {
        if let Some(reason) = self.decline_with.lock().expect("gateway mutex poisoned").clone() {
            return Err(DomainError::PaymentFailed(reason));
        }
        self.confirmations.fetch_add(1, Ordering::SeqCst);
        Ok(PaymentConfirmation {
            intent_id: intent.id.clone(),
            status: "succeeded".to_string(),
            amount: intent.amount,
        })
    }
}

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub mailer: Arc<RecordingMailer>,
    pub gateway: Arc<ScriptedGateway>,
    pub service: InvoiceService,
}

pub fn harness() -> Harness {
    let store = Arc::new(InMemoryStore::default());
    let mailer = Arc::new(RecordingMailer::default());
    let gateway = Arc::new(ScriptedGateway::default());
    let service = InvoiceService::new(
        store.clone(),
        store.clone(),
        mailer.clone(),
        gateway.clone(),
        PaymentLinks::new("https://app.example.com", PaymentLinkStyle::Invoice),
    );
    Harness {
        store,
        mailer,
        gateway,
        service,
    }
}
