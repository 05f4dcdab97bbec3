use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::calculator::Totals;
use super::errors::DomainError;
use super::money::Cents;

// ── Recipient ────────────────────────────────────────────────────────────────

/// Who an invoice is billed to. Exactly one party, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    Couple(Uuid),
    Vendor(Uuid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RecipientType {
    Couple,
    Vendor,
}

impl RecipientType {
    pub fn as_str(self) -> &'static str {
        match self {
            RecipientType::Couple => "couple",
            RecipientType::Vendor => "vendor",
        }
    }
}

impl FromStr for RecipientType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "couple" => Ok(RecipientType::Couple),
            "vendor" => Ok(RecipientType::Vendor),
            other => Err(DomainError::Internal(format!(
                "Unknown recipient type '{}'",
                other
            ))),
        }
    }
}

impl Recipient {
    pub fn new(kind: RecipientType, id: Uuid) -> Self {
        match kind {
            RecipientType::Couple => Recipient::Couple(id),
            RecipientType::Vendor => Recipient::Vendor(id),
        }
    }

    pub fn kind(&self) -> RecipientType {
        match self {
            Recipient::Couple(_) => RecipientType::Couple,
            Recipient::Vendor(_) => RecipientType::Vendor,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Recipient::Couple(id) | Recipient::Vendor(id) => *id,
        }
    }

    pub fn couple_id(&self) -> Option<Uuid> {
        match self {
            Recipient::Couple(id) => Some(*id),
            Recipient::Vendor(_) => None,
        }
    }

    pub fn vendor_id(&self) -> Option<Uuid> {
        match self {
            Recipient::Vendor(id) => Some(*id),
            Recipient::Couple(_) => None,
        }
    }

    /// Rebuild from the stored `recipient_type` + nullable id columns.
    pub fn from_columns(
        recipient_type: &str,
        couple_id: Option<Uuid>,
        vendor_id: Option<Uuid>,
    ) -> Result<Self, DomainError> {
        match (recipient_type.parse::<RecipientType>()?, couple_id, vendor_id) {
            (RecipientType::Couple, Some(id), None) => Ok(Recipient::Couple(id)),
            (RecipientType::Vendor, None, Some(id)) => Ok(Recipient::Vendor(id)),
            (kind, _, _) => Err(DomainError::Internal(format!(
                "Recipient columns do not match recipient type '{}'",
                kind.as_str()
            ))),
        }
    }
}

// ── Status ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
        }
    }

    /// `draft -> sent -> paid`; `paid` is terminal.
    pub fn can_transition_to(self, next: InvoiceStatus) -> bool {
        matches!(
            (self, next),
            (InvoiceStatus::Draft, InvoiceStatus::Sent) | (InvoiceStatus::Sent, InvoiceStatus::Paid)
        )
    }

    pub fn transition(self, id: Uuid, next: InvoiceStatus) -> Result<InvoiceStatus, DomainError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::InvalidTransition {
                id,
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(InvoiceStatus::Draft),
            "sent" => Ok(InvoiceStatus::Sent),
            "paid" => Ok(InvoiceStatus::Paid),
            other => Err(DomainError::InvalidInput(format!(
                "Unknown invoice status '{}'",
                other
            ))),
        }
    }
}

// ── Discount ─────────────────────────────────────────────────────────────────

/// A single discount: either a flat amount or a percentage of the subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discount {
    Flat(Cents),
    Percentage(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DiscountMode {
    Flat,
    Percentage,
}

impl DiscountMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DiscountMode::Flat => "flat",
            DiscountMode::Percentage => "percentage",
        }
    }
}

impl FromStr for DiscountMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flat" => Ok(DiscountMode::Flat),
            "percentage" => Ok(DiscountMode::Percentage),
            other => Err(DomainError::Internal(format!(
                "Unknown discount mode '{}'",
                other
            ))),
        }
    }
}

impl Default for Discount {
    fn default() -> Self {
        Discount::Flat(0)
    }
}

impl Discount {
    pub fn mode(&self) -> DiscountMode {
        match self {
            Discount::Flat(_) => DiscountMode::Flat,
            Discount::Percentage(_) => DiscountMode::Percentage,
        }
    }

    /// Toggle the mode. Switching resets the value so the previous mode's
    /// figure never survives the toggle.
    pub fn switch_to(self, mode: DiscountMode) -> Discount {
        match (self.mode(), mode) {
            (current, wanted) if current == wanted => self,
            (_, DiscountMode::Flat) => Discount::Flat(0),
            (_, DiscountMode::Percentage) => Discount::Percentage(0),
        }
    }

    /// Value for the `discount_amount` column.
    pub fn amount(&self) -> Cents {
        match self {
            Discount::Flat(amount) => *amount,
            Discount::Percentage(_) => 0,
        }
    }

    /// Value for the `discount_percentage` column.
    pub fn percentage(&self) -> i32 {
        match self {
            Discount::Percentage(pct) => *pct,
            Discount::Flat(_) => 0,
        }
    }

    /// Rebuild from the stored columns. The mode column decides, so a 0%
    /// discount stays in percentage mode.
    pub fn from_columns(
        mode: &str,
        amount: Cents,
        percentage: i32,
    ) -> Result<Discount, DomainError> {
        Ok(match mode.parse()? {
            DiscountMode::Flat => Discount::Flat(amount),
            DiscountMode::Percentage => Discount::Percentage(percentage),
        })
    }
}

// ── Line items ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LineItemType {
    ServicePackage,
    StoreProduct,
    Custom,
}

impl LineItemType {
    pub fn as_str(self) -> &'static str {
        match self {
            LineItemType::ServicePackage => "service_package",
            LineItemType::StoreProduct => "store_product",
            LineItemType::Custom => "custom",
        }
    }
}

impl FromStr for LineItemType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "service_package" => Ok(LineItemType::ServicePackage),
            "store_product" => Ok(LineItemType::StoreProduct),
            "custom" => Ok(LineItemType::Custom),
            other => Err(DomainError::Internal(format!(
                "Unknown line item type '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    pub item_type: LineItemType,
    /// Set when the item was added as a booking selection, even before a
    /// booking has been picked.
    pub from_booking: bool,
    pub service_package_id: Option<Uuid>,
    pub store_product_id: Option<Uuid>,
    pub booking_id: Option<Uuid>,
    pub custom_description: Option<String>,
    pub custom_price: Cents,
    pub quantity: i32,
    pub vendor_id: Option<Uuid>,
    pub stripe_account_id: Option<String>,
}

impl LineItem {
    pub fn new(item_type: LineItemType) -> Self {
        Self {
            item_type,
            from_booking: false,
            service_package_id: None,
            store_product_id: None,
            booking_id: None,
            custom_description: None,
            custom_price: 0,
            quantity: 1,
            vendor_id: None,
            stripe_account_id: None,
        }
    }

    pub fn booking_slot() -> Self {
        Self {
            from_booking: true,
            ..Self::new(LineItemType::ServicePackage)
        }
    }

    pub fn is_booking_linked(&self) -> bool {
        self.item_type == LineItemType::ServicePackage
            && (self.from_booking || self.booking_id.is_some())
    }

    pub fn line_total(&self) -> Cents {
        self.custom_price.saturating_mul(i64::from(self.quantity))
    }
}

// ── Catalog records ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePackage {
    pub id: Uuid,
    pub name: String,
    pub price: Cents,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreProduct {
    pub id: Uuid,
    pub name: String,
    pub price: Cents,
}

/// An existing booking together with its vendor's payout account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Booking {
    pub id: Uuid,
    pub couple_id: Uuid,
    pub vendor_id: Uuid,
    pub service_package_id: Option<Uuid>,
    pub amount: Cents,
    pub initial_payment: Option<Cents>,
    pub vendor_stripe_account_id: Option<String>,
}

// ── Persisted views ──────────────────────────────────────────────────────────

/// Everything the store needs to persist a freshly composed invoice.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub recipient: Recipient,
    pub discount: Discount,
    pub deposit_percentage: i32,
    pub totals: Totals,
    pub payment_token: String,
    pub idempotency_key: Option<String>,
    pub items: Vec<LineItem>,
}

/// Re-composed contents of an existing draft.
#[derive(Debug, Clone)]
pub struct InvoiceRevision {
    pub discount: Discount,
    pub deposit_percentage: i32,
    pub totals: Totals,
    pub items: Vec<LineItem>,
}

#[derive(Debug, Clone)]
pub struct LineItemView {
    pub id: Uuid,
    pub position: i32,
    pub item: LineItem,
}

#[derive(Debug, Clone)]
pub struct InvoiceView {
    pub id: Uuid,
    pub recipient: Recipient,
    pub status: InvoiceStatus,
    pub discount: Discount,
    pub deposit_percentage: i32,
    pub total_amount: Cents,
    pub deposit_amount: Cents,
    pub remaining_balance: Cents,
    pub payment_token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub lines: Vec<LineItemView>,
}

#[derive(Debug, Clone)]
pub struct ListResult {
    pub items: Vec<InvoiceView>,
    pub total: i64,
}

// ── Settlement ───────────────────────────────────────────────────────────────

/// A processor-confirmed payment against an invoice's payment token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub payment_token: String,
    pub amount: Cents,
    pub processor_reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementOutcome {
    pub invoice_id: Uuid,
    pub status: InvoiceStatus,
    pub remaining_balance: Cents,
    /// The processor reference had already been recorded; nothing changed.
    pub duplicate: bool,
}
