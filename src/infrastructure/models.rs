use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::schema::{
    bookings, invoice_line_items, invoice_outbox, invoice_payments, invoices, service_packages,
    store_products, vendors,
};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = invoices)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct InvoiceRow {
    pub id: Uuid,
    pub recipient_type: String,
    pub couple_id: Option<Uuid>,
    pub vendor_id: Option<Uuid>,
    pub total_amount: i64,
    pub remaining_balance: i64,
    pub discount_amount: i64,
    pub discount_percentage: i32,
    pub discount_mode: String,
    pub deposit_percentage: i32,
    pub deposit_amount: i64,
    pub status: String,
    pub payment_token: String,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = invoices)]
pub struct NewInvoiceRow {
    pub id: Uuid,
    pub recipient_type: String,
    pub couple_id: Option<Uuid>,
    pub vendor_id: Option<Uuid>,
    pub total_amount: i64,
    pub remaining_balance: i64,
    pub discount_amount: i64,
    pub discount_percentage: i32,
    pub discount_mode: String,
    pub deposit_percentage: i32,
    pub deposit_amount: i64,
    pub status: String,
    pub payment_token: String,
    pub idempotency_key: Option<String>,
}

#[derive(
    Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, Associations,
)]
#[diesel(table_name = invoice_line_items)]
#[diesel(belongs_to(InvoiceRow, foreign_key = invoice_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct LineItemRow {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub item_type: String,
    pub service_package_id: Option<Uuid>,
    pub store_product_id: Option<Uuid>,
    pub booking_id: Option<Uuid>,
    pub custom_description: Option<String>,
    pub custom_price: i64,
    pub quantity: i32,
    pub vendor_id: Option<Uuid>,
    pub stripe_account_id: Option<String>,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = invoice_line_items)]
pub struct NewLineItemRow {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub item_type: String,
    pub service_package_id: Option<Uuid>,
    pub store_product_id: Option<Uuid>,
    pub booking_id: Option<Uuid>,
    pub custom_description: Option<String>,
    pub custom_price: i64,
    pub quantity: i32,
    pub vendor_id: Option<Uuid>,
    pub stripe_account_id: Option<String>,
    pub position: i32,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = invoice_payments)]
pub struct NewPaymentRow {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub amount: i64,
    pub processor_reference: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = invoice_outbox)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OutboxEventRow {
    pub id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub event_type: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = invoice_outbox)]
pub struct NewOutboxEventRow {
    pub id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub event_type: String,
    pub payload: Value,
}

// ── Catalog (read-only from this service's point of view) ───────────────────

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = service_packages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ServicePackageRow {
    pub id: Uuid,
    pub name: String,
    pub price: i64,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = store_products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct StoreProductRow {
    pub id: Uuid,
    pub name: String,
    pub price: i64,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = bookings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BookingRow {
    pub id: Uuid,
    pub couple_id: Uuid,
    pub vendor_id: Uuid,
    pub service_package_id: Option<Uuid>,
    pub amount: i64,
    pub initial_payment: Option<i64>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = vendors)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct VendorPayoutRow {
    pub stripe_account_id: Option<String>,
}
