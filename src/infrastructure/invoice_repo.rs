use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::invoice::{
    Booking, Discount, InvoiceRevision, InvoiceStatus, InvoiceView, LineItem, LineItemView,
    ListResult, NewInvoice, Recipient, ServicePackage, Settlement, SettlementOutcome, StoreProduct,
};
use crate::domain::ports::{Catalog, InvoiceRepository};
use crate::schema::{
    bookings, couples, invoice_line_items, invoice_outbox, invoice_payments, invoices,
    service_packages, store_products, vendors,
};

use super::models::{
    BookingRow, InvoiceRow, LineItemRow, NewInvoiceRow, NewLineItemRow, NewOutboxEventRow,
    NewPaymentRow, ServicePackageRow, StoreProductRow, VendorPayoutRow,
};

// ── Error conversions (infrastructure concern only) ──────────────────────────

impl From<diesel::result::Error> for DomainError {
    fn from(e: diesel::result::Error) -> Self {
        match e {
            diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                DomainError::Conflict(info.message().to_string())
            }
            other => DomainError::Internal(other.to_string()),
        }
    }
}

impl From<r2d2::Error> for DomainError {
    fn from(e: r2d2::Error) -> Self {
        DomainError::Internal(e.to_string())
    }
}

// ── Row <-> domain mapping ───────────────────────────────────────────────────

fn to_view(row: InvoiceRow, lines: Vec<LineItemRow>) -> Result<InvoiceView, DomainError> {
    let lines = lines
        .into_iter()
        .map(|l| {
            Ok(LineItemView {
                id: l.id,
                position: l.position,
                item: LineItem {
                    item_type: l.item_type.parse()?,
                    from_booking: l.booking_id.is_some(),
                    service_package_id: l.service_package_id,
                    store_product_id: l.store_product_id,
                    booking_id: l.booking_id,
                    custom_description: l.custom_description,
                    custom_price: l.custom_price,
                    quantity: l.quantity,
                    vendor_id: l.vendor_id,
                    stripe_account_id: l.stripe_account_id,
                },
            })
        })
        .collect::<Result<Vec<_>, DomainError>>()?;

    Ok(InvoiceView {
        id: row.id,
        recipient: Recipient::from_columns(&row.recipient_type, row.couple_id, row.vendor_id)?,
        status: row.status.parse()?,
        discount: Discount::from_columns(
            &row.discount_mode,
            row.discount_amount,
            row.discount_percentage,
        )?,
        deposit_percentage: row.deposit_percentage,
        total_amount: row.total_amount,
        deposit_amount: row.deposit_amount,
        remaining_balance: row.remaining_balance,
        payment_token: row.payment_token,
        created_at: row.created_at,
        updated_at: row.updated_at,
        sent_at: row.sent_at,
        paid_at: row.paid_at,
        lines,
    })
}

fn load_lines(conn: &mut PgConnection, invoice_id: Uuid) -> QueryResult<Vec<LineItemRow>> {
    invoice_line_items::table
        .filter(invoice_line_items::invoice_id.eq(invoice_id))
        .order(invoice_line_items::position.asc())
        .select(LineItemRow::as_select())
        .load(conn)
}

fn load_view(conn: &mut PgConnection, row: InvoiceRow) -> Result<InvoiceView, DomainError> {
    let lines = load_lines(conn, row.id)?;
    to_view(row, lines)
}

fn insert_lines(conn: &mut PgConnection, invoice_id: Uuid, items: &[LineItem]) -> QueryResult<usize> {
    let rows: Vec<NewLineItemRow> = items
        .iter()
        .enumerate()
        .map(|(position, item)| NewLineItemRow {
            id: Uuid::new_v4(),
            invoice_id,
            item_type: item.item_type.as_str().to_string(),
            service_package_id: item.service_package_id,
            store_product_id: item.store_product_id,
            booking_id: item.booking_id,
            custom_description: item.custom_description.clone(),
            custom_price: item.custom_price,
            quantity: item.quantity,
            vendor_id: item.vendor_id,
            stripe_account_id: item.stripe_account_id.clone(),
            position: position as i32,
        })
        .collect();
    diesel::insert_into(invoice_line_items::table)
        .values(&rows)
        .execute(conn)
}

/// Outbox row written in the caller's transaction. The `aggregate_type`
/// selects the downstream topic.
fn write_event(
    conn: &mut PgConnection,
    invoice_id: Uuid,
    event_type: &str,
    payload: Value,
) -> QueryResult<usize> {
    diesel::insert_into(invoice_outbox::table)
        .values(&NewOutboxEventRow {
            id: Uuid::new_v4(),
            aggregate_type: "Invoice".to_string(),
            aggregate_id: invoice_id.to_string(),
            event_type: event_type.to_string(),
            payload,
        })
        .execute(conn)
}

fn lock_by_id(conn: &mut PgConnection, id: Uuid) -> Result<InvoiceRow, DomainError> {
    invoices::table
        .filter(invoices::id.eq(id))
        .select(InvoiceRow::as_select())
        .for_update()
        .first(conn)
        .optional()?
        .ok_or(DomainError::NotFound)
}

fn ensure_draft(row: &InvoiceRow) -> Result<(), DomainError> {
    if row.status != InvoiceStatus::Draft.as_str() {
        return Err(DomainError::Conflict(format!(
            "Invoice {} is {} and can no longer be edited",
            row.id, row.status
        )));
    }
    Ok(())
}

// ── Repository ────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DieselInvoiceRepository {
    pool: DbPool,
}

impl DieselInvoiceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn find_one<F>(&self, filter: F) -> Result<Option<InvoiceView>, DomainError>
    where
        F: FnOnce(
            invoices::BoxedQuery<'static, diesel::pg::Pg>,
        ) -> invoices::BoxedQuery<'static, diesel::pg::Pg>,
    {
        let mut conn = self.pool.get()?;

        let row = filter(invoices::table.into_boxed())
            .select(InvoiceRow::as_select())
            .first(&mut conn)
            .optional()?;

        row.map(|row| load_view(&mut conn, row)).transpose()
    }
}

impl InvoiceRepository for DieselInvoiceRepository {
    fn create(&self, invoice: NewInvoice) -> Result<Uuid, DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            // 1. Insert the invoice
            let invoice_id = Uuid::new_v4();
            diesel::insert_into(invoices::table)
                .values(&NewInvoiceRow {
                    id: invoice_id,
                    recipient_type: invoice.recipient.kind().as_str().to_string(),
                    couple_id: invoice.recipient.couple_id(),
                    vendor_id: invoice.recipient.vendor_id(),
                    total_amount: invoice.totals.total,
                    remaining_balance: invoice.totals.remaining,
                    discount_amount: invoice.discount.amount(),
                    discount_percentage: invoice.discount.percentage(),
                    discount_mode: invoice.discount.mode().as_str().to_string(),
                    deposit_percentage: invoice.deposit_percentage,
                    deposit_amount: invoice.totals.deposit,
                    status: InvoiceStatus::Draft.as_str().to_string(),
                    payment_token: invoice.payment_token.clone(),
                    idempotency_key: invoice.idempotency_key.clone(),
                })
                .execute(conn)?;

            // 2. Insert line items; a failure here rolls back the invoice too
            insert_lines(conn, invoice_id, &invoice.items)?;

            // 3. Outbox event in the same transaction
            write_event(
                conn,
                invoice_id,
                "InvoiceCreated",
                json!({
                    "invoice_id": invoice_id,
                    "recipient_type": invoice.recipient.kind().as_str(),
                    "recipient_id": invoice.recipient.id(),
                    "status": InvoiceStatus::Draft.as_str(),
                    "total_amount": invoice.totals.total,
                    "deposit_amount": invoice.totals.deposit,
                    "remaining_balance": invoice.totals.remaining,
                    "line_items": invoice.items.len(),
                }),
            )?;

            Ok(invoice_id)
        })
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<InvoiceView>, DomainError> {
        self.find_one(|q| q.filter(invoices::id.eq(id)))
    }

    fn find_by_payment_token(&self, token: &str) -> Result<Option<InvoiceView>, DomainError> {
        let token = token.to_string();
        self.find_one(move |q| q.filter(invoices::payment_token.eq(token)))
    }

    fn find_by_idempotency_key(&self, key: &str) -> Result<Option<InvoiceView>, DomainError> {
        let key = key.to_string();
        self.find_one(move |q| q.filter(invoices::idempotency_key.eq(key)))
    }

    fn list(
        &self,
        page: i64,
        limit: i64,
        status: Option<InvoiceStatus>,
    ) -> Result<ListResult, DomainError> {
        let mut conn = self.pool.get()?;

        let offset = (page - 1) * limit;
        conn.transaction::<_, DomainError, _>(|conn| {
            let mut count_query = invoices::table.count().into_boxed();
            let mut rows_query = invoices::table
                .select(InvoiceRow::as_select())
                .order(invoices::created_at.desc())
                .limit(limit)
                .offset(offset)
                .into_boxed();
            if let Some(status) = status {
                count_query = count_query.filter(invoices::status.eq(status.as_str()));
                rows_query = rows_query.filter(invoices::status.eq(status.as_str()));
            }

            let total: i64 = count_query.get_result(conn)?;
            let rows = rows_query.load(conn)?;

            Ok(ListResult {
                items: rows
                    .into_iter()
                    .map(|row| to_view(row, vec![]))
                    .collect::<Result<_, _>>()?,
                total,
            })
        })
    }

    fn replace_line_items(
        &self,
        id: Uuid,
        revision: InvoiceRevision,
    ) -> Result<InvoiceView, DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            let row = lock_by_id(conn, id)?;
            ensure_draft(&row)?;

            diesel::delete(invoice_line_items::table.filter(invoice_line_items::invoice_id.eq(id)))
                .execute(conn)?;
            insert_lines(conn, id, &revision.items)?;

            let row = diesel::update(invoices::table.find(id))
                .set((
                    invoices::total_amount.eq(revision.totals.total),
                    invoices::deposit_amount.eq(revision.totals.deposit),
                    invoices::remaining_balance.eq(revision.totals.remaining),
                    invoices::discount_amount.eq(revision.discount.amount()),
                    invoices::discount_percentage.eq(revision.discount.percentage()),
                    invoices::discount_mode.eq(revision.discount.mode().as_str()),
                    invoices::deposit_percentage.eq(revision.deposit_percentage),
                    invoices::updated_at.eq(Utc::now()),
                ))
                .returning(InvoiceRow::as_returning())
                .get_result(conn)?;

            load_view(conn, row)
        })
    }

    fn delete_draft(&self, id: Uuid) -> Result<(), DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            let row = lock_by_id(conn, id)?;
            ensure_draft(&row)?;
            // Line items go with it (ON DELETE CASCADE).
            diesel::delete(invoices::table.find(id)).execute(conn)?;
            Ok(())
        })
    }

    fn mark_sent(&self, id: Uuid) -> Result<InvoiceView, DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            let row = lock_by_id(conn, id)?;
            let status: InvoiceStatus = row.status.parse()?;
            if status == InvoiceStatus::Sent {
                // Re-sent reminder; nothing to transition.
                return load_view(conn, row);
            }
            let next = status.transition(id, InvoiceStatus::Sent)?;

            let now = Utc::now();
            let row = diesel::update(invoices::table.find(id))
                .set((
                    invoices::status.eq(next.as_str()),
                    invoices::sent_at.eq(Some(now)),
                    invoices::updated_at.eq(now),
                ))
                .returning(InvoiceRow::as_returning())
                .get_result(conn)?;

            write_event(
                conn,
                id,
                "InvoiceSent",
                json!({ "invoice_id": id, "status": next.as_str() }),
            )?;

            // Nothing left to collect: no processor charge will ever settle it.
            if row.remaining_balance == 0 {
                let paid = next.transition(id, InvoiceStatus::Paid)?;
                let row = diesel::update(invoices::table.find(id))
                    .set((
                        invoices::status.eq(paid.as_str()),
                        invoices::paid_at.eq(Some(now)),
                    ))
                    .returning(InvoiceRow::as_returning())
                    .get_result(conn)?;
                write_event(
                    conn,
                    id,
                    "InvoicePaid",
                    json!({ "invoice_id": id, "status": paid.as_str(), "processor_reference": null }),
                )?;
                return load_view(conn, row);
            }

            load_view(conn, row)
        })
    }

    fn record_settlement(&self, settlement: &Settlement) -> Result<SettlementOutcome, DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            let row = invoices::table
                .filter(invoices::payment_token.eq(&settlement.payment_token))
                .select(InvoiceRow::as_select())
                .for_update()
                .first(conn)
                .optional()?
                .ok_or(DomainError::NotFound)?;
            let status: InvoiceStatus = row.status.parse()?;

            let recorded_for = invoice_payments::table
                .filter(invoice_payments::processor_reference.eq(&settlement.processor_reference))
                .select(invoice_payments::invoice_id)
                .first::<Uuid>(conn)
                .optional()?;
            match recorded_for {
                Some(owner) if owner == row.id => {
                    return Ok(SettlementOutcome {
                        invoice_id: row.id,
                        status,
                        remaining_balance: row.remaining_balance,
                        duplicate: true,
                    });
                }
                Some(_) => {
                    return Err(DomainError::Conflict(format!(
                        "Processor reference {} already settled another invoice",
                        settlement.processor_reference
                    )));
                }
                None => {}
            }

            if status != InvoiceStatus::Sent {
                return Err(DomainError::InvalidTransition {
                    id: row.id,
                    from: status,
                    to: InvoiceStatus::Paid,
                });
            }

            diesel::insert_into(invoice_payments::table)
                .values(&NewPaymentRow {
                    id: Uuid::new_v4(),
                    invoice_id: row.id,
                    amount: settlement.amount,
                    processor_reference: settlement.processor_reference.clone(),
                })
                .execute(conn)?;

            let remaining = (row.remaining_balance - settlement.amount).max(0);
            let now = Utc::now();
            let next = if remaining == 0 {
                status.transition(row.id, InvoiceStatus::Paid)?
            } else {
                status
            };

            diesel::update(invoices::table.find(row.id))
                .set((
                    invoices::remaining_balance.eq(remaining),
                    invoices::status.eq(next.as_str()),
                    invoices::updated_at.eq(now),
                ))
                .execute(conn)?;

            if next == InvoiceStatus::Paid {
                diesel::update(invoices::table.find(row.id))
                    .set(invoices::paid_at.eq(Some(now)))
                    .execute(conn)?;
                write_event(
                    conn,
                    row.id,
                    "InvoicePaid",
                    json!({
                        "invoice_id": row.id,
                        "status": next.as_str(),
                        "processor_reference": settlement.processor_reference,
                    }),
                )?;
            }

            Ok(SettlementOutcome {
                invoice_id: row.id,
                status: next,
                remaining_balance: remaining,
                duplicate: false,
            })
        })
    }
}

impl Catalog for DieselInvoiceRepository {
    fn service_package(&self, id: Uuid) -> Result<Option<ServicePackage>, DomainError> {
        let mut conn = self.pool.get()?;

        let row = service_packages::table
            .filter(service_packages::id.eq(id))
            .select(ServicePackageRow::as_select())
            .first(&mut conn)
            .optional()?;

        Ok(row.map(|p| ServicePackage {
            id: p.id,
            name: p.name,
            price: p.price,
        }))
    }

    fn store_product(&self, id: Uuid) -> Result<Option<StoreProduct>, DomainError> {
        let mut conn = self.pool.get()?;

        let row = store_products::table
            .filter(store_products::id.eq(id))
            .select(StoreProductRow::as_select())
            .first(&mut conn)
            .optional()?;

        Ok(row.map(|p| StoreProduct {
            id: p.id,
            name: p.name,
            price: p.price,
        }))
    }

    fn booking(&self, id: Uuid) -> Result<Option<Booking>, DomainError> {
        let mut conn = self.pool.get()?;

        let row = bookings::table
            .inner_join(vendors::table)
            .filter(bookings::id.eq(id))
            .select((BookingRow::as_select(), VendorPayoutRow::as_select()))
            .first::<(BookingRow, VendorPayoutRow)>(&mut conn)
            .optional()?;

        Ok(row.map(|(b, vendor)| Booking {
            id: b.id,
            couple_id: b.couple_id,
            vendor_id: b.vendor_id,
            service_package_id: b.service_package_id,
            amount: b.amount,
            initial_payment: b.initial_payment,
            vendor_stripe_account_id: vendor.stripe_account_id,
        }))
    }

    fn recipient_exists(&self, recipient: Recipient) -> Result<bool, DomainError> {
        let mut conn = self.pool.get()?;

        let exists = match recipient {
            Recipient::Couple(id) => {
                diesel::select(diesel::dsl::exists(couples::table.filter(couples::id.eq(id))))
                    .get_result(&mut conn)?
            }
            Recipient::Vendor(id) => {
                diesel::select(diesel::dsl::exists(vendors::table.filter(vendors::id.eq(id))))
                    .get_result(&mut conn)?
            }
        };
        Ok(exists)
    }
}
