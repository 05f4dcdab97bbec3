use thiserror::Error;
use uuid::Uuid;

use super::invoice::InvoiceStatus;

/// Composition rules that block a save. Positions are 1-based so they can be
/// shown to an operator as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("a recipient must be chosen")]
    MissingRecipient,
    #[error("recipient {0} does not exist")]
    UnknownRecipient(Uuid),
    #[error("an invoice needs at least one line item")]
    NoLineItems,
    #[error("a couple invoice can hold at most {max} booking line items")]
    TooManyBookingItems { max: usize },
    #[error("bookings can only be invoiced to a couple")]
    BookingRequiresCouple,
    #[error("line item {position}: booking {booking_id} belongs to another couple")]
    BookingRecipientMismatch { position: usize, booking_id: Uuid },
    #[error("line item {position}: a {reference} must be selected")]
    MissingReference {
        position: usize,
        reference: &'static str,
    },
    #[error("line item {position}: {reference} {id} does not exist")]
    UnresolvedReference {
        position: usize,
        reference: &'static str,
        id: Uuid,
    },
    #[error("line item {position}: custom items need a description")]
    MissingCustomDescription { position: usize },
    #[error("line item {position}: custom price must be greater than zero")]
    NonPositiveCustomPrice { position: usize },
    #[error("line item {position}: quantity must be at least 1")]
    NonPositiveQuantity { position: usize },
    #[error("line item {position} does not exist")]
    NoSuchLineItem { position: usize },
    #[error("discount percentage must be between 0 and 100, got {0}")]
    DiscountPercentageOutOfRange(i32),
    #[error("discount amount must not be negative")]
    NegativeDiscount,
    #[error("deposit percentage must be between 0 and 100, got {0}")]
    DepositPercentageOutOfRange(i32),
    #[error("settlement amount must be greater than zero")]
    NonPositiveSettlement,
}

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invoice not found")]
    NotFound,
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invoice {id} cannot go from {from} to {to}")]
    InvalidTransition {
        id: Uuid,
        from: InvoiceStatus,
        to: InvoiceStatus,
    },
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Payment failed: {0}")]
    PaymentFailed(String),
    #[error("Remote call failed: {0}")]
    Remote(String),
    #[error("Internal error: {0}")]
    Internal(String),
}
