//! Line-item builder for a single invoice-editing session.

use uuid::Uuid;

use super::calculator::{self, Totals};
use super::errors::{DomainError, ValidationError};
use super::invoice::{Discount, LineItem, LineItemType, Recipient};
use super::money::{percent_of, Cents};
use super::ports::Catalog;

/// Booking-linked items allowed on one couple invoice.
pub const MAX_BOOKING_ITEMS: usize = 3;

/// What kind of row to append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewLineItem {
    /// Pick a package straight from the catalog.
    CatalogPackage,
    /// Pick one of the couple's existing bookings.
    Booking,
    StoreProduct,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineItemField {
    ServicePackage(Uuid),
    StoreProduct(Uuid),
    Booking(Uuid),
    Quantity(i32),
    CustomDescription(String),
    CustomPrice(Cents),
}

/// One requested line item as submitted by an operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItemRequest {
    pub item_type: LineItemType,
    pub service_package_id: Option<Uuid>,
    pub store_product_id: Option<Uuid>,
    pub booking_id: Option<Uuid>,
    pub custom_description: Option<String>,
    pub custom_price: Option<Cents>,
    pub quantity: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct ComposeRequest {
    pub recipient: Option<Recipient>,
    pub items: Vec<LineItemRequest>,
    pub discount: Discount,
    pub deposit_percentage: i32,
}

#[derive(Debug, Clone, Default)]
pub struct InvoiceComposer {
    recipient: Option<Recipient>,
    items: Vec<LineItem>,
    discount: Discount,
    deposit_percentage: i32,
}

impl InvoiceComposer {
    pub fn new(recipient: Option<Recipient>) -> Self {
        Self {
            recipient,
            ..Self::default()
        }
    }

    /// Replay a submitted request through the same selection rules an
    /// operator goes through, then validate the result.
    ///
    /// Prices of non-custom items always come from the catalog.
    pub fn from_request(request: &ComposeRequest, catalog: &dyn Catalog) -> Result<Self, DomainError> {
        let mut composer = Self::new(request.recipient);
        composer.set_discount(request.discount)?;
        composer.set_deposit_percentage(request.deposit_percentage)?;

        for line in &request.items {
            let kind = match line.item_type {
                LineItemType::ServicePackage if line.booking_id.is_some() => NewLineItem::Booking,
                LineItemType::ServicePackage => NewLineItem::CatalogPackage,
                LineItemType::StoreProduct => NewLineItem::StoreProduct,
                LineItemType::Custom => NewLineItem::Custom,
            };
            let index = composer.add_line_item(kind)?;

            match (kind, line) {
                (NewLineItem::Booking, LineItemRequest { booking_id: Some(id), .. }) => {
                    composer.update_line_item(index, LineItemField::Booking(*id), catalog)?;
                }
                (NewLineItem::CatalogPackage, LineItemRequest { service_package_id: Some(id), .. }) => {
                    composer.update_line_item(index, LineItemField::ServicePackage(*id), catalog)?;
                }
                (NewLineItem::StoreProduct, LineItemRequest { store_product_id: Some(id), .. }) => {
                    composer.update_line_item(index, LineItemField::StoreProduct(*id), catalog)?;
                }
                (NewLineItem::Custom, _) => {
                    if let Some(description) = &line.custom_description {
                        composer.update_line_item(
                            index,
                            LineItemField::CustomDescription(description.clone()),
                            catalog,
                        )?;
                    }
                    if let Some(price) = line.custom_price {
                        composer.update_line_item(index, LineItemField::CustomPrice(price), catalog)?;
                    }
                }
                _ => {}
            }

            if let Some(quantity) = line.quantity {
                composer.update_line_item(index, LineItemField::Quantity(quantity), catalog)?;
            }
        }

        composer.validate()?;
        Ok(composer)
    }

    pub fn recipient(&self) -> Option<Recipient> {
        self.recipient
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn discount(&self) -> Discount {
        self.discount
    }

    pub fn deposit_percentage(&self) -> i32 {
        self.deposit_percentage
    }

    pub fn set_discount(&mut self, discount: Discount) -> Result<(), ValidationError> {
        match discount {
            Discount::Flat(amount) if amount < 0 => Err(ValidationError::NegativeDiscount),
            Discount::Percentage(pct) if !(0..=100).contains(&pct) => {
                Err(ValidationError::DiscountPercentageOutOfRange(pct))
            }
            _ => {
                self.discount = discount;
                Ok(())
            }
        }
    }

    pub fn set_deposit_percentage(&mut self, percentage: i32) -> Result<(), ValidationError> {
        if !(0..=100).contains(&percentage) {
            return Err(ValidationError::DepositPercentageOutOfRange(percentage));
        }
        self.deposit_percentage = percentage;
        Ok(())
    }

    pub fn booking_linked_count(&self) -> usize {
        self.items.iter().filter(|i| i.is_booking_linked()).count()
    }

    /// Append a defaulted item and return its index.
    pub fn add_line_item(&mut self, kind: NewLineItem) -> Result<usize, ValidationError> {
        let item = match kind {
            NewLineItem::Booking => {
                if !matches!(self.recipient, Some(Recipient::Couple(_))) {
                    return Err(ValidationError::BookingRequiresCouple);
                }
                if self.booking_linked_count() >= MAX_BOOKING_ITEMS {
                    return Err(ValidationError::TooManyBookingItems {
                        max: MAX_BOOKING_ITEMS,
                    });
                }
                LineItem::booking_slot()
            }
            NewLineItem::CatalogPackage => LineItem::new(LineItemType::ServicePackage),
            NewLineItem::StoreProduct => LineItem::new(LineItemType::StoreProduct),
            NewLineItem::Custom => LineItem::new(LineItemType::Custom),
        };
        self.items.push(item);
        Ok(self.items.len() - 1)
    }

    pub fn update_line_item(
        &mut self,
        index: usize,
        field: LineItemField,
        catalog: &dyn Catalog,
    ) -> Result<(), DomainError> {
        let position = index + 1;
        if index >= self.items.len() {
            return Err(ValidationError::NoSuchLineItem { position }.into());
        }

        match field {
            LineItemField::ServicePackage(id) => {
                let package = catalog
                    .service_package(id)?
                    .ok_or(ValidationError::UnresolvedReference {
                        position,
                        reference: "service package",
                        id,
                    })?;
                let item = &mut self.items[index];
                item.item_type = LineItemType::ServicePackage;
                item.from_booking = false;
                item.booking_id = None;
                item.store_product_id = None;
                item.service_package_id = Some(package.id);
                item.custom_price = package.price;
                item.vendor_id = None;
                item.stripe_account_id = None;
            }
            LineItemField::StoreProduct(id) => {
                let product = catalog
                    .store_product(id)?
                    .ok_or(ValidationError::UnresolvedReference {
                        position,
                        reference: "store product",
                        id,
                    })?;
                let item = &mut self.items[index];
                item.item_type = LineItemType::StoreProduct;
                item.from_booking = false;
                item.booking_id = None;
                item.service_package_id = None;
                item.store_product_id = Some(product.id);
                item.custom_price = product.price;
                item.vendor_id = None;
                item.stripe_account_id = None;
            }
            LineItemField::Booking(id) => {
                let couple_id = match self.recipient {
                    Some(Recipient::Couple(couple_id)) => couple_id,
                    _ => return Err(ValidationError::BookingRequiresCouple.into()),
                };
                let others_linked = self
                    .items
                    .iter()
                    .enumerate()
                    .filter(|(i, item)| *i != index && item.is_booking_linked())
                    .count();
                if others_linked >= MAX_BOOKING_ITEMS {
                    return Err(ValidationError::TooManyBookingItems {
                        max: MAX_BOOKING_ITEMS,
                    }
                    .into());
                }

                let booking = catalog
                    .booking(id)?
                    .ok_or(ValidationError::UnresolvedReference {
                        position,
                        reference: "booking",
                        id,
                    })?;
                if booking.couple_id != couple_id {
                    return Err(ValidationError::BookingRecipientMismatch {
                        position,
                        booking_id: id,
                    }
                    .into());
                }

                let price = if self.deposit_percentage > 0 {
                    booking
                        .initial_payment
                        .unwrap_or_else(|| percent_of(booking.amount, self.deposit_percentage))
                } else {
                    booking.amount
                };

                let item = &mut self.items[index];
                item.item_type = LineItemType::ServicePackage;
                item.from_booking = true;
                item.booking_id = Some(booking.id);
                item.store_product_id = None;
                item.service_package_id = booking.service_package_id;
                item.custom_price = price;
                item.vendor_id = Some(booking.vendor_id);
                item.stripe_account_id = booking.vendor_stripe_account_id;
            }
            LineItemField::Quantity(quantity) => self.items[index].quantity = quantity,
            LineItemField::CustomDescription(description) => {
                self.items[index].custom_description = Some(description)
            }
            LineItemField::CustomPrice(price) => self.items[index].custom_price = price,
        }
        Ok(())
    }

    pub fn remove_line_item(&mut self, index: usize) -> Result<LineItem, ValidationError> {
        if index >= self.items.len() {
            return Err(ValidationError::NoSuchLineItem {
                position: index + 1,
            });
        }
        Ok(self.items.remove(index))
    }

    pub fn totals(&self) -> Totals {
        calculator::compute(&self.items, self.discount, self.deposit_percentage)
    }

    /// Save-time rules. The first violation wins.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let recipient = self.recipient.ok_or(ValidationError::MissingRecipient)?;
        if self.items.is_empty() {
            return Err(ValidationError::NoLineItems);
        }
        if matches!(recipient, Recipient::Couple(_)) && self.booking_linked_count() > MAX_BOOKING_ITEMS
        {
            return Err(ValidationError::TooManyBookingItems {
                max: MAX_BOOKING_ITEMS,
            });
        }

        for (index, item) in self.items.iter().enumerate() {
            let position = index + 1;
            match item.item_type {
                LineItemType::ServicePackage if item.from_booking => {
                    if item.booking_id.is_none() {
                        return Err(ValidationError::MissingReference {
                            position,
                            reference: "booking",
                        });
                    }
                }
                LineItemType::ServicePackage => {
                    if item.service_package_id.is_none() {
                        return Err(ValidationError::MissingReference {
                            position,
                            reference: "service package",
                        });
                    }
                }
                LineItemType::StoreProduct => {
                    if item.store_product_id.is_none() {
                        return Err(ValidationError::MissingReference {
                            position,
                            reference: "store product",
                        });
                    }
                }
                LineItemType::Custom => {
                    let described = item
                        .custom_description
                        .as_deref()
                        .is_some_and(|d| !d.trim().is_empty());
                    if !described {
                        return Err(ValidationError::MissingCustomDescription { position });
                    }
                    if item.custom_price <= 0 {
                        return Err(ValidationError::NonPositiveCustomPrice { position });
                    }
                }
            }
            if item.quantity < 1 {
                return Err(ValidationError::NonPositiveQuantity { position });
            }
        }
        Ok(())
    }

    pub fn into_parts(self) -> (Option<Recipient>, Vec<LineItem>, Discount, i32) {
        (
            self.recipient,
            self.items,
            self.discount,
            self.deposit_percentage,
        )
    }
}
