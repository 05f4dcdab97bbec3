//! Invoice settlement arithmetic.
//!
//! Every place that needs a subtotal, total, deposit or remaining balance goes
//! through [`compute`]. All values are integer cents; percentages truncate
//! toward zero and the remaining balance is derived by subtraction, so
//! `deposit + remaining == total` always holds.

use serde::Serialize;

use super::invoice::{Discount, LineItem};
use super::money::{percent_of, Cents};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub subtotal: Cents,
    /// Discount actually applied, after clamping to the subtotal.
    pub discount: Cents,
    pub total: Cents,
    pub deposit: Cents,
    pub remaining: Cents,
}

/// Σ(price × quantity).
pub fn subtotal(items: &[LineItem]) -> Cents {
    items
        .iter()
        .fold(0, |acc: Cents, item| acc.saturating_add(item.line_total()))
}

/// Discount for `subtotal`, never more than the subtotal and never negative.
pub fn applied_discount(subtotal: Cents, discount: Discount) -> Cents {
    let subtotal = subtotal.max(0);
    let raw = match discount {
        Discount::Flat(amount) => amount,
        Discount::Percentage(pct) => percent_of(subtotal, pct.max(0)),
    };
    raw.clamp(0, subtotal)
}

pub fn calculate_total(items: &[LineItem], discount: Discount) -> Cents {
    let subtotal = subtotal(items).max(0);
    subtotal - applied_discount(subtotal, discount)
}

/// Portion of `total` due up front. Zero when no deposit is configured.
pub fn calculate_deposit(total: Cents, deposit_percentage: i32) -> Cents {
    if deposit_percentage <= 0 || total <= 0 {
        return 0;
    }
    percent_of(total, deposit_percentage.min(100))
}

pub fn remaining(total: Cents, deposit_percentage: i32) -> Cents {
    total - calculate_deposit(total, deposit_percentage)
}

pub fn compute(items: &[LineItem], discount: Discount, deposit_percentage: i32) -> Totals {
    let subtotal = subtotal(items).max(0);
    let discount = applied_discount(subtotal, discount);
    let total = subtotal - discount;
    let deposit = calculate_deposit(total, deposit_percentage);
    Totals {
        subtotal,
        discount,
        total,
        deposit,
        remaining: total - deposit,
    }
}
