//! Invoice arithmetic.
//!
//! None of these functions fail: a non-finite, negative or out-of-range input
//! contributes zero and is reported with a warning.

use serde::Serialize;

use crate::models::InvoiceItem;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceTotals {
    pub subtotal: f64,
    pub discount_amount: f64,
    pub tax_amount: f64,
    pub total: f64,
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn valid_amount(v: f64) -> bool {
    v.is_finite() && v >= 0.0
}

fn valid_rate(v: f64) -> bool {
    v.is_finite() && (0.0..=100.0).contains(&v)
}

pub fn calculate_item_total(quantity: f64, unit_price: f64) -> f64 {
    if !valid_amount(quantity) || !valid_amount(unit_price) {
        tracing::warn!(quantity, unit_price, "invalid item input, using 0");
        return 0.0;
    }
    round2(quantity * unit_price)
}

pub fn calculate_subtotal(items: &[InvoiceItem]) -> f64 {
    let sum: f64 = items
        .iter()
        .map(|it| calculate_item_total(it.quantity, it.unit_price))
        .sum();
    round2(sum)
}

pub fn calculate_discount_amount(amount: f64, discount_rate: f64) -> f64 {
    percentage_of(amount, discount_rate, "discount")
}

pub fn calculate_tax_amount(amount: f64, tax_rate: f64) -> f64 {
    percentage_of(amount, tax_rate, "tax")
}

fn percentage_of(amount: f64, rate: f64, what: &'static str) -> f64 {
    if !valid_amount(amount) || !valid_rate(rate) {
        tracing::warn!(amount, rate, kind = what, "invalid rate input, using 0");
        return 0.0;
    }
    round2(amount * rate / 100.0)
}

/// Discount comes off the subtotal first; tax is charged on what remains.
pub fn calculate_invoice_total(subtotal: f64, tax_rate: f64, discount_rate: f64) -> InvoiceTotals {
    let subtotal = sanitize(subtotal, valid_amount, "subtotal");
    let tax_rate = sanitize(tax_rate, valid_rate, "taxRate");
    let discount_rate = sanitize(discount_rate, valid_rate, "discountRate");

    let discount_amount = calculate_discount_amount(subtotal, discount_rate);
    let taxable = (subtotal - discount_amount).max(0.0);
    let tax_amount = calculate_tax_amount(taxable, tax_rate);
    let total = (taxable + tax_amount).max(0.0);

    InvoiceTotals {
        subtotal: round2(subtotal),
        discount_amount: round2(discount_amount),
        tax_amount: round2(tax_amount),
        total: round2(total),
    }
}

pub fn calculate_totals(items: &[InvoiceItem], tax_rate: f64, discount_rate: f64) -> InvoiceTotals {
    calculate_invoice_total(calculate_subtotal(items), tax_rate, discount_rate)
}

fn sanitize(v: f64, ok: fn(f64) -> bool, field: &'static str) -> f64 {
    if ok(v) {
        v
    } else {
        tracing::warn!(field, value = v, "invalid invoice input, using 0");
        0.0
    }
}

/// `$1,234.50`
pub fn format_currency(v: f64) -> String {
    let v = if v.is_finite() { v } else { 0.0 };
    let s = format!("{:.2}", v.abs());
    let (int_part, dec_part) = s.split_once('.').unwrap_or((s.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if v < 0.0 && round2(v) != 0.0 { "-" } else { "" };
    format!("{sign}${grouped}.{dec_part}")
}

pub fn format_percentage(v: f64) -> String {
    format!("{}%", round2(v))
}
