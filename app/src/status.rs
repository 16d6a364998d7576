use time::Date;

use crate::models::{Invoice, InvoiceStatus};

/// Paid and already-overdue invoices are never overdue again.
pub fn is_invoice_overdue(invoice: &Invoice, today: Date) -> bool {
    match invoice.status {
        InvoiceStatus::Paid | InvoiceStatus::Overdue => false,
        InvoiceStatus::Draft | InvoiceStatus::Sent => invoice.due_date < today,
    }
}

/// Only `sent` moves to `overdue`; drafts keep their status until they are sent.
pub fn derive_status(invoice: &Invoice, today: Date) -> InvoiceStatus {
    if invoice.status == InvoiceStatus::Sent && is_invoice_overdue(invoice, today) {
        InvoiceStatus::Overdue
    } else {
        invoice.status
    }
}

pub fn with_updated_statuses(invoices: &[Invoice], today: Date) -> Vec<Invoice> {
    invoices
        .iter()
        .map(|inv| {
            let mut out = inv.clone();
            out.status = derive_status(inv, today);
            out
        })
        .collect()
}

pub fn days_overdue(due_date: Date, today: Date) -> i64 {
    (today - due_date).whole_days().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_invoice;
    use time::macros::date;

    const TODAY: Date = date!(2026 - 10 - 14);

    fn invoice(status: InvoiceStatus, due: Date) -> Invoice {
        let mut inv = sample_invoice();
        inv.status = status;
        inv.due_date = due;
        inv
    }

    #[test]
    fn sent_invoice_due_yesterday_becomes_overdue() {
        let inv = invoice(InvoiceStatus::Sent, date!(2026 - 10 - 13));
        assert_eq!(derive_status(&inv, TODAY), InvoiceStatus::Overdue);
    }

    #[test]
    fn paid_invoice_due_yesterday_is_unchanged() {
        let inv = invoice(InvoiceStatus::Paid, date!(2026 - 10 - 13));
        assert!(!is_invoice_overdue(&inv, TODAY));
        assert_eq!(derive_status(&inv, TODAY), InvoiceStatus::Paid);
    }

    #[test]
    fn due_today_is_not_overdue() {
        let inv = invoice(InvoiceStatus::Sent, TODAY);
        assert_eq!(derive_status(&inv, TODAY), InvoiceStatus::Sent);
    }

    #[test]
    fn draft_past_due_keeps_draft_status() {
        let inv = invoice(InvoiceStatus::Draft, date!(2026 - 09 - 01));
        assert!(is_invoice_overdue(&inv, TODAY));
        assert_eq!(derive_status(&inv, TODAY), InvoiceStatus::Draft);
    }

    #[test]
    fn derivation_is_idempotent() {
        let invoices = vec![
            invoice(InvoiceStatus::Sent, date!(2026 - 10 - 01)),
            invoice(InvoiceStatus::Overdue, date!(2026 - 10 - 01)),
            invoice(InvoiceStatus::Sent, date!(2026 - 12 - 01)),
        ];
        let once = with_updated_statuses(&invoices, TODAY);
        let twice = with_updated_statuses(&once, TODAY);
        assert_eq!(once, twice);
        let statuses: Vec<_> = once.iter().map(|i| i.status).collect();
        assert_eq!(
            statuses,
            vec![InvoiceStatus::Overdue, InvoiceStatus::Overdue, InvoiceStatus::Sent]
        );
    }

    #[test]
    fn days_overdue_never_negative() {
        assert_eq!(days_overdue(date!(2026 - 10 - 04), TODAY), 10);
        assert_eq!(days_overdue(date!(2026 - 10 - 20), TODAY), 0);
    }
}
