use serde::Serialize;
use time::macros::{date, format_description};
use time::{Date, Month};

use crate::calculations::round2;
use crate::models::{Client, Invoice, InvoiceStatus, Product};
use crate::status::with_updated_statuses;

pub const LIFETIME_START: Date = date!(2020 - 01 - 01);

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_revenue: f64,
    pub pending_amount: f64,
    pub total_clients: usize,
    pub total_products: usize,
    pub total_invoices: usize,
    pub paid_invoices: usize,
    pub pending_invoices: usize,
}

/// Paid invoices count as revenue, sent ones as pending. Statuses are
/// re-derived against `today` first, so a past-due `sent` invoice is overdue.
pub fn dashboard_stats(
    clients: &[Client],
    products: &[Product],
    invoices: &[Invoice],
    today: Date,
) -> DashboardStats {
    let invoices = with_updated_statuses(invoices, today);
    let sum_for = |status: InvoiceStatus| {
        round2(
            invoices
                .iter()
                .filter(|i| i.status == status)
                .map(|i| i.total)
                .sum::<f64>(),
        )
    };
    let count_for = |status: InvoiceStatus| invoices.iter().filter(|i| i.status == status).count();

    DashboardStats {
        total_revenue: sum_for(InvoiceStatus::Paid),
        pending_amount: sum_for(InvoiceStatus::Sent),
        total_clients: clients.len(),
        total_products: products.len(),
        total_invoices: invoices.len(),
        paid_invoices: count_for(InvoiceStatus::Paid),
        pending_invoices: count_for(InvoiceStatus::Sent),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RevenuePeriod {
    OneMonth,
    ThreeMonths,
    SixMonths,
    #[default]
    TwelveMonths,
    Lifetime,
    Custom { start: Date, end: Date },
}

impl RevenuePeriod {
    /// Inclusive `(start, end)` of the period ending `today`.
    pub fn range(&self, today: Date) -> (Date, Date) {
        match *self {
            RevenuePeriod::OneMonth => (sub_months(today, 1), today),
            RevenuePeriod::ThreeMonths => (sub_months(today, 3), today),
            RevenuePeriod::SixMonths => (sub_months(today, 6), today),
            RevenuePeriod::TwelveMonths => (sub_months(today, 12), today),
            RevenuePeriod::Lifetime => (LIFETIME_START, today),
            RevenuePeriod::Custom { start, end } => (start, end),
        }
    }
}

/// `1m`, `3m`, `6m`, `12m`, `lifetime`, or `YYYY-MM-DD..YYYY-MM-DD`.
impl std::str::FromStr for RevenuePeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1m" => Ok(RevenuePeriod::OneMonth),
            "3m" => Ok(RevenuePeriod::ThreeMonths),
            "6m" => Ok(RevenuePeriod::SixMonths),
            "12m" => Ok(RevenuePeriod::TwelveMonths),
            "lifetime" => Ok(RevenuePeriod::Lifetime),
            other => {
                let (start, end) = other
                    .split_once("..")
                    .ok_or_else(|| format!("unknown period: {other}"))?;
                let parse = |raw: &str| {
                    crate::dates::parse_date(raw.trim()).map_err(|e| format!("invalid date {raw:?}: {e}"))
                };
                Ok(RevenuePeriod::Custom {
                    start: parse(start)?,
                    end: parse(end)?,
                })
            }
        }
    }
}

fn sub_months(d: Date, months: u32) -> Date {
    let total = d.year() * 12 + i32::from(u8::from(d.month())) - 1 - months as i32;
    let year = total.div_euclid(12);
    let month = Month::try_from((total.rem_euclid(12) + 1) as u8).unwrap_or(Month::January);
    let day = d.day().min(time::util::days_in_year_month(year, month));
    Date::from_calendar_date(year, month, day).unwrap_or(d)
}

fn next_month(d: Date) -> Option<Date> {
    let (year, month) = match d.month() {
        Month::December => (d.year() + 1, Month::January),
        m => (d.year(), m.next()),
    };
    Date::from_calendar_date(year, month, 1).ok()
}

fn month_start(d: Date) -> Date {
    d.replace_day(1).unwrap_or(d)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenuePoint {
    /// `YYYY-MM`
    pub key: String,
    /// `Mon YYYY`
    pub month: String,
    pub revenue: f64,
}

/// Monthly paid revenue by issue date over the period, one point per month
/// including empty ones. An inverted custom range yields no points.
pub fn revenue_series(invoices: &[Invoice], period: RevenuePeriod, today: Date) -> Vec<RevenuePoint> {
    let (start, end) = period.range(today);
    if start > end {
        return Vec::new();
    }

    let key_fmt = format_description!("[year]-[month]");
    let label_fmt = format_description!("[month repr:short] [year]");

    let mut points = Vec::new();
    let mut cursor = month_start(start);
    let last = month_start(end);
    while cursor <= last {
        let revenue: f64 = invoices
            .iter()
            .filter(|i| i.status == InvoiceStatus::Paid)
            .filter(|i| i.issue_date >= start && i.issue_date <= end)
            .filter(|i| i.issue_date.year() == cursor.year() && i.issue_date.month() == cursor.month())
            .map(|i| i.total)
            .sum();
        points.push(RevenuePoint {
            key: cursor.format(key_fmt).unwrap_or_default(),
            month: cursor.format(label_fmt).unwrap_or_default(),
            revenue: round2(revenue),
        });
        match next_month(cursor) {
            Some(next) => cursor = next,
            None => break,
        }
    }
    points
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Only(InvoiceStatus),
}

impl std::str::FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            return Ok(StatusFilter::All);
        }
        s.parse().map(StatusFilter::Only)
    }
}

pub fn filter_invoices<'a>(invoices: &'a [Invoice], search: &str, status: StatusFilter) -> Vec<&'a Invoice> {
    let needle = search.trim().to_lowercase();
    invoices
        .iter()
        .filter(|i| {
            needle.is_empty()
                || i.invoice_number.to_lowercase().contains(&needle)
                || i.client_name.to_lowercase().contains(&needle)
        })
        .filter(|i| match status {
            StatusFilter::All => true,
            StatusFilter::Only(s) => i.status == s,
        })
        .collect()
}

pub fn recent_invoices(invoices: &[Invoice], n: usize) -> Vec<&Invoice> {
    let mut sorted: Vec<&Invoice> = invoices.iter().collect();
    sorted.sort_by(|a, b| b.issue_date.cmp(&a.issue_date));
    sorted.truncate(n);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_client, sample_invoice, sample_product};

    const TODAY: Date = date!(2026 - 10 - 14);

    fn invoice(id: &str, number: &str, client: &str, issued: Date, status: InvoiceStatus, total: f64) -> Invoice {
        let mut inv = sample_invoice();
        inv.id = id.to_string();
        inv.invoice_number = number.to_string();
        inv.client_name = client.to_string();
        inv.issue_date = issued;
        inv.status = status;
        inv.total = total;
        inv
    }

    fn book() -> Vec<Invoice> {
        vec![
            invoice("a", "INV-202608-0001", "Acme", date!(2026 - 08 - 03), InvoiceStatus::Paid, 100.0),
            invoice("b", "INV-202608-0002", "Globex", date!(2026 - 08 - 20), InvoiceStatus::Paid, 50.5),
            invoice("c", "INV-202609-0003", "Initech", date!(2026 - 09 - 02), InvoiceStatus::Sent, 75.0),
            invoice("d", "INV-202610-0004", "Acme", date!(2026 - 10 - 01), InvoiceStatus::Draft, 20.0),
            invoice("e", "INV-202510-0005", "Globex", date!(2025 - 10 - 20), InvoiceStatus::Paid, 300.0),
        ]
    }

    #[test]
    fn dashboard_sums_paid_and_sent() {
        let stats = dashboard_stats(&[sample_client()], &[sample_product()], &book(), TODAY);
        assert_eq!(stats.total_revenue, 450.5);
        assert_eq!(stats.pending_amount, 75.0);
        assert_eq!(stats.total_invoices, 5);
        assert_eq!(stats.paid_invoices, 3);
        assert_eq!(stats.pending_invoices, 1);
        assert_eq!(stats.total_clients, 1);
    }

    #[test]
    fn past_due_sent_invoice_is_not_pending() {
        let mut late = invoice("f", "INV-202608-0006", "Initech", date!(2026 - 08 - 01), InvoiceStatus::Sent, 110.0);
        late.due_date = date!(2026 - 09 - 01);

        let stats = dashboard_stats(&[], &[], &[late.clone()], TODAY);
        assert_eq!(stats.pending_amount, 0.0);
        assert_eq!(stats.pending_invoices, 0);
        assert_eq!(stats.total_invoices, 1);

        let before_due = dashboard_stats(&[], &[], &[late], date!(2026 - 08 - 15));
        assert_eq!(before_due.pending_amount, 110.0);
        assert_eq!(before_due.pending_invoices, 1);
    }

    #[test]
    fn three_month_series_has_every_month() {
        let points = revenue_series(&book(), RevenuePeriod::ThreeMonths, TODAY);
        let keys: Vec<&str> = points.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["2026-07", "2026-08", "2026-09", "2026-10"]);
        assert_eq!(points[0].revenue, 0.0);
        assert_eq!(points[1].revenue, 150.5);
        assert_eq!(points[1].month, "Aug 2026");
        assert_eq!(points[2].revenue, 0.0);
    }

    #[test]
    fn twelve_months_starts_a_year_back() {
        let points = revenue_series(&book(), RevenuePeriod::TwelveMonths, TODAY);
        assert_eq!(points.len(), 13);
        assert_eq!(points[0].key, "2025-10");
        assert_eq!(points[0].revenue, 300.0);
    }

    #[test]
    fn lifetime_and_custom_ranges() {
        let lifetime = revenue_series(&book(), RevenuePeriod::Lifetime, TODAY);
        assert_eq!(lifetime.first().map(|p| p.key.as_str()), Some("2020-01"));
        assert_eq!(lifetime.iter().map(|p| p.revenue).sum::<f64>(), 450.5);

        let custom: RevenuePeriod = "2026-08-10..2026-09-30".parse().unwrap();
        let points = revenue_series(&book(), custom, TODAY);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].revenue, 50.5);

        let inverted = RevenuePeriod::Custom {
            start: date!(2026 - 09 - 01),
            end: date!(2026 - 08 - 01),
        };
        assert!(revenue_series(&book(), inverted, TODAY).is_empty());
    }

    #[test]
    fn month_arithmetic_clamps_to_month_end() {
        assert_eq!(sub_months(date!(2026 - 03 - 31), 1), date!(2026 - 02 - 28));
        assert_eq!(sub_months(date!(2026 - 01 - 15), 1), date!(2025 - 12 - 15));
        assert_eq!(sub_months(TODAY, 12), date!(2025 - 10 - 14));
    }

    #[test]
    fn period_parsing() {
        assert_eq!("6M".parse::<RevenuePeriod>().unwrap(), RevenuePeriod::SixMonths);
        assert!("2y".parse::<RevenuePeriod>().is_err());
    }

    #[test]
    fn filter_matches_number_or_client_case_insensitively() {
        let invoices = book();
        let hits = filter_invoices(&invoices, "acme", StatusFilter::All);
        assert_eq!(hits.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(), vec!["a", "d"]);

        let hits = filter_invoices(&invoices, "202608", "paid".parse().unwrap());
        assert_eq!(hits.len(), 2);

        let hits = filter_invoices(&invoices, "", "all".parse().unwrap());
        assert_eq!(hits.len(), 5);

        let hits = filter_invoices(&invoices, "globex", StatusFilter::Only(InvoiceStatus::Sent));
        assert!(hits.is_empty());
    }

    #[test]
    fn recent_lists_newest_first() {
        let invoices = book();
        let recent = recent_invoices(&invoices, 3);
        assert_eq!(recent.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(), vec!["d", "c", "b"]);
    }
}
