use rand::Rng;
use time::Date;
use uuid::Uuid;

use crate::dates;
use crate::models::DEFAULT_DUE_DAYS;

pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// `INV-{YYYY}{MM}-{n:04}` where `n` is one past the number of invoices on file.
pub fn generate_invoice_number(existing_count: usize, today: Date) -> String {
    format!(
        "INV-{:04}{:02}-{:0>4}",
        today.year(),
        u8::from(today.month()),
        existing_count + 1
    )
}

/// `{CAT}-{NAM}-{000..999}` built from the first three characters of the
/// category and the name.
pub fn generate_sku<R: Rng + ?Sized>(name: &str, category: &str, rng: &mut R) -> String {
    let prefix = |s: &str| -> String { s.trim().chars().take(3).collect::<String>().to_uppercase() };
    let n: u32 = rng.gen_range(0..1000);
    format!("{}-{}-{:03}", prefix(category), prefix(name), n)
}

pub fn default_due_date(issue_date: Date) -> Date {
    dates::add_days(issue_date, DEFAULT_DUE_DAYS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use time::macros::date;

    #[test]
    fn invoice_number_is_month_scoped_and_zero_padded() {
        assert_eq!(generate_invoice_number(0, date!(2026 - 10 - 14)), "INV-202610-0001");
        assert_eq!(generate_invoice_number(41, date!(2026 - 03 - 01)), "INV-202603-0042");
        assert_eq!(generate_invoice_number(12_344, date!(2026 - 03 - 01)), "INV-202603-12345");
    }

    #[test]
    fn sku_combines_category_and_name_prefixes() {
        let mut rng = StdRng::seed_from_u64(7);
        let sku = generate_sku("consulting", "services", &mut rng);
        let parts: Vec<&str> = sku.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "SER");
        assert_eq!(parts[1], "CON");
        assert_eq!(parts[2].len(), 3);
        assert!(parts[2].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn sku_handles_short_names() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(generate_sku("ab", "x", &mut rng).starts_with("X-AB-"));
    }

    #[test]
    fn ids_are_unique_uuids() {
        let a = generate_id();
        let b = generate_id();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn due_date_defaults_to_thirty_days_out() {
        assert_eq!(default_due_date(date!(2026 - 10 - 14)), date!(2026 - 11 - 13));
    }
}
