use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime};

pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

pub fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

pub fn now_iso() -> String {
    format_timestamp(OffsetDateTime::now_utc())
}

pub fn format_timestamp(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

pub fn format_ymd(d: Date) -> String {
    format!("{:04}-{:02}-{:02}", d.year(), u8::from(d.month()), d.day())
}

/// `Oct 14, 2026`
pub fn format_display(d: Date) -> String {
    d.format(format_description!(
        "[month repr:short] [day], [year]"
    ))
    .unwrap_or_else(|_| format_ymd(d))
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp; the latter is truncated
/// to the calendar date in its own offset.
pub fn parse_date(raw: &str) -> Result<Date, time::error::Parse> {
    let s = raw.trim();
    if s.contains('T') {
        return OffsetDateTime::parse(s, &Rfc3339).map(|ts| ts.date());
    }
    Date::parse(s, format_description!("[year]-[month]-[day]"))
}

pub fn parse_timestamp(raw: &str) -> Result<OffsetDateTime, time::error::Parse> {
    OffsetDateTime::parse(raw.trim(), &Rfc3339)
}

pub fn add_days(d: Date, days: i64) -> Date {
    d.checked_add(Duration::days(days)).unwrap_or(d)
}

/// Serde adapter for calendar dates stored as `YYYY-MM-DD`.
pub mod ymd {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S: Serializer>(d: &Date, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_ymd(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Date, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_date(&raw).map_err(|e| D::Error::custom(format!("invalid date {raw:?}: {e}")))
    }
}

pub mod rfc3339 {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};
    use time::OffsetDateTime;

    pub fn serialize<S: Serializer>(ts: &OffsetDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_timestamp(*ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<OffsetDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_timestamp(&raw)
            .map_err(|e| D::Error::custom(format!("invalid timestamp {raw:?}: {e}")))
    }
}

pub mod rfc3339_option {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};
    use time::OffsetDateTime;

    pub fn serialize<S: Serializer>(ts: &Option<OffsetDateTime>, s: S) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => s.serialize_str(&super::format_timestamp(*ts)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<OffsetDateTime>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        match raw.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(None),
            Some(s) => super::parse_timestamp(s)
                .map(Some)
                .map_err(|e| D::Error::custom(format!("invalid timestamp {s:?}: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn parses_plain_and_timestamp_dates() {
        assert_eq!(parse_date("2024-01-15").unwrap(), date!(2024 - 01 - 15));
        assert_eq!(
            parse_date("2024-01-15T00:00:00.000Z").unwrap(),
            date!(2024 - 01 - 15)
        );
        assert_eq!(
            parse_date("2024-01-15T23:30:00+02:00").unwrap(),
            date!(2024 - 01 - 15)
        );
        assert!(parse_date("15/01/2024").is_err());
    }

    #[test]
    fn formats_dates_for_storage_and_display() {
        assert_eq!(format_ymd(date!(2026 - 03 - 07)), "2026-03-07");
        assert_eq!(format_display(date!(2026 - 10 - 14)), "Oct 14, 2026");
        assert_eq!(
            format_timestamp(datetime!(2026-10-14 08:30:00 UTC)),
            "2026-10-14T08:30:00Z"
        );
    }

    #[test]
    fn add_days_crosses_month_boundaries() {
        assert_eq!(add_days(date!(2026 - 01 - 15), 30), date!(2026 - 02 - 14));
    }
}
