use chrono::NaiveDate;

use crate::models::{ResolvedRecord, TransactionRecord};

/// Parse a report number, ignoring thousands separators. Non-numeric input is `None`.
pub fn parse_number(raw: &str) -> Option<f64> {
    let s = raw.replace(',', "");
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Normalize a `day.month.year` label to `YYYY-MM-DD`.
///
/// Anything but digits and dots is discarded first. Two-digit years are read as 20xx.
pub fn normalize_date(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let parts: Vec<&str> = cleaned.split('.').collect();
    if parts.len() != 3 {
        return None;
    }
    let (day, month, year) = (parts[0], parts[1], parts[2]);
    let year: i32 = match year.len() {
        2 => format!("20{year}").parse().ok()?,
        4 => year.parse().ok()?,
        _ => return None,
    };
    let month: u32 = month.parse().ok()?;
    let day: u32 = day.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day).map(|d| d.format("%Y-%m-%d").to_string())
}

/// Turn a resolved candidate into a storable transaction, or `None` when it must be excluded.
pub fn sanitize(record: &ResolvedRecord) -> Option<TransactionRecord> {
    let candidate = &record.candidate;
    if !candidate.is_persistable() {
        return None;
    }
    let Some(date) = normalize_date(&candidate.date) else {
        tracing::debug!(date = %candidate.date, service = %candidate.service_name, "invalid date, skipping");
        return None;
    };
    Some(TransactionRecord {
        provider_id: record.provider_id.clone(),
        service_id: record.service_id.clone(),
        date,
        group: candidate.group.as_str().to_string(),
        service_name: candidate.service_name.clone(),
        price: candidate.price.unwrap_or(0.0),
        quantity: candidate.quantity.unwrap_or(0.0),
        amount: candidate.amount.unwrap_or(0.0),
    })
}

pub fn sanitize_all(records: &[ResolvedRecord]) -> Vec<TransactionRecord> {
    records.iter().filter_map(sanitize).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Group, RawCandidate};

    fn resolved(date: &str, group: Group, quantity: Option<f64>, amount: Option<f64>) -> ResolvedRecord {
        ResolvedRecord {
            provider_id: "p1".to_string(),
            service_id: "s1".to_string(),
            candidate: RawCandidate {
                service_name: "ServiceX 4321".to_string(),
                group,
                price: None,
                date: date.to_string(),
                quantity,
                amount,
            },
        }
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("1,234.56"), Some(1234.56));
        assert_eq!(parse_number("  42 "), Some(42.0));
        assert_eq!(parse_number("1.50"), Some(1.5));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("NaN"), None);
    }

    #[test]
    fn test_normalize_date_two_and_four_digit_years() {
        assert_eq!(normalize_date("01.01.24"), Some("2024-01-01".to_string()));
        assert_eq!(normalize_date("5.3.2023"), Some("2023-03-05".to_string()));
        assert_eq!(normalize_date(" 31. 12. 2024 "), Some("2024-12-31".to_string()));
    }

    #[test]
    fn test_normalize_date_rejects_malformed() {
        assert_eq!(normalize_date("2024-01-01"), None);
        assert_eq!(normalize_date("01.01"), None);
        assert_eq!(normalize_date("01.01.2024.5"), None);
        assert_eq!(normalize_date("31.02.2024"), None);
        assert_eq!(normalize_date("01.13.24"), None);
        assert_eq!(normalize_date("01.01.124"), None);
        assert_eq!(normalize_date(""), None);
    }

    #[test]
    fn test_sanitize_defaults_missing_numbers() {
        let tx = sanitize(&resolved("02.01.24", Group::Prepaid, Some(20.0), None)).unwrap();
        assert_eq!(tx.date, "2024-01-02");
        assert_eq!(tx.group, "prepaid");
        assert_eq!(tx.service_name, "ServiceX 4321");
        assert_eq!(tx.price, 0.0);
        assert_eq!(tx.amount, 0.0);
        assert_eq!(tx.quantity, 20.0);
    }

    #[test]
    fn test_sanitize_excludes_invalid_rows() {
        assert!(sanitize(&resolved("Jan 1", Group::Prepaid, Some(1.0), None)).is_none());
        assert!(sanitize(&resolved("01.01.24", Group::Postpaid, Some(1.0), None)).is_none());
        assert!(sanitize(&resolved("01.01.24", Group::Prepaid, Some(0.0), None)).is_none());
    }
}
