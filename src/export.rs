use std::io::Write;
use std::path::Path;

use crate::error::Result;
use crate::kind::ProviderKind;
use crate::models::ResolvedRecord;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|n| n.to_string()).unwrap_or_default()
}

/// Write resolved records as a BOM-prefixed UTF-8 CSV for spreadsheet tools.
pub fn write_csv<W: Write>(mut out: W, kind: ProviderKind, records: &[ResolvedRecord]) -> Result<()> {
    out.write_all(UTF8_BOM)?;
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record([
        kind.provider_id_column(),
        "serviceId",
        "group",
        "serviceName",
        "price",
        "date",
        "quantity",
        "amount",
    ])?;
    for r in records {
        let c = &r.candidate;
        let (price, quantity, amount) = (fmt_opt(c.price), fmt_opt(c.quantity), fmt_opt(c.amount));
        wtr.write_record([
            r.provider_id.as_str(),
            r.service_id.as_str(),
            c.group.as_str(),
            c.service_name.as_str(),
            price.as_str(),
            c.date.as_str(),
            quantity.as_str(),
            amount.as_str(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write the CSV to `path`, creating parent directories. Nothing is written for an empty set.
pub fn save_csv(path: &Path, kind: ProviderKind, records: &[ResolvedRecord]) -> Result<usize> {
    if records.is_empty() {
        return Ok(0);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    write_csv(std::io::BufWriter::new(file), kind, records)?;
    tracing::info!(path = %path.display(), records = records.len(), "saved csv");
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Group, RawCandidate};

    fn record() -> ResolvedRecord {
        ResolvedRecord {
            provider_id: "p1".to_string(),
            service_id: "s1".to_string(),
            candidate: RawCandidate {
                service_name: "Parking, zona 1001".to_string(),
                group: Group::Prepaid,
                price: Some(1.5),
                date: "01.01.24".to_string(),
                quantity: Some(10.0),
                amount: None,
            },
        }
    }

    #[test]
    fn test_csv_has_bom_and_kind_header() {
        let mut buf = Vec::new();
        write_csv(&mut buf, ProviderKind::Parking, &[record()]).unwrap();
        assert!(buf.starts_with(UTF8_BOM));
        let text = String::from_utf8(buf[UTF8_BOM.len()..].to_vec()).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "parkingServiceId,serviceId,group,serviceName,price,date,quantity,amount"
        );
        assert_eq!(lines.next().unwrap(), "p1,s1,prepaid,\"Parking, zona 1001\",1.5,01.01.24,10,");
    }

    #[test]
    fn test_vas_header_uses_provider_id() {
        let mut buf = Vec::new();
        write_csv(&mut buf, ProviderKind::Vas, &[]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.trim_start_matches('\u{feff}').starts_with("providerId,"));
    }

    #[test]
    fn test_save_csv_skips_empty_sets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("out.csv");
        assert_eq!(save_csv(&path, ProviderKind::Parking, &[]).unwrap(), 0);
        assert!(!path.exists());
        assert_eq!(save_csv(&path, ProviderKind::Parking, &[record()]).unwrap(), 1);
        assert!(path.exists());
    }
}
