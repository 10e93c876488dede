use std::collections::BTreeSet;
use std::path::Path;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::importer::read_report;
use crate::kind::ProviderKind;
use crate::lifecycle::extract_year;
use crate::sanitizer::normalize_date;
use crate::service_code::extract_service_code;

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|n| n.to_string()).unwrap_or_default()
}

pub fn run(file: &Path, kind: &str) -> Result<()> {
    let kind: ProviderKind = kind.parse()?;
    let report = read_report(kind, file)?;
    let candidates = &report.candidates;

    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let year = extract_year(&file_name, chrono::Datelike::year(&chrono::Local::now()));
    println!("Provider:  {}", kind.provider_name(file).bold());
    println!("Year:      {year}");

    let mut table = Table::new();
    table.set_header(vec!["Service", "Code", "Group", "Date", "Price", "Quantity", "Amount"]);
    for c in candidates {
        let code = match extract_service_code(&c.service_name) {
            Some(code) => code.to_string(),
            None => "-".red().to_string(),
        };
        let date = normalize_date(&c.date).unwrap_or_else(|| c.date.red().to_string());
        table.add_row(vec![
            Cell::new(&c.service_name),
            Cell::new(code),
            Cell::new(c.group.as_str()),
            Cell::new(date),
            Cell::new(fmt_opt(c.price)),
            Cell::new(fmt_opt(c.quantity)),
            Cell::new(fmt_opt(c.amount)),
        ]);
    }
    let codes: BTreeSet<&str> = report
        .service_names
        .iter()
        .filter_map(|name| extract_service_code(name))
        .collect();
    println!("{} candidates\n{table}", candidates.len());
    println!("Codes:     {}", codes.into_iter().collect::<Vec<_>>().join(", "));
    Ok(())
}
