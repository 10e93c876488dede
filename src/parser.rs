use std::collections::BTreeSet;

use crate::grid::CellGrid;
use crate::models::{Group, RawCandidate};
use crate::sanitizer::parse_number;

/// First column holding per-date values; columns 0..3 are name, price, unit.
const FIRST_DATE_COL: usize = 3;

/// Caption keywords some providers put in the row right after the header.
const TITLE_KEYWORDS: &[&str] = &["servis", "izveštaj", "izvestaj", "report"];

/// Date columns from the header row, minus a trailing TOTAL column.
fn date_columns(grid: &CellGrid) -> Vec<(usize, String)> {
    let header = grid.row(0);
    let end = match header.last() {
        Some(last) if last.eq_ignore_ascii_case("total") => header.len() - 1,
        _ => header.len(),
    };
    (FIRST_DATE_COL..end.max(FIRST_DATE_COL))
        .map(|col| (col, clean_date(&header[col])))
        .collect()
}

/// Drop whitespace and trailing dots from a header date label.
fn clean_date(raw: &str) -> String {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    compact.trim_end_matches('.').to_string()
}

fn group_keyword(label: &str) -> Option<Group> {
    let lower = label.to_lowercase();
    Group::ALL.into_iter().find(|g| lower.contains(g.as_str()))
}

fn is_title_row(label: &str) -> bool {
    let lower = label.to_lowercase();
    TITLE_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// What a report yields: persistable candidates plus every service row seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedSheet {
    pub candidates: Vec<RawCandidate>,
    /// Names of all service blocks, whatever their group or quantities.
    pub service_names: BTreeSet<String>,
}

impl ParsedSheet {
    pub fn absorb(&mut self, other: ParsedSheet) {
        self.candidates.extend(other.candidates);
        self.service_names.extend(other.service_names);
    }
}

/// Walk one report sheet and return its persistable candidates.
///
/// Service blocks are two rows: quantities on the service row, amounts on the
/// row after it. A row whose first cell names a group switches the group for
/// every following block. Only prepaid candidates with a positive quantity are
/// kept as candidates, but every block's name is recorded.
pub fn parse_sheet(grid: &CellGrid) -> ParsedSheet {
    let mut out = Vec::new();
    let mut service_names = BTreeSet::new();
    if grid.is_empty() {
        return ParsedSheet::default();
    }
    let dates = date_columns(grid);
    let mut current_group = Group::Prepaid;

    let mut i = 1;
    while i < grid.len() {
        let label = grid.cell(i, 0);

        if grid.is_blank_row(i) {
            i += 1;
            continue;
        }
        if grid.cell(i, 1).to_lowercase().contains("total") {
            i += 1;
            continue;
        }
        if i == 1 && is_title_row(label) {
            i += 1;
            continue;
        }
        // A service name containing a group keyword is read as a group switch.
        if let Some(group) = group_keyword(label) {
            current_group = group;
            i += 1;
            continue;
        }
        if label.is_empty() {
            i += 1;
            continue;
        }

        service_names.insert(label.to_string());
        let price = parse_number(grid.cell(i, 1));
        let has_amount_row = i + 1 < grid.len();
        for (col, date) in &dates {
            let quantity = parse_number(grid.cell(i, *col));
            let amount = if has_amount_row {
                parse_number(grid.cell(i + 1, *col))
            } else {
                None
            };
            let candidate = RawCandidate {
                service_name: label.to_string(),
                group: current_group,
                price,
                date: date.clone(),
                quantity,
                amount,
            };
            if candidate.is_persistable() {
                out.push(candidate);
            }
        }
        i += 2;
    }

    tracing::debug!(
        date_columns = dates.len(),
        candidates = out.len(),
        "parsed sheet"
    );
    ParsedSheet {
        candidates: out,
        service_names,
    }
}
