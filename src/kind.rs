use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{IngestError, Result};

// ---------------------------------------------------------------------------
// Provider kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Parking,
    Vas,
}

impl ProviderKind {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Parking => "parking",
            Self::Vas => "vas",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Parking => "Parking service",
            Self::Vas => "VAS provider",
        }
    }

    pub fn provider_table(&self) -> &'static str {
        match self {
            Self::Parking => "parking_services",
            Self::Vas => "providers",
        }
    }

    pub fn transaction_table(&self) -> &'static str {
        match self {
            Self::Parking => "parking_transactions",
            Self::Vas => "vas_transactions",
        }
    }

    /// Column header for the provider id in the exported CSV.
    pub fn provider_id_column(&self) -> &'static str {
        match self {
            Self::Parking => "parkingServiceId",
            Self::Vas => "providerId",
        }
    }

    /// Used for both `services.service_type` and `contracts.contract_type`.
    pub fn contract_type(&self) -> &'static str {
        match self {
            Self::Parking => "PARKING",
            Self::Vas => "VAS",
        }
    }

    pub fn archive_dir(&self) -> &'static str {
        match self {
            Self::Parking => "parking-servis",
            Self::Vas => "vas-servis",
        }
    }

    pub fn requires_service_contract(&self) -> bool {
        matches!(self, Self::Parking)
    }

    /// Indexes of the sheets holding report data, given the workbook's sheet count.
    /// Leading sheets are cover and summary pages.
    pub fn data_sheets(&self, sheet_count: usize) -> Vec<usize> {
        match self {
            Self::Parking => vec![3],
            Self::Vas => (3..sheet_count).collect(),
        }
    }

    fn filename_patterns(&self) -> &'static [Regex] {
        static PARKING: OnceLock<Vec<Regex>> = OnceLock::new();
        static VAS: OnceLock<Vec<Regex>> = OnceLock::new();
        let (cell, sources) = match self {
            Self::Parking => (&PARKING, PARKING_PATTERNS),
            Self::Vas => (&VAS, VAS_PATTERNS),
        };
        cell.get_or_init(|| {
            sources
                .iter()
                .map(|src| Regex::new(src).expect("static regex"))
                .collect()
        })
    }

    fn normalize_provider(&self, raw: &str) -> String {
        match self {
            Self::Parking => clean_provider_name(raw),
            Self::Vas => vas_alias(raw)
                .map(str::to_string)
                .unwrap_or_else(|| clean_provider_name(raw)),
        }
    }

    /// Derive the provider name from a report file name.
    pub fn provider_name(&self, file_path: &Path) -> String {
        let filename = file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        for re in self.filename_patterns() {
            if let Some(caps) = re.captures(&filename) {
                return self.normalize_provider(&caps[1]);
            }
        }
        let prefix: String = filename.chars().take(10).collect();
        format!("Unknown_{prefix}")
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        ALL_KINDS
            .iter()
            .find(|k| k.key().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| IngestError::UnknownKind(s.to_string()))
    }
}

pub const ALL_KINDS: &[ProviderKind] = &[ProviderKind::Parking, ProviderKind::Vas];

const PARKING_PATTERNS: &[&str] = &[
    r"_mParking_(.+?)_\d+__\d+_",
    r"Servis__MicropaymentMerchantReport_(.+?)__\d+_",
    r"Parking_(.+?)_\d{8}",
];

const VAS_PATTERNS: &[&str] = &[
    r"(?i)Servis__SDP_([A-Za-z0-9 ]+)_[a-z]+_\d{8}\.xlsx?$",
    r"(?i)Servis_{1,4}SDP_{1,4}([A-Za-z0-9 ]+)_",
    r"(?i)Servis__MicropaymentMerchantReport_([A-Za-z0-9 ]+)_(?:Apps|Standard|Media)_\d+__\d+_\d+",
    r"_mPayment_(.+?)_\d+__\d+_",
    r"VAS_(.+?)_\d{8}",
];

/// Product-line spellings of one VAS provider, keyed by the upper-cased name.
const VAS_PROVIDER_ALIASES: &[(&str, &str)] = &[
    ("NTHMEDIA", "NTH"),
    ("NTH MEDIA", "NTH"),
    ("NTHMEDI", "NTH"),
    ("NTH STANDARD", "NTH"),
    ("NTH APPS", "NTH"),
    ("NTH SAVETOVANJE", "NTH"),
];

/// Canonical name for a VAS provider that reports under several names.
/// Any word starting with `NTH` folds into `NTH`.
fn vas_alias(raw: &str) -> Option<&'static str> {
    let key: String = raw
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .collect::<String>()
        .to_uppercase();
    VAS_PROVIDER_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, canonical)| *canonical)
        .or_else(|| key.split(' ').any(|w| w.starts_with("NTH")).then_some("NTH"))
}

fn clean_provider_name(raw: &str) -> String {
    static LONG_DIGITS: OnceLock<Regex> = OnceLock::new();
    let titled = title_case(&raw.replace('_', " "));
    let re = LONG_DIGITS.get_or_init(|| Regex::new(r"\d{4,}").expect("static regex"));
    re.replace_all(&titled, "").trim().to_string()
}

/// Upper-case the first letter of each alphabetic run, lower-case the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_kind_key() {
        assert_eq!("parking".parse::<ProviderKind>().unwrap(), ProviderKind::Parking);
        assert_eq!("VAS".parse::<ProviderKind>().unwrap(), ProviderKind::Vas);
        assert!("email".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_parking_provider_from_mparking_pattern() {
        let path = PathBuf::from("/in/SDP_mParking_CITY_PARK_1234__5678_2024.xlsx");
        assert_eq!(ProviderKind::Parking.provider_name(&path), "City Park");
    }

    #[test]
    fn test_parking_provider_from_short_pattern() {
        let path = PathBuf::from("Parking_beo_garage_20240131.xlsx");
        assert_eq!(ProviderKind::Parking.provider_name(&path), "Beo Garage");
    }

    #[test]
    fn test_vas_provider_patterns() {
        let path = PathBuf::from("Report_mPayment_TeleMedia_01__02_.xlsx");
        assert_eq!(ProviderKind::Vas.provider_name(&path), "Telemedia");
        let path = PathBuf::from("VAS_Info_Servis_20240201.xls");
        assert_eq!(ProviderKind::Vas.provider_name(&path), "Info Servis");
    }

    #[test]
    fn test_vas_sdp_filenames() {
        let path = PathBuf::from("Servis__SDP_Telekom_media_20240131.xls");
        assert_eq!(ProviderKind::Vas.provider_name(&path), "Telekom");
        let path = PathBuf::from("20240201_Servis__SDP_Info Plus_apps_20240131.xls");
        assert_eq!(ProviderKind::Vas.provider_name(&path), "Info Plus");
        let path = PathBuf::from("Servis___SDP__MEDIAWORKS_old.xlsx");
        assert_eq!(ProviderKind::Vas.provider_name(&path), "Mediaworks");
    }

    #[test]
    fn test_vas_micropayment_filename() {
        let path = PathBuf::from("Servis__MicropaymentMerchantReport_Mobi_Apps_1234__5678_9.xls");
        assert_eq!(ProviderKind::Vas.provider_name(&path), "Mobi");
    }

    #[test]
    fn test_vas_aliases_fold_into_one_provider() {
        for name in [
            "Servis__SDP_NTHMEDIA_media_20240131.xls",
            "Servis__SDP_NTH MEDIA_media_20240131.xls",
            "Servis__SDP_NTH DCB_apps_20240131.xls",
            "Servis__SDP_nth savetovanje_standard_20240131.xls",
        ] {
            assert_eq!(ProviderKind::Vas.provider_name(&PathBuf::from(name)), "NTH", "{name}");
        }
    }

    #[test]
    fn test_vas_alias_needs_word_start() {
        assert_eq!(vas_alias("Synthesis"), None);
        assert_eq!(vas_alias("  nth   apps "), Some("NTH"));
    }

    #[test]
    fn test_parking_keeps_nth_like_names() {
        let path = PathBuf::from("Parking_NTH_Garage_20240131.xlsx");
        assert_eq!(ProviderKind::Parking.provider_name(&path), "Nth Garage");
    }

    #[test]
    fn test_unknown_provider_fallback() {
        let path = PathBuf::from("random-report-file.xlsx");
        assert_eq!(ProviderKind::Vas.provider_name(&path), "Unknown_random-rep");
    }

    #[test]
    fn test_title_case_splits_on_digits() {
        assert_eq!(title_case("mts2go parking"), "Mts2Go Parking");
    }

    #[test]
    fn test_data_sheets() {
        assert_eq!(ProviderKind::Parking.data_sheets(6), vec![3]);
        assert_eq!(ProviderKind::Vas.data_sheets(6), vec![3, 4, 5]);
        assert!(ProviderKind::Vas.data_sheets(2).is_empty());
    }
}
