/// Billing category of a report section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Group {
    Prepaid,
    Postpaid,
    Total,
}

impl Group {
    pub const ALL: [Group; 3] = [Group::Prepaid, Group::Postpaid, Group::Total];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prepaid => "prepaid",
            Self::Postpaid => "postpaid",
            Self::Total => "total",
        }
    }
}

/// One (service row, date column) pair read from a report sheet, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCandidate {
    pub service_name: String,
    pub group: Group,
    pub price: Option<f64>,
    pub date: String,
    pub quantity: Option<f64>,
    pub amount: Option<f64>,
}

impl RawCandidate {
    /// Only prepaid rows with a positive quantity are ever stored.
    pub fn is_persistable(&self) -> bool {
        self.group == Group::Prepaid && self.quantity.is_some_and(|q| q > 0.0)
    }
}

/// A candidate whose provider and service have been resolved.
#[derive(Debug, Clone)]
pub struct ResolvedRecord {
    pub provider_id: String,
    pub service_id: String,
    pub candidate: RawCandidate,
}

/// Sanitized row ready for the upsert engine.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub provider_id: String,
    pub service_id: String,
    pub date: String,
    pub group: String,
    pub service_name: String,
    pub price: f64,
    pub quantity: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStatus {
    Pending,
    InProgress,
    Completed,
    Error,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: ImportStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InProgress)
                | (Self::Pending, Self::Error)
                | (Self::InProgress, Self::Completed)
                | (Self::InProgress, Self::Error)
        )
    }
}

/// File metadata stamped onto the provider row on every import.
#[derive(Debug, Clone)]
pub struct FileMeta {
    pub original_file_name: String,
    pub file_path: String,
    pub file_size: u64,
    pub mime_type: &'static str,
}

impl FileMeta {
    pub fn from_path(path: &std::path::Path) -> std::io::Result<Self> {
        let file_size = std::fs::metadata(path)?.len();
        let original_file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let mime_type = mime_type_for(&original_file_name);
        Ok(Self {
            original_file_name,
            file_path: path.to_string_lossy().to_string(),
            file_size,
            mime_type,
        })
    }
}

pub fn mime_type_for(filename: &str) -> &'static str {
    let lower = filename.to_lowercase();
    if lower.ends_with(".xlsx") || lower.ends_with(".xlsm") {
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    } else if lower.ends_with(".ods") {
        "application/vnd.oasis.opendocument.spreadsheet"
    } else {
        "application/vnd.ms-excel"
    }
}
