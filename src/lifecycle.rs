use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{IngestError, Result};
use crate::kind::ProviderKind;

/// Make a provider name safe for use as a directory name.
pub fn sanitize_provider_name(name: &str) -> String {
    static STRIP: OnceLock<Regex> = OnceLock::new();
    static COLLAPSE: OnceLock<Regex> = OnceLock::new();
    let strip = STRIP.get_or_init(|| Regex::new(r"[^\w\s-]").expect("static regex"));
    let collapse = COLLAPSE.get_or_init(|| Regex::new(r"[-\s]+").expect("static regex"));
    let stripped = strip.replace_all(name, "");
    collapse.replace_all(&stripped, "-").to_string()
}

/// First 4-digit window in the file name that is a plausible report year
/// (2000 through next year), else the current year.
pub fn extract_year(filename: &str, current_year: i32) -> i32 {
    static YEAR: OnceLock<Regex> = OnceLock::new();
    let re = YEAR.get_or_init(|| Regex::new(r"[0-9]{4}").expect("static regex"));
    re.find_iter(filename)
        .filter_map(|m| m.as_str().parse::<i32>().ok())
        .find(|y| (2000..=current_year + 1).contains(y))
        .unwrap_or(current_year)
}

/// Rename, falling back to copy + remove across filesystems.
fn move_file(source: &Path, target: &Path) -> Result<()> {
    if std::fs::rename(source, target).is_ok() {
        return Ok(());
    }
    std::fs::copy(source, target)?;
    std::fs::remove_file(source)?;
    Ok(())
}

fn file_name(path: &Path) -> Result<&std::ffi::OsStr> {
    path.file_name()
        .ok_or_else(|| IngestError::Other(format!("Not a file path: {}", path.display())))
}

/// Where a finalized file ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    Completed(PathBuf),
    /// Landed in the error location; carries the reason when the archive move failed.
    Error(PathBuf, Option<String>),
}

/// Moves source files to their archive or error location.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    archive_root: PathBuf,
    error_dir: PathBuf,
}

impl Lifecycle {
    pub fn new(archive_root: impl Into<PathBuf>, error_dir: impl Into<PathBuf>) -> Self {
        Self {
            archive_root: archive_root.into(),
            error_dir: error_dir.into(),
        }
    }

    /// `{root}/{kind}/{provider}/reports/{year}`
    pub fn archive_dir(&self, kind: ProviderKind, provider_name: &str, year: i32) -> PathBuf {
        self.archive_root
            .join(kind.archive_dir())
            .join(sanitize_provider_name(provider_name))
            .join("reports")
            .join(year.to_string())
    }

    pub fn archive(&self, kind: ProviderKind, source: &Path, provider_name: &str, current_year: i32) -> Result<PathBuf> {
        let name = file_name(source)?;
        let year = extract_year(&name.to_string_lossy(), current_year);
        let dir = self.archive_dir(kind, provider_name, year);
        std::fs::create_dir_all(&dir)?;
        let target = dir.join(name);
        move_file(source, &target)?;
        tracing::info!(from = %source.display(), to = %target.display(), "file archived");
        Ok(target)
    }

    pub fn reject(&self, source: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.error_dir)?;
        let target = self.error_dir.join(file_name(source)?);
        move_file(source, &target)?;
        tracing::warn!(from = %source.display(), to = %target.display(), "file moved to error folder");
        Ok(target)
    }

    /// Archive a successfully processed file; a failed move sends it to the error location instead.
    pub fn complete(
        &self,
        kind: ProviderKind,
        source: &Path,
        provider_name: &str,
        current_year: i32,
    ) -> Result<Placement> {
        match self.archive(kind, source, provider_name, current_year) {
            Ok(target) => Ok(Placement::Completed(target)),
            Err(e) => {
                tracing::error!(file = %source.display(), error = %e, "archive move failed, falling back to error folder");
                let target = self.reject(source)?;
                Ok(Placement::Error(target, Some(e.to_string())))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_provider_name() {
        assert_eq!(sanitize_provider_name("City Park"), "City-Park");
        assert_eq!(sanitize_provider_name("A & B -- Parking!"), "A-B-Parking");
        assert_eq!(sanitize_provider_name("Beograd  Centar"), "Beograd-Centar");
    }

    #[test]
    fn test_extract_year() {
        assert_eq!(extract_year("Parking_City_20240131.xlsx", 2026), 2024);
        assert_eq!(extract_year("VAS_X_20270101.xlsx", 2026), 2027);
        assert_eq!(extract_year("VAS_X_20280101.xlsx", 2026), 2026);
        assert_eq!(extract_year("_mParking_X_1234__5678_.xlsx", 2026), 2026);
        assert_eq!(extract_year("report.xlsx", 2026), 2026);
        assert_eq!(extract_year("r_1999_2023.xlsx", 2026), 2023);
    }

    #[test]
    fn test_archive_dir_layout() {
        let lc = Lifecycle::new("/srv/public", "/srv/errors");
        assert_eq!(
            lc.archive_dir(ProviderKind::Parking, "City Park", 2024),
            PathBuf::from("/srv/public/parking-servis/City-Park/reports/2024")
        );
    }

    #[test]
    fn test_complete_moves_into_archive() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input");
        std::fs::create_dir_all(&input).unwrap();
        let source = input.join("Parking_City_Park_20240131.xlsx");
        std::fs::write(&source, b"data").unwrap();

        let lc = Lifecycle::new(dir.path().join("public"), dir.path().join("errors"));
        let placement = lc.complete(ProviderKind::Parking, &source, "City Park", 2026).unwrap();
        let expected = dir
            .path()
            .join("public/parking-servis/City-Park/reports/2024/Parking_City_Park_20240131.xlsx");
        assert_eq!(placement, Placement::Completed(expected.clone()));
        assert!(expected.exists());
        assert!(!source.exists());
    }

    #[test]
    fn test_complete_falls_back_to_error_folder() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("VAS_Telemedia_20240101.xlsx");
        std::fs::write(&source, b"data").unwrap();
        // A regular file where the archive root should be makes create_dir_all fail.
        let blocked_root = dir.path().join("public");
        std::fs::write(&blocked_root, b"").unwrap();

        let lc = Lifecycle::new(&blocked_root, dir.path().join("errors"));
        let placement = lc.complete(ProviderKind::Vas, &source, "Telemedia", 2026).unwrap();
        match placement {
            Placement::Error(path, reason) => {
                assert_eq!(path, dir.path().join("errors/VAS_Telemedia_20240101.xlsx"));
                assert!(path.exists());
                assert!(reason.is_some());
            }
            other => panic!("expected error placement, got {other:?}"),
        }
        assert!(!source.exists());
    }

    #[test]
    fn test_reject_moves_to_error_folder() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("bad.xlsx");
        std::fs::write(&source, b"x").unwrap();
        let lc = Lifecycle::new(dir.path().join("public"), dir.path().join("errors"));
        let target = lc.reject(&source).unwrap();
        assert!(target.exists());
        assert!(!source.exists());
    }
}
