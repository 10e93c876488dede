use std::path::PathBuf;

use crate::db::{get_connection, init_db};
use crate::error::Result;
use crate::kind::ProviderKind;
use crate::settings::{load_settings, save_settings, shellexpand_path};

pub fn run(data_dir: Option<String>) -> Result<()> {
    let mut settings = load_settings();
    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    }
    save_settings(&settings)?;

    let resolved = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(&resolved)?;
    std::fs::create_dir_all(settings.input_path())?;
    std::fs::create_dir_all(settings.archive_path())?;
    std::fs::create_dir_all(settings.error_path())?;
    if let Some(csv_dir) = settings.csv_path(ProviderKind::Parking).parent() {
        std::fs::create_dir_all(csv_dir)?;
    }

    let db_path = settings.database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = get_connection(&db_path)?;
    init_db(&conn)?;

    println!("Initialized vasimport at {}", resolved.display());
    Ok(())
}
