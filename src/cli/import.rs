use std::path::PathBuf;

use colored::Colorize;

use crate::error::Result;
use crate::importer::{run_import, ImportContext};
use crate::kind::ProviderKind;
use crate::lifecycle::Lifecycle;
use crate::resolver::current_actor;
use crate::settings::{load_settings, shellexpand_path};

pub fn run(kind: &str, input: Option<&str>, user: Option<&str>) -> Result<()> {
    let kind: ProviderKind = kind.parse()?;
    let settings = load_settings();
    let pool = super::open_pool(&settings)?;

    let actor = {
        let conn = pool.get()?;
        current_actor(&conn, user)
    };
    if actor.is_none() {
        println!("{}", "No actor identity available; new contracts cannot be created.".yellow());
    }

    let input_dir = input
        .map(|p| PathBuf::from(shellexpand_path(p)))
        .unwrap_or_else(|| settings.input_path());
    let lifecycle = Lifecycle::new(settings.archive_path(), settings.error_path());
    let ctx = ImportContext::new(&pool, kind, actor, lifecycle).with_batch_size(settings.batch_size);

    let summary = run_import(&ctx, &input_dir, &settings.csv_path(kind))?;

    println!(
        "{} files processed, {} failed",
        summary.files_processed.to_string().green(),
        if summary.files_failed > 0 {
            summary.files_failed.to_string().red()
        } else {
            summary.files_failed.to_string().normal()
        }
    );
    println!(
        "{} inserted, {} updated, {} errors",
        summary.upsert.inserted, summary.upsert.updated, summary.upsert.errors
    );
    if summary.records_exported > 0 {
        println!(
            "{} records exported to {}",
            summary.records_exported,
            settings.csv_path(kind).display()
        );
    }
    Ok(())
}
