use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use chrono::Datelike;
use rusqlite::Connection;

use crate::audit::{self, Entry};
use crate::db::Pool;
use crate::error::{IngestError, Result};
use crate::export::save_csv;
use crate::grid::load_workbook;
use crate::kind::ProviderKind;
use crate::lifecycle::{Lifecycle, Placement};
use crate::models::{FileMeta, ImportStatus, ResolvedRecord};
use crate::parser::{parse_sheet, ParsedSheet};
use crate::resolver::{
    resolve_contract, resolve_provider, resolve_service, resolve_service_contract, set_import_outcome,
    stamp_file_metadata, Actor,
};
use crate::sanitizer::sanitize_all;
use crate::service_code::extract_service_code;
use crate::upsert::{upsert_transactions, UpsertSummary, DEFAULT_BATCH_SIZE};

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "ods"];

/// Reads a report file into candidates and observed service names.
pub type ReportReader = fn(ProviderKind, &Path) -> Result<ParsedSheet>;

/// Decode the kind's data sheets and parse each one with its own header and group state.
pub fn read_report(kind: ProviderKind, file_path: &Path) -> Result<ParsedSheet> {
    let workbook = load_workbook(file_path, |count| kind.data_sheets(count))?;
    let mut report = ParsedSheet::default();
    for sheet in kind
        .data_sheets(workbook.sheet_count)
        .into_iter()
        .filter_map(|index| workbook.sheet(index))
    {
        report.absorb(parse_sheet(sheet));
    }
    Ok(report)
}

pub fn list_input_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| SPREADSHEET_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
        })
        .collect();
    files.sort();
    Ok(files)
}

// ---------------------------------------------------------------------------
// Import context
// ---------------------------------------------------------------------------

pub struct ImportContext<'a> {
    pub pool: &'a Pool,
    pub kind: ProviderKind,
    pub actor: Option<Actor>,
    pub lifecycle: Lifecycle,
    pub batch_size: usize,
    pub current_year: i32,
    pub reader: ReportReader,
}

impl<'a> ImportContext<'a> {
    pub fn new(pool: &'a Pool, kind: ProviderKind, actor: Option<Actor>, lifecycle: Lifecycle) -> Self {
        Self {
            pool,
            kind,
            actor,
            lifecycle,
            batch_size: DEFAULT_BATCH_SIZE,
            current_year: chrono::Local::now().year(),
            reader: read_report,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    fn audit(&self, conn: &Connection, entry: Entry<'_>) {
        audit::record(conn, self.actor.as_ref(), entry);
    }
}

// ---------------------------------------------------------------------------
// Entity resolution for one file
// ---------------------------------------------------------------------------

fn resolve_code(
    ctx: &ImportContext<'_>,
    conn: &Connection,
    provider_id: &str,
    code: &str,
    contract_id: &mut Option<String>,
) -> Result<String> {
    let service = resolve_service(conn, ctx.kind, code)?;
    if service.created {
        ctx.audit(conn, Entry::info("CREATE", "Service", &service.id, format!("Created service {code}")));
    }

    let contract = match contract_id {
        Some(id) => id.clone(),
        None => {
            let contract = resolve_contract(conn, ctx.kind, provider_id, ctx.actor.as_ref())?;
            if contract.created {
                ctx.audit(
                    conn,
                    Entry::info("CREATE", "Contract", &contract.id, format!("Created contract for service {code}")),
                );
            }
            *contract_id = Some(contract.id.clone());
            contract.id
        }
    };

    if ctx.kind.requires_service_contract() {
        let link = resolve_service_contract(conn, &contract, &service.id)?;
        if link.created {
            ctx.audit(
                conn,
                Entry::info("CREATE", "ServiceContract", &link.id, format!("Created service contract for {code}")),
            );
        }
    }
    Ok(service.id)
}

/// Resolve the code of every service block seen in the file once, then attach
/// ids to the candidates.
///
/// Services are resolved even when none of their rows are persistable.
/// Candidates without a code, or whose service or contract cannot be resolved, are dropped.
pub fn resolve_candidates(
    ctx: &ImportContext<'_>,
    conn: &Connection,
    provider_id: &str,
    report: ParsedSheet,
) -> Vec<ResolvedRecord> {
    let mut codes = BTreeSet::new();
    for name in &report.service_names {
        match extract_service_code(name) {
            Some(code) => {
                codes.insert(code.to_string());
            }
            None => tracing::warn!(service = %name, "no 4-digit service code, rows dropped"),
        }
    }

    let mut contract_id = None;
    let mut service_ids: HashMap<String, String> = HashMap::new();
    for code in codes {
        match resolve_code(ctx, conn, provider_id, &code, &mut contract_id) {
            Ok(id) => {
                service_ids.insert(code, id);
            }
            Err(e) => tracing::error!(code = %code, error = %e, "could not resolve service, rows dropped"),
        }
    }

    report
        .candidates
        .into_iter()
        .filter_map(|candidate| {
            let code = extract_service_code(&candidate.service_name)?;
            let service_id = service_ids.get(code)?.clone();
            Some(ResolvedRecord {
                provider_id: provider_id.to_string(),
                service_id,
                candidate,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Per-file processing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FileReport {
    pub file_name: String,
    pub provider_name: Option<String>,
    pub records: Vec<ResolvedRecord>,
    pub summary: UpsertSummary,
    pub placement: Placement,
}

impl FileReport {
    pub fn completed(&self) -> bool {
        matches!(self.placement, Placement::Completed(_))
    }
}

struct Claim {
    provider_id: String,
    provider_name: String,
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn ingest(
    ctx: &ImportContext<'_>,
    path: &Path,
    claim: &mut Option<Claim>,
) -> Result<(Vec<ResolvedRecord>, UpsertSummary)> {
    let file_name = file_name_of(path);
    let report = (ctx.reader)(ctx.kind, path)?;
    tracing::info!(
        file = %file_name,
        candidates = report.candidates.len(),
        services = report.service_names.len(),
        "parsed report"
    );

    let provider_name = ctx.kind.provider_name(path);
    let records = {
        let conn = ctx.pool.get()?;
        let provider = resolve_provider(&conn, ctx.kind, &provider_name)?;
        *claim = Some(Claim {
            provider_id: provider.id.clone(),
            provider_name: provider_name.clone(),
        });
        let meta = FileMeta::from_path(path)?;
        stamp_file_metadata(&conn, ctx.kind, &provider.id, &meta, ImportStatus::InProgress, ctx.actor.as_ref())?;
        if provider.created {
            ctx.audit(
                &conn,
                Entry::info(
                    "CREATE",
                    ctx.kind.provider_table(),
                    &provider.id,
                    format!("Created {} {provider_name}", ctx.kind.name().to_lowercase()),
                ),
            );
        }
        resolve_candidates(ctx, &conn, &provider.id, report)
    };

    let transactions = sanitize_all(&records);
    if transactions.is_empty() {
        return Err(IngestError::NoRecords(file_name));
    }

    let mut conn = ctx.pool.get()?;
    let summary = upsert_transactions(&mut conn, ctx.kind, &transactions, ctx.batch_size)?;
    ctx.audit(
        &conn,
        Entry::info(
            "IMPORT_SUMMARY",
            "System",
            &file_name,
            format!(
                "{} inserted, {} updated, {} errors",
                summary.inserted, summary.updated, summary.errors
            ),
        ),
    );
    Ok((records, summary))
}

/// Run one file through the pipeline and move it to its final location.
///
/// Processing failures route the file to the error location and are reported in
/// the returned placement. `Err` means the file could not be moved at all.
pub fn process_file(ctx: &ImportContext<'_>, path: &Path) -> Result<FileReport> {
    let file_name = file_name_of(path);
    {
        let conn = ctx.pool.get()?;
        ctx.audit(
            &conn,
            Entry::info("PROCESS_START", "System", "start", format!("Started processing {file_name}")),
        );
    }

    let mut claim = None;
    let outcome = ingest(ctx, path, &mut claim);
    let provider_name = claim.as_ref().map(|c| c.provider_name.clone());

    let (records, summary) = match outcome {
        Ok(done) => done,
        Err(e) => {
            tracing::error!(file = %file_name, error = %e, "processing failed");
            let target = ctx.lifecycle.reject(path)?;
            let conn = ctx.pool.get()?;
            let subject = format!("Error processing {file_name}");
            let entry = if matches!(e, IngestError::NoRecords(_)) {
                Entry::warning("PROCESS_ERROR", "System", "error", subject, e.to_string())
            } else {
                Entry::error("PROCESS_ERROR", "System", "error", subject, e.to_string())
            };
            ctx.audit(&conn, entry);
            if let Some(claim) = &claim {
                set_import_outcome(
                    &conn,
                    ctx.kind,
                    &claim.provider_id,
                    &target.to_string_lossy(),
                    ImportStatus::Error,
                )?;
            }
            return Ok(FileReport {
                file_name,
                provider_name,
                records: Vec::new(),
                summary: UpsertSummary::default(),
                placement: Placement::Error(target, Some(e.to_string())),
            });
        }
    };

    // A successful ingest always leaves a claim behind.
    let Some(claim) = claim else {
        return Err(IngestError::Other(format!("{file_name} processed without a provider")));
    };
    let placement = ctx
        .lifecycle
        .complete(ctx.kind, path, &claim.provider_name, ctx.current_year)?;

    let conn = ctx.pool.get()?;
    match &placement {
        Placement::Completed(target) => {
            let target = target.to_string_lossy();
            set_import_outcome(&conn, ctx.kind, &claim.provider_id, &target, ImportStatus::Completed)?;
            ctx.audit(
                &conn,
                Entry::info(
                    "FILE_MOVED",
                    ctx.kind.provider_table(),
                    &claim.provider_id,
                    format!("File moved to {target}"),
                ),
            );
        }
        Placement::Error(target, reason) => {
            set_import_outcome(
                &conn,
                ctx.kind,
                &claim.provider_id,
                &target.to_string_lossy(),
                ImportStatus::Error,
            )?;
            ctx.audit(
                &conn,
                Entry::error(
                    "FILE_MOVE_ERROR",
                    ctx.kind.provider_table(),
                    &claim.provider_id,
                    format!("Failed to move file {file_name}"),
                    reason.clone().unwrap_or_default(),
                ),
            );
        }
    }

    Ok(FileReport {
        file_name,
        provider_name,
        records,
        summary,
        placement,
    })
}

// ---------------------------------------------------------------------------
// Whole run
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub files_processed: usize,
    pub files_failed: usize,
    pub upsert: UpsertSummary,
    pub records_exported: usize,
}

/// Process every spreadsheet in `input_dir`, one at a time, then export the
/// resolved records to `csv_path`.
///
/// An unreachable database aborts before any file is touched.
pub fn run_import(ctx: &ImportContext<'_>, input_dir: &Path, csv_path: &Path) -> Result<RunSummary> {
    let version = ctx.pool.check()?;
    tracing::info!(sqlite = %version, db = %ctx.pool.db_path().display(), "database reachable");

    let files = list_input_files(input_dir)?;
    if files.is_empty() {
        tracing::info!(dir = %input_dir.display(), "no spreadsheet files found");
        return Ok(RunSummary::default());
    }
    tracing::info!(count = files.len(), kind = %ctx.kind, "found files to process");

    let mut summary = RunSummary::default();
    let mut all_records = Vec::new();
    for path in &files {
        match process_file(ctx, path) {
            Ok(report) => {
                if report.completed() {
                    summary.files_processed += 1;
                    tracing::info!(file = %report.file_name, "successfully processed and moved");
                } else {
                    summary.files_failed += 1;
                }
                summary.upsert.absorb(report.summary);
                all_records.extend(report.records);
            }
            Err(e) => {
                summary.files_failed += 1;
                tracing::error!(file = %path.display(), error = %e, "could not finalize file");
            }
        }
    }

    summary.records_exported = save_csv(csv_path, ctx.kind, &all_records)?;
    Ok(summary)
}
