use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::digest::digest_file;
use crate::error::{RecoveryError, Result};
use crate::model::{
    BackupListing, Classification, FileEntry, ReconciliationDecision, RecoveryEvent,
    RecoveryEventKind, RecoveryOutcome, RunReport, RunSummary, REPORT_VERSION,
};
use crate::path_map::resolve;
use crate::restore::{FsExecutor, RestoreExecutor};
use crate::sink::RecoverySink;
use crate::walk::{enumerate, ExcludeMatcher};

#[derive(Debug, Clone, Default)]
pub struct RecoveryOptions {
    pub original_root: PathBuf,
    pub backup_root: PathBuf,
    pub dry_run: bool,
    pub excludes: Vec<String>,
    pub run_id: Option<String>,
    /// Checked between files; a file already being processed always finishes.
    pub cancel_flag: Option<Arc<AtomicBool>>,
}

pub struct RecoveryRunOutput {
    pub report: RunReport,
    pub events: Vec<RecoveryEvent>,
}

/// Classifies one working-tree file against its backup counterpart.
///
/// Only an escaping relative path is returned as an error; unreadable or
/// missing copies are ordinary decisions.
pub fn classify(
    entry: &FileEntry,
    original_root: &Path,
    backup_root: &Path,
) -> Result<Classification> {
    let original_path = resolve(entry.relative(), original_root)?;
    let backup_path = resolve(entry.relative(), backup_root)?;

    let classified = |decision, detail: Option<String>| Classification {
        entry: entry.clone(),
        original_path: original_path.clone(),
        backup_path: backup_path.clone(),
        decision,
        detail,
    };

    let original_digest = match digest_file(&original_path) {
        Ok(digest) => digest,
        Err(err) => {
            return Ok(classified(
                ReconciliationDecision::UnreadableOriginal,
                Some(err.to_string()),
            ))
        }
    };

    let backup_digest = match digest_file(&backup_path) {
        Ok(digest) => digest,
        Err(err) if err.is_not_found() => {
            return Ok(classified(
                ReconciliationDecision::MissingBackupCounterpart,
                None,
            ))
        }
        Err(err) => {
            return Ok(classified(
                ReconciliationDecision::UnreadableBackup,
                Some(err.to_string()),
            ))
        }
    };

    if original_digest == backup_digest {
        Ok(classified(ReconciliationDecision::Match, None))
    } else {
        Ok(classified(
            ReconciliationDecision::Mismatch,
            Some(format!(
                "original {} != backup {}",
                original_digest, backup_digest
            )),
        ))
    }
}

/// Lazily classifies every file of the working tree. Files that exist only
/// in the backup tree are never visited.
pub fn reconcile<'a>(
    original_root: &'a Path,
    backup_root: &'a Path,
    excludes: &'a ExcludeMatcher,
) -> impl Iterator<Item = Result<Classification>> + 'a {
    enumerate(original_root, excludes)
        .map(move |item| item.and_then(|entry| classify(&entry, original_root, backup_root)))
}

pub fn run_recovery(options: &RecoveryOptions) -> Result<RecoveryRunOutput> {
    let mut events = Vec::new();
    let mut collect = |event: &RecoveryEvent| events.push(event.clone());
    let report = run_recovery_with_sink(options, &mut collect)?;
    Ok(RecoveryRunOutput { report, events })
}

pub fn run_recovery_with_sink(
    options: &RecoveryOptions,
    sink: &mut dyn RecoverySink,
) -> Result<RunReport> {
    run_with_executor(options, &FsExecutor, sink)
}

fn run_with_executor(
    options: &RecoveryOptions,
    executor: &dyn RestoreExecutor,
    sink: &mut dyn RecoverySink,
) -> Result<RunReport> {
    validate_root(&options.original_root, "original")?;
    validate_root(&options.backup_root, "backup")?;

    let started = Instant::now();
    let run_id = options
        .run_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let mut warnings = Vec::new();
    let excludes = ExcludeMatcher::new(&options.excludes, &mut warnings);
    for warning in &warnings {
        warn!("{warning}");
    }

    info!(
        "starting recovery: original={} backup={} dry_run={}",
        options.original_root.display(),
        options.backup_root.display(),
        options.dry_run
    );

    let mut state = RunState {
        run_id: run_id.clone(),
        seq: 0,
        summary: RunSummary {
            dry_run: options.dry_run,
            ..RunSummary::default()
        },
        sink,
    };

    let mut classifications = reconcile(&options.original_root, &options.backup_root, &excludes);
    loop {
        if is_cancelled(options) {
            warn!("recovery canceled by caller; remaining files were not inspected");
            state.summary.cancelled = true;
            break;
        }
        let Some(item) = classifications.next() else {
            break;
        };

        match item {
            Ok(classification) => {
                state.summary.inspected += 1;
                handle_classification(classification, options.dry_run, executor, &mut state);
            }
            Err(err) => handle_error(err, &mut state),
        }
    }

    let summary = state.summary;
    if summary.restored == 0 {
        info!("no corrupted files found or all files are up-to-date");
    }
    info!(
        "recovery completed: inspected={} restored={} failed={} missing_backup={} unreadable={}",
        summary.inspected, summary.restored, summary.failed, summary.missing_backup, summary.unreadable
    );

    Ok(RunReport {
        report_version: REPORT_VERSION.to_string(),
        run_id,
        generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        original_root: options.original_root.to_string_lossy().to_string(),
        backup_root: options.backup_root.to_string_lossy().to_string(),
        dry_run: options.dry_run,
        excludes: options.excludes.clone(),
        elapsed_ms: started.elapsed().as_millis().try_into().unwrap_or(u64::MAX),
        summary,
    })
}

/// Lists the backup tree without digesting anything.
pub fn list_backup(backup_root: &Path, excludes: &[String]) -> Result<BackupListing> {
    validate_root(backup_root, "backup")?;

    let mut warnings = Vec::new();
    let matcher = ExcludeMatcher::new(excludes, &mut warnings);
    info!("listing backup files in {}", backup_root.display());

    let mut files = Vec::new();
    for item in enumerate(backup_root, &matcher) {
        match item {
            Ok(entry) => {
                debug!("found backup file: {}", entry.slash_path());
                files.push(entry.slash_path());
            }
            Err(err) => warnings.push(err.to_string()),
        }
    }

    Ok(BackupListing {
        backup_root: backup_root.to_string_lossy().to_string(),
        files,
        warnings,
    })
}

struct RunState<'s> {
    run_id: String,
    seq: u64,
    summary: RunSummary,
    sink: &'s mut dyn RecoverySink,
}

impl RunState<'_> {
    fn emit(
        &mut self,
        kind: RecoveryEventKind,
        relative_path: Option<String>,
        original_path: Option<&Path>,
        detail: Option<String>,
    ) {
        self.seq += 1;
        self.summary.record(kind);
        let event = RecoveryEvent {
            seq: self.seq,
            run_id: self.run_id.clone(),
            kind,
            relative_path,
            original_path: original_path.map(|path| path.to_string_lossy().to_string()),
            detail,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        };
        self.sink.record(&event);
    }
}

fn handle_classification(
    classification: Classification,
    dry_run: bool,
    executor: &dyn RestoreExecutor,
    state: &mut RunState<'_>,
) {
    let Classification {
        entry,
        original_path,
        backup_path,
        decision,
        detail,
    } = classification;
    let relative = Some(entry.slash_path());

    match decision {
        ReconciliationDecision::Match => {
            debug!("match: {}", original_path.display());
            state.emit(RecoveryEventKind::Matched, relative, Some(original_path.as_path()), None);
        }
        ReconciliationDecision::Mismatch => {
            info!(
                "hash mismatch detected for {} under {}",
                entry.slash_path(),
                entry.root().display()
            );
            let (kind, detail) = match executor.restore(&original_path, &backup_path, dry_run) {
                RecoveryOutcome::SimulatedRestore { .. } => {
                    (RecoveryEventKind::SimulatedRestore, detail)
                }
                RecoveryOutcome::Restored { .. } => (RecoveryEventKind::Restored, detail),
                RecoveryOutcome::RestoreFailed { error, .. } => {
                    (RecoveryEventKind::RestoreFailed, Some(error))
                }
            };
            state.emit(kind, relative, Some(original_path.as_path()), detail);
        }
        ReconciliationDecision::MissingBackupCounterpart => {
            warn!(
                "no backup counterpart for {}; left unchanged",
                original_path.display()
            );
            state.emit(
                RecoveryEventKind::MissingBackupCounterpart,
                relative,
                Some(original_path.as_path()),
                Some(format!("{} does not exist", backup_path.display())),
            );
        }
        ReconciliationDecision::UnreadableOriginal => {
            warn!(
                "skipping {}: {}",
                original_path.display(),
                detail.as_deref().unwrap_or("unreadable")
            );
            state.emit(
                RecoveryEventKind::UnreadableOriginal,
                relative,
                Some(original_path.as_path()),
                detail,
            );
        }
        ReconciliationDecision::UnreadableBackup => {
            warn!(
                "skipping {}: backup unreadable: {}",
                original_path.display(),
                detail.as_deref().unwrap_or("unreadable")
            );
            state.emit(
                RecoveryEventKind::UnreadableBackup,
                relative,
                Some(original_path.as_path()),
                detail,
            );
        }
    }
}

fn handle_error(err: RecoveryError, state: &mut RunState<'_>) {
    warn!("{err}");
    match &err {
        RecoveryError::InvalidPath { path, .. } => {
            state.summary.inspected += 1;
            let relative = Some(path.to_string_lossy().to_string());
            state.emit(
                RecoveryEventKind::InvalidPath,
                relative,
                None,
                Some(err.to_string()),
            );
        }
        RecoveryError::Unreadable { path, .. } => {
            state.emit(
                RecoveryEventKind::UnreadableOriginal,
                None,
                Some(path.as_path()),
                Some(err.to_string()),
            );
        }
        RecoveryError::RestoreFailed { path, .. } => {
            state.emit(
                RecoveryEventKind::RestoreFailed,
                None,
                Some(path.as_path()),
                Some(err.to_string()),
            );
        }
        RecoveryError::InvalidConfiguration { .. } => {}
    }
}

fn validate_root(root: &Path, label: &str) -> Result<()> {
    if root.as_os_str().is_empty() {
        return Err(RecoveryError::configuration(format!(
            "{label} root is required"
        )));
    }
    let metadata = fs::metadata(root).map_err(|err| {
        RecoveryError::configuration(format!(
            "{label} root {} is not accessible: {err}",
            root.display()
        ))
    })?;
    if !metadata.is_dir() {
        return Err(RecoveryError::configuration(format!(
            "{label} root {} is not a directory",
            root.display()
        )));
    }
    fs::read_dir(root).map_err(|err| {
        RecoveryError::configuration(format!(
            "{label} root {} cannot be listed: {err}",
            root.display()
        ))
    })?;
    Ok(())
}

fn is_cancelled(options: &RecoveryOptions) -> bool {
    options
        .cancel_flag
        .as_ref()
        .is_some_and(|flag| flag.load(Ordering::Relaxed))
}
