use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use std::thread;

use anyhow::{anyhow, bail, Context, Result};
use once_cell::sync::Lazy;
use phoenix_core::{
    list_backup, run_recovery_with_sink, BackupListing, RecoveryEvent, RecoveryOptions,
    RunReport, RunSummary,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RecoveryRequest {
    #[serde(default)]
    pub run_id: Option<String>,
    pub original: PathBuf,
    pub backup: PathBuf,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub excludes: Vec<String>,
    #[serde(default)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecoverySessionStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoverySessionSnapshot {
    pub run_id: String,
    pub status: RecoverySessionStatus,
    pub original: PathBuf,
    pub report_path: Option<PathBuf>,
    pub summary: Option<RunSummary>,
    pub error: Option<String>,
    pub total_events: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelRecoveryResponse {
    pub run_id: String,
    pub status: RecoverySessionStatus,
}

#[derive(Debug, Clone)]
struct RecoverySession {
    status: RecoverySessionStatus,
    /// Canonical original root, used by the run guard.
    guard_key: PathBuf,
    original: PathBuf,
    report_path: Option<PathBuf>,
    report: Option<RunReport>,
    error: Option<String>,
    events: Vec<RecoveryEvent>,
    cancel_flag: Arc<AtomicBool>,
}

static SESSIONS: Lazy<Mutex<HashMap<String, RecoverySession>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Runs a recovery pass on a worker thread and returns its run id.
///
/// Refuses to start while another pass in this process is still running
/// against the same original tree.
pub fn start_recovery(request: RecoveryRequest) -> Result<String> {
    let run_id = request
        .run_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let cancel_flag = Arc::new(AtomicBool::new(false));
    let guard_key = guard_key(&request.original);

    {
        let mut sessions = lock_sessions()?;
        if sessions.contains_key(&run_id) {
            bail!("recovery session already exists: {run_id}");
        }
        if let Some((active_id, _)) = sessions.iter().find(|(_, session)| {
            session.status == RecoverySessionStatus::Running && session.guard_key == guard_key
        }) {
            bail!(
                "recovery {active_id} is already running against {}",
                request.original.display()
            );
        }
        sessions.insert(
            run_id.clone(),
            RecoverySession {
                status: RecoverySessionStatus::Running,
                guard_key,
                original: request.original.clone(),
                report_path: request.output.clone(),
                report: None,
                error: None,
                events: Vec::new(),
                cancel_flag: Arc::clone(&cancel_flag),
            },
        );
    }

    let thread_run_id = run_id.clone();
    thread::spawn(move || {
        let options = RecoveryOptions {
            original_root: request.original,
            backup_root: request.backup,
            dry_run: request.dry_run,
            excludes: request.excludes,
            run_id: Some(thread_run_id.clone()),
            cancel_flag: Some(Arc::clone(&cancel_flag)),
        };

        let mut forward = |event: &RecoveryEvent| {
            if let Ok(mut sessions) = lock_sessions() {
                if let Some(session) = sessions.get_mut(&thread_run_id) {
                    session.events.push(event.clone());
                }
            }
        };
        let run_result = run_recovery_with_sink(&options, &mut forward)
            .map_err(anyhow::Error::from)
            .and_then(|report| {
                if let Some(path) = &request.output {
                    write_report(&report, path)?;
                }
                Ok(report)
            });

        let Ok(mut sessions) = lock_sessions() else {
            return;
        };
        let Some(session) = sessions.get_mut(&thread_run_id) else {
            return;
        };
        match run_result {
            Ok(report) => {
                session.status = if report.summary.cancelled {
                    RecoverySessionStatus::Cancelled
                } else {
                    RecoverySessionStatus::Completed
                };
                session.report = Some(report);
                session.error = None;
            }
            Err(err) => {
                session.status = RecoverySessionStatus::Failed;
                session.error = Some(format!("{err:#}"));
            }
        }
    });

    Ok(run_id)
}

pub fn poll_recovery_events(run_id: &str, from_seq: u64) -> Result<Vec<RecoveryEvent>> {
    let sessions = lock_sessions()?;
    let session = sessions
        .get(run_id)
        .ok_or_else(|| anyhow!("recovery session not found: {run_id}"))?;

    Ok(session
        .events
        .iter()
        .filter(|event| event.seq > from_seq)
        .cloned()
        .collect())
}

/// Asks a running pass to stop. The file currently being processed is
/// finished first, so the session may stay `Running` briefly.
pub fn cancel_recovery(run_id: &str) -> Result<CancelRecoveryResponse> {
    let sessions = lock_sessions()?;
    let session = sessions
        .get(run_id)
        .ok_or_else(|| anyhow!("recovery session not found: {run_id}"))?;

    session.cancel_flag.store(true, Ordering::Relaxed);

    Ok(CancelRecoveryResponse {
        run_id: run_id.to_string(),
        status: session.status.clone(),
    })
}

pub fn get_recovery_session(run_id: &str) -> Result<RecoverySessionSnapshot> {
    let sessions = lock_sessions()?;
    let session = sessions
        .get(run_id)
        .ok_or_else(|| anyhow!("recovery session not found: {run_id}"))?;

    Ok(snapshot(run_id, session))
}

/// Drops a finished session from the registry and returns its last
/// snapshot. Running sessions must be cancelled and allowed to finish first.
pub fn remove_recovery_session(run_id: &str) -> Result<RecoverySessionSnapshot> {
    let mut sessions = lock_sessions()?;
    let session = sessions
        .get(run_id)
        .ok_or_else(|| anyhow!("recovery session not found: {run_id}"))?;
    if session.status == RecoverySessionStatus::Running {
        bail!("recovery session is still running: {run_id}");
    }

    let last = snapshot(run_id, session);
    sessions.remove(run_id);
    Ok(last)
}

fn snapshot(run_id: &str, session: &RecoverySession) -> RecoverySessionSnapshot {
    RecoverySessionSnapshot {
        run_id: run_id.to_string(),
        status: session.status.clone(),
        original: session.original.clone(),
        report_path: session.report_path.clone(),
        summary: session.report.as_ref().map(|report| report.summary.clone()),
        error: session.error.clone(),
        total_events: session.events.len() as u64,
    }
}

pub fn list_backup_files(backup: impl AsRef<Path>) -> Result<BackupListing> {
    let backup = backup.as_ref();
    list_backup(backup, &[])
        .with_context(|| format!("failed to list backup files in {}", backup.display()))
}

pub fn load_report(path: impl AsRef<Path>) -> Result<RunReport> {
    let path = path.as_ref();
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read report {}", path.display()))?;
    let report: RunReport = serde_json::from_str(&data)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(report)
}

fn write_report(report: &RunReport, path: &Path) -> Result<()> {
    let payload =
        serde_json::to_string_pretty(report).context("failed to serialize report payload")?;
    fs::write(path, payload)
        .with_context(|| format!("failed to write report to {}", path.display()))
}

fn guard_key(original: &Path) -> PathBuf {
    fs::canonicalize(original).unwrap_or_else(|_| original.to_path_buf())
}

fn lock_sessions() -> Result<std::sync::MutexGuard<'static, HashMap<String, RecoverySession>>> {
    SESSIONS
        .lock()
        .map_err(|_| anyhow!("recovery session registry lock poisoned"))
}
