pub mod digest;
pub mod error;
pub mod markdown;
pub mod model;
pub mod path_map;
pub mod reconcile;
pub mod restore;
pub mod sink;
pub mod walk;

pub use digest::{digest_file, ContentDigest};
pub use error::{RecoveryError, Result};
pub use markdown::render_markdown_summary;
pub use model::{
    BackupListing, Classification, FileEntry, ReconciliationDecision, RecoveryEvent,
    RecoveryEventKind, RecoveryOutcome, RunReport, RunSummary, REPORT_VERSION,
};
pub use path_map::resolve;
pub use reconcile::{
    classify, list_backup, reconcile, run_recovery, run_recovery_with_sink, RecoveryOptions,
    RecoveryRunOutput,
};
pub use restore::restore;
pub use sink::RecoverySink;
pub use walk::{enumerate, ExcludeMatcher, TreeWalk};
