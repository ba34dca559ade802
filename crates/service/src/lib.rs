pub mod service;

pub use service::{
    cancel_recovery, get_recovery_session, list_backup_files, load_report, poll_recovery_events,
    remove_recovery_session, start_recovery, CancelRecoveryResponse, RecoveryRequest,
    RecoverySessionSnapshot, RecoverySessionStatus,
};
