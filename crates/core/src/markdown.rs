use crate::model::{RecoveryEvent, RecoveryEventKind, RunReport};

pub fn render_markdown_summary(report: &RunReport, events: &[RecoveryEvent]) -> String {
    let mut out = String::new();
    out.push_str("# Phoenix Recovery Summary\n\n");
    out.push_str(&format!(
        "- Report version: `{}`\n- Run id: `{}`\n- Generated at: `{}`\n- Original: `{}`\n- Backup: `{}`\n- Mode: {}\n- Elapsed: `{} ms`\n\n",
        report.report_version,
        report.run_id,
        report.generated_at,
        report.original_root,
        report.backup_root,
        if report.dry_run { "dry run (no files modified)" } else { "apply" },
        report.elapsed_ms
    ));

    let summary = &report.summary;
    out.push_str("## Totals\n\n");
    out.push_str("| Inspected | Matched | Restored | Failed | Missing backup | Unreadable | Invalid path |\n");
    out.push_str("|---|---|---|---|---|---|---|\n");
    out.push_str(&format!(
        "| {} | {} | {} | {} | {} | {} | {} |\n\n",
        summary.inspected,
        summary.matched,
        summary.restored,
        summary.failed,
        summary.missing_backup,
        summary.unreadable,
        summary.invalid_paths
    ));
    if summary.cancelled {
        out.push_str("The run was canceled before every file was inspected.\n\n");
    }

    let restored_heading = if report.dry_run {
        "## Would Restore"
    } else {
        "## Restored"
    };
    push_section(
        &mut out,
        restored_heading,
        events,
        &[RecoveryEventKind::Restored, RecoveryEventKind::SimulatedRestore],
        "No corrupted files were found or all are up-to-date.",
    );
    push_section(
        &mut out,
        "## Failures",
        events,
        &[
            RecoveryEventKind::RestoreFailed,
            RecoveryEventKind::UnreadableOriginal,
            RecoveryEventKind::UnreadableBackup,
            RecoveryEventKind::InvalidPath,
        ],
        "No failures.",
    );
    push_section(
        &mut out,
        "## Missing Backup Counterparts",
        events,
        &[RecoveryEventKind::MissingBackupCounterpart],
        "Every inspected file had a backup counterpart.",
    );

    out
}

fn push_section(
    out: &mut String,
    heading: &str,
    events: &[RecoveryEvent],
    kinds: &[RecoveryEventKind],
    empty_note: &str,
) {
    out.push_str(heading);
    out.push_str("\n\n");

    let selected = events
        .iter()
        .filter(|event| kinds.contains(&event.kind))
        .collect::<Vec<_>>();
    if selected.is_empty() {
        out.push_str(empty_note);
        out.push_str("\n\n");
        return;
    }

    for event in selected {
        let path = event
            .relative_path
            .as_deref()
            .or(event.original_path.as_deref())
            .unwrap_or("<unknown>");
        match &event.detail {
            Some(detail) if event.kind.is_failure() => {
                out.push_str(&format!("- `{path}` ({:?}): {detail}\n", event.kind))
            }
            _ => out.push_str(&format!("- `{path}`\n")),
        }
    }
    out.push('\n');
}
