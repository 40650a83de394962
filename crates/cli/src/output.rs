use crate::error::CliError;
use engine_core::state::models::{AuditEntry, WatermarkRecord};
use model::batch::BatchOutcome;

pub fn print_outcome(outcome: &BatchOutcome, as_json: bool) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    println!("Batch {}:", outcome.batch_id);
    println!("-----------------------------");
    println!("{:<16} {}", "Status", outcome.status);
    println!("{:<16} {}", "Source count", outcome.source_count);
    println!("{:<16} {}", "Target count", outcome.target_count);
    Ok(())
}

pub fn print_watermark(record: &WatermarkRecord, as_json: bool) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(record)?);
        return Ok(());
    }

    println!("Watermark for {}.{}:", record.source_system, record.table_name);
    println!("-----------------------------");
    println!(
        "{:<16} {}",
        "Last processed",
        record.last_processed_timestamp.to_rfc3339()
    );
    println!("{:<16} {}", "Column", record.watermark_column);
    println!("{:<16} {:?}", "Status", record.status);
    println!("{:<16} {}", "Process date", record.process_date);
    println!("{:<16} {}", "Updated at", record.updated_at.to_rfc3339());
    Ok(())
}

pub fn print_audit(entries: &[AuditEntry], as_json: bool) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No audit entries.");
        return Ok(());
    }

    for entry in entries {
        let (kind, at, detail) = describe(entry);
        println!(
            "{}  {:<20} {:<20} {}",
            at.to_rfc3339(),
            kind,
            entry.batch_id(),
            detail
        );
    }
    Ok(())
}

fn describe(entry: &AuditEntry) -> (&'static str, chrono::DateTime<chrono::Utc>, String) {
    match entry {
        AuditEntry::RunStart { watermark, at, .. } => (
            "run-start",
            *at,
            format!("watermark {}", watermark.to_rfc3339()),
        ),
        AuditEntry::BatchIngested {
            record_count,
            window_end,
            at,
            ..
        } => (
            "batch-ingested",
            *at,
            format!("{record_count} records, window end {}", window_end.to_rfc3339()),
        ),
        AuditEntry::BatchTransformed {
            accepted,
            quarantined,
            at,
            ..
        } => (
            "batch-transformed",
            *at,
            format!("{accepted} accepted, {quarantined} quarantined"),
        ),
        AuditEntry::Reconciled {
            status,
            variance,
            at,
            ..
        } => ("reconciled", *at, format!("{status}, variance {variance}")),
        AuditEntry::WatermarkAdvanced { from, to, at, .. } => (
            "watermark-advanced",
            *at,
            format!("{} -> {}", from.to_rfc3339(), to.to_rfc3339()),
        ),
        AuditEntry::BatchQuarantined { reason, at, .. } => {
            ("batch-quarantined", *at, reason.clone())
        }
        AuditEntry::BatchFailed {
            stage, reason, at, ..
        } => ("batch-failed", *at, format!("{stage}: {reason}")),
        AuditEntry::RunDone { outcome, at, .. } => ("run-done", *at, outcome.clone()),
    }
}
