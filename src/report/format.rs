//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the job control code stays free of presentation details
//! - output changes are localized

use crate::domain::{JobReport, ModelStatus, Outcome};
use crate::error::FitError;
use crate::io::{FitRecord, TableStore};
use crate::jobs::StartReport;

/// Percentage with three significant digits: `45.6%`, `100%`, `0.25%`.
pub fn format_percent(progress: f32) -> String {
    let v = (progress.clamp(0.0, 1.0) * 100.0) as f64;
    if v <= 0.0 {
        return "0%".to_string();
    }
    let magnitude = v.log10().floor() as i32 + 1;
    let decimals = (3 - magnitude).max(0) as usize;
    let mut s = format!("{v:.decimals$}");
    if s.contains('.') {
        s = s.trim_end_matches('0').trim_end_matches('.').to_string();
    }
    format!("{s}%")
}

/// Table of registered models for `ltcgen list`.
pub fn format_model_list(rows: &[ModelStatus], store: &TableStore) -> String {
    let mut out = String::new();
    out.push_str(&format!("Output directory: {}\n\n", store.dir().display()));

    out.push_str(
        format!(
            "{:<16} {:<8} {:<22} {:>8} {:<9}\n",
            "model", "table", "last run", "warnings", "needs fit"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!("{:-<16} {:-<8} {:-<22} {:-<8} {:-<9}\n", "", "", "", "", "").trim_end(),
    );
    out.push('\n');

    for row in rows {
        let table = if store.table_exists(row.model) { "present" } else { "missing" };
        let last = if row.is_active {
            format!("running {}", format_percent(row.progress))
        } else {
            row.last_outcome
                .map(|o| o.display_name().to_string())
                .unwrap_or_else(|| "-".to_string())
        };
        out.push_str(
            format!(
                "{:<16} {:<8} {:<22} {:>8} {:<9}\n",
                truncate(&row.label, 16),
                table,
                last,
                row.warnings,
                if row.needs_fitting { "yes" } else { "no" },
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

/// One-line progress summary of the active jobs.
pub fn format_progress_line(rows: &[ModelStatus]) -> String {
    let parts: Vec<String> = rows
        .iter()
        .filter(|row| row.is_active)
        .map(|row| format!("{} {}", row.label, format_percent(row.progress)))
        .collect();
    if parts.is_empty() {
        return "idle".to_string();
    }
    parts.join(" | ")
}

/// What a start request did, one line per id that was not started.
pub fn format_start_report(report: &StartReport) -> String {
    let mut out = String::new();
    if report.created_dir {
        out.push_str("Created output directory\n");
    }
    for id in &report.already_running {
        out.push_str(&format!("{}\n", FitError::AlreadyRunning(id.name().to_string())));
    }
    for (id, err) in &report.rejected {
        out.push_str(&format!("{id}: not started ({err})\n"));
    }
    out
}

/// Final line for one finished job.
pub fn format_job_report(report: &JobReport) -> String {
    let mut line = format!("{}: {}", report.model, report.outcome.display_name());
    match report.outcome {
        Outcome::SucceededWithErrors => {
            line.push_str(&format!(" ({} warning(s), see `ltcgen inspect {}`)", report.warnings, report.model));
        }
        Outcome::Failed => {
            if let Some(detail) = &report.error_detail {
                line.push_str(&format!(": {detail}"));
            }
        }
        Outcome::Aborted => {
            line.push_str(&format!(" at {}", format_percent(report.progress)));
        }
        Outcome::Succeeded | Outcome::Running => {}
    }
    line
}

/// Full record for `ltcgen inspect`.
pub fn format_record(record: &FitRecord) -> String {
    let mut out = String::new();
    out.push_str(&format!("Model    : {}\n", record.model));
    out.push_str(&format!("Outcome  : {}\n", record.outcome.display_name()));
    out.push_str(&format!("Finished : {}\n", record.finished_at.format("%Y-%m-%d %H:%M:%S UTC")));
    out.push_str(&format!("Progress : {}\n", format_percent(record.progress)));
    out.push_str(&format!(
        "Mode     : {}\n",
        if record.overwrite { "overwrite" } else { "resume" }
    ));
    out.push_str(&format!("Warnings : {}\n", record.warnings));
    if let Some(detail) = record.detail.as_deref().filter(|d| !d.trim().is_empty()) {
        out.push('\n');
        for line in detail.lines() {
            out.push_str(&format!("  {line}\n"));
        }
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BrdfModelId;
    use chrono::{TimeZone, Utc};

    #[test]
    fn percent_uses_three_significant_digits() {
        assert_eq!(format_percent(0.0), "0%");
        assert_eq!(format_percent(0.456), "45.6%");
        assert_eq!(format_percent(0.5), "50%");
        assert_eq!(format_percent(1.0), "100%");
        assert_eq!(format_percent(0.0025), "0.25%");
        assert_eq!(format_percent(2.0), "100%");
    }

    #[test]
    fn progress_line_lists_active_models_only() {
        let row = |name: &'static str, active: bool, progress: f32| ModelStatus {
            model: BrdfModelId::new(name),
            label: name.to_string(),
            is_active: active,
            progress,
            needs_fitting: true,
            last_outcome: None,
            warnings: 0,
        };
        assert_eq!(format_progress_line(&[row("GGX", false, 0.0)]), "idle");
        assert_eq!(
            format_progress_line(&[row("GGX", true, 0.25), row("Lambert", false, 0.0), row("Charlie", true, 0.125)]),
            "GGX 25% | Charlie 12.5%"
        );
    }

    #[test]
    fn record_shows_warning_log() {
        let record = FitRecord {
            model: "GGX".to_string(),
            outcome: Outcome::SucceededWithErrors,
            warnings: 2,
            detail: Some("entry (theta 1, alpha 0): a\nentry (theta 2, alpha 0): b\n".to_string()),
            progress: 1.0,
            overwrite: false,
            finished_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        };
        let text = format_record(&record);
        assert!(text.contains("Outcome  : succeeded with errors"));
        assert!(text.contains("Finished : 2026-03-01 12:00:00 UTC"));
        assert!(text.contains("  entry (theta 2, alpha 0): b"));
    }

    #[test]
    fn job_report_lines() {
        let mut report = JobReport {
            model: BrdfModelId::new("Charlie"),
            outcome: Outcome::Aborted,
            error_detail: None,
            warnings: 0,
            progress: 0.125,
            overwrite: false,
        };
        assert_eq!(format_job_report(&report), "Charlie: aborted at 12.5%");

        report.outcome = Outcome::Failed;
        report.error_detail = Some("Fit failed: singular".to_string());
        assert_eq!(format_job_report(&report), "Charlie: failed: Fit failed: singular");
    }
}
