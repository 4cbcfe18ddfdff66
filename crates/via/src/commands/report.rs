//! Rendering of per-row import outcomes, shared by imports and the wizard.

use serde::Serialize;
use tabled::Tabled;

use via_core::{CommandResult, ImportReport, RowDiagnostic, RowFailure};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct CreatedView {
    line: usize,
    subject: String,
    id: Option<i64>,
}

#[derive(Debug, Serialize)]
struct ReportView<'a> {
    created: Vec<CreatedView>,
    failures: &'a [RowFailure],
    skipped: &'a [RowDiagnostic],
}

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "Line")]
    line: usize,
    #[tabled(rename = "Subject")]
    subject: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

fn created_id(result: &CommandResult) -> Option<i64> {
    match result {
        CommandResult::Host(h) => Some(h.id.get()),
        CommandResult::Pool(p) => Some(p.id.get()),
        CommandResult::Ok => None,
    }
}

/// Print `report` plus any rows the parser skipped, then turn failures
/// into a partial-failure error.
pub fn finish(
    report: &ImportReport,
    skipped: &[RowDiagnostic],
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let view = ReportView {
        created: report
            .created
            .iter()
            .map(|c| CreatedView {
                line: c.line,
                subject: c.subject.clone(),
                id: created_id(&c.result),
            })
            .collect(),
        failures: &report.failures,
        skipped,
    };

    let color = output::should_color(&global.color);
    let out = output::render_single(&global.output, &view, |v| {
        let mut rows: Vec<OutcomeRow> = v
            .created
            .iter()
            .map(|c| OutcomeRow {
                line: c.line,
                subject: c.subject.clone(),
                result: output::status(true, "created", color),
                detail: c.id.map(|id| format!("id {id}")).unwrap_or_default(),
            })
            .chain(v.failures.iter().map(|f| OutcomeRow {
                line: f.line,
                subject: f.subject.clone(),
                result: output::status(false, "failed", color),
                detail: f.message.clone(),
            }))
            .chain(v.skipped.iter().map(|s| OutcomeRow {
                line: s.line,
                subject: String::new(),
                result: output::status(false, "skipped", color),
                detail: s.reason.to_string(),
            }))
            .collect();
        rows.sort_by_key(|r| r.line);
        tabled::Table::new(rows)
            .with(tabled::settings::Style::rounded())
            .to_string()
    })?;
    output::print_output(&out, global.quiet);

    let failed = report.failures.len() + skipped.len();
    if failed > 0 {
        return Err(CliError::PartialFailure {
            failed,
            total: report.total() + skipped.len(),
        });
    }
    Ok(())
}
