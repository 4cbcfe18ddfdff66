//! Provisioning wizard handler.
//!
//! Loads candidates from CSV, checks every management controller through
//! the server and, with `--commit`, creates the hosts.

use std::time::Duration;

use indicatif::ProgressBar;
use serde::Serialize;
use tabled::Tabled;
use via_core::{Console, ValidationError, WizardSession, WizardState};

use crate::cli::{GlobalOpts, WizardArgs};
use crate::error::CliError;
use crate::output;

use super::{report, util};

#[derive(Debug, Serialize)]
struct CandidateView {
    ilo_ip_addr: String,
    fqdn: Option<String>,
    validated: bool,
}

#[derive(Debug, Serialize)]
struct ValidationView<'a> {
    state: WizardState,
    candidates: Vec<CandidateView>,
    errors: &'a [ValidationError],
}

#[derive(Tabled)]
struct ValidationRow {
    #[tabled(rename = "Controller")]
    controller: String,
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

pub async fn handle(console: &Console, args: WizardArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let text = util::read_csv(&args.file)?;

    let mut session = WizardSession::from_config(console.config());
    let skipped = session.import_csv(&text)?;
    session.set_vendor(args.vendor)?;
    if let Some(port) = args.port {
        session.set_ilo_port(port)?;
    }
    for diag in &skipped {
        tracing::warn!(line = diag.line, reason = %diag.reason, "candidate row skipped");
    }

    // Resolve the landing place first so a typo fails before any probing
    let target = if args.commit {
        Some(util::host_target(
            console,
            args.group.as_deref(),
            args.pool.as_deref(),
        )?)
    } else {
        None
    };

    let spinner = if global.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(format!(
        "Checking {} controller(s) on port {}",
        session.candidates().len(),
        session.ilo_port()
    ));
    let state = session.validate(console).await?;
    spinner.finish_and_clear();

    print_validation(&session, global)?;

    if state != WizardState::Ready {
        return Err(CliError::WizardRejected {
            count: session.errors().len(),
        });
    }

    let Some(target) = target else {
        if !global.quiet {
            eprintln!("All controllers validated. Rerun with --commit to create the hosts.");
        }
        return Ok(());
    };

    let report = session.commit(console, target).await?;
    report::finish(&report, &skipped, global)
}

fn print_validation(session: &WizardSession, global: &GlobalOpts) -> Result<(), CliError> {
    let view = ValidationView {
        state: session.state(),
        candidates: session
            .candidates()
            .iter()
            .map(|c| CandidateView {
                ilo_ip_addr: c.ilo_ip_addr.clone(),
                fqdn: c.fqdn.clone(),
                validated: c.validated,
            })
            .collect(),
        errors: session.errors(),
    };

    let color = output::should_color(&global.color);
    let out = output::render_single(&global.output, &view, |v| {
        tabled::Table::new(validation_rows(v, color))
            .with(tabled::settings::Style::rounded())
            .to_string()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}

/// One row per candidate, in input order, followed by session-level
/// problems. Errors are matched by position so repeated addresses keep
/// their own outcome.
fn validation_rows(v: &ValidationView<'_>, color: bool) -> Vec<ValidationRow> {
    let mut rows: Vec<ValidationRow> = v
        .candidates
        .iter()
        .enumerate()
        .map(|(index, c)| {
            let error = v.errors.iter().find(|e| e.candidate == Some(index));
            ValidationRow {
                controller: c.ilo_ip_addr.clone(),
                host: c.fqdn.clone().unwrap_or_default(),
                result: match error {
                    Some(e) => output::status(false, &e.kind.to_string(), color),
                    None => output::status(c.validated, "ok", color),
                },
                detail: error.map(|e| e.message.clone()).unwrap_or_default(),
            }
        })
        .collect();
    rows.extend(
        v.errors
            .iter()
            .filter(|e| e.candidate.is_none())
            .map(|e| ValidationRow {
                controller: e.subject.clone(),
                host: String::new(),
                result: output::status(false, &e.kind.to_string(), color),
                detail: e.message.clone(),
            }),
    );
    rows
}

#[cfg(test)]
mod tests {
    use via_core::ValidationKind;

    use super::*;

    fn view(errors: &[ValidationError]) -> ValidationView<'_> {
        ValidationView {
            state: WizardState::Error,
            candidates: ["10.9.0.9", "10.9.0.8", "10.9.0.9"]
                .into_iter()
                .map(|ip| CandidateView {
                    ilo_ip_addr: ip.into(),
                    fqdn: None,
                    validated: ip == "10.9.0.8",
                })
                .collect(),
            errors,
        }
    }

    #[test]
    fn repeated_addresses_show_their_own_error() {
        let errors = vec![
            ValidationError {
                subject: "10.9.0.9".into(),
                message: "connection refused".into(),
                kind: ValidationKind::Unreachable,
                candidate: Some(0),
            },
            ValidationError {
                subject: "10.9.0.9".into(),
                message: "no answer within 250ms".into(),
                kind: ValidationKind::TimedOut,
                candidate: Some(2),
            },
        ];

        let rows = validation_rows(&view(&errors), false);

        let details: Vec<_> = rows.iter().map(|r| (r.result.as_str(), r.detail.as_str())).collect();
        assert_eq!(
            details,
            vec![
                ("unreachable", "connection refused"),
                ("ok", ""),
                ("timed_out", "no answer within 250ms"),
            ]
        );
    }

    #[test]
    fn session_problems_follow_candidates() {
        let errors = vec![ValidationError {
            subject: "Vendor".into(),
            message: "Please select a vendor before proceeding.".into(),
            kind: ValidationKind::Precondition,
            candidate: None,
        }];

        let rows = validation_rows(&view(&errors), false);

        assert_eq!(rows.len(), 4);
        assert_eq!(rows[3].controller, "Vendor");
        assert_eq!(rows[0].result, "ok");
    }
}
