// ── CSV import pipeline ──
//
// Parses small comma-separated payloads against an explicit schema and
// submits each row as an independent create command. There is no
// quoting: fields are split on `,` and trimmed. Rows with the wrong
// field count, or integers that do not parse, are reported as
// diagnostics instead of being dropped silently.

use std::fmt;

use futures_util::StreamExt;
use futures_util::stream;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::command::{Command, CommandResult, CreateHostRequest, CreatePoolRequest};
use crate::console::Console;
use crate::error::{CoreError, ImportError};
use crate::model::{GroupId, Kickstart, MacAddress, PoolId};

// ── Schema ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldKind {
    Text,
    Integer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

const fn text(name: &'static str, required: bool) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Text,
        required,
    }
}

const fn integer(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Integer,
        required: true,
    }
}

/// The columns a CSV payload may carry, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvSchema {
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
}

impl CsvSchema {
    /// Hosts imported into a group: `fqdn,ip,mac[,ks]`.
    pub const HOSTS: Self = Self {
        name: "hosts",
        fields: &[
            text("fqdn", true),
            text("ip", true),
            text("mac", true),
            text("ks", false),
        ],
    };

    /// DHCP pools: `name,net_address,netmask,start_address,end_address,gateway`.
    pub const POOLS: Self = Self {
        name: "pools",
        fields: &[
            text("name", true),
            text("net_address", true),
            integer("netmask"),
            text("start_address", true),
            text("end_address", true),
            text("gateway", true),
        ],
    };

    /// Wizard candidates: `iloIpAddr,username,password[,fqdn,ip,mac]`.
    pub const CANDIDATES: Self = Self {
        name: "candidates",
        fields: &[
            text("iloIpAddr", true),
            text("username", true),
            text("password", true),
            text("fqdn", false),
            text("ip", false),
            text("mac", false),
        ],
    };

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    fn expected(&self) -> String {
        self.fields
            .iter()
            .map(|f| f.name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

// ── Parsed rows ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CsvValue {
    Text(String),
    Integer(i64),
}

impl fmt::Display for CsvValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(n) => write!(f, "{n}"),
        }
    }
}

/// One accepted data row. `line` is the 1-based line in the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CsvRow {
    pub line: usize,
    pub fields: IndexMap<String, CsvValue>,
}

impl CsvRow {
    /// A text field, `None` when absent or empty.
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.fields.get(name) {
            Some(CsvValue::Text(s)) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.fields.get(name) {
            Some(CsvValue::Integer(n)) => Some(*n),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    FieldCountMismatch { expected: usize, found: usize },
    InvalidInteger { column: String, value: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FieldCountMismatch { expected, found } => {
                write!(f, "expected {expected} fields, found {found}")
            }
            Self::InvalidInteger { column, value } => {
                write!(f, "'{value}' is not an integer (column {column})")
            }
        }
    }
}

/// A row that was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowDiagnostic {
    pub line: usize,
    #[serde(flatten)]
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedCsv {
    pub schema: &'static str,
    /// Header columns in input order.
    pub header: Vec<String>,
    pub rows: Vec<CsvRow>,
    pub skipped: Vec<RowDiagnostic>,
}

// ── Parsing ──────────────────────────────────────────────────────

/// Parse `text` against `schema`.
///
/// Lines are trimmed and blank lines dropped; the first remaining line
/// is the header. Header problems fail the whole payload, row problems
/// land in [`ParsedCsv::skipped`].
pub fn parse(text: &str, schema: &CsvSchema) -> Result<ParsedCsv, ImportError> {
    let mut lines = text
        .split('\n')
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty());

    let (_, header_line) = lines.next().ok_or(ImportError::MissingHeader)?;
    let header = parse_header(header_line, schema)?;

    let mut rows = Vec::new();
    let mut skipped = Vec::new();

    for (line, raw) in lines {
        match parse_row(line, raw, &header, schema) {
            Ok(row) => rows.push(row),
            Err(reason) => {
                debug!(line, %reason, "skipping csv row");
                skipped.push(RowDiagnostic { line, reason });
            }
        }
    }

    Ok(ParsedCsv {
        schema: schema.name,
        header,
        rows,
        skipped,
    })
}

fn parse_header(line: &str, schema: &CsvSchema) -> Result<Vec<String>, ImportError> {
    let header: Vec<String> = line.split(',').map(|h| h.trim().to_owned()).collect();

    for (i, name) in header.iter().enumerate() {
        if schema.field(name).is_none() {
            return Err(ImportError::UnknownColumn {
                name: name.clone(),
                expected: schema.expected(),
            });
        }
        if header[..i].contains(name) {
            return Err(ImportError::DuplicateColumn { name: name.clone() });
        }
    }

    if let Some(missing) = schema
        .fields
        .iter()
        .find(|f| f.required && !header.iter().any(|h| h == f.name))
    {
        return Err(ImportError::MissingColumn {
            name: missing.name.to_owned(),
        });
    }

    Ok(header)
}

fn parse_row(
    line: usize,
    raw: &str,
    header: &[String],
    schema: &CsvSchema,
) -> Result<CsvRow, SkipReason> {
    let values: Vec<&str> = raw.split(',').map(str::trim).collect();
    if values.len() != header.len() {
        return Err(SkipReason::FieldCountMismatch {
            expected: header.len(),
            found: values.len(),
        });
    }

    let mut fields = IndexMap::with_capacity(header.len());
    for (name, value) in header.iter().zip(values) {
        let kind = schema.field(name).map_or(FieldKind::Text, |f| f.kind);
        let value = match kind {
            FieldKind::Text => CsvValue::Text(value.to_owned()),
            FieldKind::Integer => {
                CsvValue::Integer(value.parse().map_err(|_| SkipReason::InvalidInteger {
                    column: name.clone(),
                    value: value.to_owned(),
                })?)
            }
        };
        fields.insert(name.clone(), value);
    }

    Ok(CsvRow { line, fields })
}

// ── Submission ───────────────────────────────────────────────────

/// Where imported hosts land.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostTarget {
    pub group_id: Option<GroupId>,
    pub pool_id: Option<PoolId>,
}

/// What a parsed payload is submitted as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportTarget {
    Hosts(HostTarget),
    Pools,
}

#[derive(Debug, Clone)]
pub struct CreatedRow {
    pub line: usize,
    pub subject: String,
    pub result: CommandResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    pub line: usize,
    pub subject: String,
    pub message: String,
}

/// Per-row outcome of a submission. Rows are independent: a failure
/// never rolls back another row's success.
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub created: Vec<CreatedRow>,
    pub failures: Vec<RowFailure>,
}

impl ImportReport {
    pub fn total(&self) -> usize {
        self.created.len() + self.failures.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A row turned into a command, or the reason it could not be.
pub(crate) struct PendingRow {
    pub line: usize,
    pub subject: String,
    pub command: Result<Command, String>,
}

/// Submit every accepted row of `parsed` as a create command.
pub async fn submit(console: &Console, parsed: &ParsedCsv, target: ImportTarget) -> ImportReport {
    let pending = parsed
        .rows
        .iter()
        .map(|row| {
            let (subject, command) = match target {
                ImportTarget::Hosts(host_target) => (
                    row.text("fqdn").unwrap_or_default().to_owned(),
                    host_request(
                        row.text("fqdn"),
                        row.text("ip"),
                        row.text("mac"),
                        row.text("ks"),
                        host_target,
                    )
                    .map(Command::CreateHost),
                ),
                ImportTarget::Pools => (
                    row.text("name").unwrap_or_default().to_owned(),
                    pool_request(row).map(Command::CreatePool),
                ),
            };
            PendingRow {
                line: row.line,
                subject,
                command,
            }
        })
        .collect();

    let report = submit_rows(console, pending).await;
    info!(
        schema = parsed.schema,
        created = report.created.len(),
        failed = report.failures.len(),
        skipped = parsed.skipped.len(),
        "import finished"
    );
    report
}

/// Execute pending rows with bounded concurrency, keeping input order in
/// the report.
pub(crate) async fn submit_rows(console: &Console, pending: Vec<PendingRow>) -> ImportReport {
    let concurrency = console.config().import_concurrency.max(1);

    let outcomes: Vec<(usize, String, Result<CommandResult, String>)> = stream::iter(pending)
        .map(|row| async move {
            let outcome = match row.command {
                Ok(command) => console
                    .execute(command)
                    .await
                    .map_err(|e: CoreError| e.to_string()),
                Err(message) => Err(message),
            };
            (row.line, row.subject, outcome)
        })
        .buffered(concurrency)
        .collect()
        .await;

    let mut report = ImportReport::default();
    for (line, subject, outcome) in outcomes {
        match outcome {
            Ok(result) => report.created.push(CreatedRow {
                line,
                subject,
                result,
            }),
            Err(message) => {
                warn!(line, subject = %subject, %message, "row failed");
                report.failures.push(RowFailure {
                    line,
                    subject,
                    message,
                });
            }
        }
    }
    report
}

pub(crate) fn host_request(
    fqdn: Option<&str>,
    ip: Option<&str>,
    mac: Option<&str>,
    ks: Option<&str>,
    target: HostTarget,
) -> Result<CreateHostRequest, String> {
    let fqdn = fqdn.ok_or("missing fqdn")?;
    let ip = ip.ok_or("missing ip")?;
    let mac = mac.ok_or("missing mac")?;

    Ok(CreateHostRequest {
        fqdn: fqdn.to_owned(),
        ip: ip.to_owned(),
        mac: MacAddress::new(mac),
        group_id: target.group_id,
        pool_id: target.pool_id,
        kickstart: Kickstart::new(ks.unwrap_or_default()),
    })
}

fn pool_request(row: &CsvRow) -> Result<CreatePoolRequest, String> {
    let field = |name: &'static str| row.text(name).ok_or_else(|| format!("missing {name}"));
    Ok(CreatePoolRequest::with_defaults(
        field("name")?,
        field("net_address")?,
        row.integer("netmask").ok_or("missing netmask")?,
        field("start_address")?,
        field("end_address")?,
        field("gateway")?,
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn rows_with_wrong_field_count_are_reported() {
        let csv = "fqdn,ip,mac\n\
                   esx01.lab.local,10.0.0.11,aa:bb:cc:00:00:01\n\
                   esx02.lab.local,10.0.0.12\n\
                   esx03.lab.local,10.0.0.13,aa:bb:cc:00:00:03,extra\n\
                   esx04.lab.local,10.0.0.14,aa:bb:cc:00:00:04\n";
        let parsed = parse(csv, &CsvSchema::HOSTS).unwrap();

        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[1].line, 5);
        assert_eq!(
            parsed.skipped,
            vec![
                RowDiagnostic {
                    line: 3,
                    reason: SkipReason::FieldCountMismatch {
                        expected: 3,
                        found: 2
                    },
                },
                RowDiagnostic {
                    line: 4,
                    reason: SkipReason::FieldCountMismatch {
                        expected: 3,
                        found: 4
                    },
                },
            ]
        );
    }

    #[test]
    fn blank_lines_and_whitespace_are_ignored() {
        let csv = "\r\n  fqdn , ip , mac \r\n\n esx01.lab.local , 10.0.0.11 , AA-BB-CC-00-00-01 \r\n\n";
        let parsed = parse(csv, &CsvSchema::HOSTS).unwrap();
        assert_eq!(parsed.header, vec!["fqdn", "ip", "mac"]);
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].text("ip"), Some("10.0.0.11"));
        assert_eq!(parsed.rows[0].line, 4);
    }

    #[test]
    fn netmask_is_coerced_to_integer() {
        let csv = "name,net_address,netmask,start_address,end_address,gateway\n\
                   lab,10.0.0.0,24,10.0.0.10,10.0.0.200,10.0.0.1\n\
                   bad,10.1.0.0,/24,10.1.0.10,10.1.0.200,10.1.0.1\n";
        let parsed = parse(csv, &CsvSchema::POOLS).unwrap();

        assert_eq!(parsed.rows[0].integer("netmask"), Some(24));
        assert_eq!(parsed.skipped.len(), 1);
        assert!(matches!(
            parsed.skipped[0].reason,
            SkipReason::InvalidInteger { ref value, .. } if value == "/24"
        ));

        let req = pool_request(&parsed.rows[0]).unwrap();
        assert!(req.only_serve_reimage);
        assert_eq!(req.lease_time, 7000);
    }

    #[test]
    fn header_errors_reject_the_payload() {
        assert_eq!(parse("  \n\n", &CsvSchema::HOSTS), Err(ImportError::MissingHeader));
        assert!(matches!(
            parse("fqdn,ip,mac,rack\n", &CsvSchema::HOSTS),
            Err(ImportError::UnknownColumn { ref name, .. }) if name == "rack"
        ));
        assert_eq!(
            parse("fqdn,ip,ip,mac\n", &CsvSchema::HOSTS),
            Err(ImportError::DuplicateColumn { name: "ip".into() })
        );
        assert_eq!(
            parse("fqdn,ip\n", &CsvSchema::HOSTS),
            Err(ImportError::MissingColumn { name: "mac".into() })
        );
    }

    #[test]
    fn header_only_payload_has_no_rows() {
        let parsed = parse("iloIpAddr,username,password", &CsvSchema::CANDIDATES).unwrap();
        assert!(parsed.rows.is_empty());
        assert!(parsed.skipped.is_empty());
    }

    #[test]
    fn host_request_requires_identity_fields() {
        let target = HostTarget {
            group_id: Some(GroupId(3)),
            pool_id: Some(PoolId(1)),
        };
        let req = host_request(
            Some("esx01.lab.local"),
            Some("10.0.0.11"),
            Some("AA:BB:CC:00:00:01"),
            None,
            target,
        )
        .unwrap();
        assert_eq!(req.mac.as_str(), "aa:bb:cc:00:00:01");
        assert_eq!(req.group_id, Some(GroupId(3)));
        assert!(req.kickstart.is_empty());

        let err = host_request(Some("esx01.lab.local"), None, None, None, target).unwrap_err();
        assert_eq!(err, "missing ip");
    }
}
