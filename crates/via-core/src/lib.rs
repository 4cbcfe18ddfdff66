// via-core: Reconciliation layer between via-api and consumers (CLI).

pub mod command;
pub mod config;
pub mod console;
pub mod convert;
pub mod error;
pub mod import;
pub mod model;
pub mod progress;
pub mod reimage;
pub mod store;
pub mod stream;
pub mod wizard;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::requests::*;
pub use command::{Command, CommandResult};
pub use config::{AuthCredentials, ConsoleConfig, DEFAULT_ILO_PORT, TlsVerification};
pub use console::{ConnectionState, Console, RefreshReport};
pub use error::{CoreError, ImportError};
pub use import::{
    CsvRow, CsvSchema, CsvValue, HostTarget, ImportReport, ImportTarget, ParsedCsv,
    RowDiagnostic, RowFailure, SkipReason,
};
pub use progress::{MergePolicy, ProgressStore};
pub use store::EntityStore;
pub use stream::EntityStream;
pub use wizard::{
    IlomProbe, ProbeOutcome, ValidationError, ValidationKind, Vendor, WizardCandidate,
    WizardSession, WizardState,
};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    Group, GroupId, GroupOptions, Host, HostId, Image, ImageId, Kickstart, MacAddress, Pool,
    PoolId, ProgressRecord,
};
