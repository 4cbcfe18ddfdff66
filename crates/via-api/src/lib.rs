// via-api: Async Rust client for the go-via provisioning backend (REST + progress stream)

pub mod auth;
pub mod client;
pub mod error;
pub mod groups;
pub mod hosts;
pub mod ilom;
pub mod images;
pub mod models;
pub mod pools;
pub mod progress;
pub mod transport;

pub use client::ViaClient;
pub use error::Error;
pub use ilom::IlomCheckResponse;
pub use progress::{ProgressEvent, ProgressEvents, ProgressStream, ReconnectConfig};
pub use transport::{TlsMode, TransportConfig};
