// ── Domain model ──
//
// Canonical types the console works with. Conversion from the backend's
// wire records lives in `crate::convert`.

pub mod group;
pub mod host;
pub mod ids;
pub mod kickstart;
pub mod pool;
pub mod progress;

pub use group::{Group, GroupOptions};
pub use host::{Host, join_fqdn, split_fqdn};
pub use ids::{GroupId, HostId, ImageId, MacAddress, PoolId};
pub use kickstart::{Kickstart, KickstartError};
pub use pool::{DEFAULT_LEASE_TIME, Image, Pool};
pub use progress::ProgressRecord;
