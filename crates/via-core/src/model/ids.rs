// ── Identity types ──
//
// Every backend entity is keyed by a database integer. Each entity kind
// gets its own newtype so a `GroupId` can never be passed where a
// `HostId` is expected.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! integer_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }
    };
}

integer_id!(
    /// Backend id of a host (an "address" on the wire).
    HostId
);
integer_id!(
    /// Backend id of a host group.
    GroupId
);
integer_id!(
    /// Backend id of a DHCP pool.
    PoolId
);
integer_id!(
    /// Backend id of an installer image.
    ImageId
);

// ── MacAddress ──────────────────────────────────────────────────────

/// MAC address, normalized to lowercase colon-separated format (aa:bb:cc:dd:ee:ff).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MacAddress(String);

impl MacAddress {
    /// Normalize any common notation: colons, dashes, Cisco dots or bare hex.
    /// Input that is not twelve hex digits is kept (lowercased) as given so
    /// the server can reject it with its own message.
    pub fn new(raw: impl AsRef<str>) -> Self {
        let raw = raw.as_ref().trim().to_lowercase();
        let hex: String = raw.chars().filter(char::is_ascii_hexdigit).collect();
        let only_separators = raw
            .chars()
            .all(|c| c.is_ascii_hexdigit() || matches!(c, ':' | '-' | '.'));

        if hex.len() == 12 && only_separators {
            let pairs: Vec<&str> = (0..12)
                .step_by(2)
                .filter_map(|i| hex.get(i..i + 2))
                .collect();
            Self(pairs.join(":"))
        } else {
            Self(raw.replace('-', ":"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MacAddress {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}
