// ── Kickstart scripts ──
//
// Kickstart overrides travel base64-encoded (`ks` on the wire) and are
// edited as plain text. `Kickstart` always holds the plain text; the
// only way to get wire text is `to_wire`, the only way in is `from_wire`.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why wire text could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KickstartError {
    #[error("kickstart is not valid base64: {0}")]
    Base64(String),
    #[error("kickstart is not valid UTF-8")]
    Utf8,
}

/// A plain-text kickstart script. Empty means "use the default".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Kickstart(String);

impl Kickstart {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Decode base64 wire text. Empty (or whitespace-only) decodes to an
    /// empty script.
    pub fn from_wire(encoded: &str) -> Result<Self, KickstartError> {
        let encoded = encoded.trim();
        if encoded.is_empty() {
            return Ok(Self::default());
        }
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| KickstartError::Base64(e.to_string()))?;
        String::from_utf8(bytes)
            .map(Self)
            .map_err(|_| KickstartError::Utf8)
    }

    /// Base64 wire text; empty for an empty script.
    pub fn to_wire(&self) -> String {
        if self.0.is_empty() {
            String::new()
        } else {
            STANDARD.encode(self.0.as_bytes())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Kickstart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_wire_text_is_empty_script() {
        assert!(Kickstart::from_wire("").unwrap().is_empty());
        assert!(Kickstart::from_wire("  \n").unwrap().is_empty());
        assert_eq!(Kickstart::default().to_wire(), "");
    }

    #[test]
    fn decodes_known_payload() {
        let ks = Kickstart::from_wire("dmFyIGE9MQ==").unwrap();
        assert_eq!(ks.as_str(), "var a=1");
    }

    #[test]
    fn rejects_undecodable_text() {
        assert!(matches!(
            Kickstart::from_wire("#!/bin/sh not base64"),
            Err(KickstartError::Base64(_))
        ));
        // "//79" is 0xFF 0xFE 0xFD: valid base64, invalid UTF-8.
        assert_eq!(Kickstart::from_wire("//79"), Err(KickstartError::Utf8));
    }

    proptest! {
        #[test]
        fn wire_round_trip_preserves_text(text in any::<String>()) {
            let ks = Kickstart::new(text.clone());
            let back = Kickstart::from_wire(&ks.to_wire()).unwrap();
            prop_assert_eq!(back.as_str(), text.as_str());
        }
    }
}
