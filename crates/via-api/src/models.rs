// Backend wire types
//
// Flat JSON objects exchanged with the go-via REST API. Field names follow
// the backend verbatim (`pool_id`, `progresstext`, `iloIpAddr`, ...).
// `ks` fields carry base64 text on the wire; decoding happens in via-core.
// Fields use `#[serde(default)]` liberally because the backend omits
// zero values and null foreign keys.

use serde::{Deserialize, Serialize};

// ── Error envelope ───────────────────────────────────────────────────

/// `error` may be a single string or a list of validation messages.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ErrorField {
    One(String),
    Many(Vec<String>),
}

impl ErrorField {
    pub fn joined(&self) -> String {
        match self {
            Self::One(msg) => msg.clone(),
            Self::Many(msgs) => msgs.join("; "),
        }
    }
}

/// Any of the error shapes the backend produces.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<ErrorField>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl ErrorBody {
    /// First non-empty message, preferring `error` over `message`.
    pub fn message(&self) -> Option<String> {
        self.error
            .as_ref()
            .map(ErrorField::joined)
            .or_else(|| self.error_message.clone())
            .or_else(|| self.message.clone())
            .filter(|m| !m.is_empty())
    }
}

// ── Hosts (backend: "addresses") ─────────────────────────────────────

/// A host as returned by `GET /v1/addresses`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostRecord {
    pub id: i64,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub mac: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub reimage: bool,
    #[serde(default)]
    pub pool_id: Option<i64>,
    #[serde(default)]
    pub group_id: Option<i64>,
    #[serde(default)]
    pub progress: i64,
    #[serde(default)]
    pub progresstext: String,
    /// Base64-encoded kickstart override.
    #[serde(default)]
    pub ks: String,
}

/// Create body for a host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HostForm {
    pub ip: String,
    pub mac: String,
    pub hostname: String,
    pub domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ks: Option<String>,
}

// ── Groups ───────────────────────────────────────────────────────────

/// Group feature flags. Only truthy flags are sent; absent means off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupOptionsRecord {
    #[serde(default, skip_serializing_if = "is_false")]
    pub ssh: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub erasedisks: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub allowlegacycpu: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub certificate: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub createvmfs: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(b: &bool) -> bool {
    !*b
}

/// A group as returned by `GET /v1/groups` (password never included).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupRecord {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub pool_id: i64,
    #[serde(default)]
    pub image_id: i64,
    #[serde(default)]
    pub dns: String,
    #[serde(default)]
    pub ntp: String,
    #[serde(default)]
    pub syslog: String,
    #[serde(default)]
    pub vlan: String,
    #[serde(default)]
    pub bootdisk: String,
    #[serde(default)]
    pub callbackurl: String,
    #[serde(default)]
    pub ks: String,
    #[serde(default)]
    pub options: Option<GroupOptionsRecord>,
}

// ── Pools ────────────────────────────────────────────────────────────

/// A DHCP pool as returned by `GET /v1/pools`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolRecord {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub net_address: String,
    #[serde(default)]
    pub netmask: i64,
    #[serde(default)]
    pub start_address: String,
    #[serde(default)]
    pub end_address: String,
    #[serde(default)]
    pub gateway: String,
    #[serde(default)]
    pub only_serve_reimage: bool,
    #[serde(default)]
    pub lease_time: i64,
}

/// Create body for a pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolForm {
    pub name: String,
    pub net_address: String,
    pub netmask: i64,
    pub start_address: String,
    pub end_address: String,
    pub gateway: String,
    pub only_serve_reimage: bool,
    pub lease_time: i64,
}

// ── Images ───────────────────────────────────────────────────────────

/// An installer image as returned by `GET /v1/images`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: i64,
    #[serde(default)]
    pub iso_image: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub description: String,
}

// ── Out-of-band management check ─────────────────────────────────────

/// Body of `POST /v1/checkilo`. The backend expects the port as a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IlomCheckRequest {
    #[serde(rename = "iloIpAddr")]
    pub ilo_ip_addr: String,
    pub port: String,
}

// ── Login ────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn error_body_prefers_error_field() {
        let body: ErrorBody =
            serde_json::from_value(json!({ "error": "bad ip", "message": "ignored" })).unwrap();
        assert_eq!(body.message().as_deref(), Some("bad ip"));
    }

    #[test]
    fn error_body_joins_error_list() {
        let body: ErrorBody =
            serde_json::from_value(json!({ "error": ["name required", "pool required"] }))
                .unwrap();
        assert_eq!(body.message().as_deref(), Some("name required; pool required"));
    }

    #[test]
    fn error_body_falls_back_to_message_shapes() {
        let body: ErrorBody =
            serde_json::from_value(json!({ "error_status": 400, "error_message": "not found" }))
                .unwrap();
        assert_eq!(body.message().as_deref(), Some("not found"));

        let body: ErrorBody = serde_json::from_value(json!({ "message": "boom" })).unwrap();
        assert_eq!(body.message().as_deref(), Some("boom"));

        let body: ErrorBody = serde_json::from_value(json!({})).unwrap();
        assert!(body.message().is_none());
    }

    #[test]
    fn host_record_tolerates_null_foreign_keys() {
        let host: HostRecord = serde_json::from_value(json!({
            "id": 7,
            "ip": "10.0.0.7",
            "mac": "aa:bb:cc:dd:ee:07",
            "hostname": "esx07",
            "domain": "lab.local",
            "pool_id": null,
            "group_id": 2,
            "first_seen": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(host.id, 7);
        assert_eq!(host.pool_id, None);
        assert_eq!(host.group_id, Some(2));
        assert!(!host.reimage);
        assert!(host.ks.is_empty());
    }

    #[test]
    fn group_options_only_serialize_truthy_flags() {
        let opts = GroupOptionsRecord {
            ssh: true,
            createvmfs: true,
            ..GroupOptionsRecord::default()
        };
        assert_eq!(
            serde_json::to_value(opts).unwrap(),
            json!({ "ssh": true, "createvmfs": true })
        );
        assert_eq!(
            serde_json::to_value(GroupOptionsRecord::default()).unwrap(),
            json!({})
        );
    }

    #[test]
    fn ilom_request_uses_backend_field_names() {
        let req = IlomCheckRequest {
            ilo_ip_addr: "10.1.1.1".into(),
            port: "443".into(),
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({ "iloIpAddr": "10.1.1.1", "port": "443" })
        );
    }
}
