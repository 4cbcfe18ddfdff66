// ── API-to-domain type conversions ──
//
// Bridges `via_api::models` wire records and canonical `via_core::model`
// types in both directions. Kickstart text is decoded on the way in and
// encoded on the way out; a record whose kickstart cannot be decoded is
// a conversion error, never stored as-is.

use via_api::models::{
    GroupOptionsRecord, GroupRecord, HostForm, HostRecord, ImageRecord, PoolForm, PoolRecord,
};
use via_api::progress::clamp_percentage;

use crate::command::requests::{CreateHostRequest, CreatePoolRequest};
use crate::error::CoreError;
use crate::model::{
    Group, GroupId, GroupOptions, Host, HostId, Image, ImageId, Kickstart, MacAddress, Pool,
    PoolId, split_fqdn,
};

// ── Helpers ────────────────────────────────────────────────────────

fn decode_kickstart(
    entity_type: &'static str,
    id: i64,
    wire: &str,
) -> Result<Kickstart, CoreError> {
    Kickstart::from_wire(wire).map_err(|e| CoreError::Conversion {
        entity_type,
        identifier: id.to_string(),
        message: e.to_string(),
    })
}

/// Wire form of a kickstart: omitted when empty.
fn encode_kickstart(ks: &Kickstart) -> Option<String> {
    (!ks.is_empty()).then(|| ks.to_wire())
}

// ── Host ───────────────────────────────────────────────────────────

impl TryFrom<HostRecord> for Host {
    type Error = CoreError;

    fn try_from(r: HostRecord) -> Result<Self, Self::Error> {
        let kickstart = decode_kickstart("host", r.id, &r.ks)?;
        Ok(Self {
            id: HostId(r.id),
            hostname: r.hostname,
            domain: r.domain,
            ip: r.ip,
            mac: MacAddress::new(&r.mac),
            // The server stores "no group" as 0 in some versions.
            group_id: r.group_id.filter(|id| *id > 0).map(GroupId),
            pool_id: r.pool_id.filter(|id| *id > 0).map(PoolId),
            reimage: r.reimage,
            kickstart,
            progress: clamp_percentage(r.progress),
            progresstext: r.progresstext,
        })
    }
}

impl From<&CreateHostRequest> for HostForm {
    fn from(req: &CreateHostRequest) -> Self {
        let (hostname, domain) = split_fqdn(&req.fqdn);
        Self {
            ip: req.ip.trim().to_owned(),
            mac: req.mac.to_string(),
            hostname,
            domain,
            pool_id: req.pool_id.map(PoolId::get),
            group_id: req.group_id.map(GroupId::get),
            ks: encode_kickstart(&req.kickstart),
        }
    }
}

// ── Group ──────────────────────────────────────────────────────────

impl From<GroupOptionsRecord> for GroupOptions {
    fn from(o: GroupOptionsRecord) -> Self {
        Self {
            ssh: o.ssh,
            erasedisks: o.erasedisks,
            allowlegacycpu: o.allowlegacycpu,
            certificate: o.certificate,
            createvmfs: o.createvmfs,
        }
    }
}

impl TryFrom<GroupRecord> for Group {
    type Error = CoreError;

    fn try_from(r: GroupRecord) -> Result<Self, Self::Error> {
        let kickstart = decode_kickstart("group", r.id, &r.ks)?;
        Ok(Self {
            id: GroupId(r.id),
            name: r.name,
            pool_id: PoolId(r.pool_id),
            image_id: ImageId(r.image_id),
            dns: r.dns,
            ntp: r.ntp,
            syslog: r.syslog,
            vlan: r.vlan,
            bootdisk: r.bootdisk,
            callbackurl: r.callbackurl,
            kickstart,
            options: r.options.map(GroupOptions::from).unwrap_or_default(),
            hosts: Vec::new(),
        })
    }
}

// ── Pool / Image ───────────────────────────────────────────────────

impl From<PoolRecord> for Pool {
    fn from(r: PoolRecord) -> Self {
        Self {
            id: PoolId(r.id),
            name: r.name,
            net_address: r.net_address,
            netmask: r.netmask,
            start_address: r.start_address,
            end_address: r.end_address,
            gateway: r.gateway,
            only_serve_reimage: r.only_serve_reimage,
            lease_time: r.lease_time,
        }
    }
}

impl From<&CreatePoolRequest> for PoolForm {
    fn from(req: &CreatePoolRequest) -> Self {
        Self {
            name: req.name.clone(),
            net_address: req.net_address.clone(),
            netmask: req.netmask,
            start_address: req.start_address.clone(),
            end_address: req.end_address.clone(),
            gateway: req.gateway.clone(),
            only_serve_reimage: req.only_serve_reimage,
            lease_time: req.lease_time,
        }
    }
}

impl From<ImageRecord> for Image {
    fn from(r: ImageRecord) -> Self {
        Self {
            id: ImageId(r.id),
            iso_image: r.iso_image,
            path: r.path,
            size: r.size,
            hash: r.hash,
            description: r.description,
        }
    }
}

/// Convert a batch of records. Records that fail are logged and returned
/// separately so callers can report them.
pub(crate) fn convert_all<R, T>(records: Vec<R>) -> (Vec<T>, Vec<CoreError>)
where
    T: TryFrom<R, Error = CoreError>,
{
    let mut converted = Vec::with_capacity(records.len());
    let mut rejected = Vec::new();
    for record in records {
        match T::try_from(record) {
            Ok(v) => converted.push(v),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unconvertible record");
                rejected.push(e);
            }
        }
    }
    (converted, rejected)
}
