//! Block device mappings of a launch configuration.
//!
//! The three kinds are stored as separate set-typed fields. Elements have no
//! external identifier, so each is identified by a hash over its significant
//! fields. IOPS is never part of that hash: the API fills it in on its own
//! for some volume types, and hashing it would make every refresh look like
//! a change.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::provider::api::{BlockDeviceMapping, Ebs};
use crate::schema::hashcode;

fn default_true() -> bool {
    true
}

/// A network-attached volume at a user-chosen device name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EbsBlockDevice {
    pub device_name: String,
    #[serde(default = "default_true")]
    pub delete_on_termination: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iops: Option<i64>,
}

/// Instance-store storage exposed under a virtual name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EphemeralBlockDevice {
    pub device_name: String,
    pub virtual_name: String,
}

/// The boot volume. Its device name comes from the machine image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootBlockDevice {
    #[serde(default = "default_true")]
    pub delete_on_termination: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iops: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockDevice {
    Ebs(EbsBlockDevice),
    Ephemeral(EphemeralBlockDevice),
    Root(RootBlockDevice),
}

impl EbsBlockDevice {
    pub fn set_hash(&self) -> u32 {
        hashcode::string(&format!(
            "{}-{}-{}-{}-{}-",
            self.delete_on_termination,
            self.device_name,
            self.snapshot_id.as_deref().unwrap_or(""),
            self.volume_size.unwrap_or(0),
            self.volume_type.as_deref().unwrap_or(""),
        ))
    }
}

impl EphemeralBlockDevice {
    pub fn set_hash(&self) -> u32 {
        hashcode::string(&format!("{}-{}-", self.device_name, self.virtual_name))
    }
}

impl RootBlockDevice {
    pub fn set_hash(&self) -> u32 {
        hashcode::string(&format!(
            "{}-{}-{}-",
            self.delete_on_termination,
            self.volume_size.unwrap_or(0),
            self.volume_type.as_deref().unwrap_or(""),
        ))
    }
}

impl BlockDevice {
    /// Set-membership key of this mapping within its own field.
    pub fn set_hash(&self) -> u32 {
        match self {
            BlockDevice::Ebs(d) => d.set_hash(),
            BlockDevice::Ephemeral(d) => d.set_hash(),
            BlockDevice::Root(d) => d.set_hash(),
        }
    }

    /// Translate into the wire mapping. Root devices take the device name
    /// resolved from the machine image.
    pub fn to_mapping(&self, root_device_name: &str) -> BlockDeviceMapping {
        match self {
            BlockDevice::Ebs(d) => BlockDeviceMapping {
                device_name: d.device_name.clone(),
                virtual_name: None,
                ebs: Some(ebs_request(
                    d.delete_on_termination,
                    d.snapshot_id.as_deref(),
                    d.volume_size,
                    d.volume_type.as_deref(),
                    d.iops,
                )),
            },
            BlockDevice::Ephemeral(d) => BlockDeviceMapping {
                device_name: d.device_name.clone(),
                virtual_name: Some(d.virtual_name.clone()),
                ebs: None,
            },
            BlockDevice::Root(d) => BlockDeviceMapping {
                device_name: root_device_name.to_string(),
                virtual_name: None,
                ebs: Some(ebs_request(
                    d.delete_on_termination,
                    None,
                    d.volume_size,
                    d.volume_type.as_deref(),
                    d.iops,
                )),
            },
        }
    }

    /// Classify a mapping read back from the API.
    ///
    /// A virtual name marks instance storage; the image's root device name
    /// marks the root volume; everything else is a plain EBS volume.
    pub fn from_mapping(mapping: &BlockDeviceMapping, root_device_name: Option<&str>) -> Self {
        if let Some(virtual_name) = &mapping.virtual_name {
            return BlockDevice::Ephemeral(EphemeralBlockDevice {
                device_name: mapping.device_name.clone(),
                virtual_name: virtual_name.clone(),
            });
        }

        let ebs = mapping.ebs.clone().unwrap_or_default();
        let delete_on_termination = ebs.delete_on_termination.unwrap_or(true);
        if root_device_name == Some(mapping.device_name.as_str()) {
            return BlockDevice::Root(RootBlockDevice {
                delete_on_termination,
                volume_size: ebs.volume_size,
                volume_type: ebs.volume_type,
                iops: ebs.iops,
            });
        }

        BlockDevice::Ebs(EbsBlockDevice {
            device_name: mapping.device_name.clone(),
            delete_on_termination,
            snapshot_id: ebs.snapshot_id,
            volume_size: ebs.volume_size,
            volume_type: ebs.volume_type,
            iops: ebs.iops,
        })
    }
}

/// Build the EBS part of a request, leaving zero and empty values unset.
fn ebs_request(
    delete_on_termination: bool,
    snapshot_id: Option<&str>,
    volume_size: Option<i64>,
    volume_type: Option<&str>,
    iops: Option<i64>,
) -> Ebs {
    Ebs {
        delete_on_termination: Some(delete_on_termination),
        snapshot_id: snapshot_id.filter(|s| !s.is_empty()).map(str::to_string),
        volume_size: volume_size.filter(|&s| s != 0),
        volume_type: volume_type.filter(|t| !t.is_empty()).map(str::to_string),
        iops: iops.filter(|&i| i > 0),
    }
}

// ─── Schema Set Hashes ──────────────────────────────────────────────────────

/// Set hash over a JSON `ebs_block_device` element.
pub fn ebs_set_hash(value: &Value) -> u32 {
    match serde_json::from_value::<EbsBlockDevice>(value.clone()) {
        Ok(device) => device.set_hash(),
        Err(_) => hashcode::string(&value.to_string()),
    }
}

/// Set hash over a JSON `ephemeral_block_device` element.
pub fn ephemeral_set_hash(value: &Value) -> u32 {
    match serde_json::from_value::<EphemeralBlockDevice>(value.clone()) {
        Ok(device) => device.set_hash(),
        Err(_) => hashcode::string(&value.to_string()),
    }
}

/// Set hash over a JSON `root_block_device` element.
pub fn root_set_hash(value: &Value) -> u32 {
    match serde_json::from_value::<RootBlockDevice>(value.clone()) {
        Ok(device) => device.set_hash(),
        Err(_) => hashcode::string(&value.to_string()),
    }
}
