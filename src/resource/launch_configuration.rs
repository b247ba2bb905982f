//! The `aws_launch_configuration` resource.
//!
//! Launch configurations are immutable: there is no update verb, so every
//! tracked field forces replacement. The resource is identified by its
//! user-supplied name.

use std::collections::BTreeSet;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::block_device::{
    ebs_set_hash, ephemeral_set_hash, root_set_hash, BlockDevice, EbsBlockDevice,
    EphemeralBlockDevice, RootBlockDevice,
};
use super::{ResourceData, ResourceError};
use crate::executor::retry::retry_for;
use crate::provider::api::{error_code, CreateLaunchConfigurationInput, LaunchConfiguration};
use crate::provider::client::AwsClient;
use crate::schema::{hashcode, Field, FieldType, Schema};

pub const RESOURCE_TYPE: &str = "aws_launch_configuration";

pub type LaunchConfigurationData = ResourceData<LaunchConfigurationState>;

// ─── Schema ─────────────────────────────────────────────────────────────────

pub fn schema() -> Schema {
    use FieldType::*;

    Schema::new(vec![
        Field::new("name", String).required().force_new(),
        Field::new("image_id", String).required().force_new(),
        Field::new("instance_type", String).required().force_new(),
        Field::new("iam_instance_profile", String)
            .optional()
            .force_new(),
        Field::new("key_name", String)
            .optional()
            .computed()
            .force_new(),
        Field::new("user_data", String)
            .optional()
            .force_new()
            .state_func(user_data_state),
        Field::new("security_groups", Set(Box::new(String)))
            .optional()
            .force_new()
            .set_hash(string_set_hash),
        Field::new("associate_public_ip_address", Bool)
            .optional()
            .force_new()
            .default(json!(false)),
        Field::new("spot_price", String).optional().force_new(),
        Field::new("ebs_optimized", Bool)
            .optional()
            .computed()
            .force_new(),
        Field::new("placement_tenancy", String)
            .optional()
            .force_new(),
        Field::new("block_device", Map)
            .optional()
            .removed("Split out into three sub-types; see Changelog and Docs"),
        Field::new(
            "ebs_block_device",
            Set(Box::new(Block(vec![
                Field::new("delete_on_termination", Bool)
                    .optional()
                    .force_new()
                    .default(json!(true)),
                Field::new("device_name", String).required().force_new(),
                Field::new("iops", Int).optional().computed().force_new(),
                Field::new("snapshot_id", String)
                    .optional()
                    .computed()
                    .force_new(),
                Field::new("volume_size", Int)
                    .optional()
                    .computed()
                    .force_new(),
                Field::new("volume_type", String)
                    .optional()
                    .computed()
                    .force_new(),
            ]))),
        )
        .optional()
        .computed()
        .set_hash(ebs_set_hash),
        Field::new(
            "ephemeral_block_device",
            Set(Box::new(Block(vec![
                Field::new("device_name", String).required(),
                Field::new("virtual_name", String).required(),
            ]))),
        )
        .optional()
        .computed()
        .force_new()
        .set_hash(ephemeral_set_hash),
        // A set only so the field shape matches the other two; at most one
        // element is accepted at create time.
        Field::new(
            "root_block_device",
            Set(Box::new(Block(vec![
                Field::new("delete_on_termination", Bool)
                    .optional()
                    .force_new()
                    .default(json!(true)),
                Field::new("iops", Int).optional().computed().force_new(),
                Field::new("volume_size", Int)
                    .optional()
                    .computed()
                    .force_new(),
                Field::new("volume_type", String)
                    .optional()
                    .computed()
                    .force_new(),
            ]))),
        )
        .optional()
        .computed()
        .set_hash(root_set_hash),
    ])
}

/// Hex SHA-256 of a user-data payload, the form user data takes in state.
pub fn user_data_digest(raw: &[u8]) -> String {
    hex::encode(Sha256::digest(raw))
}

fn user_data_state(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(user_data_digest(s.as_bytes())),
        _ => Value::String(String::new()),
    }
}

fn string_set_hash(value: &Value) -> u32 {
    hashcode::string(value.as_str().unwrap_or_default())
}

// ─── Desired Configuration ──────────────────────────────────────────────────

/// Validated desired state of a launch configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LaunchConfigurationConfig {
    pub name: String,
    pub image_id: String,
    pub instance_type: String,
    #[serde(default)]
    pub iam_instance_profile: Option<String>,
    #[serde(default)]
    pub key_name: Option<String>,
    /// Raw payload; only its digest is ever stored.
    #[serde(default)]
    pub user_data: Option<String>,
    #[serde(default)]
    pub security_groups: BTreeSet<String>,
    #[serde(default)]
    pub associate_public_ip_address: Option<bool>,
    #[serde(default)]
    pub spot_price: Option<String>,
    #[serde(default)]
    pub ebs_optimized: Option<bool>,
    #[serde(default)]
    pub placement_tenancy: Option<String>,
    #[serde(default)]
    pub ebs_block_device: Vec<EbsBlockDevice>,
    #[serde(default)]
    pub ephemeral_block_device: Vec<EphemeralBlockDevice>,
    #[serde(default)]
    pub root_block_device: Vec<RootBlockDevice>,
}

impl LaunchConfigurationConfig {
    /// Validate raw attributes against the schema and decode them.
    ///
    /// Set-typed block fields are deduplicated by element hash.
    pub fn from_attributes(attrs: &Value) -> Result<Self, ResourceError> {
        let schema = schema();
        let errors = schema.validate(attrs);
        if !errors.is_empty() {
            return Err(ResourceError::InvalidConfig(errors));
        }
        let coerced = attrs
            .as_object()
            .map(|map| schema.coerce(map))
            .unwrap_or_default();

        let mut config: Self = serde_json::from_value(Value::Object(coerced))?;
        dedup_by_hash(&mut config.ebs_block_device, EbsBlockDevice::set_hash);
        dedup_by_hash(
            &mut config.ephemeral_block_device,
            EphemeralBlockDevice::set_hash,
        );
        dedup_by_hash(&mut config.root_block_device, RootBlockDevice::set_hash);
        Ok(config)
    }

    /// All block devices in request order: EBS, then ephemeral, then root.
    pub fn block_devices(&self) -> Vec<BlockDevice> {
        self.ebs_block_device
            .iter()
            .cloned()
            .map(BlockDevice::Ebs)
            .chain(
                self.ephemeral_block_device
                    .iter()
                    .cloned()
                    .map(BlockDevice::Ephemeral),
            )
            .chain(self.root_block_device.iter().cloned().map(BlockDevice::Root))
            .collect()
    }
}

fn dedup_by_hash<T>(items: &mut Vec<T>, hash: fn(&T) -> u32) {
    let mut seen = BTreeSet::new();
    items.retain(|item| seen.insert(hash(item)));
}

// ─── Tracked State ──────────────────────────────────────────────────────────

/// State tracked for a launch configuration. Unset fields are `None` or
/// empty and are left out when serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchConfigurationState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iam_instance_profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    /// Digest of the payload, see [`user_data_digest`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub security_groups: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associate_public_ip_address: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spot_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ebs_optimized: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement_tenancy: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ebs_block_device: Vec<EbsBlockDevice>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ephemeral_block_device: Vec<EphemeralBlockDevice>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub root_block_device: Vec<RootBlockDevice>,
}

impl LaunchConfigurationState {
    /// The state a successful create starts from, before the read-back.
    pub fn from_config(config: &LaunchConfigurationConfig) -> Self {
        Self {
            name: Some(config.name.clone()),
            image_id: Some(config.image_id.clone()),
            instance_type: Some(config.instance_type.clone()),
            iam_instance_profile: config.iam_instance_profile.clone(),
            key_name: config.key_name.clone(),
            user_data: config
                .user_data
                .as_ref()
                .map(|u| user_data_digest(u.as_bytes())),
            security_groups: config.security_groups.clone(),
            associate_public_ip_address: Some(config.associate_public_ip_address.unwrap_or(false)),
            spot_price: config.spot_price.clone(),
            ebs_optimized: config.ebs_optimized,
            placement_tenancy: config.placement_tenancy.clone(),
            ebs_block_device: config.ebs_block_device.clone(),
            ephemeral_block_device: config.ephemeral_block_device.clone(),
            root_block_device: config.root_block_device.clone(),
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

// ─── Create ─────────────────────────────────────────────────────────────────

pub async fn create(
    d: &mut LaunchConfigurationData,
    config: &LaunchConfigurationConfig,
    meta: &AwsClient,
) -> Result<(), ResourceError> {
    if config.root_block_device.len() > 1 {
        return Err(ResourceError::TooManyRootBlockDevices(
            config.root_block_device.len(),
        ));
    }

    let user_data = config
        .user_data
        .as_deref()
        .map(|u| STANDARD.encode(u))
        .unwrap_or_default();

    let mut input = CreateLaunchConfigurationInput {
        launch_configuration_name: config.name.clone(),
        image_id: config.image_id.clone(),
        instance_type: config.instance_type.clone(),
        user_data,
        associate_public_ip_address: config.associate_public_ip_address.unwrap_or(false),
        key_name: non_empty(config.key_name.clone()),
        spot_price: non_empty(config.spot_price.clone()),
        iam_instance_profile: non_empty(config.iam_instance_profile.clone()),
        ebs_optimized: config.ebs_optimized,
        placement_tenancy: non_empty(config.placement_tenancy.clone()),
        security_groups: None,
        block_device_mappings: None,
    };

    if !config.security_groups.is_empty() {
        input.security_groups = Some(config.security_groups.iter().cloned().collect());
    }

    let devices = config.block_devices();
    if !devices.is_empty() {
        let root_device_name = match config.root_block_device.first() {
            Some(_) => Some(fetch_root_device_name(&config.image_id, meta).await?),
            None => None,
        };
        let root_device_name = root_device_name.as_deref().unwrap_or_default();
        input.block_device_mappings = Some(
            devices
                .iter()
                .map(|device| device.to_mapping(root_device_name))
                .collect(),
        );
    }

    debug!(request = ?input, "autoscaling create launch configuration");
    meta.autoscaling
        .create_launch_configuration(&input)
        .await
        .map_err(ResourceError::Create)?;

    d.set_id(config.name.clone());
    d.state = LaunchConfigurationState::from_config(config);
    info!(id = %config.name, "launch configuration created");

    // Newly created launch configurations can take a moment to show up in
    // describe results.
    let name = config.name.as_str();
    let lc = retry_for(
        meta.consistency_window,
        "read launch configuration",
        move || async move {
            describe(name, meta)
                .await?
                .ok_or_else(|| ResourceError::NotYetVisible(name.to_string()))
        },
    )
    .await?;

    refresh_state(d, lc, meta).await;
    Ok(())
}

// ─── Read ───────────────────────────────────────────────────────────────────

/// Refresh tracked state from the API.
///
/// If the launch configuration no longer exists the identifier is cleared
/// and the read still succeeds.
pub async fn read(d: &mut LaunchConfigurationData, meta: &AwsClient) -> Result<(), ResourceError> {
    let Some(id) = d.id().map(str::to_string) else {
        return Ok(());
    };

    match describe(&id, meta).await? {
        Some(lc) => {
            refresh_state(d, lc, meta).await;
        }
        None => {
            warn!(id = %id, "launch configuration not found, removing from state");
            d.clear_id();
        }
    }
    Ok(())
}

/// Look up one launch configuration by name.
async fn describe(
    name: &str,
    meta: &AwsClient,
) -> Result<Option<LaunchConfiguration>, ResourceError> {
    let names = vec![name.to_string()];
    debug!(?names, "launch configuration describe");

    let mut found = meta
        .autoscaling
        .describe_launch_configurations(&names)
        .await
        .map_err(ResourceError::Describe)?;

    let Some(first) = found.first() else {
        return Ok(None);
    };
    if first.launch_configuration_name != name {
        return Err(ResourceError::IdMismatch {
            expected: name.to_string(),
            found: found
                .iter()
                .map(|lc| lc.launch_configuration_name.clone())
                .collect(),
        });
    }
    Ok(Some(found.swap_remove(0)))
}

async fn refresh_state(d: &mut LaunchConfigurationData, lc: LaunchConfiguration, meta: &AwsClient) {
    let root_device_name = if lc.block_device_mappings.is_empty() {
        None
    } else {
        match fetch_root_device_name(&lc.image_id, meta).await {
            Ok(name) => Some(name),
            Err(e) => {
                warn!(
                    image_id = %lc.image_id,
                    error = %e,
                    "cannot resolve root device name, treating all volumes as EBS"
                );
                None
            }
        }
    };

    // A volume tracked as EBS stays EBS even when it sits on the image's
    // root device name.
    let root_device_name = root_device_name.filter(|root| {
        !d.state
            .ebs_block_device
            .iter()
            .any(|device| &device.device_name == root)
    });

    let state = &mut d.state;
    state.name = Some(lc.launch_configuration_name);
    state.image_id = Some(lc.image_id);
    state.instance_type = Some(lc.instance_type);
    state.key_name = non_empty(lc.key_name);
    state.iam_instance_profile = non_empty(lc.iam_instance_profile);
    state.spot_price = non_empty(lc.spot_price);
    state.placement_tenancy = non_empty(lc.placement_tenancy);
    state.security_groups = lc.security_groups.unwrap_or_default().into_iter().collect();

    if let Some(associate) = lc.associate_public_ip_address {
        state.associate_public_ip_address = Some(associate);
    }
    if let Some(ebs_optimized) = lc.ebs_optimized {
        state.ebs_optimized = Some(ebs_optimized);
    }

    state.user_data = match non_empty(lc.user_data) {
        Some(encoded) => match STANDARD.decode(&encoded) {
            Ok(raw) => Some(user_data_digest(&raw)),
            Err(e) => {
                warn!(error = %e, "user data returned by the API is not base64, keeping prior digest");
                state.user_data.take()
            }
        },
        None => None,
    };

    state.ebs_block_device.clear();
    state.ephemeral_block_device.clear();
    state.root_block_device.clear();
    for mapping in &lc.block_device_mappings {
        match BlockDevice::from_mapping(mapping, root_device_name.as_deref()) {
            BlockDevice::Ebs(device) => state.ebs_block_device.push(device),
            BlockDevice::Ephemeral(device) => state.ephemeral_block_device.push(device),
            BlockDevice::Root(device) => state.root_block_device.push(device),
        }
    }
}

/// Root device name of a machine image.
async fn fetch_root_device_name(image_id: &str, meta: &AwsClient) -> Result<String, ResourceError> {
    let image = meta
        .ec2
        .describe_image(image_id)
        .await
        .map_err(|source| ResourceError::ImageLookup {
            image_id: image_id.to_string(),
            source,
        })?;

    let Some(image) = image else {
        return Err(ResourceError::RootDeviceName {
            image_id: image_id.to_string(),
            reason: "image not found".to_string(),
        });
    };
    non_empty(image.root_device_name).ok_or_else(|| ResourceError::RootDeviceName {
        image_id: image_id.to_string(),
        reason: "image has no root device name".to_string(),
    })
}

// ─── Delete ─────────────────────────────────────────────────────────────────

/// Delete by name. A launch configuration that is already gone counts as
/// deleted.
pub async fn delete(d: &LaunchConfigurationData, meta: &AwsClient) -> Result<(), ResourceError> {
    let Some(id) = d.id() else {
        return Ok(());
    };

    debug!(id = %id, "launch configuration destroy");
    match meta.autoscaling.delete_launch_configuration(id).await {
        Ok(()) => {
            info!(id = %id, "launch configuration deleted");
            Ok(())
        }
        Err(e) if e.is_code(error_code::LAUNCH_CONFIGURATION_NOT_FOUND) => {
            debug!(id = %id, "launch configuration already gone");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_rejects_removed_block_device() {
        let err = LaunchConfigurationConfig::from_attributes(&json!({
            "name": "web-lc",
            "image_id": "ami-1234",
            "instance_type": "t2.micro",
            "block_device": { "device_name": "/dev/sdb" }
        }))
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("block_device"), "{}", msg);
        assert!(msg.contains("Split out into three sub-types"), "{}", msg);
    }

    #[test]
    fn every_configurable_field_forces_replacement() {
        for field in schema().fields {
            if field.removed.is_some() {
                continue;
            }
            assert!(field.forces_replacement(), "{} should force new", field.name);
        }
    }

    #[test]
    fn user_data_state_is_a_digest() {
        let state = user_data_state(&json!("#!/bin/sh\necho hi"));
        let digest = state.as_str().unwrap();
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, user_data_digest(b"#!/bin/sh\necho hi"));
        assert_ne!(digest, user_data_digest(b"#!/bin/sh\necho bye"));
    }

    #[test]
    fn security_group_hash_is_the_string_hash() {
        assert_eq!(string_set_hash(&json!("sg-1")), hashcode::string("sg-1"));
    }

    #[test]
    fn from_attributes_applies_block_defaults_and_dedups() {
        let config = LaunchConfigurationConfig::from_attributes(&json!({
            "name": "web-lc",
            "image_id": "ami-1234",
            "instance_type": "t2.micro",
            "security_groups": ["sg-2", "sg-1", "sg-2"],
            "spot_price": 0.05,
            "ebs_block_device": [
                { "device_name": "/dev/sdb", "volume_size": 20 },
                { "device_name": "/dev/sdb", "volume_size": 20, "iops": 300 }
            ]
        }))
        .unwrap();

        assert_eq!(
            config.security_groups.iter().collect::<Vec<_>>(),
            vec!["sg-1", "sg-2"]
        );
        assert_eq!(config.spot_price.as_deref(), Some("0.05"));
        assert_eq!(config.ebs_block_device.len(), 1);
        assert!(config.ebs_block_device[0].delete_on_termination);
        assert_eq!(config.associate_public_ip_address, None);
    }

    #[test]
    fn missing_required_fields_are_reported_together() {
        let err = LaunchConfigurationConfig::from_attributes(&json!({ "name": "x" })).unwrap_err();
        match err {
            ResourceError::InvalidConfig(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn block_devices_are_ordered_by_kind() {
        let config = LaunchConfigurationConfig::from_attributes(&json!({
            "name": "web-lc",
            "image_id": "ami-1234",
            "instance_type": "t2.micro",
            "root_block_device": [{ "volume_size": 50 }],
            "ephemeral_block_device": [{ "device_name": "/dev/sdc", "virtual_name": "ephemeral0" }],
            "ebs_block_device": [{ "device_name": "/dev/sdb" }]
        }))
        .unwrap();
        let kinds: Vec<&str> = config
            .block_devices()
            .iter()
            .map(|d| match d {
                BlockDevice::Ebs(_) => "ebs",
                BlockDevice::Ephemeral(_) => "ephemeral",
                BlockDevice::Root(_) => "root",
            })
            .collect();
        assert_eq!(kinds, vec!["ebs", "ephemeral", "root"]);
    }

    #[test]
    fn state_from_config_defaults_public_ip_to_false() {
        let config = LaunchConfigurationConfig::from_attributes(&json!({
            "name": "web-lc",
            "image_id": "ami-1234",
            "instance_type": "t2.micro",
            "user_data": "hello"
        }))
        .unwrap();
        let state = LaunchConfigurationState::from_config(&config);
        assert_eq!(state.associate_public_ip_address, Some(false));
        assert_eq!(state.user_data, Some(user_data_digest(b"hello")));
        let json = state.to_json();
        assert!(json.get("key_name").is_none());
        assert!(json.get("ebs_block_device").is_none());
    }
}
