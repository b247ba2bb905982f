//! Wire models and client traits for the auto-scaling and image APIs.
//!
//! Field names follow the cloud API's request/response shapes. Optional
//! members are `None` when the API distinguishes "unset" from an explicit
//! value, and are skipped when serialized.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes the handler reacts to.
pub mod error_code {
    pub const LAUNCH_CONFIGURATION_NOT_FOUND: &str = "InvalidConfiguration.NotFound";
    pub const ALREADY_EXISTS: &str = "AlreadyExists";
    pub const VALIDATION_ERROR: &str = "ValidationError";
    pub const IMAGE_NOT_FOUND: &str = "InvalidAMIID.NotFound";
}

/// An error returned by the cloud API, with a machine-readable code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn is_code(&self, code: &str) -> bool {
        self.code == code
    }
}

// ─── Block Device Mappings ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ebs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_on_termination: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iops: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDeviceMapping {
    pub device_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ebs: Option<Ebs>,
}

// ─── Launch Configurations ──────────────────────────────────────────────────

/// Request body of the create call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateLaunchConfigurationInput {
    pub launch_configuration_name: String,
    pub image_id: String,
    pub instance_type: String,
    /// Base64 of the raw payload; empty when no user data was configured.
    pub user_data: String,
    pub associate_public_ip_address: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spot_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iam_instance_profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ebs_optimized: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement_tenancy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_groups: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_device_mappings: Option<Vec<BlockDeviceMapping>>,
}

/// A launch configuration as described by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchConfiguration {
    pub launch_configuration_name: String,
    pub image_id: String,
    pub instance_type: String,
    #[serde(default)]
    pub key_name: Option<String>,
    #[serde(default)]
    pub security_groups: Option<Vec<String>>,
    #[serde(default)]
    pub user_data: Option<String>,
    #[serde(default)]
    pub spot_price: Option<String>,
    #[serde(default)]
    pub iam_instance_profile: Option<String>,
    #[serde(default)]
    pub associate_public_ip_address: Option<bool>,
    #[serde(default)]
    pub ebs_optimized: Option<bool>,
    #[serde(default)]
    pub placement_tenancy: Option<String>,
    #[serde(default)]
    pub block_device_mappings: Vec<BlockDeviceMapping>,
    pub created_time: DateTime<Utc>,
}

// ─── Images ─────────────────────────────────────────────────────────────────

/// The subset of machine-image metadata the handler needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub image_id: String,
    #[serde(default)]
    pub root_device_name: Option<String>,
}

// ─── Client Traits ──────────────────────────────────────────────────────────

/// Launch-configuration verbs of the auto-scaling API.
#[async_trait]
pub trait AutoScalingApi: Send + Sync {
    async fn create_launch_configuration(
        &self,
        input: &CreateLaunchConfigurationInput,
    ) -> Result<(), ApiError>;

    /// Look up launch configurations by name. Names that do not exist are
    /// simply absent from the result.
    async fn describe_launch_configurations(
        &self,
        names: &[String],
    ) -> Result<Vec<LaunchConfiguration>, ApiError>;

    async fn delete_launch_configuration(&self, name: &str) -> Result<(), ApiError>;
}

/// Machine-image lookups of the compute API.
#[async_trait]
pub trait Ec2Api: Send + Sync {
    /// Describe one image. `Ok(None)` when the image does not exist.
    async fn describe_image(&self, image_id: &str) -> Result<Option<Image>, ApiError>;
}
