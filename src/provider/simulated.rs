//! In-process cloud that serves the auto-scaling and image APIs.
//!
//! Used by the test suite and by the CLI's local backend. Mimics the
//! behaviours the handler has to cope with: eventual consistency after
//! create, IOPS filled in server-side for `gp2` volumes, and coded errors.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine as _;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::api::{
    error_code, ApiError, AutoScalingApi, CreateLaunchConfigurationInput, Ec2Api, Image,
    LaunchConfiguration,
};

/// A recorded API call, in the order it was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    CreateLaunchConfiguration(CreateLaunchConfigurationInput),
    DescribeLaunchConfigurations(Vec<String>),
    DeleteLaunchConfiguration(String),
    DescribeImage(String),
}

impl ApiCall {
    pub fn operation(&self) -> Operation {
        match self {
            ApiCall::CreateLaunchConfiguration(_) => Operation::CreateLaunchConfiguration,
            ApiCall::DescribeLaunchConfigurations(_) => Operation::DescribeLaunchConfigurations,
            ApiCall::DeleteLaunchConfiguration(_) => Operation::DeleteLaunchConfiguration,
            ApiCall::DescribeImage(_) => Operation::DescribeImage,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreateLaunchConfiguration,
    DescribeLaunchConfigurations,
    DeleteLaunchConfiguration,
    DescribeImage,
}

/// On-disk form of the simulator's launch configurations.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedCloud {
    launch_configurations: BTreeMap<String, LaunchConfiguration>,
}

#[derive(Default)]
pub struct SimulatedCloud {
    launch_configurations: DashMap<String, LaunchConfiguration>,
    images: DashMap<String, Image>,
    /// Describe calls still to miss per freshly created name.
    hidden: DashMap<String, u32>,
    visibility_lag: u32,
    calls: Mutex<Vec<ApiCall>>,
    failures: Mutex<Vec<(Operation, ApiError)>>,
    persist_path: Option<PathBuf>,
}

impl SimulatedCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a simulator whose launch configurations persist to `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let cloud = Self {
            persist_path: Some(path.to_path_buf()),
            ..Self::default()
        };
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read simulated cloud at {}", path.display()))?;
            let persisted: PersistedCloud = serde_json::from_str(&content)
                .with_context(|| format!("Invalid simulated cloud file {}", path.display()))?;
            for (name, lc) in persisted.launch_configurations {
                cloud.launch_configurations.insert(name, lc);
            }
        }
        Ok(cloud)
    }

    pub fn with_image(self, image_id: &str, root_device_name: &str) -> Self {
        self.register_image(image_id, Some(root_device_name));
        self
    }

    /// Number of describe calls that miss a launch configuration right
    /// after it is created.
    pub fn with_visibility_lag(mut self, lag: u32) -> Self {
        self.visibility_lag = lag;
        self
    }

    pub fn register_image(&self, image_id: &str, root_device_name: Option<&str>) {
        self.images.insert(
            image_id.to_string(),
            Image {
                image_id: image_id.to_string(),
                root_device_name: root_device_name.map(str::to_string),
            },
        );
    }

    pub fn deregister_image(&self, image_id: &str) {
        self.images.remove(image_id);
    }

    /// Make the next call of `operation` fail with `error`.
    pub fn fail_next(&self, operation: Operation, error: ApiError) {
        self.failures.lock().unwrap().push((operation, error));
    }

    /// Store a launch configuration directly, bypassing create validation.
    pub fn insert_launch_configuration(&self, lc: LaunchConfiguration) {
        self.launch_configurations
            .insert(lc.launch_configuration_name.clone(), lc);
    }

    pub fn launch_configuration(&self, name: &str) -> Option<LaunchConfiguration> {
        self.launch_configurations.get(name).map(|lc| lc.clone())
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: ApiCall) -> Result<(), ApiError> {
        let operation = call.operation();
        debug!(?call, "simulated cloud call");
        self.calls.lock().unwrap().push(call);

        let mut failures = self.failures.lock().unwrap();
        match failures.iter().position(|(op, _)| *op == operation) {
            Some(pos) => Err(failures.remove(pos).1),
            None => Ok(()),
        }
    }

    fn save(&self) -> Result<(), ApiError> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };
        self.write_to(path)
            .map_err(|e| ApiError::new("InternalFailure", format!("{:#}", e)))
    }

    fn write_to(&self, path: &Path) -> Result<()> {
        let persisted = PersistedCloud {
            launch_configurations: self
                .launch_configurations
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect(),
        };
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;
        let mut file = tempfile::NamedTempFile::new_in(dir)?;
        file.write_all(serde_json::to_string_pretty(&persisted)?.as_bytes())?;
        file.persist(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

/// IOPS the API reports for a `gp2` volume: 3 per GiB, at least 100.
fn gp2_iops(volume_size: Option<i64>) -> i64 {
    (volume_size.unwrap_or(8) * 3).max(100)
}

#[async_trait]
impl AutoScalingApi for SimulatedCloud {
    async fn create_launch_configuration(
        &self,
        input: &CreateLaunchConfigurationInput,
    ) -> Result<(), ApiError> {
        self.record(ApiCall::CreateLaunchConfiguration(input.clone()))?;

        let name = &input.launch_configuration_name;
        if self.launch_configurations.contains_key(name) {
            return Err(ApiError::new(
                error_code::ALREADY_EXISTS,
                format!("Launch Configuration by this name ({}) already exists", name),
            ));
        }
        if !self.images.contains_key(&input.image_id) {
            return Err(ApiError::new(
                error_code::VALIDATION_ERROR,
                format!("AMI {} is invalid: The image id does not exist", input.image_id),
            ));
        }
        if base64::engine::general_purpose::STANDARD
            .decode(&input.user_data)
            .is_err()
        {
            return Err(ApiError::new(
                error_code::VALIDATION_ERROR,
                "UserData is not valid base64",
            ));
        }

        let mut mappings = input.block_device_mappings.clone().unwrap_or_default();
        for mapping in &mut mappings {
            if let Some(ebs) = &mut mapping.ebs {
                if ebs.volume_type.as_deref() == Some("gp2") && ebs.iops.is_none() {
                    ebs.iops = Some(gp2_iops(ebs.volume_size));
                }
            }
        }

        let lc = LaunchConfiguration {
            launch_configuration_name: name.clone(),
            image_id: input.image_id.clone(),
            instance_type: input.instance_type.clone(),
            key_name: input.key_name.clone(),
            security_groups: input.security_groups.clone(),
            user_data: Some(input.user_data.clone()).filter(|u| !u.is_empty()),
            spot_price: input.spot_price.clone(),
            iam_instance_profile: input.iam_instance_profile.clone(),
            associate_public_ip_address: Some(input.associate_public_ip_address),
            ebs_optimized: Some(input.ebs_optimized.unwrap_or(false)),
            placement_tenancy: input.placement_tenancy.clone(),
            block_device_mappings: mappings,
            created_time: chrono::Utc::now(),
        };
        self.launch_configurations.insert(name.clone(), lc);
        if self.visibility_lag > 0 {
            self.hidden.insert(name.clone(), self.visibility_lag);
        }
        self.save()
    }

    async fn describe_launch_configurations(
        &self,
        names: &[String],
    ) -> Result<Vec<LaunchConfiguration>, ApiError> {
        self.record(ApiCall::DescribeLaunchConfigurations(names.to_vec()))?;

        if names.is_empty() {
            let mut all: Vec<LaunchConfiguration> = self
                .launch_configurations
                .iter()
                .map(|entry| entry.value().clone())
                .collect();
            all.sort_by(|a, b| a.launch_configuration_name.cmp(&b.launch_configuration_name));
            return Ok(all);
        }

        let mut found = Vec::new();
        for name in names {
            if let Some(mut remaining) = self.hidden.get_mut(name) {
                if *remaining > 0 {
                    *remaining -= 1;
                    continue;
                }
            }
            if let Some(lc) = self.launch_configurations.get(name) {
                found.push(lc.clone());
            }
        }
        Ok(found)
    }

    async fn delete_launch_configuration(&self, name: &str) -> Result<(), ApiError> {
        self.record(ApiCall::DeleteLaunchConfiguration(name.to_string()))?;

        if self.launch_configurations.remove(name).is_none() {
            return Err(ApiError::new(
                error_code::LAUNCH_CONFIGURATION_NOT_FOUND,
                format!("Launch configuration name not found - {}", name),
            ));
        }
        self.hidden.remove(name);
        self.save()
    }
}

#[async_trait]
impl Ec2Api for SimulatedCloud {
    async fn describe_image(&self, image_id: &str) -> Result<Option<Image>, ApiError> {
        self.record(ApiCall::DescribeImage(image_id.to_string()))?;
        Ok(self.images.get(image_id).map(|image| image.clone()))
    }
}
