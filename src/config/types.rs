use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_CONSISTENCY_TIMEOUT_SECS: u64 = 30;

// ─── Top-Level Config ───────────────────────────────────────────────────────

/// The unified form both the HCL and YAML parsers produce.
#[derive(Debug, Clone, Default)]
pub struct ProjectConfig {
    /// `None` when no file declared a provider section.
    pub provider: Option<ProviderSettings>,
    pub resources: Vec<ResourceConfig>,
}

impl ProjectConfig {
    /// Provider settings, falling back to defaults when none were declared.
    pub fn provider_settings(&self) -> ProviderSettings {
        self.provider.clone().unwrap_or_default()
    }

    pub fn resource(&self, address: &str) -> Option<&ResourceConfig> {
        self.resources.iter().find(|r| r.address() == address)
    }

    /// Fold another partial config into this one. The first provider
    /// section wins; resources accumulate.
    pub fn merge(&mut self, other: ProjectConfig) {
        if self.provider.is_none() {
            self.provider = other.provider;
        }
        self.resources.extend(other.resources);
    }
}

// ─── Provider ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderSettings {
    #[serde(default = "default_region")]
    pub region: String,
    /// How long the read after a create keeps retrying.
    #[serde(default = "default_consistency_timeout_secs")]
    pub consistency_timeout_secs: u64,
    #[serde(default)]
    pub simulated: SimulatedSettings,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            region: default_region(),
            consistency_timeout_secs: default_consistency_timeout_secs(),
            simulated: SimulatedSettings::default(),
        }
    }
}

impl ProviderSettings {
    pub fn consistency_timeout(&self) -> Duration {
        Duration::from_secs(self.consistency_timeout_secs)
    }
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_consistency_timeout_secs() -> u64 {
    DEFAULT_CONSISTENCY_TIMEOUT_SECS
}

/// Settings of the in-process cloud backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulatedSettings {
    /// Image id → root device name.
    #[serde(default)]
    pub images: BTreeMap<String, String>,
    /// Describe calls that miss a launch configuration right after create.
    #[serde(default)]
    pub visibility_lag: u32,
    /// File the simulated launch configurations persist to, relative to the
    /// working directory. Defaults to `cloud.json` there.
    #[serde(default)]
    pub state_file: Option<String>,
}

// ─── Resources ──────────────────────────────────────────────────────────────

/// One declared resource with its raw, not yet validated attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceConfig {
    pub resource_type: String,
    pub name: String,
    pub attributes: serde_json::Value,
    /// File the resource was declared in, for error messages.
    pub source: Option<String>,
}

impl ResourceConfig {
    pub fn new(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        attributes: serde_json::Value,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
            attributes,
            source: None,
        }
    }

    /// `type.name`, the key the resource is tracked under.
    pub fn address(&self) -> String {
        format!("{}.{}", self.resource_type, self.name)
    }
}

impl fmt::Display for ResourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{} ({})", self.address(), source),
            None => write!(f, "{}", self.address()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn provider_defaults() {
        let settings: ProviderSettings = serde_json::from_value(json!({})).unwrap();
        assert_eq!(settings, ProviderSettings::default());
        assert_eq!(settings.region, "us-east-1");
        assert_eq!(settings.consistency_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn provider_rejects_unknown_keys() {
        let result: Result<ProviderSettings, _> =
            serde_json::from_value(json!({ "regoin": "eu-west-1" }));
        assert!(result.is_err());
    }

    #[test]
    fn merge_keeps_first_provider() {
        let mut a = ProjectConfig {
            provider: Some(ProviderSettings {
                region: "eu-west-1".into(),
                ..Default::default()
            }),
            resources: vec![ResourceConfig::new("aws_launch_configuration", "a", json!({}))],
        };
        let b = ProjectConfig {
            provider: Some(ProviderSettings::default()),
            resources: vec![ResourceConfig::new("aws_launch_configuration", "b", json!({}))],
        };
        a.merge(b);
        assert_eq!(a.provider_settings().region, "eu-west-1");
        assert_eq!(a.resources.len(), 2);
        assert!(a.resource("aws_launch_configuration.b").is_some());
    }
}
