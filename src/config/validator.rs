use anyhow::{bail, Result};
use regex::Regex;
use std::collections::HashSet;

use super::types::ProjectConfig;
use crate::resource::launch_configuration::{self, LaunchConfigurationConfig};

/// Validate the entire configuration for correctness.
///
/// Every problem is collected before failing, so one run reports them all.
pub fn validate(config: &ProjectConfig) -> Result<()> {
    let mut problems = Vec::new();
    validate_provider(config, &mut problems);
    validate_addresses(config, &mut problems);
    validate_attributes(config, &mut problems);

    if !problems.is_empty() {
        bail!("Invalid configuration:\n  - {}", problems.join("\n  - "));
    }
    Ok(())
}

fn validate_provider(config: &ProjectConfig, problems: &mut Vec<String>) {
    if let Some(provider) = &config.provider {
        if provider.region.trim().is_empty() {
            problems.push("provider: region must not be empty".to_string());
        }
        if provider.consistency_timeout_secs == 0 {
            problems.push("provider: consistency_timeout_secs must be greater than 0".to_string());
        }
    }
}

/// Resource types must be supported, local names must be identifiers, and
/// addresses must be unique across all files.
fn validate_addresses(config: &ProjectConfig, problems: &mut Vec<String>) {
    let name_pattern = Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("valid regex");
    let mut seen = HashSet::new();

    for resource in &config.resources {
        if resource.resource_type != launch_configuration::RESOURCE_TYPE {
            problems.push(format!(
                "{}: unsupported resource type '{}'",
                resource, resource.resource_type
            ));
        }
        if !name_pattern.is_match(&resource.name) {
            problems.push(format!(
                "{}: invalid resource name '{}'",
                resource, resource.name
            ));
        }
        if !seen.insert(resource.address()) {
            problems.push(format!("{}: declared more than once", resource.address()));
        }
    }
}

fn validate_attributes(config: &ProjectConfig, problems: &mut Vec<String>) {
    for resource in &config.resources {
        if resource.resource_type != launch_configuration::RESOURCE_TYPE {
            continue;
        }
        if let Err(e) = LaunchConfigurationConfig::from_attributes(&resource.attributes) {
            problems.push(format!("{}: {}", resource, e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{ProviderSettings, ResourceConfig};
    use serde_json::json;

    fn web(name: &str) -> ResourceConfig {
        ResourceConfig::new(
            "aws_launch_configuration",
            name,
            json!({ "name": "web-lc", "image_id": "ami-1234", "instance_type": "t2.micro" }),
        )
    }

    #[test]
    fn valid_config_passes() {
        let config = ProjectConfig {
            provider: None,
            resources: vec![web("web"), web("worker")],
        };
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn duplicate_addresses_are_rejected() {
        let config = ProjectConfig {
            provider: None,
            resources: vec![web("web"), web("web")],
        };
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("declared more than once"), "{}", err);
    }

    #[test]
    fn unsupported_type_and_bad_name_are_reported_together() {
        let config = ProjectConfig {
            provider: None,
            resources: vec![
                ResourceConfig::new("aws_instance", "web", json!({})),
                web("9lives"),
            ],
        };
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("unsupported resource type 'aws_instance'"), "{}", err);
        assert!(err.contains("invalid resource name '9lives'"), "{}", err);
    }

    #[test]
    fn attribute_errors_surface() {
        let config = ProjectConfig {
            provider: None,
            resources: vec![ResourceConfig::new(
                "aws_launch_configuration",
                "web",
                json!({ "name": "web-lc", "image_id": "ami-1234", "block_device": [] }),
            )],
        };
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("instance_type"), "{}", err);
        assert!(err.contains("Split out into three sub-types"), "{}", err);
    }

    #[test]
    fn zero_consistency_timeout_is_rejected() {
        let config = ProjectConfig {
            provider: Some(ProviderSettings {
                consistency_timeout_secs: 0,
                ..Default::default()
            }),
            resources: vec![],
        };
        assert!(validate(&config).is_err());
    }
}
