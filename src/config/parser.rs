use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::types::{ProjectConfig, ProviderSettings, ResourceConfig};

/// On-disk YAML layout:
///
/// ```yaml
/// provider:
///   region: us-east-1
///   simulated:
///     images:
///       ami-1234: /dev/sda1
/// resources:
///   aws_launch_configuration:
///     web:
///       name: web-lc
///       image_id: ami-1234
///       instance_type: t2.micro
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct YamlConfig {
    #[serde(default)]
    provider: Option<ProviderSettings>,
    /// resource type → local name → attributes
    #[serde(default)]
    resources: BTreeMap<String, BTreeMap<String, serde_yaml::Value>>,
}

/// Load config from a `.yaml`/`.yml` file, or from every such file in a
/// directory (non-recursive, in name order).
pub fn load_config(path: &Path) -> Result<ProjectConfig> {
    if path.is_file() {
        return parse_file(path);
    }

    if path.is_dir() {
        let files = find_yaml_files(path)?;
        if files.is_empty() {
            bail!("No .yaml files found in directory: {}", path.display());
        }
        tracing::info!(
            files = ?files.iter().map(|f| f.display().to_string()).collect::<Vec<_>>(),
            "Discovered config files"
        );
        let mut merged = ProjectConfig::default();
        for file in &files {
            merged.merge(parse_file(file)?);
        }
        return Ok(merged);
    }

    bail!(
        "Config not found: '{}'. Place .yaml or .tf files in the directory or specify a path with -c",
        path.display()
    )
}

fn parse_file(path: &Path) -> Result<ProjectConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let mut config = parse_config(&content)
        .with_context(|| format!("Failed to parse YAML in: {}", path.display()))?;
    let source = path.display().to_string();
    for resource in &mut config.resources {
        resource.source = Some(source.clone());
    }
    Ok(config)
}

pub(crate) fn find_yaml_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| {
            p.is_file()
                && matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("yaml") | Some("yml")
                )
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Parse YAML content into a project config.
pub fn parse_config(content: &str) -> Result<ProjectConfig> {
    let raw: YamlConfig =
        serde_yaml::from_str(content).context("Failed to parse YAML configuration")?;

    let mut resources = Vec::new();
    for (resource_type, by_name) in raw.resources {
        for (name, attrs) in by_name {
            let attributes = match attrs {
                // `web:` with no body
                serde_yaml::Value::Null => serde_json::Value::Object(Default::default()),
                other => serde_json::to_value(other).with_context(|| {
                    format!("Attributes of {}.{} are not valid JSON values", resource_type, name)
                })?,
            };
            resources.push(ResourceConfig::new(resource_type.clone(), name, attributes));
        }
    }

    Ok(ProjectConfig {
        provider: raw.provider,
        resources,
    })
}
