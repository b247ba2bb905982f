use std::path::Path;

use anyhow::Result;

use crate::config::types::ProjectConfig;

/// Detection result for config format.
#[derive(Debug, PartialEq)]
pub enum ConfigMode {
    Hcl,
    Yaml,
    Both,
}

/// Detect whether the given path contains HCL, YAML, or both config formats.
pub fn detect_mode(path: &Path) -> ConfigMode {
    let has_tf = has_tf_files(path);
    let has_yaml = has_yaml_files(path);

    match (has_tf, has_yaml) {
        (true, true) => ConfigMode::Both,
        (true, false) => ConfigMode::Hcl,
        (false, true) => ConfigMode::Yaml,
        (false, false) => ConfigMode::Yaml, // Default to YAML mode for error handling
    }
}

/// Load and validate configuration from a path, auto-detecting the format.
///
/// When a directory holds both `.tf` and `.yaml` files, the HCL files are
/// read first, so their provider block takes precedence.
pub fn load_project(path: &Path) -> Result<ProjectConfig> {
    let config = match detect_mode(path) {
        ConfigMode::Hcl => {
            tracing::info!("Detected HCL mode (.tf files)");
            load_hcl(path)?
        }
        ConfigMode::Yaml => {
            tracing::info!("Detected YAML mode (.yaml files)");
            crate::config::parser::load_config(path)?
        }
        ConfigMode::Both => {
            tracing::info!("Detected mixed mode (both .tf and .yaml files)");
            let mut config = load_hcl(path)?;
            config.merge(crate::config::parser::load_config(path)?);
            config
        }
    };

    crate::config::validator::validate(&config)?;
    Ok(config)
}

fn load_hcl(path: &Path) -> Result<ProjectConfig> {
    if path.is_file() {
        crate::hcl::parse_file(path)
    } else {
        crate::hcl::parse_directory(path)
    }
}

fn has_tf_files(path: &Path) -> bool {
    if path.is_file() {
        return path.extension().map(|e| e == "tf").unwrap_or(false);
    }
    if path.is_dir() {
        if let Ok(entries) = std::fs::read_dir(path) {
            return entries
                .filter_map(|e| e.ok())
                .any(|e| e.path().extension().map(|ext| ext == "tf").unwrap_or(false));
        }
    }
    false
}

fn has_yaml_files(path: &Path) -> bool {
    if path.is_file() {
        return path
            .extension()
            .map(|e| e == "yaml" || e == "yml")
            .unwrap_or(false);
    }
    if path.is_dir() {
        if let Ok(entries) = std::fs::read_dir(path) {
            return entries.filter_map(|e| e.ok()).any(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            });
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn detects_formats() {
        let dir = TempDir::new().unwrap();
        assert_eq!(detect_mode(dir.path()), ConfigMode::Yaml);

        std::fs::write(dir.path().join("main.tf"), "").unwrap();
        assert_eq!(detect_mode(dir.path()), ConfigMode::Hcl);

        std::fs::write(dir.path().join("extra.yml"), "").unwrap();
        assert_eq!(detect_mode(dir.path()), ConfigMode::Both);
    }

    #[test]
    fn mixed_directory_merges_resources() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("main.tf"),
            r#"
provider "aws" {
  region = "eu-central-1"
}

resource "aws_launch_configuration" "web" {
  name          = "web-lc"
  image_id      = "ami-1234"
  instance_type = "t2.micro"
}
"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("more.yaml"),
            r#"
provider:
  region: us-west-2
resources:
  aws_launch_configuration:
    worker:
      name: worker-lc
      image_id: ami-1234
      instance_type: t2.small
"#,
        )
        .unwrap();

        let config = load_project(dir.path()).unwrap();
        assert_eq!(config.provider_settings().region, "eu-central-1");
        assert_eq!(config.resources.len(), 2);
    }

    #[test]
    fn missing_path_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = load_project(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(err.to_string().contains("Config not found"));
    }
}
