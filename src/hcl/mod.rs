pub mod parser;

use std::path::Path;

use anyhow::{Context, Result};

use crate::config::types::ProjectConfig;

/// Parse all .tf files in a directory into one project config.
pub fn parse_directory(dir: &Path) -> Result<ProjectConfig> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?;
    let mut tf_files: Vec<std::path::PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().map(|e| e == "tf").unwrap_or(false))
        .collect();
    tf_files.sort();

    if tf_files.is_empty() {
        anyhow::bail!("No .tf files found in directory: {}", dir.display());
    }

    let mut project = ProjectConfig::default();
    for file in &tf_files {
        project.merge(parse_file(file)?);
    }
    Ok(project)
}

/// Parse a single .tf file.
pub fn parse_file(file: &Path) -> Result<ProjectConfig> {
    tracing::debug!("Parsing HCL file: {}", file.display());
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read config file: {}", file.display()))?;
    parser::parse_hcl(&content, file)
}
