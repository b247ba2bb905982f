use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};

use crate::config::types::{ProjectConfig, ProviderSettings, ResourceConfig};

const PROVIDER_NAME: &str = "aws";

/// Parse a single HCL file into a partial project config.
///
/// Recognised blocks are `provider "aws" { ... }` and
/// `resource "<type>" "<name>" { ... }`. Attribute values must be literals:
/// variables, references, function calls and interpolations are rejected.
pub fn parse_hcl(content: &str, file_path: &Path) -> Result<ProjectConfig> {
    let body: hcl::Body = hcl::from_str(content)
        .with_context(|| format!("Failed to parse HCL in: {}", file_path.display()))?;

    let mut project = ProjectConfig::default();
    let file_str = file_path.to_string_lossy().to_string();

    for structure in body.into_inner() {
        match structure {
            hcl::Structure::Block(block) => {
                let ident = block.identifier().to_string();
                match ident.as_str() {
                    "provider" => {
                        let provider = parse_provider_block(&block)
                            .with_context(|| format!("In provider block of {}", file_str))?;
                        if project.provider.is_some() {
                            bail!("Duplicate provider block in {}", file_str);
                        }
                        project.provider = Some(provider);
                    }
                    "resource" => {
                        let mut resource = parse_resource_block(&block)
                            .with_context(|| format!("In resource block of {}", file_str))?;
                        resource.source = Some(file_str.clone());
                        project.resources.push(resource);
                    }
                    _ => {
                        tracing::debug!("Ignoring unknown block type: {}", ident);
                    }
                }
            }
            hcl::Structure::Attribute(attr) => {
                tracing::debug!("Ignoring top-level attribute: {}", attr.key);
            }
        }
    }

    Ok(project)
}

// ─── Block Parsers ───────────────────────────────────────────────────────────

fn parse_provider_block(block: &hcl::Block) -> Result<ProviderSettings> {
    let labels = block_labels(block);
    match labels.as_slice() {
        [name] if name == PROVIDER_NAME => {}
        [name] => bail!("Unsupported provider '{}', only '{}' is available", name, PROVIDER_NAME),
        _ => bail!("provider block needs exactly one label"),
    }

    let mut attrs = body_to_json(block.body(), "provider")?;
    // `simulated { ... }` is a single block, not a set.
    if let Some(Value::Array(items)) = attrs.remove("simulated") {
        match <[Value; 1]>::try_from(items) {
            Ok([simulated]) => {
                attrs.insert("simulated".to_string(), simulated);
            }
            Err(_) => bail!("Only one simulated block may be declared"),
        }
    }

    serde_json::from_value(Value::Object(attrs)).context("Invalid provider settings")
}

fn parse_resource_block(block: &hcl::Block) -> Result<ResourceConfig> {
    let labels = block_labels(block);
    let [resource_type, name] = labels.as_slice() else {
        bail!("resource block needs a type and a name label");
    };
    let address = format!("{}.{}", resource_type, name);
    let attributes = body_to_json(block.body(), &address)?;
    Ok(ResourceConfig::new(
        resource_type.clone(),
        name.clone(),
        Value::Object(attributes),
    ))
}

fn block_labels(block: &hcl::Block) -> Vec<String> {
    block
        .labels()
        .iter()
        .map(|l| l.as_str().to_string())
        .collect()
}

/// Attributes become object members; nested blocks of the same name collect
/// into an array, one element per block.
fn body_to_json(body: &hcl::Body, path: &str) -> Result<Map<String, Value>> {
    let mut out = Map::new();

    for structure in body.iter() {
        match structure {
            hcl::Structure::Attribute(attr) => {
                let key: &str = &attr.key;
                let attr_path = format!("{}.{}", path, key);
                let value = expr_to_json(&attr.expr, &attr_path)?;
                if out.insert(key.to_string(), value).is_some() {
                    bail!("{}: attribute set more than once", attr_path);
                }
            }
            hcl::Structure::Block(inner) => {
                let key = inner.identifier().to_string();
                let block_path = format!("{}.{}", path, key);
                let element = Value::Object(body_to_json(inner.body(), &block_path)?);
                match out
                    .entry(key)
                    .or_insert_with(|| Value::Array(Vec::new()))
                {
                    Value::Array(items) => items.push(element),
                    _ => bail!("{}: used both as an attribute and as a block", block_path),
                }
            }
        }
    }

    Ok(out)
}

// ─── Expressions ─────────────────────────────────────────────────────────────

/// Convert a literal HCL expression into JSON.
pub fn expr_to_json(expr: &hcl::Expression, path: &str) -> Result<Value> {
    match expr {
        hcl::Expression::Null => Ok(Value::Null),
        hcl::Expression::Bool(b) => Ok(Value::Bool(*b)),
        hcl::Expression::Number(n) => number_to_json(n)
            .with_context(|| format!("{}: number {} is out of range", path, n)),
        hcl::Expression::String(s) => Ok(Value::String(s.clone())),
        hcl::Expression::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| expr_to_json(item, &format!("{}[{}]", path, i)))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        hcl::Expression::Object(obj) => {
            let mut map = Map::new();
            for (key, value) in obj {
                let key = object_key_to_string(key)
                    .with_context(|| format!("{}: object keys must be literal", path))?;
                let value = expr_to_json(value, &format!("{}.{}", path, key))?;
                map.insert(key, value);
            }
            Ok(Value::Object(map))
        }
        // Quoted strings and heredocs without interpolation are literals.
        hcl::Expression::TemplateExpr(template) => {
            let text = template.to_string();
            if text.contains("${") || text.contains("%{") {
                bail!("{}: interpolation is not supported, use a literal value", path);
            }
            Ok(Value::String(text))
        }
        hcl::Expression::Parenthesis(inner) => expr_to_json(inner, path),
        other => bail!(
            "{}: only literal values are supported, got a {}",
            path,
            expression_kind(other)
        ),
    }
}

fn expression_kind(expr: &hcl::Expression) -> &'static str {
    match expr {
        hcl::Expression::Variable(_) | hcl::Expression::Traversal(_) => "reference",
        hcl::Expression::FuncCall(_) => "function call",
        hcl::Expression::Conditional(_) => "conditional",
        hcl::Expression::Operation(_) => "operation",
        hcl::Expression::ForExpr(_) => "for expression",
        _ => "non-literal expression",
    }
}

fn number_to_json(n: &hcl::Number) -> Option<Value> {
    if let Some(i) = n.as_i64() {
        Some(Value::from(i))
    } else if let Some(u) = n.as_u64() {
        Some(Value::from(u))
    } else {
        n.as_f64()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
    }
}

fn object_key_to_string(key: &hcl::expr::ObjectKey) -> Option<String> {
    match key {
        hcl::expr::ObjectKey::Identifier(id) => Some(id.to_string()),
        hcl::expr::ObjectKey::Expression(hcl::Expression::String(s)) => Some(s.clone()),
        hcl::expr::ObjectKey::Expression(hcl::Expression::TemplateExpr(t)) => {
            let text = t.to_string();
            (!text.contains("${")).then_some(text)
        }
        _ => None,
    }
}
