use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

// ─── Resource-Level State ───────────────────────────────────────────────────

/// A resource's state as stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    pub id: String,
    pub resource_type: String,
    pub resource_name: String,
    pub address: String,
    /// Identifier the cloud API knows the resource by.
    pub provider_id: Option<String>,
    pub status: String,
    pub attributes_json: String,
    pub schema_version: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl ResourceState {
    /// Create a new resource state with default values.
    pub fn new(resource_type: &str, resource_name: &str) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            resource_type: resource_type.to_string(),
            resource_name: resource_name.to_string(),
            address: format!("{}.{}", resource_type, resource_name),
            provider_id: None,
            status: status::CREATED.to_string(),
            attributes_json: "{}".to_string(),
            schema_version: 0,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn attributes(&self) -> Result<serde_json::Value> {
        serde_json::from_str(&self.attributes_json)
            .with_context(|| format!("Corrupt attributes for {}", self.address))
    }

    pub fn set_attributes(&mut self, attributes: &serde_json::Value) -> Result<()> {
        self.attributes_json = serde_json::to_string(attributes)?;
        self.updated_at = chrono::Utc::now().to_rfc3339();
        Ok(())
    }

    pub fn is_tainted(&self) -> bool {
        self.status == status::TAINTED
    }
}

/// Resource status values.
pub mod status {
    pub const CREATED: &str = "created";
    /// Created, but the follow-up read never succeeded; replaced on next apply.
    pub const TAINTED: &str = "tainted";
}
