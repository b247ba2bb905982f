use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::types::{ProjectConfig, ProviderSettings, ResourceConfig};
use crate::planner::diff::{self, AttributeChange};
use crate::provider::client::AwsClient;
use crate::provider::simulated::SimulatedCloud;
use crate::resource::launch_configuration::{
    self, LaunchConfigurationConfig, LaunchConfigurationData, LaunchConfigurationState,
};
use crate::state::backend::StateBackend;
use crate::state::models::{status, ResourceState};
use crate::state::schema::SCHEMA_VERSION;

/// File the simulated cloud persists to when no `state_file` is configured.
pub const DEFAULT_CLOUD_FILE: &str = "cloud.json";

/// The action to take for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceAction {
    Create,
    Delete,
    /// Delete, then create. Launch configurations cannot be updated in place.
    Replace,
    NoOp,
}

impl std::fmt::Display for ResourceAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceAction::Create => write!(f, "+"),
            ResourceAction::Delete => write!(f, "-"),
            ResourceAction::Replace => write!(f, "-/+"),
            ResourceAction::NoOp => write!(f, "(no changes)"),
        }
    }
}

/// A planned change for a single resource.
#[derive(Debug, Clone)]
pub struct PlannedChange {
    pub address: String,
    pub resource_type: String,
    pub resource_name: String,
    pub action: ResourceAction,
    /// Desired configuration; `None` for deletes.
    pub config: Option<LaunchConfigurationConfig>,
    /// Refreshed state of the existing resource, if there is one.
    pub prior: Option<LaunchConfigurationData>,
    pub changes: Vec<AttributeChange>,
    pub requires_replace: Vec<String>,
    /// The stored record is tainted.
    pub tainted: bool,
}

/// Summary of a plan operation.
#[derive(Debug, Default)]
pub struct PlanSummary {
    pub changes: Vec<PlannedChange>,
    pub creates: usize,
    pub deletes: usize,
    pub replaces: usize,
    pub no_ops: usize,
}

impl PlanSummary {
    pub fn has_changes(&self) -> bool {
        self.creates + self.deletes + self.replaces > 0
    }

    fn push(&mut self, change: PlannedChange) {
        match change.action {
            ResourceAction::Create => self.creates += 1,
            ResourceAction::Delete => self.deletes += 1,
            ResourceAction::Replace => self.replaces += 1,
            ResourceAction::NoOp => self.no_ops += 1,
        }
        self.changes.push(change);
    }
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if self.creates > 0 {
            parts.push(format!("{} to add", self.creates));
        }
        if self.replaces > 0 {
            parts.push(format!("{} to replace", self.replaces));
        }
        if self.deletes > 0 {
            parts.push(format!("{} to destroy", self.deletes));
        }
        if parts.is_empty() {
            write!(f, "No changes.")
        } else {
            write!(f, "Plan: {}.", parts.join(", "))
        }
    }
}

/// Outcome of one resource operation during apply or destroy.
#[derive(Debug, Clone)]
pub struct ResourceResult {
    pub address: String,
    pub action: ResourceAction,
    pub error: Option<String>,
}

/// Summary of an apply operation.
#[derive(Debug, Default)]
pub struct ApplySummary {
    pub results: Vec<ResourceResult>,
    pub added: usize,
    pub destroyed: usize,
    pub failed: usize,
    pub elapsed_secs: u64,
    pub is_destroy: bool,
}

impl ApplySummary {
    fn failure(&mut self, address: &str, action: ResourceAction, error: String) {
        self.failed += 1;
        self.results.push(ResourceResult {
            address: address.to_string(),
            action,
            error: Some(error),
        });
    }

    fn success(&mut self, address: &str, action: ResourceAction) {
        self.results.push(ResourceResult {
            address: address.to_string(),
            action,
            error: None,
        });
    }
}

impl std::fmt::Display for ApplySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let time = format_elapsed(self.elapsed_secs);
        if self.is_destroy {
            write!(f, "Destroy complete! Resources: {} destroyed", self.destroyed)?;
        } else {
            write!(
                f,
                "Apply complete! Resources: {} added, {} destroyed",
                self.added, self.destroyed,
            )?;
        }
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        write!(f, ". Total time: {}.", time)
    }
}

/// Summary of a refresh operation.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub refreshed: usize,
    /// Records dropped because the launch configuration no longer exists.
    pub removed: Vec<String>,
}

fn format_elapsed(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else {
        let mins = secs / 60;
        let remaining = secs % 60;
        if remaining == 0 {
            format!("{}m", mins)
        } else {
            format!("{}m{}s", mins, remaining)
        }
    }
}

/// Build the client bundle for the configured provider.
///
/// The simulated cloud persists under `working_dir` so successive runs see
/// the launch configurations earlier runs created.
pub fn client_from_settings(settings: &ProviderSettings, working_dir: &Path) -> Result<AwsClient> {
    let cloud_file = working_dir.join(
        settings
            .simulated
            .state_file
            .as_deref()
            .unwrap_or(DEFAULT_CLOUD_FILE),
    );
    let cloud = SimulatedCloud::open(&cloud_file)?
        .with_visibility_lag(settings.simulated.visibility_lag);
    for (image_id, root_device_name) in &settings.simulated.images {
        cloud.register_image(image_id, Some(root_device_name.as_str()));
    }
    debug!(
        region = %settings.region,
        cloud_file = %cloud_file.display(),
        "Using simulated cloud"
    );

    Ok(AwsClient::simulated(settings.region.clone(), Arc::new(cloud))
        .with_consistency_window(settings.consistency_timeout()))
}

/// Drives the launch configuration handler over a project config and a
/// state backend.
pub struct ResourceEngine {
    client: AwsClient,
}

impl ResourceEngine {
    pub fn new(client: AwsClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &AwsClient {
        &self.client
    }

    /// Compare the desired configuration with refreshed state.
    ///
    /// Nothing is written: the refreshed state only feeds the diff.
    pub async fn plan(
        &self,
        project: &ProjectConfig,
        backend: &dyn StateBackend,
    ) -> Result<PlanSummary> {
        let mut plan = PlanSummary::default();

        for resource in &project.resources {
            let change = self
                .plan_resource(resource, backend)
                .await
                .with_context(|| format!("Failed to plan {}", resource))?;
            debug!(address = %change.address, action = ?change.action, "Planned resource");
            plan.push(change);
        }

        for record in backend.list_resources().await? {
            if project.resource(&record.address).is_some() {
                continue;
            }
            let prior = self
                .refreshed(&record)
                .await
                .with_context(|| format!("Failed to refresh {}", record.address))?;
            // When the entity is already gone, apply only drops the record.
            plan.push(PlannedChange {
                address: record.address.clone(),
                resource_type: record.resource_type.clone(),
                resource_name: record.resource_name.clone(),
                action: ResourceAction::Delete,
                config: None,
                prior: Some(prior),
                changes: Vec::new(),
                requires_replace: Vec::new(),
                tainted: record.is_tainted(),
            });
        }

        Ok(plan)
    }

    async fn plan_resource(
        &self,
        resource: &ResourceConfig,
        backend: &dyn StateBackend,
    ) -> Result<PlannedChange> {
        let address = resource.address();
        let config = LaunchConfigurationConfig::from_attributes(&resource.attributes)?;
        let record = backend.get_resource(&address).await?;

        let mut change = PlannedChange {
            address,
            resource_type: resource.resource_type.clone(),
            resource_name: resource.name.clone(),
            action: ResourceAction::Create,
            config: Some(config),
            prior: None,
            changes: Vec::new(),
            requires_replace: Vec::new(),
            tainted: false,
        };

        let Some(record) = record else {
            return Ok(change);
        };
        let prior = self.refreshed(&record).await?;
        if prior.id().is_none() {
            warn!(address = %change.address, "Resource no longer exists, planning create");
            return Ok(change);
        }

        let schema = launch_configuration::schema();
        let desired = resource
            .attributes
            .as_object()
            .map(|attrs| schema.normalize(attrs))
            .unwrap_or_default();
        let tracked = match prior.state.to_json() {
            Value::Object(map) => map,
            _ => Default::default(),
        };
        let resource_diff = diff::diff(&schema, &tracked, &desired);

        change.tainted = record.is_tainted();
        change.action = if change.tainted || !resource_diff.is_empty() {
            ResourceAction::Replace
        } else {
            ResourceAction::NoOp
        };
        change.requires_replace = resource_diff.replace_fields();
        change.changes = resource_diff.changes;
        change.prior = Some(prior);
        Ok(change)
    }

    /// Read the resource a record points at.
    async fn refreshed(&self, record: &ResourceState) -> Result<LaunchConfigurationData> {
        let state: LaunchConfigurationState = serde_json::from_value(record.attributes()?)
            .with_context(|| format!("Corrupt attributes for {}", record.address))?;
        let mut d = match &record.provider_id {
            Some(id) => LaunchConfigurationData::with_id(id.clone(), state),
            None => LaunchConfigurationData::new(),
        };
        launch_configuration::read(&mut d, &self.client).await?;
        Ok(d)
    }

    /// Execute a plan in order, persisting each outcome.
    ///
    /// A failing resource is recorded and the remaining changes still run.
    pub async fn apply(
        &self,
        backend: &dyn StateBackend,
        plan: &PlanSummary,
    ) -> Result<ApplySummary> {
        let start = Instant::now();
        let mut summary = ApplySummary::default();

        for change in &plan.changes {
            match change.action {
                ResourceAction::NoOp => continue,
                ResourceAction::Delete => {
                    match self.delete_tracked(backend, &change.address, change.prior.as_ref()).await {
                        Ok(()) => {
                            summary.destroyed += 1;
                            summary.success(&change.address, change.action);
                        }
                        Err(e) => summary.failure(&change.address, change.action, format!("{:#}", e)),
                    }
                }
                ResourceAction::Replace => {
                    if let Err(e) = self.delete_tracked(backend, &change.address, change.prior.as_ref()).await {
                        summary.failure(&change.address, change.action, format!("{:#}", e));
                        continue;
                    }
                    summary.destroyed += 1;
                    match self.create_tracked(backend, change).await {
                        Ok(()) => {
                            summary.added += 1;
                            summary.success(&change.address, change.action);
                        }
                        Err(e) => summary.failure(&change.address, change.action, format!("{:#}", e)),
                    }
                }
                ResourceAction::Create => match self.create_tracked(backend, change).await {
                    Ok(()) => {
                        summary.added += 1;
                        summary.success(&change.address, change.action);
                    }
                    Err(e) => summary.failure(&change.address, change.action, format!("{:#}", e)),
                },
            }
        }

        summary.elapsed_secs = start.elapsed().as_secs();
        info!(
            added = summary.added,
            destroyed = summary.destroyed,
            failed = summary.failed,
            "Apply finished"
        );
        Ok(summary)
    }

    async fn create_tracked(&self, backend: &dyn StateBackend, change: &PlannedChange) -> Result<()> {
        let config = change
            .config
            .as_ref()
            .with_context(|| format!("No configuration for {}", change.address))?;

        let mut d = LaunchConfigurationData::new();
        let result = launch_configuration::create(&mut d, config, &self.client).await;

        // The entity exists once an identifier is set, even if the read-back
        // failed; track it so it is not leaked.
        if let Some(id) = d.id() {
            let mut record = ResourceState::new(&change.resource_type, &change.resource_name);
            record.provider_id = Some(id.to_string());
            record.schema_version = SCHEMA_VERSION;
            record.set_attributes(&d.state.to_json())?;
            if result.is_err() {
                warn!(address = %change.address, "Created but could not be read back, marking tainted");
                record.status = status::TAINTED.to_string();
            }
            backend.upsert_resource(&record).await?;
        }

        result.with_context(|| format!("Failed to create {}", change.address))
    }

    async fn delete_tracked(
        &self,
        backend: &dyn StateBackend,
        address: &str,
        prior: Option<&LaunchConfigurationData>,
    ) -> Result<()> {
        if let Some(d) = prior {
            launch_configuration::delete(d, &self.client)
                .await
                .with_context(|| format!("Failed to delete {}", address))?;
        }
        backend.delete_resource(address).await?;
        Ok(())
    }

    /// Read every tracked resource and store what the API reports.
    pub async fn refresh(&self, backend: &dyn StateBackend) -> Result<RefreshSummary> {
        let mut summary = RefreshSummary::default();

        for mut record in backend.list_resources().await? {
            let d = self
                .refreshed(&record)
                .await
                .with_context(|| format!("Failed to refresh {}", record.address))?;

            match d.id() {
                Some(id) => {
                    record.provider_id = Some(id.to_string());
                    record.set_attributes(&d.state.to_json())?;
                    backend.upsert_resource(&record).await?;
                    summary.refreshed += 1;
                }
                None => {
                    backend.delete_resource(&record.address).await?;
                    summary.removed.push(record.address);
                }
            }
        }

        Ok(summary)
    }

    /// Delete every tracked resource.
    pub async fn destroy(&self, backend: &dyn StateBackend) -> Result<ApplySummary> {
        let start = Instant::now();
        let mut summary = ApplySummary {
            is_destroy: true,
            ..Default::default()
        };

        let mut records = backend.list_resources().await?;
        records.reverse();
        for record in records {
            let result = self.destroy_record(backend, &record).await;
            match result {
                Ok(()) => {
                    summary.destroyed += 1;
                    summary.success(&record.address, ResourceAction::Delete);
                }
                Err(e) => summary.failure(&record.address, ResourceAction::Delete, format!("{:#}", e)),
            }
        }

        summary.elapsed_secs = start.elapsed().as_secs();
        Ok(summary)
    }

    async fn destroy_record(&self, backend: &dyn StateBackend, record: &ResourceState) -> Result<()> {
        let state: LaunchConfigurationState = serde_json::from_value(record.attributes()?)
            .with_context(|| format!("Corrupt attributes for {}", record.address))?;
        let d = match &record.provider_id {
            Some(id) => LaunchConfigurationData::with_id(id.clone(), state),
            None => LaunchConfigurationData::new(),
        };
        self.delete_tracked(backend, &record.address, Some(&d)).await
    }
}
