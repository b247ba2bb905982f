use std::sync::Arc;
use std::time::Duration;

use launchcfg::config::parser::parse_config;
use launchcfg::config::types::{ProjectConfig, ProviderSettings};
use launchcfg::executor::engine::{client_from_settings, ResourceAction, ResourceEngine};
use launchcfg::provider::client::AwsClient;
use launchcfg::provider::simulated::SimulatedCloud;
use launchcfg::state::backend::StateBackend;
use launchcfg::state::models::status;
use launchcfg::state::sqlite::SqliteBackend;
use tempfile::TempDir;

const WEB: &str = "aws_launch_configuration.web";

fn project(instance_type: &str) -> ProjectConfig {
    parse_config(&format!(
        r#"
resources:
  aws_launch_configuration:
    web:
      name: web-lc
      image_id: ami-1234
      instance_type: {instance_type}
      key_name: deployer
      security_groups: [sg-web, sg-ssh]
      user_data: "echo hello"
      root_block_device:
        - volume_size: 16
          volume_type: gp2
      ebs_block_device:
        - device_name: /dev/sdb
          volume_size: 50
          volume_type: gp2
"#
    ))
    .unwrap()
}

async fn setup() -> (Arc<SimulatedCloud>, ResourceEngine, SqliteBackend) {
    let cloud = Arc::new(SimulatedCloud::new().with_image("ami-1234", "/dev/xvda"));
    let client = AwsClient::simulated("us-east-1", cloud.clone())
        .with_consistency_window(Duration::from_secs(5));
    let backend = SqliteBackend::open_memory().unwrap();
    backend.initialize().await.unwrap();
    (cloud, ResourceEngine::new(client), backend)
}

fn actions(plan: &launchcfg::executor::engine::PlanSummary) -> Vec<(String, ResourceAction)> {
    plan.changes
        .iter()
        .map(|c| (c.address.clone(), c.action))
        .collect()
}

#[tokio::test]
async fn test_apply_then_plan_is_clean() {
    let (cloud, engine, backend) = setup().await;
    let desired = project("t2.micro");

    let plan = engine.plan(&desired, &backend).await.unwrap();
    assert_eq!(actions(&plan), vec![(WEB.to_string(), ResourceAction::Create)]);
    assert_eq!(plan.to_string(), "Plan: 1 to add.");

    let summary = engine.apply(&backend, &plan).await.unwrap();
    assert_eq!(summary.added, 1);
    assert_eq!(summary.failed, 0);
    assert!(cloud.launch_configuration("web-lc").is_some());

    let record = backend.get_resource(WEB).await.unwrap().unwrap();
    assert_eq!(record.provider_id.as_deref(), Some("web-lc"));
    assert_eq!(record.status, status::CREATED);
    // Server-populated IOPS is tracked...
    assert_eq!(
        record.attributes().unwrap()["ebs_block_device"][0]["iops"],
        150
    );

    // ...but does not show up as a change.
    let plan = engine.plan(&desired, &backend).await.unwrap();
    assert_eq!(actions(&plan), vec![(WEB.to_string(), ResourceAction::NoOp)]);
    assert!(!plan.has_changes());
}

#[tokio::test]
async fn test_empty_optional_strings_converge() {
    let (cloud, engine, backend) = setup().await;
    let desired = parse_config(
        r#"
resources:
  aws_launch_configuration:
    web:
      name: web-lc
      image_id: ami-1234
      instance_type: t2.micro
      key_name: ""
      user_data: ""
      spot_price: ""
      iam_instance_profile: ""
      placement_tenancy: ""
      ebs_block_device:
        - device_name: /dev/sdb
          snapshot_id: ""
          volume_type: ""
"#,
    )
    .unwrap();

    let plan = engine.plan(&desired, &backend).await.unwrap();
    let summary = engine.apply(&backend, &plan).await.unwrap();
    assert_eq!((summary.added, summary.failed), (1, 0));

    let lc = cloud.launch_configuration("web-lc").unwrap();
    assert_eq!(lc.key_name, None);
    assert_eq!(lc.spot_price, None);

    let plan = engine.plan(&desired, &backend).await.unwrap();
    assert_eq!(actions(&plan), vec![(WEB.to_string(), ResourceAction::NoOp)]);
    assert!(plan.changes[0].changes.is_empty());
}

#[tokio::test]
async fn test_changed_attribute_replaces() {
    let (cloud, engine, backend) = setup().await;
    let plan = engine.plan(&project("t2.micro"), &backend).await.unwrap();
    engine.apply(&backend, &plan).await.unwrap();

    let plan = engine.plan(&project("m5.large"), &backend).await.unwrap();
    assert_eq!(actions(&plan), vec![(WEB.to_string(), ResourceAction::Replace)]);
    assert_eq!(plan.changes[0].requires_replace, vec!["instance_type".to_string()]);

    let summary = engine.apply(&backend, &plan).await.unwrap();
    assert_eq!((summary.added, summary.destroyed, summary.failed), (1, 1, 0));
    assert_eq!(
        cloud.launch_configuration("web-lc").unwrap().instance_type,
        "m5.large"
    );
}

#[tokio::test]
async fn test_removed_resource_is_deleted() {
    let (cloud, engine, backend) = setup().await;
    let plan = engine.plan(&project("t2.micro"), &backend).await.unwrap();
    engine.apply(&backend, &plan).await.unwrap();

    let empty = ProjectConfig::default();
    let plan = engine.plan(&empty, &backend).await.unwrap();
    assert_eq!(actions(&plan), vec![(WEB.to_string(), ResourceAction::Delete)]);

    let summary = engine.apply(&backend, &plan).await.unwrap();
    assert_eq!(summary.destroyed, 1);
    assert!(cloud.launch_configuration("web-lc").is_none());
    assert_eq!(backend.count_resources().await.unwrap(), 0);
}

#[tokio::test]
async fn test_out_of_band_delete_plans_create() {
    let (cloud, engine, backend) = setup().await;
    let desired = project("t2.micro");
    let plan = engine.plan(&desired, &backend).await.unwrap();
    engine.apply(&backend, &plan).await.unwrap();

    use launchcfg::provider::api::AutoScalingApi;
    cloud.delete_launch_configuration("web-lc").await.unwrap();

    let plan = engine.plan(&desired, &backend).await.unwrap();
    assert_eq!(actions(&plan), vec![(WEB.to_string(), ResourceAction::Create)]);

    let summary = engine.refresh(&backend).await.unwrap();
    assert_eq!(summary.refreshed, 0);
    assert_eq!(summary.removed, vec![WEB.to_string()]);
    assert!(backend.get_resource(WEB).await.unwrap().is_none());
}

#[tokio::test]
async fn test_refresh_records_drift() {
    let (cloud, engine, backend) = setup().await;
    let plan = engine.plan(&project("t2.micro"), &backend).await.unwrap();
    engine.apply(&backend, &plan).await.unwrap();

    let mut lc = cloud.launch_configuration("web-lc").unwrap();
    lc.key_name = Some("ops".to_string());
    cloud.insert_launch_configuration(lc);

    let summary = engine.refresh(&backend).await.unwrap();
    assert_eq!(summary.refreshed, 1);
    let record = backend.get_resource(WEB).await.unwrap().unwrap();
    assert_eq!(record.attributes().unwrap()["key_name"], "ops");

    let plan = engine.plan(&project("t2.micro"), &backend).await.unwrap();
    assert_eq!(plan.changes[0].action, ResourceAction::Replace);
    assert_eq!(plan.changes[0].requires_replace, vec!["key_name".to_string()]);
}

#[tokio::test]
async fn test_unreadable_create_is_tainted() {
    let cloud = Arc::new(
        SimulatedCloud::new()
            .with_image("ami-1234", "/dev/xvda")
            .with_visibility_lag(1),
    );
    let client = AwsClient::simulated("us-east-1", cloud.clone())
        .with_consistency_window(Duration::ZERO);
    let engine = ResourceEngine::new(client);
    let backend = SqliteBackend::open_memory().unwrap();
    backend.initialize().await.unwrap();

    let desired = project("t2.micro");
    let plan = engine.plan(&desired, &backend).await.unwrap();
    let summary = engine.apply(&backend, &plan).await.unwrap();
    assert_eq!(summary.failed, 1);
    let error = summary.results[0].error.as_deref().unwrap();
    assert!(error.contains("not visible yet"), "{}", error);

    let record = backend.get_resource(WEB).await.unwrap().unwrap();
    assert!(record.is_tainted());
    assert_eq!(record.provider_id.as_deref(), Some("web-lc"));

    let plan = engine.plan(&desired, &backend).await.unwrap();
    assert_eq!(plan.changes[0].action, ResourceAction::Replace);
    assert!(plan.changes[0].tainted);
}

#[tokio::test]
async fn test_create_failure_is_reported_and_not_tracked() {
    let (_cloud, engine, backend) = setup().await;
    let desired = parse_config(
        r#"
resources:
  aws_launch_configuration:
    web:
      name: web-lc
      image_id: ami-missing
      instance_type: t2.micro
"#,
    )
    .unwrap();

    let plan = engine.plan(&desired, &backend).await.unwrap();
    let summary = engine.apply(&backend, &plan).await.unwrap();
    assert_eq!(summary.failed, 1);
    assert!(summary.results[0]
        .error
        .as_deref()
        .unwrap()
        .contains("Error creating launch configuration"));
    assert_eq!(backend.count_resources().await.unwrap(), 0);
}

#[tokio::test]
async fn test_destroy_removes_everything() {
    let (cloud, engine, backend) = setup().await;
    let plan = engine.plan(&project("t2.micro"), &backend).await.unwrap();
    engine.apply(&backend, &plan).await.unwrap();

    let summary = engine.destroy(&backend).await.unwrap();
    assert!(summary.is_destroy);
    assert_eq!(summary.destroyed, 1);
    assert!(cloud.launch_configuration("web-lc").is_none());
    assert_eq!(backend.count_resources().await.unwrap(), 0);
    assert!(summary.to_string().starts_with("Destroy complete! Resources: 1 destroyed"));
}

#[tokio::test]
async fn test_simulated_cloud_persists_in_working_dir() {
    let dir = TempDir::new().unwrap();
    let mut settings = ProviderSettings::default();
    settings
        .simulated
        .images
        .insert("ami-1234".to_string(), "/dev/xvda".to_string());
    let backend = SqliteBackend::open_memory().unwrap();
    backend.initialize().await.unwrap();

    let engine = ResourceEngine::new(client_from_settings(&settings, dir.path()).unwrap());
    let plan = engine.plan(&project("t2.micro"), &backend).await.unwrap();
    engine.apply(&backend, &plan).await.unwrap();
    assert!(dir.path().join("cloud.json").exists());

    // A fresh client over the same directory sees the earlier create.
    let engine = ResourceEngine::new(client_from_settings(&settings, dir.path()).unwrap());
    let plan = engine.plan(&project("t2.micro"), &backend).await.unwrap();
    assert_eq!(plan.changes[0].action, ResourceAction::NoOp);
}
