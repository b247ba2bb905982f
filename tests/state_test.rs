use launchcfg::state::backend::StateBackend;
use launchcfg::state::models::{status, ResourceState};
use launchcfg::state::sqlite::SqliteBackend;
use serde_json::json;
use tempfile::TempDir;

async fn create_test_backend() -> (TempDir, SqliteBackend) {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("state").join("launchcfg.db");
    let backend = SqliteBackend::open(db_path.to_str().unwrap()).unwrap();
    backend.initialize().await.unwrap();
    (dir, backend)
}

fn record(name: &str) -> ResourceState {
    let mut state = ResourceState::new("aws_launch_configuration", name);
    state.provider_id = Some(format!("{}-lc", name));
    state
        .set_attributes(&json!({ "name": format!("{}-lc", name), "instance_type": "t2.micro" }))
        .unwrap();
    state
}

#[tokio::test]
async fn test_initialize_is_idempotent() {
    let (_dir, backend) = create_test_backend().await;
    backend.initialize().await.unwrap();
    assert_eq!(backend.count_resources().await.unwrap(), 0);
}

#[tokio::test]
async fn test_upsert_and_get_resource() {
    let (_dir, backend) = create_test_backend().await;

    assert!(backend
        .get_resource("aws_launch_configuration.web")
        .await
        .unwrap()
        .is_none());

    backend.upsert_resource(&record("web")).await.unwrap();
    let stored = backend
        .get_resource("aws_launch_configuration.web")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.provider_id.as_deref(), Some("web-lc"));
    assert_eq!(stored.status, status::CREATED);
    assert_eq!(stored.attributes().unwrap()["instance_type"], "t2.micro");
}

#[tokio::test]
async fn test_upsert_updates_existing_address() {
    let (_dir, backend) = create_test_backend().await;
    let original = record("web");
    backend.upsert_resource(&original).await.unwrap();

    // A new record for the same address replaces attributes and status but
    // keeps the original row identity.
    let mut replacement = record("web");
    replacement.status = status::TAINTED.to_string();
    replacement
        .set_attributes(&json!({ "instance_type": "m5.large" }))
        .unwrap();
    backend.upsert_resource(&replacement).await.unwrap();

    let stored = backend
        .get_resource("aws_launch_configuration.web")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.id, original.id);
    assert!(stored.is_tainted());
    assert_eq!(stored.attributes().unwrap()["instance_type"], "m5.large");
    assert_eq!(backend.count_resources().await.unwrap(), 1);
}

#[tokio::test]
async fn test_list_is_ordered_by_address() {
    let (_dir, backend) = create_test_backend().await;
    for name in ["worker", "api", "web"] {
        backend.upsert_resource(&record(name)).await.unwrap();
    }

    let addresses: Vec<String> = backend
        .list_resources()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.address)
        .collect();
    assert_eq!(
        addresses,
        vec![
            "aws_launch_configuration.api",
            "aws_launch_configuration.web",
            "aws_launch_configuration.worker",
        ]
    );
}

#[tokio::test]
async fn test_delete_resource() {
    let (_dir, backend) = create_test_backend().await;
    backend.upsert_resource(&record("web")).await.unwrap();
    backend
        .delete_resource("aws_launch_configuration.web")
        .await
        .unwrap();
    assert_eq!(backend.count_resources().await.unwrap(), 0);

    // Deleting an unknown address is not an error.
    backend
        .delete_resource("aws_launch_configuration.web")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("launchcfg.db");
    let db_path = db_path.to_str().unwrap();

    {
        let backend = SqliteBackend::open(db_path).unwrap();
        backend.initialize().await.unwrap();
        backend.upsert_resource(&record("web")).await.unwrap();
    }

    let backend = SqliteBackend::open(db_path).unwrap();
    backend.initialize().await.unwrap();
    assert_eq!(backend.count_resources().await.unwrap(), 1);
}

#[test]
fn test_memory_backend_with_blocking_runtime() {
    let backend = SqliteBackend::open_memory().unwrap();
    tokio_test::block_on(async {
        backend.initialize().await.unwrap();
        backend.upsert_resource(&record("web")).await.unwrap();
        assert_eq!(backend.count_resources().await.unwrap(), 1);
    });
}
