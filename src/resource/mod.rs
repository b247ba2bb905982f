pub mod block_device;
pub mod launch_configuration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::provider::api::ApiError;
use crate::schema::SchemaError;

/// Handle on one resource instance: its identifier and tracked state.
///
/// An identifier of `None` means the resource does not exist (never created,
/// or found gone during a read).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceData<S> {
    id: Option<String>,
    pub state: S,
}

impl<S: Default> ResourceData<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(id: impl Into<String>, state: S) -> Self {
        Self {
            id: Some(id.into()),
            state,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    pub fn clear_id(&mut self) {
        self.id = None;
    }
}

/// Failures of a resource operation.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("invalid configuration: {}", join_schema_errors(.0))]
    InvalidConfig(Vec<SchemaError>),

    #[error("invalid configuration: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Cannot specify more than one root_block_device (got {0}).")]
    TooManyRootBlockDevices(usize),

    #[error("Error describing image {image_id}: {source}")]
    ImageLookup { image_id: String, source: ApiError },

    #[error("Could not determine root device name for image {image_id}: {reason}")]
    RootDeviceName { image_id: String, reason: String },

    #[error("Error creating launch configuration: {0}")]
    Create(#[source] ApiError),

    #[error("Error retrieving launch configuration: {0}")]
    Describe(#[source] ApiError),

    #[error("Unable to find launch configuration {expected}: lookup returned {found:?}")]
    IdMismatch {
        expected: String,
        found: Vec<String>,
    },

    #[error("launch configuration {0} is not visible yet")]
    NotYetVisible(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

fn join_schema_errors(errors: &[SchemaError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_lifecycle() {
        let mut d: ResourceData<()> = ResourceData::new();
        assert_eq!(d.id(), None);
        d.set_id("web-lc");
        assert_eq!(d.id(), Some("web-lc"));
        d.clear_id();
        assert_eq!(d.id(), None);
    }

    #[test]
    fn invalid_config_lists_every_problem() {
        let err = ResourceError::InvalidConfig(vec![
            SchemaError::MissingRequired("name".into()),
            SchemaError::Unknown("colour".into()),
        ]);
        assert_eq!(
            err.to_string(),
            "invalid configuration: \"name\": required field is not set; \"colour\": unsupported argument"
        );
    }

    #[test]
    fn api_errors_pass_through_verbatim() {
        let err = ResourceError::from(ApiError::new("Throttling", "Rate exceeded"));
        assert_eq!(err.to_string(), "Throttling: Rate exceeded");
    }
}
