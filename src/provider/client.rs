use std::sync::Arc;
use std::time::Duration;

use super::api::{AutoScalingApi, Ec2Api};
use super::simulated::SimulatedCloud;

/// Default window for the read that follows a successful create.
pub const DEFAULT_CONSISTENCY_WINDOW: Duration = Duration::from_secs(30);

/// The client bundle handed to every resource operation.
#[derive(Clone)]
pub struct AwsClient {
    pub region: String,
    pub autoscaling: Arc<dyn AutoScalingApi>,
    pub ec2: Arc<dyn Ec2Api>,
    /// How long the post-create read keeps retrying before create fails.
    pub consistency_window: Duration,
}

impl AwsClient {
    pub fn new(
        region: impl Into<String>,
        autoscaling: Arc<dyn AutoScalingApi>,
        ec2: Arc<dyn Ec2Api>,
    ) -> Self {
        Self {
            region: region.into(),
            autoscaling,
            ec2,
            consistency_window: DEFAULT_CONSISTENCY_WINDOW,
        }
    }

    /// Bundle backed by a single simulator serving both APIs.
    pub fn simulated(region: impl Into<String>, cloud: Arc<SimulatedCloud>) -> Self {
        Self::new(region, cloud.clone(), cloud)
    }

    pub fn with_consistency_window(mut self, window: Duration) -> Self {
        self.consistency_window = window;
        self
    }
}

impl std::fmt::Debug for AwsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsClient")
            .field("region", &self.region)
            .field("consistency_window", &self.consistency_window)
            .finish_non_exhaustive()
    }
}
