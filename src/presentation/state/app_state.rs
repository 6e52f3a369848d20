use std::sync::Arc;

use crate::application::ports::EventBus;
use crate::application::services::JobService;
use crate::domain::StreamName;

#[derive(Clone)]
pub struct AppState {
    pub job_service: Arc<JobService>,
    pub bus: Arc<dyn EventBus>,
    /// Consumer groups whose backlog the operator endpoints report.
    pub monitored_groups: Arc<Vec<(StreamName, String)>>,
}

impl AppState {
    pub fn new(job_service: Arc<JobService>, bus: Arc<dyn EventBus>) -> Self {
        Self {
            job_service,
            bus,
            monitored_groups: Arc::new(Vec::new()),
        }
    }

    pub fn with_monitored_group(mut self, stream: StreamName, group: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.monitored_groups).push((stream, group.into()));
        self
    }
}
