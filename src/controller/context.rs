use std::sync::Arc;

use kube::Client;

use crate::config::OperatorConfig;
use crate::health::HealthState;

/// Shared context for the controller
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client
    pub client: Client,
    pub config: OperatorConfig,
    /// Metrics sink, absent when running without the health server
    pub health_state: Option<Arc<HealthState>>,
}

impl Context {
    pub fn new(
        client: Client,
        config: OperatorConfig,
        health_state: Option<Arc<HealthState>>,
    ) -> Self {
        Self {
            client,
            config,
            health_state,
        }
    }
}
