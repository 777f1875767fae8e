//! Control-plane access for promotion
//!
//! A promotion touches up to two independently administered control planes:
//! the fleet hub that owns the declaration, and a member used to verify that
//! the change has propagated. Both sit behind the `ControlPlane` trait so the
//! workflow can run against in-memory fakes in tests.

use async_trait::async_trait;
use kube::api::{Patch, PatchParams};
use kube::config::KubeConfigOptions;
use kube::{Api, Client, Config};
use thiserror::Error;
use tracing::debug;

use crate::crd::DocumentDB;
use crate::resources::FIELD_MANAGER;

/// Errors returned by a control plane
#[allow(clippy::enum_variant_names)]
#[derive(Error, Debug)]
pub enum ControlPlaneError {
    #[error("DocumentDB {namespace}/{name} not found")]
    NotFound { namespace: String, name: String },

    #[error("Conflicting update to DocumentDB {namespace}/{name}: {message}")]
    Conflict {
        namespace: String,
        name: String,
        message: String,
    },

    #[error("Kubernetes API error: {0}")]
    KubeError(#[source] kube::Error),

    #[error("Kubeconfig error: {0}")]
    KubeconfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Control plane unavailable: {0}")]
    Unavailable(String),
}

impl ControlPlaneError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ControlPlaneError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ControlPlaneError::Conflict { .. })
    }

    /// Classify a kube error for the named object
    pub fn from_kube(error: kube::Error, namespace: &str, name: &str) -> Self {
        match &error {
            kube::Error::Api(status) if status.code == 404 => ControlPlaneError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            },
            kube::Error::Api(status) if status.code == 409 => ControlPlaneError::Conflict {
                namespace: namespace.to_string(),
                name: name.to_string(),
                message: status.message.clone(),
            },
            _ => ControlPlaneError::KubeError(error),
        }
    }
}

/// Read and merge-patch access to DocumentDB declarations on one control plane
///
/// All methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Human-readable name used in logs and errors
    fn name(&self) -> &str;

    /// Fetch the current declaration (never from a cache)
    async fn get(&self, namespace: &str, name: &str) -> Result<DocumentDB, ControlPlaneError>;

    /// Apply a JSON merge patch as one atomic write
    ///
    /// A `metadata.resourceVersion` in the patch makes the write conditional:
    /// the control plane rejects it with `Conflict` if the object changed.
    async fn merge_patch(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<DocumentDB, ControlPlaneError>;
}

/// Control plane backed by a Kubernetes API server
#[derive(Clone)]
pub struct KubeControlPlane {
    name: String,
    client: Client,
}

impl KubeControlPlane {
    pub fn new(name: impl Into<String>, client: Client) -> Self {
        Self {
            name: name.into(),
            client,
        }
    }

    /// Connect using a named context from the local kubeconfig
    pub async fn from_context(context: &str) -> Result<Self, ControlPlaneError> {
        let options = KubeConfigOptions {
            context: Some(context.to_string()),
            ..Default::default()
        };
        let config = Config::from_kubeconfig(&options)
            .await
            .map_err(|e| ControlPlaneError::KubeconfigError(e.to_string()))?;
        let client = Client::try_from(config).map_err(ControlPlaneError::KubeError)?;
        Ok(Self::new(context, client))
    }

    fn api(&self, namespace: &str) -> Api<DocumentDB> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ControlPlane for KubeControlPlane {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<DocumentDB, ControlPlaneError> {
        self.api(namespace)
            .get(name)
            .await
            .map_err(|e| ControlPlaneError::from_kube(e, namespace, name))
    }

    async fn merge_patch(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<DocumentDB, ControlPlaneError> {
        debug!(plane = %self.name, %namespace, %name, "Submitting merge patch");
        self.api(namespace)
            .patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
            .await
            .map_err(|e| ControlPlaneError::from_kube(e, namespace, name))
    }
}
