//! In-memory control plane
//!
//! Holds DocumentDB declarations in process memory and behaves like an API
//! server for the two operations promotion needs: fresh reads and
//! conditional merge patches. Tests use it to simulate delayed convergence,
//! version conflicts, and outages.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::crd::DocumentDB;

use super::control_plane::{ControlPlane, ControlPlaneError};

#[derive(Default)]
struct Store {
    objects: BTreeMap<(String, String), DocumentDB>,
    next_version: u64,
    get_failures: VecDeque<ControlPlaneError>,
    patch_failures: VecDeque<ControlPlaneError>,
    latency: Duration,
    gets: usize,
    patches: usize,
}

impl Store {
    fn bump_version(&mut self, db: &mut DocumentDB) {
        self.next_version += 1;
        db.metadata.resource_version = Some(self.next_version.to_string());
    }
}

/// Control plane backed by a shared in-memory store
///
/// Clones share the same store, so a test can hold one handle as the
/// "external actor" while the workflow under test uses another.
#[derive(Clone)]
pub struct InMemoryControlPlane {
    name: String,
    store: Arc<Mutex<Store>>,
}

impl InMemoryControlPlane {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            store: Arc::new(Mutex::new(Store::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store a declaration, replacing any existing one, and assign a new version
    pub fn insert(&self, mut db: DocumentDB) {
        let key = key_of(&db);
        let mut store = self.lock();
        store.bump_version(&mut db);
        store.objects.insert(key, db);
    }

    /// Snapshot of a stored declaration
    pub fn snapshot(&self, namespace: &str, name: &str) -> Option<DocumentDB> {
        self.lock()
            .objects
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Mutate a stored declaration as another writer would
    ///
    /// Returns false if the declaration does not exist.
    pub fn update<F>(&self, namespace: &str, name: &str, mutate: F) -> bool
    where
        F: FnOnce(&mut DocumentDB),
    {
        let mut store = self.lock();
        let Some(mut db) = store
            .objects
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
        else {
            return false;
        };
        mutate(&mut db);
        store.bump_version(&mut db);
        store
            .objects
            .insert((namespace.to_string(), name.to_string()), db);
        true
    }

    pub fn remove(&self, namespace: &str, name: &str) -> Option<DocumentDB> {
        self.lock()
            .objects
            .remove(&(namespace.to_string(), name.to_string()))
    }

    /// Make the next read fail with `error`
    pub fn fail_next_get(&self, error: ControlPlaneError) {
        self.lock().get_failures.push_back(error);
    }

    /// Make the next patch fail with `error`
    pub fn fail_next_patch(&self, error: ControlPlaneError) {
        self.lock().patch_failures.push_back(error);
    }

    /// Delay every call by `latency` before it reaches the store
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    pub fn get_count(&self) -> usize {
        self.lock().gets
    }

    pub fn patch_count(&self) -> usize {
        self.lock().patches
    }

    async fn simulate_latency(&self) {
        let latency = self.lock().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl ControlPlane for InMemoryControlPlane {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<DocumentDB, ControlPlaneError> {
        self.simulate_latency().await;

        let mut store = self.lock();
        store.gets += 1;
        if let Some(error) = store.get_failures.pop_front() {
            return Err(error);
        }
        store
            .objects
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| ControlPlaneError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    async fn merge_patch(
        &self,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<DocumentDB, ControlPlaneError> {
        self.simulate_latency().await;

        let key = (namespace.to_string(), name.to_string());
        let mut store = self.lock();
        store.patches += 1;
        if let Some(error) = store.patch_failures.pop_front() {
            return Err(error);
        }

        let current = store
            .objects
            .get(&key)
            .ok_or_else(|| ControlPlaneError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })?;

        if let Some(expected) = patch
            .pointer("/metadata/resourceVersion")
            .and_then(Value::as_str)
            && current.metadata.resource_version.as_deref() != Some(expected)
        {
            return Err(ControlPlaneError::Conflict {
                namespace: namespace.to_string(),
                name: name.to_string(),
                message: format!(
                    "resourceVersion {expected} does not match {}",
                    current.metadata.resource_version.as_deref().unwrap_or("<none>")
                ),
            });
        }

        let mut document = serde_json::to_value(current)?;
        apply_merge_patch(&mut document, patch);
        let mut updated: DocumentDB = serde_json::from_value(document)?;
        store.bump_version(&mut updated);
        store.objects.insert(key, updated.clone());
        Ok(updated)
    }
}

fn key_of(db: &DocumentDB) -> (String, String) {
    (
        db.metadata
            .namespace
            .clone()
            .unwrap_or_else(|| "default".to_string()),
        db.metadata.name.clone().unwrap_or_default(),
    )
}

/// Apply a JSON merge patch (RFC 7386) in place
///
/// Objects merge key by key, `null` deletes, anything else replaces.
pub fn apply_merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(entries) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(fields) = target {
        for (key, value) in entries {
            if value.is_null() {
                fields.remove(key);
            } else {
                apply_merge_patch(fields.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}
