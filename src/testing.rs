//! In-memory stand-in for the API server used by unit tests

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;

use crate::client::{LabelSelector, WorkspaceClient};
use crate::crd::{
    AnalyticsWorkspace, AnalyticsWorkspaceBinding, AnalyticsWorkspaceBindingSpec,
    AnalyticsWorkspaceBindingStatus, AnalyticsWorkspaceSpec, USERNAME_LABEL,
};
use crate::{Error, Result};

pub(crate) const NS: &str = "jh-test";

pub(crate) fn workspace(name: &str, display_name: &str) -> AnalyticsWorkspace {
    workspace_in(NS, name, display_name)
}

pub(crate) fn workspace_in(namespace: &str, name: &str, display_name: &str) -> AnalyticsWorkspace {
    AnalyticsWorkspace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: AnalyticsWorkspaceSpec {
            display_name: display_name.to_string(),
            ..Default::default()
        },
    }
}

/// Binding carrying the username label
pub(crate) fn labeled_binding(
    name: &str,
    workspace: &str,
    username: &str,
    label: &str,
) -> AnalyticsWorkspaceBinding {
    let mut binding = unlabeled_binding(name, workspace, username);
    binding
        .metadata
        .labels
        .get_or_insert_with(BTreeMap::new)
        .insert(USERNAME_LABEL.to_string(), label.to_string());
    binding
}

/// Binding with only `spec.username`
pub(crate) fn unlabeled_binding(
    name: &str,
    workspace: &str,
    username: &str,
) -> AnalyticsWorkspaceBinding {
    unlabeled_binding_in(NS, name, workspace, username)
}

pub(crate) fn unlabeled_binding_in(
    namespace: &str,
    name: &str,
    workspace: &str,
    username: &str,
) -> AnalyticsWorkspaceBinding {
    AnalyticsWorkspaceBinding {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: AnalyticsWorkspaceBindingSpec {
            workspace: workspace.to_string(),
            username: username.to_string(),
            replicas: Some(0),
            comments: None,
        },
        status: None,
    }
}

#[derive(Default)]
struct State {
    workspaces: Vec<AnalyticsWorkspace>,
    bindings: Vec<AnalyticsWorkspaceBinding>,
    /// Remaining injected failures per binding name
    patch_failures: BTreeMap<String, u32>,
    /// Patches that fail forever
    broken: Vec<String>,
    fail_lists: bool,
    /// Mirror spec.replicas into status.replicas on every patch
    controller_running: bool,
    patch_log: Vec<(String, i32)>,
}

/// Fake store with label-selector semantics matching the API server
#[derive(Default)]
pub(crate) struct FakeStore {
    state: Mutex<State>,
}

impl FakeStore {
    pub(crate) fn new() -> Self {
        let store = Self::default();
        store.state.lock().expect("lock").controller_running = true;
        store
    }

    pub(crate) fn with_workspace(self, ws: AnalyticsWorkspace) -> Self {
        self.state.lock().expect("lock").workspaces.push(ws);
        self
    }

    pub(crate) fn with_binding(self, binding: AnalyticsWorkspaceBinding) -> Self {
        self.state.lock().expect("lock").bindings.push(binding);
        self
    }

    pub(crate) fn fail_patches(&self, binding: &str, times: u32) {
        self.state
            .lock()
            .expect("lock")
            .patch_failures
            .insert(binding.to_string(), times);
    }

    pub(crate) fn break_patches(&self, binding: &str) {
        self.state.lock().expect("lock").broken.push(binding.to_string());
    }

    pub(crate) fn fail_lists(&self) {
        self.state.lock().expect("lock").fail_lists = true;
    }

    pub(crate) fn stop_controller(&self) {
        self.state.lock().expect("lock").controller_running = false;
    }

    pub(crate) fn remove_binding(&self, name: &str) {
        self.state
            .lock()
            .expect("lock")
            .bindings
            .retain(|b| b.name_any() != name);
    }

    pub(crate) fn desired_replicas(&self) -> BTreeMap<String, i32> {
        self.state
            .lock()
            .expect("lock")
            .bindings
            .iter()
            .map(|b| (b.name_any(), b.desired_replicas()))
            .collect()
    }

    /// `(namespace, name)` of every binding with desired replicas 1
    pub(crate) fn active_bindings(&self) -> Vec<(String, String)> {
        self.state
            .lock()
            .expect("lock")
            .bindings
            .iter()
            .filter(|b| b.desired_replicas() == 1)
            .map(|b| b.identity())
            .collect()
    }

    pub(crate) fn patch_log(&self) -> Vec<(String, i32)> {
        self.state.lock().expect("lock").patch_log.clone()
    }
}

#[async_trait]
impl WorkspaceClient for FakeStore {
    async fn list_bindings(
        &self,
        selector: &LabelSelector,
    ) -> Result<Vec<AnalyticsWorkspaceBinding>> {
        // Suspend like a real call so concurrent passes can interleave
        tokio::task::yield_now().await;
        let state = self.state.lock().expect("lock");
        if state.fail_lists {
            return Err(Error::transport("list_bindings", "connection refused"));
        }
        let matches = |b: &AnalyticsWorkspaceBinding| {
            let labels = b.labels();
            match selector {
                LabelSelector::Equals { key, value } => labels.get(key) == Some(value),
                LabelSelector::Absent { key } => !labels.contains_key(key),
            }
        };
        Ok(state.bindings.iter().filter(|b| matches(b)).cloned().collect())
    }

    async fn get_workspace(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<AnalyticsWorkspace>> {
        let state = self.state.lock().expect("lock");
        Ok(state
            .workspaces
            .iter()
            .find(|w| w.namespace().as_deref() == Some(namespace) && w.name_any() == name)
            .cloned())
    }

    async fn get_binding(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<AnalyticsWorkspaceBinding>> {
        let state = self.state.lock().expect("lock");
        Ok(state
            .bindings
            .iter()
            .find(|b| b.namespace().as_deref() == Some(namespace) && b.name_any() == name)
            .cloned())
    }

    async fn patch_binding_replicas(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<AnalyticsWorkspaceBinding> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock().expect("lock");
        if state.broken.iter().any(|b| b == name) {
            return Err(Error::transport("patch_binding_replicas", "connection reset"));
        }
        if let Some(remaining) = state.patch_failures.get_mut(name) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(Error::transport("patch_binding_replicas", "connection reset"));
            }
        }
        state.patch_log.push((name.to_string(), replicas));
        let controller_running = state.controller_running;
        let binding = state
            .bindings
            .iter_mut()
            .find(|b| b.namespace().as_deref() == Some(namespace) && b.name_any() == name)
            .ok_or_else(|| Error::not_found("AnalyticsWorkspaceBinding", namespace, name))?;
        binding.spec.replicas = Some(replicas);
        if controller_running {
            binding.status = Some(AnalyticsWorkspaceBindingStatus {
                replicas: Some(replicas),
                message: None,
            });
        }
        Ok(binding.clone())
    }
}
