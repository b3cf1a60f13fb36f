//! Narrow Kubernetes client for workspaces and bindings
//!
//! Only the calls the gate needs are exposed, behind a trait so discovery,
//! enforcement and the trigger logic can run against a mock or an in-memory
//! store in tests. Every call is bounded by the configured timeout.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use json_patch::{PatchOperation, ReplaceOperation};
use jsonptr::PointerBuf;
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::Client;
use tracing::{debug, trace};

#[cfg(test)]
use mockall::automock;

use crate::config::GateConfig;
use crate::crd::{AnalyticsWorkspace, AnalyticsWorkspaceBinding};
use crate::{Error, Result};

/// Kind name used in NotFound errors
const BINDING_KIND: &str = "AnalyticsWorkspaceBinding";

// =============================================================================
// Label selectors
// =============================================================================

/// The two label selector forms used for binding lookups
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LabelSelector {
    /// `key=value`
    Equals {
        /// Label key
        key: String,
        /// Required label value
        value: String,
    },
    /// `!key`
    Absent {
        /// Label key that must not be set
        key: String,
    },
}

impl LabelSelector {
    /// Select resources whose label `key` equals `value`
    pub fn equals(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Equals {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Select resources without label `key`
    pub fn absent(key: impl Into<String>) -> Self {
        Self::Absent { key: key.into() }
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equals { key, value } => write!(f, "{key}={value}"),
            Self::Absent { key } => write!(f, "!{key}"),
        }
    }
}

// =============================================================================
// Client trait
// =============================================================================

/// Remote operations on AnalyticsWorkspace and AnalyticsWorkspaceBinding
///
/// Calls are independent: there is no batching and no transaction across them.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WorkspaceClient: Send + Sync {
    /// List bindings matching a label selector, in server order
    async fn list_bindings(
        &self,
        selector: &LabelSelector,
    ) -> Result<Vec<AnalyticsWorkspaceBinding>>;

    /// Get a workspace, `None` if it does not exist
    async fn get_workspace(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<AnalyticsWorkspace>>;

    /// Get a binding, `None` if it does not exist
    async fn get_binding(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<AnalyticsWorkspaceBinding>>;

    /// Replace a binding's desired replica count
    async fn patch_binding_replicas(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<AnalyticsWorkspaceBinding>;
}

/// JSON patch replacing `/spec/replicas`
pub fn replicas_patch(replicas: i32) -> json_patch::Patch {
    json_patch::Patch(vec![PatchOperation::Replace(ReplaceOperation {
        path: PointerBuf::from_tokens(["spec", "replicas"]),
        value: serde_json::Value::from(replicas),
    })])
}

/// Keep API server responses as `Kube`; anything that never got a response
/// (connect, TLS, body decoding) is a transport failure of `operation`.
fn map_kube_error(operation: &str, err: kube::Error) -> Error {
    match err {
        kube::Error::Api(_) => Error::from(err),
        other => Error::transport(operation, other.to_string()),
    }
}

// =============================================================================
// kube-rs implementation
// =============================================================================

/// Real Kubernetes client implementation
pub struct KubeWorkspaceClient {
    client: Client,
    namespace: Option<String>,
    call_timeout: Duration,
}

impl KubeWorkspaceClient {
    /// Wrap an existing client
    pub fn new(client: Client, config: &GateConfig) -> Self {
        Self {
            client,
            namespace: config.namespace.clone(),
            call_timeout: config.call_timeout,
        }
    }

    /// Build a client from the in-cluster or kubeconfig environment
    pub async fn try_default(config: &GateConfig) -> Result<Self> {
        let client = Client::try_default()
            .await
            .map_err(|e| Error::transport("client_init", e.to_string()))?;
        Ok(Self::new(client, config))
    }

    fn bindings_api(&self) -> Api<AnalyticsWorkspaceBinding> {
        match &self.namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }

    async fn bounded<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, kube::Error>>,
    {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result.map_err(|e| map_kube_error(operation, e)),
            Err(_) => Err(Error::transport(
                operation,
                format!("timed out after {:?}", self.call_timeout),
            )),
        }
    }
}

#[async_trait]
impl WorkspaceClient for KubeWorkspaceClient {
    async fn list_bindings(
        &self,
        selector: &LabelSelector,
    ) -> Result<Vec<AnalyticsWorkspaceBinding>> {
        let selector = selector.to_string();
        debug!(selector = %selector, "listing workspace bindings");
        let params = ListParams::default().labels(&selector);
        let api = self.bindings_api();
        let list = self.bounded("list_bindings", api.list(&params)).await?;
        trace!(selector = %selector, count = list.items.len(), "listed workspace bindings");
        Ok(list.items)
    }

    async fn get_workspace(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<AnalyticsWorkspace>> {
        let api: Api<AnalyticsWorkspace> = Api::namespaced(self.client.clone(), namespace);
        self.bounded("get_workspace", api.get_opt(name)).await
    }

    async fn get_binding(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<AnalyticsWorkspaceBinding>> {
        let api: Api<AnalyticsWorkspaceBinding> =
            Api::namespaced(self.client.clone(), namespace);
        self.bounded("get_binding", api.get_opt(name)).await
    }

    async fn patch_binding_replicas(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<AnalyticsWorkspaceBinding> {
        let api: Api<AnalyticsWorkspaceBinding> =
            Api::namespaced(self.client.clone(), namespace);
        let patch = Patch::Json::<()>(replicas_patch(replicas));

        match self
            .bounded(
                "patch_binding_replicas",
                api.patch(name, &PatchParams::default(), &patch),
            )
            .await
        {
            Ok(binding) => Ok(binding),
            Err(Error::Kube {
                source: kube::Error::Api(ae),
            }) if ae.code == 404 => Err(Error::not_found(BINDING_KIND, namespace, name)),
            Err(e) => Err(e),
        }
    }
}
