//! Active binding enforcement
//!
//! Drives the cluster towards "exactly one of the user's bindings has
//! `spec.replicas: 1`". Each binding is patched on its own; there is no
//! transaction across them. A pass is safe to repeat: the patches replace
//! the field, so re-running with the same target converges to the same
//! state, and a pass interrupted half way is completed by the next one.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use kube::ResourceExt;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::client::WorkspaceClient;
use crate::config::GateConfig;
use crate::crd::AnalyticsWorkspaceBinding;
use crate::discovery::BindingDiscovery;
use crate::retry::{retry_with_backoff_if, RetryConfig};
use crate::{Error, Result};

/// Replica count of the active binding
pub const ACTIVE_REPLICAS: i32 = 1;
/// Replica count of every other binding
pub const INACTIVE_REPLICAS: i32 = 0;

/// Outcome of a successful enforcement pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnforcementReport {
    /// Namespace of the activated binding
    pub namespace: String,
    /// Name of the activated binding
    pub binding: String,
    /// Workspace the activated binding points to
    pub workspace: String,
    /// Bindings set to zero replicas
    pub deactivated: Vec<String>,
}

/// Keeps exactly one binding per user active
pub struct ActiveBindingEnforcer {
    client: Arc<dyn WorkspaceClient>,
    discovery: BindingDiscovery,
    patch_retry: RetryConfig,
    settle_poll_interval: Duration,
    settle_timeout: Duration,
    /// One lock per username currently being enforced in this process
    user_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ActiveBindingEnforcer {
    /// Create an enforcer over the given client
    pub fn new(client: Arc<dyn WorkspaceClient>, config: &GateConfig) -> Self {
        Self {
            discovery: BindingDiscovery::new(client.clone()),
            client,
            patch_retry: config.patch_retry.clone(),
            settle_poll_interval: config.settle_poll_interval,
            settle_timeout: config.settle_timeout,
            user_locks: DashMap::new(),
        }
    }

    /// Activate `target` and deactivate every other binding of `username`.
    ///
    /// Fails with `ConsistencyFault` without patching anything when `target`
    /// is not one of the user's bindings. Each patch is retried on its own;
    /// a patch that keeps failing does not stop the others, and the failed
    /// bindings are reported in `PartialEnforcement`. Nothing is rolled back.
    /// When bindings in several namespaces share the target name, only the
    /// first one discovered is activated.
    #[instrument(skip(self))]
    pub async fn set_active(&self, target: &str, username: &str) -> Result<EnforcementReport> {
        let lock = self
            .user_locks
            .entry(username.to_string())
            .or_default()
            .clone();

        let result = {
            let _guard = lock.lock().await;
            self.enforce(target, username).await
        };

        drop(lock);
        self.user_locks
            .remove_if(username, |_, l| Arc::strong_count(l) == 1);

        result
    }

    async fn enforce(&self, target: &str, username: &str) -> Result<EnforcementReport> {
        let bindings = self.discovery.find_all_bindings_for_user(username).await?;

        let active = bindings
            .iter()
            .find(|b| b.name_any() == target)
            .ok_or_else(|| Error::consistency_fault(username, target))?;
        let active_identity = active.identity();
        let mut report = EnforcementReport {
            namespace: active.namespace_or_default(),
            binding: target.to_string(),
            workspace: active.spec.workspace.clone(),
            deactivated: Vec::new(),
        };

        let mut failed = Vec::new();
        for binding in &bindings {
            let name = binding.name_any();
            let replicas = if binding.identity() == active_identity {
                ACTIVE_REPLICAS
            } else {
                INACTIVE_REPLICAS
            };

            info!(binding = %name, replicas, "setting binding replicas");
            match self.patch_replicas(binding, replicas).await {
                Ok(()) => {
                    if replicas == INACTIVE_REPLICAS {
                        report.deactivated.push(name);
                    }
                }
                // Deleted since discovery: nothing left to deactivate
                Err(Error::NotFound { .. }) if replicas == INACTIVE_REPLICAS => {
                    debug!(binding = %name, "binding disappeared before deactivation");
                }
                Err(e) => {
                    warn!(binding = %name, replicas, error = %e, "failed to set binding replicas");
                    failed.push(name);
                }
            }
        }

        if !failed.is_empty() {
            return Err(Error::PartialEnforcement {
                username: username.to_string(),
                failed,
            });
        }

        info!(
            binding = %report.binding,
            deactivated = report.deactivated.len(),
            "active workspace binding enforced"
        );
        Ok(report)
    }

    async fn patch_replicas(
        &self,
        binding: &AnalyticsWorkspaceBinding,
        replicas: i32,
    ) -> Result<()> {
        let namespace = binding.namespace_or_default();
        let name = binding.name_any();
        retry_with_backoff_if(
            &self.patch_retry,
            "patch_binding_replicas",
            Error::is_retryable,
            || self.client.patch_binding_replicas(&namespace, &name, replicas),
        )
        .await?;
        Ok(())
    }

    /// Wait until the activated binding reports a running replica.
    ///
    /// Polls `status.replicas` every `settle_poll_interval` until it reaches
    /// the active count or `settle_timeout` elapses. Returns whether the
    /// binding settled; poll failures and timeouts are logged, not returned.
    #[instrument(skip(self, report), fields(binding = %report.binding))]
    pub async fn wait_until_settled(&self, report: &EnforcementReport) -> bool {
        if self.settle_timeout.is_zero() {
            return false;
        }

        let deadline = tokio::time::Instant::now() + self.settle_timeout;
        loop {
            match self
                .client
                .get_binding(&report.namespace, &report.binding)
                .await
            {
                Ok(Some(binding)) if binding.observed_replicas() == Some(ACTIVE_REPLICAS) => {
                    debug!("binding reports ready");
                    return true;
                }
                Ok(Some(binding)) => {
                    debug!(observed = ?binding.observed_replicas(), "binding not ready yet");
                }
                Ok(None) => {
                    warn!("binding disappeared while waiting for it to settle");
                    return false;
                }
                Err(e) => {
                    debug!(error = %e, "failed to read binding status");
                }
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                warn!(timeout = ?self.settle_timeout, "binding did not settle in time");
                return false;
            }
            tokio::time::sleep(self.settle_poll_interval.min(deadline - now)).await;
        }
    }
}
