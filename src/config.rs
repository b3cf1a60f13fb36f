//! Runtime configuration
//!
//! Defaults match the cluster the provider was first deployed to. The CLI
//! overrides any of them from flags or environment variables.

use std::time::Duration;

use crate::retry::RetryConfig;
use crate::{Error, Result};

/// Client whose sessions must re-select a workspace when the top-level
/// authentication session changes.
pub const DEFAULT_INTERACTIVE_CLIENT: &str = "guacamole";

/// Configuration shared by every component of the gate
#[derive(Clone, Debug, PartialEq)]
pub struct GateConfig {
    /// Namespace to list bindings in; `None` lists across all namespaces
    pub namespace: Option<String>,

    /// Client name that triggers the stale-session check
    pub interactive_client: String,

    /// Upper bound for any single call to the API server
    pub call_timeout: Duration,

    /// Retry policy for each binding's replica patch
    pub patch_retry: RetryConfig,

    /// How often to check the active binding's status after a selection
    pub settle_poll_interval: Duration,

    /// How long to wait for the active binding to report ready; zero disables the wait
    pub settle_timeout: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            interactive_client: DEFAULT_INTERACTIVE_CLIENT.to_string(),
            call_timeout: Duration::from_secs(10),
            patch_retry: RetryConfig::default(),
            settle_poll_interval: Duration::from_millis(500),
            settle_timeout: Duration::from_secs(3),
        }
    }
}

impl GateConfig {
    /// Check values that would make every authentication pass fail
    pub fn validate(&self) -> Result<()> {
        if self.call_timeout.is_zero() {
            return Err(Error::config("call timeout must be greater than zero"));
        }
        if self.interactive_client.trim().is_empty() {
            return Err(Error::config("interactive client name must not be empty"));
        }
        if !self.settle_timeout.is_zero() && self.settle_poll_interval.is_zero() {
            return Err(Error::config(
                "settle poll interval must be greater than zero when settling is enabled",
            ));
        }
        if let Some(ns) = &self.namespace {
            if ns.trim().is_empty() {
                return Err(Error::config("namespace must not be blank"));
            }
        }
        Ok(())
    }

    /// Whether selections wait for the binding to report ready
    pub fn settle_enabled(&self) -> bool {
        !self.settle_timeout.is_zero()
    }
}
