//! AnalyticsWorkspace CRD
//!
//! A workspace is the environment a user lands in after authenticating.
//! This crate only reads it to show a display name on the selection form.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// AnalyticsWorkspace describes a provisioned analytics environment.
///
/// Example:
/// ```yaml
/// apiVersion: xlscsde.nhs.uk/v1
/// kind: AnalyticsWorkspace
/// metadata:
///   name: generic-workspace
///   namespace: jh-test
/// spec:
///   displayName: Generic Workspace
///   description: Shared Jupyter environment
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "xlscsde.nhs.uk",
    version = "v1",
    kind = "AnalyticsWorkspace",
    plural = "analyticsworkspaces",
    namespaced,
    printcolumn = r#"{"name":"Display Name","type":"string","jsonPath":".spec.displayName"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsWorkspaceSpec {
    /// Human-readable name shown on the selection form
    #[serde(default)]
    pub display_name: String,

    /// Free-text description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Notebook server settings, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "super::preserve_unknown_fields")]
    pub jupyter_workspace: Option<serde_json::Value>,

    /// Validity window, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "super::preserve_unknown_fields")]
    pub validity: Option<serde_json::Value>,
}

impl AnalyticsWorkspace {
    /// Display name, falling back to the resource name when unset
    pub fn display_name(&self) -> String {
        if self.spec.display_name.trim().is_empty() {
            self.metadata.name.clone().unwrap_or_default()
        } else {
            self.spec.display_name.clone()
        }
    }
}
