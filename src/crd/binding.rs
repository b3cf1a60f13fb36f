//! AnalyticsWorkspaceBinding CRD
//!
//! A binding attaches one user to one workspace. `spec.replicas` is the
//! activation switch: 1 means the workspace should be running for the user,
//! 0 means it should not. This crate only ever patches that field.

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::USERNAME_LABEL;

/// AnalyticsWorkspaceBinding links a user to a workspace.
///
/// Example:
/// ```yaml
/// apiVersion: xlscsde.nhs.uk/v1
/// kind: AnalyticsWorkspaceBinding
/// metadata:
///   name: generic-workspace-alice
///   namespace: jh-test
///   labels:
///     xlscsde.nhs.uk/username: alice
/// spec:
///   workspace: generic-workspace
///   username: alice
///   replicas: 0
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "xlscsde.nhs.uk",
    version = "v1",
    kind = "AnalyticsWorkspaceBinding",
    plural = "analyticsworkspacebindings",
    namespaced,
    status = "AnalyticsWorkspaceBindingStatus",
    printcolumn = r#"{"name":"Workspace","type":"string","jsonPath":".spec.workspace"}"#,
    printcolumn = r#"{"name":"Username","type":"string","jsonPath":".spec.username"}"#,
    printcolumn = r#"{"name":"Replicas","type":"integer","jsonPath":".spec.replicas"}"#,
    printcolumn = r#"{"name":"Ready","type":"integer","jsonPath":".status.replicas"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsWorkspaceBindingSpec {
    /// Name of the AnalyticsWorkspace in the same namespace
    pub workspace: String,

    /// Username the binding belongs to, exactly as the user logs in
    #[serde(default)]
    pub username: String,

    /// Desired replica count (0 = inactive, 1 = active)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Optional human-readable comment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

/// Observed state written by the workspace controller
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsWorkspaceBindingStatus {
    /// Replicas currently running
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Free-text status message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AnalyticsWorkspaceBinding {
    /// Namespace, empty when the object was built without one
    pub fn namespace_or_default(&self) -> String {
        self.namespace().unwrap_or_default()
    }

    /// (namespace, name) identity used for deduplication
    pub fn identity(&self) -> (String, String) {
        (self.namespace_or_default(), self.name_any())
    }

    /// Value of the username label, if the binding carries one
    pub fn username_label(&self) -> Option<&str> {
        self.labels().get(USERNAME_LABEL).map(String::as_str)
    }

    /// Desired replica count, treating unset as 0
    pub fn desired_replicas(&self) -> i32 {
        self.spec.replicas.unwrap_or(0)
    }

    /// Replica count last observed by the controller
    pub fn observed_replicas(&self) -> Option<i32> {
        self.status.as_ref().and_then(|s| s.replicas)
    }
}
