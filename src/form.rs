//! Model of the workspace selection challenge
//!
//! The host renders the template; this is the data handed to it.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::resolver::BoundWorkspace;
use crate::{Error, Result};

/// Template the host renders for the challenge
pub const CHALLENGE_TEMPLATE: &str = "update-workspace.ftl";

/// An error attached to one form field
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Form field name
    pub field: String,
    /// Message key
    pub message: String,
}

/// Attributes for the selection form
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WorkspaceChallenge {
    /// User the form is for
    pub username: String,
    /// `"<workspace>:<binding>"` -> display name
    pub available_workspaces: BTreeMap<String, String>,
    /// Currently assigned workspace, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_name: Option<String>,
    /// Field errors from a rejected submission
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

impl WorkspaceChallenge {
    /// Build the form from resolved workspaces
    pub fn new(
        username: impl Into<String>,
        bound: &[BoundWorkspace],
        current_workspace: Option<String>,
    ) -> Self {
        let available_workspaces = bound
            .iter()
            .map(|b| (b.selection_key(), b.display_name()))
            .collect();
        Self {
            username: username.into(),
            available_workspaces,
            workspace_name: current_workspace,
            errors: Vec::new(),
        }
    }

    /// Attach a field error
    pub fn with_error(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
        self
    }

    /// Template the host renders this challenge with
    pub fn template(&self) -> &'static str {
        CHALLENGE_TEMPLATE
    }

    /// The `available_workspaces` attribute as the JSON object the template reads
    pub fn available_workspaces_json(&self) -> Result<String> {
        serde_json::to_string(&self.available_workspaces)
            .map_err(|e| Error::serialization(e.to_string()))
    }
}
