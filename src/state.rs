//! Per-user workspace assignment stored in host attributes

use crate::host::UserModel;

/// Attribute holding the assigned binding name
pub const WORKSPACE_BINDING: &str = "workspace_binding";
/// Attribute holding the assigned workspace name; also the form field name
pub const WORKSPACE_NAME: &str = "workspace_name";
/// Attribute holding `<workspace>\<username>`
pub const WORKSPACE_ID: &str = "workspace_id";
/// Attribute holding `<workspace>@<username>`
pub const WORKSPACE_ID_FORMATTED: &str = "workspace_id_formatted";
/// Attribute holding the parent authentication session id at assignment time
pub const WORKSPACE_ASSIGNED_SESSION: &str = "workspace_assigned_session";

/// Every attribute that must be present for an assignment to count
pub const REQUIRED_ATTRIBUTES: [&str; 5] = [
    WORKSPACE_ASSIGNED_SESSION,
    WORKSPACE_NAME,
    WORKSPACE_ID,
    WORKSPACE_ID_FORMATTED,
    WORKSPACE_BINDING,
];

/// Domain-style identity: `<workspace>\<username>`
pub fn workspace_id(workspace_name: &str, username: &str) -> String {
    format!("{workspace_name}\\{username}")
}

/// Display identity: `<workspace>@<username>`
pub fn workspace_id_formatted(workspace_name: &str, username: &str) -> String {
    format!("{workspace_name}@{username}")
}

/// A complete workspace assignment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserWorkspaceState {
    /// Assigned binding name
    pub binding: String,
    /// Assigned workspace name
    pub workspace_name: String,
    /// `<workspace>\<username>`
    pub workspace_id: String,
    /// `<workspace>@<username>`
    pub workspace_id_formatted: String,
    /// Parent authentication session id the assignment was made in
    pub assigned_session: String,
}

impl UserWorkspaceState {
    /// Build a fresh assignment, deriving both identities
    pub fn assign(
        workspace_name: &str,
        binding: &str,
        username: &str,
        session_id: &str,
    ) -> Self {
        Self {
            binding: binding.to_string(),
            workspace_name: workspace_name.to_string(),
            workspace_id: workspace_id(workspace_name, username),
            workspace_id_formatted: workspace_id_formatted(workspace_name, username),
            assigned_session: session_id.to_string(),
        }
    }

    /// Read the assignment from the user; `None` unless all five attributes are set
    pub fn from_user(user: &dyn UserModel) -> Option<Self> {
        Some(Self {
            binding: user.first_attribute(WORKSPACE_BINDING)?,
            workspace_name: user.first_attribute(WORKSPACE_NAME)?,
            workspace_id: user.first_attribute(WORKSPACE_ID)?,
            workspace_id_formatted: user.first_attribute(WORKSPACE_ID_FORMATTED)?,
            assigned_session: user.first_attribute(WORKSPACE_ASSIGNED_SESSION)?,
        })
    }

    /// Overwrite the user's attributes with this assignment
    pub fn write_to(&self, user: &mut dyn UserModel) {
        user.set_single_attribute(WORKSPACE_BINDING, &self.binding);
        user.set_single_attribute(WORKSPACE_NAME, &self.workspace_name);
        user.set_single_attribute(WORKSPACE_ID, &self.workspace_id);
        user.set_single_attribute(WORKSPACE_ID_FORMATTED, &self.workspace_id_formatted);
        user.set_single_attribute(WORKSPACE_ASSIGNED_SESSION, &self.assigned_session);
    }
}

/// Required attributes the user does not have
pub fn missing_attributes(user: &dyn UserModel) -> Vec<&'static str> {
    REQUIRED_ATTRIBUTES
        .iter()
        .copied()
        .filter(|key| user.first_attribute(key).is_none())
        .collect()
}
