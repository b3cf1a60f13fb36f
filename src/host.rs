//! Seam to the host authentication engine
//!
//! The host owns users, their persisted attributes and the in-flight
//! authentication session. The gate only needs the handful of operations
//! below, so hosts adapt their own models to these traits.

use std::collections::{BTreeMap, BTreeSet};

/// The user being authenticated
pub trait UserModel: Send + Sync {
    /// Login name, exactly as typed by the user
    fn username(&self) -> &str;

    /// First value of a persisted attribute
    fn first_attribute(&self, key: &str) -> Option<String>;

    /// Replace all values of a persisted attribute with one value
    fn set_single_attribute(&mut self, key: &str, value: &str);

    /// Mark a required action as pending for the user
    fn add_required_action(&mut self, action: &str);

    /// Clear a pending required action from the user
    fn remove_required_action(&mut self, action: &str);
}

/// The in-flight authentication session
pub trait AuthenticationSession: Send + Sync {
    /// Id of the top-level (parent) authentication session
    fn parent_session_id(&self) -> &str;

    /// Name of the client the user is logging into
    fn client_name(&self) -> &str;

    /// Clear a pending required action from this session
    fn remove_required_action(&mut self, action: &str);

    /// Attach a detail to the session's audit event
    fn event_detail(&mut self, key: &str, value: &str);
}

/// In-memory user, for hosts without persistent storage and for tests
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InMemoryUser {
    /// Login name
    pub username: String,
    /// Persisted attributes
    pub attributes: BTreeMap<String, String>,
    /// Pending required actions
    pub required_actions: BTreeSet<String>,
}

impl InMemoryUser {
    /// Create a user with no attributes
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Default::default()
        }
    }

    /// Add an attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

impl UserModel for InMemoryUser {
    fn username(&self) -> &str {
        &self.username
    }

    fn first_attribute(&self, key: &str) -> Option<String> {
        self.attributes.get(key).cloned()
    }

    fn set_single_attribute(&mut self, key: &str, value: &str) {
        self.attributes.insert(key.to_string(), value.to_string());
    }

    fn add_required_action(&mut self, action: &str) {
        self.required_actions.insert(action.to_string());
    }

    fn remove_required_action(&mut self, action: &str) {
        self.required_actions.remove(action);
    }
}

/// In-memory authentication session
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InMemorySession {
    /// Parent session id
    pub parent_session_id: String,
    /// Client being logged into
    pub client_name: String,
    /// Pending required actions on this session
    pub required_actions: BTreeSet<String>,
    /// Audit event details
    pub event_details: BTreeMap<String, String>,
}

impl InMemorySession {
    /// Create a session for the given parent id and client
    pub fn new(parent_session_id: impl Into<String>, client_name: impl Into<String>) -> Self {
        Self {
            parent_session_id: parent_session_id.into(),
            client_name: client_name.into(),
            ..Default::default()
        }
    }

    /// Mark a required action as pending on this session
    pub fn with_required_action(mut self, action: impl Into<String>) -> Self {
        self.required_actions.insert(action.into());
        self
    }
}

impl AuthenticationSession for InMemorySession {
    fn parent_session_id(&self) -> &str {
        &self.parent_session_id
    }

    fn client_name(&self) -> &str {
        &self.client_name
    }

    fn remove_required_action(&mut self, action: &str) {
        self.required_actions.remove(action);
    }

    fn event_detail(&mut self, key: &str, value: &str) {
        self.event_details.insert(key.to_string(), value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_single_attribute_overwrites() {
        let mut user = InMemoryUser::new("alice").with_attribute("workspace_name", "old");
        user.set_single_attribute("workspace_name", "new");
        assert_eq!(user.first_attribute("workspace_name").as_deref(), Some("new"));
        assert_eq!(user.first_attribute("missing"), None);
    }

    #[test]
    fn required_actions_are_a_set() {
        let mut user = InMemoryUser::new("alice");
        user.add_required_action("workspace");
        user.add_required_action("workspace");
        assert_eq!(user.required_actions.len(), 1);
        user.remove_required_action("workspace");
        assert!(user.required_actions.is_empty());
    }
}
