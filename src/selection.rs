//! Workspace selection processing
//!
//! Turns the submitted form value into an assignment: validate, check the
//! binding really belongs to the user, persist the attributes, activate the
//! binding, then give the workspace controller a bounded window to catch up
//! before the user's next request.

use std::sync::Arc;

use kube::ResourceExt;
use tracing::{info, instrument, warn};

use crate::discovery::BindingDiscovery;
use crate::enforcer::ActiveBindingEnforcer;
use crate::host::{AuthenticationSession, UserModel};
use crate::state::{UserWorkspaceState, WORKSPACE_BINDING, WORKSPACE_ID, WORKSPACE_NAME};
use crate::{Error, Result, PROVIDER_ID};

/// Shortest accepted workspace name
pub const MIN_WORKSPACE_NAME_LEN: usize = 5;

/// Message key shown next to the workspace field on a bad selection
pub const WORKSPACE_NAME_INVALID: &str = "workspaceNameInvalid";

/// A parsed `<workspace>:<binding>` form value
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    /// Workspace component
    pub workspace_name: String,
    /// Binding component
    pub binding_name: String,
}

fn invalid_selection() -> Error {
    Error::validation(WORKSPACE_NAME, WORKSPACE_NAME_INVALID)
}

/// Parse and validate a raw selection.
///
/// Splits on the first `:`. The workspace component must be non-blank and
/// at least [`MIN_WORKSPACE_NAME_LEN`] characters; the binding component
/// must be non-blank.
pub fn parse_selection(raw: &str) -> Result<Selection> {
    let (workspace_name, binding_name) = raw.split_once(':').ok_or_else(invalid_selection)?;

    if workspace_name.trim().is_empty() || workspace_name.chars().count() < MIN_WORKSPACE_NAME_LEN
    {
        return Err(invalid_selection());
    }
    if binding_name.trim().is_empty() {
        return Err(invalid_selection());
    }

    Ok(Selection {
        workspace_name: workspace_name.to_string(),
        binding_name: binding_name.to_string(),
    })
}

/// Applies a user's workspace selection
pub struct SelectionProcessor {
    discovery: BindingDiscovery,
    enforcer: Arc<ActiveBindingEnforcer>,
}

impl SelectionProcessor {
    /// Create a processor
    pub fn new(discovery: BindingDiscovery, enforcer: Arc<ActiveBindingEnforcer>) -> Self {
        Self {
            discovery,
            enforcer,
        }
    }

    /// Apply `raw` for `user` in `session`.
    ///
    /// Validation failures (including a binding that is not the user's, or
    /// that points at another workspace) return `Validation` and change
    /// nothing. A binding deleted before it could be activated is also
    /// reported as `Validation` so the user picks again. After the attributes are written, a remote failure leaves
    /// the required action pending on the user so the next pass retries.
    #[instrument(skip_all, fields(username = %user.username()))]
    pub async fn submit(
        &self,
        raw: &str,
        user: &mut dyn UserModel,
        session: &mut dyn AuthenticationSession,
    ) -> Result<UserWorkspaceState> {
        let selection = parse_selection(raw)?;
        let username = user.username().to_string();

        let bindings = self.discovery.find_all_bindings_for_user(&username).await?;
        let owned = bindings.iter().any(|b| {
            b.name_any() == selection.binding_name && b.spec.workspace == selection.workspace_name
        });
        if !owned {
            warn!(
                workspace = %selection.workspace_name,
                binding = %selection.binding_name,
                "selected binding is not bound to the user for that workspace"
            );
            return Err(invalid_selection());
        }

        let state = UserWorkspaceState::assign(
            &selection.workspace_name,
            &selection.binding_name,
            &username,
            session.parent_session_id(),
        );
        state.write_to(user);

        session.event_detail(WORKSPACE_ID, &state.workspace_id);
        session.event_detail(WORKSPACE_NAME, &state.workspace_name);
        session.event_detail(WORKSPACE_BINDING, &state.binding);

        let report = self
            .enforcer
            .set_active(&selection.binding_name, &username)
            .await
            .map_err(|e| match e {
                // Deleted after the ownership check
                Error::ConsistencyFault { .. } => {
                    warn!(binding = %selection.binding_name, "selected binding disappeared");
                    invalid_selection()
                }
                other => other,
            })?;

        user.remove_required_action(PROVIDER_ID);
        session.remove_required_action(PROVIDER_ID);

        let settled = self.enforcer.wait_until_settled(&report).await;
        info!(
            workspace = %state.workspace_name,
            binding = %state.binding,
            settled,
            "workspace selected"
        );
        Ok(state)
    }
}
