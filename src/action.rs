//! Workspace required action
//!
//! The entry point the host authentication engine drives. It exposes the
//! three hooks of a required-action provider:
//!
//! - [`WorkspaceRequiredAction::evaluate_triggers`] on every pass
//! - [`WorkspaceRequiredAction::required_action_challenge`] when the action is pending
//! - [`WorkspaceRequiredAction::process_action`] when the user submits the form
//!
//! Errors other than validation errors are for the host to log; their text
//! must not be shown to the user.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::client::WorkspaceClient;
use crate::config::GateConfig;
use crate::discovery::BindingDiscovery;
use crate::enforcer::ActiveBindingEnforcer;
use crate::form::WorkspaceChallenge;
use crate::host::{AuthenticationSession, UserModel};
use crate::resolver::WorkspaceResolver;
use crate::selection::SelectionProcessor;
use crate::state::{UserWorkspaceState, WORKSPACE_NAME};
use crate::trigger::{TriggerEvaluator, TriggerOutcome};
use crate::{Error, Result, PROVIDER_ID};

/// Text the host shows for this action in account consoles
pub const DISPLAY_TEXT: &str = "Select workspace";

/// Result of processing a submission
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionResult {
    /// Selection applied; the host can complete authentication
    Success(UserWorkspaceState),
    /// Selection rejected; the host must present this challenge again
    Challenge(WorkspaceChallenge),
}

/// Required-action provider gating authentication on workspace selection
pub struct WorkspaceRequiredAction {
    discovery: BindingDiscovery,
    resolver: WorkspaceResolver,
    trigger: TriggerEvaluator,
    processor: SelectionProcessor,
}

impl WorkspaceRequiredAction {
    /// Wire every component to one client
    pub fn new(client: Arc<dyn WorkspaceClient>, config: &GateConfig) -> Self {
        let discovery = BindingDiscovery::new(client.clone());
        let enforcer = Arc::new(ActiveBindingEnforcer::new(client.clone(), config));
        Self {
            resolver: WorkspaceResolver::new(client),
            trigger: TriggerEvaluator::new(enforcer.clone(), config.interactive_client.clone()),
            processor: SelectionProcessor::new(discovery.clone(), enforcer),
            discovery,
        }
    }

    /// Provider id used to add and remove the pending action
    pub fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    /// Human-readable name of the action
    pub fn display_text(&self) -> &'static str {
        DISPLAY_TEXT
    }

    /// Decide whether the user must select a workspace on this pass
    pub async fn evaluate_triggers(
        &self,
        user: &mut dyn UserModel,
        session: &dyn AuthenticationSession,
    ) -> Result<TriggerOutcome> {
        self.trigger.evaluate(user, session).await
    }

    /// Build the selection form for the user
    #[instrument(skip_all, fields(username = %user.username()))]
    pub async fn required_action_challenge(
        &self,
        user: &dyn UserModel,
    ) -> Result<WorkspaceChallenge> {
        let username = user.username();
        let bindings = self.discovery.find_all_bindings_for_user(username).await?;
        let bound = self.resolver.resolve_workspaces(&bindings).await?;
        let challenge =
            WorkspaceChallenge::new(username, &bound, user.first_attribute(WORKSPACE_NAME));
        debug!(
            available = bound.len(),
            template = challenge.template(),
            "built workspace challenge"
        );
        Ok(challenge)
    }

    /// Handle a submitted form value (`workspace_name` field)
    pub async fn process_action(
        &self,
        submitted: Option<&str>,
        user: &mut dyn UserModel,
        session: &mut dyn AuthenticationSession,
    ) -> Result<ActionResult> {
        let raw = submitted.unwrap_or_default();
        match self.processor.submit(raw, user, session).await {
            Ok(state) => Ok(ActionResult::Success(state)),
            Err(Error::Validation { field, message }) => {
                let challenge = self.required_action_challenge(user).await?;
                Ok(ActionResult::Challenge(challenge.with_error(field, message)))
            }
            Err(e) => Err(e),
        }
    }
}
