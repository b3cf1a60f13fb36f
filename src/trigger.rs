//! Trigger evaluation
//!
//! Runs on every authentication pass and decides whether the user has to
//! pick a workspace. The state is derived from the user's attributes and the
//! current session each time; nothing else is persisted.
//!
//! ```text
//! Unassigned    -> ChallengeRequired
//! SessionStale  -> ChallengeRequired
//! Consistent    -> ReassertActive   (binding gone -> ChallengeRequired)
//! ```

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::enforcer::ActiveBindingEnforcer;
use crate::host::{AuthenticationSession, UserModel};
use crate::state::{missing_attributes, UserWorkspaceState};
use crate::{Error, Result, PROVIDER_ID};

/// Where a user stands at the start of a pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TriggerState {
    /// At least one assignment attribute is missing
    Unassigned {
        /// The missing attribute keys
        missing: Vec<&'static str>,
    },
    /// Interactive client session differs from the one the workspace was picked in
    SessionStale {
        /// The stored assignment
        state: UserWorkspaceState,
    },
    /// Assignment is complete and current
    Consistent {
        /// The stored assignment
        state: UserWorkspaceState,
    },
}

/// Why a challenge is needed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChallengeReason {
    /// No complete assignment
    Unassigned,
    /// New session on the interactive client
    SessionStale,
    /// The assigned binding is no longer bound to the user
    BindingMissing,
}

/// What the pass ends with
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The required action was added; the host must present the challenge
    ChallengeRequired(ChallengeReason),
    /// The stored binding was re-asserted; authentication continues
    ReassertActive {
        /// Binding that is active
        binding: String,
    },
}

/// Classify the user from their attributes and the current session
pub fn classify(
    user: &dyn UserModel,
    session: &dyn AuthenticationSession,
    interactive_client: &str,
) -> TriggerState {
    let Some(state) = UserWorkspaceState::from_user(user) else {
        return TriggerState::Unassigned {
            missing: missing_attributes(user),
        };
    };

    if session.client_name() == interactive_client
        && state.assigned_session != session.parent_session_id()
    {
        return TriggerState::SessionStale { state };
    }

    TriggerState::Consistent { state }
}

/// Evaluates triggers and re-asserts the active binding when nothing changed
pub struct TriggerEvaluator {
    enforcer: Arc<ActiveBindingEnforcer>,
    interactive_client: String,
}

impl TriggerEvaluator {
    /// Create an evaluator
    pub fn new(enforcer: Arc<ActiveBindingEnforcer>, interactive_client: impl Into<String>) -> Self {
        Self {
            enforcer,
            interactive_client: interactive_client.into(),
        }
    }

    /// Run one pass for `user`.
    ///
    /// Whenever a challenge is needed the required action is added to the
    /// user. Remote failures while re-asserting also leave the action
    /// pending and are returned so the host aborts the pass.
    #[instrument(skip_all, fields(username = %user.username(), client = %session.client_name()))]
    pub async fn evaluate(
        &self,
        user: &mut dyn UserModel,
        session: &dyn AuthenticationSession,
    ) -> Result<TriggerOutcome> {
        let state = match classify(user, session, &self.interactive_client) {
            TriggerState::Unassigned { missing } => {
                info!(missing = ?missing, "workspace not assigned, requiring selection");
                user.add_required_action(PROVIDER_ID);
                return Ok(TriggerOutcome::ChallengeRequired(ChallengeReason::Unassigned));
            }
            TriggerState::SessionStale { state } => {
                info!(
                    assigned_session = %state.assigned_session,
                    "new interactive session, requiring workspace selection"
                );
                user.add_required_action(PROVIDER_ID);
                return Ok(TriggerOutcome::ChallengeRequired(ChallengeReason::SessionStale));
            }
            TriggerState::Consistent { state } => state,
        };

        let username = user.username().to_string();
        match self.enforcer.set_active(&state.binding, &username).await {
            Ok(report) => Ok(TriggerOutcome::ReassertActive {
                binding: report.binding,
            }),
            Err(Error::ConsistencyFault { binding, .. }) => {
                warn!(binding = %binding, "assigned binding no longer exists, requiring selection");
                user.add_required_action(PROVIDER_ID);
                Ok(TriggerOutcome::ChallengeRequired(ChallengeReason::BindingMissing))
            }
            Err(e) => {
                error!(binding = %state.binding, error = %e, "failed to re-assert active workspace binding");
                user.add_required_action(PROVIDER_ID);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GateConfig;
    use crate::host::{InMemorySession, InMemoryUser};
    use crate::state::REQUIRED_ATTRIBUTES;
    use crate::testing::{labeled_binding, FakeStore};

    const SESSION: &str = "parent-session-1";

    fn assigned_user(binding: &str, session: &str) -> InMemoryUser {
        let mut user = InMemoryUser::new("alice");
        UserWorkspaceState::assign("ws-one", binding, "alice", session).write_to(&mut user);
        user
    }

    fn store() -> Arc<FakeStore> {
        Arc::new(
            FakeStore::new()
                .with_binding(labeled_binding("b1", "ws-one", "alice", "alice"))
                .with_binding(labeled_binding("b2", "ws-two", "alice", "alice")),
        )
    }

    fn evaluator(store: Arc<FakeStore>) -> TriggerEvaluator {
        let config = GateConfig::default();
        let enforcer = Arc::new(ActiveBindingEnforcer::new(store, &config));
        TriggerEvaluator::new(enforcer, config.interactive_client)
    }

    #[test]
    fn any_missing_attribute_is_unassigned() {
        let session = InMemorySession::new(SESSION, "portal");
        for key in REQUIRED_ATTRIBUTES {
            let mut user = assigned_user("b1", SESSION);
            user.attributes.remove(key);
            assert_eq!(
                classify(&user, &session, "guacamole"),
                TriggerState::Unassigned { missing: vec![key] }
            );
        }
    }

    #[test]
    fn stale_session_only_matters_for_interactive_client() {
        let user = assigned_user("b1", "old-session");

        let portal = InMemorySession::new(SESSION, "portal");
        assert!(matches!(
            classify(&user, &portal, "guacamole"),
            TriggerState::Consistent { .. }
        ));

        let guacamole = InMemorySession::new(SESSION, "guacamole");
        assert!(matches!(
            classify(&user, &guacamole, "guacamole"),
            TriggerState::SessionStale { .. }
        ));
    }

    #[test]
    fn matching_session_on_interactive_client_is_consistent() {
        let user = assigned_user("b1", SESSION);
        let session = InMemorySession::new(SESSION, "guacamole");
        assert!(matches!(
            classify(&user, &session, "guacamole"),
            TriggerState::Consistent { .. }
        ));
    }

    #[tokio::test]
    async fn unassigned_user_gets_challenge() {
        let store = store();
        let mut user = InMemoryUser::new("alice");
        let session = InMemorySession::new(SESSION, "portal");

        let outcome = evaluator(store.clone())
            .evaluate(&mut user, &session)
            .await
            .expect("evaluate");

        assert_eq!(
            outcome,
            TriggerOutcome::ChallengeRequired(ChallengeReason::Unassigned)
        );
        assert!(user.required_actions.contains(PROVIDER_ID));
        assert!(store.patch_log().is_empty());
    }

    #[tokio::test]
    async fn stale_interactive_session_gets_challenge_without_patching() {
        let store = store();
        let mut user = assigned_user("b1", "old-session");
        let session = InMemorySession::new(SESSION, "guacamole");

        let outcome = evaluator(store.clone())
            .evaluate(&mut user, &session)
            .await
            .expect("evaluate");

        assert_eq!(
            outcome,
            TriggerOutcome::ChallengeRequired(ChallengeReason::SessionStale)
        );
        assert!(user.required_actions.contains(PROVIDER_ID));
        assert!(store.patch_log().is_empty());
    }

    #[tokio::test]
    async fn consistent_user_reasserts_binding() {
        let store = store();
        let mut user = assigned_user("b2", SESSION);
        let session = InMemorySession::new(SESSION, "guacamole");

        let outcome = evaluator(store.clone())
            .evaluate(&mut user, &session)
            .await
            .expect("evaluate");

        assert_eq!(
            outcome,
            TriggerOutcome::ReassertActive {
                binding: "b2".to_string()
            }
        );
        assert!(user.required_actions.is_empty());
        assert_eq!(store.desired_replicas()["b2"], 1);
        assert_eq!(store.desired_replicas()["b1"], 0);
    }

    #[tokio::test]
    async fn deleted_binding_forces_reselection() {
        let store = store();
        store.remove_binding("b1");
        let mut user = assigned_user("b1", SESSION);
        let session = InMemorySession::new(SESSION, "portal");

        let outcome = evaluator(store.clone())
            .evaluate(&mut user, &session)
            .await
            .expect("evaluate");

        assert_eq!(
            outcome,
            TriggerOutcome::ChallengeRequired(ChallengeReason::BindingMissing)
        );
        assert!(user.required_actions.contains(PROVIDER_ID));
        assert!(store.patch_log().is_empty());
    }

    #[tokio::test]
    async fn transport_failure_aborts_pass_and_leaves_action_pending() {
        let store = store();
        store.fail_lists();
        let mut user = assigned_user("b1", SESSION);
        let session = InMemorySession::new(SESSION, "portal");

        let err = evaluator(store)
            .evaluate(&mut user, &session)
            .await
            .expect_err("should fail");

        assert!(matches!(err, Error::Transport { .. }));
        assert!(user.required_actions.contains(PROVIDER_ID));
    }
}
