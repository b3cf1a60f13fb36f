//! Binding discovery
//!
//! Bindings reach a user in two ways. Provisioners that label their
//! bindings are found with a server-side label query on the username
//! label-token. Bindings without the label are listed and filtered here on
//! `spec.username`. The two result sets are merged without duplicates.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::client::{LabelSelector, WorkspaceClient};
use crate::crd::{AnalyticsWorkspaceBinding, USERNAME_LABEL};
use crate::Result;

/// Replacement for each run of characters not allowed in the label token
const LABEL_TOKEN_SEPARATOR: &str = "___";

/// Convert a username into the value stored in the username label.
///
/// Every maximal run of characters outside `[0-9a-z.]` becomes `___`.
/// Distinct usernames can map to the same token (`Alice` and `Blice` both
/// become `___lice`); existing labeled bindings depend on this exact form.
pub fn username_label_token(username: &str) -> String {
    let mut token = String::with_capacity(username.len());
    let mut in_run = false;
    for c in username.chars() {
        if c.is_ascii_digit() || c.is_ascii_lowercase() || c == '.' {
            token.push(c);
            in_run = false;
        } else if !in_run {
            token.push_str(LABEL_TOKEN_SEPARATOR);
            in_run = true;
        }
    }
    token
}

/// Resolves every binding that belongs to a user
#[derive(Clone)]
pub struct BindingDiscovery {
    client: Arc<dyn WorkspaceClient>,
}

impl BindingDiscovery {
    /// Create a discovery over the given client
    pub fn new(client: Arc<dyn WorkspaceClient>) -> Self {
        Self { client }
    }

    /// All bindings for `username`, deduplicated by (namespace, name).
    ///
    /// Labeled matches come first, in server order, followed by unlabeled
    /// bindings whose `spec.username` equals `username` exactly.
    #[instrument(skip(self))]
    pub async fn find_all_bindings_for_user(
        &self,
        username: &str,
    ) -> Result<Vec<AnalyticsWorkspaceBinding>> {
        let token = username_label_token(username);
        debug!(label = %token, "fetching workspace bindings with username label");
        let labeled = self
            .client
            .list_bindings(&LabelSelector::equals(USERNAME_LABEL, token))
            .await?;

        debug!("fetching workspace bindings without username label");
        let unlabeled = self
            .client
            .list_bindings(&LabelSelector::absent(USERNAME_LABEL))
            .await?
            .into_iter()
            .filter(|b| b.spec.username == username);

        let mut seen = HashSet::new();
        let bindings: Vec<_> = labeled
            .into_iter()
            .chain(unlabeled)
            .filter(|b| seen.insert(b.identity()))
            .collect();

        info!(count = bindings.len(), "found workspace bindings");
        Ok(bindings)
    }
}
