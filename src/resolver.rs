//! Workspace resolution for discovered bindings

use std::collections::HashSet;
use std::sync::Arc;

use kube::ResourceExt;
use tracing::{debug, instrument, warn};

use crate::client::WorkspaceClient;
use crate::crd::{AnalyticsWorkspace, AnalyticsWorkspaceBinding};
use crate::Result;

/// A workspace paired with the binding that grants the user access to it
#[derive(Clone, Debug)]
pub struct BoundWorkspace {
    /// The workspace
    pub workspace: AnalyticsWorkspace,
    /// The first binding found for it
    pub binding: AnalyticsWorkspaceBinding,
}

impl BoundWorkspace {
    /// Form value identifying this pair: `<workspace>:<binding>`
    pub fn selection_key(&self) -> String {
        format!("{}:{}", self.workspace.name_any(), self.binding.name_any())
    }

    /// Label shown to the user
    pub fn display_name(&self) -> String {
        self.workspace.display_name()
    }
}

/// Maps bindings to their workspaces
#[derive(Clone)]
pub struct WorkspaceResolver {
    client: Arc<dyn WorkspaceClient>,
}

impl WorkspaceResolver {
    /// Create a resolver over the given client
    pub fn new(client: Arc<dyn WorkspaceClient>) -> Self {
        Self { client }
    }

    /// Pair each distinct workspace with the first binding that references it.
    ///
    /// Workspaces are looked up in the binding's namespace. A workspace that
    /// no longer exists drops its entry instead of failing the whole list.
    #[instrument(skip_all, fields(bindings = bindings.len()))]
    pub async fn resolve_workspaces(
        &self,
        bindings: &[AnalyticsWorkspaceBinding],
    ) -> Result<Vec<BoundWorkspace>> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut resolved = Vec::new();

        for binding in bindings {
            let workspace_name = binding.spec.workspace.as_str();
            if seen.contains(workspace_name) {
                debug!(
                    workspace = %workspace_name,
                    binding = %binding.name_any(),
                    "workspace already paired, skipping binding"
                );
                continue;
            }

            let namespace = binding.namespace_or_default();
            match self.client.get_workspace(&namespace, workspace_name).await? {
                Some(workspace) => {
                    debug!(workspace = %workspace_name, binding = %binding.name_any(), "found workspace");
                    seen.insert(workspace_name);
                    resolved.push(BoundWorkspace {
                        workspace,
                        binding: binding.clone(),
                    });
                }
                None => {
                    warn!(
                        workspace = %workspace_name,
                        namespace = %namespace,
                        binding = %binding.name_any(),
                        "binding references a missing workspace, dropping it"
                    );
                }
            }
        }

        Ok(resolved)
    }
}
