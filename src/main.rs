//! workspace-gate - inspect and drive workspace bindings from the command line

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use kube::{CustomResourceExt, ResourceExt};

use workspace_gate::client::{KubeWorkspaceClient, WorkspaceClient};
use workspace_gate::config::{GateConfig, DEFAULT_INTERACTIVE_CLIENT};
use workspace_gate::crd::{AnalyticsWorkspace, AnalyticsWorkspaceBinding};
use workspace_gate::discovery::BindingDiscovery;
use workspace_gate::enforcer::ActiveBindingEnforcer;
use workspace_gate::form::WorkspaceChallenge;
use workspace_gate::resolver::WorkspaceResolver;
use workspace_gate::retry::RetryConfig;
use workspace_gate::telemetry::{init_logging, LogFormat};

/// workspace-gate - workspace selection for analytics workspace bindings
#[derive(Parser, Debug)]
#[command(name = "workspace-gate", version, about, long_about = None)]
struct Cli {
    /// Namespace holding workspaces and bindings (all namespaces when unset)
    #[arg(long, global = true, env = "WORKSPACE_GATE_NAMESPACE")]
    namespace: Option<String>,

    /// Client whose new sessions force a fresh selection
    #[arg(long, global = true, env = "WORKSPACE_GATE_INTERACTIVE_CLIENT", default_value = DEFAULT_INTERACTIVE_CLIENT)]
    interactive_client: String,

    /// Timeout for each call to the API server, in seconds
    #[arg(long, global = true, env = "WORKSPACE_GATE_CALL_TIMEOUT_SECS", default_value = "10")]
    call_timeout_secs: u64,

    /// Attempts per binding patch before giving up on it
    #[arg(long, global = true, env = "WORKSPACE_GATE_PATCH_ATTEMPTS", default_value = "3")]
    patch_attempts: u32,

    /// How long to wait for the active binding to report ready, in milliseconds (0 disables)
    #[arg(long, global = true, env = "WORKSPACE_GATE_SETTLE_TIMEOUT_MS", default_value = "3000")]
    settle_timeout_ms: u64,

    /// Interval between readiness checks, in milliseconds
    #[arg(long, global = true, env = "WORKSPACE_GATE_SETTLE_POLL_MS", default_value = "500")]
    settle_poll_ms: u64,

    /// Log output format
    #[arg(long, global = true, env = "WORKSPACE_GATE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the CRD manifests for both resource kinds
    Crd,

    /// List every binding discovered for a user
    Bindings {
        /// Username exactly as the user logs in
        username: String,
    },

    /// Print the selection form data for a user
    Workspaces {
        /// Username exactly as the user logs in
        username: String,
    },

    /// Make one binding the user's only active binding
    Activate {
        /// Username exactly as the user logs in
        username: String,
        /// Binding to activate
        binding: String,
        /// Wait for the binding to report ready
        #[arg(long)]
        wait: bool,
    },
}

impl Cli {
    fn gate_config(&self) -> GateConfig {
        GateConfig {
            namespace: self.namespace.clone(),
            interactive_client: self.interactive_client.clone(),
            call_timeout: Duration::from_secs(self.call_timeout_secs),
            patch_retry: RetryConfig::with_max_attempts(self.patch_attempts),
            settle_poll_interval: Duration::from_millis(self.settle_poll_ms),
            settle_timeout: Duration::from_millis(self.settle_timeout_ms),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format)?;

    if let Commands::Crd = cli.command {
        let workspace = serde_yaml::to_string(&AnalyticsWorkspace::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        let binding = serde_yaml::to_string(&AnalyticsWorkspaceBinding::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{workspace}---\n{binding}");
        return Ok(());
    }

    let config = cli.gate_config();
    config.validate()?;
    let client: Arc<dyn WorkspaceClient> = Arc::new(KubeWorkspaceClient::try_default(&config).await?);
    let discovery = BindingDiscovery::new(client.clone());

    match cli.command {
        Commands::Crd => Ok(()),
        Commands::Bindings { username } => {
            for binding in discovery.find_all_bindings_for_user(&username).await? {
                println!(
                    "{}/{}\tworkspace={}\treplicas={}\tready={}",
                    binding.namespace_or_default(),
                    binding.name_any(),
                    binding.spec.workspace,
                    binding.desired_replicas(),
                    binding
                        .observed_replicas()
                        .map_or_else(|| "-".to_string(), |r| r.to_string()),
                );
            }
            Ok(())
        }
        Commands::Workspaces { username } => {
            let bindings = discovery.find_all_bindings_for_user(&username).await?;
            let bound = WorkspaceResolver::new(client).resolve_workspaces(&bindings).await?;
            let challenge = WorkspaceChallenge::new(username, &bound, None);
            println!("{}", serde_json::to_string_pretty(&challenge)?);
            Ok(())
        }
        Commands::Activate {
            username,
            binding,
            wait,
        } => {
            if wait && !config.settle_enabled() {
                anyhow::bail!("--wait needs a non-zero settle timeout");
            }
            let enforcer = ActiveBindingEnforcer::new(client, &config);
            let report = enforcer.set_active(&binding, &username).await?;
            println!(
                "activated {}/{} (workspace {}), deactivated {}",
                report.namespace,
                report.binding,
                report.workspace,
                report.deactivated.len()
            );
            if wait && !enforcer.wait_until_settled(&report).await {
                anyhow::bail!("binding {} did not report ready in time", report.binding);
            }
            Ok(())
        }
    }
}
