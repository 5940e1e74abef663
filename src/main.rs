//! review-env - review environments for GitLab merge requests

use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Args, FromArgMatches, Parser, Subcommand};
use futures::StreamExt;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, CustomResourceExt};

use review_env::client::{KubeClient, KubeClientImpl};
use review_env::controller::{error_policy, reconcile, Context};
use review_env::crd::MergeRequest;
use review_env::resources::{
    EnvironmentConfig, RecordTemplate, DEFAULT_GITLAB_BASE_URL, DEFAULT_RECORD_MANIFEST_PATH,
    DEFAULT_RECORD_NAMESPACE,
};
use review_env::telemetry::{init_tracing, LogFormat, TelemetryConfig};
use review_env::webhook::{webhook_router, WebhookState};

/// review-env - per-merge-request review environments on Argo CD and Istio
#[derive(Parser, Debug)]
#[command(name = "review-env", version, about, long_about = None)]
struct Cli {
    /// Generate the MergeRequest CRD manifest and exit
    #[arg(long)]
    crd: bool,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Json, global = true)]
    log_format: LogFormat,

    /// Log level for review-env itself; RUST_LOG takes precedence
    #[arg(long, env = "LOG_LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the MergeRequest CRD manifest
    Crd,

    /// Reconcile MergeRequest records into review environments
    Controller(ControllerArgs),

    /// Serve the GitLab merge request webhook
    Webhook(WebhookArgs),

    /// Run the controller and the webhook in one process
    Run {
        #[command(flatten)]
        controller: ControllerArgs,
        #[command(flatten)]
        webhook: WebhookArgs,
    },
}

/// Controller mode arguments
#[derive(Args, Debug, Clone)]
struct ControllerArgs {
    /// Namespace Argo CD watches for Applications
    #[arg(long, env = "ARGOCD_NAMESPACE", default_value = "argocd")]
    control_namespace: String,

    /// Istio gateway the VirtualServices bind to
    #[arg(long, default_value = "application-gateway")]
    gateway: String,

    /// Port of the review Service each route targets
    #[arg(long, default_value_t = 8080)]
    service_port: u16,

    /// Cluster API server the Applications deploy to
    #[arg(long, default_value = "https://kubernetes.default.svc")]
    destination_server: String,

    /// Argo CD project owning the Applications
    #[arg(long, default_value = "default")]
    argocd_project: String,
}

impl ControllerArgs {
    /// Arguments for running without a subcommand: defaults plus environment
    fn from_env() -> anyhow::Result<Self> {
        let command = Self::augment_args(clap::Command::new("controller"));
        let matches = command.try_get_matches_from(["controller"])?;
        Ok(Self::from_arg_matches(&matches)?)
    }

    fn environment(&self) -> EnvironmentConfig {
        EnvironmentConfig {
            control_namespace: self.control_namespace.clone(),
            destination_server: self.destination_server.clone(),
            argocd_project: self.argocd_project.clone(),
            gateway: self.gateway.clone(),
            service_port: self.service_port,
        }
    }
}

/// Webhook mode arguments
#[derive(Args, Debug, Clone)]
struct WebhookArgs {
    /// Address the webhook server listens on
    #[arg(long, default_value = review_env::DEFAULT_WEBHOOK_LISTEN)]
    listen: SocketAddr,

    /// Secret expected in the X-Gitlab-Token header
    #[arg(long, env = "WEBHOOK_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Namespace MergeRequest records are written to
    #[arg(long, env = "RECORD_NAMESPACE", default_value = DEFAULT_RECORD_NAMESPACE)]
    record_namespace: String,

    /// GitLab base URL Argo CD clones from
    #[arg(long, env = "GITLAB_BASE_URL", default_value = DEFAULT_GITLAB_BASE_URL)]
    base_url: String,

    /// Manifest path stamped on created records
    #[arg(long, default_value = DEFAULT_RECORD_MANIFEST_PATH)]
    manifest_path: String,
}

impl WebhookArgs {
    fn template(&self) -> RecordTemplate {
        RecordTemplate {
            namespace: self.record_namespace.clone(),
            base_url: self.base_url.clone(),
            manifest_path: Some(self.manifest_path.clone()).filter(|p| !p.is_empty()),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd || matches!(cli.command, Some(Commands::Crd)) {
        let crd = serde_yaml::to_string(&MergeRequest::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    init_tracing(TelemetryConfig {
        format: cli.log_format,
        level: cli.log_level.clone(),
        ..Default::default()
    })?;

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;
    let kube: Arc<dyn KubeClient> = Arc::new(KubeClientImpl::new(client.clone()));

    match cli.command {
        Some(Commands::Webhook(args)) => run_webhook(kube, args).await,
        Some(Commands::Run {
            controller,
            webhook,
        }) => {
            tokio::select! {
                result = run_controller(client, kube.clone(), controller) => result,
                result = run_webhook(kube, webhook) => result,
            }
        }
        Some(Commands::Controller(args)) => run_controller(client, kube, args).await,
        Some(Commands::Crd) => Ok(()),
        None => run_controller(client, kube, ControllerArgs::from_env()?).await,
    }
}

/// Ensure the MergeRequest CRD is installed
///
/// The controller installs its own CRD on startup using server-side apply so
/// the schema always matches the running version.
async fn ensure_crds_installed(client: &Client) -> anyhow::Result<()> {
    use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
    use kube::api::{Patch, PatchParams};

    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(review_env::CRD_FIELD_MANAGER).force();

    tracing::info!("Installing MergeRequest CRD...");
    crds.patch(
        "mergerequests.review.nautible.com",
        &params,
        &Patch::Apply(&MergeRequest::crd()),
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to install MergeRequest CRD: {}", e))?;

    tracing::info!("MergeRequest CRD installed/updated");
    Ok(())
}

/// Run the MergeRequest controller until shutdown
async fn run_controller(
    client: Client,
    kube: Arc<dyn KubeClient>,
    args: ControllerArgs,
) -> anyhow::Result<()> {
    ensure_crds_installed(&client).await?;

    let records: Api<MergeRequest> = Api::all(client);
    let ctx = Arc::new(Context::new(kube, args.environment()));

    tracing::info!(
        control_namespace = %args.control_namespace,
        gateway = %args.gateway,
        "Starting MergeRequest controller..."
    );

    Controller::new(records, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok(action) => {
                    tracing::debug!(?action, "MergeRequest reconciliation completed");
                }
                Err(e) => {
                    tracing::error!(error = ?e, "MergeRequest reconciliation error");
                }
            }
        })
        .await;

    tracing::info!("MergeRequest controller stopped");
    Ok(())
}

/// Serve the webhook until shutdown
async fn run_webhook(kube: Arc<dyn KubeClient>, args: WebhookArgs) -> anyhow::Result<()> {
    if args.token.as_deref().map_or(true, str::is_empty) {
        tracing::warn!("WEBHOOK_TOKEN is not set, every webhook request will be refused");
    }

    let state = Arc::new(WebhookState::new(kube, args.token.clone(), args.template()));
    let router = webhook_router(state);

    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", args.listen, e))?;
    tracing::info!(listen = %args.listen, "Webhook server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Webhook server error: {}", e))?;

    tracing::info!("Webhook server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
