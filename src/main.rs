use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use podsession::config::ConfigError;
use podsession::identity::IdentityError;
use podsession::kubernetes::{ContextConnector, KubeConfig, KubeConfigError};
use podsession::session::{
    list_sessions, render_table, SessionOutcome, SessionOverrides, TerminalPrompter,
};
use podsession::{
    AppConfig, ContextRegistry, LocalIdentity, SessionController, SessionError, StartOptions,
};

/// Short-lived interactive pods cloned from Kubernetes workloads
#[derive(Parser, Debug)]
#[command(name = "podsession", version, about, long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/podsession/config.json)
    #[arg(short, long, global = true, env = "PODSESSION_CONFIG")]
    config: Option<PathBuf>,

    /// Kubeconfig file (default: $KUBECONFIG, then ~/.kube/config)
    #[arg(long, global = true, env = "PODSESSION_KUBECONFIG")]
    kubeconfig: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a session pod and attach to it
    Start {
        /// Context to run in
        context: String,

        /// Workload name prefix (default: current directory name)
        workload: Option<String>,

        /// Label selector used to filter workloads, like kubectl -l
        #[arg(short = 'l', long, env = "PODSESSION_SELECTOR")]
        selector: Option<String>,

        /// How long the pod may live after the heartbeat stops, e.g. 15m, 24h
        #[arg(long, env = "PODSESSION_TIMEOUT", value_parser = humantime::parse_duration)]
        timeout: Option<Duration>,

        /// Resource limits, also set as requests, e.g. 'cpu=200m,memory=512Mi'
        #[arg(long, env = "PODSESSION_LIMITS")]
        limits: Option<String>,

        /// Image replacing the workload's first container image
        #[arg(long, env = "PODSESSION_IMAGE")]
        image: Option<String>,

        /// Do not remove the pod when detaching
        #[arg(long)]
        no_rm: bool,

        /// Command replacing the container command
        #[arg(last = true)]
        command: Vec<String>,
    },
    /// List running session pods
    Ls {
        /// Context to list (required unless --all-contexts)
        #[arg(required_unless_present = "all_contexts")]
        context: Option<String>,

        /// List session pods in every context
        #[arg(short, long)]
        all_contexts: bool,

        /// Include everyone's session pods, not just this machine's
        #[arg(short, long)]
        everyone: bool,
    },
    /// Print context names, optionally filtered by prefix
    Contexts { prefix: Option<String> },
}

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    KubeConfig(#[from] KubeConfigError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl AppError {
    fn exit_code(&self) -> u8 {
        match self {
            Self::Session(e) => e.exit_code() as u8,
            _ => 1,
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("podsession=debug,kube=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // kube's TLS stack needs a process-wide crypto provider
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(AppError::Session(SessionError::Cancelled)) => {
            println!("Cancelled");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let config = AppConfig::load(cli.config.as_deref())?;
    let kubeconfig_path = cli.kubeconfig.as_deref().or(config.kubeconfig.as_deref());
    let registry = ContextRegistry::new(KubeConfig::load(kubeconfig_path)?);

    match cli.command {
        Command::Start {
            context,
            workload,
            selector,
            timeout,
            limits,
            image,
            no_rm,
            command,
        } => {
            let options = StartOptions {
                selector: selector.unwrap_or_else(|| config.selector.clone()),
                name_filter: workload.or_else(current_dir_name),
                overrides: SessionOverrides {
                    command,
                    image: image.or_else(|| config.image.clone()),
                    limits: limits.or_else(|| config.limits.clone()),
                    idle_timeout: timeout.unwrap_or_else(|| config.idle_timeout()),
                },
                no_delete: no_rm,
            };
            start(&registry, &context, &options).await
        }
        Command::Ls {
            context,
            all_contexts,
            everyone,
        } => {
            let contexts = if all_contexts {
                registry.context_names()
            } else {
                context.into_iter().collect()
            };
            list(&registry, &contexts, everyone).await
        }
        Command::Contexts { prefix } => {
            for name in registry.context_names_with_prefix(prefix.as_deref().unwrap_or("")) {
                println!("{}", name);
            }
            Ok(())
        }
    }
}

async fn start(
    registry: &ContextRegistry,
    context: &str,
    options: &StartOptions,
) -> Result<(), AppError> {
    let handle = registry.select(context).await.map_err(SessionError::from)?;
    let identity = LocalIdentity::resolve()?;
    let controller =
        SessionController::new(handle, Arc::new(TerminalPrompter), identity).with_signal_handling();

    let result = controller.run(options, &CancellationToken::new()).await;

    match result? {
        SessionOutcome::Detached => tracing::info!("Session ended"),
        SessionOutcome::Interrupted => tracing::info!("Session interrupted"),
    }
    Ok(())
}

async fn list(registry: &ContextRegistry, contexts: &[String], everyone: bool) -> Result<(), AppError> {
    // Validate up front so a typo is reported once rather than as a fetch failure
    if let [single] = contexts {
        registry.select(single).await.map_err(SessionError::from)?;
    }

    let identity = LocalIdentity::resolve()?;
    let rows = list_sessions(
        registry,
        contexts,
        everyone,
        &identity.machine_id,
        Utc::now(),
        &mut io::stderr(),
    )
    .await;

    render_table(&mut io::stdout().lock(), &rows)?;
    Ok(())
}

fn current_dir_name() -> Option<String> {
    let dir = std::env::current_dir().ok()?;
    dir.file_name()
        .map(|name| name.to_string_lossy().into_owned())
}
