mod config;

use clap::{Parser, Subcommand, ValueEnum};
use config::Config;
use metatools_a2a::{A2aHandler, A2aServer, Agent, AgentIdentity};
use metatools_discovery::{load_bootstrap, ToolIndex};
use metatools_exec::{register_builtins, ToolRunner};
use metatools_task::TaskManager;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "metatools-a2a",
    version,
    about = "Expose a tool catalog to remote agents over the A2A protocol"
)]
struct Cli {
    /// Path to a config file (.toml, .yaml, .yml or .json). Falls back to
    /// METATOOLS_A2A_CONFIG.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,

    /// Defaults to `serve`
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the A2A server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Inspect the skill catalog
    Skills {
        #[command(subcommand)]
        action: SkillsAction,
    },
    /// Print the agent card as JSON
    Card,
}

#[derive(Subcommand)]
enum SkillsAction {
    /// List skills loaded from the bootstrap file
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Serve {
        host: None,
        port: None,
    }) {
        Commands::Serve { host, port } => {
            config.apply_overrides(host, port);
            config.finish();
            serve(config).await?;
        }
        Commands::Skills {
            action: SkillsAction::List,
        } => {
            let agent = build_agent(&config)?;
            let skills = agent.list_skills().await?;
            if skills.is_empty() {
                println!("No skills registered.");
                println!("Point bootstrap.toolsFile (or METATOOLS_A2A_TOOLS_FILE) at a tools file.");
            } else {
                println!("Registered skills:");
                for skill in &skills {
                    println!("  {} — {}", skill.name, skill.description);
                }
                println!("\nTotal: {} skill(s)", skills.len());
            }
        }
        Commands::Card => {
            let agent = build_agent(&config)?;
            let card = agent.agent_card().await?;
            println!("{}", serde_json::to_string_pretty(&card)?);
        }
    }

    Ok(())
}

/// Logs go to stderr so `card` output stays machine-readable.
fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

/// Catalog, runner and agent wired from config. Bootstrap failures are fatal.
fn build_agent(config: &Config) -> anyhow::Result<Agent> {
    let index = Arc::new(ToolIndex::new());
    if let Some(path) = &config.bootstrap.tools_file {
        load_bootstrap(path, &index)?;
    } else {
        warn!("No tools file configured; the catalog is empty");
    }

    let mut runner = ToolRunner::new(index.clone())?;
    register_builtins(&mut runner);
    info!(
        tools = index.tool_count(),
        handlers = runner.handler_count(),
        "Catalog ready"
    );

    let identity = AgentIdentity {
        name: config.provider.name.clone(),
        description: config.provider.description.clone(),
        version: config.provider.version.clone(),
        documentation_url: config.provider.documentation_url.clone(),
        icon_url: config.provider.icon_url.clone(),
        base_url: config.base_url(),
    };
    Ok(Agent::new(identity)
        .with_discovery(index)
        .with_runner(Arc::new(runner))
        .with_max_skills(config.bootstrap.max_skills))
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let agent = Arc::new(build_agent(&config)?);
    let handler = Arc::new(A2aHandler::new(agent, Arc::new(TaskManager::new())));

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            info!("Shutdown signal received");
            cancel.cancel();
        }
    });

    info!(
        addr = %config.server_config().addr(),
        url = %config.base_url(),
        "Starting metatools-a2a"
    );
    A2aServer::new(config.server_config(), handler)
        .run(cancel)
        .await?;
    info!("metatools-a2a stopped");
    Ok(())
}

/// Resolves on SIGINT, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
