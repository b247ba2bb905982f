use std::path::{Path, PathBuf};

/// Reset SIGPIPE to default behavior so piping (e.g. `launchcfg schema | jq`)
/// exits cleanly instead of panicking on broken pipe.
#[cfg(unix)]
fn reset_sigpipe() {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }
}

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use launchcfg::config::loader;
use launchcfg::config::types::ProjectConfig;
use launchcfg::executor::engine::{self, ResourceEngine};
use launchcfg::output::formatter;
use launchcfg::resource::launch_configuration;
use launchcfg::state::backend::StateBackend;
use launchcfg::state::sqlite::SqliteBackend;

/// launchcfg - manage AWS launch configurations declaratively
#[derive(Parser)]
#[command(name = "launchcfg", version, about, long_about = None)]
struct Cli {
    /// Path to config directory or file (auto-detects .tf and .yaml)
    #[arg(short, long, default_value = ".")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Working directory for state and the simulated cloud
    #[arg(short, long, default_value = ".launchcfg")]
    working_dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration without calling the API
    Validate,

    /// Print the aws_launch_configuration schema as JSON
    Schema,

    /// Show execution plan
    Plan,

    /// Create, replace and delete launch configurations to match the config
    Apply {
        /// Skip confirmation prompt
        #[arg(long)]
        auto_approve: bool,
    },

    /// Update state from the API, dropping resources that no longer exist
    Refresh,

    /// Delete every tracked launch configuration
    Destroy {
        /// Skip confirmation prompt
        #[arg(long)]
        auto_approve: bool,
    },

    /// Inspect state
    State {
        #[command(subcommand)]
        command: StateCommands,
    },
}

#[derive(Subcommand)]
enum StateCommands {
    /// List all resources in state
    List,

    /// Show details for a specific resource
    Show {
        /// Resource address (e.g. aws_launch_configuration.web)
        address: String,
    },
}

#[tokio::main]
async fn main() {
    #[cfg(unix)]
    reset_sigpipe();

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Validate => cmd_validate(&cli),
        Commands::Schema => cmd_schema(),
        Commands::Plan => cmd_plan(&cli).await,
        Commands::Apply { auto_approve } => cmd_apply(&cli, auto_approve).await,
        Commands::Refresh => cmd_refresh(&cli).await,
        Commands::Destroy { auto_approve } => cmd_destroy(&cli, auto_approve).await,
        Commands::State { ref command } => cmd_state(&cli, command).await,
    };

    if let Err(e) = result {
        formatter::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

async fn open_backend(working_dir: &str) -> Result<SqliteBackend> {
    let db_path = format!("{}/launchcfg.db", working_dir);
    let backend = SqliteBackend::open(&db_path)?;
    backend.initialize().await?;
    Ok(backend)
}

fn load_project(cli: &Cli) -> Result<ProjectConfig> {
    loader::load_project(Path::new(&cli.config))
}

fn build_engine(cli: &Cli, project: &ProjectConfig) -> Result<ResourceEngine> {
    let working_dir = PathBuf::from(&cli.working_dir);
    std::fs::create_dir_all(&working_dir).with_context(|| {
        format!("Failed to create working directory {}", working_dir.display())
    })?;
    let client = engine::client_from_settings(&project.provider_settings(), &working_dir)?;
    Ok(ResourceEngine::new(client))
}

/// Ask for a literal `yes`.
fn confirm(question: &str) -> Result<bool> {
    println!("\n{} Only '{}' will be accepted.", question, "yes".bold());
    print!("  Enter a value: ");
    use std::io::Write;
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim() == "yes")
}

// ─── Commands ────────────────────────────────────────────────────────────────

fn cmd_validate(cli: &Cli) -> Result<()> {
    let project = load_project(cli)?;
    formatter::print_success(&format!(
        "Configuration is valid. {} resource(s) declared.",
        project.resources.len()
    ));
    Ok(())
}

fn cmd_schema() -> Result<()> {
    let schema = launch_configuration::schema().to_json();
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

async fn cmd_plan(cli: &Cli) -> Result<()> {
    let project = load_project(cli)?;
    let engine = build_engine(cli, &project)?;
    let backend = open_backend(&cli.working_dir).await?;

    let plan = engine.plan(&project, &backend).await?;
    formatter::print_resource_plan(&plan);
    Ok(())
}

async fn cmd_apply(cli: &Cli, auto_approve: bool) -> Result<()> {
    let project = load_project(cli)?;
    let engine = build_engine(cli, &project)?;
    let backend = open_backend(&cli.working_dir).await?;

    let plan = engine.plan(&project, &backend).await?;
    formatter::print_resource_plan(&plan);

    if !plan.has_changes() {
        return Ok(());
    }

    if !auto_approve && !confirm("Do you want to perform these actions?")? {
        println!("\n{}", "Apply cancelled.".yellow());
        return Ok(());
    }

    let summary = engine.apply(&backend, &plan).await?;
    formatter::print_apply_summary(&summary);
    if summary.failed > 0 {
        anyhow::bail!("{} resource(s) failed", summary.failed);
    }
    Ok(())
}

async fn cmd_refresh(cli: &Cli) -> Result<()> {
    let project = load_project(cli)?;
    let engine = build_engine(cli, &project)?;
    let backend = open_backend(&cli.working_dir).await?;

    let summary = engine.refresh(&backend).await?;
    formatter::print_refresh_summary(&summary);
    Ok(())
}

async fn cmd_destroy(cli: &Cli, auto_approve: bool) -> Result<()> {
    let project = load_project(cli)?;
    let engine = build_engine(cli, &project)?;
    let backend = open_backend(&cli.working_dir).await?;

    let count = backend.count_resources().await?;
    if count == 0 {
        println!("{}", "No resources in state. Nothing to destroy.".green());
        return Ok(());
    }

    if !auto_approve
        && !confirm(&format!(
            "Do you really want to destroy all {} resource(s)?",
            count
        ))?
    {
        println!("\n{}", "Destroy cancelled.".yellow());
        return Ok(());
    }

    let summary = engine.destroy(&backend).await?;
    formatter::print_apply_summary(&summary);
    if summary.failed > 0 {
        anyhow::bail!("{} resource(s) failed", summary.failed);
    }
    Ok(())
}

async fn cmd_state(cli: &Cli, command: &StateCommands) -> Result<()> {
    let backend = open_backend(&cli.working_dir).await?;
    match command {
        StateCommands::List => {
            let resources = backend.list_resources().await?;
            formatter::print_resource_list(&resources);
        }
        StateCommands::Show { address } => {
            let resource = backend
                .get_resource(address)
                .await?
                .with_context(|| format!("Resource '{}' not found in state", address))?;
            formatter::print_resource_detail(&resource);
        }
    }
    Ok(())
}
