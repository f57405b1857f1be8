mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use cmd::lifecycle::{AgreementArgs, Credentials, Request};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "cr8tor",
    about = "5-Safes data project lifecycle: gated actions recorded in an RO-Crate provenance document",
    version,
    propagate_version = true
)]
struct Cli {
    /// Resources directory holding governance/, access/ and metadata/ (default: auto-detect)
    #[arg(long, global = true, env = "CR8TOR_RESOURCES_DIR")]
    resources_dir: Option<PathBuf>,

    /// BagIt directory the provenance document is written under (default: next to resources/)
    #[arg(long, global = true, env = "CR8TOR_BAGIT_DIR")]
    bagit_dir: Option<PathBuf>,

    /// Config file (default: cr8tor.yaml next to resources/)
    #[arg(long, global = true, env = "CR8TOR_CONFIG")]
    config: Option<PathBuf>,

    /// Agent recorded on every action (default: identity.agent from config)
    #[arg(long, global = true, env = "APP_NAME")]
    agent: Option<String>,

    /// Bearer token for the metadata service
    #[arg(long, global = true, env = "METADATA_API_TOKEN", hide_env_values = true)]
    metadata_token: Option<String>,

    /// Bearer token for the publish service
    #[arg(long, global = true, env = "PUBLISH_API_TOKEN", hide_env_values = true)]
    publish_token: Option<String>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assign the project id and record the CreateAction
    Create {
        /// Id to assign when the project has none (default: random uuid)
        #[arg(long, env = "PROJECT_UUID")]
        project_id: Option<String>,
    },

    /// Check requested tables and columns against the source schema
    Validate,

    /// Record the information-governance sign-off
    SignOff(AgreementArgs),

    /// Extract the requested datasets into the staging area
    StageTransfer,

    /// Record the output disclosure check
    Disclosure(AgreementArgs),

    /// Publish staged data to the project destination
    Publish,

    /// Rebuild the provenance document without recording an action
    Build {
        /// Print the document instead of writing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Show each command's recorded and provenance status
    Status,

    /// Inspect and validate cr8tor.yaml
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let ws = root::Workspace::resolve(
        cli.resources_dir.as_deref(),
        cli.bagit_dir.as_deref(),
        cli.config.as_deref(),
    );
    let creds = Credentials {
        agent: cli.agent,
        metadata_token: cli.metadata_token,
        publish_token: cli.publish_token,
    };

    let request = match cli.command {
        Commands::Create { project_id } => Request::Create { project_id },
        Commands::Validate => Request::Validate,
        Commands::SignOff(args) => Request::SignOff(args),
        Commands::StageTransfer => Request::StageTransfer,
        Commands::Disclosure(args) => Request::Disclosure(args),
        Commands::Publish => Request::Publish,
        Commands::Build { dry_run } => exit_on(cmd::build::run(&ws, dry_run, cli.json)),
        Commands::Status => exit_on(cmd::status::run(&ws, cli.json)),
        Commands::Config { subcommand } => exit_on(cmd::config::run(&ws, subcommand, cli.json)),
    };

    let code = cmd::lifecycle::run(&ws, &creds, request, cli.json);
    std::process::exit(code);
}

/// Finish a non-lifecycle command.
fn exit_on(result: anyhow::Result<()>) -> ! {
    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}
