use crate::output::print_json;
use crate::root::Workspace;
use anyhow::Context;
use clap::Subcommand;
use cr8tor_core::config::{Config, WarnLevel};

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the effective config
    Show,

    /// Write a config file holding the defaults
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate the config for common mistakes
    Validate,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(ws: &Workspace, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(ws, json),
        ConfigSubcommand::Init { force } => init(ws, force),
        ConfigSubcommand::Validate => validate(ws, json),
    }
}

fn show(ws: &Workspace, json: bool) -> anyhow::Result<()> {
    let config = ws.load_config().context("failed to load config")?;
    if json {
        print_json(&config)
    } else {
        print!("{}", serde_yaml::to_string(&config)?);
        Ok(())
    }
}

fn init(ws: &Workspace, force: bool) -> anyhow::Result<()> {
    if ws.config_path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            ws.config_path.display()
        );
    }
    Config::default()
        .save(&ws.config_path)
        .with_context(|| format!("failed to write {}", ws.config_path.display()))?;
    println!("Wrote {}", ws.config_path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(ws: &Workspace, json: bool) -> anyhow::Result<()> {
    let config = ws.load_config().context("failed to load config")?;
    let warnings = config.validate();

    if json {
        print_json(&serde_json::json!({ "warnings": warnings }))?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}
