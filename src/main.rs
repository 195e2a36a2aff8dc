//! `devpane` - terminal chat pane for a devops assistant backend
//!
//! This binary resolves the backend address (config file, `BACKEND_URL`,
//! `--backend-url`), then hands it to the chat session explicitly.

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;
use console::Style;
use devpane_core::config::{self, Config};
use devpane_core::probe::BackendClient;

use crate::cli::{Cli, Commands, ConfigCommand};

mod cli;
mod logging;
mod terminal;

/// Main entry point for the devpane CLI
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if cli.version {
        println!(
            "{} v{} ({})",
            Style::new().blue().apply_to("devpane"),
            env!("CARGO_PKG_VERSION"),
            env!("DEVPANE_GIT_HASH")
        );
        return Ok(());
    }

    let config = load_config(&cli)?;

    match &cli.command {
        None => terminal::run_chat(&config, None, config.ui.color).await?,

        Some(Commands::Chat { save, no_color }) => {
            terminal::run_chat(&config, save.as_deref(), config.ui.color && !no_color).await?;
        }

        Some(Commands::Probe) => handle_probe(&config).await?,

        Some(Commands::Config { cmd }) => match cmd {
            ConfigCommand::Show => {
                let rendered =
                    toml::to_string_pretty(&config).context("Failed to render configuration")?;
                print!("{rendered}");
            }
            ConfigCommand::Path => match cli.config.clone().or_else(config::find_config_file) {
                Some(path) => println!("{}", path.display()),
                None => match Config::default_path() {
                    Some(path) => println!("{} (not created yet)", path.display()),
                    None => println!("no configuration directory available"),
                },
            },
            ConfigCommand::Init { force } => {
                let path = cli
                    .config
                    .clone()
                    .or_else(Config::default_path)
                    .context("Could not determine a configuration path")?;
                init_config(&path, *force)?;
                println!("Wrote {}", path.display());
            }
        },
    }

    Ok(())
}

/// Config file (explicit or discovered), then `BACKEND_URL`, then `--backend-url`
fn load_config(cli: &Cli) -> Result<Config> {
    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::load_or_default(),
    };
    Ok(config
        .with_env_overrides()
        .with_backend_override(cli.backend_url.clone()))
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    Config::default()
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))
}

async fn handle_probe(config: &Config) -> Result<()> {
    let green = Style::new().green();
    let red = Style::new().red();
    let bold = Style::new().bold();

    let client = BackendClient::from_config(config)?;
    let report = client.probe().await;

    println!("{} {}", bold.apply_to("Backend:"), report.base_url);
    match &report.health {
        Ok(health) if health.is_ok() => println!("Health:  {}", green.apply_to(&health.status)),
        Ok(health) => println!("Health:  {}", red.apply_to(&health.status)),
        Err(e) => println!("Health:  {}", red.apply_to(e)),
    }
    match &report.info {
        Ok(info) => println!("Info:    {} {}", info.name, info.version),
        Err(e) => println!("Info:    {}", red.apply_to(e)),
    }
    match config.channel_url() {
        Ok(url) => println!("Chat:    {url}"),
        Err(e) => println!("Chat:    {}", red.apply_to(e)),
    }

    if !report.is_healthy() {
        bail!("backend at {} is not healthy", report.base_url);
    }
    Ok(())
}
