use anyhow::{Context, Result, anyhow};
use clap::Parser;
use layered_config::cli::{Cli, Command};
use layered_config::config::watcher::{WatcherConfig, start_config_watcher};
use layered_config::config::{Config, LoadOptions, ProcessEnv, resolve_config_dir};
use layered_config::format::{OutputFormat, format_sources, format_value};
use layered_config::logging::{LogTarget, init_logging};
use tracing::{info, warn};

fn open_config(cli: &Cli) -> Result<Config> {
    let dir = resolve_config_dir(cli.config_dir.as_deref(), &ProcessEnv, &cli.prefix)
        .context("No configuration directory")?;

    let mut options = LoadOptions::new()
        .with_env_prefix(cli.prefix.clone())
        .with_env_source(ProcessEnv);
    if let Some(env) = &cli.env {
        options = options.with_environment(env.clone());
    }

    Config::open(&dir, options)
        .with_context(|| format!("Failed to load configuration from {}", dir.display()))
}

fn print_tree(config: &Config, format: OutputFormat) -> Result<()> {
    let tree = config.snapshot();
    println!("{}", format_value(&tree.tree, format)?);
    Ok(())
}

async fn watch(config: Config, format: OutputFormat) -> Result<()> {
    let mut watcher = start_config_watcher(&config.config_dir(), WatcherConfig::default())
        .context("Failed to start config watcher")?;
    print_tree(&config, format)?;

    loop {
        tokio::select! {
            event = watcher.wait_for_change() => {
                let Some(event) = event else {
                    info!("Config watcher stopped");
                    return Ok(());
                };
                if !event.requires_reload() {
                    warn!("Config watcher reported: {:?}", event);
                    continue;
                }
                match config.reload() {
                    Ok(()) => {
                        println!("---");
                        print_tree(&config, format)?;
                    }
                    Err(e) => warn!("Reload failed, keeping previous values: {}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping watcher");
                return Ok(());
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&LogTarget::parse(&cli.log), cli.verbose)?;

    let config = open_config(&cli)?;

    match cli.command {
        Command::Show { path, format } => {
            let key = path.unwrap_or_default();
            let value = config
                .get(&key)
                .ok_or_else(|| anyhow!("Key '{}' not found", key))?;
            println!("{}", format_value(&value, format)?);
        }
        Command::Get { key, format } => {
            let value = config
                .get(&key)
                .ok_or_else(|| anyhow!("Key '{}' not found", key))?;
            println!("{}", format_value(&value, format)?);
        }
        Command::Sources => {
            let snapshot = config.snapshot();
            print!(
                "{}",
                format_sources(
                    &snapshot.config_dir,
                    &snapshot.environment,
                    &snapshot.sources
                )
            );
        }
        Command::Keys => {
            for key in config.keys() {
                println!("{key}");
            }
        }
        Command::Watch { format } => watch(config, format).await?,
    }

    Ok(())
}
