//! Configuration management commands.

use std::path::{Path, PathBuf};

use clap::Args;
use credstore_core::config::Config;
use credstore_core::paths;

/// Config command arguments.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(clap::Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,

    /// Get a configuration value
    Get {
        /// Configuration key (dot-separated path)
        key: String,
    },

    /// Write a default configuration file
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Show configuration file path
    Path,

    /// Show where the database and key file live
    Store,

    /// Validate configuration
    Validate,
}

fn config_path(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(paths::config_file()?),
    }
}

/// Walk a dot-separated key through the serialized config.
fn lookup<'a>(json: &'a serde_json::Value, key: &str) -> Option<&'a serde_json::Value> {
    key.split('.')
        .try_fold(json, |value, part| value.get(part))
}

/// Run the config command.
pub fn run(args: ConfigArgs, explicit_path: Option<&Path>) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            let config = Config::load_or_default(explicit_path)?;
            println!("{}", config.to_json5()?);
        }

        ConfigCommand::Get { key } => {
            let config = Config::load_or_default(explicit_path)?;
            let json = serde_json::to_value(&config)?;

            match lookup(&json, &key) {
                Some(v) => println!("{}", serde_json::to_string_pretty(v)?),
                None => anyhow::bail!("Key not found: {}", key),
            }
        }

        ConfigCommand::Init { force } => {
            let path = config_path(explicit_path)?;

            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists: {:?}. Use --force to overwrite.",
                    path
                );
            }

            if explicit_path.is_none() {
                paths::ensure_dirs()?;
            }
            Config::default().save(&path)?;
            println!("Created config file: {:?}", path);
        }

        ConfigCommand::Path => {
            println!("{}", config_path(explicit_path)?.display());
        }

        ConfigCommand::Store => {
            let config = Config::load_or_default(explicit_path)?;
            println!("database: {}", config.database_path()?.display());
            println!("key file: {}", config.key_path()?.display());
        }

        ConfigCommand::Validate => {
            let path = config_path(explicit_path)?;
            match Config::load(&path) {
                Ok(config) => match config.validate() {
                    Ok(()) => println!("Configuration is valid"),
                    Err(e) => anyhow::bail!("Configuration error: {}", e),
                },
                Err(e) => anyhow::bail!("Failed to load config: {}", e),
            }
        }
    }

    Ok(())
}
