//! credstore command-line interface.

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// credstore - encrypted local credential store
#[derive(Parser)]
#[command(name = "credstore")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to config file
    #[arg(short, long, env = "CREDSTORE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Print the password stored for a service
    Get {
        /// Service name
        service: String,

        /// Only match a record for this user
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Store credentials for a service (prompts for the password)
    Set {
        /// Service name
        service: String,

        /// User name stored with the password
        #[arg(short, long)]
        user: Option<String>,

        /// Password (if omitted, prompts for hidden input)
        #[arg(long)]
        password: Option<String>,
    },

    /// Delete the credentials for a service
    Delete {
        /// Service name
        service: String,
    },

    /// List stored services and user names
    List,

    /// Reset the store to a consistent state
    Clear,

    /// Replace the store with another credential database
    Import {
        /// Database file to import; its key file is looked up beside it
        source: PathBuf,
    },

    /// Protect the store with a master password
    ChangePassword,

    /// Re-encrypt the store under a new random master key
    RotateKey,

    /// Delete the database and master key file
    Reset,

    /// Configuration management
    Config(commands::config::ConfigArgs),

    /// Show version information
    Version,
}

/// Run the CLI with the given arguments.
pub fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config;
    let load = || commands::load_config(config_path.as_deref());

    match cli.command {
        Commands::Get { service, user } => commands::credentials::get(&load()?, &service, user),
        Commands::Set {
            service,
            user,
            password,
        } => commands::credentials::set(&load()?, &service, user, password),
        Commands::Delete { service } => commands::credentials::delete(&load()?, &service),
        Commands::List => commands::credentials::list(&load()?),
        Commands::Clear => commands::recovery::clear(&load()?),
        Commands::Import { source } => commands::recovery::import(&load()?, &source),
        Commands::ChangePassword => commands::master_key::change_password(&load()?),
        Commands::RotateKey => commands::master_key::rotate_key(&load()?),
        Commands::Reset => commands::recovery::reset(&load()?),
        Commands::Config(args) => commands::config::run(args, config_path.as_deref()),
        Commands::Version => {
            println!("credstore {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
