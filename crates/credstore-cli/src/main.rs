//! credstore CLI entry point.

use clap::Parser;
use credstore_cli::{run, Cli};
use credstore_core::env::vars;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so `get` output stays clean on stdout.
    let default_filter = match cli.verbose {
        0 => "credstore=info",
        1 => "credstore=debug",
        _ => "credstore=trace",
    };
    let filter =
        EnvFilter::try_from_env(vars::CREDSTORE_LOG).unwrap_or_else(|_| default_filter.into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    run(cli)
}
