mod cli;
mod config;
mod download;
mod install;
mod path_env;
mod release;
mod types;


use anyhow::Result;
use clap::Parser;
use cli::Cli;
use config::Settings;
use console::Term;
use types::Outcome;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(&cli)?;

    let result = run(&cli).await;
    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
        tracing::debug!("Command failed: {:?}", e);
    }

    if !cli.no_pause {
        wait_for_key();
    }

    if result.is_err() {
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: &Cli) -> Result<()> {
    let settings = Settings::load()?;

    // No side effect happens before a usable environment store exists
    let mut env = path_env::open_user_env(settings.env_file.as_deref())?;

    match install::run(cli.action(), &settings, env.as_mut()).await? {
        Outcome::Completed => tracing::info!("{:?} finished", cli.action()),
        Outcome::Aborted(reason) => tracing::info!("{:?} aborted: {:?}", cli.action(), reason),
    }
    Ok(())
}

fn setup_logging(cli: &Cli) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if cli.quiet {
        "error"
    } else if cli.verbose == 0 {
        "warn"
    } else if cli.verbose == 1 {
        "info"
    } else {
        "debug"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();

    Ok(())
}

/// Keeps a double-clicked console window open until the user has read it.
fn wait_for_key() {
    let term = Term::stdout();
    if !term.is_term() {
        return;
    }
    println!("Press any key to exit...");
    if let Err(e) = term.read_key() {
        tracing::debug!("Could not read key press: {}", e);
    }
}
