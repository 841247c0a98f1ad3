//! Command-line front end for the todo application.
//!
//! Reads one to-do per line from stdin and prints every creation as a JSON
//! line on stdout. Logs and the closing summary go to stderr.

use anyhow::Context;
use tokio::io::BufReader;
use todo_app::{App, AppConfig, cli};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "todo_app=info,todo_ports_runtime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = AppConfig::from_env().context("invalid configuration")?;

    let app = App::builder(config)
        .start()
        .await
        .context("failed to start application")?;

    let summary = cli::run(app, BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await
        .context("command-line session failed")?;

    eprintln!("{summary}");
    Ok(())
}
