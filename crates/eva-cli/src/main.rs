use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use eva::capabilities::ActionRegistry;
use eva::dispatcher::Dispatcher;
use eva::handlers::default_catalog;
use eva::providers::factory::get_provider;

mod configuration;
mod error;
mod prompt;
mod session;

use configuration::Settings;
use prompt::cliclack::CliclackPrompt;
use session::Session;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Model to use, overrides the configured one
    #[arg(short, long)]
    model: Option<String>,

    /// Settings file, defaults to eva.toml in the working directory when present
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Per-call timeout in seconds for model and tool calls
    #[arg(short, long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Answer a single query and exit
    #[arg(short, long)]
    query: Option<String>,

    /// Show the transcript of every turn
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("eva=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let mut settings =
        Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(timeout) = cli.timeout {
        anyhow::ensure!(timeout > 0, "--timeout must be at least one second");
        settings.dispatch.timeout_secs = Some(timeout);
    }
    let provider_settings = match cli.model {
        Some(model) => settings.provider.with_model(model),
        None => settings.provider,
    };
    tracing::info!(
        provider = %provider_settings.provider_type(),
        model = provider_settings.model(),
        "starting"
    );

    let provider = get_provider(provider_settings.into_config())
        .context("Failed to create the model provider")?;
    let dispatcher = Dispatcher::new(
        provider,
        default_catalog()?,
        &ActionRegistry::with_dev_tools(),
        settings.dispatch.into_config(),
    )
    .context("Failed to build the dispatcher")?;

    let mut session = Session::new(dispatcher, Box::new(CliclackPrompt::new()), cli.verbose);
    match cli.query {
        Some(query) => session.headless_start(&query).await,
        None => session.start().await,
    }
}
