// Entrypoint for the CLI application.
// - Keeps `main` small: resolve configuration, set up logging, build the
//   orchestrator and hand it to the UI loop.
// - Returns `anyhow::Result` so setup failures print with context.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use postboard_cli::config::Config;
use postboard_cli::gateway::HttpInvoker;
use postboard_cli::logging::init_logging;
use postboard_cli::ui::main_menu;
use postboard_cli::workflow::Orchestrator;

/// Terminal client for the post board
#[derive(Parser, Debug)]
#[command(name = "postboard")]
#[command(about = "Read, post and manage messages on the post board")]
#[command(version)]
struct Args {
    /// Region the backend functions live in
    #[arg(short, long)]
    region: Option<String>,

    /// Maximum number of posts to download
    #[arg(short = 'n', long)]
    max_messages: Option<u32>,

    /// Seconds between post list refreshes
    #[arg(short = 'f', long)]
    refresh_seconds: Option<u64>,

    /// Endpoint template, `{region}` and `{function}` are substituted
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Configuration file (defaults to ./conf.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Show debug output
    #[arg(short, long)]
    debug: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config =
        Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(region) = args.region {
        config.region = region;
    }
    if let Some(max) = args.max_messages {
        config.max_messages = max;
    }
    if let Some(refresh) = args.refresh_seconds {
        config.refresh_seconds = refresh;
    }
    if let Some(endpoint) = args.endpoint {
        config.endpoint = endpoint;
    }
    config.debug |= args.debug;
    // Validated only now so flags can repair a bad file value.
    config.validate()?;

    init_logging(config.debug)?;
    tracing::debug!(
        region = %config.region,
        endpoint = %config.endpoint,
        max_messages = config.max_messages,
        refresh_seconds = config.refresh_seconds,
        "configuration loaded"
    );

    let orchestrator = Orchestrator::new(HttpInvoker::from_config(&config), config.max_messages);

    // Blocks until the user quits.
    main_menu(orchestrator, &config)
}
