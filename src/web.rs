use clap::Parser;
use leaderboard::AppConfig;
use leaderboard::app;
use std::path::PathBuf;

/// Score leaderboard web server
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// TOML config file; defaults apply when omitted
    #[arg(short, long, env = "LEADERBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the config file
    #[arg(short, long)]
    bind: Option<String>,
}

/// Main entry point for the web application
///
/// Reads the configuration, opens the table store and serves the board until
/// the process is stopped. Missing or invalid credentials end the process
/// here, before anything listens.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind = bind;
    }

    log::info!(
        "starting leaderboard: {} questions, refresh every {}s",
        config.question_count,
        config.refresh_interval_secs
    );
    app::run(config).await
}
