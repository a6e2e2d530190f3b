use std::path::PathBuf;

use clap::Parser;
use log::{error, info};

use deskmate_core::{
    app,
    config::{Config, SharedConfig},
};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to the JSON config file.
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let mut logger_builder = pretty_env_logger::formatted_timed_builder();
    logger_builder.filter_level(log::LevelFilter::Info);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        logger_builder.parse_filters(&filters);
    }
    logger_builder.init();

    let args = Args::parse();
    let config = match Config::from_path(&args.config) {
        Ok(config) => config,
        Err(err) => {
            error!("{:#}", err);
            std::process::exit(1);
        }
    };

    info!("Bot is starting...");
    if let Err(err) = app::run(SharedConfig::new(config)).await {
        error!("{:#}", err);
        std::process::exit(1);
    }
}
