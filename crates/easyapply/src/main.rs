use anyhow::Context;
use clap::Parser;
use easyapply_engine::bot::{self, EasyApplyBot};
use easyapply_engine::config::loader::ConfigLoader;
use easyapply_engine::config::schema::BotConfig;
use easyapply_wd::backend::WebDriverBackend;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "easyapply", version, about = "Apply to Easy Apply job postings")]
struct Args {
    /// Config file (default: ./config.yaml, then ~/.easyapply/config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// WebDriver endpoint, overrides `browser.webdriver_url`
    #[arg(short, long)]
    webdriver_url: Option<String>,

    /// Run Chrome without a window
    #[arg(long)]
    headless: bool,

    /// Directory for run logs
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Validate the config and print the search plan without opening a browser
    #[arg(long)]
    dry_run: bool,
}

fn init_logging(log_dir: &Path, verbose: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let stamp = chrono::Local::now().format("%m_%d_%y %H_%M_%S");
    let log_path = log_dir.join(format!("{} applyJobs.log", stamp));
    let file = File::create(&log_path)
        .with_context(|| format!("Failed to create log file {}", log_path.display()))?;

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .init();

    Ok(log_path)
}

async fn load_config(args: &Args) -> anyhow::Result<BotConfig> {
    let mut config = match &args.config {
        Some(path) => ConfigLoader::load_from(path)
            .await
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ConfigLoader::load_default().await?,
    };
    if let Some(url) = &args.webdriver_url {
        config.browser.webdriver_url = url.clone();
    }
    if args.headless {
        config.browser.headless = true;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let log_path = init_logging(&args.log_dir, args.verbose)?;
    info!("Logging to {}", log_path.display());

    let config = load_config(&args).await?;
    info!(
        "Configuration:\n{}",
        serde_yaml::to_string(&config.redacted())?
    );

    if args.dry_run {
        for url in bot::plan(&config) {
            info!("Would search: {}", url);
            println!("{}", url);
        }
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Shutdown signal received, finishing current step...");
            on_signal.cancel();
        }
    });

    let backend = WebDriverBackend::new(config.browser.clone());
    let mut bot = EasyApplyBot::new(backend, config, cancel)?;

    match bot.run().await {
        Ok(summary) => {
            info!(
                "Done: {} searches, {} jobs processed, {} applications sent",
                summary.combos, summary.processed, summary.submitted
            );
            Ok(())
        }
        Err(e) if e.is_cancelled() => {
            info!("Interrupted.");
            Ok(())
        }
        Err(e) => {
            error!("Run failed: {}", e);
            Err(e.into())
        }
    }
}
