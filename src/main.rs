//! MTGO Getter - downloads MTGO data from Goatbots and Scryfall
//!
//! Only downloads what is out of date according to the state log.

use clap::{Args, Parser, Subcommand};
use mtgogetter::download::{self, Destination};
use mtgogetter::refresh::{
    CARD_DEFINITIONS_FILE_NAME, PRICE_HISTORY_FILE_NAME, SCRYFALL_BULK_FILE_NAME,
    SCRYFALL_SETS_FILE_NAME,
};
use mtgogetter::state::persist;
use mtgogetter::{GetterError, RefreshConfig, RefreshOutcome, Refresher, Result, StateStore};
use std::path::PathBuf;
use std::sync::Arc;

/// Download MTGO price and card data, skipping anything that is still fresh
#[derive(Parser, Debug)]
#[command(name = "mtgogetter")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Refresh all data sources concurrently
    #[command(visible_aliases = ["update-all", "run-all-downloads"])]
    Update {
        /// Directory for downloads and the state log (default: current directory)
        #[arg(long)]
        save_to_dir: Option<PathBuf>,
    },
    /// Refresh a single data source, or download any URL
    Download {
        #[command(subcommand)]
        target: DownloadTarget,
    },
}

#[derive(Subcommand, Debug)]
enum DownloadTarget {
    /// Goatbots daily price history
    #[command(visible_alias = "gph")]
    GoatbotsPriceHistory(SaveArgs),
    /// Goatbots card definitions
    #[command(visible_alias = "gcd")]
    GoatbotsCardDefinitions(SaveArgs),
    /// Scryfall bulk card data (MTGO cards only)
    #[command(visible_alias = "sbd")]
    ScryfallBulkData(SaveArgs),
    /// Scryfall set list
    #[command(visible_alias = "scry-sets")]
    ScryfallSets(SaveArgs),
    /// Download any URL, without checking the state log
    Custom {
        url: String,
        /// Extract the first file of a zip archive
        #[arg(long, default_value_t = false)]
        decompress: bool,
        /// Output file, or "stdout" (default: file name from the URL)
        #[arg(long)]
        save_as: Option<String>,
    },
}

#[derive(Args, Debug)]
struct SaveArgs {
    /// Directory for downloads and the state log (default: current directory)
    #[arg(long)]
    save_to_dir: Option<PathBuf>,
    /// Output file, or "stdout"
    #[arg(long)]
    save_as: Option<String>,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Update { save_to_dir } => run_update(save_to_dir).await,
        Command::Download { target } => run_download(target).await.map(|()| true),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    }
}

fn open_refresher(save_to_dir: Option<PathBuf>) -> Result<Refresher> {
    let state_log_path = persist::state_log_path(save_to_dir.as_deref());
    log::info!("State log: {}", state_log_path.display());
    let store = Arc::new(StateStore::open(state_log_path)?);

    let config = RefreshConfig {
        save_to_dir,
        ..RefreshConfig::default()
    };
    Refresher::new(store, config)
}

/// Refresh everything. Returns `false` if any source failed.
async fn run_update(save_to_dir: Option<PathBuf>) -> Result<bool> {
    let refresher = open_refresher(save_to_dir)?;

    match refresher.refresh_all().await {
        Ok(summary) => {
            for (source, outcome) in &summary.outcomes {
                log::info!("{}: {:?}", source, outcome);
            }
            Ok(true)
        }
        Err(e) => {
            for failure in &e.failures {
                for error in &failure.errors {
                    log::error!("{} failed: {}", failure.source, error);
                }
            }
            Ok(false)
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum SingleSource {
    PriceHistory,
    CardDefinitions,
    BulkData,
    Sets,
}

impl SingleSource {
    fn file_name(self) -> &'static str {
        match self {
            SingleSource::PriceHistory => PRICE_HISTORY_FILE_NAME,
            SingleSource::CardDefinitions => CARD_DEFINITIONS_FILE_NAME,
            SingleSource::BulkData => SCRYFALL_BULK_FILE_NAME,
            SingleSource::Sets => SCRYFALL_SETS_FILE_NAME,
        }
    }
}

async fn run_download(target: DownloadTarget) -> Result<()> {
    let (args, source) = match target {
        DownloadTarget::Custom {
            url,
            decompress,
            save_as,
        } => return download_custom(&url, decompress, save_as).await,
        DownloadTarget::GoatbotsPriceHistory(args) => (args, SingleSource::PriceHistory),
        DownloadTarget::GoatbotsCardDefinitions(args) => (args, SingleSource::CardDefinitions),
        DownloadTarget::ScryfallBulkData(args) => (args, SingleSource::BulkData),
        DownloadTarget::ScryfallSets(args) => (args, SingleSource::Sets),
    };

    let refresher = open_refresher(args.save_to_dir)?;
    let destination = match args.save_as {
        Some(save_as) => Destination::parse(&save_as),
        None => refresher.config().destination(source.file_name()),
    };

    let outcome = match source {
        SingleSource::PriceHistory => refresher.refresh_prices(&destination).await?,
        SingleSource::CardDefinitions => refresher.refresh_card_definitions(&destination).await?,
        SingleSource::BulkData => refresher.refresh_bulk_data(&destination).await?,
        SingleSource::Sets => refresher.refresh_set_list(&destination).await?,
    };

    if outcome == RefreshOutcome::Refreshed {
        log::info!("Saved to {}", destination);
    }
    Ok(())
}

async fn download_custom(url: &str, decompress: bool, save_as: Option<String>) -> Result<()> {
    let is_zip = url_file_name(url).is_some_and(|name| name.ends_with(".zip"));
    if decompress && !is_zip {
        return Err(GetterError::InvalidArgument(format!(
            "--decompress needs a .zip URL, got {}",
            url
        )));
    }

    let config = RefreshConfig::default();
    let client = download::http_client()?;
    let bytes = download::with_retry(config.fetch_attempts, config.retry_delay, || {
        download::fetch_bytes(&client, url)
    })
    .await?;
    let bytes = if decompress {
        download::unzip_first_entry(&bytes)?
    } else {
        bytes
    };

    let destination = match save_as {
        Some(save_as) => Destination::parse(&save_as),
        None => {
            let name = url_file_name(url).unwrap_or("download");
            let name = if decompress {
                name.trim_end_matches(".zip")
            } else {
                name
            };
            Destination::in_dir(None, name)
        }
    };
    download::write_output(&bytes, &destination)
}

/// Last path segment of a URL, ignoring any query string
fn url_file_name(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().filter(|name| !name.is_empty())
}
