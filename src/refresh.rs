//! Refreshing downloaded data, skipping sources that are still fresh
//!
//! Each source follows the same two-phase pattern: lock the state log to check
//! freshness, unlock, download, then lock again to commit the new timestamp.
//! [`Refresher::refresh_all`] runs one task per source concurrently and collects every
//! failure without cancelling the other tasks.

use crate::download::{self, Destination};
use crate::error::{GetterError, Result};
use crate::goatbots;
use crate::scryfall::{self, BulkDataInfo, ScryfallSetList};
use crate::state::StateStore;
use chrono::Utc;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

pub const PRICE_HISTORY_FILE_NAME: &str = "price-history.json";
pub const CARD_DEFINITIONS_FILE_NAME: &str = "card-definitions.json";
pub const SCRYFALL_SETS_FILE_NAME: &str = "scryfall-sets.json";
pub const SCRYFALL_BULK_FILE_NAME: &str = "scryfall-bulk.json";

/// Data sources refreshed concurrently by [`Refresher::refresh_all`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    GoatbotsPriceHistory,
    /// Refreshes the Scryfall set list first to learn the next release
    GoatbotsCardDefinitions,
    ScryfallBulkData,
}

impl DataSource {
    pub const ALL: [DataSource; 3] = [
        DataSource::GoatbotsPriceHistory,
        DataSource::GoatbotsCardDefinitions,
        DataSource::ScryfallBulkData,
    ];
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::GoatbotsPriceHistory => write!(f, "Goatbots price history"),
            DataSource::GoatbotsCardDefinitions => write!(f, "Goatbots card definitions"),
            DataSource::ScryfallBulkData => write!(f, "Scryfall bulk data"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Data was still fresh, nothing downloaded
    Skipped,
    Refreshed,
}

/// Provider URLs, overridable for tests and mirrors
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub goatbots_price_history: String,
    pub goatbots_card_definitions: String,
    pub scryfall_sets: String,
    pub scryfall_bulk_info: String,
    /// Trusted prefix the bulk download URL is rebuilt from
    pub scryfall_bulk_download_prefix: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            goatbots_price_history: goatbots::GOATBOTS_PRICE_HISTORY_URL.to_string(),
            goatbots_card_definitions: goatbots::GOATBOTS_CARD_DEFINITIONS_URL.to_string(),
            scryfall_sets: scryfall::sets::SCRYFALL_SETS_URL.to_string(),
            scryfall_bulk_info: scryfall::bulk::SCRYFALL_BULK_INFO_URL.to_string(),
            scryfall_bulk_download_prefix: scryfall::bulk::SCRYFALL_BULK_DOWNLOAD_PREFIX
                .to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Directory downloads are saved to (current directory if `None`)
    pub save_to_dir: Option<PathBuf>,
    pub endpoints: Endpoints,
    /// Attempts per download before giving up
    pub fetch_attempts: usize,
    /// Delay before the first retry, doubled for each following retry
    pub retry_delay: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            save_to_dir: None,
            endpoints: Endpoints::default(),
            fetch_attempts: 3,
            retry_delay: Duration::from_millis(500),
        }
    }
}

impl RefreshConfig {
    /// Default output file for a download in the save directory
    pub fn destination(&self, file_name: &str) -> Destination {
        Destination::in_dir(self.save_to_dir.as_deref(), file_name)
    }
}

/// All errors reported by one refresh task
#[derive(Debug)]
pub struct TaskFailure {
    pub source: DataSource,
    pub errors: Vec<GetterError>,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.source)?;
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", error)?;
        }
        Ok(())
    }
}

/// One or more refresh tasks failed. Failures are in the order they were reported.
#[derive(Debug, Error)]
#[error("{} refresh task(s) failed: {}", .failures.len(), join_failures(.failures))]
pub struct RefreshError {
    pub failures: Vec<TaskFailure>,
}

impl RefreshError {
    /// The first reported error
    pub fn first(&self) -> Option<&GetterError> {
        self.failures.first().and_then(|f| f.errors.first())
    }
}

fn join_failures(failures: &[TaskFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(" | ")
}

/// What each source did during a successful [`Refresher::refresh_all`]
#[derive(Debug, Default)]
pub struct RefreshSummary {
    pub outcomes: Vec<(DataSource, RefreshOutcome)>,
}

impl RefreshSummary {
    pub fn outcome(&self, source: DataSource) -> Option<RefreshOutcome> {
        self.outcomes
            .iter()
            .find(|(s, _)| *s == source)
            .map(|(_, outcome)| *outcome)
    }
}

/// Downloads data that is out of date and records the refresh in the state log
#[derive(Clone)]
pub struct Refresher {
    store: Arc<StateStore>,
    client: reqwest::Client,
    config: Arc<RefreshConfig>,
}

impl Refresher {
    pub fn new(store: Arc<StateStore>, config: RefreshConfig) -> Result<Self> {
        Ok(Self {
            store,
            client: download::http_client()?,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &RefreshConfig {
        &self.config
    }

    /// Refresh every source concurrently.
    ///
    /// All tasks run to completion even if some fail; every failure is reported.
    pub async fn refresh_all(&self) -> std::result::Result<RefreshSummary, RefreshError> {
        // Each task reports at most one failure, so sends never wait
        let (error_tx, mut error_rx) = mpsc::channel::<TaskFailure>(DataSource::ALL.len());

        let mut handles = Vec::with_capacity(DataSource::ALL.len());
        for source in DataSource::ALL {
            log::info!("Updating {}", source);
            let refresher = self.clone();
            let error_tx = error_tx.clone();
            let handle = tokio::spawn(async move {
                match refresher.refresh_source(source).await {
                    Ok(outcome) => Some(outcome),
                    Err(errors) => {
                        if let Err(e) = error_tx.try_send(TaskFailure { source, errors }) {
                            log::error!("Failed to report {} failure: {}", source, e);
                        }
                        None
                    }
                }
            });
            handles.push((source, handle));
        }
        drop(error_tx);

        log::info!("Waiting for all downloads to finish");
        let mut summary = RefreshSummary::default();
        let mut panicked = Vec::new();
        for (source, handle) in handles {
            match handle.await {
                Ok(Some(outcome)) => summary.outcomes.push((source, outcome)),
                Ok(None) => {}
                Err(e) => panicked.push(TaskFailure {
                    source,
                    errors: vec![GetterError::Task(e)],
                }),
            }
        }

        let mut failures = Vec::new();
        while let Ok(failure) = error_rx.try_recv() {
            failures.push(failure);
        }
        failures.extend(panicked);

        if failures.is_empty() {
            log::info!("All downloads finished successfully");
            Ok(summary)
        } else {
            Err(RefreshError { failures })
        }
    }

    async fn refresh_source(
        &self,
        source: DataSource,
    ) -> std::result::Result<RefreshOutcome, Vec<GetterError>> {
        match source {
            DataSource::GoatbotsPriceHistory => {
                let destination = self.config.destination(PRICE_HISTORY_FILE_NAME);
                self.refresh_prices(&destination).await.map_err(|e| vec![e])
            }
            DataSource::GoatbotsCardDefinitions => {
                // Both steps always run; the set list keeps the next release current
                let mut errors = Vec::new();
                let sets_destination = self.config.destination(SCRYFALL_SETS_FILE_NAME);
                if let Err(e) = self.refresh_set_list(&sets_destination).await {
                    errors.push(e);
                }
                let destination = self.config.destination(CARD_DEFINITIONS_FILE_NAME);
                match self.refresh_card_definitions(&destination).await {
                    Ok(outcome) if errors.is_empty() => Ok(outcome),
                    Ok(_) => Err(errors),
                    Err(e) => {
                        errors.push(e);
                        Err(errors)
                    }
                }
            }
            DataSource::ScryfallBulkData => {
                let destination = self.config.destination(SCRYFALL_BULK_FILE_NAME);
                self.refresh_bulk_data(&destination).await.map_err(|e| vec![e])
            }
        }
    }

    pub async fn refresh_prices(&self, destination: &Destination) -> Result<RefreshOutcome> {
        let state_log = self.store.acquire().await;
        let up_to_date = state_log.goatbots.is_price_updated(Utc::now());
        state_log.release();

        if up_to_date {
            log::info!("Price history is up to date - no need to download");
            return Ok(RefreshOutcome::Skipped);
        }
        log::info!("Price history is out of date - downloading");

        let archive = self
            .fetch(&self.config.endpoints.goatbots_price_history)
            .await?;
        let json = download::unzip_first_entry(&archive)?;
        let prices = goatbots::parse_price_history(&json)?;
        log::info!("Fetched prices for {} cards", prices.len());
        download::write_output(&json, destination)?;

        self.store
            .update(|state_log| state_log.mark_prices_updated(Utc::now()))
            .await?;
        Ok(RefreshOutcome::Refreshed)
    }

    pub async fn refresh_card_definitions(
        &self,
        destination: &Destination,
    ) -> Result<RefreshOutcome> {
        let state_log = self.store.acquire().await;
        let up_to_date = state_log.is_card_definitions_updated(Utc::now());
        state_log.release();

        if up_to_date {
            log::info!("Card definitions are up to date - no need to download");
            return Ok(RefreshOutcome::Skipped);
        }
        log::info!("Card definitions are out of date - downloading");

        let archive = self
            .fetch(&self.config.endpoints.goatbots_card_definitions)
            .await?;
        let json = download::unzip_first_entry(&archive)?;
        let definitions = goatbots::parse_card_definitions(&json)?;
        log::info!("Fetched {} card definitions", definitions.len());
        download::write_output(&json, destination)?;

        self.store
            .update(|state_log| state_log.mark_card_definitions_updated(Utc::now()))
            .await?;
        Ok(RefreshOutcome::Refreshed)
    }

    /// Download the set list when no next MTGO release is known and record the
    /// upcoming one
    pub async fn refresh_set_list(&self, destination: &Destination) -> Result<RefreshOutcome> {
        let state_log = self.store.acquire().await;
        let known = state_log.scryfall.next_released_mtgo_set.clone();
        state_log.release();

        if let Some(next) = known {
            log::info!(
                "Next MTGO release ({} on {}) is known - no need to download set data",
                next.name,
                next.released_at
            );
            return Ok(RefreshOutcome::Skipped);
        }
        log::info!("Next MTGO release is unknown - downloading set data");

        let json = self.fetch(&self.config.endpoints.scryfall_sets).await?;
        let sets = ScryfallSetList::from_json_bytes(&json)?;
        let next = sets.next_released_mtgo_set(Utc::now())?;
        download::write_output(&json, destination)?;

        let mut recorded = false;
        self.store
            .update(|state_log| recorded = state_log.record_next_release(next.clone()))
            .await?;
        if recorded {
            log::info!(
                "Next MTGO release is {} on {}",
                next.name,
                next.released_at
            );
        } else {
            log::info!("Next MTGO release was recorded concurrently, keeping it");
        }
        Ok(RefreshOutcome::Refreshed)
    }

    pub async fn refresh_bulk_data(&self, destination: &Destination) -> Result<RefreshOutcome> {
        // The external freshness signal comes first, outside the lock
        let info_url = &self.config.endpoints.scryfall_bulk_info;
        let info: BulkDataInfo = serde_json::from_slice(&self.fetch(info_url).await?)?;
        let api_updated_at = info.updated_at()?;
        log::info!("Bulk data was last updated by Scryfall at {}", api_updated_at);

        let state_log = self.store.acquire().await;
        let up_to_date = state_log.scryfall.is_bulk_data_updated(api_updated_at);
        state_log.release();

        if up_to_date {
            log::info!("Bulk data is up to date - no need to download");
            return Ok(RefreshOutcome::Skipped);
        }

        let download_url =
            info.download_url(&self.config.endpoints.scryfall_bulk_download_prefix)?;
        let json = self.fetch(&download_url).await?;
        let cards = scryfall::mtgo_cards_from_json_bytes(&json)?;
        log::info!("Fetched {} MTGO cards from bulk data", cards.len());
        download::write_output(&serde_json::to_vec(&cards)?, destination)?;

        self.store
            .update(|state_log| state_log.mark_bulk_data_updated(Utc::now()))
            .await?;
        Ok(RefreshOutcome::Refreshed)
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        download::with_retry(self.config.fetch_attempts, self.config.retry_delay, || {
            download::fetch_bytes(&self.client, url)
        })
        .await
    }
}
