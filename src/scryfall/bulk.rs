//! Scryfall bulk data (the "Default Cards" export)

use crate::error::{GetterError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata for the Default Cards bulk export
pub const SCRYFALL_BULK_INFO_URL: &str =
    "https://api.scryfall.com/bulk-data/e2ef41e3-5778-4bc2-af3f-78eca4dd9c23";

/// Bulk files are only downloaded from below this prefix.
/// Example download uri: https://data.scryfall.io/default-cards/default-cards-20230902211313.json
pub const SCRYFALL_BULK_DOWNLOAD_PREFIX: &str =
    "https://data.scryfall.io/default-cards/default-cards-";

const DOWNLOAD_FILE_MARKER: &str = "default-cards-";

/// Bulk data metadata, such as the download uri and when the export was generated
#[derive(Debug, Deserialize)]
pub struct BulkDataInfo {
    pub download_uri: String,
    pub updated_at: String,
}

impl BulkDataInfo {
    /// When Scryfall last regenerated the export
    pub fn updated_at(&self) -> Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.updated_at)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|source| GetterError::InvalidTimestamp {
                value: self.updated_at.clone(),
                source,
            })
    }

    /// Build the download URL from a trusted prefix and the file name part
    /// (`<timestamp>.json`) of the advertised uri, rather than GETting whatever
    /// the metadata says.
    pub fn download_url(&self, trusted_prefix: &str) -> Result<String> {
        let (_, file_suffix) = self
            .download_uri
            .split_once(DOWNLOAD_FILE_MARKER)
            .ok_or_else(|| {
                GetterError::MalformedResponse(format!(
                    "unexpected bulk data download uri: {}",
                    self.download_uri
                ))
            })?;

        if file_suffix.is_empty() || file_suffix.contains('/') {
            return Err(GetterError::MalformedResponse(format!(
                "unexpected bulk data file name in: {}",
                self.download_uri
            )));
        }

        Ok(format!("{}{}", trusted_prefix, file_suffix))
    }
}

/// A card from the bulk export, keeping only the fields we track
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ScryfallCard {
    /// 0 (or missing) for cards that aren't on MTGO
    #[serde(default)]
    pub mtgo_id: u32,
    pub name: String,
    #[serde(default)]
    pub released_at: String,
    #[serde(default)]
    pub rarity: String,
    #[serde(default)]
    pub prices: ScryfallPrices,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct ScryfallPrices {
    pub usd: Option<String>,
    pub usd_foil: Option<String>,
    pub eur: Option<String>,
    pub eur_foil: Option<String>,
    pub tix: Option<String>,
}

/// Parse a bulk export and drop every card that isn't available on MTGO
pub fn mtgo_cards_from_json_bytes(bytes: &[u8]) -> Result<Vec<ScryfallCard>> {
    let cards: Vec<ScryfallCard> = serde_json::from_slice(bytes)?;
    let total = cards.len();

    let mut mtgo_cards = Vec::with_capacity(total / 2 + 1);
    mtgo_cards.extend(cards.into_iter().filter(|card| card.mtgo_id != 0));

    log::debug!("Kept {} of {} bulk cards (MTGO only)", mtgo_cards.len(), total);
    Ok(mtgo_cards)
}
