//! Scryfall set list and next MTGO release prediction

use crate::error::{GetterError, Result};
use crate::state::{ReleaseInfo, RELEASE_DATE_FORMAT};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Scryfall set list endpoint
pub const SCRYFALL_SETS_URL: &str = "https://api.scryfall.com/sets";

/// Only this many of the most recently announced sets are considered when looking
/// for the next release
pub const SET_LOOKBACK: usize = 100;

/// Response of the Scryfall `/sets` endpoint, newest announced set first
#[derive(Debug, Deserialize)]
pub struct ScryfallSetList {
    #[serde(default)]
    pub has_more: bool,
    pub data: Vec<ScryfallSet>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ScryfallSet {
    pub name: String,
    /// `YYYY-MM-DD`, missing for sets without an announced date
    #[serde(default)]
    pub released_at: Option<String>,
    /// Such as `lci` for The Lost Caverns of Ixalan, absent if the set never comes to MTGO
    #[serde(default)]
    pub mtgo_code: Option<String>,
}

impl ScryfallSet {
    fn mtgo_code(&self) -> &str {
        self.mtgo_code.as_deref().unwrap_or_default()
    }

    /// Parsed release date
    pub fn release_date(&self) -> Result<NaiveDate> {
        let value = self.released_at.as_deref().unwrap_or_default();
        NaiveDate::parse_from_str(value, RELEASE_DATE_FORMAT).map_err(|source| {
            GetterError::InvalidDate {
                value: value.to_string(),
                source,
            }
        })
    }
}

impl ScryfallSetList {
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// The set that was announced most recently, i.e. the one furthest from release
    pub fn newest_announced(&self) -> Option<&ScryfallSet> {
        self.data.first()
    }

    pub fn next_released_mtgo_set(&self, now: DateTime<Utc>) -> Result<ReleaseInfo> {
        next_released_mtgo_set(&self.data, now)
    }
}

/// Find the set that will be released on MTGO next.
///
/// `sets` must be ordered newest announced first, so release dates run from future
/// to past. Walks the first [`SET_LOOKBACK`] sets with an MTGO code and keeps the
/// last one that isn't released yet; the first already released set ends the walk.
/// A set released exactly at `now` still counts as upcoming.
pub fn next_released_mtgo_set(sets: &[ScryfallSet], now: DateTime<Utc>) -> Result<ReleaseInfo> {
    let mut next: Option<ReleaseInfo> = None;

    for set in sets.iter().take(SET_LOOKBACK) {
        if set.mtgo_code().is_empty() {
            continue;
        }

        let release = ReleaseInfo {
            name: set.name.clone(),
            released_at: set.release_date()?,
            mtgo_code: set.mtgo_code().to_string(),
        };
        if release.release_instant() < now {
            if next.is_some() {
                break;
            }
            // Newest MTGO set is already out, nothing is upcoming
            return Err(GetterError::NoUpcomingRelease { after: now });
        }

        next = Some(release);
    }

    let next = next.ok_or(GetterError::NoUpcomingRelease { after: now })?;
    log::debug!("Next MTGO release: {} on {}", next.name, next.released_at);
    Ok(next)
}

#[cfg(test)]
#[path = "sets_tests.rs"]
mod tests;
