//! The state log: last-refresh timestamps per data source and the next MTGO release
//!
//! Freshness checks are pure functions of the log and the current time (or an
//! externally reported timestamp). Every check has a matching `mark_*` method that
//! callers apply through [`StateStore`](super::StateStore) after a successful download.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Static title written at the top of the state log
pub const STATE_LOG_TITLE: &str = "log for MTGO Getter state, such as updated_at timestamps";

/// Goatbots republishes prices once a day at this hour (UTC)
pub const PRICE_ROLLOVER_HOUR_UTC: i64 = 4;

/// Time Goatbots needs after a release before new card definitions are published
pub const CARD_DEFINITIONS_GRACE_MINUTES: i64 = 20;

/// Date format used by Scryfall for `released_at`
pub const RELEASE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Timestamp that marks a data source as never refreshed
pub fn never_updated() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// A product release that will become available on MTGO
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInfo {
    pub name: String,
    pub released_at: NaiveDate,
    /// Empty if the product never comes to MTGO
    pub mtgo_code: String,
}

impl ReleaseInfo {
    /// The release date as an instant (midnight UTC)
    pub fn release_instant(&self) -> DateTime<Utc> {
        self.released_at.and_time(NaiveTime::MIN).and_utc()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goatbots {
    pub card_definitions_updated_at: DateTime<Utc>,
    pub prices_updated_at: DateTime<Utc>,
}

impl Goatbots {
    /// Prices are up to date if they were fetched after the most recent 04:00 UTC
    /// rollover that is not in the future
    pub fn is_price_updated(&self, now: DateTime<Utc>) -> bool {
        self.prices_updated_at > price_rollover_before(now)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scryfall {
    pub bulk_data_updated_at: DateTime<Utc>,
    #[serde(default, with = "release_entry")]
    pub next_released_mtgo_set: Option<ReleaseInfo>,
}

impl Scryfall {
    /// Bulk data is up to date if we downloaded it after Scryfall last regenerated it
    pub fn is_bulk_data_updated(&self, api_updated_at: DateTime<Utc>) -> bool {
        self.bulk_data_updated_at > api_updated_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateLog {
    pub title: String,
    pub goatbots: Goatbots,
    pub scryfall: Scryfall,
}

impl Default for StateLog {
    fn default() -> Self {
        Self {
            title: STATE_LOG_TITLE.to_string(),
            goatbots: Goatbots {
                card_definitions_updated_at: never_updated(),
                prices_updated_at: never_updated(),
            },
            scryfall: Scryfall {
                bulk_data_updated_at: never_updated(),
                next_released_mtgo_set: None,
            },
        }
    }
}

impl StateLog {
    /// Create a state log where every source is marked as never refreshed
    pub fn new() -> Self {
        Self::default()
    }

    /// Card definitions only go stale around a release.
    ///
    /// Never refreshed means stale. With no known next release the answer is "up to
    /// date", since there is nothing to judge against; refresh the set list first.
    /// Otherwise definitions are stale once the known release has passed and the last
    /// refresh is more than [`CARD_DEFINITIONS_GRACE_MINUTES`] old.
    pub fn is_card_definitions_updated(&self, now: DateTime<Utc>) -> bool {
        let updated_at = self.goatbots.card_definitions_updated_at;
        if updated_at == never_updated() {
            return false;
        }
        let Some(next) = &self.scryfall.next_released_mtgo_set else {
            return true;
        };

        let released = next.release_instant() < now;
        let outside_grace = updated_at < now - card_definitions_grace();
        !(released && outside_grace)
    }

    pub fn mark_prices_updated(&mut self, now: DateTime<Utc>) {
        advance(&mut self.goatbots.prices_updated_at, now);
    }

    /// Also forgets the known next release once it is past the propagation window,
    /// so the next set list refresh picks the following one.
    pub fn mark_card_definitions_updated(&mut self, now: DateTime<Utc>) {
        advance(&mut self.goatbots.card_definitions_updated_at, now);

        let landed = self
            .scryfall
            .next_released_mtgo_set
            .as_ref()
            .is_some_and(|next| now >= next.release_instant() + card_definitions_grace());
        if landed {
            if let Some(next) = self.scryfall.next_released_mtgo_set.take() {
                log::info!(
                    "{} has been released, clearing it as the next MTGO release",
                    next.name
                );
            }
        }
    }

    pub fn mark_bulk_data_updated(&mut self, now: DateTime<Utc>) {
        advance(&mut self.scryfall.bulk_data_updated_at, now);
    }

    /// Store the next release if none is known yet. Returns `false` (and leaves the
    /// log untouched) when a next release is already recorded.
    pub fn record_next_release(&mut self, release: ReleaseInfo) -> bool {
        if self.scryfall.next_released_mtgo_set.is_some() {
            return false;
        }
        self.scryfall.next_released_mtgo_set = Some(release);
        true
    }
}

/// The most recent price rollover at or before `now`
pub fn price_rollover_before(now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.date_naive().and_time(NaiveTime::MIN).and_utc()
        + TimeDelta::hours(PRICE_ROLLOVER_HOUR_UTC);
    if now < today {
        today - TimeDelta::days(1)
    } else {
        today
    }
}

fn card_definitions_grace() -> TimeDelta {
    TimeDelta::minutes(CARD_DEFINITIONS_GRACE_MINUTES)
}

/// Move a timestamp forward to `now` (whole seconds), never backward
fn advance(field: &mut DateTime<Utc>, now: DateTime<Utc>) {
    let now = now.with_nanosecond(0).unwrap_or(now);
    if now > *field {
        *field = now;
    }
}

/// On disk the next release is a table of plain strings where all-empty means unset
mod release_entry {
    use super::{ReleaseInfo, RELEASE_DATE_FORMAT};
    use chrono::NaiveDate;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Default, Serialize, Deserialize)]
    #[serde(default)]
    struct ReleaseEntry {
        name: String,
        released_at: String,
        mtgo_code: String,
    }

    pub fn serialize<S: Serializer>(
        value: &Option<ReleaseInfo>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let entry = match value {
            Some(info) => ReleaseEntry {
                name: info.name.clone(),
                released_at: info.released_at.format(RELEASE_DATE_FORMAT).to_string(),
                mtgo_code: info.mtgo_code.clone(),
            },
            None => ReleaseEntry::default(),
        };
        entry.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<ReleaseInfo>, D::Error> {
        let entry = ReleaseEntry::deserialize(deserializer)?;
        if entry.name.is_empty() && entry.released_at.is_empty() && entry.mtgo_code.is_empty()
        {
            return Ok(None);
        }
        if entry.name.is_empty() || entry.released_at.is_empty() {
            return Err(D::Error::custom(
                "next release entry must have both a name and a release date",
            ));
        }
        let released_at = NaiveDate::parse_from_str(&entry.released_at, RELEASE_DATE_FORMAT)
            .map_err(|e| D::Error::custom(format!("invalid released_at: {}", e)))?;

        Ok(Some(ReleaseInfo {
            name: entry.name,
            released_at,
            mtgo_code: entry.mtgo_code,
        }))
    }
}
