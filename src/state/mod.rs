//! Freshness bookkeeping for downloaded data

mod state_log;
pub mod persist;
mod store;

pub use state_log::{
    never_updated, price_rollover_before, Goatbots, ReleaseInfo, Scryfall, StateLog,
    CARD_DEFINITIONS_GRACE_MINUTES, PRICE_ROLLOVER_HOUR_UTC, RELEASE_DATE_FORMAT,
    STATE_LOG_TITLE,
};
pub use store::{StateHandle, StateStore};
