//! MTGO Getter - keeps MTGO data downloads fresh
//!
//! Downloads Goatbots price history and card definitions, and Scryfall set and
//! bulk card data. A TOML state log records when each source was last refreshed
//! so that repeated runs only download what has changed.

pub mod download;
pub mod error;
pub mod goatbots;
pub mod refresh;
pub mod scryfall;
pub mod state;

pub use download::Destination;
pub use error::{GetterError, Result};
pub use refresh::{
    DataSource, RefreshConfig, RefreshError, RefreshOutcome, RefreshSummary, Refresher,
};
pub use state::{StateLog, StateStore};
