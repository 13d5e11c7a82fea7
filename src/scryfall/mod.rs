//! Scryfall API: set list and bulk card data

pub mod bulk;
pub mod sets;

pub use bulk::{mtgo_cards_from_json_bytes, BulkDataInfo, ScryfallCard, ScryfallPrices};
pub use sets::{next_released_mtgo_set, ScryfallSet, ScryfallSetList};
