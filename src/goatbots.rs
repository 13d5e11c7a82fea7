//! Goatbots downloads: daily price history and card definitions
//!
//! Both come as zip archives holding a single JSON file keyed by Goatbots card ID.

use crate::error::Result;
use serde::Deserialize;
use std::collections::HashMap;

pub const GOATBOTS_PRICE_HISTORY_URL: &str = "https://www.goatbots.com/download/price-history.zip";
pub const GOATBOTS_CARD_DEFINITIONS_URL: &str =
    "https://www.goatbots.com/download/card-definitions.zip";

/// Card definition: name, cardset, rarity and foil (0/1)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CardDefinition {
    pub name: String,
    pub cardset: String,
    pub rarity: String,
    pub foil: u8,
}

/// Parse the price history: card ID to tix price
pub fn parse_price_history(bytes: &[u8]) -> Result<HashMap<String, f64>> {
    Ok(serde_json::from_slice(bytes)?)
}

pub fn parse_card_definitions(bytes: &[u8]) -> Result<HashMap<String, CardDefinition>> {
    Ok(serde_json::from_slice(bytes)?)
}
