//! Core data models used throughout the judge.
//!
//! These types represent the rule segments, card data, and conversation
//! turns that flow through the retrieval and answering pipeline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// One retrievable slice of the comprehensive rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusSegment {
    /// Last rule number seen in the segment (e.g. `"702.19c"`), or `"unknown"`.
    pub segment_id: String,
    pub text: String,
}

/// Canonical card data from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardRecord {
    pub name: String,
    pub mana_cost: String,
    pub type_line: String,
    pub oracle_text: String,
    pub power: Option<String>,
    pub toughness: Option<String>,
    pub loyalty: Option<String>,
    #[serde(default)]
    pub rulings: Vec<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl CardRecord {
    /// Markdown image reference, if the catalog supplied an image.
    pub fn image_markdown(&self) -> Option<String> {
        self.image_url
            .as_ref()
            .map(|url| format!("![{}]({})", self.name, url))
    }
}

/// A price as reported by the catalog: an amount, or `"N/A"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PriceValue {
    Amount(f64),
    Unavailable(String),
}

impl PriceValue {
    pub fn unavailable() -> Self {
        PriceValue::Unavailable("N/A".to_string())
    }

    /// Parse a catalog price string; anything non-numeric is unavailable.
    pub fn parse(raw: Option<&str>) -> Self {
        raw.and_then(|s| s.trim().parse::<f64>().ok())
            .map(PriceValue::Amount)
            .unwrap_or_else(PriceValue::unavailable)
    }

    pub fn amount(&self) -> Option<f64> {
        match self {
            PriceValue::Amount(v) => Some(*v),
            PriceValue::Unavailable(_) => None,
        }
    }
}

impl fmt::Display for PriceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceValue::Amount(v) => write!(f, "{:.2}", v),
            PriceValue::Unavailable(s) => f.write_str(s),
        }
    }
}

/// One concrete print of a card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Printing {
    /// Catalog identifier of this print, used to query other price sources.
    pub id: String,
    pub name: String,
    pub set_name: String,
    pub set_code: String,
    pub rarity: String,
    pub artist: String,
    pub collector_number: String,
    pub released_at: Option<NaiveDate>,
    #[serde(default)]
    pub finishes: BTreeSet<String>,
    /// Currency code (`eur`, `eur_foil`, `usd`, ...) to price.
    #[serde(default)]
    pub prices: BTreeMap<String, PriceValue>,
    /// `format:status` pairs, skipping formats where the card is not legal.
    #[serde(default)]
    pub legalities: String,
}

impl Printing {
    /// Primary-source (catalog EUR) price, if numeric.
    pub fn eur(&self) -> Option<f64> {
        self.prices.get("eur").and_then(PriceValue::amount)
    }
}

/// What kind of request a conversational turn represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Rules,
    Lookup,
    Versions,
    Market,
    Meta,
    Clarify,
    OffTopic,
    Retry,
}

impl Intent {
    /// Recognition order used when scanning classifier output.
    pub const ALL: [Intent; 8] = [
        Intent::Rules,
        Intent::Lookup,
        Intent::Meta,
        Intent::OffTopic,
        Intent::Clarify,
        Intent::Versions,
        Intent::Market,
        Intent::Retry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Rules => "rules",
            Intent::Lookup => "lookup",
            Intent::Versions => "versions",
            Intent::Market => "market",
            Intent::Meta => "meta",
            Intent::Clarify => "clarify",
            Intent::OffTopic => "off_topic",
            Intent::Retry => "retry",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which completion model a turn should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    #[default]
    Fast,
    Deep,
}

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A role-tagged message sent to the completion provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Alternating user/assistant entries, oldest first.
pub type History = [String];

/// Maximum history entries a caller keeps between turns (four exchanges).
pub const HISTORY_CAP: usize = 8;

/// Keep only the most recent [`HISTORY_CAP`] entries.
pub fn cap_history(history: &mut Vec<String>) {
    if history.len() > HISTORY_CAP {
        let excess = history.len() - HISTORY_CAP;
        history.drain(..excess);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_parse() {
        assert_eq!(PriceValue::parse(Some("12.50")), PriceValue::Amount(12.5));
        assert_eq!(PriceValue::parse(Some("N/A")), PriceValue::unavailable());
        assert_eq!(PriceValue::parse(None), PriceValue::unavailable());
    }

    #[test]
    fn test_price_serde_untagged() {
        let json = r#"{"eur": 3.5, "usd": "N/A"}"#;
        let prices: BTreeMap<String, PriceValue> = serde_json::from_str(json).unwrap();
        assert_eq!(prices["eur"].amount(), Some(3.5));
        assert_eq!(prices["usd"].amount(), None);
    }

    #[test]
    fn test_intent_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Intent::OffTopic).unwrap(),
            "\"off_topic\""
        );
        assert_eq!(Intent::OffTopic.to_string(), "off_topic");
    }

    #[test]
    fn test_cap_history_keeps_latest() {
        let mut h: Vec<String> = (0..11).map(|i| i.to_string()).collect();
        cap_history(&mut h);
        assert_eq!(h.len(), HISTORY_CAP);
        assert_eq!(h[0], "3");
        assert_eq!(h[7], "10");
    }

    #[test]
    fn test_image_markdown() {
        let card = CardRecord {
            name: "Black Lotus".into(),
            mana_cost: "{0}".into(),
            type_line: "Artifact".into(),
            oracle_text: "".into(),
            power: None,
            toughness: None,
            loyalty: None,
            rulings: vec![],
            image_url: Some("https://img/lotus.jpg".into()),
        };
        assert_eq!(
            card.image_markdown().unwrap(),
            "![Black Lotus](https://img/lotus.jpg)"
        );
    }
}
