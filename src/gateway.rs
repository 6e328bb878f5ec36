//! Card data gateway.
//!
//! [`CardGateway`] is what the dialogue handlers need from a card catalog:
//! canonical card text by exact name, and the list of printings matching a
//! catalog search. [`ScryfallGateway`] implements it against the Scryfall
//! REST API.
//!
//! Failures are typed. A card the catalog does not know is
//! [`GatewayError::NotFound`]; a broken connection is
//! [`GatewayError::Transport`]. Callers decide whether to skip or degrade.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use crate::config::CatalogConfig;
use crate::error::GatewayError;
use crate::models::{CardRecord, PriceValue, Printing};

/// Currencies copied from catalog results into [`Printing::prices`].
const PRICE_KEYS: [&str; 5] = ["eur", "eur_foil", "usd", "usd_foil", "tix"];

#[async_trait]
pub trait CardGateway: Send + Sync {
    /// Canonical card data for an exact card name.
    async fn resolve_by_exact_name(&self, name: &str) -> Result<CardRecord, GatewayError>;

    /// Printings matching a catalog search, oldest first, capped.
    /// No match is an empty list, not an error.
    async fn search_printings(&self, search: &str) -> Result<Vec<Printing>, GatewayError>;
}

/// Resolve every name, skipping the ones that fail.
pub async fn resolve_all(gateway: &dyn CardGateway, names: &[String]) -> Vec<CardRecord> {
    let mut cards = Vec::with_capacity(names.len());
    for name in names {
        match gateway.resolve_by_exact_name(name).await {
            Ok(card) => cards.push(card),
            Err(e) => tracing::warn!(card = %name, error = %e, "card lookup failed, skipping"),
        }
    }
    cards
}

pub struct ScryfallGateway {
    base_url: String,
    client: reqwest::Client,
    max_printings: usize,
}

#[derive(Deserialize)]
struct ImageUris {
    normal: Option<String>,
}

#[derive(Deserialize)]
struct CardFace {
    #[serde(default)]
    oracle_text: Option<String>,
    #[serde(default)]
    image_uris: Option<ImageUris>,
}

#[derive(Deserialize)]
struct ScryfallCard {
    id: String,
    name: String,
    #[serde(default)]
    mana_cost: Option<String>,
    #[serde(default)]
    type_line: Option<String>,
    #[serde(default)]
    oracle_text: Option<String>,
    power: Option<String>,
    toughness: Option<String>,
    loyalty: Option<String>,
    rulings_uri: Option<String>,
    image_uris: Option<ImageUris>,
    #[serde(default)]
    card_faces: Vec<CardFace>,
    #[serde(default)]
    set_name: String,
    #[serde(default)]
    set: String,
    #[serde(default)]
    rarity: String,
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    collector_number: String,
    released_at: Option<NaiveDate>,
    #[serde(default)]
    finishes: Vec<String>,
    #[serde(default)]
    prices: BTreeMap<String, Option<String>>,
    #[serde(default)]
    legalities: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct CardList {
    #[serde(default)]
    data: Vec<ScryfallCard>,
}

#[derive(Deserialize)]
struct Ruling {
    comment: String,
}

#[derive(Deserialize)]
struct RulingList {
    #[serde(default)]
    data: Vec<Ruling>,
}

impl ScryfallGateway {
    pub fn new(config: &CatalogConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("mtg-judge/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            max_printings: config.max_printings,
        })
    }

    async fn fetch_rulings(&self, uri: &str) -> Vec<String> {
        let result = async {
            let list: RulingList = self
                .client
                .get(uri)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            Ok::<_, reqwest::Error>(list.data.into_iter().map(|r| r.comment).collect())
        }
        .await;

        result.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "rulings fetch failed");
            Vec::new()
        })
    }
}

#[async_trait]
impl CardGateway for ScryfallGateway {
    async fn resolve_by_exact_name(&self, name: &str) -> Result<CardRecord, GatewayError> {
        let response = self
            .client
            .get(format!("{}/cards/named", self.base_url))
            .query(&[("exact", name)])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound(name.to_string()));
        }
        let card: ScryfallCard = response.error_for_status()?.json().await?;

        let rulings = match card.rulings_uri.as_deref() {
            Some(uri) => self.fetch_rulings(uri).await,
            None => Vec::new(),
        };

        Ok(card_record(card, rulings))
    }

    async fn search_printings(&self, search: &str) -> Result<Vec<Printing>, GatewayError> {
        let response = self
            .client
            .get(format!("{}/cards/search", self.base_url))
            .query(&[
                ("q", search),
                ("unique", "prints"),
                ("order", "released"),
                ("dir", "asc"),
            ])
            .send()
            .await?;

        // Scryfall answers a search with zero hits with 404.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let list: CardList = response.error_for_status()?.json().await?;

        Ok(list
            .data
            .into_iter()
            .take(self.max_printings)
            .map(printing)
            .collect())
    }
}

fn card_record(card: ScryfallCard, rulings: Vec<String>) -> CardRecord {
    let oracle_text = card.oracle_text.clone().unwrap_or_else(|| {
        let faces: Vec<&str> = card
            .card_faces
            .iter()
            .filter_map(|f| f.oracle_text.as_deref())
            .collect();
        if faces.is_empty() {
            "N/A".to_string()
        } else {
            faces.join("\n//\n")
        }
    });

    let image_url = card
        .image_uris
        .as_ref()
        .and_then(|i| i.normal.clone())
        .or_else(|| {
            card.card_faces
                .iter()
                .find_map(|f| f.image_uris.as_ref().and_then(|i| i.normal.clone()))
        });

    CardRecord {
        name: card.name,
        mana_cost: card.mana_cost.unwrap_or_else(|| "N/A".to_string()),
        type_line: card.type_line.unwrap_or_else(|| "N/A".to_string()),
        oracle_text,
        power: card.power,
        toughness: card.toughness,
        loyalty: card.loyalty,
        rulings,
        image_url,
    }
}

fn printing(card: ScryfallCard) -> Printing {
    let prices = PRICE_KEYS
        .iter()
        .map(|key| {
            let raw = card.prices.get(*key).and_then(|v| v.as_deref());
            (key.to_string(), PriceValue::parse(raw))
        })
        .collect();

    Printing {
        id: card.id,
        name: card.name,
        set_name: card.set_name,
        set_code: card.set.to_uppercase(),
        rarity: capitalize(&card.rarity),
        artist: card.artist.unwrap_or_default(),
        collector_number: card.collector_number,
        released_at: card.released_at,
        finishes: card.finishes.into_iter().collect::<BTreeSet<_>>(),
        prices,
        legalities: format_legalities(&card.legalities),
    }
}

/// `format:status` for every format the card is not `not_legal` in.
pub fn format_legalities(legalities: &BTreeMap<String, String>) -> String {
    legalities
        .iter()
        .filter(|(_, status)| status.as_str() != "not_legal")
        .map(|(format, status)| format!("{}:{}", format, status))
        .collect::<Vec<_>>()
        .join(", ")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOTUS_PRINT: &str = r#"{
        "id": "bd8fa327-dd41-4737-8f19-2cf5eb1f7cdd",
        "name": "Black Lotus",
        "mana_cost": "{0}",
        "type_line": "Artifact",
        "oracle_text": "{T}, Sacrifice Black Lotus: Add three mana of any one color.",
        "image_uris": {"normal": "https://cards.scryfall.io/normal/lotus.jpg"},
        "set_name": "Limited Edition Alpha",
        "set": "lea",
        "rarity": "rare",
        "artist": "Christopher Rush",
        "collector_number": "232",
        "released_at": "1993-08-05",
        "finishes": ["nonfoil"],
        "prices": {"eur": "25000.00", "usd": null, "tix": null},
        "legalities": {"vintage": "restricted", "legacy": "banned", "standard": "not_legal"}
    }"#;

    #[test]
    fn test_printing_from_catalog_json() {
        let card: ScryfallCard = serde_json::from_str(LOTUS_PRINT).unwrap();
        let p = printing(card);
        assert_eq!(p.set_code, "LEA");
        assert_eq!(p.rarity, "Rare");
        assert_eq!(p.eur(), Some(25000.0));
        assert_eq!(p.prices["usd"], PriceValue::unavailable());
        assert_eq!(p.prices["eur_foil"], PriceValue::unavailable());
        assert_eq!(p.legalities, "legacy:banned, vintage:restricted");
        assert_eq!(p.released_at, NaiveDate::from_ymd_opt(1993, 8, 5));
        assert!(p.finishes.contains("nonfoil"));
    }

    #[test]
    fn test_card_record_from_catalog_json() {
        let card: ScryfallCard = serde_json::from_str(LOTUS_PRINT).unwrap();
        let record = card_record(card, vec!["It's restricted.".into()]);
        assert_eq!(record.name, "Black Lotus");
        assert_eq!(record.mana_cost, "{0}");
        assert_eq!(
            record.image_url.as_deref(),
            Some("https://cards.scryfall.io/normal/lotus.jpg")
        );
        assert_eq!(record.rulings.len(), 1);
    }

    #[test]
    fn test_double_faced_card_joins_faces() {
        let json = r#"{
            "id": "x", "name": "Delver of Secrets // Insectile Aberration",
            "card_faces": [
                {"oracle_text": "At the beginning of your upkeep, look at the top card.",
                 "image_uris": {"normal": "https://img/front.jpg"}},
                {"oracle_text": "Flying"}
            ]
        }"#;
        let card: ScryfallCard = serde_json::from_str(json).unwrap();
        let record = card_record(card, vec![]);
        assert!(record.oracle_text.contains("\n//\nFlying"));
        assert_eq!(record.image_url.as_deref(), Some("https://img/front.jpg"));
        assert_eq!(record.type_line, "N/A");
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("mythic"), "Mythic");
        assert_eq!(capitalize(""), "");
    }
}
