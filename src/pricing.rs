//! Price sources and market statistics.
//!
//! The catalog's own EUR price (Cardmarket trend) is the primary source.
//! A [`PriceSource`] can add a second marketplace; [`CardTraderSource`]
//! asks CardTrader for the cheapest English Near Mint listing. All
//! comparisons are in EUR, rounded to cents for display.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::config::PricingConfig;
use crate::error::GatewayError;
use crate::models::Printing;

pub const PRIMARY_SOURCE: &str = "Cardmarket";

/// A marketplace that can price a single printing.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Display name used in reports, e.g. `"Cardtrader"`.
    fn name(&self) -> &str;

    /// Cheapest English Near Mint price in EUR, or `None` if nothing is listed.
    async fn near_mint_eur(&self, printing: &Printing) -> Result<Option<f64>, GatewayError>;
}

/// A price and where it was found.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub amount: f64,
    pub source: String,
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}€ ({})", self.amount, self.source)
    }
}

/// Cheapest quote; ties keep the earlier one.
pub fn lowest(quotes: &[Quote]) -> Option<&Quote> {
    quotes.iter().fold(None, |best: Option<&Quote>, q| match best {
        Some(b) if b.amount <= q.amount => Some(b),
        _ => Some(q),
    })
}

/// Primary price of `printing` as a quote, if numeric.
pub fn primary_quote(printing: &Printing) -> Option<Quote> {
    printing.eur().map(|amount| Quote {
        amount,
        source: PRIMARY_SOURCE.to_string(),
    })
}

/// Secondary price of `printing`, logging and dropping failures.
pub async fn secondary_quote(source: &dyn PriceSource, printing: &Printing) -> Option<Quote> {
    match source.near_mint_eur(printing).await {
        Ok(Some(amount)) => Some(Quote {
            amount,
            source: source.name().to_string(),
        }),
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(source = source.name(), printing = %printing.id, error = %e, "secondary price lookup failed");
            None
        }
    }
}

/// Aggregate primary-source prices across all printings of one card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketStats {
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub price_spread: f64,
    pub version_count: usize,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// `None` when no printing has a numeric price.
///
/// `version_count` counts every printing, priced or not.
pub fn market_stats(printings: &[Printing]) -> Option<MarketStats> {
    let prices: Vec<f64> = printings.iter().filter_map(Printing::eur).collect();
    if prices.is_empty() {
        return None;
    }
    let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
    let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let avg = prices.iter().sum::<f64>() / prices.len() as f64;
    Some(MarketStats {
        avg_price: round2(avg),
        min_price: min,
        max_price: max,
        price_spread: round2(max - min),
        version_count: printings.len(),
    })
}

impl MarketStats {
    /// Grounding block for the market analyst prompt.
    pub fn describe(&self, card_name: &str) -> String {
        format!(
            "SPECIFIC CARD ANALYSIS (Scryfall Current Data): {}\n\
             - Avg Price: {:.2}€\n\
             - Price Spread: {:.2}€ | Range: {:.2}€ - {:.2}€\n\
             - Unique Versions: {}\n",
            card_name,
            self.avg_price,
            self.price_spread,
            self.min_price,
            self.max_price,
            self.version_count
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SpreadRating {
    High,
    Normal,
}

/// Gap between the primary and a secondary price for the same printing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Arbitrage {
    pub primary: f64,
    pub secondary: f64,
    pub diff: f64,
    pub pct: f64,
    pub rating: SpreadRating,
}

/// Percent gap is relative to the primary price; a zero primary gives 0%.
pub fn arbitrage(primary: f64, secondary: f64, alert_pct: f64) -> Arbitrage {
    let diff = secondary - primary;
    let pct = if primary > 0.0 {
        diff / primary * 100.0
    } else {
        0.0
    };
    Arbitrage {
        primary,
        secondary,
        diff,
        pct,
        rating: if pct.abs() > alert_pct {
            SpreadRating::High
        } else {
            SpreadRating::Normal
        },
    }
}

// ============ CardTrader ============

/// CardTrader marketplace API (v2), authenticated with a bearer token.
pub struct CardTraderSource {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct Blueprint {
    id: u64,
    #[serde(default)]
    scryfall_id: Option<String>,
}

#[derive(Deserialize)]
struct ProductPrice {
    cents: i64,
    currency: String,
}

#[derive(Deserialize)]
struct Product {
    price: ProductPrice,
    #[serde(default)]
    properties_hash: HashMap<String, serde_json::Value>,
}

impl CardTraderSource {
    /// Build from config, or `None` when no token is set in the environment.
    pub fn from_config(config: &PricingConfig) -> Result<Option<Self>, GatewayError> {
        match std::env::var(&config.cardtrader_token_env) {
            Ok(token) if !token.trim().is_empty() => {
                Self::new(&config.cardtrader_base_url, token).map(Some)
            }
            _ => Ok(None),
        }
    }

    pub fn new(base_url: &str, token: String) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, GatewayError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound(path.to_string()));
        }
        Ok(response.error_for_status()?.json().await?)
    }
}

fn is_english_near_mint(product: &Product) -> bool {
    let prop = |key: &str| {
        product
            .properties_hash
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };
    prop("condition").as_deref() == Some("Near Mint") && prop("mtg_language").as_deref() == Some("en")
}

/// The blueprint carrying this printing's catalog id. Any other blueprint
/// is a different card and must not be priced.
fn blueprint_for<'a>(blueprints: &'a [Blueprint], printing_id: &str) -> Option<&'a Blueprint> {
    blueprints
        .iter()
        .find(|b| b.scryfall_id.as_deref() == Some(printing_id))
}

#[async_trait]
impl PriceSource for CardTraderSource {
    fn name(&self) -> &str {
        "Cardtrader"
    }

    async fn near_mint_eur(&self, printing: &Printing) -> Result<Option<f64>, GatewayError> {
        let blueprints: Vec<Blueprint> = self
            .get_json("/blueprints/export", &[("scryfall_id", printing.id.as_str())])
            .await?;

        let Some(blueprint) = blueprint_for(&blueprints, &printing.id) else {
            return Ok(None);
        };

        let blueprint_id = blueprint.id.to_string();
        let products: HashMap<String, Vec<Product>> = self
            .get_json("/marketplace/products", &[("blueprint_id", blueprint_id.as_str())])
            .await?;

        let cheapest = products
            .values()
            .flatten()
            .filter(|p| p.price.currency.eq_ignore_ascii_case("EUR") && is_english_near_mint(p))
            .map(|p| p.price.cents)
            .min();

        Ok(cheapest.map(|cents| cents as f64 / 100.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PriceValue;
    use std::collections::{BTreeMap, BTreeSet};

    fn priced(eur: Option<&str>) -> Printing {
        let mut prices = BTreeMap::new();
        prices.insert("eur".to_string(), PriceValue::parse(eur));
        Printing {
            id: "id".into(),
            name: "Sol Ring".into(),
            set_name: "Set".into(),
            set_code: "SET".into(),
            rarity: "Uncommon".into(),
            artist: "Mark Tedin".into(),
            collector_number: "1".into(),
            released_at: None,
            finishes: BTreeSet::new(),
            prices,
            legalities: String::new(),
        }
    }

    #[test]
    fn test_market_stats() {
        let printings = vec![
            priced(Some("1.00")),
            priced(Some("2.50")),
            priced(None),
            priced(Some("4.00")),
        ];
        let stats = market_stats(&printings).unwrap();
        assert_eq!(stats.avg_price, 2.5);
        assert_eq!(stats.min_price, 1.0);
        assert_eq!(stats.max_price, 4.0);
        assert_eq!(stats.price_spread, 3.0);
        assert_eq!(stats.version_count, 4);
    }

    #[test]
    fn test_market_stats_without_prices() {
        assert!(market_stats(&[priced(None)]).is_none());
        assert!(market_stats(&[]).is_none());
    }

    #[test]
    fn test_arbitrage_rating() {
        assert_eq!(arbitrage(10.0, 12.0, 15.0).rating, SpreadRating::High);
        assert_eq!(arbitrage(10.0, 11.0, 15.0).rating, SpreadRating::Normal);
        assert_eq!(arbitrage(10.0, 8.0, 15.0).rating, SpreadRating::High);
        assert_eq!(arbitrage(0.0, 5.0, 15.0).pct, 0.0);
    }

    #[test]
    fn test_lowest_quote() {
        let quotes = vec![
            Quote { amount: 3.0, source: "Cardmarket".into() },
            Quote { amount: 2.0, source: "Cardtrader".into() },
            Quote { amount: 2.0, source: "Cardmarket".into() },
        ];
        let best = lowest(&quotes).unwrap();
        assert_eq!(best.source, "Cardtrader");
        assert_eq!(best.to_string(), "2.00€ (Cardtrader)");
        assert!(lowest(&[]).is_none());
    }

    #[test]
    fn test_blueprint_must_match_printing() {
        let json = r#"[{"id": 7, "scryfall_id": "other"}, {"id": 9}]"#;
        let blueprints: Vec<Blueprint> = serde_json::from_str(json).unwrap();
        assert!(blueprint_for(&blueprints, "lotus-lea").is_none());

        let json = r#"[{"id": 7, "scryfall_id": "other"}, {"id": 9, "scryfall_id": "lotus-lea"}]"#;
        let blueprints: Vec<Blueprint> = serde_json::from_str(json).unwrap();
        assert_eq!(blueprint_for(&blueprints, "lotus-lea").map(|b| b.id), Some(9));
    }

    #[test]
    fn test_english_near_mint_filter() {
        let json = r#"{"price": {"cents": 150, "currency": "EUR"},
                       "properties_hash": {"condition": "Near Mint", "mtg_language": "en", "mtg_foil": false}}"#;
        let product: Product = serde_json::from_str(json).unwrap();
        assert!(is_english_near_mint(&product));

        let json = r#"{"price": {"cents": 90, "currency": "EUR"},
                       "properties_hash": {"condition": "Played", "mtg_language": "en"}}"#;
        let product: Product = serde_json::from_str(json).unwrap();
        assert!(!is_english_near_mint(&product));
    }
}
