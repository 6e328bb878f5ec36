//! Store links for Cardmarket and Cardtrader.

use regex::Regex;
use std::sync::OnceLock;

/// Lowercase, drop anything but `[a-z0-9]`, whitespace and `-`, then
/// collapse whitespace runs into single hyphens.
pub fn slugify(text: &str) -> String {
    static STRIP: OnceLock<Regex> = OnceLock::new();
    static SPACES: OnceLock<Regex> = OnceLock::new();
    let strip = STRIP.get_or_init(|| Regex::new(r"[^a-z0-9\s-]").expect("static regex"));
    let spaces = SPACES.get_or_init(|| Regex::new(r"\s+").expect("static regex"));

    let lowered = text.trim().to_lowercase();
    let kept = strip.replace_all(&lowered, "");
    spaces.replace_all(&kept, "-").into_owned()
}

/// Cardmarket path segment: hyphens for spaces, no apostrophes, dots or commas.
fn cardmarket_segment(text: &str) -> String {
    text.replace(' ', "-").replace(['\'', '.', ','], "")
}

pub fn cardmarket_search(card_name: &str) -> String {
    let query = urlencoding::encode(&format!("[{}]", card_name)).into_owned();
    format!(
        "https://www.cardmarket.com/en/Magic/Products/Search?searchMode=v2&idCategory=0&idExpansion=0&searchString={}&exactMatch=on&idRarity=0&perSite=30",
        query
    )
}

pub fn cardmarket_version(card_name: &str, set_name: &str) -> String {
    format!(
        "https://www.cardmarket.com/en/Magic/Products/Singles/{}/{}",
        cardmarket_segment(set_name),
        cardmarket_segment(card_name)
    )
}

pub fn cardtrader_search(card_name: &str) -> String {
    format!("https://www.cardtrader.com/en/cards/{}/versions", slugify(card_name))
}

pub fn cardtrader_version(card_name: &str, set_name: &str) -> String {
    format!(
        "https://www.cardtrader.com/en/cards/{}-{}",
        slugify(card_name),
        slugify(set_name)
    )
}
