//! Versions menu and single-printing price report.

use crate::links;
use crate::pricing::{self, Arbitrage, PriceSource, Quote, SpreadRating};
use crate::models::Printing;

const RULE: &str = "----------------------------------------";

/// Primary quotes for every printing plus secondary quotes for the first
/// `secondary_sample` of them.
pub async fn menu_quotes(
    printings: &[Printing],
    secondary: Option<&dyn PriceSource>,
    secondary_sample: usize,
) -> Vec<Quote> {
    let mut quotes: Vec<Quote> = printings.iter().filter_map(pricing::primary_quote).collect();
    if let Some(source) = secondary {
        for p in printings.iter().take(secondary_sample) {
            if let Some(q) = pricing::secondary_quote(source, p).await {
                quotes.push(q);
            }
        }
    }
    quotes
}

pub fn lowest_summary(lowest: Option<&Quote>) -> String {
    match lowest {
        Some(q) => format!("📉 Lowest found: {:.2}€ on {}.", q.amount, q.source),
        None => "📉 Pricing data currently unavailable for these versions.".to_string(),
    }
}

/// Numbered list of printings in the order given, with store search links.
pub fn render_menu(printings: &[Printing], quotes: &[Quote]) -> String {
    let card_name = printings.first().map(|p| p.name.as_str()).unwrap_or("card");

    let mut out = format!(
        "Found {} versions of {}.\n{}\n\n",
        printings.len(),
        card_name,
        lowest_summary(pricing::lowest(quotes))
    );
    out.push_str("🛒 STORE SEARCH:\n");
    out.push_str(&format!("  • [Cardmarket]({})\n", links::cardmarket_search(card_name)));
    out.push_str(&format!("  • [Cardtrader]({})\n\n", links::cardtrader_search(card_name)));
    out.push_str("Which version would you like the full price analysis for?\n");

    for (i, p) in printings.iter().enumerate() {
        out.push_str(&format!(
            "{}. {} ({}) - {}\n",
            i + 1,
            p.set_name,
            p.set_code.to_uppercase(),
            p.rarity
        ));
    }

    out.push_str("\n(Reply with the number to see EN/NM minimums.)");
    out
}

/// Price report for one printing.
///
/// `secondary` is the second marketplace's quote, if one was found.
pub fn render_report(
    printing: &Printing,
    secondary: Option<&Quote>,
    spread_alert_pct: f64,
) -> String {
    let mut quotes: Vec<Quote> = pricing::primary_quote(printing).into_iter().collect();
    quotes.extend(secondary.cloned());

    let lowest = pricing::lowest(&quotes)
        .map(|q| q.to_string())
        .unwrap_or_else(|| "N/A".to_string());

    let mut out = format!("\n📊 {} | {}\n{}\n", printing.name, printing.set_name, RULE);
    out.push_str(&format!(
        "🃏 {} #{} | {} | {}\n",
        printing.set_code, printing.collector_number, printing.rarity, printing.artist
    ));
    out.push_str(&format!("💰 Lowest Price: {}\n", lowest));

    if let (Some(primary), Some(second)) = (printing.eur(), secondary) {
        out.push_str(&arbitrage_line(
            &pricing::arbitrage(primary, second.amount, spread_alert_pct),
            &second.source,
        ));
    }

    if !printing.legalities.is_empty() {
        out.push_str(&format!("⚖️ Legal: {}\n", printing.legalities));
    }

    out.push_str(&format!(
        "\n🛒 [Buy on Cardmarket]({})\n",
        links::cardmarket_version(&printing.name, &printing.set_name)
    ));
    out.push_str(&format!(
        "🛒 [Buy on Cardtrader]({})\n",
        links::cardtrader_version(&printing.name, &printing.set_name)
    ));
    out.push_str(RULE);
    out.push('\n');
    out
}

fn arbitrage_line(arb: &Arbitrage, secondary_name: &str) -> String {
    let rating = match arb.rating {
        SpreadRating::High => "High",
        SpreadRating::Normal => "Normal",
    };
    format!(
        "📈 Spread: {} {:+.2}€ ({:+.1}%) vs {} [{}]\n",
        secondary_name,
        arb.diff,
        arb.pct,
        pricing::PRIMARY_SOURCE,
        rating
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PriceValue;
    use std::collections::{BTreeMap, BTreeSet};

    fn printing(set_name: &str, set_code: &str, eur: Option<&str>) -> Printing {
        let mut prices = BTreeMap::new();
        prices.insert("eur".to_string(), PriceValue::parse(eur));
        Printing {
            id: format!("id-{}", set_code),
            name: "Black Lotus".into(),
            set_name: set_name.into(),
            set_code: set_code.into(),
            rarity: "Rare".into(),
            artist: "Christopher Rush".into(),
            collector_number: "232".into(),
            released_at: None,
            finishes: BTreeSet::new(),
            prices,
            legalities: "vintage:restricted".into(),
        }
    }

    #[test]
    fn test_menu_numbers_in_order() {
        let printings = vec![
            printing("Limited Edition Alpha", "lea", None),
            printing("Limited Edition Beta", "leb", Some("20000")),
            printing("Unlimited Edition", "2ed", Some("9000.5")),
        ];
        let quotes: Vec<Quote> = printings.iter().filter_map(pricing::primary_quote).collect();
        let menu = render_menu(&printings, &quotes);

        let alpha = menu.find("1. Limited Edition Alpha (LEA) - Rare").unwrap();
        let beta = menu.find("2. Limited Edition Beta (LEB) - Rare").unwrap();
        let unl = menu.find("3. Unlimited Edition (2ED) - Rare").unwrap();
        assert!(alpha < beta && beta < unl);
        assert!(menu.starts_with("Found 3 versions of Black Lotus.\n📉 Lowest found: 9000.50€ on Cardmarket."));
        assert!(menu.ends_with("(Reply with the number to see EN/NM minimums.)"));
    }

    #[test]
    fn test_lowest_summary_without_prices() {
        assert_eq!(
            lowest_summary(None),
            "📉 Pricing data currently unavailable for these versions."
        );
    }

    #[test]
    fn test_report_picks_cheaper_source() {
        let p = printing("Limited Edition Beta", "LEB", Some("100.00"));
        let ct = Quote {
            amount: 80.0,
            source: "Cardtrader".into(),
        };
        let report = render_report(&p, Some(&ct), 15.0);
        assert!(report.contains("📊 Black Lotus | Limited Edition Beta"));
        assert!(report.contains("💰 Lowest Price: 80.00€ (Cardtrader)"));
        assert!(report.contains("[High]"));
        assert!(report.contains("Singles/Limited-Edition-Beta/Black-Lotus"));
    }

    #[test]
    fn test_report_without_any_price() {
        let p = printing("Limited Edition Alpha", "LEA", None);
        let report = render_report(&p, None, 15.0);
        assert!(report.contains("💰 Lowest Price: N/A"));
        assert!(!report.contains("Spread"));
    }
}
