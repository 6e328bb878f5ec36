//! Card name extraction and search-query translation.
//!
//! Both go through the completion model and both have to survive bad
//! output: extraction falls back to an empty list, translation falls back
//! to the raw query.

use crate::llm::CompletionClient;
use crate::models::{ChatMessage, History};
use crate::prompts;

/// Card names mentioned in `query`, deduplicated, in first-seen order.
///
/// Only the query is sent. History is withheld so the model cannot
/// resolve "it" to a card from earlier turns.
pub async fn extract_cards(client: &dyn CompletionClient, model: &str, query: &str) -> Vec<String> {
    let messages = [
        ChatMessage::system(prompts::EXTRACT_CARDS),
        ChatMessage::user(format!("Query: {}", query)),
    ];

    let raw = match client.complete(model, &messages, 0.0, 100).await {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(error = %e, "card extraction failed");
            return Vec::new();
        }
    };

    let out = mentioned_names(parse_name_list(&raw), query);
    tracing::debug!(cards = ?out, "extracted card names");
    out
}

/// Keep names that occur in `query` (ignoring case), dropping repeats that
/// differ only in case. The first spelling seen wins.
pub fn mentioned_names(names: Vec<String>, query: &str) -> Vec<String> {
    let lowered = query.to_lowercase();
    let mut seen: Vec<String> = Vec::with_capacity(names.len());
    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let name = name.trim();
        let key = name.to_lowercase();
        if name.is_empty() || !lowered.contains(&key) || seen.contains(&key) {
            continue;
        }
        seen.push(key);
        out.push(name.to_string());
    }
    out
}

/// Parse a JSON string array, isolating the outermost `[...]` if the
/// strict parse fails. Anything unparseable yields an empty list.
pub fn parse_name_list(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if let Ok(names) = serde_json::from_str::<Vec<String>>(raw) {
        return names;
    }

    match (raw.find('['), raw.rfind(']')) {
        (Some(start), Some(end)) if start < end => {
            serde_json::from_str::<Vec<String>>(&raw[start..=end]).unwrap_or_default()
        }
        _ => Vec::new(),
    }
}

/// Translate a natural-language request into catalog search syntax.
///
/// All-digit queries are returned as-is (they are ordinal selections).
/// The last two history entries go along as disambiguation context. On
/// failure the raw query is returned.
pub async fn translate_search_query(
    client: &dyn CompletionClient,
    model: &str,
    query: &str,
    history: &History,
) -> String {
    if is_ordinal(query) {
        return query.to_string();
    }

    let mut messages = vec![ChatMessage::system(prompts::SEARCH)];
    if !history.is_empty() {
        let tail = &history[history.len().saturating_sub(2)..];
        messages.push(ChatMessage::user(format!("Context: {:?}", tail)));
    }
    messages.push(ChatMessage::user(query));

    match client.complete(model, &messages, 0.0, 100).await {
        Ok(raw) => quote_named_search(raw.trim()),
        Err(e) => {
            tracing::warn!(error = %e, "search translation failed, using raw query");
            query.to_string()
        }
    }
}

/// `!Murktide Regent` → `!"Murktide Regent"`; anything else unchanged.
pub fn quote_named_search(search: &str) -> String {
    match search.strip_prefix('!') {
        Some(name) if name.contains(' ') && !search.contains('"') => format!("!\"{}\"", name),
        _ => search.to_string(),
    }
}

/// Exact-name catalog search for `name`.
pub fn exact_name_search(name: &str) -> String {
    format!("!\"{}\"", name)
}

/// Non-empty and all ASCII digits.
pub fn is_ordinal(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strict_json() {
        assert_eq!(parse_name_list(r#"["Black Lotus"]"#), vec!["Black Lotus"]);
        assert!(parse_name_list("[]").is_empty());
    }

    #[test]
    fn test_parse_bracket_fallback() {
        let raw = "Sure! Here you go: [\"Tundra\", \"Blood Moon\"] Hope that helps.";
        assert_eq!(parse_name_list(raw), vec!["Tundra", "Blood Moon"]);
    }

    #[test]
    fn test_parse_garbage_is_empty() {
        assert!(parse_name_list("no cards here").is_empty());
        assert!(parse_name_list("[not json]").is_empty());
        assert!(parse_name_list("] backwards [").is_empty());
    }

    #[test]
    fn test_mentioned_names_dedupes_ignoring_case() {
        let names = vec!["Black Lotus".to_string(), "black lotus".to_string()];
        assert_eq!(
            mentioned_names(names, "Is black lotus the same as Black Lotus?"),
            vec!["Black Lotus"]
        );
    }

    #[test]
    fn test_mentioned_names_drops_names_not_in_query() {
        let names = vec![
            " Tundra ".to_string(),
            "Blood Moon".to_string(),
            String::new(),
        ];
        assert_eq!(mentioned_names(names, "Does tundra dodge it?"), vec!["Tundra"]);
    }

    #[test]
    fn test_quote_named_search() {
        assert_eq!(quote_named_search("!Murktide Regent"), "!\"Murktide Regent\"");
        assert_eq!(quote_named_search("!\"Blood Moon\""), "!\"Blood Moon\"");
        assert_eq!(quote_named_search("!Tundra"), "!Tundra");
        assert_eq!(quote_named_search("t:goblin cmc=1"), "t:goblin cmc=1");
    }

    #[test]
    fn test_is_ordinal() {
        assert!(is_ordinal("2"));
        assert!(is_ordinal("10"));
        assert!(!is_ordinal(""));
        assert!(!is_ordinal("2."));
        assert!(!is_ordinal("two"));
    }
}
