//! Per-conversation context carried between turns.
//!
//! The server keeps no sessions. Callers send the [`SessionContext`] they
//! got back from the previous turn and receive the updated one, so the
//! HTTP API and the interactive loop share one code path.

use serde::{Deserialize, Serialize};

use crate::extract::is_ordinal;
use crate::models::{Intent, Printing};

/// Cards under discussion, the last resolved intent, and the most
/// recently listed printings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    #[serde(default)]
    pub active_cards: Vec<String>,
    #[serde(default)]
    pub last_intent: Option<Intent>,
    #[serde(default)]
    pub active_printings: Option<Vec<Printing>>,
}

impl SessionContext {
    /// Switch the subject to `new_names`.
    ///
    /// Empty input keeps the current subject, which is what lets "what
    /// about its price?" follow a question about a named card. A different
    /// set of names drops any printings listed for the old subject. Names
    /// compare ignoring case.
    pub fn update_cards(&mut self, new_names: &[String]) {
        if new_names.is_empty() || self.same_cards(new_names) {
            return;
        }
        tracing::debug!(cards = ?new_names, "card context switched");
        self.active_cards = new_names.to_vec();
        self.active_printings = None;
    }

    /// Resolve a bare 1-based number against the listed printings.
    pub fn select_printing_by_ordinal(&self, text: &str) -> Option<&Printing> {
        if !is_ordinal(text) {
            return None;
        }
        let n: usize = text.parse().ok()?;
        let index = n.checked_sub(1)?;
        self.active_printings.as_ref()?.get(index)
    }

    fn same_cards(&self, names: &[String]) -> bool {
        names.len() == self.active_cards.len()
            && names
                .iter()
                .zip(&self.active_cards)
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }

    pub fn first_card(&self) -> Option<&str> {
        self.active_cards.first().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    fn printing(set_code: &str) -> Printing {
        Printing {
            id: format!("id-{}", set_code),
            name: "Black Lotus".into(),
            set_name: set_code.to_uppercase(),
            set_code: set_code.into(),
            rarity: "Rare".into(),
            artist: "Christopher Rush".into(),
            collector_number: "1".into(),
            released_at: None,
            finishes: BTreeSet::new(),
            prices: BTreeMap::new(),
            legalities: String::new(),
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_update_keeps_context() {
        let mut ctx = SessionContext::default();
        ctx.update_cards(&names(&["Goblin Lackey"]));
        ctx.active_printings = Some(vec![printing("ulg")]);
        ctx.update_cards(&[]);
        assert_eq!(ctx.active_cards, names(&["Goblin Lackey"]));
        assert!(ctx.active_printings.is_some());
    }

    #[test]
    fn test_same_cards_keep_printings() {
        let mut ctx = SessionContext::default();
        ctx.update_cards(&names(&["Tundra"]));
        ctx.active_printings = Some(vec![printing("lea")]);
        ctx.update_cards(&names(&["Tundra"]));
        assert!(ctx.active_printings.is_some());
    }

    #[test]
    fn test_case_only_change_keeps_printings() {
        let mut ctx = SessionContext::default();
        ctx.update_cards(&names(&["Black Lotus"]));
        ctx.active_printings = Some(vec![printing("lea")]);
        ctx.update_cards(&names(&["black lotus"]));
        assert_eq!(ctx.active_cards, names(&["Black Lotus"]));
        assert!(ctx.active_printings.is_some());
    }

    #[test]
    fn test_switch_clears_printings() {
        let mut ctx = SessionContext::default();
        ctx.update_cards(&names(&["Tundra"]));
        ctx.active_printings = Some(vec![printing("lea")]);
        ctx.update_cards(&names(&["Blood Moon"]));
        assert_eq!(ctx.active_cards, names(&["Blood Moon"]));
        assert!(ctx.active_printings.is_none());
    }

    #[test]
    fn test_ordinal_bounds() {
        let ctx = SessionContext {
            active_printings: Some(vec![printing("lea"), printing("leb"), printing("2ed")]),
            ..SessionContext::default()
        };
        assert!(ctx.select_printing_by_ordinal("0").is_none());
        assert!(ctx.select_printing_by_ordinal("4").is_none());
        assert_eq!(ctx.select_printing_by_ordinal("2").unwrap().set_code, "leb");
        assert!(ctx.select_printing_by_ordinal("two").is_none());
    }

    #[test]
    fn test_ordinal_without_list() {
        assert!(SessionContext::default().select_printing_by_ordinal("1").is_none());
    }

    #[test]
    fn test_deserialize_partial_context() {
        let ctx: SessionContext = serde_json::from_str(r#"{"active_cards":["Sol Ring"]}"#).unwrap();
        assert_eq!(ctx.active_cards, names(&["Sol Ring"]));
        assert!(ctx.last_intent.is_none());
    }
}
