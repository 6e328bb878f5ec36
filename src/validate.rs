//! Answer format check for rules responses.

/// Section markers a rules answer must contain, in presentation order.
pub const REQUIRED_SECTIONS: [&str; 4] = ["CARD INFO", "ORACLE TEXT", "RULING", "GAMEPLAY SCENARIO"];

/// Outcome of [`validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatCheck {
    pub is_valid: bool,
    pub missing_sections: Vec<&'static str>,
}

/// Case-insensitive presence check for every required section marker.
///
/// Order and structure are not checked; a marker anywhere in the text counts.
pub fn validate(text: &str) -> FormatCheck {
    let upper = text.to_uppercase();
    let missing_sections: Vec<&'static str> = REQUIRED_SECTIONS
        .iter()
        .copied()
        .filter(|marker| !upper.contains(marker))
        .collect();
    FormatCheck {
        is_valid: missing_sections.is_empty(),
        missing_sections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_answer() {
        let text = "1. 🃏 CARD INFO: x\n2. 📜 ORACLE TEXT: y\n3. ⚖️ RULING: z\n4. 💡 GAMEPLAY SCENARIO: w";
        assert!(validate(text).is_valid);
    }

    #[test]
    fn test_case_insensitive_and_unordered() {
        let text = "gameplay scenario, ruling, oracle text, card info";
        assert!(validate(text).is_valid);
    }

    #[test]
    fn test_reports_missing() {
        let check = validate("CARD INFO ... ORACLE TEXT ... GAMEPLAY SCENARIO");
        assert!(!check.is_valid);
        assert_eq!(check.missing_sections, vec!["RULING"]);
    }

    #[test]
    fn test_empty_text() {
        assert_eq!(validate("").missing_sections.len(), 4);
    }
}
