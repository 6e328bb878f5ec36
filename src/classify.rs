//! Intent classification.
//!
//! The completion model labels the turn; this module only builds the
//! prompt and reads a label back out of whatever the model said. Any
//! failure along the way resolves to [`Intent::Rules`], so a turn always
//! gets routed somewhere that can answer it.

use crate::llm::CompletionClient;
use crate::models::{ChatMessage, History, Intent};
use crate::prompts;

/// Assistant turns are cut to this many characters in the history summary.
const ASSISTANT_PREVIEW_CHARS: usize = 100;

/// Label the latest user turn.
pub async fn classify(
    client: &dyn CompletionClient,
    model: &str,
    query: &str,
    history: &History,
) -> Intent {
    let mut messages = vec![ChatMessage::system(prompts::INTENT)];
    if !history.is_empty() {
        messages.push(ChatMessage::user(format!(
            "History:\n{}",
            summarize_history(history)
        )));
    }
    messages.push(ChatMessage::user(format!("Query: {}", query)));

    match client.complete(model, &messages, 0.0, 10).await {
        Ok(raw) => {
            let intent = parse_intent(&raw);
            tracing::debug!(raw = %raw.trim(), %intent, "classified intent");
            intent
        }
        Err(e) => {
            tracing::warn!(error = %e, "intent classification failed, defaulting to rules");
            Intent::Rules
        }
    }
}

/// Read an intent out of raw model output.
///
/// Lowercases, keeps only letters and underscores, then returns the first
/// intent (in [`Intent::ALL`] order) whose name occurs in what is left.
pub fn parse_intent(raw: &str) -> Intent {
    let cleaned: String = raw
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphabetic() || *c == '_')
        .collect();

    Intent::ALL
        .iter()
        .copied()
        .find(|intent| cleaned.contains(intent.as_str()))
        .unwrap_or(Intent::Rules)
}

/// `User:`/`Judge:` transcript with assistant turns truncated.
pub fn summarize_history(history: &History) -> String {
    let mut out = String::new();
    for pair in history.chunks(2) {
        out.push_str(&format!("User: {}\n", pair[0]));
        if let Some(reply) = pair.get(1) {
            let preview: String = reply.chars().take(ASSISTANT_PREVIEW_CHARS).collect();
            out.push_str(&format!("Judge: {}...\n", preview));
        }
    }
    out
}
