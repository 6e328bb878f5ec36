//! Dialogue orchestrator.
//!
//! [`Judge::handle_turn`] runs one conversational turn end to end:
//!
//! 1. Take the caller's [`SessionContext`] (or start a fresh one).
//! 2. Classify the turn's intent.
//! 3. On `retry`, rewind to the previous user turn and classify that.
//! 4. Dispatch to the intent's handler.
//! 5. Record the intent and hand back the reply with the updated context.
//!
//! Every turn produces text. Handler failures are absorbed here: a card
//! that fails to resolve is skipped, a failed completion in a single-call
//! handler becomes an error line in the reply, and a rate limit on the
//! rules path becomes a fixed apology.
//!
//! # Escalation
//!
//! Rules answers on the fast tier are checked by [`validate`]. If a
//! section is missing (or the fast call failed for a reason other than a
//! rate limit) the same messages are sent once to the deep tier, and that
//! answer is used without further checks.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::classify;
use crate::config::Config;
use crate::embedding;
use crate::error::CompletionError;
use crate::extract;
use crate::gateway::{self, CardGateway, ScryfallGateway};
use crate::index;
use crate::llm::{ChatCompletionsClient, CompletionClient};
use crate::models::{CardRecord, ChatMessage, CorpusSegment, Intent, ModelTier};
use crate::pricing::{self, CardTraderSource, PriceSource};
use crate::prompts;
use crate::retrieve::Retriever;
use crate::session::SessionContext;
use crate::validate::validate;
use crate::versions;

const CARD_CONTEXT_CHAR_LIMIT: usize = 10_000;

/// Pronoun words that mark a search translation as unresolved.
const PRONOUN_WORDS: [&str; 3] = ["this", "it", "that"];

/// One turn as supplied by a caller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TurnRequest {
    pub query: String,
    #[serde(default)]
    pub history: Vec<String>,
    #[serde(default)]
    pub model_tier: ModelTier,
    #[serde(default)]
    pub session: Option<SessionContext>,
}

/// The reply to a turn, with the context to send back next time.
#[derive(Debug, Clone, Serialize)]
pub struct TurnResponse {
    pub response_text: String,
    pub intent: Intent,
    pub session: SessionContext,
}

/// Models and limits the handlers work with.
#[derive(Debug, Clone)]
pub struct JudgeSettings {
    pub fast_model: String,
    pub deep_model: String,
    pub classifier_model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_k: usize,
    pub rules_char_budget: usize,
    pub max_rulings: usize,
    pub secondary_sample: usize,
    pub spread_alert_pct: f64,
}

impl JudgeSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            fast_model: config.llm.fast_model.clone(),
            deep_model: config.llm.deep_model.clone(),
            classifier_model: config.llm.classifier_model().to_string(),
            temperature: config.llm.temperature,
            max_output_tokens: config.llm.max_output_tokens,
            top_k: config.retrieval.top_k,
            rules_char_budget: config.retrieval.rules_char_budget,
            max_rulings: config.catalog.max_rulings,
            secondary_sample: config.pricing.secondary_sample,
            spread_alert_pct: config.pricing.spread_alert_pct,
        }
    }

    fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Fast => &self.fast_model,
            ModelTier::Deep => &self.deep_model,
        }
    }
}

/// The assembled assistant. Cheap to share behind an `Arc`.
pub struct Judge {
    llm: Arc<dyn CompletionClient>,
    cards: Arc<dyn CardGateway>,
    retriever: Arc<Retriever>,
    prices: Option<Arc<dyn PriceSource>>,
    settings: JudgeSettings,
}

/// Working state of a turn while a handler runs.
struct Turn<'a> {
    query: &'a str,
    history: &'a [String],
    tier: ModelTier,
    session: &'a mut SessionContext,
}

impl Judge {
    pub fn new(
        llm: Arc<dyn CompletionClient>,
        cards: Arc<dyn CardGateway>,
        retriever: Arc<Retriever>,
        prices: Option<Arc<dyn PriceSource>>,
        settings: JudgeSettings,
    ) -> Self {
        Self {
            llm,
            cards,
            retriever,
            prices,
            settings,
        }
    }

    /// Load the index and connect every collaborator named in `config`.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let index = Arc::new(index::load(&config.index.path).await?);

        let embed_config = config.embedding.with_model(index.embedding_model_id());
        let embedder: Arc<dyn embedding::EmbeddingProvider> =
            Arc::from(embedding::create_provider(&embed_config)?);
        let retriever = Retriever::new(index, embedder, config.retrieval.short_query_tokens)?;

        let llm = ChatCompletionsClient::from_config(&config.llm)
            .context("completion client unavailable")?;
        let cards = ScryfallGateway::new(&config.catalog)?;
        let prices = CardTraderSource::from_config(&config.pricing)?
            .map(|s| Arc::new(s) as Arc<dyn PriceSource>);
        if prices.is_none() {
            tracing::info!(
                env = %config.pricing.cardtrader_token_env,
                "no Cardtrader token; secondary prices disabled"
            );
        }

        Ok(Self::new(
            Arc::new(llm),
            Arc::new(cards),
            Arc::new(retriever),
            prices,
            JudgeSettings::from_config(config),
        ))
    }

    pub fn settings(&self) -> &JudgeSettings {
        &self.settings
    }

    /// Number of rule segments in the loaded index.
    pub fn index_len(&self) -> usize {
        self.retriever.index().len()
    }

    /// Run one turn.
    pub async fn handle_turn(&self, request: TurnRequest) -> TurnResponse {
        let mut session = request.session.unwrap_or_default();
        let mut query = request.query.trim().to_string();
        let mut history: &[String] = &request.history;

        let mut intent = self.classify(&query, history).await;

        if intent == Intent::Retry {
            if history.len() < 2 {
                session.last_intent = Some(Intent::Meta);
                return TurnResponse {
                    response_text: prompts::NOTHING_TO_RETRY.to_string(),
                    intent: Intent::Meta,
                    session,
                };
            }
            query = history[history.len() - 2].clone();
            history = &history[..history.len() - 2];
            tracing::info!(query = %query, "retrying previous turn");
            intent = self.classify(&query, history).await;
        }

        tracing::info!(%intent, tier = ?request.model_tier, "handling turn");

        let mut turn = Turn {
            query: &query,
            history,
            tier: request.model_tier,
            session: &mut session,
        };

        let response_text = match intent {
            Intent::Meta => self.single_call(prompts::META, &turn).await,
            Intent::OffTopic => self.single_call(prompts::OFF_TOPIC, &turn).await,
            Intent::Clarify => self.single_call(prompts::CLARIFY, &turn).await,
            Intent::Lookup => self.handle_lookup(&mut turn).await,
            Intent::Versions => self.handle_versions(&mut turn).await,
            Intent::Market => self.handle_market(&mut turn).await,
            Intent::Rules | Intent::Retry => self.handle_rules(&mut turn).await,
        };

        session.last_intent = Some(intent);
        TurnResponse {
            response_text,
            intent,
            session,
        }
    }

    async fn classify(&self, query: &str, history: &[String]) -> Intent {
        classify::classify(
            self.llm.as_ref(),
            &self.settings.classifier_model,
            query,
            history,
        )
        .await
    }

    async fn extract_into_session(&self, turn: &mut Turn<'_>) {
        let names = extract::extract_cards(
            self.llm.as_ref(),
            &self.settings.classifier_model,
            turn.query,
        )
        .await;
        turn.session.update_cards(&names);
    }

    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<String, CompletionError> {
        self.llm
            .complete(
                model,
                messages,
                self.settings.temperature,
                self.settings.max_output_tokens,
            )
            .await
    }

    /// Persona prompt plus the query, no grounding.
    async fn single_call(&self, system: &str, turn: &Turn<'_>) -> String {
        let messages = [ChatMessage::system(system), ChatMessage::user(turn.query)];
        let model = self.settings.model_for(turn.tier);
        self.complete(model, &messages)
            .await
            .unwrap_or_else(|e| error_reply(&e))
    }

    async fn handle_lookup(&self, turn: &mut Turn<'_>) -> String {
        self.extract_into_session(turn).await;
        let cards = gateway::resolve_all(self.cards.as_ref(), &turn.session.active_cards).await;

        let system = format!(
            "{}\n\n{}",
            prompts::LOOKUP,
            card_context(&cards, self.settings.max_rulings)
        );
        let messages = [ChatMessage::system(system), ChatMessage::user(turn.query)];
        let text = self
            .complete(self.settings.model_for(turn.tier), &messages)
            .await
            .unwrap_or_else(|e| error_reply(&e));

        with_image_first(first_card_image(turn.session, &cards), text)
    }

    async fn handle_rules(&self, turn: &mut Turn<'_>) -> String {
        self.extract_into_session(turn).await;
        let cards = gateway::resolve_all(self.cards.as_ref(), &turn.session.active_cards).await;
        if cards.is_empty() && !turn.session.active_cards.is_empty() {
            tracing::warn!(cards = ?turn.session.active_cards, "no card data resolved for active cards");
        }

        let segments = match self
            .retriever
            .retrieve(turn.query, turn.history, self.settings.top_k)
            .await
        {
            Ok(segments) => segments,
            Err(e) => {
                tracing::warn!(error = %e, "rules retrieval failed, answering without rules text");
                Vec::new()
            }
        };
        tracing::debug!(segments = segments.len(), "rule segments retrieved");

        let system = format!(
            "{}\n\n{}\n\n{}{}",
            prompts::JUDGE,
            card_context(&cards, self.settings.max_rulings),
            rules_context(&segments, self.settings.rules_char_budget),
            prompts::FORCE_TRUTH
        );

        let mut messages = vec![ChatMessage::system(system)];
        messages.extend(history_messages(turn.history));
        messages.push(ChatMessage::user(turn.query));

        let text = match self.complete_with_escalation(turn.tier, &messages).await {
            Ok(text) => text,
            Err(e) if e.is_rate_limited() => prompts::RATE_LIMIT_APOLOGY.to_string(),
            Err(e) => error_reply(&e),
        };

        with_image_first(first_card_image(turn.session, &cards), text)
    }

    /// Generate with the turn's tier; re-generate once on the deep tier
    /// when a fast answer is malformed.
    async fn complete_with_escalation(
        &self,
        tier: ModelTier,
        messages: &[ChatMessage],
    ) -> Result<String, CompletionError> {
        let first = self.complete(self.settings.model_for(tier), messages).await;
        if tier != ModelTier::Fast {
            return first;
        }

        let escalate = match &first {
            Err(e) if e.is_rate_limited() => false,
            Ok(text) => {
                let check = validate(text);
                if !check.is_valid {
                    tracing::info!(missing = ?check.missing_sections, "answer format invalid, escalating to deep tier");
                }
                !check.is_valid
            }
            Err(e) => {
                tracing::info!(error = %e, "fast tier failed, escalating to deep tier");
                true
            }
        };

        if !escalate {
            return first;
        }
        self.complete(&self.settings.deep_model, messages).await
    }

    async fn handle_versions(&self, turn: &mut Turn<'_>) -> String {
        self.extract_into_session(turn).await;
        let Some(first_card) = turn.session.first_card().map(str::to_string) else {
            return prompts::NO_CARD_IDENTIFIED.to_string();
        };

        let selected = turn.session.select_printing_by_ordinal(turn.query).cloned();

        let search = match &selected {
            Some(printing) => {
                tracing::info!(set = %printing.set_name, "printing selected by number");
                extract::exact_name_search(&printing.name)
            }
            None => {
                let translated = extract::translate_search_query(
                    self.llm.as_ref(),
                    &self.settings.classifier_model,
                    turn.query,
                    turn.history,
                )
                .await;
                repair_search(&translated, turn.query, &first_card)
            }
        };
        tracing::info!(search = %search, "searching printings");

        let printings = match self.cards.search_printings(&search).await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "printing search failed");
                Vec::new()
            }
        };
        if printings.is_empty() {
            return format!("No official records found for '{}'.", turn.query);
        }

        turn.session.active_printings = Some(printings.clone());

        let secondary = self.prices.as_deref();
        match selected {
            Some(printing) => {
                let quote = match secondary {
                    Some(source) => pricing::secondary_quote(source, &printing).await,
                    None => None,
                };
                versions::render_report(&printing, quote.as_ref(), self.settings.spread_alert_pct)
            }
            None => {
                let quotes =
                    versions::menu_quotes(&printings, secondary, self.settings.secondary_sample)
                        .await;
                versions::render_menu(&printings, &quotes)
            }
        }
    }

    async fn handle_market(&self, turn: &mut Turn<'_>) -> String {
        self.extract_into_session(turn).await;

        let mut analysis = String::new();
        let mut image = None;
        if let Some(card_name) = turn.session.first_card().map(str::to_string) {
            analysis = self.market_analysis(&card_name).await;
            image = match self.cards.resolve_by_exact_name(&card_name).await {
                Ok(card) => card.image_markdown(),
                Err(e) => {
                    tracing::warn!(card = %card_name, error = %e, "card lookup failed");
                    None
                }
            };
        }

        let messages = [
            ChatMessage::system(prompts::MARKET_ANALYST),
            ChatMessage::user(format!("Query: {}\n\n{}", turn.query, analysis)),
        ];
        let mut text = self
            .complete(self.settings.model_for(turn.tier), &messages)
            .await
            .unwrap_or_else(|e| error_reply(&e));

        if let Some(img) = image {
            text.push_str("\n\n");
            text.push_str(&img);
        }
        text
    }

    /// Statistics block for the analyst prompt.
    async fn market_analysis(&self, card_name: &str) -> String {
        let printings = match self
            .cards
            .search_printings(&extract::exact_name_search(card_name))
            .await
        {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(card = %card_name, error = %e, "printing search failed");
                Vec::new()
            }
        };

        let Some(stats) = pricing::market_stats(&printings) else {
            return format!(
                "\nSPECIFIC CARD ANALYSIS: No consistent price data found for {}.\n",
                card_name
            );
        };
        let mut block = format!("\n{}", stats.describe(card_name));

        // Compare marketplaces on the cheapest primary-priced printing.
        let cheapest = printings
            .iter()
            .filter(|p| p.eur().is_some())
            .min_by(|a, b| {
                a.eur()
                    .partial_cmp(&b.eur())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        if let (Some(source), Some(printing)) = (self.prices.as_deref(), cheapest) {
            if let (Some(primary), Some(quote)) = (
                printing.eur(),
                pricing::secondary_quote(source, printing).await,
            ) {
                let arb = pricing::arbitrage(primary, quote.amount, self.settings.spread_alert_pct);
                block.push_str(&format!(
                    "- Arbitrage ({}): {} {:.2}€ vs {} {:.2}€ ({:+.1}%, {:?})\n",
                    printing.set_name,
                    pricing::PRIMARY_SOURCE,
                    arb.primary,
                    quote.source,
                    arb.secondary,
                    arb.pct,
                    arb.rating
                ));
            }
        }
        block
    }
}

fn error_reply(err: &CompletionError) -> String {
    tracing::warn!(error = %err, "completion failed");
    format!("Error: {}", err)
}

/// Image for the first active card, if it resolved and has one.
fn first_card_image(session: &SessionContext, cards: &[CardRecord]) -> Option<String> {
    let first = session.first_card()?;
    cards
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(first))
        .and_then(CardRecord::image_markdown)
}

fn with_image_first(image: Option<String>, text: String) -> String {
    match image {
        Some(img) => format!("{}\n\n{}", img, text),
        None => text,
    }
}

/// Prior exchanges as alternating user/assistant messages. A trailing
/// unanswered user entry is dropped.
pub fn history_messages(history: &[String]) -> Vec<ChatMessage> {
    history
        .chunks_exact(2)
        .flat_map(|pair| {
            [
                ChatMessage::user(pair[0].as_str()),
                ChatMessage::assistant(pair[1].as_str()),
            ]
        })
        .collect()
}

/// Card data block for grounding, truncated to a fixed size.
pub fn card_context(cards: &[CardRecord], max_rulings: usize) -> String {
    if cards.is_empty() {
        return String::new();
    }

    let mut out = String::from("CARD DATA (Source of Truth):\n");
    for card in cards {
        let stats = match (&card.power, &card.toughness, &card.loyalty) {
            (Some(p), Some(t), _) => format!(" | P/T: {}/{}", p, t),
            (_, _, Some(l)) => format!(" | Loyalty: {}", l),
            _ => String::new(),
        };
        out.push_str(&format!(
            "Name: {}\nCost: {} | Type: {}{}\nOracle: {}\n",
            card.name, card.mana_cost, card.type_line, stats, card.oracle_text
        ));
        if !card.rulings.is_empty() {
            out.push_str("Official Rulings (Truncated):\n");
            for ruling in card.rulings.iter().take(max_rulings) {
                out.push_str(&format!("- {}\n", ruling));
            }
        }
        out.push_str("-------------------\n");
    }

    if out.chars().count() > CARD_CONTEXT_CHAR_LIMIT {
        let mut truncated: String = out.chars().take(CARD_CONTEXT_CHAR_LIMIT).collect();
        truncated.push_str("... [Truncated]");
        truncated
    } else {
        out
    }
}

/// Retrieved rules as `[id] text` lines. Once the next segment would push
/// past `budget` characters a truncation marker is appended instead.
pub fn rules_context(segments: &[CorpusSegment], budget: usize) -> String {
    let mut out = String::from("COMPREHENSIVE RULES:\n");
    let mut used = 0usize;
    for segment in segments {
        let line = format!("[{}] {}\n", segment.segment_id, segment.text);
        let len = line.chars().count();
        if used + len > budget {
            out.push_str("... [Additional rules truncated]");
            break;
        }
        out.push_str(&line);
        used += len;
    }
    out
}

/// Guard against degenerate search translations.
///
/// Falls back to an exact-name search for `first_card` when the
/// translation echoes the query, is too short, still contains a pronoun,
/// or is multi-word free text with neither `!` nor a `field:` qualifier.
pub fn repair_search(translated: &str, raw_query: &str, first_card: &str) -> String {
    let trimmed = translated.trim();
    let lowered = trimmed.to_lowercase();

    let echoes_query = lowered == raw_query.trim().to_lowercase();
    let too_short = trimmed.chars().count() < 3;
    let has_pronoun = lowered.contains("the card")
        || lowered
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| PRONOUN_WORDS.contains(&word));
    let looks_malformed = trimmed.contains(' ') && !trimmed.contains('!') && !trimmed.contains(':');

    if echoes_query || too_short || has_pronoun || looks_malformed {
        tracing::debug!(translated = %trimmed, "search translation rejected");
        extract::exact_name_search(first_card)
    } else {
        trimmed.to_string()
    }
}
