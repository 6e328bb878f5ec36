//! Terminal front ends: `judge ask` (one turn) and `judge chat` (a loop).

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::config::Config;
use crate::models::{cap_history, ModelTier};
use crate::orchestrator::{Judge, TurnRequest};
use crate::session::SessionContext;

/// Run one turn and print the response as JSON.
pub async fn run_ask(config: &Config, query: &str, history: Vec<String>, deep: bool) -> Result<()> {
    let judge = Judge::from_config(config).await?;
    let mut history = history;
    cap_history(&mut history);

    let turn = judge
        .handle_turn(TurnRequest {
            query: query.to_string(),
            history,
            model_tier: tier(deep),
            session: None,
        })
        .await;

    println!("{}", serde_json::to_string_pretty(&turn)?);
    Ok(())
}

fn tier(deep: bool) -> ModelTier {
    if deep {
        ModelTier::Deep
    } else {
        ModelTier::Fast
    }
}

/// Interactive loop. Keeps the session context and the last four
/// exchanges between turns. `:deep` / `:fast` switch model tier.
///
/// Ctrl-C abandons the current line; Ctrl-D ends the session.
pub async fn run_chat(config: &Config, deep: bool) -> Result<()> {
    let judge = Judge::from_config(config).await?;
    let mut editor = DefaultEditor::new()?;
    let mut model_tier = tier(deep);
    let mut history: Vec<String> = Vec::new();
    let mut session = SessionContext::default();

    println!("\n=== MTG Rules Judge ===");
    println!("Authoritative rulings and card data. `:deep` / `:fast` switch model, `quit` exits.\n");

    loop {
        let prompt = format!("[{}] > ", tier_label(model_tier));
        // Readline blocks on the terminal; keep it off the async workers.
        let line = match tokio::task::block_in_place(|| editor.readline(&prompt)) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let input = line.trim().to_string();
        if !input.is_empty() {
            editor.add_history_entry(input.as_str())?;
        }

        match input.to_lowercase().as_str() {
            "" => continue,
            "quit" | "exit" | "q" => break,
            ":deep" => {
                model_tier = ModelTier::Deep;
                continue;
            }
            ":fast" => {
                model_tier = ModelTier::Fast;
                continue;
            }
            _ => {}
        }

        let turn = judge
            .handle_turn(TurnRequest {
                query: input.clone(),
                history: history.clone(),
                model_tier,
                session: Some(session),
            })
            .await;

        println!("🎯 Intent: {}", turn.intent);
        println!("\nJudge: {}", turn.response_text);

        history.push(input);
        history.push(turn.response_text);
        cap_history(&mut history);
        session = turn.session;
    }

    println!("Session ended.");
    Ok(())
}

fn tier_label(tier: ModelTier) -> &'static str {
    match tier {
        ModelTier::Fast => "fast",
        ModelTier::Deep => "deep",
    }
}
