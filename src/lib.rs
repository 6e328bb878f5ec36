//! # MTG Judge
//!
//! A rules-judge assistant for Magic: The Gathering that answers questions
//! by combining three kinds of evidence: comprehensive-rules text found by
//! semantic search, card data from a remote catalog, and a language-model
//! completion that writes the answer.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌────────────┐
//!  turn ─────────▶│ Classifier │
//!                 └─────┬──────┘
//!                       ▼
//!              ┌─────────────────┐     ┌───────────┐
//!              │   Orchestrator  │────▶│  Catalog  │  (Scryfall, Cardtrader)
//!              │ handlers+session│     └───────────┘
//!              └──┬───────────┬──┘
//!                 ▼           ▼
//!          ┌───────────┐ ┌──────────┐
//!          │ Retriever │ │   LLM    │──▶ format check ──▶ deep-tier retry
//!          │ (SQLite)  │ │          │
//!          └───────────┘ └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! judge init                                   # create the index file
//! judge index build --rules MagicCompRules.txt # segment + embed the rules
//! judge ask "Can I Bolt the Bird?"
//! judge chat                                   # interactive session
//! judge serve                                  # HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Typed failures at component seams |
//! | [`models`] | Core data types |
//! | [`db`] | SQLite connection |
//! | [`migrate`] | Index schema |
//! | [`chunk`] | Rulebook segmentation |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Vector index store |
//! | [`index_cmd`] | Index build and stats commands |
//! | [`retrieve`] | Semantic retriever |
//! | [`llm`] | Completion client |
//! | [`classify`] | Intent classifier |
//! | [`extract`] | Card name extraction and search translation |
//! | [`session`] | Per-conversation context |
//! | [`validate`] | Rules answer format check |
//! | [`gateway`] | Card catalog gateway |
//! | [`pricing`] | Price sources and market statistics |
//! | [`links`] | Marketplace URLs |
//! | [`prompts`] | Model instructions and canned replies |
//! | [`versions`] | Versions menu and price report |
//! | [`orchestrator`] | Turn handling and intent handlers |
//! | [`server`] | HTTP API |
//! | [`chat_cmd`] | Terminal front ends |

pub mod chat_cmd;
pub mod chunk;
pub mod classify;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod gateway;
pub mod index;
pub mod index_cmd;
pub mod links;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod orchestrator;
pub mod pricing;
pub mod prompts;
pub mod retrieve;
pub mod server;
pub mod session;
pub mod validate;
pub mod versions;
