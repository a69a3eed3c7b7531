//! # Murshid
//!
//! A source-grounded, Arabic-first chat assistant core for internal
//! knowledge bases.
//!
//! Murshid keeps an ordered store of categorized sources (uploaded files,
//! links, pasted text) and answers questions strictly from them. Answers
//! come from a remote generative model when one is configured, with a local
//! keyword-template strategy underneath; replies can be spoken through a
//! TTS provider. The conversation layer keeps two independent logs — one
//! per source category — each with its own pending-turn gate.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌───────────────┐
//! │  Ingest   │──▶│ SourceStore │──▶│ AnswerEngine  │
//! │ file/url/ │   │ (JSON file) │   │ remote+local  │
//! │   text    │   └─────────────┘   └──────┬────────┘
//! └──────────┘                             │
//!                     ┌────────────────────┤
//!                     ▼                    ▼
//!               ┌──────────┐        ┌──────────┐
//!               │   CLI    │        │   HTTP   │
//!               │(murshid) │        │  (axum)  │
//!               └──────────┘        └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! murshid sources add policy.pdf --category repository
//! murshid ask "كم بدل السكن؟"
//! murshid speak "مرحباً بك" --out welcome.wav
//! murshid serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`phrases`] | Fixed Arabic response phrases and system instruction |
//! | [`store`] | Source store and persistence |
//! | [`ingest`] | File, URL, and text source ingestion |
//! | [`extract`] | Text extraction from PDF/DOCX/XLSX |
//! | [`engine`] | Answer strategy seam and error-to-phrase mapping |
//! | [`remote`] | Gemini `generateContent` strategy |
//! | [`fallback`] | Local keyword-template strategy |
//! | [`speech`] | TTS, PCM handling, and playback state |
//! | [`session`] | Per-category conversation logs and turn gating |
//! | [`server`] | JSON HTTP API |

pub mod config;
pub mod engine;
pub mod extract;
pub mod fallback;
pub mod ingest;
pub mod models;
pub mod phrases;
pub mod remote;
pub mod server;
pub mod session;
pub mod speech;
pub mod store;
