//! # Murshid CLI (`murshid`)
//!
//! The `murshid` binary manages the source store, answers one-off questions,
//! synthesizes speech, and starts the HTTP server that backs the chat
//! front-end.
//!
//! ## Usage
//!
//! ```bash
//! murshid --config ./config/murshid.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `murshid sources list` | List stored sources |
//! | `murshid sources add <file>` | Add a file, URL, or pasted text as a source |
//! | `murshid sources remove <id>` | Remove a source |
//! | `murshid sources select <id>` | Include or exclude a source from answering |
//! | `murshid sources clear` | Remove every source |
//! | `murshid ask "<question>"` | Answer a question from the stored sources |
//! | `murshid speak "<text>"` | Synthesize speech to a WAV file |
//! | `murshid serve` | Start the JSON HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Add the HR policy handbook to the repository tab
//! murshid sources add policy.pdf --category repository
//!
//! # Add pasted text under a display name
//! murshid sources add --text "بدل السكن 25% من الراتب الأساسي" --name "البدلات"
//!
//! # Ask against the advisor tab
//! murshid ask "كم بدل السكن؟"
//!
//! # Speak a reply (requires a configured TTS provider)
//! murshid speak "مرحباً بك" --out welcome.wav
//!
//! # Serve the HTTP API
//! murshid serve --config ./config/murshid.toml
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use murshid::config;
use murshid::engine::{AnswerEngine, AnswerStrategy};
use murshid::ingest;
use murshid::models::Category;
use murshid::remote::GeminiChat;
use murshid::server;
use murshid::session::ChatSession;
use murshid::speech::{self, GeminiTts, SpeechSynthesizer};
use murshid::store::{JsonFileRepository, SourceStore};

/// Murshid CLI — a source-grounded Arabic-first chat assistant core.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/murshid.example.toml` for a full example. Commands that
/// only touch the local store run fine without a config file.
#[derive(Parser)]
#[command(
    name = "murshid",
    about = "Murshid — a source-grounded Arabic-first chat assistant core",
    version,
    long_about = "Murshid keeps an ordered store of categorized sources (files, links, pasted \
    text) and answers questions strictly from them, via a remote generative model when one is \
    configured and a local keyword strategy otherwise. Replies can be spoken through a TTS \
    provider."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/murshid.toml`. Store path, model, TTS, server,
    /// and admin settings are read from this file; missing file means
    /// defaults (local-only answering).
    #[arg(long, global = true, default_value = "./config/murshid.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Manage the source store.
    Sources {
        #[command(subcommand)]
        action: SourcesAction,
    },

    /// Answer a question from the stored sources.
    ///
    /// Uses the remote model when `[model].provider` is configured and its
    /// API key is present, falling back to the local keyword strategy
    /// otherwise. Always prints an Arabic answer.
    Ask {
        /// The question text.
        question: String,

        /// Category to answer in: `advisor` or `repository`.
        #[arg(long, default_value = "advisor")]
        category: Category,

        /// Focus a single source by id (repository-style file Q&A).
        #[arg(long)]
        source: Option<String>,
    },

    /// Synthesize speech for a text and write it as a WAV file.
    ///
    /// Requires `[tts].provider` to be configured with its API key present.
    /// Output is 24 kHz 16-bit mono.
    Speak {
        /// The text to speak.
        text: String,

        /// Output WAV path.
        #[arg(long, default_value = "out.wav")]
        out: PathBuf,
    },

    /// Start the JSON HTTP server.
    ///
    /// Binds to the address configured in `[server].bind` and serves the
    /// chat, source management, TTS, and admin endpoints.
    Serve,
}

/// Source store subcommands.
#[derive(Subcommand)]
enum SourcesAction {
    /// List stored sources with ids, categories, and participation flags.
    List {
        /// Only list one category: `advisor` or `repository`.
        #[arg(long)]
        category: Option<Category>,
    },

    /// Add a source from a file, a URL, or pasted text.
    ///
    /// Exactly one of the file path, `--url`, or `--text` must be given.
    /// PDF, DOCX, and XLSX files also get their text extracted so the local
    /// strategy can match against them.
    Add {
        /// Path to the file to add.
        path: Option<PathBuf>,

        /// Fetch the source from a URL instead of a file.
        #[arg(long, conflicts_with = "path")]
        url: Option<String>,

        /// Use pasted text as the source content.
        #[arg(long, conflicts_with_all = ["path", "url"])]
        text: Option<String>,

        /// Category the source belongs to: `advisor` or `repository`.
        #[arg(long, default_value = "advisor")]
        category: Category,

        /// Display name override.
        #[arg(long)]
        name: Option<String>,
    },

    /// Remove a source by id. Removing an unknown id is a no-op.
    Remove {
        /// Source id.
        id: String,
    },

    /// Include a source in answering, or exclude it with `--off`.
    Select {
        /// Source id.
        id: String,

        /// Exclude the source instead of including it.
        #[arg(long)]
        off: bool,
    },

    /// Remove every stored source.
    Clear {
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "murshid=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Sources { action } => {
            let mut store = SourceStore::with_repository(Box::new(JsonFileRepository::new(
                cfg.store.path.clone(),
            )));
            run_sources(&mut store, action).await?;
        }
        Commands::Ask {
            question,
            category,
            source,
        } => {
            let store = SourceStore::with_repository(Box::new(JsonFileRepository::new(
                cfg.store.path.clone(),
            )));
            let engine = AnswerEngine::new(
                GeminiChat::from_config(&cfg.model)
                    .map(|s| Box::new(s) as Box<dyn AnswerStrategy>),
            );

            let mut session = ChatSession::new();
            session.set_active(category);
            if let Some(id) = &source {
                session
                    .focus_source(&store, id)
                    .map_err(|e| anyhow::anyhow!("{}", e))?;
            }

            let reply = session
                .send(&engine, &store, &question)
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            println!("{}", reply.text);
        }
        Commands::Speak { text, out } => {
            let tts = GeminiTts::from_config(&cfg.tts, &cfg.model.endpoint)
                .ok_or_else(|| anyhow::anyhow!(
                    "Speech synthesis is not configured. Set [tts].provider and the API key \
                     environment variable."
                ))?;
            let pcm = tts
                .synthesize(&text)
                .await
                .map_err(|e| anyhow::anyhow!("Speech synthesis failed: {}", e))?;
            let samples = speech::pcm_to_samples(&pcm);
            speech::write_wav(&out, &samples)?;
            println!(
                "Wrote {} ({:.1}s of audio).",
                out.display(),
                samples.len() as f64 / speech::SAMPLE_RATE as f64
            );
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

async fn run_sources(store: &mut SourceStore, action: SourcesAction) -> anyhow::Result<()> {
    match action {
        SourcesAction::List { category } => {
            let sources: Vec<_> = match category {
                Some(category) => store.list_by_category(category),
                None => store.all().iter().collect(),
            };
            if sources.is_empty() {
                println!("No sources stored.");
                return Ok(());
            }
            for source in sources {
                println!(
                    "{}  [{}] {} ({}{})",
                    source.id,
                    source.category,
                    source.name,
                    source.kind,
                    if source.selected { "" } else { ", excluded" }
                );
            }
        }
        SourcesAction::Add {
            path,
            url,
            text,
            category,
            name,
        } => {
            let mut draft = match (path, url, text) {
                (Some(path), None, None) => ingest::draft_from_file(&path, category)?,
                (None, Some(url), None) => {
                    let client = reqwest::Client::new();
                    ingest::draft_from_url(&client, &url, category).await?
                }
                (None, None, Some(text)) => ingest::draft_from_text(&text, category, None),
                _ => anyhow::bail!("Provide exactly one of a file path, --url, or --text."),
            };
            if let Some(name) = name {
                draft.name = name;
            }
            let source = store.add(draft);
            println!("Added source {} ({}).", source.id, source.name);
        }
        SourcesAction::Remove { id } => {
            store.remove(&id);
            println!("Removed source {} (if it existed).", id);
        }
        SourcesAction::Select { id, off } => {
            if store.get(&id).is_none() {
                anyhow::bail!("No source with id: {}", id);
            }
            store.set_selected(&id, !off);
            println!(
                "Source {} is now {} answering.",
                id,
                if off { "excluded from" } else { "included in" }
            );
        }
        SourcesAction::Clear { yes } => {
            if !yes {
                anyhow::bail!("Refusing to clear without --yes.");
            }
            let count = store.len();
            store.clear();
            println!("Removed {} source(s).", count);
        }
    }
    Ok(())
}
