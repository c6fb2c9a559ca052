//! Grantha — a local-first knowledge base of structured rules extracted
//! from classical Vedic astrology texts.
//!
//! The pipeline: PDF text extraction, deterministic lexicon-driven OCR
//! cleanup, sentence segmentation and relevance filtering, a multi-pattern
//! rule extractor with calibrated confidence, an optional local-LLM
//! readability pass guarded by a non-LLM validation gate, and a SQLite
//! store with typed multi-criteria search, full provenance, and
//! round-trippable export.

pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod kb;
pub mod lexicon;
pub mod models;
pub mod pipeline;

pub use error::KbError;
pub use export::Bundle;
pub use kb::{KnowledgeBase, StoreOutcome};
pub use lexicon::Lexicon;
pub use models::{
    AuthorityLevel, CorrectionReport, ImportReport, IngestReport, MergeStrategy, Rule, RuleFilter,
    SourceBook, StoreStats,
};
pub use pipeline::correction::{LlmClient, OllamaClient};

use tracing_subscriber::EnvFilter;

/// Initialize tracing with the standard filter. Call once from the binary
/// embedding the library; `RUST_LOG` overrides the default.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}
