use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Append-only per-source ingest audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub source_title: String,
    pub sentences_total: u64,
    pub sentences_astrological: u64,
    pub rules_extracted: u64,
    pub average_confidence: f32,
    /// Which extraction pass produced this record (e.g. "pattern_battery").
    pub method: String,
    pub recorded_at: NaiveDateTime,
}

/// Aggregate view of the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_rules: u64,
    pub unique_sources: u64,
    pub average_confidence: f32,
    /// Rule count per planet, canonical names only.
    pub planet_distribution: BTreeMap<String, u64>,
    /// Rule count per house 1–12.
    pub house_distribution: BTreeMap<u8, u64>,
}

/// Result of one `ingest_book` call. Always returned, even when most
/// sentences were dropped — this is the user-visible channel for partial
/// failures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub sentences_total: u64,
    pub sentences_astrological: u64,
    pub rules_stored: u64,
    pub rules_duplicate: u64,
    pub rules_rejected: u64,
    pub average_confidence: f32,
    pub warnings: Vec<String>,
}

/// Result of one `correct_pending` pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrectionReport {
    pub attempted: u64,
    pub accepted: u64,
    pub rejected: u64,
    /// Rules left retryable by batch-level failures (model unreachable,
    /// response count mismatch).
    pub retryable: u64,
}

/// Result of one `import_bundle` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub sources_registered: u64,
    pub rules_imported: u64,
    pub rules_skipped: u64,
}
