//! Book ingestion: PDF → cleaned sentences → candidate rules → store.
//!
//! Rules commit per sentence, so a cancelled ingest keeps everything
//! already stored, and re-running the same book is idempotent thanks to
//! deterministic rule ids.

use chrono::Utc;
use rusqlite::Connection;

use crate::db::repository::rule::{insert_rule, InsertOutcome};
use crate::db::repository::source::register_source;
use crate::db::repository::stats::record_extraction_stats;
use crate::db::DatabaseError;
use crate::error::KbError;
use crate::lexicon::Lexicon;
use crate::models::{
    rule_id, ExtractionStats, IngestReport, Rule, SourceBook,
};
use crate::pipeline::extraction::{
    is_astrological, segment_sentences, PdfTextExtractor, TextCleaner,
};
use crate::pipeline::rules::{Candidate, RuleExtractor};

/// Label recorded on the per-source audit row for this extraction pass.
const EXTRACTION_PASS: &str = "pattern_battery";

/// Ingest one book from PDF bytes. The report always comes back, even when
/// most sentences were dropped; only unreadable PDFs and structural store
/// failures are errors.
pub fn ingest_bytes(
    conn: &Connection,
    lexicon: &Lexicon,
    cleaner: &TextCleaner,
    extractor: &RuleExtractor<'_>,
    pdf_bytes: &[u8],
    source: &SourceBook,
) -> Result<IngestReport, KbError> {
    register_source(conn, source)?;

    let pages = PdfTextExtractor::extract_pages(pdf_bytes)?;
    let pages = cleaner.clean_pages(pages);
    let sentences = segment_sentences(&pages, lexicon);

    let mut report = IngestReport::default();
    let mut confidence_sum = 0.0f64;

    for sentence in &sentences {
        report.sentences_total += 1;
        if !is_astrological(&sentence.text, lexicon) {
            continue;
        }
        report.sentences_astrological += 1;

        for candidate in extractor.extract(&sentence.text) {
            let rule = rule_from_candidate(candidate, source, sentence.page_number);
            match insert_rule(conn, &rule) {
                Ok(InsertOutcome::Inserted) => {
                    confidence_sum += rule.confidence as f64;
                    report.rules_stored += 1;
                }
                Ok(InsertOutcome::Duplicate) => {
                    report.rules_duplicate += 1;
                }
                Err(DatabaseError::ConstraintViolation(reason)) => {
                    tracing::warn!(page = sentence.page_number, reason = %reason, "Rule rejected");
                    report.warnings.push(reason);
                    report.rules_rejected += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    if report.rules_stored > 0 {
        report.average_confidence = (confidence_sum / report.rules_stored as f64) as f32;
    }

    record_extraction_stats(
        conn,
        &ExtractionStats {
            source_title: source.title.clone(),
            sentences_total: report.sentences_total,
            sentences_astrological: report.sentences_astrological,
            rules_extracted: report.rules_stored,
            average_confidence: report.average_confidence,
            method: EXTRACTION_PASS.into(),
            recorded_at: Utc::now().naive_utc(),
        },
    )?;

    tracing::info!(
        source = %source.title,
        sentences = report.sentences_total,
        astrological = report.sentences_astrological,
        stored = report.rules_stored,
        duplicates = report.rules_duplicate,
        "Book ingested"
    );
    Ok(report)
}

/// Promote a transient candidate to a storable rule: deterministic id,
/// provenance, denormalized authority, creation timestamps.
pub fn rule_from_candidate(candidate: Candidate, source: &SourceBook, page: usize) -> Rule {
    let now = Utc::now().naive_utc();
    let id = rule_id(
        &source.title,
        &candidate.original_text,
        &candidate.conditions,
    );
    Rule {
        id,
        original_text: candidate.original_text,
        corrected_text: None,
        conditions: candidate.conditions,
        effects: candidate.effects,
        polarity: candidate.polarity,
        tags: candidate.tags,
        category: candidate.category,
        source_title: source.title.clone(),
        page: Some(page as u32),
        chapter: None,
        verse: None,
        authority_level: source.authority_level,
        confidence: candidate.confidence,
        extraction_method: candidate.extraction_method,
        correction: None,
        validated: false,
        created_at: now,
        updated_at: now,
    }
}
