//! The knowledge base facade: one connection, one writer, and the full
//! programmatic API external consumers (CLI, interpretation engines) call.

use std::path::Path;

use chrono::Utc;
use rusqlite::Connection;

use crate::config::PipelineConfig;
use crate::db::repository::audit::{correction_audit_for, CorrectionAuditEntry};
use crate::db::repository::rule::{
    get_rule, insert_rule, insert_rules_batch, mark_validated, InsertOutcome,
};
use crate::db::repository::search::{conflicting_rules, search_rules};
use crate::db::repository::source::{get_source, list_sources, register_source};
use crate::db::repository::stats::{extraction_stats_for, store_stats};
use crate::db::sqlite::{open_database, open_memory_database};
use crate::db::DatabaseError;
use crate::error::KbError;
use crate::export::{export, import_bundle, Bundle};
use crate::lexicon::Lexicon;
use crate::models::{
    CorrectionReport, ExtractionStats, ImportReport, IngestReport, MergeStrategy, Rule, RuleFilter,
    SourceBook, StoreStats,
};
use crate::pipeline::correction::{correct_pending, CorrectorConfig, LlmClient, OllamaClient};
use crate::pipeline::extraction::TextCleaner;
use crate::pipeline::ingest::ingest_bytes;
use crate::pipeline::rules::RuleExtractor;

/// Outcome of `store_rule`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    Stored,
    /// The id already exists; nothing was written.
    Duplicate,
    Rejected(String),
}

pub struct KnowledgeBase {
    conn: Connection,
    lexicon: Lexicon,
    config: PipelineConfig,
}

impl KnowledgeBase {
    /// Open (or create) a knowledge base at the given path.
    pub fn open(path: &Path) -> Result<Self, KbError> {
        Ok(Self {
            conn: open_database(path)?,
            lexicon: Lexicon::default_bundled(),
            config: PipelineConfig::default(),
        })
    }

    /// In-memory knowledge base (tests, scratch work).
    pub fn open_in_memory() -> Result<Self, KbError> {
        Ok(Self {
            conn: open_memory_database()?,
            lexicon: Lexicon::default_bundled(),
            config: PipelineConfig::default(),
        })
    }

    /// Replace the bundled lexicon with a custom one.
    pub fn with_lexicon(mut self, lexicon: Lexicon) -> Self {
        self.lexicon = lexicon;
        self
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    // ── Source registry ─────────────────────────────────────────────────

    pub fn register_source(&self, source: &SourceBook) -> Result<SourceBook, KbError> {
        Ok(register_source(&self.conn, source)?)
    }

    pub fn get_source(&self, title: &str) -> Result<SourceBook, KbError> {
        get_source(&self.conn, title)?
            .ok_or_else(|| KbError::NotFound(format!("SourceBook {title}")))
    }

    pub fn sources(&self) -> Result<Vec<SourceBook>, KbError> {
        Ok(list_sources(&self.conn)?)
    }

    // ── Ingestion ───────────────────────────────────────────────────────

    /// Ingest a book from a PDF on disk.
    pub fn ingest_book(&self, pdf_path: &Path, source: &SourceBook) -> Result<IngestReport, KbError> {
        let pdf_bytes = std::fs::read(pdf_path)?;
        self.ingest_pdf_bytes(&pdf_bytes, source)
    }

    /// Ingest a book from in-memory PDF bytes.
    pub fn ingest_pdf_bytes(
        &self,
        pdf_bytes: &[u8],
        source: &SourceBook,
    ) -> Result<IngestReport, KbError> {
        let cleaner = TextCleaner::new(&self.lexicon);
        let extractor = RuleExtractor::new(&self.lexicon, self.config.min_confidence);
        ingest_bytes(
            &self.conn,
            &self.lexicon,
            &cleaner,
            &extractor,
            pdf_bytes,
            source,
        )
    }

    // ── Rule store ──────────────────────────────────────────────────────

    /// Store one rule. The id is recomputed from content, timestamps are
    /// set to now, and the authority level is denormalized from the
    /// registered source.
    pub fn store_rule(&self, mut rule: Rule) -> Result<StoreOutcome, KbError> {
        let source = get_source(&self.conn, &rule.source_title)?
            .ok_or_else(|| KbError::UnknownSource(rule.source_title.clone()))?;
        rule.authority_level = source.authority_level;
        rule.id = rule.compute_id();
        let now = Utc::now().naive_utc();
        rule.created_at = now;
        rule.updated_at = now;

        match insert_rule(&self.conn, &rule) {
            Ok(InsertOutcome::Inserted) => Ok(StoreOutcome::Stored),
            Ok(InsertOutcome::Duplicate) => Ok(StoreOutcome::Duplicate),
            Err(DatabaseError::ConstraintViolation(reason)) => Ok(StoreOutcome::Rejected(reason)),
            Err(e) => Err(e.into()),
        }
    }

    /// Store many rules in one transaction; invalid rows are skipped.
    /// Returns the number inserted.
    pub fn store_rules_batch(&self, rules: Vec<Rule>) -> Result<usize, KbError> {
        let now = Utc::now().naive_utc();
        let prepared: Vec<Rule> = rules
            .into_iter()
            .map(|mut rule| {
                rule.id = rule.compute_id();
                rule.created_at = now;
                rule.updated_at = now;
                rule
            })
            .collect();
        Ok(insert_rules_batch(&self.conn, &prepared)?)
    }

    pub fn get_rule(&self, id: &str) -> Result<Rule, KbError> {
        get_rule(&self.conn, id)?.ok_or_else(|| KbError::NotFound(format!("Rule {id}")))
    }

    pub fn mark_validated(&self, id: &str, validated: bool) -> Result<(), KbError> {
        Ok(mark_validated(&self.conn, id, validated)?)
    }

    // ── Search & analysis ───────────────────────────────────────────────

    pub fn search(&self, filter: &RuleFilter) -> Result<Vec<Rule>, KbError> {
        Ok(search_rules(&self.conn, filter)?)
    }

    /// Stored rules with the same point conditions but contradictory
    /// polarity. Both sides stay stored; resolution is the consumer's call.
    pub fn conflicting_rules(&self, rule: &Rule) -> Result<Vec<Rule>, KbError> {
        Ok(conflicting_rules(&self.conn, rule)?)
    }

    pub fn stats(&self) -> Result<StoreStats, KbError> {
        Ok(store_stats(&self.conn)?)
    }

    pub fn extraction_stats(&self, source_title: &str) -> Result<Vec<ExtractionStats>, KbError> {
        Ok(extraction_stats_for(&self.conn, source_title)?)
    }

    pub fn correction_audit(&self, rule_id: &str) -> Result<Vec<CorrectionAuditEntry>, KbError> {
        Ok(correction_audit_for(&self.conn, rule_id)?)
    }

    // ── Correction ──────────────────────────────────────────────────────

    /// Run one correction pass with a caller-supplied model client.
    pub fn correct_pending(
        &self,
        client: &dyn LlmClient,
        batch_size: usize,
        model_id: &str,
    ) -> Result<CorrectionReport, KbError> {
        let config = CorrectorConfig {
            model_id: model_id.to_string(),
            batch_size,
            temperature: self.config.temperature,
        };
        Ok(correct_pending(&self.conn, client, &config)?)
    }

    /// Run one correction pass against the configured local Ollama.
    pub fn correct_pending_local(
        &self,
        batch_size: usize,
        model_id: &str,
    ) -> Result<CorrectionReport, KbError> {
        let client = OllamaClient::new(&self.config.ollama_base_url, self.config.llm_timeout_secs);
        self.correct_pending(&client, batch_size, model_id)
    }

    // ── Export / import ─────────────────────────────────────────────────

    pub fn export(&self, filter: &RuleFilter) -> Result<Bundle, KbError> {
        Ok(export(&self.conn, filter)?)
    }

    pub fn import_bundle(
        &self,
        bundle: &Bundle,
        strategy: MergeStrategy,
    ) -> Result<ImportReport, KbError> {
        Ok(import_bundle(&self.conn, bundle, strategy)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AuthorityLevel, ExtractionMethod, House, OrderBy, Planet, Polarity, RuleCategory,
        RuleConditions,
    };
    use crate::pipeline::extraction::pdf::test_pdf::{make_test_pdf, make_test_pdf_pages};

    fn kb() -> KnowledgeBase {
        KnowledgeBase::open_in_memory().unwrap()
    }

    fn draft_rule(source_title: &str) -> Rule {
        let conditions = RuleConditions {
            planet: Some(Planet::Mars),
            house: Some(House::new(7).unwrap()),
            ..Default::default()
        };
        let now = Utc::now().naive_utc();
        Rule {
            id: String::new(),
            original_text: "Mars in the 7th house causes discord in marriage.".into(),
            corrected_text: None,
            conditions,
            effects: vec!["discord in marriage".into()],
            polarity: Polarity::Negative,
            tags: vec!["planet:mars".into(), "house:7".into()],
            category: RuleCategory::PlanetaryPlacement,
            source_title: source_title.into(),
            page: Some(14),
            chapter: None,
            verse: None,
            authority_level: AuthorityLevel::Modern, // overwritten by store
            confidence: 0.8,
            extraction_method: ExtractionMethod::BasicPlacement,
            correction: None,
            validated: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn store_rule_denormalizes_authority_and_computes_id() {
        let kb = kb();
        kb.register_source(&SourceBook::new("BPHS", AuthorityLevel::Classical))
            .unwrap();

        let outcome = kb.store_rule(draft_rule("BPHS")).unwrap();
        assert_eq!(outcome, StoreOutcome::Stored);

        let rules = kb.search(&RuleFilter::default()).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].authority_level, AuthorityLevel::Classical);
        assert_eq!(rules[0].id.len(), 16);
    }

    #[test]
    fn duplicate_store_is_a_noop() {
        let kb = kb();
        kb.register_source(&SourceBook::new("BPHS", AuthorityLevel::Classical))
            .unwrap();

        assert_eq!(kb.store_rule(draft_rule("BPHS")).unwrap(), StoreOutcome::Stored);
        assert_eq!(
            kb.store_rule(draft_rule("BPHS")).unwrap(),
            StoreOutcome::Duplicate
        );
    }

    #[test]
    fn store_rule_unknown_source_fails() {
        let kb = kb();
        let result = kb.store_rule(draft_rule("Never Registered"));
        assert!(matches!(result, Err(KbError::UnknownSource(_))));
    }

    #[test]
    fn store_rule_without_conditions_rejected() {
        let kb = kb();
        kb.register_source(&SourceBook::new("BPHS", AuthorityLevel::Classical))
            .unwrap();

        let mut rule = draft_rule("BPHS");
        rule.conditions = RuleConditions::default();
        let outcome = kb.store_rule(rule).unwrap();
        assert!(matches!(outcome, StoreOutcome::Rejected(_)));
    }

    #[test]
    fn get_rule_not_found() {
        let kb = kb();
        assert!(matches!(kb.get_rule("missing"), Err(KbError::NotFound(_))));
    }

    #[test]
    fn source_conflict_surfaces() {
        let kb = kb();
        kb.register_source(&SourceBook::new("BPHS", AuthorityLevel::Classical))
            .unwrap();
        let result = kb.register_source(&SourceBook::new("BPHS", AuthorityLevel::Modern));
        assert!(matches!(result, Err(KbError::SourceConflict { .. })));
    }

    #[test]
    fn end_to_end_ingest_and_search() {
        let kb = kb();
        let pdf = make_test_pdf_pages(&[
            "Mars in the 7th house causes discord in marriage.",
            "For Leo ascendant, Mars in the 9th house brings fortune through courage.",
        ]);
        let source = SourceBook::new("Test Samhita", AuthorityLevel::Classical);

        let report = kb.ingest_pdf_bytes(&pdf, &source).unwrap();
        assert_eq!(report.rules_stored, 2);

        let mars_7 = kb
            .search(&RuleFilter {
                planet: Some(Planet::Mars),
                house: Some(House::new(7).unwrap()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(mars_7.len(), 1);
        assert_eq!(
            mars_7[0].extraction_method,
            ExtractionMethod::BasicPlacement
        );

        let leo_asc = kb
            .search(&RuleFilter {
                ascendant: Some(crate::models::Sign::Leo),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(leo_asc.len(), 1);
        assert_eq!(
            leo_asc[0].extraction_method,
            ExtractionMethod::AscendantSpecific
        );
    }

    #[test]
    fn ocr_damaged_and_clean_sentences_share_search_results() {
        // S4: the OCR-damaged variant normalizes to Mars-in-7th and is
        // searchable alongside the clean S1 rule, under a different id.
        let kb = kb();
        let pdf = make_test_pdf_pages(&[
            "Mars in the 7th house causes discord in marriage.",
            "Mangalin7thbhavagivesconflictsinmarriage.",
        ]);
        let source = SourceBook::new("Test Samhita", AuthorityLevel::Classical);

        let report = kb.ingest_pdf_bytes(&pdf, &source).unwrap();
        assert_eq!(report.rules_stored, 2);

        let results = kb
            .search(&RuleFilter {
                planet: Some(Planet::Mars),
                house: Some(House::new(7).unwrap()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_ne!(results[0].id, results[1].id);
    }

    #[test]
    fn duplicate_ingest_keeps_store_size() {
        let kb = kb();
        let pdf = make_test_pdf("Mars in the 7th house causes discord in marriage.");
        let source = SourceBook::new("Test Samhita", AuthorityLevel::Classical);

        let first = kb.ingest_pdf_bytes(&pdf, &source).unwrap();
        let second = kb.ingest_pdf_bytes(&pdf, &source).unwrap();
        assert_eq!(first.rules_stored, 1);
        assert_eq!(second.rules_stored, 0);
        assert_eq!(kb.stats().unwrap().total_rules, 1);
    }

    #[test]
    fn batch_store_skips_invalid_rows() {
        let kb = kb();
        kb.register_source(&SourceBook::new("BPHS", AuthorityLevel::Classical))
            .unwrap();

        let good = draft_rule("BPHS");
        let mut bad = draft_rule("BPHS");
        bad.original_text = "different text entirely for a different id".into();
        bad.effects = vec![];

        let inserted = kb.store_rules_batch(vec![good, bad]).unwrap();
        assert_eq!(inserted, 1);
    }

    #[test]
    fn relevance_ordering_across_authorities() {
        let kb = kb();
        kb.register_source(&SourceBook::new("BPHS", AuthorityLevel::Classical))
            .unwrap();
        kb.register_source(&SourceBook::new("Modern Primer", AuthorityLevel::Modern))
            .unwrap();

        kb.store_rule(draft_rule("BPHS")).unwrap();
        let mut modern = draft_rule("Modern Primer");
        modern.original_text = "Mars in the 7th house gives a combative spouse.".into();
        modern.effects = vec!["a combative spouse".into()];
        kb.store_rule(modern).unwrap();

        let results = kb
            .search(&RuleFilter {
                order_by: OrderBy::Relevance,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].authority_level, AuthorityLevel::Classical);
    }

    #[test]
    fn export_import_through_facade() {
        let kb = kb();
        kb.register_source(&SourceBook::new("BPHS", AuthorityLevel::Classical))
            .unwrap();
        kb.store_rule(draft_rule("BPHS")).unwrap();

        let bundle = kb.export(&RuleFilter::default()).unwrap();
        let fresh = KnowledgeBase::open_in_memory().unwrap();
        let report = fresh
            .import_bundle(&bundle, MergeStrategy::Append)
            .unwrap();
        assert_eq!(report.rules_imported, 1);
        assert_eq!(
            fresh.export(&RuleFilter::default()).unwrap().rules,
            bundle.rules
        );
    }

    #[test]
    fn on_disk_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.db");

        {
            let kb = KnowledgeBase::open(&path).unwrap();
            kb.register_source(&SourceBook::new("BPHS", AuthorityLevel::Classical))
                .unwrap();
            kb.store_rule(draft_rule("BPHS")).unwrap();
        }

        let kb = KnowledgeBase::open(&path).unwrap();
        assert_eq!(kb.stats().unwrap().total_rules, 1);
    }
}
