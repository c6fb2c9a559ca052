//! Deterministic batch loop over rules that still owe a correction pass.
//!
//! One batch in flight at a time; items commit individually after the
//! validation gate. Batch-level failures (unreachable model, wrong item
//! count) leave their rules retryable; per-item rejections are final for
//! the current text and fully audited.

use chrono::Utc;
use rusqlite::Connection;

use super::client::LlmClient;
use super::prompt::{build_correction_prompt, parse_correction_response, BatchItem};
use super::validate::validate_correction;
use super::{CorrectionError, CORRECTION_SYSTEM_PROMPT};
use crate::db::repository::audit::{record_correction_audit, CorrectionAuditEntry};
use crate::db::repository::rule::{apply_correction, pending_corrections, set_corrected_digest};
use crate::models::{text_digest, CorrectionAudit, CorrectionReport, Rule};

#[derive(Debug, Clone)]
pub struct CorrectorConfig {
    pub model_id: String,
    pub batch_size: usize,
    pub temperature: f32,
}

impl CorrectorConfig {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            batch_size: 5,
            temperature: 0.1,
        }
    }
}

/// Run one correction pass over every pending rule. Always returns a
/// report; only database failures propagate as errors.
pub fn correct_pending(
    conn: &Connection,
    client: &dyn LlmClient,
    config: &CorrectorConfig,
) -> Result<CorrectionReport, CorrectionError> {
    let pending = pending_corrections(conn)?;
    let mut report = CorrectionReport::default();

    if pending.is_empty() {
        return Ok(report);
    }

    match client.is_model_available(&config.model_id) {
        Ok(true) => {}
        Ok(false) | Err(_) => {
            tracing::warn!(
                model = %config.model_id,
                pending = pending.len(),
                "Model unavailable, correction pass skipped"
            );
            report.retryable = pending.len() as u64;
            return Ok(report);
        }
    }

    let batch_size = config.batch_size.max(1);
    let batch_list: Vec<&[Rule]> = pending.chunks(batch_size).collect();

    for (i, batch) in batch_list.iter().enumerate() {
        match correct_batch(conn, client, config, batch) {
            Ok(batch_report) => {
                report.attempted += batch_report.attempted;
                report.accepted += batch_report.accepted;
                report.rejected += batch_report.rejected;
            }
            Err(CorrectionError::Database(e)) => return Err(e.into()),
            Err(CorrectionError::OllamaConnection(url)) => {
                // Endpoint is down; every later batch would fail the same
                // way. Mark the rest retryable and stop.
                tracing::warn!(url = %url, "Model endpoint unreachable, stopping pass");
                report.retryable += batch_list[i..].iter().map(|b| b.len() as u64).sum::<u64>();
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, batch = batch.len(), "Batch failed, rules stay retryable");
                report.retryable += batch.len() as u64;
            }
        }
    }

    tracing::info!(
        attempted = report.attempted,
        accepted = report.accepted,
        rejected = report.rejected,
        retryable = report.retryable,
        "Correction pass finished"
    );
    Ok(report)
}

fn correct_batch(
    conn: &Connection,
    client: &dyn LlmClient,
    config: &CorrectorConfig,
    batch: &[Rule],
) -> Result<CorrectionReport, CorrectionError> {
    let items: Vec<BatchItem> = batch
        .iter()
        .map(|rule| BatchItem {
            rule_id: rule.id.clone(),
            text: rule.original_text.clone(),
            preserve: rule
                .conditions
                .identity_tokens()
                .into_iter()
                .map(|group| group[0].clone())
                .collect(),
        })
        .collect();

    let prompt = build_correction_prompt(&items);
    let response = client.generate(
        &config.model_id,
        &prompt,
        CORRECTION_SYSTEM_PROMPT,
        config.temperature,
    )?;
    // A response with the wrong count discards the whole batch.
    let corrections = parse_correction_response(&response, batch.len())?;

    let mut report = CorrectionReport {
        attempted: batch.len() as u64,
        ..Default::default()
    };

    for (rule, correction) in batch.iter().zip(corrections) {
        let digest = text_digest(&rule.original_text);
        match validate_correction(rule, &correction.corrected) {
            Ok(()) => {
                let audit = CorrectionAudit {
                    confidence: correction.confidence,
                    fixes_applied: correction.fixes.clone(),
                    model_id: config.model_id.clone(),
                    temperature: Some(config.temperature),
                    timestamp: Utc::now().naive_utc(),
                };
                apply_correction(conn, &rule.id, &correction.corrected, &audit)?;
                record_correction_audit(
                    conn,
                    &CorrectionAuditEntry::accepted(
                        &rule.id,
                        &config.model_id,
                        correction.confidence,
                        correction.fixes,
                        Some(config.temperature),
                    ),
                )?;
                set_corrected_digest(conn, &rule.id, &digest)?;
                report.accepted += 1;
            }
            Err(reason) => {
                tracing::warn!(rule_id = %rule.id, reason = %reason, "Correction rejected");
                record_correction_audit(
                    conn,
                    &CorrectionAuditEntry::rejected(
                        &rule.id,
                        &config.model_id,
                        &reason.to_string(),
                        Some(config.temperature),
                    ),
                )?;
                // The attempt is recorded so the same text is not resent;
                // the stored rule itself is unchanged.
                set_corrected_digest(conn, &rule.id, &digest)?;
                report.rejected += 1;
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use crate::db::repository::audit::correction_audit_for;
    use crate::db::repository::rule::test_support::{mars_7th, sample_rule};
    use crate::db::repository::rule::{get_rule, insert_rule};
    use crate::db::sqlite::open_memory_database;

    /// Scripted LlmClient: returns canned responses in order.
    struct MockClient {
        available: bool,
        responses: RefCell<Vec<Result<String, CorrectionError>>>,
        calls: RefCell<Vec<String>>,
    }

    impl MockClient {
        fn with_responses(responses: Vec<Result<String, CorrectionError>>) -> Self {
            Self {
                available: true,
                responses: RefCell::new(responses),
                calls: RefCell::new(Vec::new()),
            }
        }

        fn unavailable() -> Self {
            Self {
                available: false,
                responses: RefCell::new(Vec::new()),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl LlmClient for MockClient {
        fn generate(
            &self,
            _model: &str,
            prompt: &str,
            _system: &str,
            _temperature: f32,
        ) -> Result<String, CorrectionError> {
            self.calls.borrow_mut().push(prompt.to_string());
            let mut responses = self.responses.borrow_mut();
            if responses.is_empty() {
                return Err(CorrectionError::OllamaConnection("mock".into()));
            }
            responses.remove(0)
        }

        fn is_model_available(&self, _model: &str) -> Result<bool, CorrectionError> {
            Ok(self.available)
        }
    }

    fn fenced(items: &str) -> String {
        format!("```json\n[{items}]\n```")
    }

    #[test]
    fn accepted_correction_written_back_with_audit() {
        let conn = open_memory_database().unwrap();
        let mut rule = sample_rule(&conn, "Marsin7thhousecausesdiscord", mars_7th());
        rule.effects = vec!["discord".into()];
        insert_rule(&conn, &rule).unwrap();

        let client = MockClient::with_responses(vec![Ok(fenced(
            r#"{"corrected": "Mars in 7th house causes discord", "confidence": 0.92, "fixes": ["spacing"]}"#,
        ))]);
        let report =
            correct_pending(&conn, &client, &CorrectorConfig::new("llama3.1:8b")).unwrap();

        assert_eq!(report.attempted, 1);
        assert_eq!(report.accepted, 1);
        assert_eq!(report.rejected, 0);

        let stored = get_rule(&conn, &rule.id).unwrap().unwrap();
        assert_eq!(
            stored.corrected_text.as_deref(),
            Some("Mars in 7th house causes discord")
        );
        let correction = stored.correction.unwrap();
        assert_eq!(correction.model_id, "llama3.1:8b");
        assert_eq!(correction.temperature, Some(0.1));

        let trail = correction_audit_for(&conn, &rule.id).unwrap();
        assert_eq!(trail.len(), 1);
        assert!(trail[0].accepted);
    }

    #[test]
    fn identity_violation_rejected_and_audited() {
        let conn = open_memory_database().unwrap();
        let mut rule = sample_rule(&conn, "Marsin7thhousecausesdiscord", mars_7th());
        rule.effects = vec!["discord".into()];
        insert_rule(&conn, &rule).unwrap();

        // The model swapped Mars for Venus; the gate must refuse it.
        let client = MockClient::with_responses(vec![Ok(fenced(
            r#"{"corrected": "Venus in 7th house causes discord", "confidence": 0.9, "fixes": ["spacing"]}"#,
        ))]);
        let report =
            correct_pending(&conn, &client, &CorrectorConfig::new("llama3.1:8b")).unwrap();

        assert_eq!(report.attempted, 1);
        assert_eq!(report.accepted, 0);
        assert_eq!(report.rejected, 1);

        let stored = get_rule(&conn, &rule.id).unwrap().unwrap();
        assert!(stored.corrected_text.is_none(), "rule must stay unchanged");
        assert!(stored.correction.is_none());

        let trail = correction_audit_for(&conn, &rule.id).unwrap();
        assert_eq!(trail.len(), 1);
        assert!(!trail[0].accepted);
        assert!(trail[0]
            .reason
            .as_deref()
            .unwrap()
            .starts_with("identity_violation"));
    }

    #[test]
    fn second_pass_is_noop() {
        let conn = open_memory_database().unwrap();
        let mut rule = sample_rule(&conn, "Marsin7thhousecausesdiscord", mars_7th());
        rule.effects = vec!["discord".into()];
        insert_rule(&conn, &rule).unwrap();

        let client = MockClient::with_responses(vec![Ok(fenced(
            r#"{"corrected": "Mars in 7th house causes discord", "confidence": 0.92, "fixes": ["spacing"]}"#,
        ))]);
        let config = CorrectorConfig::new("llama3.1:8b");
        correct_pending(&conn, &client, &config).unwrap();

        // No responses left: a second generate call would error, but the
        // digest skip means none is made.
        let report = correct_pending(&conn, &client, &config).unwrap();
        assert_eq!(report.attempted, 0);
        assert_eq!(client.calls.borrow().len(), 1);
    }

    #[test]
    fn rejected_rule_not_resent_for_same_text() {
        let conn = open_memory_database().unwrap();
        let mut rule = sample_rule(&conn, "Marsin7thhousecausesdiscord", mars_7th());
        rule.effects = vec!["discord".into()];
        insert_rule(&conn, &rule).unwrap();

        let client = MockClient::with_responses(vec![Ok(fenced(
            r#"{"corrected": "Venus in 7th house causes discord", "confidence": 0.9, "fixes": []}"#,
        ))]);
        let config = CorrectorConfig::new("llama3.1:8b");
        correct_pending(&conn, &client, &config).unwrap();

        let report = correct_pending(&conn, &client, &config).unwrap();
        assert_eq!(report.attempted, 0, "rejected text must not be resent");
    }

    #[test]
    fn count_mismatch_discards_whole_batch() {
        let conn = open_memory_database().unwrap();
        let mut r1 = sample_rule(&conn, "Marsin7thhousecausesdiscord", mars_7th());
        r1.effects = vec!["discord".into()];
        insert_rule(&conn, &r1).unwrap();
        let mut r2 = sample_rule(&conn, "Marsinthe1sthousegivescourage", mars_7th());
        r2.conditions.house = Some(crate::models::House::new(1).unwrap());
        r2.effects = vec!["courage".into()];
        r2.id = r2.compute_id();
        insert_rule(&conn, &r2).unwrap();

        // One item back for two sent.
        let client = MockClient::with_responses(vec![Ok(fenced(
            r#"{"corrected": "Mars in 7th house causes discord", "confidence": 0.9, "fixes": []}"#,
        ))]);
        let report =
            correct_pending(&conn, &client, &CorrectorConfig::new("llama3.1:8b")).unwrap();

        assert_eq!(report.attempted, 0);
        assert_eq!(report.retryable, 2);
        assert!(get_rule(&conn, &r1.id).unwrap().unwrap().corrected_text.is_none());

        // Both rules are still pending for the next pass.
        assert_eq!(pending_corrections(&conn).unwrap().len(), 2);
    }

    #[test]
    fn model_unavailable_marks_all_retryable() {
        let conn = open_memory_database().unwrap();
        let mut rule = sample_rule(&conn, "Marsin7thhousecausesdiscord", mars_7th());
        rule.effects = vec!["discord".into()];
        insert_rule(&conn, &rule).unwrap();

        let client = MockClient::unavailable();
        let report =
            correct_pending(&conn, &client, &CorrectorConfig::new("llama3.1:8b")).unwrap();
        assert_eq!(report.attempted, 0);
        assert_eq!(report.retryable, 1);
        assert!(client.calls.borrow().is_empty());
    }

    #[test]
    fn connection_failure_stops_pass_and_marks_rest() {
        let conn = open_memory_database().unwrap();
        for i in 1..=7u8 {
            let mut rule = sample_rule(
                &conn,
                &format!("Marsinthe{i}thhousegivesresults"),
                mars_7th(),
            );
            rule.conditions.house = Some(crate::models::House::new(i).unwrap());
            rule.effects = vec!["results".into()];
            rule.id = rule.compute_id();
            insert_rule(&conn, &rule).unwrap();
        }

        // First batch (5 rules) hits a dead endpoint; the remaining batch
        // of 2 must be counted retryable without another call.
        let client = MockClient::with_responses(vec![Err(CorrectionError::OllamaConnection(
            "mock".into(),
        ))]);
        let report =
            correct_pending(&conn, &client, &CorrectorConfig::new("llama3.1:8b")).unwrap();
        assert_eq!(report.retryable, 7);
        assert_eq!(client.calls.borrow().len(), 1);
    }

    #[test]
    fn empty_store_returns_empty_report() {
        let conn = open_memory_database().unwrap();
        let client = MockClient::with_responses(vec![]);
        let report =
            correct_pending(&conn, &client, &CorrectorConfig::new("llama3.1:8b")).unwrap();
        assert_eq!(report, CorrectionReport::default());
    }
}
