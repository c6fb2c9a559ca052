//! Round-trippable export bundle: metadata, the source registry, and the
//! selected rules with every field intact. `import(export(X))` over an
//! empty store restores X — ids, conditions, effects, confidence and
//! timestamps included.

use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::repository::rule::{clear_rules, insert_rule, set_corrected_digest, InsertOutcome};
use crate::db::repository::search::search_rules;
use crate::db::repository::source::{list_sources, register_source};
use crate::db::DatabaseError;
use crate::models::{text_digest, ImportReport, MergeStrategy, Rule, RuleFilter, SourceBook};

pub const BUNDLE_SCHEMA_VERSION: &str = "1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bundle {
    pub schema_version: String,
    /// ISO-8601 UTC export time.
    pub exported_at: String,
    pub total_rules: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub filters_applied: Option<RuleFilter>,
    pub sources: Vec<SourceBook>,
    pub rules: Vec<Rule>,
}

/// Export the rules matching a filter, plus the full source registry.
pub fn export(conn: &Connection, filter: &RuleFilter) -> Result<Bundle, DatabaseError> {
    let rules = search_rules(conn, filter)?;
    let sources = list_sources(conn)?;

    Ok(Bundle {
        schema_version: BUNDLE_SCHEMA_VERSION.to_string(),
        exported_at: Utc::now().to_rfc3339(),
        total_rules: rules.len() as u64,
        filters_applied: if filter.is_empty() {
            None
        } else {
            Some(filter.clone())
        },
        sources,
        rules,
    })
}

/// Rebuild store content from a bundle.
///
/// `replace` clears the rule set first; `append` overwrites rules whose id
/// already exists; `skip_duplicates` keeps existing rules. All strategies
/// preserve bundle ids and timestamps verbatim.
pub fn import_bundle(
    conn: &Connection,
    bundle: &Bundle,
    strategy: MergeStrategy,
) -> Result<ImportReport, DatabaseError> {
    let mut report = ImportReport::default();

    for source in &bundle.sources {
        match register_source(conn, source) {
            Ok(_) => report.sources_registered += 1,
            Err(DatabaseError::SourceConflict { title, .. }) => {
                tracing::warn!(title = %title, "Conflicting source left as registered");
            }
            Err(e) => return Err(e),
        }
    }

    if strategy == MergeStrategy::Replace {
        let cleared = clear_rules(conn)?;
        tracing::info!(cleared, "Store cleared for replace import");
    }

    let tx = conn.unchecked_transaction()?;
    for rule in &bundle.rules {
        let outcome = match insert_rule(&tx, rule) {
            Ok(outcome) => outcome,
            Err(DatabaseError::ConstraintViolation(reason)) => {
                tracing::warn!(rule_id = %rule.id, reason = %reason, "Bundle rule skipped");
                report.rules_skipped += 1;
                continue;
            }
            Err(DatabaseError::UnknownSource(title)) => {
                tracing::warn!(rule_id = %rule.id, source = %title, "Bundle rule skipped");
                report.rules_skipped += 1;
                continue;
            }
            Err(e) => return Err(e),
        };

        match (outcome, strategy) {
            (InsertOutcome::Inserted, _) => {
                finish_import(&tx, rule)?;
                report.rules_imported += 1;
            }
            (InsertOutcome::Duplicate, MergeStrategy::Append) => {
                // Overwrite: drop the existing row (audit first, FK) and
                // take the bundle's.
                tx.execute(
                    "DELETE FROM correction_audit WHERE rule_id = ?1",
                    rusqlite::params![rule.id],
                )?;
                tx.execute("DELETE FROM rules WHERE id = ?1", rusqlite::params![rule.id])?;
                match insert_rule(&tx, rule)? {
                    InsertOutcome::Inserted => {
                        finish_import(&tx, rule)?;
                        report.rules_imported += 1;
                    }
                    InsertOutcome::Duplicate => unreachable!("row deleted above"),
                }
            }
            (InsertOutcome::Duplicate, _) => {
                report.rules_skipped += 1;
            }
        }
    }
    tx.commit()?;

    Ok(report)
}

/// A bundle rule that already carries a correction was attempted by the
/// corrector before export; recording its digest keeps reimports from
/// resubmitting it.
fn finish_import(conn: &Connection, rule: &Rule) -> Result<(), DatabaseError> {
    if rule.corrected_text.is_some() || rule.correction.is_some() {
        set_corrected_digest(conn, &rule.id, &text_digest(&rule.original_text))?;
    }
    Ok(())
}
