use std::str::FromStr;

use chrono::Utc;
use rusqlite::{params, Connection, Row};

use crate::db::DatabaseError;
use crate::models::{
    format_timestamp, parse_timestamp, text_digest, AuthorityLevel, CorrectionAudit,
    ExtractionMethod, House, Nakshatra, Planet, Polarity, Rule, RuleCategory, RuleConditions, Sign,
    Strength,
};

/// Column list shared by every rule SELECT so row mapping stays in one place.
pub(crate) const RULE_COLUMNS: &str = "id, original_text, corrected_text, planet, house, sign, \
     nakshatra, aspect, strength, lord_of, ascendant, effects_json, polarity, tags_json, \
     category, source_title, page, chapter, verse, authority_level, confidence, \
     extraction_method, correction_json, validated, created_at, updated_at";

/// Outcome of a single rule insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The id already exists; the insert was a no-op.
    Duplicate,
}

/// Check the storage invariants for a rule. Violations are reported, not
/// silently repaired.
pub fn validate_rule(conn: &Connection, rule: &Rule) -> Result<(), DatabaseError> {
    if rule.id.is_empty() {
        return Err(DatabaseError::ConstraintViolation("rule id is empty".into()));
    }
    if !rule.conditions.has_primary() {
        return Err(DatabaseError::ConstraintViolation(
            "rule needs at least one of planet/house/sign".into(),
        ));
    }
    if rule.effects.iter().all(|e| e.trim().is_empty()) {
        return Err(DatabaseError::ConstraintViolation(
            "rule needs at least one non-empty effect".into(),
        ));
    }
    if !(0.0..=1.0).contains(&rule.confidence) {
        return Err(DatabaseError::ConstraintViolation(format!(
            "confidence {} outside [0,1]",
            rule.confidence
        )));
    }
    let source_exists: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sources WHERE title = ?1",
        params![rule.source_title],
        |row| row.get(0),
    )?;
    if source_exists == 0 {
        return Err(DatabaseError::UnknownSource(rule.source_title.clone()));
    }
    Ok(())
}

/// Insert a rule. An existing id makes this a no-op (`Duplicate`);
/// re-ingesting a book is therefore idempotent.
pub fn insert_rule(conn: &Connection, rule: &Rule) -> Result<InsertOutcome, DatabaseError> {
    validate_rule(conn, rule)?;

    let exists: i64 = conn.query_row(
        "SELECT COUNT(*) FROM rules WHERE id = ?1",
        params![rule.id],
        |row| row.get(0),
    )?;
    if exists > 0 {
        return Ok(InsertOutcome::Duplicate);
    }

    conn.execute(
        "INSERT INTO rules (id, original_text, corrected_text, planet, house, sign, nakshatra,
         aspect, strength, lord_of, ascendant, effects_json, polarity, tags_json, category,
         source_title, page, chapter, verse, authority_level, confidence, extraction_method,
         correction_json, validated, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                 ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26)",
        params![
            rule.id,
            rule.original_text,
            rule.corrected_text,
            rule.conditions.planet.map(|p| p.as_str()),
            rule.conditions.house.map(|h| h.get() as i64),
            rule.conditions.sign.map(|s| s.as_str()),
            rule.conditions.nakshatra.map(|n| n.as_str()),
            rule.conditions.aspect.map(|a| a.as_str()),
            rule.conditions.strength.map(|s| s.as_str()),
            rule.conditions.lord_of.map(|h| h.get() as i64),
            rule.conditions.ascendant.map(|a| a.as_str()),
            serde_json::to_string(&rule.effects)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            rule.polarity.as_str(),
            serde_json::to_string(&rule.tags)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            rule.category.as_str(),
            rule.source_title,
            rule.page,
            rule.chapter,
            rule.verse,
            rule.authority_level.as_i64(),
            rule.confidence as f64,
            rule.extraction_method.as_str(),
            rule.correction
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            rule.validated as i64,
            format_timestamp(&rule.created_at),
            format_timestamp(&rule.updated_at),
        ],
    )?;
    Ok(InsertOutcome::Inserted)
}

/// Insert many rules in a single transaction. A row that fails validation
/// is skipped (and logged), not the whole batch. Returns the inserted count.
pub fn insert_rules_batch(conn: &Connection, rules: &[Rule]) -> Result<usize, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let mut inserted = 0;
    for rule in rules {
        match insert_rule(&tx, rule) {
            Ok(InsertOutcome::Inserted) => inserted += 1,
            Ok(InsertOutcome::Duplicate) => {
                tracing::debug!(rule_id = %rule.id, "Duplicate rule skipped in batch");
            }
            Err(DatabaseError::ConstraintViolation(reason)) => {
                tracing::warn!(rule_id = %rule.id, reason = %reason, "Rule skipped in batch");
            }
            Err(DatabaseError::UnknownSource(title)) => {
                tracing::warn!(rule_id = %rule.id, source = %title, "Rule with unknown source skipped");
            }
            Err(e) => return Err(e),
        }
    }
    tx.commit()?;
    Ok(inserted)
}

pub fn get_rule(conn: &Connection, id: &str) -> Result<Option<Rule>, DatabaseError> {
    let mut stmt = conn.prepare(&format!("SELECT {RULE_COLUMNS} FROM rules WHERE id = ?1"))?;
    let result = stmt.query_row(params![id], map_rule_row);

    match result {
        Ok(rule) => Ok(Some(rule?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Apply an accepted correction. Only `corrected_text`, the correction
/// audit and `updated_at` change; everything else is immutable here.
pub fn apply_correction(
    conn: &Connection,
    rule_id: &str,
    corrected_text: &str,
    audit: &CorrectionAudit,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE rules SET corrected_text = ?2, correction_json = ?3, updated_at = ?4
         WHERE id = ?1",
        params![
            rule_id,
            corrected_text,
            serde_json::to_string(audit)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            format_timestamp(&Utc::now().naive_utc()),
        ],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Rule".into(),
            id: rule_id.into(),
        });
    }
    Ok(())
}

/// Record the original-text digest the corrector last attempted, so future
/// passes skip this rule until its text changes.
pub fn set_corrected_digest(
    conn: &Connection,
    rule_id: &str,
    digest: &str,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE rules SET last_corrected_digest = ?2 WHERE id = ?1",
        params![rule_id, digest],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Rule".into(),
            id: rule_id.into(),
        });
    }
    Ok(())
}

/// Flag a rule as human-verified.
pub fn mark_validated(conn: &Connection, rule_id: &str, validated: bool) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE rules SET validated = ?2, updated_at = ?3 WHERE id = ?1",
        params![
            rule_id,
            validated as i64,
            format_timestamp(&Utc::now().naive_utc())
        ],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Rule".into(),
            id: rule_id.into(),
        });
    }
    Ok(())
}

/// Rules the corrector still owes a pass: digest missing or stale. Ordered
/// by creation so batches are deterministic.
pub fn pending_corrections(conn: &Connection) -> Result<Vec<Rule>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RULE_COLUMNS}, last_corrected_digest FROM rules
         ORDER BY created_at ASC, rowid ASC"
    ))?;
    let rows = stmt.query_map([], |row| {
        let digest: Option<String> = row.get(26)?;
        let rule = map_rule_row(row)?;
        Ok((rule, digest))
    })?;

    let mut pending = Vec::new();
    for row in rows {
        let (rule, digest) = row?;
        let rule = rule?;
        let current = text_digest(&rule.original_text);
        if digest.as_deref() != Some(current.as_str()) {
            pending.push(rule);
        }
    }
    Ok(pending)
}

pub fn count_rules(conn: &Connection) -> Result<u64, DatabaseError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM rules", [], |row| row.get(0))?;
    Ok(count as u64)
}

/// Delete every rule and its correction audit (used by `import` with the
/// replace strategy). Sources stay registered.
pub fn clear_rules(conn: &Connection) -> Result<u64, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM correction_audit", [])?;
    let deleted = tx.execute("DELETE FROM rules", [])?;
    tx.commit()?;
    Ok(deleted as u64)
}

/// Map one rules row into a `Rule`. The inner Result carries enum/JSON
/// decoding failures so they surface as `DatabaseError`, not rusqlite
/// conversion panics.
pub(crate) fn map_rule_row(row: &Row<'_>) -> rusqlite::Result<Result<Rule, DatabaseError>> {
    let id: String = row.get(0)?;
    let original_text: String = row.get(1)?;
    let corrected_text: Option<String> = row.get(2)?;
    let planet: Option<String> = row.get(3)?;
    let house: Option<i64> = row.get(4)?;
    let sign: Option<String> = row.get(5)?;
    let nakshatra: Option<String> = row.get(6)?;
    let aspect: Option<String> = row.get(7)?;
    let strength: Option<String> = row.get(8)?;
    let lord_of: Option<i64> = row.get(9)?;
    let ascendant: Option<String> = row.get(10)?;
    let effects_json: String = row.get(11)?;
    let polarity: String = row.get(12)?;
    let tags_json: String = row.get(13)?;
    let category: String = row.get(14)?;
    let source_title: String = row.get(15)?;
    let page: Option<i64> = row.get(16)?;
    let chapter: Option<String> = row.get(17)?;
    let verse: Option<String> = row.get(18)?;
    let authority_level: i64 = row.get(19)?;
    let confidence: f64 = row.get(20)?;
    let extraction_method: String = row.get(21)?;
    let correction_json: Option<String> = row.get(22)?;
    let validated: i64 = row.get(23)?;
    let created_at: String = row.get(24)?;
    let updated_at: String = row.get(25)?;

    Ok(build_rule(RuleRow {
        id,
        original_text,
        corrected_text,
        planet,
        house,
        sign,
        nakshatra,
        aspect,
        strength,
        lord_of,
        ascendant,
        effects_json,
        polarity,
        tags_json,
        category,
        source_title,
        page,
        chapter,
        verse,
        authority_level,
        confidence,
        extraction_method,
        correction_json,
        validated,
        created_at,
        updated_at,
    }))
}

struct RuleRow {
    id: String,
    original_text: String,
    corrected_text: Option<String>,
    planet: Option<String>,
    house: Option<i64>,
    sign: Option<String>,
    nakshatra: Option<String>,
    aspect: Option<String>,
    strength: Option<String>,
    lord_of: Option<i64>,
    ascendant: Option<String>,
    effects_json: String,
    polarity: String,
    tags_json: String,
    category: String,
    source_title: String,
    page: Option<i64>,
    chapter: Option<String>,
    verse: Option<String>,
    authority_level: i64,
    confidence: f64,
    extraction_method: String,
    correction_json: Option<String>,
    validated: i64,
    created_at: String,
    updated_at: String,
}

fn build_rule(row: RuleRow) -> Result<Rule, DatabaseError> {
    let conditions = RuleConditions {
        planet: row.planet.as_deref().map(Planet::from_str).transpose()?,
        house: row
            .house
            .map(|h| House::new(h as u8))
            .transpose()?,
        sign: row.sign.as_deref().map(Sign::from_str).transpose()?,
        nakshatra: row
            .nakshatra
            .as_deref()
            .map(Nakshatra::from_str)
            .transpose()?,
        aspect: row.aspect.as_deref().map(Planet::from_str).transpose()?,
        strength: row.strength.as_deref().map(Strength::from_str).transpose()?,
        lord_of: row.lord_of.map(|h| House::new(h as u8)).transpose()?,
        ascendant: row.ascendant.as_deref().map(Sign::from_str).transpose()?,
    };

    let effects: Vec<String> = serde_json::from_str(&row.effects_json)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("effects_json: {e}")))?;
    let tags: Vec<String> = serde_json::from_str(&row.tags_json)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("tags_json: {e}")))?;
    let correction: Option<CorrectionAudit> = row
        .correction_json
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .map_err(|e| DatabaseError::ConstraintViolation(format!("correction_json: {e}")))?;

    Ok(Rule {
        id: row.id,
        original_text: row.original_text,
        corrected_text: row.corrected_text,
        conditions,
        effects,
        polarity: Polarity::from_str(&row.polarity)?,
        tags,
        category: RuleCategory::from_str(&row.category)?,
        source_title: row.source_title,
        page: row.page.map(|p| p as u32),
        chapter: row.chapter,
        verse: row.verse,
        authority_level: AuthorityLevel::from_i64(row.authority_level)?,
        confidence: row.confidence as f32,
        extraction_method: ExtractionMethod::from_str(&row.extraction_method)?,
        correction,
        validated: row.validated != 0,
        created_at: parse_timestamp(&row.created_at).unwrap_or_default(),
        updated_at: parse_timestamp(&row.updated_at).unwrap_or_default(),
    })
}
