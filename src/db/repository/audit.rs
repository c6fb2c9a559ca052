use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{format_timestamp, parse_timestamp, CorrectionFix};

/// One entry in the correction accept/reject trail.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionAuditEntry {
    pub id: Uuid,
    pub rule_id: String,
    pub accepted: bool,
    /// Rejection reason; `None` for accepted corrections.
    pub reason: Option<String>,
    pub model_id: String,
    pub confidence: Option<f32>,
    pub fixes_applied: Vec<CorrectionFix>,
    pub temperature: Option<f32>,
    pub recorded_at: NaiveDateTime,
}

impl CorrectionAuditEntry {
    pub fn accepted(
        rule_id: &str,
        model_id: &str,
        confidence: f32,
        fixes: Vec<CorrectionFix>,
        temperature: Option<f32>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            rule_id: rule_id.to_string(),
            accepted: true,
            reason: None,
            model_id: model_id.to_string(),
            confidence: Some(confidence),
            fixes_applied: fixes,
            temperature,
            recorded_at: Utc::now().naive_utc(),
        }
    }

    pub fn rejected(rule_id: &str, model_id: &str, reason: &str, temperature: Option<f32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            rule_id: rule_id.to_string(),
            accepted: false,
            reason: Some(reason.to_string()),
            model_id: model_id.to_string(),
            confidence: None,
            fixes_applied: Vec::new(),
            temperature,
            recorded_at: Utc::now().naive_utc(),
        }
    }
}

/// Append one audit entry. The trail is append-only.
pub fn record_correction_audit(
    conn: &Connection,
    entry: &CorrectionAuditEntry,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO correction_audit (id, rule_id, accepted, reason, model_id, confidence,
         fixes_json, temperature, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            entry.id.to_string(),
            entry.rule_id,
            entry.accepted as i64,
            entry.reason,
            entry.model_id,
            entry.confidence.map(|c| c as f64),
            serde_json::to_string(&entry.fixes_applied)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            entry.temperature.map(|t| t as f64),
            format_timestamp(&entry.recorded_at),
        ],
    )?;
    Ok(())
}

/// The full audit trail for one rule, oldest first.
pub fn correction_audit_for(
    conn: &Connection,
    rule_id: &str,
) -> Result<Vec<CorrectionAuditEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, rule_id, accepted, reason, model_id, confidence, fixes_json, temperature,
         recorded_at
         FROM correction_audit WHERE rule_id = ?1 ORDER BY recorded_at ASC, rowid ASC",
    )?;
    let rows = stmt.query_map(params![rule_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, Option<f64>>(5)?,
            row.get::<_, String>(6)?,
            row.get::<_, Option<f64>>(7)?,
            row.get::<_, String>(8)?,
        ))
    })?;

    let mut entries = Vec::new();
    for row in rows {
        let (id, rule_id, accepted, reason, model_id, confidence, fixes_json, temperature, at) =
            row?;
        entries.push(CorrectionAuditEntry {
            id: Uuid::parse_str(&id)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            rule_id,
            accepted: accepted != 0,
            reason,
            model_id,
            confidence: confidence.map(|c| c as f32),
            fixes_applied: serde_json::from_str(&fixes_json)
                .map_err(|e| DatabaseError::ConstraintViolation(format!("fixes_json: {e}")))?,
            temperature: temperature.map(|t| t as f32),
            recorded_at: parse_timestamp(&at).unwrap_or_default(),
        });
    }
    Ok(entries)
}
