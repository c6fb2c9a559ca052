use std::collections::BTreeMap;

use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::{format_timestamp, parse_timestamp, ExtractionStats, StoreStats};

/// Append one per-source ingest audit record.
pub fn record_extraction_stats(
    conn: &Connection,
    stats: &ExtractionStats,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO extraction_stats (source_title, sentences_total, sentences_astrological,
         rules_extracted, average_confidence, method, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            stats.source_title,
            stats.sentences_total as i64,
            stats.sentences_astrological as i64,
            stats.rules_extracted as i64,
            stats.average_confidence as f64,
            stats.method,
            format_timestamp(&stats.recorded_at),
        ],
    )?;
    Ok(())
}

/// All ingest audit records for a source, oldest first.
pub fn extraction_stats_for(
    conn: &Connection,
    source_title: &str,
) -> Result<Vec<ExtractionStats>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT source_title, sentences_total, sentences_astrological, rules_extracted,
         average_confidence, method, recorded_at
         FROM extraction_stats WHERE source_title = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![source_title], |row| {
        Ok(ExtractionStats {
            source_title: row.get(0)?,
            sentences_total: row.get::<_, i64>(1)? as u64,
            sentences_astrological: row.get::<_, i64>(2)? as u64,
            rules_extracted: row.get::<_, i64>(3)? as u64,
            average_confidence: row.get::<_, f64>(4)? as f32,
            method: row.get(5)?,
            recorded_at: parse_timestamp(&row.get::<_, String>(6)?).unwrap_or_default(),
        })
    })?;

    let mut stats = Vec::new();
    for row in rows {
        stats.push(row?);
    }
    Ok(stats)
}

/// Aggregate view of the store: totals, average confidence, and rule
/// counts per planet and house.
pub fn store_stats(conn: &Connection) -> Result<StoreStats, DatabaseError> {
    let total_rules: i64 = conn.query_row("SELECT COUNT(*) FROM rules", [], |row| row.get(0))?;
    let unique_sources: i64 = conn.query_row(
        "SELECT COUNT(DISTINCT source_title) FROM rules",
        [],
        |row| row.get(0),
    )?;
    let average_confidence: f64 = conn.query_row(
        "SELECT COALESCE(AVG(confidence), 0.0) FROM rules",
        [],
        |row| row.get(0),
    )?;

    let mut planet_distribution = BTreeMap::new();
    let mut stmt = conn.prepare(
        "SELECT planet, COUNT(*) FROM rules WHERE planet IS NOT NULL GROUP BY planet",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;
    for row in rows {
        let (planet, count) = row?;
        planet_distribution.insert(planet, count as u64);
    }

    let mut house_distribution = BTreeMap::new();
    let mut stmt =
        conn.prepare("SELECT house, COUNT(*) FROM rules WHERE house IS NOT NULL GROUP BY house")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
    })?;
    for row in rows {
        let (house, count) = row?;
        house_distribution.insert(house as u8, count as u64);
    }

    Ok(StoreStats {
        total_rules: total_rules as u64,
        unique_sources: unique_sources as u64,
        average_confidence: average_confidence as f32,
        planet_distribution,
        house_distribution,
    })
}
