use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};

use super::rule::{map_rule_row, RULE_COLUMNS};
use crate::db::DatabaseError;
use crate::models::{OrderBy, Polarity, Rule, RuleFilter};

/// Relevance expression: classical sources and high-confidence rules float
/// up. Must match the documented ranking exactly.
const RELEVANCE_EXPR: &str = "(0.4 * (4 - authority_level) / 3.0 + 0.6 * confidence)";

/// Multi-criteria search. Unset filter fields are ignored; ties in every
/// ordering break by creation order so replays are stable.
pub fn search_rules(conn: &Connection, filter: &RuleFilter) -> Result<Vec<Rule>, DatabaseError> {
    let mut sql = format!("SELECT {RULE_COLUMNS} FROM rules WHERE 1=1");
    let mut params: Vec<Value> = Vec::new();

    if let Some(p) = filter.planet {
        sql.push_str(" AND planet = ?");
        params.push(Value::Text(p.as_str().into()));
    }
    if let Some(h) = filter.house {
        sql.push_str(" AND house = ?");
        params.push(Value::Integer(h.get() as i64));
    }
    if let Some(s) = filter.sign {
        sql.push_str(" AND sign = ?");
        params.push(Value::Text(s.as_str().into()));
    }
    if let Some(n) = filter.nakshatra {
        sql.push_str(" AND nakshatra = ?");
        params.push(Value::Text(n.as_str().into()));
    }
    if let Some(a) = filter.ascendant {
        sql.push_str(" AND ascendant = ?");
        params.push(Value::Text(a.as_str().into()));
    }
    if let Some(l) = filter.lord_of {
        sql.push_str(" AND lord_of = ?");
        params.push(Value::Integer(l.get() as i64));
    }
    if let Some(source) = &filter.source_title {
        sql.push_str(" AND source_title = ?");
        params.push(Value::Text(source.clone()));
    }
    if let Some(level) = filter.authority_level {
        sql.push_str(" AND authority_level = ?");
        params.push(Value::Integer(level.as_i64()));
    }
    if let Some(category) = filter.category {
        sql.push_str(" AND category = ?");
        params.push(Value::Text(category.as_str().into()));
    }
    if !filter.tags.is_empty() {
        // Any-of: the serialized tag list contains at least one requested tag.
        let clauses: Vec<&str> = filter
            .tags
            .iter()
            .map(|_| "tags_json LIKE '%\"' || ? || '\"%'")
            .collect();
        sql.push_str(&format!(" AND ({})", clauses.join(" OR ")));
        for tag in &filter.tags {
            params.push(Value::Text(tag.clone()));
        }
    }
    if let Some(min) = filter.min_confidence {
        sql.push_str(" AND confidence >= ?");
        params.push(Value::Real(min as f64));
    }
    if let Some(max) = filter.max_confidence {
        sql.push_str(" AND confidence <= ?");
        params.push(Value::Real(max as f64));
    }
    if let Some(needle) = &filter.effect_contains {
        sql.push_str(" AND LOWER(effects_json) LIKE '%' || LOWER(?) || '%'");
        params.push(Value::Text(needle.clone()));
    }
    if let Some(method) = filter.extraction_method {
        sql.push_str(" AND extraction_method = ?");
        params.push(Value::Text(method.as_str().into()));
    }

    let order_clause = match filter.order_by {
        OrderBy::Relevance => {
            format!(" ORDER BY {RELEVANCE_EXPR} DESC, created_at ASC, rowid ASC")
        }
        OrderBy::Confidence => " ORDER BY confidence DESC, created_at ASC, rowid ASC".into(),
        OrderBy::Authority => {
            " ORDER BY authority_level ASC, confidence DESC, created_at ASC, rowid ASC".into()
        }
        OrderBy::CreatedAt => " ORDER BY created_at ASC, rowid ASC".into(),
    };
    sql.push_str(&order_clause);

    sql.push_str(" LIMIT ? OFFSET ?");
    params.push(Value::Integer(
        filter.limit.map(|l| l as i64).unwrap_or(-1),
    ));
    params.push(Value::Integer(filter.offset as i64));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(params), map_rule_row)?;

    let mut rules = Vec::new();
    for row in rows {
        rules.push(row??);
    }
    Ok(rules)
}

/// The relevance score used for default ordering, exposed for callers that
/// re-rank in memory.
pub fn relevance_score(rule: &Rule) -> f32 {
    0.4 * (4.0 - rule.authority_level.as_i64() as f32) / 3.0 + 0.6 * rule.confidence
}

/// Stored rules whose point conditions match the given rule but whose
/// polarity contradicts it. Both rules stay stored; resolution is the
/// consumer's business.
pub fn conflicting_rules(conn: &Connection, rule: &Rule) -> Result<Vec<Rule>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RULE_COLUMNS} FROM rules
         WHERE id != ?1 AND planet IS ?2 AND house IS ?3 AND sign IS ?4
         ORDER BY created_at ASC, rowid ASC"
    ))?;
    let rows = stmt.query_map(
        rusqlite::params![
            rule.id,
            rule.conditions.planet.map(|p| p.as_str()),
            rule.conditions.house.map(|h| h.get() as i64),
            rule.conditions.sign.map(|s| s.as_str()),
        ],
        map_rule_row,
    )?;

    let mut conflicts = Vec::new();
    for row in rows {
        let other = row??;
        let contradicts = matches!(
            (rule.polarity, other.polarity),
            (Polarity::Positive, Polarity::Negative) | (Polarity::Negative, Polarity::Positive)
        );
        if contradicts {
            conflicts.push(other);
        }
    }
    Ok(conflicts)
}
