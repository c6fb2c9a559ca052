use chrono::Utc;
use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::{format_timestamp, AuthorityLevel, SourceBook};

/// Register a source, upserting by title. The authority level is immutable:
/// re-registering with a different level fails with `SourceConflict`, while
/// author updates are accepted.
pub fn register_source(conn: &Connection, source: &SourceBook) -> Result<SourceBook, DatabaseError> {
    if source.title.trim().is_empty() {
        return Err(DatabaseError::ConstraintViolation(
            "source title must not be empty".into(),
        ));
    }

    match get_source(conn, &source.title)? {
        Some(existing) => {
            if existing.authority_level != source.authority_level {
                return Err(DatabaseError::SourceConflict {
                    title: source.title.clone(),
                    existing: existing.authority_level.as_i64(),
                    requested: source.authority_level.as_i64(),
                });
            }
            if existing.author != source.author {
                conn.execute(
                    "UPDATE sources SET author = ?2 WHERE title = ?1",
                    params![source.title, source.author],
                )?;
            }
            Ok(source.clone())
        }
        None => {
            conn.execute(
                "INSERT INTO sources (title, author, authority_level, registered_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    source.title,
                    source.author,
                    source.authority_level.as_i64(),
                    format_timestamp(&Utc::now().naive_utc()),
                ],
            )?;
            tracing::info!(title = %source.title, level = source.authority_level.as_i64(), "Source registered");
            Ok(source.clone())
        }
    }
}

pub fn get_source(conn: &Connection, title: &str) -> Result<Option<SourceBook>, DatabaseError> {
    let result = conn.query_row(
        "SELECT title, author, authority_level FROM sources WHERE title = ?1",
        params![title],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, i64>(2)?,
            ))
        },
    );

    match result {
        Ok((title, author, level)) => Ok(Some(SourceBook {
            title,
            author,
            authority_level: AuthorityLevel::from_i64(level)?,
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_sources(conn: &Connection) -> Result<Vec<SourceBook>, DatabaseError> {
    let mut stmt =
        conn.prepare("SELECT title, author, authority_level FROM sources ORDER BY title")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, Option<String>>(1)?,
            row.get::<_, i64>(2)?,
        ))
    })?;

    let mut sources = Vec::new();
    for row in rows {
        let (title, author, level) = row?;
        sources.push(SourceBook {
            title,
            author,
            authority_level: AuthorityLevel::from_i64(level)?,
        });
    }
    Ok(sources)
}

/// Remove a source. Fails while any rule references it.
pub fn remove_source(conn: &Connection, title: &str) -> Result<(), DatabaseError> {
    let referencing: i64 = conn.query_row(
        "SELECT COUNT(*) FROM rules WHERE source_title = ?1",
        params![title],
        |row| row.get(0),
    )?;
    if referencing > 0 {
        return Err(DatabaseError::ConstraintViolation(format!(
            "source '{title}' still has {referencing} referencing rules"
        )));
    }

    let deleted = conn.execute("DELETE FROM sources WHERE title = ?1", params![title])?;
    if deleted == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "SourceBook".into(),
            id: title.into(),
        });
    }
    Ok(())
}
