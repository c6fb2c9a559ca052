use thiserror::Error;

use crate::db::DatabaseError;
use crate::lexicon::LexiconError;
use crate::pipeline::correction::CorrectionError;
use crate::pipeline::extraction::ExtractionError;

/// External error surface of the knowledge base. Layer errors are folded
/// into the caller-visible kinds; anything structural stays wrapped.
#[derive(Error, Debug)]
pub enum KbError {
    #[error("Ingest error: {0}")]
    Ingest(#[from] ExtractionError),

    #[error("Unknown source: {0} (register it before storing rules)")]
    UnknownSource(String),

    #[error(
        "Source conflict for '{title}': authority level is immutable \
         (registered as {existing}, attempted {requested})"
    )]
    SourceConflict {
        title: String,
        existing: i64,
        requested: i64,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Duplicate rule: {0}")]
    DuplicateRule(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Correction rejected for rule {rule_id}: {reason}")]
    CorrectionRejected { rule_id: String, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(DatabaseError),

    #[error("Correction error: {0}")]
    Correction(CorrectionError),

    #[error("Lexicon error: {0}")]
    Lexicon(#[from] LexiconError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<DatabaseError> for KbError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::UnknownSource(title) => KbError::UnknownSource(title),
            DatabaseError::SourceConflict {
                title,
                existing,
                requested,
            } => KbError::SourceConflict {
                title,
                existing,
                requested,
            },
            DatabaseError::NotFound { entity_type, id } => {
                KbError::NotFound(format!("{entity_type} {id}"))
            }
            DatabaseError::ConstraintViolation(reason) => KbError::Validation(reason),
            other => KbError::Database(other),
        }
    }
}

impl From<CorrectionError> for KbError {
    fn from(e: CorrectionError) -> Self {
        match e {
            CorrectionError::ModelUnavailable(model) => KbError::ModelUnavailable(model),
            CorrectionError::OllamaConnection(url) => KbError::ModelUnavailable(url),
            CorrectionError::Database(db) => db.into(),
            other => KbError::Correction(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_errors_fold_into_external_kinds() {
        let e: KbError = DatabaseError::UnknownSource("Saravali".into()).into();
        assert!(matches!(e, KbError::UnknownSource(_)));

        let e: KbError = DatabaseError::SourceConflict {
            title: "BPHS".into(),
            existing: 1,
            requested: 3,
        }
        .into();
        assert!(matches!(e, KbError::SourceConflict { existing: 1, requested: 3, .. }));

        let e: KbError = DatabaseError::NotFound {
            entity_type: "Rule".into(),
            id: "abc".into(),
        }
        .into();
        assert!(matches!(e, KbError::NotFound(_)));

        let e: KbError = DatabaseError::ConstraintViolation("house 13".into()).into();
        assert!(matches!(e, KbError::Validation(_)));
    }

    #[test]
    fn connection_failures_surface_as_model_unavailable() {
        let e: KbError = CorrectionError::OllamaConnection("localhost".into()).into();
        assert!(matches!(e, KbError::ModelUnavailable(_)));
        let e: KbError = CorrectionError::ModelUnavailable("llama3.1".into()).into();
        assert!(matches!(e, KbError::ModelUnavailable(_)));
    }
}
