pub mod pdf;
pub mod preprocess;
pub mod relevance;
pub mod segment;

pub use pdf::*;
pub use preprocess::*;
pub use relevance::*;
pub use segment::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("Document appears empty — no text could be extracted")]
    EmptyDocument,
}
