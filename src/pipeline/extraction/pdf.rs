use super::ExtractionError;

/// Raw text of a single PDF page. Page numbers are 1-based and travel with
/// every sentence so stored rules keep their provenance.
#[derive(Debug, Clone)]
pub struct PageText {
    pub page_number: usize,
    pub text: String,
}

/// PDF text extractor for digital PDFs with embedded text layers, using
/// the pdf-extract crate.
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    pub fn extract_pages(pdf_bytes: &[u8]) -> Result<Vec<PageText>, ExtractionError> {
        let page_texts = pdf_extract::extract_text_from_mem_by_pages(pdf_bytes)
            .map_err(|e| ExtractionError::PdfParsing(e.to_string()))?;

        let pages: Vec<PageText> = page_texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| PageText {
                page_number: i + 1,
                text,
            })
            .collect();

        if pages.iter().all(|p| p.text.trim().is_empty()) {
            return Err(ExtractionError::EmptyDocument);
        }

        for page in &pages {
            if page.text.trim().len() < 10 {
                tracing::warn!(
                    page = page.page_number,
                    "Near-zero extractable text on page, continuing"
                );
            }
        }

        Ok(pages)
    }

    pub fn page_count(pdf_bytes: &[u8]) -> Result<usize, ExtractionError> {
        let pages = pdf_extract::extract_text_from_mem_by_pages(pdf_bytes)
            .map_err(|e| ExtractionError::PdfParsing(e.to_string()))?;
        Ok(pages.len())
    }
}
