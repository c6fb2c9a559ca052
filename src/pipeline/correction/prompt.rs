use std::str::FromStr;

use serde::Deserialize;

use super::CorrectionError;
use crate::models::CorrectionFix;

pub const CORRECTION_SYSTEM_PROMPT: &str = r#"
You repair OCR damage in sentences from classical Vedic astrology books.
Your ONLY job is readability: word spacing, broken hyphenation, missing
punctuation, and obvious misspellings.

RULES — ABSOLUTE, NO EXCEPTIONS:
1. Fix ONLY OCR-like defects. Never rephrase, summarize, or reorder.
2. Preserve every planet, sign, nakshatra, house number and ordinal
   EXACTLY as written. "Mars" stays "Mars"; "7th" stays "7th".
3. Preserve Sanskrit terms (lagna, bhava, dasha, yoga) verbatim.
4. NEVER invent new astrological claims or change the meaning.
5. Return one corrected sentence per input, in the same order, with the
   same count.
6. For each item report a confidence between 0.0 and 1.0 and the fixes
   you applied, drawn ONLY from this set:
   spacing, hyphenation, punctuation, spelling, sanskrit_preservation, grammar.

OUTPUT FORMAT:
A single JSON array wrapped in ```json``` fences, one object per input:
[{"corrected": "...", "confidence": 0.95, "fixes": ["spacing"]}]
"#;

/// One rule's text going into a correction batch.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub rule_id: String,
    pub text: String,
    /// Tokens the model is reminded to keep verbatim (one representative
    /// per condition). Enforcement happens in the validation gate, never
    /// here.
    pub preserve: Vec<String>,
}

/// One corrected item as returned by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionItem {
    pub corrected: String,
    pub confidence: f32,
    pub fixes: Vec<CorrectionFix>,
}

/// Escape XML-like tags so sentence content cannot close the prompt's
/// `<sentences>` boundary.
fn escape_xml_tags(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Build the batch prompt: numbered sentences plus their must-keep tokens.
pub fn build_correction_prompt(items: &[BatchItem]) -> String {
    let mut listing = String::new();
    for (i, item) in items.iter().enumerate() {
        let preserve = if item.preserve.is_empty() {
            String::new()
        } else {
            format!(" [keep verbatim: {}]", item.preserve.join(", "))
        };
        listing.push_str(&format!(
            "{}. {}{}\n",
            i + 1,
            escape_xml_tags(&item.text),
            preserve
        ));
    }

    format!(
        r#"Correct the OCR damage in these {} sentences.

<sentences>
{listing}</sentences>

Return a ```json``` array with EXACTLY {} objects, one per sentence, in the
same order. Each object: {{"corrected": "...", "confidence": 0.0-1.0,
"fixes": ["spacing" | "hyphenation" | "punctuation" | "spelling" |
"sanskrit_preservation" | "grammar"]}}.
"#,
        items.len(),
        items.len()
    )
}

/// Parse the model's fenced JSON array. The item count must match the
/// batch exactly; otherwise the whole batch's corrections are discarded.
pub fn parse_correction_response(
    response: &str,
    expected: usize,
) -> Result<Vec<CorrectionItem>, CorrectionError> {
    let json_str = extract_json_block(response)?;

    #[derive(Deserialize)]
    struct RawItem {
        corrected: String,
        #[serde(default)]
        confidence: f32,
        #[serde(default)]
        fixes: Vec<String>,
    }

    let raw: Vec<RawItem> = serde_json::from_str(&json_str)
        .map_err(|e| CorrectionError::MalformedResponse(e.to_string()))?;

    if raw.len() != expected {
        return Err(CorrectionError::BatchCountMismatch {
            sent: expected,
            received: raw.len(),
        });
    }

    Ok(raw
        .into_iter()
        .map(|item| {
            let fixes = item
                .fixes
                .iter()
                .filter_map(|f| match CorrectionFix::from_str(f) {
                    Ok(fix) => Some(fix),
                    Err(_) => {
                        tracing::warn!(fix = %f, "Unknown fix tag dropped");
                        None
                    }
                })
                .collect();
            CorrectionItem {
                corrected: item.corrected,
                confidence: item.confidence.clamp(0.0, 1.0),
                fixes,
            }
        })
        .collect())
}

/// Case-insensitive ```json fence extraction; falls back to a bare JSON
/// array when the model skipped the fences.
fn extract_json_block(response: &str) -> Result<String, CorrectionError> {
    let lower = response.to_lowercase();
    if let Some(start) = lower.find("```json") {
        let content_start = start + 7;
        let end = response[content_start..]
            .find("```")
            .ok_or_else(|| CorrectionError::MalformedResponse("Unclosed JSON block".into()))?;
        return Ok(response[content_start..content_start + end].trim().to_string());
    }

    let start = response
        .find('[')
        .ok_or_else(|| CorrectionError::MalformedResponse("No JSON array found".into()))?;
    let end = response
        .rfind(']')
        .ok_or_else(|| CorrectionError::MalformedResponse("Unterminated JSON array".into()))?;
    if end < start {
        return Err(CorrectionError::MalformedResponse(
            "Unterminated JSON array".into(),
        ));
    }
    Ok(response[start..=end].to_string())
}
