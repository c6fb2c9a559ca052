//! The non-LLM validation gate. The model is never trusted to preserve
//! astrological identity — every returned correction is checked here, and
//! a rejection leaves the stored rule untouched.

use std::fmt;

use crate::models::Rule;

/// Why a returned correction was refused.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    /// A condition value's token disappeared from the corrected text.
    IdentityViolation(String),
    /// len(corrected)/len(original) outside [0.5, 2.0].
    LengthRatio(f32),
    /// An effect phrase lost more than 40% of its content words.
    EffectDrift,
    /// Control characters or replacement glyphs in the corrected text.
    InvalidEncoding,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IdentityViolation(token) => write!(f, "identity_violation:{token}"),
            Self::LengthRatio(ratio) => write!(f, "length_ratio:{ratio:.2}"),
            Self::EffectDrift => write!(f, "effect_drift"),
            Self::InvalidEncoding => write!(f, "invalid_encoding"),
        }
    }
}

const MIN_LENGTH_RATIO: f32 = 0.5;
const MAX_LENGTH_RATIO: f32 = 2.0;
const MIN_EFFECT_RETENTION: f32 = 0.6;
const CONTENT_WORD_MIN_LEN: usize = 4;

/// Validate one returned correction against the stored rule.
pub fn validate_correction(rule: &Rule, corrected: &str) -> Result<(), RejectReason> {
    // 1. Encoding sanity: no control characters, no replacement glyphs.
    if corrected
        .chars()
        .any(|c| c == '\u{FFFD}' || (c.is_control() && !c.is_whitespace()))
    {
        return Err(RejectReason::InvalidEncoding);
    }

    // 2. Length ratio.
    let ratio = corrected.len() as f32 / rule.original_text.len().max(1) as f32;
    if !(MIN_LENGTH_RATIO..=MAX_LENGTH_RATIO).contains(&ratio) {
        return Err(RejectReason::LengthRatio(ratio));
    }

    // 3. Condition identity: every condition value must keep a token in the
    //    corrected text (house numbers may appear as digit, ordinal, or word).
    let lower = corrected.to_lowercase();
    for group in rule.conditions.identity_tokens() {
        let found = group
            .iter()
            .any(|token| contains_token(&lower, &token.to_lowercase()));
        if !found {
            return Err(RejectReason::IdentityViolation(group[0].clone()));
        }
    }

    // 4. Effect phrase retention.
    for effect in &rule.effects {
        let content: Vec<String> = effect
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() >= CONTENT_WORD_MIN_LEN)
            .map(str::to_string)
            .collect();
        if content.is_empty() {
            continue;
        }
        let retained = content
            .iter()
            .filter(|w| contains_token(&lower, w))
            .count();
        if (retained as f32 / content.len() as f32) < MIN_EFFECT_RETENTION {
            return Err(RejectReason::EffectDrift);
        }
    }

    Ok(())
}

/// Whole-word containment over a lowercased haystack. "7" does not match
/// inside "17", but "7th" is its own token.
fn contains_token(haystack: &str, token: &str) -> bool {
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(token) {
        let abs = start + pos;
        let before_ok = abs == 0
            || !haystack[..abs]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric());
        let after = abs + token.len();
        let after_ok = after >= haystack.len()
            || !haystack[after..]
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        start = abs + 1;
    }
    false
}
