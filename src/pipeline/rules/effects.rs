use crate::lexicon::Lexicon;
use crate::models::Polarity;

/// Effect phrase plus derived classification for one sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectOutcome {
    pub effects: Vec<String>,
    pub polarity: Polarity,
    /// Category label from the keyword map (also used as a tag).
    pub category_label: Option<String>,
    /// True when the effect came from an explicit indicator phrase rather
    /// than the keyword-map fallback.
    pub explicit: bool,
}

/// Locate the first effect indicator and take everything after it as the
/// effect phrase. Without an indicator (or with an empty remainder), fall
/// back to a category-label effect from the keyword map, then from the
/// house under discussion. Returns `None` when no effect can be derived —
/// the candidate is discarded.
pub fn extract_effects(
    sentence: &str,
    house_context: Option<u8>,
    lexicon: &Lexicon,
) -> Option<EffectOutcome> {
    let polarity = polarity_of(sentence, lexicon);
    let category_label = categorize(sentence, house_context, lexicon);

    if let Some((_, phrase)) = first_indicator(sentence, lexicon) {
        let phrase = phrase
            .trim()
            .trim_end_matches(['.', '!', '?', ';', ','])
            .trim();
        if phrase.len() > 3 {
            return Some(EffectOutcome {
                effects: vec![phrase.to_string()],
                polarity,
                category_label,
                explicit: true,
            });
        }
    }

    category_label.clone().map(|label| EffectOutcome {
        effects: vec![label],
        polarity,
        category_label,
        explicit: false,
    })
}

/// Find the earliest whole-word effect indicator; returns the indicator and
/// the remainder of the sentence after it.
pub fn first_indicator<'a>(sentence: &'a str, lexicon: &Lexicon) -> Option<(String, &'a str)> {
    let lower = sentence.to_lowercase();
    let mut best: Option<(usize, usize, &str)> = None;

    for indicator in &lexicon.effect_indicators {
        if let Some(pos) = find_word(&lower, indicator) {
            let end = pos + indicator.len();
            if best.is_none_or(|(b, _, _)| pos < b) {
                best = Some((pos, end, indicator.as_str()));
            }
        }
    }

    // Offsets come from the lowercased copy; a checked slice covers the
    // rare non-ASCII lowercase length change.
    best.map(|(_, end, indicator)| {
        (
            indicator.to_string(),
            sentence.get(end..).unwrap_or_default(),
        )
    })
}

/// Dominant keyword class of the sentence, with house context as fallback
/// (7th house talk defaults to "marriage", 10th to "career").
pub fn categorize(sentence: &str, house_context: Option<u8>, lexicon: &Lexicon) -> Option<String> {
    let lower = sentence.to_lowercase();

    let mut best: Option<(&str, usize)> = None;
    for (category, keywords) in &lexicon.category_keywords {
        let hits = keywords
            .iter()
            .filter(|k| find_word(&lower, k).is_some())
            .count();
        if hits > 0 && best.is_none_or(|(_, b)| hits > b) {
            best = Some((category.as_str(), hits));
        }
    }
    if let Some((category, _)) = best {
        return Some(category.to_string());
    }

    house_context.and_then(|h| lexicon.house_category(h).map(str::to_string))
}

/// Polarity from the closed positive/negative word lists.
pub fn polarity_of(sentence: &str, lexicon: &Lexicon) -> Polarity {
    let lower = sentence.to_lowercase();
    let positive = lexicon
        .positive_words
        .iter()
        .any(|w| find_word(&lower, w).is_some());
    let negative = lexicon
        .negative_words
        .iter()
        .any(|w| find_word(&lower, w).is_some());

    match (positive, negative) {
        (true, true) => Polarity::Mixed,
        (true, false) => Polarity::Positive,
        (false, true) => Polarity::Negative,
        (false, false) => Polarity::Neutral,
    }
}

/// First whole-word occurrence of `needle` in a lowercased haystack.
fn find_word(haystack: &str, needle: &str) -> Option<usize> {
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(needle) {
        let abs = start + pos;
        let before_ok = abs == 0
            || !haystack[..abs]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric());
        let after = abs + needle.len();
        let after_ok = after >= haystack.len()
            || !haystack[after..]
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric());
        if before_ok && after_ok {
            return Some(abs);
        }
        start = abs + 1;
    }
    None
}
