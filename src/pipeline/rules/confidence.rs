use crate::lexicon::Lexicon;
use crate::models::{ExtractionMethod, RuleConditions};

/// Confidence formula weights. The defaults reproduce the calibration the
/// extractor was tuned with; treat alternates as configuration, not code
/// changes.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceWeights {
    pub pattern_match: f32,
    pub term_density: f32,
    pub structure: f32,
    pub completeness: f32,
    /// Ceiling for the relaxed fallback path.
    pub relaxed_cap: f32,
    /// Ceiling for the keyword-only fallback path.
    pub keyword_cap: f32,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            pattern_match: 0.40,
            term_density: 0.25,
            structure: 0.20,
            completeness: 0.15,
            relaxed_cap: 0.55,
            keyword_cap: 0.40,
        }
    }
}

/// Sentence-length band considered well-formed.
const MIN_TOKENS: usize = 6;
const MAX_TOKENS: usize = 40;

/// Weighted confidence for one candidate:
/// pattern-match quality, classical-term density, sentence structure, and a
/// completeness bonus, clamped to [0,1]. Fallback methods apply their caps
/// after the sum.
pub fn score(
    sentence: &str,
    conditions: &RuleConditions,
    explicit_effect: bool,
    method: ExtractionMethod,
    weights: &ConfidenceWeights,
    lexicon: &Lexicon,
) -> f32 {
    let has_planet = conditions.planet.is_some();
    let has_place = conditions.house.is_some() || conditions.sign.is_some();
    let captured =
        has_planet as u32 as f32 + has_place as u32 as f32 + explicit_effect as u32 as f32;
    let pattern_match_quality = captured / 3.0;

    let term_density = (lexicon.term_count(sentence) as f32 * 0.1).min(1.0);

    let tokens = sentence.split_whitespace().count();
    let length_component = if (MIN_TOKENS..=MAX_TOKENS).contains(&tokens) {
        0.6
    } else {
        0.2
    };
    let svo_component = if !conditions.is_empty() && explicit_effect {
        0.4
    } else {
        0.0
    };
    let structure_score = length_component + svo_component;

    let completeness = if !conditions.is_empty() && explicit_effect {
        1.0
    } else {
        0.0
    };

    let raw = weights.pattern_match * pattern_match_quality
        + weights.term_density * term_density
        + weights.structure * structure_score
        + weights.completeness * completeness;

    let capped = match method {
        ExtractionMethod::RelaxedFallback => raw.min(weights.relaxed_cap),
        ExtractionMethod::KeywordFallback => raw.min(weights.keyword_cap),
        _ => raw,
    };

    capped.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::Lexicon;
    use crate::models::{House, Planet};

    fn mars_7th() -> RuleConditions {
        RuleConditions {
            planet: Some(Planet::Mars),
            house: Some(House::new(7).unwrap()),
            ..Default::default()
        }
    }

    #[test]
    fn clean_placement_scores_high() {
        let confidence = score(
            "Mars in the 7th house causes discord in marriage",
            &mars_7th(),
            true,
            ExtractionMethod::BasicPlacement,
            &ConfidenceWeights::default(),
            Lexicon::bundled(),
        );
        assert!(confidence >= 0.75, "expected >= 0.75, got {confidence}");
        assert!(confidence <= 1.0);
    }

    #[test]
    fn missing_effect_lowers_score() {
        let with_effect = score(
            "Mars in the 7th house causes discord in marriage",
            &mars_7th(),
            true,
            ExtractionMethod::BasicPlacement,
            &ConfidenceWeights::default(),
            Lexicon::bundled(),
        );
        let without_effect = score(
            "Mars in the 7th house and related matters",
            &mars_7th(),
            false,
            ExtractionMethod::BasicPlacement,
            &ConfidenceWeights::default(),
            Lexicon::bundled(),
        );
        assert!(without_effect < with_effect);
    }

    #[test]
    fn short_sentences_penalized() {
        let short = score(
            "Mars in 7th",
            &mars_7th(),
            true,
            ExtractionMethod::BasicPlacement,
            &ConfidenceWeights::default(),
            Lexicon::bundled(),
        );
        let normal = score(
            "Mars in the 7th house causes discord in marriage",
            &mars_7th(),
            true,
            ExtractionMethod::BasicPlacement,
            &ConfidenceWeights::default(),
            Lexicon::bundled(),
        );
        assert!(short < normal);
    }

    #[test]
    fn overlong_sentences_penalized() {
        let long_sentence = format!(
            "Mars in the 7th house causes discord {}",
            "and further troubles of every kind ".repeat(8)
        );
        let long = score(
            &long_sentence,
            &mars_7th(),
            true,
            ExtractionMethod::BasicPlacement,
            &ConfidenceWeights::default(),
            Lexicon::bundled(),
        );
        let normal = score(
            "Mars in the 7th house causes discord in marriage",
            &mars_7th(),
            true,
            ExtractionMethod::BasicPlacement,
            &ConfidenceWeights::default(),
            Lexicon::bundled(),
        );
        assert!(long < normal);
    }

    #[test]
    fn classical_terms_raise_score() {
        let plain = score(
            "Mars in the 7th house causes discord in marriage",
            &mars_7th(),
            true,
            ExtractionMethod::BasicPlacement,
            &ConfidenceWeights::default(),
            Lexicon::bundled(),
        );
        let dense = score(
            "Mars in the 7th bhava of the rasi chart causes discord in marriage during its dasha",
            &mars_7th(),
            true,
            ExtractionMethod::BasicPlacement,
            &ConfidenceWeights::default(),
            Lexicon::bundled(),
        );
        assert!(dense > plain, "dense {dense} <= plain {plain}");
    }

    #[test]
    fn relaxed_cap_applies() {
        let confidence = score(
            "Mars in the 7th house causes discord in marriage",
            &mars_7th(),
            true,
            ExtractionMethod::RelaxedFallback,
            &ConfidenceWeights::default(),
            Lexicon::bundled(),
        );
        assert!(confidence <= 0.55, "relaxed cap breached: {confidence}");
    }

    #[test]
    fn keyword_cap_applies() {
        let confidence = score(
            "Mars in the 7th house causes discord in marriage",
            &mars_7th(),
            true,
            ExtractionMethod::KeywordFallback,
            &ConfidenceWeights::default(),
            Lexicon::bundled(),
        );
        assert!(confidence <= 0.40, "keyword cap breached: {confidence}");
    }

    #[test]
    fn score_always_in_unit_interval() {
        let sentences = [
            "Mars",
            "Mars in the 7th bhava with yoga dasha nakshatra rasi graha lagna aspects drishti",
        ];
        for s in sentences {
            let c = score(
                s,
                &mars_7th(),
                true,
                ExtractionMethod::BasicPlacement,
                &ConfidenceWeights::default(),
                Lexicon::bundled(),
            );
            assert!((0.0..=1.0).contains(&c), "{s} -> {c}");
        }
    }
}
