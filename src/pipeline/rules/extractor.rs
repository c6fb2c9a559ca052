//! Battery orchestration: ordered patterns, then progressively relaxed
//! fallbacks, then confidence gating. One sentence in, zero or more
//! candidate rules out.

use crate::lexicon::Lexicon;
use crate::models::{
    ExtractionMethod, Polarity, RuleCategory, RuleConditions, Strength,
};
use crate::pipeline::rules::confidence::{score, ConfidenceWeights};
use crate::pipeline::rules::effects::extract_effects;
use crate::pipeline::rules::patterns::{PatternHit, PatternResult, PatternSet};

/// A rule candidate, owned transiently by the extractor until the store
/// accepts it.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub original_text: String,
    pub conditions: RuleConditions,
    pub effects: Vec<String>,
    pub polarity: Polarity,
    pub category: RuleCategory,
    pub tags: Vec<String>,
    pub extraction_method: ExtractionMethod,
    pub confidence: f32,
}

pub struct RuleExtractor<'a> {
    lexicon: &'a Lexicon,
    patterns: PatternSet,
    weights: ConfidenceWeights,
    min_confidence: f32,
}

impl<'a> RuleExtractor<'a> {
    pub fn new(lexicon: &'a Lexicon, min_confidence: f32) -> Self {
        Self::with_weights(lexicon, min_confidence, ConfidenceWeights::default())
    }

    pub fn with_weights(
        lexicon: &'a Lexicon,
        min_confidence: f32,
        weights: ConfidenceWeights,
    ) -> Self {
        Self {
            lexicon,
            patterns: PatternSet::new(lexicon),
            weights,
            min_confidence,
        }
    }

    /// Extract candidates from one sentence. Conjunctive sentences
    /// ("Mars in 1st gives X; Mars in 7th gives Y") split on `;` and each
    /// clause is processed independently.
    pub fn extract(&self, sentence: &str) -> Vec<Candidate> {
        if sentence.contains(';') {
            return sentence
                .split(';')
                .filter_map(|clause| self.extract_single(clause.trim()))
                .collect();
        }
        self.extract_single(sentence.trim()).into_iter().collect()
    }

    fn extract_single(&self, sentence: &str) -> Option<Candidate> {
        if sentence.is_empty() {
            return None;
        }

        if let Some(hit) = self.run_battery(sentence)? {
            return self.finish(sentence, hit.conditions, hit.method, hit.yoga, hit.conjunction);
        }

        // Relaxed fallback: any pair of {planet, house, sign, ascendant}.
        let loose = RuleConditions {
            planet: self.patterns.find_planet(sentence, self.lexicon),
            house: self.patterns.find_house(sentence, self.lexicon),
            sign: self.patterns.find_sign(sentence, self.lexicon),
            ascendant: self.patterns.find_ascendant(sentence, self.lexicon),
            ..Default::default()
        };
        let components = loose.planet.is_some() as u8
            + loose.house.is_some() as u8
            + loose.sign.is_some() as u8
            + loose.ascendant.is_some() as u8;
        if components >= 2 && loose.has_primary() {
            return self.finish(
                sentence,
                loose,
                ExtractionMethod::RelaxedFallback,
                None,
                false,
            );
        }

        // Keyword-only fallback: a strong astrological keyword plus at
        // least one condition token.
        let lower = sentence.to_lowercase();
        let has_keyword = self
            .lexicon
            .keywords
            .iter()
            .any(|k| lower.contains(k.as_str()));
        if has_keyword && loose.has_primary() {
            return self.finish(
                sentence,
                loose,
                ExtractionMethod::KeywordFallback,
                None,
                false,
            );
        }

        None
    }

    /// Try the ordered battery. `Ok(None)` means no pattern matched (the
    /// fallbacks may still run); `None` means the sentence is malformed
    /// and must be dropped entirely.
    #[allow(clippy::type_complexity)]
    fn run_battery(&self, sentence: &str) -> Option<Option<PatternHit>> {
        let attempts: [fn(&PatternSet, &str, &Lexicon) -> PatternResult; 6] = [
            PatternSet::try_basic_placement,
            PatternSet::try_ascendant_specific,
            PatternSet::try_aspect,
            PatternSet::try_lordship,
            PatternSet::try_nakshatra,
            PatternSet::try_yoga,
        ];

        for attempt in attempts {
            match attempt(&self.patterns, sentence, self.lexicon) {
                PatternResult::Hit(hit) => return Some(Some(hit)),
                PatternResult::Malformed(reason) => {
                    tracing::warn!(sentence, reason = %reason, "Malformed condition value, sentence dropped");
                    return None;
                }
                PatternResult::NoMatch => continue,
            }
        }
        Some(None)
    }

    fn finish(
        &self,
        sentence: &str,
        mut conditions: RuleConditions,
        method: ExtractionMethod,
        yoga: Option<String>,
        conjunction: bool,
    ) -> Option<Candidate> {
        conditions.strength = detect_strength(sentence, self.lexicon);

        let house_context = conditions
            .house
            .map(|h| h.get())
            .or_else(|| conditions.lord_of.map(|h| h.get()));
        let outcome = extract_effects(sentence, house_context, self.lexicon)?;

        let confidence = score(
            sentence,
            &conditions,
            outcome.explicit,
            method,
            &self.weights,
            self.lexicon,
        );
        if confidence <= 0.0 || confidence < self.min_confidence {
            tracing::debug!(sentence, confidence = %confidence, "Candidate below confidence floor");
            return None;
        }

        let category = derive_category(method, &conditions);
        let tags = build_tags(
            &conditions,
            method,
            outcome.category_label.as_deref(),
            yoga.as_deref(),
            conjunction,
            outcome.polarity,
        );

        Some(Candidate {
            original_text: sentence.to_string(),
            conditions,
            effects: outcome.effects,
            polarity: outcome.polarity,
            category,
            tags,
            extraction_method: method,
            confidence,
        })
    }
}

fn detect_strength(sentence: &str, lexicon: &Lexicon) -> Option<Strength> {
    let lower = sentence.to_lowercase();
    if lexicon.strength_strong.iter().any(|w| lower.contains(w.as_str())) {
        return Some(Strength::Strong);
    }
    if lexicon.strength_weak.iter().any(|w| lower.contains(w.as_str())) {
        return Some(Strength::Weak);
    }
    None
}

fn derive_category(method: ExtractionMethod, conditions: &RuleConditions) -> RuleCategory {
    match method {
        ExtractionMethod::BasicPlacement | ExtractionMethod::AscendantSpecific => {
            RuleCategory::PlanetaryPlacement
        }
        ExtractionMethod::Aspect => RuleCategory::Aspect,
        ExtractionMethod::Lordship => RuleCategory::HouseLordship,
        ExtractionMethod::Nakshatra => RuleCategory::Nakshatra,
        ExtractionMethod::Yoga => RuleCategory::Yoga,
        ExtractionMethod::RelaxedFallback | ExtractionMethod::KeywordFallback => {
            if conditions.lord_of.is_some() {
                RuleCategory::HouseLordship
            } else if conditions.nakshatra.is_some() {
                RuleCategory::Nakshatra
            } else if conditions.planet.is_some()
                && (conditions.house.is_some() || conditions.sign.is_some())
            {
                RuleCategory::PlanetaryPlacement
            } else {
                RuleCategory::Other
            }
        }
    }
}

fn build_tags(
    conditions: &RuleConditions,
    method: ExtractionMethod,
    category_label: Option<&str>,
    yoga: Option<&str>,
    conjunction: bool,
    polarity: Polarity,
) -> Vec<String> {
    let mut tags = Vec::new();

    if let Some(p) = conditions.planet {
        tags.push(format!("planet:{}", p.as_str().to_lowercase()));
    }
    if let Some(h) = conditions.house {
        tags.push(format!("house:{h}"));
    }
    if let Some(s) = conditions.sign {
        tags.push(format!("sign:{}", s.as_str().to_lowercase()));
    }
    if let Some(n) = conditions.nakshatra {
        tags.push(format!("nakshatra:{}", n.as_str().to_lowercase()));
    }
    if let Some(a) = conditions.aspect {
        tags.push(format!("aspect:{}", a.as_str().to_lowercase()));
    }
    if let Some(l) = conditions.lord_of {
        tags.push(format!("lord_of:{l}"));
    }
    if let Some(a) = conditions.ascendant {
        tags.push(format!("ascendant:{}", a.as_str().to_lowercase()));
    }
    if let Some(s) = conditions.strength {
        tags.push(format!("strength:{}", s.as_str()));
    }
    if let Some(label) = category_label {
        tags.push(label.to_string());
    }
    if let Some(name) = yoga {
        tags.push(name.to_string());
    }
    if method == ExtractionMethod::Aspect {
        tags.push(if conjunction { "conjunction" } else { "aspect" }.to_string());
    }
    if polarity == Polarity::Negative {
        tags.push("negative".to_string());
    }

    tags.sort();
    tags.dedup();
    tags
}
