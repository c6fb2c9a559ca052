//! The ordered pattern battery. Patterns are compiled once per extractor
//! from the lexicon's variant alternations, so Sanskrit spellings match
//! without any special-casing ("Kuja in the 7th bhava" hits the same
//! pattern as "Mars in the 7th house").

use regex::Regex;

use crate::lexicon::Lexicon;
use crate::models::{ExtractionMethod, House, RuleConditions};

/// Result of trying one pattern on one sentence.
#[derive(Debug)]
pub enum PatternResult {
    Hit(PatternHit),
    NoMatch,
    /// The pattern structurally matched but a captured value is invalid
    /// (house 13, unknown sign). The sentence is dropped, not retried.
    Malformed(String),
}

#[derive(Debug)]
pub struct PatternHit {
    pub method: ExtractionMethod,
    pub conditions: RuleConditions,
    /// Captured yoga name, for tags.
    pub yoga: Option<String>,
    /// True when an aspect hit was a conjunction rather than a full aspect.
    pub conjunction: bool,
}

pub struct PatternSet {
    basic_house: Regex,
    basic_sign: Regex,
    ascendant_specific: Regex,
    aspect: Regex,
    lordship: Regex,
    nakshatra: Regex,
    yoga_phrase: Regex,
    house_ref: Regex,
    ordinal_word: Regex,
    ascendant_ref: Regex,
    planet_word: Regex,
    sign_word: Regex,
}

impl PatternSet {
    pub fn new(lexicon: &Lexicon) -> Self {
        let p = lexicon.planet_alternation();
        let s = lexicon.sign_alternation();
        let n = lexicon.nakshatra_alternation();
        let ord = lexicon.ordinal_word_alternation();

        // "<Planet> in (the )?<House_ordinal> (house|bhava)?" anchored at the
        // sentence head so ascendant-prefixed sentences fall through to the
        // ascendant pattern.
        let basic_house = Regex::new(&format!(
            r"(?i)^(?:if\s+|when\s+|should\s+)?(?:the\s+)?(?P<planet>{p})\s+(?:is\s+)?(?:placed\s+in|posited\s+in|situated\s+in|in)\s+(?:the\s+)?(?:(?P<hnum>\d{{1,2}})(?:st|nd|rd|th)?|(?P<hword>{ord}))(?:\s+(?:house|bhava))?\b"
        ))
        .unwrap();

        let basic_sign = Regex::new(&format!(
            r"(?i)^(?:if\s+|when\s+|should\s+)?(?:the\s+)?(?P<planet>{p})\s+(?:is\s+)?(?:placed\s+in|posited\s+in|situated\s+in|in)\s+(?:the\s+)?(?:sign\s+of\s+)?(?P<sign>{s})\b"
        ))
        .unwrap();

        // "For <Sign> (ascendant|lagna), <Planet> in <House_ordinal> ..."
        let ascendant_specific = Regex::new(&format!(
            r"(?i)^for\s+(?:a\s+)?(?P<asc>{s})\s+(?:ascendant|lagna|rising)\s*,?\s*(?:the\s+)?(?P<planet>{p})\s+(?:is\s+)?in\s+(?:the\s+)?(?:(?P<hnum>\d{{1,2}})(?:st|nd|rd|th)?|(?P<hword>{ord}))(?:\s+(?:house|bhava))?\b"
        ))
        .unwrap();

        // "<Planet> (aspects|conjunct|with) <Planet>"
        let aspect = Regex::new(&format!(
            r"(?i)\b(?:the\s+)?(?P<p1>{p})\s+(?:(?P<conj>conjuncts?|conjoins?|is\s+conjunct(?:\s+with)?|in\s+conjunction\s+with|joined\s+with|together\s+with|with)|aspects?|casts\s+(?:its\s+)?aspect\s+on)\s+(?:the\s+)?(?P<p2>{p})\b"
        ))
        .unwrap();

        // "(The )?lord of (the )?<House> in (the )?<House|Sign>"
        let lordship = Regex::new(&format!(
            r"(?i)\b(?:the\s+)?(?:lord|ruler)\s+of\s+(?:the\s+)?(?:(?P<lnum>\d{{1,2}})(?:st|nd|rd|th)?|(?P<lword>{ord}))(?:\s+(?:house|bhava))?\s+(?:is\s+)?(?:placed\s+in|posited\s+in|in)\s+(?:the\s+)?(?:(?P<hnum>\d{{1,2}})(?:st|nd|rd|th)?|(?P<hword>{ord})|(?P<sign>{s}))(?:\s+(?:house|bhava))?\b"
        ))
        .unwrap();

        // "<Planet> in <Nakshatra> (nakshatra)?"
        let nakshatra = Regex::new(&format!(
            r"(?i)\b(?:the\s+)?(?P<planet>{p})\s+(?:is\s+)?(?:placed\s+in|posited\s+in|in)\s+(?P<nak>{n})(?:\s+nakshatra)?\b"
        ))
        .unwrap();

        // "X yoga (is formed|occurs|gives) ..." — open-ended yoga names.
        let yoga_phrase = Regex::new(
            r"(?i)\b(?P<name>[a-z]+(?:\s+[a-z]+)?)\s+yoga\s+(?:is\s+formed|occurs|arises|forms|gives|causes|brings)\b",
        )
        .unwrap();

        // Loose helpers for the fallback strategies.
        let house_ref = Regex::new(
            r"(?i)\b(?P<num>\d{1,2})(?:st|nd|rd|th)?\s+(?:house|bhava)\b",
        )
        .unwrap();
        let ordinal_word = Regex::new(&format!(r"(?i)\b(?P<word>{ord})\b")).unwrap();
        let ascendant_ref = Regex::new(&format!(
            r"(?i)\b(?:(?P<pre>{s})\s+(?:ascendant|lagna|rising)|(?:ascendant|lagna)\s+(?:in\s+)?(?P<post>{s}))\b"
        ))
        .unwrap();
        let planet_word = Regex::new(&format!(r"(?i)\b(?P<planet>{p})\b")).unwrap();
        let sign_word = Regex::new(&format!(r"(?i)\b(?P<sign>{s})\b")).unwrap();

        Self {
            basic_house,
            basic_sign,
            ascendant_specific,
            aspect,
            lordship,
            nakshatra,
            yoga_phrase,
            house_ref,
            ordinal_word,
            ascendant_ref,
            planet_word,
            sign_word,
        }
    }

    // ── Ordered battery ─────────────────────────────────────────────────

    pub fn try_basic_placement(&self, sentence: &str, lexicon: &Lexicon) -> PatternResult {
        if let Some(caps) = self.basic_house.captures(sentence) {
            let planet = match lexicon.canonical_planet(&caps["planet"]) {
                Some(p) => p,
                None => return PatternResult::NoMatch,
            };
            let house = match capture_house(&caps, "hnum", "hword", lexicon) {
                Ok(h) => h,
                Err(reason) => return PatternResult::Malformed(reason),
            };
            return PatternResult::Hit(PatternHit {
                method: ExtractionMethod::BasicPlacement,
                conditions: RuleConditions {
                    planet: Some(planet),
                    house: Some(house),
                    ..Default::default()
                },
                yoga: None,
                conjunction: false,
            });
        }

        if let Some(caps) = self.basic_sign.captures(sentence) {
            let planet = match lexicon.canonical_planet(&caps["planet"]) {
                Some(p) => p,
                None => return PatternResult::NoMatch,
            };
            let sign = match lexicon.canonical_sign(&caps["sign"]) {
                Some(s) => s,
                None => return PatternResult::NoMatch,
            };
            return PatternResult::Hit(PatternHit {
                method: ExtractionMethod::BasicPlacement,
                conditions: RuleConditions {
                    planet: Some(planet),
                    sign: Some(sign),
                    ..Default::default()
                },
                yoga: None,
                conjunction: false,
            });
        }

        PatternResult::NoMatch
    }

    pub fn try_ascendant_specific(&self, sentence: &str, lexicon: &Lexicon) -> PatternResult {
        let Some(caps) = self.ascendant_specific.captures(sentence) else {
            return PatternResult::NoMatch;
        };
        let ascendant = match lexicon.canonical_sign(&caps["asc"]) {
            Some(s) => s,
            None => return PatternResult::NoMatch,
        };
        let planet = match lexicon.canonical_planet(&caps["planet"]) {
            Some(p) => p,
            None => return PatternResult::NoMatch,
        };
        let house = match capture_house(&caps, "hnum", "hword", lexicon) {
            Ok(h) => h,
            Err(reason) => return PatternResult::Malformed(reason),
        };
        PatternResult::Hit(PatternHit {
            method: ExtractionMethod::AscendantSpecific,
            conditions: RuleConditions {
                planet: Some(planet),
                house: Some(house),
                ascendant: Some(ascendant),
                ..Default::default()
            },
            yoga: None,
            conjunction: false,
        })
    }

    pub fn try_aspect(&self, sentence: &str, lexicon: &Lexicon) -> PatternResult {
        let Some(caps) = self.aspect.captures(sentence) else {
            return PatternResult::NoMatch;
        };
        let (Some(p1), Some(p2)) = (
            lexicon.canonical_planet(&caps["p1"]),
            lexicon.canonical_planet(&caps["p2"]),
        ) else {
            return PatternResult::NoMatch;
        };
        PatternResult::Hit(PatternHit {
            method: ExtractionMethod::Aspect,
            conditions: RuleConditions {
                planet: Some(p1),
                aspect: Some(p2),
                ..Default::default()
            },
            yoga: None,
            conjunction: caps.name("conj").is_some(),
        })
    }

    pub fn try_lordship(&self, sentence: &str, lexicon: &Lexicon) -> PatternResult {
        let Some(caps) = self.lordship.captures(sentence) else {
            return PatternResult::NoMatch;
        };
        let lord_of = match capture_house(&caps, "lnum", "lword", lexicon) {
            Ok(h) => h,
            Err(reason) => return PatternResult::Malformed(reason),
        };

        let mut conditions = RuleConditions {
            lord_of: Some(lord_of),
            ..Default::default()
        };
        if caps.name("hnum").is_some() || caps.name("hword").is_some() {
            conditions.house = match capture_house(&caps, "hnum", "hword", lexicon) {
                Ok(h) => Some(h),
                Err(reason) => return PatternResult::Malformed(reason),
            };
        } else if let Some(sign) = caps.name("sign") {
            conditions.sign = lexicon.canonical_sign(sign.as_str());
            if conditions.sign.is_none() {
                return PatternResult::NoMatch;
            }
        } else {
            return PatternResult::NoMatch;
        }

        PatternResult::Hit(PatternHit {
            method: ExtractionMethod::Lordship,
            conditions,
            yoga: None,
            conjunction: false,
        })
    }

    pub fn try_nakshatra(&self, sentence: &str, lexicon: &Lexicon) -> PatternResult {
        let Some(caps) = self.nakshatra.captures(sentence) else {
            return PatternResult::NoMatch;
        };
        let planet = match lexicon.canonical_planet(&caps["planet"]) {
            Some(p) => p,
            None => return PatternResult::NoMatch,
        };
        let nakshatra = match lexicon.canonical_nakshatra(&caps["nak"]) {
            Some(n) => n,
            None => return PatternResult::NoMatch,
        };
        PatternResult::Hit(PatternHit {
            method: ExtractionMethod::Nakshatra,
            conditions: RuleConditions {
                planet: Some(planet),
                nakshatra: Some(nakshatra),
                ..Default::default()
            },
            yoga: None,
            conjunction: false,
        })
    }

    /// Yoga sentences must still anchor to a graha, house, or sign — a yoga
    /// name alone cannot satisfy the storage invariant.
    pub fn try_yoga(&self, sentence: &str, lexicon: &Lexicon) -> PatternResult {
        let lower = sentence.to_lowercase();
        let named = lexicon
            .yogas
            .iter()
            .find(|y| contains_phrase(&lower, y))
            .cloned();

        let yoga = named.or_else(|| {
            self.yoga_phrase.captures(sentence).map(|caps| {
                let name = caps["name"].trim().to_lowercase();
                format!("{name} yoga")
            })
        });

        let Some(yoga) = yoga else {
            return PatternResult::NoMatch;
        };

        let conditions = RuleConditions {
            planet: self.find_planet(sentence, lexicon),
            house: self.find_house(sentence, lexicon),
            sign: self.find_sign(sentence, lexicon),
            ..Default::default()
        };
        if !conditions.has_primary() {
            return PatternResult::NoMatch;
        }

        PatternResult::Hit(PatternHit {
            method: ExtractionMethod::Yoga,
            conditions,
            yoga: Some(yoga),
            conjunction: false,
        })
    }

    // ── Loose component finders (fallback strategies) ───────────────────

    pub fn find_planet(&self, sentence: &str, lexicon: &Lexicon) -> Option<crate::models::Planet> {
        self.planet_word
            .captures(sentence)
            .and_then(|caps| lexicon.canonical_planet(&caps["planet"]))
    }

    pub fn find_sign(&self, sentence: &str, lexicon: &Lexicon) -> Option<crate::models::Sign> {
        // Skip signs that only appear as an ascendant reference.
        let asc_span = self.ascendant_ref.find(sentence).map(|m| m.range());
        for caps in self.sign_word.captures_iter(sentence) {
            let m = caps.name("sign").unwrap();
            if let Some(span) = &asc_span {
                if span.contains(&m.start()) {
                    continue;
                }
            }
            if let Some(sign) = lexicon.canonical_sign(m.as_str()) {
                return Some(sign);
            }
        }
        None
    }

    pub fn find_house(&self, sentence: &str, lexicon: &Lexicon) -> Option<House> {
        if let Some(caps) = self.house_ref.captures(sentence) {
            if let Ok(n) = caps["num"].parse::<u8>() {
                if let Ok(house) = House::new(n) {
                    return Some(house);
                }
            }
        }
        if let Some(caps) = self.ordinal_word.captures(sentence) {
            if let Some(n) = lexicon.house_from_word(&caps["word"]) {
                return House::new(n).ok();
            }
        }
        None
    }

    pub fn find_ascendant(&self, sentence: &str, lexicon: &Lexicon) -> Option<crate::models::Sign> {
        let caps = self.ascendant_ref.captures(sentence)?;
        let name = caps
            .name("pre")
            .or_else(|| caps.name("post"))?
            .as_str();
        lexicon.canonical_sign(name)
    }
}

fn capture_house(
    caps: &regex::Captures<'_>,
    num_group: &str,
    word_group: &str,
    lexicon: &Lexicon,
) -> Result<House, String> {
    if let Some(num) = caps.name(num_group) {
        let n: u8 = num
            .as_str()
            .parse()
            .map_err(|_| format!("unparseable house '{}'", num.as_str()))?;
        return House::new(n).map_err(|_| format!("house {n} outside 1-12"));
    }
    if let Some(word) = caps.name(word_group) {
        let n = lexicon
            .house_from_word(word.as_str())
            .ok_or_else(|| format!("unknown house word '{}'", word.as_str()))?;
        return House::new(n).map_err(|_| format!("house {n} outside 1-12"));
    }
    Err("no house captured".into())
}

/// Whole-word phrase containment over a lowercased haystack.
fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(phrase) {
        let abs = start + pos;
        let before_ok = abs == 0
            || !haystack[..abs]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric());
        let after = abs + phrase.len();
        let after_ok = after >= haystack.len()
            || !haystack[after..].chars().next().is_some_and(|c| c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        start = abs + 1;
    }
    false
}
