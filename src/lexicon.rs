//! Classical-text vocabularies: spelling tables for grahas, rashis and
//! nakshatras, yoga names, effect indicators, polarity and category word
//! lists, ordinal and Sanskrit house names.
//!
//! These are configuration data, not code. A default set ships embedded in
//! the binary; callers may load a replacement from disk without touching any
//! pattern logic.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use serde::Deserialize;

use crate::models::{Nakshatra, Planet, Sign};

const BUNDLED_LEXICON: &str = include_str!("../resources/lexicon.json");

#[derive(Debug, thiserror::Error)]
pub enum LexiconError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Lexicon parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unknown canonical name in lexicon: {kind} '{name}'")]
    UnknownCanonical { kind: &'static str, name: String },

    #[error("House value out of range in lexicon: '{name}' = {value}")]
    HouseOutOfRange { name: String, value: u8 },
}

/// On-disk shape of the lexicon file.
#[derive(Debug, Deserialize)]
struct LexiconFile {
    planets: BTreeMap<String, Vec<String>>,
    signs: BTreeMap<String, Vec<String>>,
    nakshatras: BTreeMap<String, Vec<String>>,
    yogas: Vec<String>,
    effect_indicators: Vec<String>,
    positive_words: Vec<String>,
    negative_words: Vec<String>,
    category_keywords: BTreeMap<String, Vec<String>>,
    house_categories: BTreeMap<String, String>,
    strength_strong: Vec<String>,
    strength_weak: Vec<String>,
    keywords: Vec<String>,
    ordinals: BTreeMap<String, u8>,
    sanskrit_houses: BTreeMap<String, u8>,
    abbreviations: Vec<String>,
    hyphen_prefixes: Vec<String>,
    glue_words: Vec<String>,
}

/// Parsed, validated lexicon with lowercase-variant lookup tables.
#[derive(Debug)]
pub struct Lexicon {
    planet_variants: HashMap<String, Planet>,
    sign_variants: HashMap<String, Sign>,
    nakshatra_variants: HashMap<String, Nakshatra>,
    pub yogas: Vec<String>,
    pub effect_indicators: Vec<String>,
    pub positive_words: Vec<String>,
    pub negative_words: Vec<String>,
    /// Keyword→category map in stable (alphabetical) scan order.
    pub category_keywords: Vec<(String, Vec<String>)>,
    house_categories: HashMap<u8, String>,
    pub strength_strong: Vec<String>,
    pub strength_weak: Vec<String>,
    pub keywords: Vec<String>,
    ordinals: HashMap<String, u8>,
    sanskrit_houses: HashMap<String, u8>,
    abbreviations: HashSet<String>,
    hyphen_prefixes: HashSet<String>,
    pub glue_words: Vec<String>,
    /// Single-word terms counted for classical-term density.
    density_terms: HashSet<String>,
    /// Multi-word terms counted for classical-term density.
    density_phrases: Vec<String>,
}

impl Lexicon {
    pub fn from_json_str(json: &str) -> Result<Self, LexiconError> {
        let file: LexiconFile = serde_json::from_str(json)?;
        Self::build(file)
    }

    pub fn from_path(path: &Path) -> Result<Self, LexiconError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// The lexicon bundled with the crate.
    pub fn bundled() -> &'static Lexicon {
        static BUNDLED: LazyLock<Lexicon> = LazyLock::new(|| {
            Lexicon::from_json_str(BUNDLED_LEXICON).expect("bundled lexicon is valid")
        });
        &BUNDLED
    }

    /// An owned copy of the bundled lexicon, for holders that may swap in a
    /// custom one later.
    pub fn default_bundled() -> Lexicon {
        Lexicon::from_json_str(BUNDLED_LEXICON).expect("bundled lexicon is valid")
    }

    fn build(file: LexiconFile) -> Result<Self, LexiconError> {
        let mut planet_variants = HashMap::new();
        for (canonical, variants) in &file.planets {
            let planet =
                Planet::from_str(canonical).map_err(|_| LexiconError::UnknownCanonical {
                    kind: "planet",
                    name: canonical.clone(),
                })?;
            for v in variants {
                planet_variants.insert(v.to_lowercase(), planet);
            }
        }

        let mut sign_variants = HashMap::new();
        for (canonical, variants) in &file.signs {
            let sign = Sign::from_str(canonical).map_err(|_| LexiconError::UnknownCanonical {
                kind: "sign",
                name: canonical.clone(),
            })?;
            for v in variants {
                sign_variants.insert(v.to_lowercase(), sign);
            }
        }

        let mut nakshatra_variants = HashMap::new();
        for (canonical, variants) in &file.nakshatras {
            let nakshatra =
                Nakshatra::from_str(canonical).map_err(|_| LexiconError::UnknownCanonical {
                    kind: "nakshatra",
                    name: canonical.clone(),
                })?;
            for v in variants {
                nakshatra_variants.insert(v.to_lowercase(), nakshatra);
            }
        }

        let mut ordinals = HashMap::new();
        for (word, n) in &file.ordinals {
            if !(1..=12).contains(n) {
                return Err(LexiconError::HouseOutOfRange {
                    name: word.clone(),
                    value: *n,
                });
            }
            ordinals.insert(word.to_lowercase(), *n);
        }

        let mut sanskrit_houses = HashMap::new();
        for (word, n) in &file.sanskrit_houses {
            if !(1..=12).contains(n) {
                return Err(LexiconError::HouseOutOfRange {
                    name: word.clone(),
                    value: *n,
                });
            }
            sanskrit_houses.insert(word.to_lowercase(), *n);
        }

        let mut house_categories = HashMap::new();
        for (house, category) in &file.house_categories {
            let n: u8 = house.parse().map_err(|_| LexiconError::HouseOutOfRange {
                name: house.clone(),
                value: 0,
            })?;
            if !(1..=12).contains(&n) {
                return Err(LexiconError::HouseOutOfRange {
                    name: house.clone(),
                    value: n,
                });
            }
            house_categories.insert(n, category.to_lowercase());
        }

        // Density terms: every variant plus the keyword set, split by arity.
        let mut density_terms = HashSet::new();
        let mut density_phrases = Vec::new();
        let all_terms = planet_variants
            .keys()
            .chain(sign_variants.keys())
            .chain(nakshatra_variants.keys())
            .cloned()
            .chain(file.keywords.iter().map(|k| k.to_lowercase()));
        for term in all_terms {
            if term.contains(' ') {
                density_phrases.push(term);
            } else {
                density_terms.insert(term);
            }
        }

        Ok(Self {
            planet_variants,
            sign_variants,
            nakshatra_variants,
            yogas: file.yogas.iter().map(|y| y.to_lowercase()).collect(),
            effect_indicators: file
                .effect_indicators
                .iter()
                .map(|e| e.to_lowercase())
                .collect(),
            positive_words: file.positive_words.iter().map(|w| w.to_lowercase()).collect(),
            negative_words: file.negative_words.iter().map(|w| w.to_lowercase()).collect(),
            category_keywords: file
                .category_keywords
                .into_iter()
                .map(|(c, ws)| (c, ws.iter().map(|w| w.to_lowercase()).collect()))
                .collect(),
            house_categories,
            strength_strong: file.strength_strong.iter().map(|w| w.to_lowercase()).collect(),
            strength_weak: file.strength_weak.iter().map(|w| w.to_lowercase()).collect(),
            keywords: file.keywords.iter().map(|k| k.to_lowercase()).collect(),
            ordinals,
            sanskrit_houses,
            abbreviations: file.abbreviations.iter().map(|a| a.to_lowercase()).collect(),
            hyphen_prefixes: file.hyphen_prefixes.iter().map(|p| p.to_lowercase()).collect(),
            glue_words: file.glue_words.iter().map(|g| g.to_lowercase()).collect(),
            density_terms,
            density_phrases,
        })
    }

    // ── Canonicalization lookups ────────────────────────────────────────

    pub fn canonical_planet(&self, word: &str) -> Option<Planet> {
        self.planet_variants.get(&word.to_lowercase()).copied()
    }

    pub fn canonical_sign(&self, word: &str) -> Option<Sign> {
        self.sign_variants.get(&word.to_lowercase()).copied()
    }

    pub fn canonical_nakshatra(&self, phrase: &str) -> Option<Nakshatra> {
        self.nakshatra_variants.get(&phrase.to_lowercase()).copied()
    }

    /// Resolve an ordinal word or Sanskrit house name to a house number.
    pub fn house_from_word(&self, word: &str) -> Option<u8> {
        let lower = word.to_lowercase();
        self.ordinals
            .get(&lower)
            .or_else(|| self.sanskrit_houses.get(&lower))
            .copied()
    }

    pub fn house_category(&self, house: u8) -> Option<&str> {
        self.house_categories.get(&house).map(|s| s.as_str())
    }

    pub fn is_abbreviation(&self, word: &str) -> bool {
        self.abbreviations.contains(&word.to_lowercase())
    }

    pub fn is_hyphen_prefix(&self, word: &str) -> bool {
        self.hyphen_prefixes.contains(&word.to_lowercase())
    }

    pub fn hyphen_prefix_set(&self) -> HashSet<String> {
        self.hyphen_prefixes.clone()
    }

    // ── Regex alternation helpers (longest-first so partial variants like
    //    "mesh" never shadow "mesha") ────────────────────────────────────

    pub fn planet_alternation(&self) -> String {
        alternation(self.planet_variants.keys())
    }

    pub fn sign_alternation(&self) -> String {
        alternation(self.sign_variants.keys())
    }

    pub fn nakshatra_alternation(&self) -> String {
        alternation(self.nakshatra_variants.keys())
    }

    pub fn ordinal_word_alternation(&self) -> String {
        alternation(self.ordinals.keys())
    }

    pub fn ordinal_words(&self) -> Vec<String> {
        self.ordinals.keys().cloned().collect()
    }

    /// All variant spellings, with their canonical replacement, for the
    /// preprocessing normalization pass.
    pub fn spelling_table(&self) -> Vec<(String, String)> {
        let mut table: Vec<(String, String)> = self
            .planet_variants
            .iter()
            .map(|(v, p)| (v.clone(), p.as_str().to_string()))
            .chain(
                self.sign_variants
                    .iter()
                    .map(|(v, s)| (v.clone(), s.as_str().to_string())),
            )
            .chain(
                self.nakshatra_variants
                    .iter()
                    .map(|(v, n)| (v.clone(), n.as_str().to_string())),
            )
            .collect();
        // Longest variant first so "mangala" is replaced before "mangal".
        table.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(&b.0)));
        table
    }

    /// Count lexicon terms in a sentence, for classical-term density.
    pub fn term_count(&self, sentence: &str) -> usize {
        let lower = sentence.to_lowercase();
        let word_hits = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty() && self.density_terms.contains(*w))
            .count();
        let phrase_hits: usize = self
            .density_phrases
            .iter()
            .map(|p| lower.matches(p.as_str()).count())
            .sum();
        word_hits + phrase_hits
    }
}

fn alternation<'a>(terms: impl Iterator<Item = &'a String>) -> String {
    let mut sorted: Vec<&String> = terms.collect();
    sorted.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    sorted
        .iter()
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join("|")
}
