use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::enums::{
    CorrectionFix, ExtractionMethod, House, Nakshatra, Planet, Polarity, RuleCategory, Sign,
    Strength,
};
use super::AuthorityLevel;

/// Timestamp storage format for TEXT columns. Microsecond precision keeps
/// document-order replays stable within a single ingest pass.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
}

/// Structured antecedent of a rule. All fields optional; a storable rule
/// needs at least one of planet/house/sign.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleConditions {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub planet: Option<Planet>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub house: Option<House>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sign: Option<Sign>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub nakshatra: Option<Nakshatra>,
    /// Partner graha in an aspect or conjunction. The relation kind lives
    /// in the rule tags.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub aspect: Option<Planet>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub strength: Option<Strength>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub lord_of: Option<House>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ascendant: Option<Sign>,
}

impl RuleConditions {
    /// True when at least one of planet/house/sign is set — the storage
    /// invariant for every persisted rule.
    pub fn has_primary(&self) -> bool {
        self.planet.is_some() || self.house.is_some() || self.sign.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.planet.is_none()
            && self.house.is_none()
            && self.sign.is_none()
            && self.nakshatra.is_none()
            && self.aspect.is_none()
            && self.strength.is_none()
            && self.lord_of.is_none()
            && self.ascendant.is_none()
    }

    /// Fixed-key-order `k=v` join of the present fields. Feeds the rule id,
    /// so the order must never change.
    pub fn canonical(&self) -> String {
        let mut parts = Vec::new();
        if let Some(p) = self.planet {
            parts.push(format!("planet={p}"));
        }
        if let Some(h) = self.house {
            parts.push(format!("house={h}"));
        }
        if let Some(s) = self.sign {
            parts.push(format!("sign={s}"));
        }
        if let Some(n) = self.nakshatra {
            parts.push(format!("nakshatra={n}"));
        }
        if let Some(a) = self.aspect {
            parts.push(format!("aspect={a}"));
        }
        if let Some(s) = self.strength {
            parts.push(format!("strength={s}"));
        }
        if let Some(l) = self.lord_of {
            parts.push(format!("lord_of={l}"));
        }
        if let Some(a) = self.ascendant {
            parts.push(format!("ascendant={a}"));
        }
        parts.join("|")
    }

    /// Token alternatives the corrected text must preserve, one group per
    /// set condition. A group passes when ANY alternative appears
    /// (case-insensitive): house 7 matches "7", "7th", or "seventh".
    /// Strength is excluded — its value is inferred from varied wording
    /// ("exalted", "uccha"), not a literal token of the sentence.
    pub fn identity_tokens(&self) -> Vec<Vec<String>> {
        let mut groups = Vec::new();
        if let Some(p) = self.planet {
            groups.push(vec![p.as_str().to_string()]);
        }
        if let Some(h) = self.house {
            groups.push(house_tokens(h));
        }
        if let Some(s) = self.sign {
            groups.push(vec![s.as_str().to_string()]);
        }
        if let Some(n) = self.nakshatra {
            groups.push(vec![n.as_str().to_string()]);
        }
        if let Some(a) = self.aspect {
            groups.push(vec![a.as_str().to_string()]);
        }
        if let Some(l) = self.lord_of {
            groups.push(house_tokens(l));
        }
        if let Some(a) = self.ascendant {
            groups.push(vec![a.as_str().to_string()]);
        }
        groups
    }
}

const ORDINAL_WORDS: [&str; 12] = [
    "first", "second", "third", "fourth", "fifth", "sixth", "seventh", "eighth", "ninth", "tenth",
    "eleventh", "twelfth",
];

fn ordinal_suffix(n: u8) -> &'static str {
    match n {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}

fn house_tokens(h: House) -> Vec<String> {
    let n = h.get();
    vec![
        n.to_string(),
        format!("{n}{}", ordinal_suffix(n)),
        ORDINAL_WORDS[(n - 1) as usize].to_string(),
    ]
}

/// Audit record attached to a rule once a correction is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionAudit {
    pub confidence: f32,
    pub fixes_applied: Vec<CorrectionFix>,
    pub model_id: String,
    /// Decoding temperature used for the generating call, recorded so
    /// replays can be compared.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub temperature: Option<f32>,
    pub timestamp: NaiveDateTime,
}

/// The central entity: one structured astrological rule with full
/// provenance. Owned by the knowledge store once accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Deterministic content-derived id; see [`rule_id`].
    pub id: String,
    /// The sentence as extracted from the PDF (post-cleaning, pre-LLM).
    pub original_text: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub corrected_text: Option<String>,
    pub conditions: RuleConditions,
    /// Predicted outcomes; non-empty for any stored rule.
    pub effects: Vec<String>,
    pub polarity: Polarity,
    /// Sorted, deduplicated classification tags.
    pub tags: Vec<String>,
    pub category: RuleCategory,
    pub source_title: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub chapter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub verse: Option<String>,
    /// Denormalized from the source at ingest time; immutable thereafter.
    pub authority_level: AuthorityLevel,
    pub confidence: f32,
    pub extraction_method: ExtractionMethod,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub correction: Option<CorrectionAudit>,
    #[serde(default)]
    pub validated: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Rule {
    /// Recompute the deterministic id from current content.
    pub fn compute_id(&self) -> String {
        rule_id(&self.source_title, &self.original_text, &self.conditions)
    }
}

/// Deterministic rule identity: a pure function of source title, the
/// whitespace/case-normalized sentence, and the canonical condition string.
/// Re-ingesting the same sentence always yields the same id.
pub fn rule_id(source_title: &str, original_text: &str, conditions: &RuleConditions) -> String {
    let normalized: String = original_text
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let mut hasher = Sha256::new();
    hasher.update(source_title.as_bytes());
    hasher.update(b"\n");
    hasher.update(normalized.as_bytes());
    hasher.update(b"\n");
    hasher.update(conditions.canonical().as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex[..16].to_string()
}

/// Digest of a rule's original text, used by the corrector to skip rules
/// it has already attempted.
pub fn text_digest(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mars_in_seventh() -> RuleConditions {
        RuleConditions {
            planet: Some(Planet::Mars),
            house: Some(House::new(7).unwrap()),
            ..Default::default()
        }
    }

    #[test]
    fn canonical_conditions_fixed_order() {
        let c = RuleConditions {
            ascendant: Some(Sign::Leo),
            planet: Some(Planet::Mars),
            house: Some(House::new(9).unwrap()),
            ..Default::default()
        };
        assert_eq!(c.canonical(), "planet=Mars|house=9|ascendant=Leo");
    }

    #[test]
    fn rule_id_deterministic() {
        let c = mars_in_seventh();
        let a = rule_id("BPHS", "Mars in the 7th house causes discord.", &c);
        let b = rule_id("BPHS", "Mars in the 7th house causes discord.", &c);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn rule_id_ignores_case_and_spacing() {
        let c = mars_in_seventh();
        let a = rule_id("BPHS", "Mars in  the 7th house", &c);
        let b = rule_id("BPHS", "mars in the 7th HOUSE", &c);
        assert_eq!(a, b);
    }

    #[test]
    fn rule_id_varies_with_source_and_text() {
        let c = mars_in_seventh();
        let a = rule_id("BPHS", "Mars in the 7th house causes discord.", &c);
        let b = rule_id("Phaladeepika", "Mars in the 7th house causes discord.", &c);
        let d = rule_id("BPHS", "Mars in 7th bhava gives conflicts.", &c);
        assert_ne!(a, b);
        assert_ne!(a, d);
    }

    #[test]
    fn has_primary_requires_planet_house_or_sign() {
        assert!(mars_in_seventh().has_primary());
        let nakshatra_only = RuleConditions {
            nakshatra: Some(Nakshatra::Rohini),
            ..Default::default()
        };
        assert!(!nakshatra_only.has_primary());
        assert!(!RuleConditions::default().has_primary());
    }

    #[test]
    fn identity_tokens_cover_house_spellings() {
        let groups = mars_in_seventh().identity_tokens();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], vec!["Mars".to_string()]);
        assert_eq!(
            groups[1],
            vec!["7".to_string(), "7th".to_string(), "seventh".to_string()]
        );
    }

    #[test]
    fn identity_tokens_skip_strength() {
        let c = RuleConditions {
            planet: Some(Planet::Jupiter),
            strength: Some(Strength::Strong),
            ..Default::default()
        };
        assert_eq!(c.identity_tokens().len(), 1);
    }

    #[test]
    fn ordinal_suffixes() {
        assert_eq!(house_tokens(House::new(1).unwrap())[1], "1st");
        assert_eq!(house_tokens(House::new(2).unwrap())[1], "2nd");
        assert_eq!(house_tokens(House::new(3).unwrap())[1], "3rd");
        assert_eq!(house_tokens(House::new(12).unwrap())[1], "12th");
        assert_eq!(house_tokens(House::new(12).unwrap())[2], "twelfth");
    }

    #[test]
    fn timestamp_round_trip() {
        let ts = parse_timestamp("2026-03-01 12:30:45.123456").unwrap();
        assert_eq!(format_timestamp(&ts), "2026-03-01 12:30:45.123456");
        // Second-precision fallback
        assert!(parse_timestamp("2026-03-01 12:30:45").is_some());
        assert!(parse_timestamp("not a time").is_none());
    }

    #[test]
    fn conditions_serde_skips_absent_fields() {
        let json = serde_json::to_string(&mars_in_seventh()).unwrap();
        assert_eq!(json, r#"{"planet":"Mars","house":7}"#);
        let back: RuleConditions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mars_in_seventh());
    }
}
