use serde::{Deserialize, Serialize};

use super::enums::{
    AuthorityLevel, ExtractionMethod, House, Nakshatra, OrderBy, Planet, RuleCategory, Sign,
};

/// Multi-criteria search input. Every field is optional; an empty filter
/// matches the whole store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleFilter {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub planet: Option<Planet>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub house: Option<House>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sign: Option<Sign>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub nakshatra: Option<Nakshatra>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ascendant: Option<Sign>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub lord_of: Option<House>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub authority_level: Option<AuthorityLevel>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub category: Option<RuleCategory>,
    /// Any-of match: a rule qualifies when it carries at least one of these.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub min_confidence: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub max_confidence: Option<f32>,
    /// Case-insensitive substring match across effect strings.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub effect_contains: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub extraction_method: Option<ExtractionMethod>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: u64,
    #[serde(default = "default_order")]
    pub order_by: OrderBy,
}

fn default_order() -> OrderBy {
    OrderBy::Relevance
}

impl RuleFilter {
    pub fn is_empty(&self) -> bool {
        *self
            == RuleFilter {
                order_by: self.order_by,
                ..Default::default()
            }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_orders_by_relevance() {
        let f = RuleFilter::default();
        assert_eq!(f.order_by, OrderBy::Relevance);
        assert!(f.is_empty());
    }

    #[test]
    fn filter_with_criteria_not_empty() {
        let f = RuleFilter {
            planet: Some(Planet::Mars),
            ..Default::default()
        };
        assert!(!f.is_empty());
    }

    #[test]
    fn serde_round_trip_preserves_criteria() {
        let f = RuleFilter {
            planet: Some(Planet::Mars),
            house: Some(House::new(7).unwrap()),
            tags: vec!["marriage".into()],
            min_confidence: Some(0.5),
            order_by: OrderBy::Confidence,
            ..Default::default()
        };
        let json = serde_json::to_string(&f).unwrap();
        let back: RuleFilter = serde_json::from_str(&json).unwrap();
        assert_eq!(back, f);
    }

    #[test]
    fn missing_order_by_defaults_on_deserialize() {
        let back: RuleFilter = serde_json::from_str("{}").unwrap();
        assert_eq!(back.order_by, OrderBy::Relevance);
    }
}
