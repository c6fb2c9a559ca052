use crate::db::DatabaseError;

/// Generate a closed-vocabulary enum with `as_str`, `Display`, `FromStr`,
/// and string-based serde so the database and export bundle share one
/// canonical spelling per variant.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

str_enum!(Planet {
    Sun => "Sun",
    Moon => "Moon",
    Mars => "Mars",
    Mercury => "Mercury",
    Jupiter => "Jupiter",
    Venus => "Venus",
    Saturn => "Saturn",
    Rahu => "Rahu",
    Ketu => "Ketu",
});

str_enum!(Sign {
    Aries => "Aries",
    Taurus => "Taurus",
    Gemini => "Gemini",
    Cancer => "Cancer",
    Leo => "Leo",
    Virgo => "Virgo",
    Libra => "Libra",
    Scorpio => "Scorpio",
    Sagittarius => "Sagittarius",
    Capricorn => "Capricorn",
    Aquarius => "Aquarius",
    Pisces => "Pisces",
});

str_enum!(Nakshatra {
    Ashwini => "Ashwini",
    Bharani => "Bharani",
    Krittika => "Krittika",
    Rohini => "Rohini",
    Mrigashira => "Mrigashira",
    Ardra => "Ardra",
    Punarvasu => "Punarvasu",
    Pushya => "Pushya",
    Ashlesha => "Ashlesha",
    Magha => "Magha",
    PurvaPhalguni => "Purva Phalguni",
    UttaraPhalguni => "Uttara Phalguni",
    Hasta => "Hasta",
    Chitra => "Chitra",
    Swati => "Swati",
    Vishakha => "Vishakha",
    Anuradha => "Anuradha",
    Jyeshtha => "Jyeshtha",
    Mula => "Mula",
    PurvaAshadha => "Purva Ashadha",
    UttaraAshadha => "Uttara Ashadha",
    Shravana => "Shravana",
    Dhanishta => "Dhanishta",
    Shatabhisha => "Shatabhisha",
    PurvaBhadrapada => "Purva Bhadrapada",
    UttaraBhadrapada => "Uttara Bhadrapada",
    Revati => "Revati",
});

str_enum!(Polarity {
    Positive => "positive",
    Negative => "negative",
    Neutral => "neutral",
    Mixed => "mixed",
});

str_enum!(RuleCategory {
    PlanetaryPlacement => "planetary_placement",
    HouseLordship => "house_lordship",
    Aspect => "aspect",
    Nakshatra => "nakshatra",
    Yoga => "yoga",
    Other => "other",
});

str_enum!(ExtractionMethod {
    BasicPlacement => "basic_placement",
    AscendantSpecific => "ascendant_specific",
    Aspect => "aspect",
    Lordship => "lordship",
    Nakshatra => "nakshatra",
    Yoga => "yoga",
    RelaxedFallback => "relaxed_fallback",
    KeywordFallback => "keyword_fallback",
});

str_enum!(CorrectionFix {
    Spacing => "spacing",
    Hyphenation => "hyphenation",
    Punctuation => "punctuation",
    Spelling => "spelling",
    SanskritPreservation => "sanskrit_preservation",
    Grammar => "grammar",
});

str_enum!(Strength {
    Strong => "strong",
    Weak => "weak",
});

str_enum!(OrderBy {
    Relevance => "relevance",
    Confidence => "confidence",
    Authority => "authority",
    CreatedAt => "created_at",
});

impl Default for OrderBy {
    fn default() -> Self {
        OrderBy::Relevance
    }
}

str_enum!(MergeStrategy {
    Replace => "replace",
    Append => "append",
    SkipDuplicates => "skip_duplicates",
});

/// Source authority. Stored as an integer; lower is more authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AuthorityLevel {
    Classical = 1,
    Traditional = 2,
    Modern = 3,
}

impl AuthorityLevel {
    pub fn as_i64(&self) -> i64 {
        *self as i64
    }

    pub fn from_i64(v: i64) -> Result<Self, DatabaseError> {
        match v {
            1 => Ok(Self::Classical),
            2 => Ok(Self::Traditional),
            3 => Ok(Self::Modern),
            _ => Err(DatabaseError::InvalidEnum {
                field: "AuthorityLevel".into(),
                value: v.to_string(),
            }),
        }
    }
}

impl serde::Serialize for AuthorityLevel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.as_i64())
    }
}

impl<'de> serde::Deserialize<'de> for AuthorityLevel {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = i64::deserialize(deserializer)?;
        Self::from_i64(v).map_err(serde::de::Error::custom)
    }
}

/// House number, validated to 1–12 at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct House(u8);

impl House {
    pub fn new(n: u8) -> Result<Self, DatabaseError> {
        if (1..=12).contains(&n) {
            Ok(Self(n))
        } else {
            Err(DatabaseError::InvalidEnum {
                field: "House".into(),
                value: n.to_string(),
            })
        }
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for House {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for House {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for House {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let n = u8::deserialize(deserializer)?;
        House::new(n).map_err(serde::de::Error::custom)
    }
}
