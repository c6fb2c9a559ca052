use std::sync::LazyLock;

use regex::Regex;

use crate::lexicon::Lexicon;

/// `7th house`, `7 bhava`, `seventh house`, `3rd from lagna` — an ordinal
/// in house context. Range is verified separately so `13th house` fails.
static HOUSE_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d{1,2})(?:st|nd|rd|th)?\s+(?:house|bhava|from\s+(?:the\s+)?(?:lagna|ascendant))\b",
    )
    .unwrap()
});

/// A sentence is astrological iff it mentions a planet, a sign, a house
/// reference, or one of the domain keywords. This is the gate between raw
/// text and the pattern battery; everything it rejects is counted, not lost.
pub fn is_astrological(sentence: &str, lexicon: &Lexicon) -> bool {
    let lower = sentence.to_lowercase();

    for word in lower.split(|c: char| !c.is_alphanumeric()) {
        if word.is_empty() {
            continue;
        }
        if lexicon.canonical_planet(word).is_some() || lexicon.canonical_sign(word).is_some() {
            return true;
        }
        if lexicon.house_from_word(word).is_some() {
            return true;
        }
    }

    for caps in HOUSE_REF.captures_iter(&lower) {
        if let Ok(n) = caps[1].parse::<u8>() {
            if (1..=12).contains(&n) {
                return true;
            }
        }
    }

    // Keyword set: substring semantics so "exalt" matches "exalted" and
    // "aspect" matches "aspects".
    lexicon.keywords.iter().any(|k| lower.contains(k.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::Lexicon;

    fn astro(s: &str) -> bool {
        is_astrological(s, Lexicon::bundled())
    }

    #[test]
    fn planet_mentions_match() {
        assert!(astro("Mars in the 7th house causes discord"));
        assert!(astro("Shukra gives artistic talent"));
    }

    #[test]
    fn sign_mentions_match() {
        assert!(astro("those born under Leo are proud"));
        assert!(astro("Mesha rising brings energy"));
    }

    #[test]
    fn house_references_match() {
        assert!(astro("the 7th house rules partnerships"));
        assert!(astro("benefics in the 3rd from lagna protect siblings"));
    }

    #[test]
    fn keyword_mentions_match() {
        assert!(astro("this dasha period brings change"));
        assert!(astro("an exalted benefic protects the native"));
        assert!(astro("the lord of wealth matters here"));
    }

    #[test]
    fn plain_prose_rejected() {
        assert!(!astro("The printing of this edition was completed in Bombay"));
        assert!(!astro("Chapter two discusses the author's life"));
    }

    #[test]
    fn out_of_range_house_alone_rejected() {
        assert!(!astro("the 13th item on the list was missing"));
        assert!(!astro("the 42nd house on the street"));
    }
}
