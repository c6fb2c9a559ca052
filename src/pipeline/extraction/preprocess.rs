//! Deterministic text cleaning between PDF extraction and sentence
//! segmentation.
//!
//! Classical astrology scans come out of OCR with glued words
//! ("Mangalin7thbhava"), hyphenated line breaks, repeated running headers,
//! and a dozen spellings per graha. Every repair here is lexicon-driven and
//! reproducible; no statistical model is involved. The LLM stage later
//! polishes readability, but it only ever sees text that already passed
//! through this normalizer.

use std::collections::{HashMap, HashSet};

use regex::Regex;

use crate::lexicon::Lexicon;
use crate::pipeline::extraction::PageText;

/// Lines longer than this are never treated as running headers/footers.
const HEADER_LINE_MAX_LEN: usize = 60;

/// Share of pages a short line must appear on to count as a header/footer.
const HEADER_REPEAT_RATIO: f64 = 0.6;

/// Only alphabetic runs at least this long are candidates for glued-token
/// segmentation; shorter runs are left alone.
const MIN_GLUED_LEN: usize = 5;

/// Compiled, lexicon-derived text normalizer.
pub struct TextCleaner {
    re_camel: Regex,
    re_letter_digit: Regex,
    re_digit_letters: Regex,
    re_alpha_run: Regex,
    re_hyphen_break: Regex,
    re_space_before_punct: Regex,
    re_canonical: Regex,
    /// lowercase variant → canonical spelling.
    canonical_map: HashMap<String, String>,
    /// Pieces a glued token may be segmented into.
    dictionary: HashSet<String>,
    hyphen_prefixes: HashSet<String>,
}

impl TextCleaner {
    pub fn new(lexicon: &Lexicon) -> Self {
        let spelling_table = lexicon.spelling_table();
        let canonical_map: HashMap<String, String> = spelling_table
            .iter()
            .map(|(variant, canonical)| (variant.clone(), canonical.clone()))
            .collect();

        let canonical_alt = spelling_table
            .iter()
            .map(|(variant, _)| regex::escape(variant))
            .collect::<Vec<_>>()
            .join("|");

        let mut dictionary: HashSet<String> = HashSet::new();
        for (variant, _) in &spelling_table {
            for word in variant.split_whitespace() {
                dictionary.insert(word.to_string());
            }
        }
        for term in lexicon
            .keywords
            .iter()
            .chain(lexicon.effect_indicators.iter())
            .chain(lexicon.positive_words.iter())
            .chain(lexicon.negative_words.iter())
            .chain(lexicon.strength_strong.iter())
            .chain(lexicon.strength_weak.iter())
            .chain(lexicon.glue_words.iter())
        {
            for word in term.split_whitespace() {
                dictionary.insert(word.to_string());
            }
        }
        for (_, words) in &lexicon.category_keywords {
            for term in words {
                for word in term.split_whitespace() {
                    dictionary.insert(word.to_string());
                }
            }
        }
        for word in lexicon.ordinal_words() {
            dictionary.insert(word);
        }

        let hyphen_prefixes = lexicon.hyphen_prefix_set();

        Self {
            re_camel: Regex::new(r"([a-z])([A-Z])").unwrap(),
            re_letter_digit: Regex::new(r"([A-Za-z])(\d)").unwrap(),
            re_digit_letters: Regex::new(r"(\d{1,2})([A-Za-z]+)").unwrap(),
            re_alpha_run: Regex::new(r"[A-Za-z]+").unwrap(),
            re_hyphen_break: Regex::new(r"(\w+)-[ \t]*\n[ \t]*(\w+)").unwrap(),
            re_space_before_punct: Regex::new(r"\s+([.,;:!?])").unwrap(),
            re_canonical: Regex::new(&format!(r"(?i)\b({canonical_alt})\b")).unwrap(),
            canonical_map,
            dictionary,
            hyphen_prefixes,
        }
    }

    /// Full cleaning pass over a document's pages.
    pub fn clean_pages(&self, pages: Vec<PageText>) -> Vec<PageText> {
        let repeated = detect_repeated_lines(&pages);

        pages
            .into_iter()
            .map(|page| {
                let text = self.clean_page_text(&page.text, &repeated);
                PageText {
                    page_number: page.page_number,
                    text,
                }
            })
            .collect()
    }

    fn clean_page_text(&self, raw: &str, repeated_lines: &HashSet<String>) -> String {
        // Normalize control characters and drop OCR replacement glyphs.
        let mut text: String = raw
            .replace('\u{FFFD}', "")
            .replace(['\r', '\u{0C}'], "\n")
            .replace('\t', " ");

        // Drop running headers/footers and standalone page numbers.
        let kept: Vec<&str> = text
            .lines()
            .filter(|line| {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    return false;
                }
                if trimmed.chars().all(|c| c.is_ascii_digit()) {
                    return false;
                }
                !repeated_lines.contains(trimmed)
            })
            .collect();
        text = kept.join("\n");

        // Undo hyphenation across line breaks, unless the left fragment is
        // a known prefix word ("self-\ncontrol" keeps its hyphen).
        text = self
            .re_hyphen_break
            .replace_all(&text, |caps: &regex::Captures<'_>| {
                let left = &caps[1];
                let right = &caps[2];
                if self.hyphen_prefixes.contains(&left.to_lowercase()) {
                    format!("{left}-{right}")
                } else {
                    format!("{left}{right}")
                }
            })
            .into_owned();

        // One paragraph per page from here on.
        text = text.replace('\n', " ");

        text = self.re_camel.replace_all(&text, "$1 $2").into_owned();
        text = self.re_letter_digit.replace_all(&text, "$1 $2").into_owned();

        // Digit→letter boundaries, keeping ordinal suffixes attached:
        // "7thbhava" → "7th bhava", "7great" → "7 great", "7th" untouched.
        text = self
            .re_digit_letters
            .replace_all(&text, |caps: &regex::Captures<'_>| {
                let digits = &caps[1];
                let letters = &caps[2];
                let lower = letters.to_lowercase();
                for suffix in ["st", "nd", "rd", "th"] {
                    if let Some(rest) = lower.strip_prefix(suffix) {
                        if rest.is_empty() {
                            return format!("{digits}{letters}");
                        }
                        let (kept, split) = letters.split_at(suffix.len());
                        return format!("{digits}{kept} {split}");
                    }
                }
                format!("{digits} {letters}")
            })
            .into_owned();

        // Lexicon-driven segmentation of glued alphabetic runs.
        text = self
            .re_alpha_run
            .replace_all(&text, |caps: &regex::Captures<'_>| {
                let run = caps.get(0).unwrap().as_str();
                self.split_glued(run).unwrap_or_else(|| run.to_string())
            })
            .into_owned();

        // Canonical spelling table: Surya/Ravi → Sun, Mangal/Kuja → Mars.
        text = self
            .re_canonical
            .replace_all(&text, |caps: &regex::Captures<'_>| {
                let variant = caps.get(1).unwrap().as_str();
                self.canonical_map
                    .get(&variant.to_lowercase())
                    .cloned()
                    .unwrap_or_else(|| variant.to_string())
            })
            .into_owned();

        // Whitespace and punctuation spacing.
        text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        text = self
            .re_space_before_punct
            .replace_all(&text, "$1")
            .into_owned();

        text.trim().to_string()
    }

    /// Try to segment a glued alphabetic run into known lexicon pieces.
    /// Returns the re-spaced text only when EVERY piece is known and there
    /// are at least two pieces; anything else is left untouched. A plural
    /// trailing 's'/'es' is absorbed into its stem, so ordinary words like
    /// "houses" never get split.
    fn split_glued(&self, run: &str) -> Option<String> {
        if run.len() < MIN_GLUED_LEN || !run.is_ascii() {
            return None;
        }
        let lower = run.to_lowercase();
        if self.is_piece(&lower) {
            return None;
        }

        let bytes = lower.as_bytes();
        let n = bytes.len();
        // next_cut[i] = length of the piece starting at i in a full
        // segmentation, longest piece preferred.
        let mut next_cut: Vec<Option<usize>> = vec![None; n + 1];
        let mut reachable = vec![false; n + 1];
        reachable[n] = true;

        for i in (0..n).rev() {
            let max_len = n - i;
            for len in (2..=max_len).rev() {
                if !reachable[i + len] {
                    continue;
                }
                let piece = &lower[i..i + len];
                if self.is_piece(piece) {
                    reachable[i] = true;
                    next_cut[i] = Some(len);
                    break;
                }
            }
        }

        if !reachable[0] {
            return None;
        }

        let mut pieces = Vec::new();
        let mut pos = 0;
        while pos < n {
            let len = next_cut[pos]?;
            pieces.push(&run[pos..pos + len]);
            pos += len;
        }
        if pieces.len() < 2 {
            return None;
        }
        Some(pieces.join(" "))
    }

    fn is_piece(&self, piece: &str) -> bool {
        if self.dictionary.contains(piece) {
            return true;
        }
        if let Some(stem) = piece.strip_suffix("es") {
            if stem.len() >= 4 && self.dictionary.contains(stem) {
                return true;
            }
        }
        if let Some(stem) = piece.strip_suffix('s') {
            if stem.len() >= 4 && self.dictionary.contains(stem) {
                return true;
            }
        }
        false
    }
}

/// Short lines repeated across enough pages are running headers/footers.
fn detect_repeated_lines(pages: &[PageText]) -> HashSet<String> {
    if pages.len() < 2 {
        return HashSet::new();
    }

    let mut counts: HashMap<String, usize> = HashMap::new();
    for page in pages {
        let unique: HashSet<&str> = page
            .text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && l.len() <= HEADER_LINE_MAX_LEN)
            .collect();
        for line in unique {
            *counts.entry(line.to_string()).or_insert(0) += 1;
        }
    }

    let threshold = (pages.len() as f64 * HEADER_REPEAT_RATIO).ceil() as usize;
    counts
        .into_iter()
        .filter(|(_, count)| *count >= threshold)
        .map(|(line, _)| line)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::Lexicon;

    fn cleaner() -> TextCleaner {
        TextCleaner::new(Lexicon::bundled())
    }

    fn clean_one(text: &str) -> String {
        let pages = vec![PageText {
            page_number: 1,
            text: text.to_string(),
        }];
        cleaner().clean_pages(pages).remove(0).text
    }

    #[test]
    fn ocr_glue_respaced_and_canonicalized() {
        // The flagship OCR-damage case: variant planet name, glued ordinal,
        // glued effect phrase.
        let cleaned = clean_one("Mangalin7thbhavagivesconflictsinmarriage.");
        assert_eq!(cleaned, "Mars in 7th bhava gives conflicts in marriage.");
    }

    #[test]
    fn whitespace_collapsed() {
        assert_eq!(
            clean_one("Mars   in  the\n 7th   house"),
            "Mars in the 7th house"
        );
    }

    #[test]
    fn variant_spellings_normalized() {
        assert_eq!(clean_one("Surya in Mesha"), "Sun in Aries");
        assert_eq!(clean_one("Shukra in Tula"), "Venus in Libra");
        assert_eq!(clean_one("kuja in the 7th"), "Mars in the 7th");
    }

    #[test]
    fn canonicalization_is_whole_word_only() {
        // "sun" inside "sunset" must not become "Sun"set.
        let cleaned = clean_one("The sunset was red");
        assert!(cleaned.contains("sunset"), "got: {cleaned}");
    }

    #[test]
    fn ordinary_plurals_not_split() {
        let cleaned = clean_one("The houses and signs remain");
        assert!(cleaned.contains("houses"), "got: {cleaned}");
    }

    #[test]
    fn unknown_glue_left_untouched() {
        // "marsh" must not become "mars h".
        let cleaned = clean_one("A marsh near the river");
        assert!(cleaned.contains("marsh"), "got: {cleaned}");
    }

    #[test]
    fn hyphenation_across_line_break_joined() {
        assert_eq!(clean_one("the asc-\nendant rises"), "the ascendant rises");
    }

    #[test]
    fn prefix_word_keeps_hyphen() {
        assert_eq!(clean_one("shows self-\ncontrol in life"), "shows self-control in life");
    }

    #[test]
    fn camel_case_split() {
        let cleaned = clean_one("MarsGives strength");
        assert!(cleaned.starts_with("Mars Gives"), "got: {cleaned}");
    }

    #[test]
    fn digit_boundaries_split_but_ordinals_kept() {
        assert_eq!(clean_one("Mars in7 houses"), "Mars in 7 houses");
        let cleaned = clean_one("Mars in the 7th house");
        assert!(cleaned.contains("7th"), "ordinal suffix must survive: {cleaned}");
    }

    #[test]
    fn page_number_lines_dropped() {
        let cleaned = clean_one("Mars in the 7th house\n42\ncauses discord");
        assert!(!cleaned.contains("42"), "got: {cleaned}");
    }

    #[test]
    fn repeated_headers_stripped() {
        let header = "Brihat Jataka - Chapter Seven";
        let pages: Vec<PageText> = (1..=5)
            .map(|i| PageText {
                page_number: i,
                text: format!("{header}\nMars in the {i}th house causes discord."),
            })
            .collect();
        let cleaned = cleaner().clean_pages(pages);
        for page in &cleaned {
            assert!(
                !page.text.contains("Chapter Seven"),
                "header must be stripped: {}",
                page.text
            );
            assert!(page.text.contains("Mars"));
        }
    }

    #[test]
    fn header_on_minority_of_pages_kept() {
        let pages = vec![
            PageText {
                page_number: 1,
                text: "A unique opening line\nMars in the 7th house.".into(),
            },
            PageText {
                page_number: 2,
                text: "Another line entirely\nVenus in the 2nd house.".into(),
            },
            PageText {
                page_number: 3,
                text: "Third page content\nMoon in the 4th house.".into(),
            },
        ];
        let cleaned = cleaner().clean_pages(pages);
        assert!(cleaned[0].text.contains("unique opening line"));
    }

    #[test]
    fn space_before_punctuation_removed() {
        assert_eq!(clean_one("Mars in the 7th house ."), "Mars in the 7th house.");
    }

    #[test]
    fn replacement_characters_dropped() {
        let cleaned = clean_one("Mars\u{FFFD} in the 7th");
        assert!(!cleaned.contains('\u{FFFD}'));
        assert!(cleaned.starts_with("Mars"));
    }

    #[test]
    fn glued_stopwords_respaced() {
        assert_eq!(clean_one("Mars inthe 7th house"), "Mars in the 7th house");
    }

    #[test]
    fn single_page_header_detection_skipped() {
        // One page: nothing repeats, nothing stripped.
        let cleaned = clean_one("Some short line\nMars in the 7th house.");
        assert!(cleaned.contains("Some short line"));
    }
}
