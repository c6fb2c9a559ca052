use crate::lexicon::Lexicon;
use crate::pipeline::extraction::PageText;

/// Sentences shorter than this are OCR debris.
const MIN_SENTENCE_LEN: usize = 10;

/// Sentences longer than this are run-on extraction failures.
const MAX_SENTENCE_LEN: usize = 500;

/// A segmented sentence with the page it started on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    pub text: String,
    pub page_number: usize,
}

/// Split cleaned pages into sentences on `.`/`!`/`?` boundaries, keeping
/// known abbreviations ("e.g.", "Dr.", "ch.") intact. Sentences are emitted
/// in document order; each carries the page it began on.
pub fn segment_sentences(pages: &[PageText], lexicon: &Lexicon) -> Vec<Sentence> {
    let mut sentences = Vec::new();

    for page in pages {
        let mut current = String::new();
        let chars: Vec<char> = page.text.chars().collect();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            if c == '!' || c == '?' {
                push_sentence(&mut sentences, &mut current, page.page_number);
                i += 1;
                continue;
            }
            if c == '.' {
                // A period after a known abbreviation, after a lone initial
                // ("e" in "e.g."), or between digits ("7.5") does not end
                // the sentence.
                let prev_word = trailing_word(&current);
                let next_is_digit = chars.get(i + 1).is_some_and(|c| c.is_ascii_digit());
                let prev_is_digit = current.chars().last().is_some_and(|c| c.is_ascii_digit());
                let is_initial =
                    prev_word.len() == 1 && prev_word.chars().all(|c| c.is_alphabetic());
                if lexicon.is_abbreviation(&prev_word)
                    || is_initial
                    || (prev_is_digit && next_is_digit)
                {
                    current.push(c);
                } else {
                    push_sentence(&mut sentences, &mut current, page.page_number);
                }
                i += 1;
                continue;
            }
            current.push(c);
            i += 1;
        }
        push_sentence(&mut sentences, &mut current, page.page_number);
    }

    sentences
}

fn push_sentence(sentences: &mut Vec<Sentence>, current: &mut String, page_number: usize) {
    let text = current.trim().to_string();
    current.clear();
    if (MIN_SENTENCE_LEN..=MAX_SENTENCE_LEN).contains(&text.len()) {
        sentences.push(Sentence { text, page_number });
    }
}

/// The word immediately before the cursor, dots included so "e.g" and
/// "i.e" survive the lookup.
fn trailing_word(text: &str) -> String {
    let word: String = text
        .chars()
        .rev()
        .take_while(|c| c.is_alphanumeric() || *c == '.')
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    word.trim_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::Lexicon;

    fn segment(text: &str) -> Vec<String> {
        let pages = vec![PageText {
            page_number: 1,
            text: text.to_string(),
        }];
        segment_sentences(&pages, Lexicon::bundled())
            .into_iter()
            .map(|s| s.text)
            .collect()
    }

    #[test]
    fn splits_on_terminal_punctuation() {
        let sentences = segment(
            "Mars in the 7th house causes discord. Jupiter in the 2nd gives wealth! Is the Moon strong?",
        );
        assert_eq!(sentences.len(), 3);
        assert_eq!(sentences[0], "Mars in the 7th house causes discord");
        assert_eq!(sentences[1], "Jupiter in the 2nd gives wealth");
        assert_eq!(sentences[2], "Is the Moon strong");
    }

    #[test]
    fn abbreviations_do_not_split() {
        let sentences = segment("Mars is strong in e.g. the 10th house and gives fame.");
        assert_eq!(sentences.len(), 1, "got: {sentences:?}");
        assert!(sentences[0].contains("e.g."));
    }

    #[test]
    fn decimal_numbers_do_not_split() {
        let sentences = segment("The planet at 7.5 degrees in Aries gives courage.");
        assert_eq!(sentences.len(), 1, "got: {sentences:?}");
        assert!(sentences[0].contains("7.5"));
    }

    #[test]
    fn short_fragments_dropped() {
        let sentences = segment("Yes. Mars in the 7th house causes discord.");
        assert_eq!(sentences.len(), 1);
        assert!(sentences[0].starts_with("Mars"));
    }

    #[test]
    fn overlong_sentences_dropped() {
        let run_on = format!("Mars {}", "and so on ".repeat(60));
        let sentences = segment(&run_on);
        assert!(sentences.is_empty(), "got {} sentences", sentences.len());
    }

    #[test]
    fn pages_attributed_in_order() {
        let pages = vec![
            PageText {
                page_number: 1,
                text: "Mars in the 7th house causes discord.".into(),
            },
            PageText {
                page_number: 2,
                text: "Jupiter in the 2nd house gives wealth.".into(),
            },
        ];
        let sentences = segment_sentences(&pages, Lexicon::bundled());
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].page_number, 1);
        assert_eq!(sentences[1].page_number, 2);
    }

    #[test]
    fn trailing_text_without_period_kept() {
        let sentences = segment("Mars in the 7th house causes discord");
        assert_eq!(sentences.len(), 1);
    }
}
