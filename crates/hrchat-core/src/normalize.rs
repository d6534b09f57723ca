//! Answer formatting: turns prose answers into Markdown bullet lists.
//!
//! Sentences are found by scanning byte offsets, so no placeholder characters
//! are ever substituted into the text and nothing needs restoring afterwards.

use regex::Regex;
use std::sync::OnceLock;

/// Abbreviations whose trailing dot never ends a sentence
const ABBREVIATIONS: &[&str] = &[
    "Mr.", "Mrs.", "Ms.", "Dr.", "Prof.", "Sr.", "Jr.", "St.", "vs.", "etc.", "No.", "Inc.",
    "Ltd.", "Co.", "Corp.", "e.g.", "i.e.",
];

/// Characters that stay attached to a sentence after its terminator
const CLOSERS: &[char] = &['"', '\'', ')', ']', '”', '’'];

fn list_marker() -> &'static Regex {
    static LIST_MARKER: OnceLock<Regex> = OnceLock::new();
    LIST_MARKER.get_or_init(|| {
        Regex::new(r"(?m)^\s*([-*]|\d+\.)\s+").expect("list marker pattern is valid")
    })
}

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// Convert an answer into one `- ` bullet per sentence.
///
/// Text that already contains a list is returned trimmed but otherwise as-is.
pub fn normalize(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        return String::new();
    }

    if list_marker().is_match(text) {
        return text.to_string();
    }

    split_sentences(text)
        .into_iter()
        .map(|sentence| format!("- {}", sentence))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split text into trimmed, non-empty sentence slices
fn split_sentences(text: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < chars.len() {
        if !is_terminator(chars[i].1) {
            i += 1;
            continue;
        }

        let run_start = i;
        while i < chars.len() && is_terminator(chars[i].1) {
            i += 1;
        }

        if i - run_start == 1 && chars[run_start].1 == '.' && is_protected_dot(text, &chars, run_start)
        {
            continue;
        }

        while i < chars.len() && CLOSERS.contains(&chars[i].1) {
            i += 1;
        }

        // Only a terminator followed by whitespace or the end of text is a boundary
        let end = match chars.get(i) {
            None => text.len(),
            Some(&(offset, c)) if c.is_whitespace() => offset,
            Some(_) => continue,
        };

        push_sentence(&mut sentences, &text[start..end]);
        start = end;
    }

    push_sentence(&mut sentences, &text[start..]);
    sentences
}

fn push_sentence<'a>(sentences: &mut Vec<&'a str>, raw: &'a str) {
    let sentence = raw.trim();
    if !sentence.is_empty() {
        sentences.push(sentence);
    }
}

/// A dot inside a decimal number or at the end of a known abbreviation
fn is_protected_dot(text: &str, chars: &[(usize, char)], idx: usize) -> bool {
    let prev_digit = idx > 0 && chars[idx - 1].1.is_ascii_digit();
    let next_digit = chars.get(idx + 1).is_some_and(|(_, c)| c.is_ascii_digit());
    if prev_digit && next_digit {
        return true;
    }

    let end = chars[idx].0 + 1;
    ABBREVIATIONS.iter().any(|abbr| {
        let Some(begin) = end.checked_sub(abbr.len()) else {
            return false;
        };
        text.is_char_boundary(begin)
            && text[begin..end].eq_ignore_ascii_case(abbr)
            && text[..begin]
                .chars()
                .next_back()
                .map_or(true, |c| !c.is_alphanumeric())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \n "), "");
    }

    #[test]
    fn test_decimal_not_split() {
        assert_eq!(
            normalize("The price is 2.5 dollars."),
            "- The price is 2.5 dollars."
        );
    }

    #[test]
    fn test_abbreviation_not_split() {
        assert_eq!(
            normalize("Dr. Lee approved it. It was fast."),
            "- Dr. Lee approved it.\n- It was fast."
        );
    }

    #[test]
    fn test_abbreviations_case_insensitive() {
        assert_eq!(
            normalize("Compare apples VS. oranges, E.G. fruit. Then stop!"),
            "- Compare apples VS. oranges, E.G. fruit.\n- Then stop!"
        );
    }

    #[test]
    fn test_abbreviation_needs_token_start() {
        // "Taco." ends in "co." but is not the abbreviation "Co."
        assert_eq!(normalize("I like Taco. Yes."), "- I like Taco.\n- Yes.");
    }

    #[test]
    fn test_mixed_terminators() {
        assert_eq!(
            normalize("Really?! Wait... yes. Done"),
            "- Really?!\n- Wait...\n- yes.\n- Done"
        );
    }

    #[test]
    fn test_closing_quote_stays_with_sentence() {
        assert_eq!(
            normalize("She said \"hire him.\" Then we did."),
            "- She said \"hire him.\"\n- Then we did."
        );
    }

    #[test]
    fn test_no_terminator_single_bullet() {
        assert_eq!(normalize("  just one thought  "), "- just one thought");
    }

    #[test]
    fn test_dot_inside_word_not_split() {
        assert_eq!(
            normalize("See example.com for details. Thanks."),
            "- See example.com for details.\n- Thanks."
        );
    }

    #[test]
    fn test_existing_list_kept() {
        let list = "  Top picks:\n- Ana\n- Ben  ";
        assert_eq!(normalize(list), "Top picks:\n- Ana\n- Ben");
        assert_eq!(normalize("1. First\n2. Second"), "1. First\n2. Second");
        assert_eq!(normalize("* star item"), "* star item");
    }

    #[test]
    fn test_negative_number_is_not_a_list() {
        assert_eq!(normalize("-5 degrees today. Cold."), "- -5 degrees today.\n- Cold.");
    }

    #[test]
    fn test_idempotent() {
        for input in [
            "Thank you for your query! I've reviewed the candidates. Ana has 2.5 years.",
            "No sentence terminators here",
            "Mr. Smith, Jr. is available. Ask again?",
        ] {
            let once = normalize(input);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn test_placeholder_like_characters_survive() {
        // Characters a substitution scheme might reserve come through untouched
        let input = "Ratio 1\u{2236}2 holds. Next.";
        assert_eq!(normalize(input), "- Ratio 1\u{2236}2 holds.\n- Next.");
    }

    #[test]
    fn test_non_ascii_text() {
        assert_eq!(normalize("Привет. Мир!"), "- Привет.\n- Мир!");
    }
}
