//! Canonical form of untrusted text for injection matching.
//!
//! The normalizer folds case, decodes leetspeak digits, drops zero-width
//! characters and collapses letter-by-letter spellings ("C-o-u-l-d") while
//! keeping, for every byte of the normalized string, the byte range of the
//! original text it came from. Characters are never reordered, so any
//! normalized span projects onto one contiguous original span.

use std::ops::Range;

/// Which letter a leet `1` stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LeetOne {
    #[default]
    AsI,
    AsL,
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    one_as: LeetOne,
    /// Minimum number of single letters before a spelled-out run is collapsed.
    min_spelled_letters: usize,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            one_as: LeetOne::AsI,
            min_spelled_letters: 3,
        }
    }
}

/// Normalized text plus the byte map back into the original string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    text: String,
    origins: Vec<Range<usize>>,
}

impl NormalizedText {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Original byte range covered by a normalized byte range.
    pub fn original_range(&self, normalized: Range<usize>) -> Option<Range<usize>> {
        if normalized.start >= normalized.end || normalized.end > self.origins.len() {
            return None;
        }
        let start = self.origins[normalized.start].start;
        let end = self.origins[normalized.end - 1].end;
        Some(start..end)
    }
}

const SPELLING_SEPARATORS: &[char] = &['-', '.', ' ', '_', '*', '~', '|', '/', '+'];

fn is_invisible(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}' | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}'
    )
}

fn leet_letter(c: char, one_as: LeetOne) -> Option<char> {
    match c {
        '0' => Some('o'),
        '1' => Some(match one_as {
            LeetOne::AsI => 'i',
            LeetOne::AsL => 'l',
        }),
        '3' => Some('e'),
        '4' | '@' => Some('a'),
        '5' | '$' => Some('s'),
        '7' => Some('t'),
        _ => None,
    }
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_leet_one(mut self, one_as: LeetOne) -> Self {
        self.one_as = one_as;
        self
    }

    pub fn with_min_spelled_letters(mut self, min: usize) -> Self {
        self.min_spelled_letters = min.max(2);
        self
    }

    pub fn normalize(&self, input: &str) -> NormalizedText {
        let chars: Vec<(Range<usize>, char)> = input
            .char_indices()
            .filter(|(_, c)| !is_invisible(*c))
            .map(|(idx, c)| (idx..idx + c.len_utf8(), c))
            .collect();

        let letters = self.letter_forms(&chars);
        let dropped = self.spelled_separators(&chars, &letters);

        let mut text = String::with_capacity(input.len());
        let mut origins = Vec::with_capacity(input.len());

        for (idx, (range, c)) in chars.iter().enumerate() {
            if dropped[idx] {
                continue;
            }
            match letters[idx] {
                Some(letter) => push_char(&mut text, &mut origins, letter, range),
                None => {
                    for lower in c.to_lowercase() {
                        push_char(&mut text, &mut origins, lower, range);
                    }
                }
            }
        }

        NormalizedText { text, origins }
    }

    /// Letter each character reads as, if any.
    fn letter_forms(&self, chars: &[(Range<usize>, char)]) -> Vec<Option<char>> {
        let alpha_at = |idx: usize| chars.get(idx).is_some_and(|(_, c)| c.is_alphabetic());
        // Whitespace does not bridge a leet digit to a letter ("have 10 apples").
        let sep_at = |idx: usize| {
            chars
                .get(idx)
                .is_some_and(|(_, c)| !c.is_whitespace() && SPELLING_SEPARATORS.contains(c))
        };

        chars
            .iter()
            .enumerate()
            .map(|(idx, (_, c))| {
                if c.is_alphabetic() {
                    return c.to_lowercase().next();
                }
                let letter = leet_letter(*c, self.one_as)?;
                let prev = idx.checked_sub(1);
                let near_letter = prev.is_some_and(alpha_at)
                    || alpha_at(idx + 1)
                    || (prev.is_some_and(sep_at) && idx.checked_sub(2).is_some_and(alpha_at))
                    || (sep_at(idx + 1) && alpha_at(idx + 2));
                near_letter.then_some(letter)
            })
            .collect()
    }

    /// Separators sitting inside a letter-by-letter spelling.
    fn spelled_separators(
        &self,
        chars: &[(Range<usize>, char)],
        letters: &[Option<char>],
    ) -> Vec<bool> {
        let mut dropped = vec![false; chars.len()];
        let is_letter = |idx: usize| letters.get(idx).is_some_and(Option::is_some);
        let is_single = |idx: usize| {
            is_letter(idx) && (idx == 0 || !is_letter(idx - 1)) && !is_letter(idx + 1)
        };
        let is_sep = |idx: usize| {
            chars
                .get(idx)
                .is_some_and(|(_, c)| SPELLING_SEPARATORS.contains(c))
        };

        let mut idx = 0;
        while idx < chars.len() {
            if !is_single(idx) {
                idx += 1;
                continue;
            }
            let mut run = vec![idx];
            let mut cursor = idx;
            while is_sep(cursor + 1) && is_single(cursor + 2) {
                cursor += 2;
                run.push(cursor);
            }
            if run.len() >= self.min_spelled_letters {
                for pair in run.windows(2) {
                    dropped[pair[0] + 1] = true;
                }
            }
            idx = cursor + 1;
        }

        dropped
    }
}

fn push_char(text: &mut String, origins: &mut Vec<Range<usize>>, c: char, origin: &Range<usize>) {
    text.push(c);
    for _ in 0..c.len_utf8() {
        origins.push(origin.clone());
    }
}

/// Normalize with the default settings.
pub fn normalize(input: &str) -> NormalizedText {
    Normalizer::default().normalize(input)
}
