use std::ops::Range;

/// A word of some text together with its char range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextToken {
    pub text: String,
    /// Char interval is [start, end).
    pub range: Range<usize>,
}

impl TextToken {
    pub fn char_len(&self) -> usize {
        self.range.end - self.range.start
    }
}

/// Splits engine-normalized text into words at whitespace and punctuation.
///
/// Apostrophes and hyphens between two word characters stay inside the word
/// ("don't", "twenty-one"), matching how phonemizers keep them as one token.
pub fn tokenize_normalized(text: &str) -> Vec<TextToken> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;

    for (i, &c) in chars.iter().enumerate() {
        let inner_joiner = matches!(c, '\'' | '\u{2019}' | '-')
            && start.is_some()
            && chars.get(i + 1).is_some_and(|n| n.is_alphanumeric());
        if c.is_alphanumeric() || inner_joiner {
            if start.is_none() {
                start = Some(i);
            }
            continue;
        }
        if let Some(s) = start.take() {
            tokens.push(make_token(&chars, s, i));
        }
    }
    if let Some(s) = start {
        tokens.push(make_token(&chars, s, chars.len()));
    }

    debug_assert!(
        ranges_strictly_increasing(&tokens),
        "normalized tokenization contract violated"
    );
    tokens
}

/// Splits original display text into whitespace-delimited words. Punctuation
/// stays attached ("world." is one display word). Tokens made only of
/// punctuation are merged into the preceding word so every display word carries
/// something speakable.
pub fn tokenize_display(text: &str) -> Vec<TextToken> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens: Vec<TextToken> = Vec::new();
    let mut start: Option<usize> = None;

    let flush = |tokens: &mut Vec<TextToken>, s: usize, e: usize| {
        let token = make_token(&chars, s, e);
        let speakable = token.text.chars().any(|c| c.is_alphanumeric());
        match tokens.last_mut() {
            Some(prev) if !speakable => {
                // "wait ..." keeps the ellipsis with "wait" instead of a silent word.
                prev.range.end = e;
                prev.text = chars[prev.range.clone()].iter().collect();
            }
            _ => tokens.push(token),
        }
    };

    for (i, &c) in chars.iter().enumerate() {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                flush(&mut tokens, s, i);
            }
            continue;
        }
        if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        flush(&mut tokens, s, chars.len());
    }

    debug_assert!(
        ranges_strictly_increasing(&tokens),
        "display tokenization contract violated"
    );
    tokens
}

fn make_token(chars: &[char], start: usize, end: usize) -> TextToken {
    TextToken {
        text: chars[start..end].iter().collect(),
        range: start..end,
    }
}

fn ranges_strictly_increasing(tokens: &[TextToken]) -> bool {
    tokens.iter().all(|t| t.range.start < t.range.end)
        && tokens
            .windows(2)
            .all(|pair| pair[0].range.end <= pair[1].range.start)
}
