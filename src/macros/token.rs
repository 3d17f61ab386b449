//! Text tokenizer
//!
//! Text is split on spaces, tabs, carriage returns and newlines. Each
//! delimiter is yielded as its own fragment, so concatenating the fragments
//! reproduces the input exactly.

/// Characters that separate macro candidates
pub const DELIMITERS: &[char] = &[' ', '\t', '\n', '\r'];

/// Sentence punctuation that may follow a macro code, as in `@today.`
pub const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?'];

/// A text fragment split into an optional numeric prefix and a candidate macro code
///
/// `"3@plus1"` has prefix `"3"` and token `"@plus1"`. `"@today"` has no
/// prefix. `"1/2"` is all prefix, with an empty token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    /// The fragment as it appeared in the text
    pub text: &'a str,

    /// Leading digits, `.` and `/`, if any
    pub numeric_prefix: Option<&'a str>,

    /// The remainder of the fragment
    pub token: &'a str,
}

impl<'a> Token<'a> {
    /// Split a fragment into prefix and token
    pub fn parse(text: &'a str) -> Self {
        let index = text
            .find(|c: char| !is_numeric(c))
            .unwrap_or(text.len());
        let (prefix, token) = text.split_at(index);
        Self {
            text,
            numeric_prefix: (index != 0).then_some(prefix),
            token,
        }
    }

    /// Split trailing sentence punctuation off the token.
    ///
    /// Returns `None` if the token doesn't end in punctuation or is nothing but punctuation.
    pub fn strip_punctuation(&self) -> Option<(&'a str, &'a str)> {
        let code = self.token.trim_end_matches(TRAILING_PUNCTUATION);
        (!code.is_empty() && code.len() < self.token.len())
            .then(|| self.token.split_at(code.len()))
    }

    /// True if the fragment is a single delimiter character
    pub fn is_delimiter(&self) -> bool {
        let mut chars = self.text.chars();
        matches!((chars.next(), chars.next()), (Some(c), None) if DELIMITERS.contains(&c))
    }
}

fn is_numeric(c: char) -> bool {
    c.is_ascii_digit() || c == '.' || c == '/'
}

/// Iterate over the fragments of `text`
pub fn tokenize(text: &str) -> Fragments<'_> {
    Fragments { rest: text }
}

/// Iterator returned by [`tokenize`]
#[derive(Debug, Clone)]
pub struct Fragments<'a> {
    rest: &'a str,
}

impl<'a> Iterator for Fragments<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let first = self.rest.chars().next()?;
        let end = if DELIMITERS.contains(&first) {
            first.len_utf8()
        } else {
            self.rest.find(DELIMITERS).unwrap_or(self.rest.len())
        };
        let (fragment, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(fragment)
    }
}
