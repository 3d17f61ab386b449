//! Text splicing with cursor tracking
//!
//! [`splice`] rebuilds a text fragment by fragment, substituting the
//! fragments a callback expands, and moves a caller-owned [`Position`] so
//! it keeps pointing at the same place in the rewritten text.
//!
//! The cursor is adjusted once, after the first fragment that reaches it:
//! - if that fragment was expanded, the cursor moves to the end of the expansion
//! - otherwise it shifts by the net growth or shrinkage of the text so far

use super::token::{tokenize, Token};

/// A cursor position in characters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    offset: usize,
}

impl Position {
    pub fn new(offset: usize) -> Self {
        Self { offset }
    }

    pub fn get(&self) -> usize {
        self.offset
    }

    pub fn set(&mut self, offset: usize) {
        self.offset = offset;
    }
}

/// Rebuild `text`, replacing each fragment for which `expand` returns a value.
/// Delimiters are never offered to `expand`
pub fn splice<'t, F>(text: &'t str, position: Option<&mut Position>, mut expand: F) -> String
where
    F: FnMut(&Token<'t>) -> Option<String>,
{
    let mut output = String::with_capacity(text.len());
    let mut cursor = position;
    let mut index = 0;
    let mut length = 0;

    for fragment in tokenize(text) {
        let token = Token::parse(fragment);
        let expansion = if token.is_delimiter() {
            None
        } else {
            expand(&token)
        };
        let emitted = expansion.as_deref().unwrap_or(fragment);
        output.push_str(emitted);
        index += fragment.chars().count();
        length += emitted.chars().count();

        if cursor.as_ref().is_some_and(|p| index >= p.get()) {
            if let Some(position) = cursor.take() {
                let offset = adjust(position.get(), index, length, expansion.is_some());
                position.set(offset);
            }
        }
    }
    output
}

/// New cursor offset once `index` input characters produced `length` output characters
fn adjust(cursor: usize, index: usize, length: usize, expanded: bool) -> usize {
    if expanded {
        length
    } else if length > index {
        cursor + (length - index)
    } else {
        cursor.saturating_sub(index - length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand_a(token: &Token<'_>) -> Option<String> {
        (token.token == "@a").then(|| "0123456789".to_string())
    }

    fn spliced(text: &str, cursor: usize) -> (String, usize) {
        let mut position = Position::new(cursor);
        let output = splice(text, Some(&mut position), expand_a);
        (output, position.get())
    }

    #[test]
    fn test_no_expansion_is_identity() {
        let (output, cursor) = spliced("a b\n\tc", 3);
        assert_eq!(output, "a b\n\tc");
        assert_eq!(cursor, 3);
    }

    #[test]
    fn test_cursor_after_expansion_shifts() {
        let (output, cursor) = spliced("X @a Y", 5);
        assert_eq!(output, "X 0123456789 Y");
        assert_eq!(cursor, 13);
    }

    #[test]
    fn test_cursor_at_end_of_macro_moves_to_expansion_end() {
        assert_eq!(spliced("X @a Y", 4).1, 12);
        assert_eq!(spliced("X @a Y", 3).1, 12);
    }

    #[test]
    fn test_cursor_before_expansion_unchanged() {
        assert_eq!(spliced("X @a Y", 1).1, 1);
        assert_eq!(spliced("X @a Y", 2).1, 2);
    }

    #[test]
    fn test_shrinkage() {
        let mut position = Position::new(9);
        let output = splice("abcdef gh", Some(&mut position), |token| {
            (token.token == "abcdef").then(String::new)
        });
        assert_eq!(output, " gh");
        assert_eq!(position.get(), 3);
    }

    #[test]
    fn test_delimiters_not_expanded() {
        let mut offered = Vec::new();
        let output = splice("a \t\nb", None, |token| {
            offered.push(token.text.to_string());
            None
        });
        assert_eq!(output, "a \t\nb");
        assert_eq!(offered, vec!["a", "b"]);
    }

    #[test]
    fn test_cursor_past_end_unchanged() {
        let (output, cursor) = spliced("ab", 10);
        assert_eq!(output, "ab");
        assert_eq!(cursor, 10);
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let (output, cursor) = spliced("é @a ü", 5);
        assert_eq!(output, "é 0123456789 ü");
        assert_eq!(cursor, 13);
    }
}
