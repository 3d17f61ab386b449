//! Cursor tracking across macro expansion

mod helpers;

use helpers::Harness;
use openvpms_macro::macros::{MapVariables, Position};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn harness() -> Harness {
    // "@a" (2 characters) expands to 10 characters; "@shrink" (7) to 1
    Harness::with_macros(&[
        ("@a", "'0123456789'"),
        ("@shrink", "'s'"),
        ("@fail", "openvpms:get(., 'missing')"),
        ("@who", "$who"),
    ])
}

fn expand(h: &Harness, text: &str, cursor: usize) -> (String, usize) {
    let mut position = Position::new(cursor);
    let output = h.macros.run_all_with(text, None, None, Some(&mut position));
    (output, position.get())
}

#[test]
fn test_cursor_after_growth() {
    let h = harness();
    // cursor after the space following "@a"
    assert_eq!(expand(&h, "X @a Y", 5), ("X 0123456789 Y".to_string(), 13));
    // cursor at the end of the text
    assert_eq!(expand(&h, "X @a Y", 6).1, 14);
}

#[test]
fn test_cursor_inside_expanded_token() {
    let h = harness();
    // immediately after "@a", and between "@" and "a"
    assert_eq!(expand(&h, "X @a Y", 4).1, 12);
    assert_eq!(expand(&h, "X @a Y", 3).1, 12);
}

#[test]
fn test_cursor_before_expansion() {
    let h = harness();
    assert_eq!(expand(&h, "X @a Y", 1).1, 1);
    assert_eq!(expand(&h, "X @a Y", 2).1, 2);
}

#[test]
fn test_cursor_after_shrinkage() {
    let h = harness();
    let (output, cursor) = expand(&h, "@shrink tail", 12);
    assert_eq!(output, "s tail");
    assert_eq!(cursor, 6);
}

#[test]
fn test_cursor_with_failed_macro() {
    let h = harness();
    let (output, cursor) = expand(&h, "@fail @a end", 9);
    assert_eq!(output, "@fail 0123456789 end");
    assert_eq!(cursor, 17);
}

#[test]
fn test_cursor_with_variables() {
    let h = harness();
    let variables = MapVariables::new().with("who", "Dr Smith");
    let mut position = Position::new(4);
    let output = h
        .macros
        .run_all_with("@who notes", None, Some(&variables), Some(&mut position));
    assert_eq!(output, "Dr Smith notes");
    assert_eq!(position.get(), 8);
}

#[test]
fn test_no_position() {
    let h = harness();
    assert_eq!(
        h.macros.run_all_with("X @a Y", None, None, None),
        "X 0123456789 Y"
    );
}

proptest! {
    /// Text without macro codes comes back unchanged, and so does the cursor
    #[test]
    fn run_all_is_identity_without_macros(
        text in "[a-z0-9 \t\r\n.,/]{0,40}",
        cursor in 0usize..50,
    ) {
        let h = harness();
        let mut position = Position::new(cursor);
        let output = h.macros.run_all_with(&text, None, None, Some(&mut position));
        prop_assert_eq!(output, text);
        prop_assert_eq!(position.get(), cursor);
    }
}
