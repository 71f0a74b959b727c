// src/sanitizer/entities/mod.rs

//! Character reference decoding and output escaping.
//!
//! Decoding happens once in the tokenizer so that policy checks see the
//! characters a browser would see. Every `&` is re-escaped on output, so an
//! unrecognised reference survives only as inert literal text.

use std::borrow::Cow;

mod named;

use named::{LEGACY, NAMED};

/// Resolves character references in `input`.
///
/// Unknown or malformed references are left untouched.
pub fn decode(input: &str) -> Cow<'_, str> {
    if !input.contains('&') && !input.contains('\0') {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(idx) = rest.find(['&', '\0']) {
        out.push_str(&rest[..idx]);
        if rest.as_bytes()[idx] == 0 {
            out.push('\u{fffd}');
            rest = &rest[idx + 1..];
            continue;
        }

        let after = &rest[idx + 1..];
        match decode_reference(after, &mut out) {
            Some(consumed) => rest = &after[consumed..],
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Decodes one reference body (the text after `&`) into `out`. Returns the
/// number of bytes consumed, or `None` if nothing was recognised.
fn decode_reference(s: &str, out: &mut String) -> Option<usize> {
    if let Some(numeric) = s.strip_prefix('#') {
        let (ch, consumed) = decode_numeric(numeric)?;
        out.push(ch);
        return Some(consumed + 1);
    }

    let len = s
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric())
        .count();
    if len == 0 {
        return None;
    }
    let name = &s[..len];
    let terminated = s.as_bytes().get(len) == Some(&b';');
    if !terminated && LEGACY.binary_search(&name).is_err() {
        return None;
    }

    let index = NAMED.binary_search_by(|(n, _)| n.cmp(&name)).ok()?;
    out.push_str(NAMED[index].1);
    Some(if terminated { len + 1 } else { len })
}

fn decode_numeric(s: &str) -> Option<(char, usize)> {
    let bytes = s.as_bytes();
    let (radix, start) = match bytes.first() {
        Some(b'x') | Some(b'X') => (16, 1),
        _ => (10, 0),
    };

    let digits = bytes[start..]
        .iter()
        .take_while(|b| {
            if radix == 16 {
                b.is_ascii_hexdigit()
            } else {
                b.is_ascii_digit()
            }
        })
        .count();
    if digits == 0 {
        return None;
    }

    let mut code: u32 = 0;
    for b in &bytes[start..start + digits] {
        let d = (*b as char).to_digit(radix).unwrap_or(0);
        code = code.saturating_mul(radix).saturating_add(d);
    }

    let mut consumed = start + digits;
    if bytes.get(consumed) == Some(&b';') {
        consumed += 1;
    }

    let ch = match code {
        0 => '\u{fffd}',
        c => char::from_u32(c).unwrap_or('\u{fffd}'),
    };
    Some((ch, consumed))
}

/// Escapes text and attribute values for serialization.
pub fn escape(input: &str) -> Cow<'_, str> {
    if !input.contains(['&', '<', '>', '"']) {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len() + 16);
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_named_and_numeric_references() {
        assert_eq!(decode("a &amp; b"), "a & b");
        assert_eq!(decode("&lt;p&gt;"), "<p>");
        assert_eq!(decode("javascript&colon;x"), "javascript:x");
        assert_eq!(decode("&#106;&#x61;&#X76;"), "jav");
        assert_eq!(decode("&#58"), ":");
    }

    #[test]
    fn decodes_the_full_named_table() {
        assert_eq!(decode("caf&eacute; &euro;5 &hearts;"), "caf\u{e9} \u{20ac}5 \u{2665}");
        assert_eq!(decode("&NotEqualTilde;"), "\u{2242}\u{338}");
        assert_eq!(decode("a&Tab;b&NewLine;"), "a\tb\n");
        assert_eq!(decode("&eacute &copy2"), "\u{e9} &copy2");
    }

    #[test]
    fn leaves_unknown_references_alone() {
        assert_eq!(decode("&bogus; & &;"), "&bogus; & &;");
        assert_eq!(decode("&colonx"), "&colonx");
        assert_eq!(decode("&ampx"), "&ampx");
    }

    #[test]
    fn replaces_invalid_code_points() {
        assert_eq!(decode("&#0;"), "\u{fffd}");
        assert_eq!(decode("&#xD800;"), "\u{fffd}");
        assert_eq!(decode("&#99999999999999;"), "\u{fffd}");
        assert_eq!(decode("a\0b"), "a\u{fffd}b");
    }

    #[test]
    fn escape_covers_markup_characters() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape(r#"<a href="x">&"#), "&lt;a href=&quot;x&quot;&gt;&amp;");
    }
}
