// src/sanitizer/tokenizer.rs

//! Tolerant HTML lexer.
//!
//! Produces a finite, one-shot stream of [`Token`]s for any input string.
//! Malformed constructs never fail: a lone `<` becomes text, a tag cut off by
//! the end of input is discarded, unterminated comments run to the end.

use super::entities::decode;
use super::token::{Attribute, Token};

/// Elements whose content is not markup. Everything up to the matching end
/// tag is emitted as a single `Text` token.
const RAW_TEXT: &[&str] = &[
    "script", "style", "iframe", "xmp", "noembed", "noframes", "noscript", "plaintext",
];

/// Like raw text, but character references are still resolved.
const ESCAPABLE_RAW_TEXT: &[&str] = &["textarea", "title"];

/// Whether `name` holds unescaped raw text (script, style and the like).
pub fn is_raw_text(name: &str) -> bool {
    RAW_TEXT.contains(&name)
}

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0C')
}

pub struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
    /// Set after a raw-text start tag: `(element name, decode references)`.
    raw_text: Option<(String, bool)>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            raw_text: None,
        }
    }

    fn bytes(&self) -> &'a [u8] {
        self.input.as_bytes()
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn starts_with_ci(&self, at: usize, needle: &str) -> bool {
        self.bytes()
            .get(at..at + needle.len())
            .is_some_and(|s| s.eq_ignore_ascii_case(needle.as_bytes()))
    }

    fn skip_spaces(&mut self) {
        while self.bytes().get(self.pos).is_some_and(|b| is_space(*b)) {
            self.pos += 1;
        }
    }

    /// Consumes content up to the end tag of the current raw-text element.
    fn consume_raw_text(&mut self, name: &str, decode_refs: bool) -> Option<Token> {
        let bytes = self.bytes();
        let start = self.pos;
        let mut end = bytes.len();

        let mut i = start;
        while let Some(off) = self.input[i..].find("</") {
            let at = i + off;
            let after = at + 2 + name.len();
            if self.starts_with_ci(at + 2, name)
                && bytes.get(after).is_none_or(|b| is_space(*b) || *b == b'/' || *b == b'>')
            {
                end = at;
                break;
            }
            i = at + 2;
        }

        self.pos = end;
        let text = &self.input[start..end];
        if text.is_empty() {
            return None;
        }
        let text = if decode_refs {
            decode(text).into_owned()
        } else {
            text.to_string()
        };
        Some(Token::Text(text))
    }

    fn text(&mut self) -> Token {
        let start = self.pos;
        // Step over the first character so a `<` that opened no markup makes
        // progress.
        let first = self.rest().chars().next().map_or(1, char::len_utf8);
        let end = self.input[start + first..]
            .find('<')
            .map_or(self.input.len(), |off| start + first + off);
        self.pos = end;
        Token::Text(decode(&self.input[start..end]).into_owned())
    }

    /// Reads until `terminator`, returning the content. Runs to the end of
    /// input when the terminator is missing.
    fn until(&mut self, from: usize, terminator: &str) -> &'a str {
        let input = self.input;
        match input[from..].find(terminator) {
            Some(off) => {
                self.pos = from + off + terminator.len();
                &input[from..from + off]
            }
            None => {
                self.pos = input.len();
                &input[from..]
            }
        }
    }

    fn comment(&mut self) -> Token {
        let from = self.pos + 4;
        let rest = &self.input[from..];
        if rest.starts_with('>') {
            self.pos = from + 1;
            return Token::Comment(String::new());
        }
        if rest.starts_with("->") {
            self.pos = from + 2;
            return Token::Comment(String::new());
        }

        // One forward pass: each `--` is checked for `>` or `!>` in place.
        let mut search = 0;
        let close = loop {
            let Some(off) = rest[search..].find("--") else {
                break None;
            };
            let at = search + off;
            let tail = &rest.as_bytes()[at + 2..];
            if tail.first() == Some(&b'>') {
                break Some((at, 3));
            }
            if tail.starts_with(b"!>") {
                break Some((at, 4));
            }
            search = at + 1;
        };

        match close {
            Some((off, len)) => {
                self.pos = from + off + len;
                Token::Comment(rest[..off].to_string())
            }
            None => {
                self.pos = self.input.len();
                Token::Comment(rest.to_string())
            }
        }
    }

    fn tag_name(&mut self) -> String {
        let start = self.pos;
        while self
            .bytes()
            .get(self.pos)
            .is_some_and(|b| !is_space(*b) && *b != b'/' && *b != b'>')
        {
            self.pos += 1;
        }
        self.input[start..self.pos]
            .replace('\0', "\u{fffd}")
            .to_ascii_lowercase()
    }

    /// Parses attributes up to and including the closing `>`.
    ///
    /// Returns `None` when input ends inside the tag.
    fn attributes(&mut self) -> Option<(Vec<Attribute>, bool)> {
        let mut attributes = Vec::new();

        loop {
            self.skip_spaces();
            match self.bytes().get(self.pos)? {
                b'>' => {
                    self.pos += 1;
                    return Some((attributes, false));
                }
                b'/' => {
                    self.pos += 1;
                    if self.bytes().get(self.pos) == Some(&b'>') {
                        self.pos += 1;
                        return Some((attributes, true));
                    }
                    continue;
                }
                _ => {}
            }

            let name_start = self.pos;
            // A leading `=` belongs to the name.
            self.pos += 1;
            while self
                .bytes()
                .get(self.pos)
                .is_some_and(|b| !is_space(*b) && !matches!(b, b'/' | b'>' | b'='))
            {
                self.pos += 1;
            }
            let name = self.input[name_start..self.pos].to_ascii_lowercase();

            self.skip_spaces();
            let mut value = String::new();
            if self.bytes().get(self.pos) == Some(&b'=') {
                self.pos += 1;
                self.skip_spaces();
                value = self.attribute_value()?;
            }

            attributes.push(Attribute::new(name, value));
        }
    }

    fn attribute_value(&mut self) -> Option<String> {
        let bytes = self.bytes();
        match bytes.get(self.pos)? {
            quote @ (b'"' | b'\'') => {
                let from = self.pos + 1;
                let off = self.input[from..].find(*quote as char)?;
                self.pos = from + off + 1;
                Some(decode(&self.input[from..from + off]).into_owned())
            }
            _ => {
                let from = self.pos;
                while bytes.get(self.pos).is_some_and(|b| !is_space(*b) && *b != b'>') {
                    self.pos += 1;
                }
                Some(decode(&self.input[from..self.pos]).into_owned())
            }
        }
    }

    fn start_tag(&mut self) -> Option<Token> {
        self.pos += 1;
        let name = self.tag_name();
        let Some((attributes, mut self_closing)) = self.attributes() else {
            self.pos = self.input.len();
            return None;
        };

        // Browsers ignore a trailing `/` on these and switch to raw text anyway.
        if is_raw_text(&name) {
            self.raw_text = Some((name.clone(), false));
            self_closing = false;
        } else if ESCAPABLE_RAW_TEXT.contains(&name.as_str()) {
            self.raw_text = Some((name.clone(), true));
            self_closing = false;
        }

        Some(Token::StartTag {
            name,
            attributes,
            self_closing,
        })
    }

    fn end_tag(&mut self) -> Option<Token> {
        self.pos += 2;
        let name = self.tag_name();
        // End tags may carry junk attributes; they are parsed and ignored.
        if self.attributes().is_none() {
            self.pos = self.input.len();
            return None;
        }
        Some(Token::EndTag { name })
    }

    /// Dispatches on the construct starting at `self.pos` (a `<`).
    ///
    /// `None` means the construct produced no token but input was consumed.
    fn markup(&mut self) -> Option<Token> {
        let bytes = self.bytes();
        let next = bytes.get(self.pos + 1).copied();

        match next {
            Some(b'!') => {
                if self.rest().starts_with("<!--") {
                    Some(self.comment())
                } else if self.starts_with_ci(self.pos + 2, "doctype") {
                    let body = self.until(self.pos + 9, ">");
                    Some(Token::Doctype(body.trim().to_string()))
                } else {
                    let body = self.until(self.pos + 2, ">");
                    Some(Token::Comment(body.to_string()))
                }
            }
            Some(b'?') => {
                let body = self.until(self.pos + 1, ">");
                Some(Token::Comment(body.to_string()))
            }
            Some(b'/') => match bytes.get(self.pos + 2) {
                Some(b) if b.is_ascii_alphabetic() => self.end_tag(),
                Some(b'>') => {
                    self.pos += 3;
                    None
                }
                Some(_) => {
                    let body = self.until(self.pos + 2, ">");
                    Some(Token::Comment(body.to_string()))
                }
                None => Some(self.text()),
            },
            Some(b) if b.is_ascii_alphabetic() => self.start_tag(),
            _ => Some(self.text()),
        }
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        while self.pos < self.input.len() {
            if let Some((name, decode_refs)) = self.raw_text.take() {
                if let Some(token) = self.consume_raw_text(&name, decode_refs) {
                    return Some(token);
                }
                continue;
            }

            let token = if self.bytes()[self.pos] == b'<' {
                self.markup()
            } else {
                Some(self.text())
            };
            if token.is_some() {
                return token;
            }
        }
        None
    }
}

/// Convenience wrapper returning a lazy token stream for `input`.
pub fn tokenize(input: &str) -> Tokenizer<'_> {
    Tokenizer::new(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        tokenize(input).collect()
    }

    fn start(name: &str, attrs: &[(&str, &str)], self_closing: bool) -> Token {
        Token::StartTag {
            name: name.to_string(),
            attributes: attrs.iter().map(|(n, v)| Attribute::new(*n, *v)).collect(),
            self_closing,
        }
    }

    fn end(name: &str) -> Token {
        Token::EndTag {
            name: name.to_string(),
        }
    }

    fn text(s: &str) -> Token {
        Token::Text(s.to_string())
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(tokens("").is_empty());
    }

    #[test]
    fn tags_and_text() {
        assert_eq!(
            tokens(r#"<P Class="a" id=b>hi &amp; bye</p>"#),
            vec![
                start("p", &[("class", "a"), ("id", "b")], false),
                text("hi & bye"),
                end("p"),
            ]
        );
    }

    #[test]
    fn self_closing_and_bare_attributes() {
        assert_eq!(
            tokens("<br/><input disabled value='x y'/>"),
            vec![
                start("br", &[], true),
                start("input", &[("disabled", ""), ("value", "x y")], true),
            ]
        );
    }

    #[test]
    fn duplicate_attributes_are_preserved_in_order() {
        assert_eq!(
            tokens(r#"<a href="/x" HREF="javascript:evil">"#),
            vec![start("a", &[("href", "/x"), ("href", "javascript:evil")], false)]
        );
    }

    #[test]
    fn raw_text_swallows_markup() {
        assert_eq!(
            tokens("<script>if (a<b) { x('</p>') }</SCRIPT >after"),
            vec![
                start("script", &[], false),
                text("if (a<b) { x('</p>') }"),
                end("script"),
                text("after"),
            ]
        );
    }

    #[test]
    fn unterminated_raw_text_runs_to_end() {
        assert_eq!(
            tokens("<style>body{}"),
            vec![start("style", &[], false), text("body{}")]
        );
    }

    #[test]
    fn comments_and_doctype() {
        assert_eq!(
            tokens("<!DOCTYPE html><!-- hi --><!--><?php x ?>"),
            vec![
                Token::Doctype("html".to_string()),
                Token::Comment(" hi ".to_string()),
                Token::Comment(String::new()),
                Token::Comment("?php x ?".to_string()),
            ]
        );
    }

    #[test]
    fn comment_terminators() {
        assert_eq!(
            tokens("<!--a--!>b<!--c---->d<!-- e -- f -->"),
            vec![
                Token::Comment("a".to_string()),
                text("b"),
                Token::Comment("c--".to_string()),
                text("d"),
                Token::Comment(" e -- f ".to_string()),
            ]
        );
        assert_eq!(tokens("<!--open -- still"), vec![Token::Comment("open -- still".to_string())]);
    }

    #[test]
    fn raw_text_elements_ignore_self_closing() {
        assert_eq!(
            tokens("<script/>payload</script>after<title/>t&amp;</title>"),
            vec![
                start("script", &[], false),
                text("payload"),
                end("script"),
                text("after"),
                start("title", &[], false),
                text("t&"),
                end("title"),
            ]
        );
    }

    #[test]
    fn stray_angle_brackets_become_text() {
        assert_eq!(
            tokens("a < b <3 </>c"),
            vec![text("a "), text("< b "), text("<3 "), text("c")]
        );
    }

    #[test]
    fn tag_cut_off_by_end_of_input_is_discarded() {
        assert_eq!(tokens("ok<a href=\"x"), vec![text("ok")]);
        assert_eq!(tokens("ok</b"), vec![text("ok")]);
    }

    #[test]
    fn attribute_values_are_decoded() {
        assert_eq!(
            tokens("<a href=\"java&#115;cript&colon;x\">"),
            vec![start("a", &[("href", "javascript:x")], false)]
        );
    }

    #[test]
    fn binary_garbage_terminates() {
        let garbage = "\u{0}<\u{1}<//\u{fffd}<a\u{0}=\u{0}>\u{7f}<!";
        let out = tokens(garbage);
        assert!(!out.is_empty());
    }
}
