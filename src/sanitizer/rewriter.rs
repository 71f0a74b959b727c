// src/sanitizer/rewriter.rs

//! Open-element stack and serializer.
//!
//! Tokens are consumed one at a time. Dropped subtrees are tracked with a
//! dropping frame on top of the stack instead of a parse tree, so memory is
//! bounded by the nesting limit rather than the document size.

use std::fmt::Write as _;

use super::attribute::filter_attributes;
use super::element::{Decision, decide, is_void};
use super::entities::escape;
use super::policy::Policy;
use super::token::{Attribute, Token};
use super::tokenizer::{is_raw_text, tokenize};

#[derive(Debug)]
struct Frame {
    name: String,
    dropping: bool,
    /// Same-name start tags seen inside a dropping frame.
    nested: usize,
}

/// Elements opened but not yet closed. A dropping frame is always the top
/// frame: nothing else is pushed while one is active.
#[derive(Debug, Default)]
pub struct OpenElementStack {
    frames: Vec<Frame>,
}

impl OpenElementStack {
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_dropping(&self) -> bool {
        self.frames.last().is_some_and(|f| f.dropping)
    }

    fn push(&mut self, name: &str, dropping: bool) {
        self.frames.push(Frame {
            name: name.to_string(),
            dropping,
            nested: 0,
        });
    }

    /// Handles a token while the top frame is dropping. Only start and end
    /// tags with the frame's own name matter.
    fn consume_dropped(&mut self, token: &Token) {
        let Some(top) = self.frames.last_mut() else {
            return;
        };
        match token {
            Token::StartTag {
                name, self_closing, ..
            } if *name == top.name && !*self_closing => top.nested += 1,
            Token::EndTag { name } if *name == top.name => {
                if top.nested > 0 {
                    top.nested -= 1;
                } else {
                    self.frames.pop();
                }
            }
            _ => {}
        }
    }

    /// Name of the top frame when it is a kept raw-text element, whose text
    /// is serialized without escaping.
    fn raw_text_element(&self) -> Option<&str> {
        self.frames
            .last()
            .filter(|f| !f.dropping && is_raw_text(&f.name))
            .map(|f| f.name.as_str())
    }

    /// Position of the innermost open frame named `name`.
    fn find(&self, name: &str) -> Option<usize> {
        self.frames.iter().rposition(|f| f.name == name)
    }
}

/// Streaming rewriter for one sanitize call.
pub struct Rewriter<'p> {
    policy: &'p Policy,
    stack: OpenElementStack,
    out: String,
}

impl<'p> Rewriter<'p> {
    pub fn new(policy: &'p Policy, capacity: usize) -> Self {
        Self {
            policy,
            stack: OpenElementStack::default(),
            out: String::with_capacity(capacity),
        }
    }

    pub fn feed(&mut self, token: Token) {
        if self.stack.is_dropping() {
            self.stack.consume_dropped(&token);
            return;
        }

        match token {
            Token::StartTag {
                name,
                attributes,
                self_closing,
            } => self.start_tag(&name, &attributes, self_closing),
            Token::EndTag { name } => self.end_tag(&name),
            Token::Text(text) => match self.stack.raw_text_element() {
                Some(element) => push_raw_text(&mut self.out, element, &text),
                None => self.out.push_str(&escape(&text)),
            },
            Token::Comment(comment) => {
                if self.policy.allow_comments() {
                    self.out.push_str("<!--");
                    push_comment_body(&mut self.out, &comment);
                    self.out.push_str("-->");
                }
            }
            Token::Doctype(_) => {}
        }
    }

    fn start_tag(&mut self, name: &str, attributes: &[Attribute], self_closing: bool) {
        let void = is_void(name);

        match decide(self.policy, name, self.stack.depth()) {
            Decision::Drop => {
                if !void && !self_closing {
                    self.stack.push(name, true);
                }
            }
            // Unwrapped attributes are discarded along with the tag.
            Decision::Unwrap => {}
            Decision::Keep(rule) => {
                let kept = filter_attributes(self.policy, name, rule, attributes);
                self.out.push('<');
                self.out.push_str(name);
                for attribute in &kept {
                    let _ = write!(
                        self.out,
                        " {}=\"{}\"",
                        attribute.name,
                        escape(&attribute.value)
                    );
                }

                if void {
                    self.out.push_str("/>");
                } else if self_closing {
                    let _ = write!(self.out, "></{name}>");
                } else {
                    self.out.push('>');
                    self.stack.push(name, false);
                }
            }
        }
    }

    /// Closes the innermost open element called `name`, closing anything
    /// opened inside it first. End tags with no open element are discarded.
    fn end_tag(&mut self, name: &str) {
        let Some(index) = self.stack.find(name) else {
            tracing::trace!(element = name, "discarding unmatched end tag");
            return;
        };
        while self.stack.depth() > index {
            if let Some(frame) = self.stack.frames.pop() {
                self.close(&frame);
            }
        }
    }

    fn close(&mut self, frame: &Frame) {
        if !frame.dropping {
            let _ = write!(self.out, "</{}>", frame.name);
        }
    }

    /// End of input: closes every element still open.
    pub fn finish(mut self) -> String {
        while let Some(frame) = self.stack.frames.pop() {
            self.close(&frame);
        }
        self.out
    }
}

/// Writes a comment body that cannot terminate the comment early or be read
/// back as markup.
fn push_comment_body(out: &mut String, body: &str) {
    let mut previous = None;
    for c in body.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '-' if previous == Some('-') => out.push_str(" -"),
            _ => out.push(c),
        }
        previous = Some(c);
    }
}

/// Writes the content of a kept raw-text element. Nothing is escaped, but
/// `</element` and `<!--` are broken with a backslash so the content cannot
/// close the element early.
fn push_raw_text(out: &mut String, element: &str, text: &str) {
    let mut rest = text;
    while let Some(at) = rest.find('<') {
        out.push_str(&rest[..at]);
        let tail = &rest[at + 1..];
        let closes = tail.strip_prefix('/').is_some_and(|t| {
            t.get(..element.len())
                .is_some_and(|n| n.eq_ignore_ascii_case(element))
        });
        if closes || tail.starts_with("!--") {
            out.push_str("<\\");
        } else {
            out.push('<');
        }
        rest = tail;
    }
    out.push_str(rest);
}

/// Sanitizes `input` against `policy`.
///
/// Total and deterministic: every input, including the empty string and
/// arbitrary garbage, yields balanced markup that satisfies the policy.
pub fn sanitize(input: &str, policy: &Policy) -> String {
    let mut rewriter = Rewriter::new(policy, input.len());
    for token in tokenize(input) {
        rewriter.feed(token);
    }
    let output = rewriter.finish();
    tracing::trace!(input_len = input.len(), output_len = output.len(), "sanitized");
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitizer::policy::PolicyBuilder;

    fn formatting() -> Policy {
        PolicyBuilder::new()
            .keep(["b", "i", "p", "br", "a", "div"])
            .unwrap(["span"])
            .drop(["script", "object"])
            .allow_attributes("a", ["href"])
            .url_schemes(["http", "https"])
            .allow_relative_urls(true)
            .allow_comments(true)
            .build()
    }

    #[test]
    fn balanced_output_for_unbalanced_input() {
        let policy = formatting();
        assert_eq!(sanitize("<b><i>x</b>y</i>", &policy), "<b><i>x</i></b>y");
        assert_eq!(sanitize("<p><b>open", &policy), "<p><b>open</b></p>");
        assert_eq!(sanitize("</p>stray</b>", &policy), "stray");
    }

    #[test]
    fn dropped_subtrees_track_same_name_nesting() {
        let policy = formatting();
        assert_eq!(
            sanitize("<object><object></object>hidden</object>shown", &policy),
            "shown"
        );
        assert_eq!(sanitize("<b>a<object><b>x</b>y", &policy), "<b>a</b>");
    }

    #[test]
    fn self_closing_forms() {
        let policy = formatting();
        assert_eq!(sanitize("a<br>b<br/>c", &policy), "a<br/>b<br/>c");
        assert_eq!(sanitize("<div/>x", &policy), "<div></div>x");
        assert_eq!(sanitize("<object/>x", &policy), "x");
    }

    #[test]
    fn unwrap_discards_attributes_but_keeps_children() {
        let policy = formatting();
        assert_eq!(
            sanitize(r#"<span onclick="x()" class="c"><b>bold</b></span>"#, &policy),
            "<b>bold</b>"
        );
    }

    #[test]
    fn comments_are_neutralised_or_removed() {
        let policy = formatting();
        assert_eq!(sanitize("<!-- note -->", &policy), "<!-- note -->");
        assert_eq!(
            sanitize("<!--<script>x</script>-->", &policy),
            "<!--&lt;script&gt;x&lt;/script&gt;-->"
        );
        assert_eq!(sanitize("<!-- a -- b -->", &policy), "<!-- a - - b -->");
        assert_eq!(sanitize("<object><!-- x --></object>", &policy), "");

        let no_comments = PolicyBuilder::new().keep(["b"]).build();
        assert_eq!(sanitize("<b>a<!-- x --></b>", &no_comments), "<b>a</b>");
    }

    #[test]
    fn text_is_escaped() {
        let policy = formatting();
        assert_eq!(sanitize("1 < 2 & \"3\"", &policy), "1 &lt; 2 &amp; &quot;3&quot;");
        assert_eq!(sanitize("&lt;script&gt;", &policy), "&lt;script&gt;");
    }

    #[test]
    fn kept_raw_text_is_serialized_verbatim() {
        let policy = PolicyBuilder::new().keep(["style", "p"]).build();
        let once = sanitize("<style>a > b { }</style><p>x</p>", &policy);
        assert_eq!(once, "<style>a > b { }</style><p>x</p>");
        assert_eq!(sanitize(&once, &policy), once);

        assert_eq!(
            sanitize("<style>x</STYLEx<!--y</style>", &policy),
            "<style>x<\\/STYLEx<\\!--y</style>"
        );
    }

    #[test]
    fn unwrapped_raw_text_is_escaped() {
        let policy = PolicyBuilder::new().keep(["p"]).unwrap(["style"]).build();
        let once = sanitize("<style>a > b &amp;</style>", &policy);
        assert_eq!(once, "a &gt; b &amp;amp;");
        assert_eq!(sanitize(&once, &policy), once);
    }

    #[test]
    fn doctype_is_discarded() {
        assert_eq!(sanitize("<!DOCTYPE html><p>x</p>", &formatting()), "<p>x</p>");
    }

    #[test]
    fn nesting_limit_bounds_the_stack() {
        let policy = PolicyBuilder::new().keep(["b"]).max_depth(3).build();
        let input = "<b>".repeat(10) + "deep" + &"</b>".repeat(10) + "after";
        assert_eq!(sanitize(&input, &policy), "<b><b><b></b></b></b>after");
    }

    #[test]
    fn stack_depth_stays_bounded_while_dropping() {
        let policy = PolicyBuilder::new().keep(["b"]).max_depth(2).build();
        let mut rewriter = Rewriter::new(&policy, 0);
        for token in tokenize(&"<b>".repeat(1000)) {
            rewriter.feed(token);
            assert!(rewriter.stack.depth() <= 3);
        }
        assert_eq!(rewriter.finish(), "<b><b></b></b>");
    }
}
