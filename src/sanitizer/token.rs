// src/sanitizer/token.rs

/// A single `name="value"` pair on a start tag.
///
/// The name is lowercased by the tokenizer and the value holds decoded
/// character data (entities already resolved).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Lexical token produced by the [`Tokenizer`](super::tokenizer::Tokenizer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `<div class="x">` or `<br/>`.
    StartTag {
        name: String,
        attributes: Vec<Attribute>,
        self_closing: bool,
    },
    /// `</div>`.
    EndTag { name: String },
    /// Decoded character data.
    Text(String),
    /// Body of `<!-- ... -->`, also used for bogus comments like `<?xml ...>`.
    Comment(String),
    /// Body of `<!DOCTYPE ...>`.
    Doctype(String),
}
