// src/sanitizer/mod.rs

//! Allow-list HTML sanitizer.
//!
//! Untrusted markup flows through a tolerant [`tokenizer`], the [`element`]
//! and [`attribute`] filters (both driven by an immutable [`Policy`]) and the
//! [`rewriter`], which keeps the output balanced.
//!
//! ```
//! use htmlguard::sanitizer::{Policy, sanitize};
//!
//! let policy = Policy::ugc();
//! assert_eq!(sanitize(r#"<a href="javascript:alert(1)">x</a>"#, &policy), "<a>x</a>");
//! assert_eq!(sanitize("<script>alert(1)</script>hello", &policy), "hello");
//! ```

pub mod attribute;
pub mod element;
pub mod entities;
pub mod policy;
pub mod rewriter;
pub mod token;
pub mod tokenizer;

pub use policy::{Action, Policy, PolicyBuilder, Preset, ValueValidator};
pub use rewriter::sanitize;
pub use token::{Attribute, Token};
pub use tokenizer::{Tokenizer, tokenize};
