// src/sanitizer/policy/presets.rs

use std::{fmt, str::FromStr};

use regex::Regex;
use serde::Deserialize;

use super::{Action, Policy, PolicyBuilder, ValueValidator};

/// Elements whose content is never meaningful as text and must go with them.
const SCRIPTING: &[&str] = &[
    "applet", "base", "button", "embed", "form", "frame", "frameset", "head", "iframe", "input",
    "link", "math", "meta", "noembed", "noframes", "noscript", "object", "option", "plaintext",
    "script", "select", "style", "svg", "template", "textarea", "title", "xmp",
];

const UGC_ELEMENTS: &[&str] = &[
    "a", "abbr", "acronym", "address", "article", "aside", "b", "bdi", "bdo", "big", "blockquote",
    "br", "caption", "cite", "code", "col", "colgroup", "dd", "del", "details", "dfn", "div", "dl",
    "dt", "em", "figcaption", "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hgroup", "hr", "i", "img", "ins", "kbd", "li", "mark", "nav", "ol", "p", "pre", "q", "rp",
    "rt", "ruby", "s", "samp", "section", "small", "span", "strike", "strong", "sub", "summary",
    "sup", "table", "tbody", "td", "tfoot", "th", "thead", "time", "tr", "tt", "u", "ul", "var",
    "wbr",
];

const UGC_STYLE_PROPERTIES: &[&str] = &[
    "background-color",
    "color",
    "font-family",
    "font-size",
    "font-style",
    "font-weight",
    "letter-spacing",
    "line-height",
    "list-style-type",
    "margin",
    "margin-bottom",
    "margin-left",
    "margin-right",
    "margin-top",
    "padding",
    "padding-bottom",
    "padding-left",
    "padding-right",
    "padding-top",
    "text-align",
    "text-decoration",
    "text-indent",
    "text-transform",
    "vertical-align",
    "white-space",
    "word-spacing",
];

const STRICT_ELEMENTS: &[&str] = &[
    "b", "blockquote", "br", "code", "em", "i", "li", "ol", "p", "pre", "s", "strong", "u", "ul",
];

fn pattern(re: &str) -> ValueValidator {
    match Regex::new(re) {
        Ok(re) => ValueValidator::Pattern(re),
        Err(e) => panic!("invalid built-in attribute pattern {re}: {e}"),
    }
}

/// Named built-in policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    /// User-generated content: formatting, links, images, lists, tables.
    #[default]
    Ugc,
    /// Text-level formatting only, no attributes.
    Strict,
    /// Removes every tag, leaving text.
    StripAll,
}

impl Preset {
    pub fn builder(self) -> PolicyBuilder {
        match self {
            Preset::Ugc => ugc(),
            Preset::Strict => strict(),
            Preset::StripAll => strip_all(),
        }
    }

    pub fn policy(self) -> Policy {
        self.builder().build()
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ugc" => Ok(Preset::Ugc),
            "strict" => Ok(Preset::Strict),
            "strip-all" | "strip_all" => Ok(Preset::StripAll),
            other => Err(format!(
                "unknown policy '{other}' (expected ugc, strict or strip-all)"
            )),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Preset::Ugc => "ugc",
            Preset::Strict => "strict",
            Preset::StripAll => "strip-all",
        };
        f.write_str(name)
    }
}

fn ugc() -> PolicyBuilder {
    let mut b = PolicyBuilder::new();
    let digits = pattern(r"^[0-9]+$");
    let size = pattern(r"^[0-9]+(%|px)?$");
    let align = ValueValidator::one_of(["left", "right", "center", "justify"]);

    b.keep(UGC_ELEMENTS.iter().copied())
        .unwrap(["html", "body", "font", "center"])
        .drop(SCRIPTING.iter().copied())
        .allow_global_attribute_with("dir", ValueValidator::one_of(["ltr", "rtl", "auto"]))
        .allow_global_attribute_with("lang", pattern(r"^[a-zA-Z]{1,8}(-[a-zA-Z0-9]{1,8})*$"))
        .allow_global_attribute_with("id", pattern(r"^[a-zA-Z0-9:\-_.]+$"))
        .allow_global_attributes(["title", "style"])
        .allow_attributes("a", ["href"])
        .allow_attributes("blockquote", ["cite"])
        .allow_attributes("q", ["cite"])
        .allow_attributes("del", ["cite", "datetime"])
        .allow_attributes("ins", ["cite", "datetime"])
        .allow_attributes("time", ["datetime"])
        .allow_attributes("img", ["src", "alt"])
        .allow_attribute_with("img", "width", size.clone())
        .allow_attribute_with("img", "height", size)
        .allow_attribute_with("img", "align", align.clone())
        .allow_attribute_with("ol", "type", ValueValidator::one_of(["1", "a", "i"]))
        .allow_attribute_with("ol", "start", pattern(r"^-?[0-9]+$"))
        .allow_attribute_with("ul", "type", ValueValidator::one_of(["disc", "circle", "square"]))
        .allow_attribute_with("li", "value", digits.clone())
        .allow_attributes("details", ["open"])
        .allow_attributes("table", ["summary"])
        .allow_attribute_with("col", "span", digits.clone())
        .allow_attribute_with("colgroup", "span", digits.clone())
        .allow_attribute_with("th", "scope", ValueValidator::one_of(["row", "col", "rowgroup", "colgroup"]));

    for cell in ["td", "th"] {
        b.allow_attribute_with(cell, "colspan", digits.clone())
            .allow_attribute_with(cell, "rowspan", digits.clone())
            .allow_attribute_with(cell, "align", align.clone());
    }

    b.url_schemes(["http", "https", "mailto"])
        .allow_relative_urls(true)
        .style_properties(UGC_STYLE_PROPERTIES.iter().copied())
        .allow_comments(true)
        .link_rel(Some("nofollow"));
    b
}

fn strict() -> PolicyBuilder {
    let mut b = PolicyBuilder::new();
    b.keep(STRICT_ELEMENTS.iter().copied())
        .unwrap(["a", "div", "span", "font", "center", "html", "body"])
        .drop(SCRIPTING.iter().copied());
    b
}

fn strip_all() -> PolicyBuilder {
    let mut b = PolicyBuilder::new();
    b.default_action(Action::Unwrap)
        .drop(SCRIPTING.iter().copied());
    b
}

impl Policy {
    /// Policy for user-generated content such as comments and posts.
    pub fn ugc() -> Self {
        Preset::Ugc.policy()
    }

    pub fn strict() -> Self {
        Preset::Strict.policy()
    }

    /// Removes all markup and keeps only the text.
    pub fn strip_all() -> Self {
        Preset::StripAll.policy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ugc_keeps_formatting_and_drops_scripting() {
        let policy = Policy::ugc();
        for tag in ["p", "a", "img", "table", "span", "h3"] {
            assert_eq!(policy.rule_for(tag).action, Action::Keep, "{tag}");
        }
        for tag in ["script", "style", "iframe", "object", "svg"] {
            assert_eq!(policy.rule_for(tag).action, Action::Drop, "{tag}");
        }
        assert_eq!(policy.rule_for("body").action, Action::Unwrap);
        assert!(policy.allow_comments());
        assert_eq!(policy.link_rel(), Some("nofollow"));
    }

    #[test]
    fn ugc_restricts_url_schemes() {
        let policy = Policy::ugc();
        assert!(policy.validate_url("http://example.com"));
        assert!(policy.validate_url("mailto:a@b.c"));
        assert!(!policy.validate_url("ftp://example.com"));
        assert!(!policy.validate_url("javascript:alert(1)"));
    }

    #[test]
    fn strip_all_unwraps_unknown_elements() {
        let policy = Policy::strip_all();
        assert_eq!(policy.rule_for("custom-widget").action, Action::Unwrap);
        assert_eq!(policy.rule_for("script").action, Action::Drop);
    }

    #[test]
    fn preset_names_round_trip() {
        for preset in [Preset::Ugc, Preset::Strict, Preset::StripAll] {
            assert_eq!(preset.to_string().parse::<Preset>(), Ok(preset));
        }
        assert!("lenient".parse::<Preset>().is_err());
    }
}
