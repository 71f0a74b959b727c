// src/sanitizer/policy/mod.rs

//! Immutable allow-list rule set consulted by the sanitizer.
//!
//! A [`Policy`] is assembled once with a [`PolicyBuilder`] (or taken from a
//! preset such as [`Policy::ugc`]) and is read-only afterwards, so a single
//! instance can be shared across threads behind an `Arc`.

pub mod config;
mod presets;

use std::{
    borrow::Cow,
    collections::{HashMap, HashSet},
    str::FromStr,
    sync::LazyLock,
};

use regex::Regex;
use url::Url;

pub use presets::Preset;

/// Nesting depth past which every further start tag is dropped.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Attributes whose values are URLs and must pass [`Policy::validate_url`].
pub const URL_ATTRIBUTES: &[&str] = &[
    "action",
    "background",
    "cite",
    "formaction",
    "href",
    "longdesc",
    "poster",
    "src",
    "usemap",
    "xlink:href",
];

/// Style values that can smuggle script or external resources.
static UNSAFE_STYLE_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)expression\s*\(|url\s*\(|image-set\s*\(|(java|vb)script\s*:|behavior|-moz-binding|@import|/\*|[\\<>]")
        .unwrap_or_else(|e| panic!("invalid built-in style pattern: {e}"))
});

/// What happens to an element (tag and content) when it is encountered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Emit the element with its filtered attributes.
    Keep,
    /// Discard the tags and attributes, keep processing the children.
    Unwrap,
    /// Discard the element and everything inside it.
    Drop,
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "keep" => Ok(Action::Keep),
            "unwrap" => Ok(Action::Unwrap),
            "drop" => Ok(Action::Drop),
            other => Err(format!("unknown element action '{other}'")),
        }
    }
}

/// Matches attribute names. Names are stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameMatcher {
    Exact(String),
    /// e.g. `data-` for custom data attributes.
    Prefix(String),
}

impl NameMatcher {
    pub fn matches(&self, name: &str) -> bool {
        match self {
            NameMatcher::Exact(n) => n == name,
            NameMatcher::Prefix(p) => name.len() > p.len() && name.starts_with(p.as_str()),
        }
    }
}

/// Constraint applied to the value of an allowed attribute.
#[derive(Debug, Clone)]
pub enum ValueValidator {
    Any,
    /// Value must be a URL accepted by the [`UrlPolicy`].
    Url,
    /// Value is rewritten by the [`StylePolicy`].
    Style,
    /// Value must match the pattern.
    Pattern(Regex),
    /// Value must equal one of the (lowercase) options, ignoring case.
    OneOf(HashSet<String>),
}

impl ValueValidator {
    /// Picks the validator an attribute needs based on its name alone.
    pub fn for_attribute(name: &str) -> Self {
        if name == "style" {
            ValueValidator::Style
        } else if URL_ATTRIBUTES.contains(&name) {
            ValueValidator::Url
        } else {
            ValueValidator::Any
        }
    }

    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ValueValidator::OneOf(
            values
                .into_iter()
                .map(|v| v.as_ref().to_ascii_lowercase())
                .collect(),
        )
    }

    /// Returns the value to emit, or `None` if the attribute must be dropped.
    pub fn apply<'v>(&self, policy: &Policy, value: &'v str) -> Option<Cow<'v, str>> {
        match self {
            ValueValidator::Any => Some(Cow::Borrowed(value)),
            ValueValidator::Url => policy.validate_url(value).then_some(Cow::Borrowed(value)),
            ValueValidator::Style => {
                let filtered = policy.filter_style(value);
                (!filtered.is_empty()).then_some(Cow::Owned(filtered))
            }
            ValueValidator::Pattern(re) => re.is_match(value).then_some(Cow::Borrowed(value)),
            ValueValidator::OneOf(options) => options
                .contains(&value.trim().to_ascii_lowercase())
                .then_some(Cow::Borrowed(value)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AttributeRule {
    pub matcher: NameMatcher,
    pub validator: ValueValidator,
}

impl AttributeRule {
    pub fn exact(name: &str) -> Self {
        let name = name.to_ascii_lowercase();
        Self {
            validator: ValueValidator::for_attribute(&name),
            matcher: NameMatcher::Exact(name),
        }
    }

    pub fn with(name: &str, validator: ValueValidator) -> Self {
        Self {
            matcher: NameMatcher::Exact(name.to_ascii_lowercase()),
            validator,
        }
    }

    pub fn prefix(prefix: &str) -> Self {
        Self {
            matcher: NameMatcher::Prefix(prefix.to_ascii_lowercase()),
            validator: ValueValidator::Any,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ElementRule {
    pub action: Action,
    pub attributes: Vec<AttributeRule>,
}

static DROP_RULE: ElementRule = ElementRule {
    action: Action::Drop,
    attributes: Vec::new(),
};

static UNWRAP_RULE: ElementRule = ElementRule {
    action: Action::Unwrap,
    attributes: Vec::new(),
};

impl ElementRule {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            attributes: Vec::new(),
        }
    }
}

/// Allowed URL schemes. Unknown schemes are denied.
#[derive(Debug, Clone, Default)]
pub struct UrlPolicy {
    pub schemes: HashSet<String>,
    pub allow_relative: bool,
}

impl UrlPolicy {
    pub fn validate(&self, value: &str) -> bool {
        let trimmed = value.trim_matches(|c: char| c.is_whitespace() || c.is_control());
        if trimmed.is_empty() {
            return self.allow_relative;
        }

        match Url::parse(trimmed) {
            Ok(url) => self.schemes.contains(url.scheme()),
            Err(url::ParseError::RelativeUrlWithoutBase) => self.allow_relative,
            Err(_) => false,
        }
    }
}

/// Allowed CSS properties for the `style` attribute.
#[derive(Debug, Clone, Default)]
pub struct StylePolicy {
    pub properties: HashSet<String>,
}

impl StylePolicy {
    pub fn filter(&self, css: &str) -> String {
        let mut kept: Vec<String> = Vec::new();

        for declaration in split_declarations(css) {
            let Some((property, value)) = declaration.split_once(':') else {
                continue;
            };
            let property = property.trim().to_ascii_lowercase();
            let value = value.trim();
            if property.is_empty() || value.is_empty() {
                continue;
            }
            if !self.properties.contains(&property) {
                tracing::trace!(property = %property, "dropping css declaration");
                continue;
            }
            if UNSAFE_STYLE_VALUE.is_match(value) {
                tracing::debug!(property = %property, "dropping unsafe css value");
                continue;
            }
            kept.push(format!("{property}: {value}"));
        }

        kept.join("; ")
    }
}

/// Splits on `;` that are outside quotes and parentheses.
fn split_declarations(css: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in css.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                parts.push(&css[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&css[start..]);
    parts
}

/// `//host` and its backslash spellings, ignoring the tabs and newlines URL
/// parsing strips.
fn is_scheme_relative(value: &str) -> bool {
    let mut chars = value.chars().filter(|c| !matches!(c, '\t' | '\n' | '\r'));
    matches!(
        (chars.next(), chars.next()),
        (Some('/' | '\\'), Some('/' | '\\'))
    )
}

fn lookup_key(name: &str) -> Cow<'_, str> {
    if name.bytes().any(|b| b.is_ascii_uppercase()) {
        Cow::Owned(name.to_ascii_lowercase())
    } else {
        Cow::Borrowed(name)
    }
}

/// The full rule set. Construct with [`PolicyBuilder`] or a preset.
#[derive(Debug, Clone)]
pub struct Policy {
    elements: HashMap<String, ElementRule>,
    default_action: Action,
    global_attributes: Vec<AttributeRule>,
    urls: UrlPolicy,
    styles: StylePolicy,
    allow_comments: bool,
    link_rel: Option<String>,
    max_depth: usize,
}

impl Policy {
    /// Rule for `element`, matched case-insensitively. Unknown elements get
    /// the policy's default action, which is `Drop` unless configured.
    pub fn rule_for(&self, element: &str) -> &ElementRule {
        match self.elements.get(lookup_key(element).as_ref()) {
            Some(rule) => rule,
            None => match self.default_action {
                Action::Unwrap => &UNWRAP_RULE,
                _ => &DROP_RULE,
            },
        }
    }

    pub fn is_global_attribute_allowed(&self, name: &str) -> bool {
        let name = lookup_key(name);
        self.global_attributes
            .iter()
            .any(|rule| rule.matcher.matches(&name))
    }

    /// Finds the rule permitting `attribute` on an element: the element's own
    /// rules first, then the global ones.
    pub fn attribute_rule<'p>(
        &'p self,
        element: &'p ElementRule,
        attribute: &str,
    ) -> Option<&'p AttributeRule> {
        element
            .attributes
            .iter()
            .chain(self.global_attributes.iter())
            .find(|rule| rule.matcher.matches(attribute))
    }

    pub fn validate_url(&self, value: &str) -> bool {
        self.urls.validate(value)
    }

    pub fn filter_style(&self, css: &str) -> String {
        self.styles.filter(css)
    }

    pub fn allow_comments(&self) -> bool {
        self.allow_comments
    }

    pub fn link_rel(&self) -> Option<&str> {
        self.link_rel.as_deref()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Shorthand for [`sanitize`](crate::sanitizer::sanitize) with this policy.
    pub fn clean(&self, input: &str) -> String {
        crate::sanitizer::sanitize(input, self)
    }

    /// Whether `value` points at another host: an absolute URL with an
    /// allowed scheme, or a scheme-relative `//host/path` reference.
    pub fn is_fully_qualified(&self, value: &str) -> bool {
        let trimmed = value.trim_matches(|c: char| c.is_whitespace() || c.is_control());
        match Url::parse(trimmed) {
            Ok(url) => self.urls.schemes.contains(url.scheme()),
            Err(url::ParseError::RelativeUrlWithoutBase) => is_scheme_relative(trimmed),
            Err(_) => false,
        }
    }
}

/// Chained builder for [`Policy`]. Starts from an empty allow-list.
#[derive(Debug, Clone)]
pub struct PolicyBuilder {
    policy: Policy,
}

impl Default for PolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyBuilder {
    pub fn new() -> Self {
        Self {
            policy: Policy {
                elements: HashMap::new(),
                default_action: Action::Drop,
                global_attributes: Vec::new(),
                urls: UrlPolicy::default(),
                styles: StylePolicy::default(),
                allow_comments: false,
                link_rel: None,
                max_depth: DEFAULT_MAX_DEPTH,
            },
        }
    }

    fn set_action<I, S>(&mut self, elements: I, action: Action) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for element in elements {
            self.policy
                .elements
                .entry(element.as_ref().to_ascii_lowercase())
                .or_insert_with(|| ElementRule::new(action))
                .action = action;
        }
        self
    }

    pub fn keep<I, S>(&mut self, elements: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.set_action(elements, Action::Keep)
    }

    pub fn unwrap<I, S>(&mut self, elements: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.set_action(elements, Action::Unwrap)
    }

    pub fn drop<I, S>(&mut self, elements: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.set_action(elements, Action::Drop)
    }

    /// Action for elements the policy does not mention.
    pub fn default_action(&mut self, action: Action) -> &mut Self {
        self.policy.default_action = action;
        self
    }

    fn element_rule(&mut self, element: &str) -> &mut ElementRule {
        // Declaring attributes does not allow the element by itself.
        self.policy
            .elements
            .entry(element.to_ascii_lowercase())
            .or_insert_with(|| ElementRule::new(Action::Drop))
    }

    /// Allows attributes on one element, with validators inferred from the
    /// attribute names.
    pub fn allow_attributes<I, S>(&mut self, element: &str, attributes: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rule = self.element_rule(element);
        for attribute in attributes {
            rule.attributes.push(AttributeRule::exact(attribute.as_ref()));
        }
        self
    }

    pub fn allow_attribute_with(
        &mut self,
        element: &str,
        attribute: &str,
        validator: ValueValidator,
    ) -> &mut Self {
        self.element_rule(element)
            .attributes
            .push(AttributeRule::with(attribute, validator));
        self
    }

    pub fn allow_global_attributes<I, S>(&mut self, attributes: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for attribute in attributes {
            self.policy
                .global_attributes
                .push(AttributeRule::exact(attribute.as_ref()));
        }
        self
    }

    pub fn allow_global_attribute_with(
        &mut self,
        attribute: &str,
        validator: ValueValidator,
    ) -> &mut Self {
        self.policy
            .global_attributes
            .push(AttributeRule::with(attribute, validator));
        self
    }

    /// Allows every attribute starting with `prefix`, such as `data-`.
    pub fn allow_global_attribute_prefix(&mut self, prefix: &str) -> &mut Self {
        self.policy
            .global_attributes
            .push(AttributeRule::prefix(prefix));
        self
    }

    pub fn url_schemes<I, S>(&mut self, schemes: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.policy.urls.schemes.extend(
            schemes
                .into_iter()
                .map(|s| s.as_ref().to_ascii_lowercase()),
        );
        self
    }

    pub fn allow_relative_urls(&mut self, allow: bool) -> &mut Self {
        self.policy.urls.allow_relative = allow;
        self
    }

    pub fn style_properties<I, S>(&mut self, properties: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.policy.styles.properties.extend(
            properties
                .into_iter()
                .map(|p| p.as_ref().to_ascii_lowercase()),
        );
        self
    }

    pub fn allow_comments(&mut self, allow: bool) -> &mut Self {
        self.policy.allow_comments = allow;
        self
    }

    /// `rel` value forced onto links whose `href` is fully qualified.
    pub fn link_rel(&mut self, rel: Option<&str>) -> &mut Self {
        self.policy.link_rel = rel.map(str::to_string);
        self
    }

    pub fn max_depth(&mut self, depth: usize) -> &mut Self {
        self.policy.max_depth = depth;
        self
    }

    pub fn build(&self) -> Policy {
        self.policy.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn links_only() -> Policy {
        PolicyBuilder::new()
            .keep(["a", "P"])
            .unwrap(["span"])
            .allow_attributes("a", ["HREF", "title"])
            .url_schemes(["http", "https", "mailto"])
            .allow_relative_urls(true)
            .style_properties(["color", "text-align"])
            .allow_global_attribute_prefix("data-")
            .build()
    }

    #[test]
    fn rule_lookup_is_case_insensitive_and_defaults_to_drop() {
        let policy = links_only();
        assert_eq!(policy.rule_for("A").action, Action::Keep);
        assert_eq!(policy.rule_for("p").action, Action::Keep);
        assert_eq!(policy.rule_for("span").action, Action::Unwrap);
        assert_eq!(policy.rule_for("script").action, Action::Drop);
        assert_eq!(policy.rule_for("made-up").action, Action::Drop);
    }

    #[test]
    fn attributes_without_keep_do_not_allow_the_element() {
        let policy = PolicyBuilder::new()
            .allow_attributes("img", ["src"])
            .build();
        assert_eq!(policy.rule_for("img").action, Action::Drop);
    }

    #[test]
    fn url_validation() {
        let policy = links_only();
        assert!(policy.validate_url("https://example.com/a?b=c"));
        assert!(policy.validate_url("mailto:someone@example.com"));
        assert!(policy.validate_url("/relative/path"));
        assert!(policy.validate_url("page.html#frag"));
        assert!(policy.validate_url("//example.com/x"));
        assert!(!policy.validate_url("javascript:alert(1)"));
        assert!(!policy.validate_url("  JavaScript:alert(1)"));
        assert!(!policy.validate_url("java\tscript:alert(1)"));
        assert!(!policy.validate_url("data:text/html;base64,PHNjcmlwdD4="));
        assert!(!policy.validate_url("vbscript:msgbox"));
    }

    #[test]
    fn fully_qualified_urls() {
        let policy = links_only();
        assert!(policy.is_fully_qualified("https://example.com/x"));
        assert!(policy.is_fully_qualified(" //example.com/x"));
        assert!(policy.is_fully_qualified("/\\example.com"));
        assert!(policy.is_fully_qualified("/\t/example.com"));
        assert!(!policy.is_fully_qualified("/local/path"));
        assert!(!policy.is_fully_qualified("page.html"));
        assert!(!policy.is_fully_qualified("ftp://example.com"));
    }

    #[test]
    fn relative_urls_can_be_disallowed() {
        let policy = PolicyBuilder::new()
            .url_schemes(["https"])
            .allow_relative_urls(false)
            .build();
        assert!(policy.validate_url("https://example.com"));
        assert!(!policy.validate_url("/x"));
        assert!(!policy.validate_url(""));
    }

    #[test]
    fn style_filter_keeps_allowed_declarations_in_order() {
        let policy = links_only();
        assert_eq!(
            policy.filter_style("text-align: center; position:fixed;COLOR : red ;"),
            "text-align: center; color: red"
        );
        assert_eq!(policy.filter_style("position: absolute"), "");
        assert_eq!(policy.filter_style(";;garbage;"), "");
    }

    #[test]
    fn style_filter_rejects_unsafe_values() {
        let policy = links_only();
        assert_eq!(policy.filter_style("color: expression(alert(1))"), "");
        assert_eq!(policy.filter_style("color: url(javascript:x)"), "");
        assert_eq!(policy.filter_style(r"color: \65 xpression(x)"), "");
        assert_eq!(
            policy.filter_style("color: red; text-align: ';'"),
            "color: red; text-align: ';'"
        );
    }

    #[test]
    fn global_attribute_lookup() {
        let policy = links_only();
        assert!(policy.is_global_attribute_allowed("data-id"));
        assert!(policy.is_global_attribute_allowed("DATA-ID"));
        assert!(!policy.is_global_attribute_allowed("data-"));
        assert!(!policy.is_global_attribute_allowed("onclick"));
    }

    #[test]
    fn value_validators() {
        let policy = links_only();
        let dir = ValueValidator::one_of(["ltr", "rtl"]);
        assert!(dir.apply(&policy, "RTL").is_some());
        assert!(dir.apply(&policy, "up").is_none());

        let digits = ValueValidator::Pattern(Regex::new(r"^[0-9]+$").unwrap());
        assert!(digits.apply(&policy, "42").is_some());
        assert!(digits.apply(&policy, "42px").is_none());

        assert_eq!(
            ValueValidator::Style
                .apply(&policy, "color: red; float: left")
                .as_deref(),
            Some("color: red")
        );
        assert!(ValueValidator::Style.apply(&policy, "float: left").is_none());
    }

    #[test]
    fn action_parses_from_config_strings() {
        assert_eq!("Keep".parse::<Action>(), Ok(Action::Keep));
        assert_eq!("unwrap".parse::<Action>(), Ok(Action::Unwrap));
        assert!("explode".parse::<Action>().is_err());
    }
}
