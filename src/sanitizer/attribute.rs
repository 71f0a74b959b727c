// src/sanitizer/attribute.rs

//! Attribute rewriting for kept elements.

use std::collections::HashSet;

use super::policy::{ElementRule, Policy, URL_ATTRIBUTES, ValueValidator};
use super::token::Attribute;

/// Attribute names that can be serialized without quoting problems.
fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':' | b'.'))
}

/// Filters the attributes of a kept element.
///
/// Order is preserved among kept attributes. Only the first occurrence of a
/// name is considered; later duplicates are dropped whatever the outcome of
/// the first.
pub fn filter_attributes(
    policy: &Policy,
    element: &str,
    rule: &ElementRule,
    attributes: &[Attribute],
) -> Vec<Attribute> {
    let mut seen: HashSet<String> = HashSet::with_capacity(attributes.len());
    let mut kept = Vec::with_capacity(attributes.len());

    for attribute in attributes {
        let name = attribute.name.to_ascii_lowercase();
        if !seen.insert(name.clone()) {
            tracing::trace!(element, attribute = %name, "dropping duplicate attribute");
            continue;
        }
        if !is_safe_name(&name) {
            continue;
        }

        let Some(attribute_rule) = policy.attribute_rule(rule, &name) else {
            tracing::trace!(element, attribute = %name, "attribute not allowed");
            continue;
        };

        let Some(value) = attribute_rule.validator.apply(policy, &attribute.value) else {
            tracing::debug!(element, attribute = %name, "attribute value rejected");
            continue;
        };
        let mut value = value.into_owned();

        // URL and style checks hold whichever rule admitted the attribute.
        if URL_ATTRIBUTES.contains(&name.as_str()) && !policy.validate_url(&value) {
            tracing::debug!(element, attribute = %name, "rejected url");
            continue;
        }
        if name == "style" && !matches!(attribute_rule.validator, ValueValidator::Style) {
            value = policy.filter_style(&value);
            if value.is_empty() {
                continue;
            }
        }

        kept.push(Attribute { name, value });
    }

    if let Some(rel) = policy.link_rel() {
        apply_link_rel(policy, element, rel, &mut kept);
    }

    kept
}

/// Forces `rel` on links pointing at fully qualified URLs.
fn apply_link_rel(policy: &Policy, element: &str, rel: &str, kept: &mut Vec<Attribute>) {
    if !matches!(element, "a" | "area") {
        return;
    }
    let external = kept
        .iter()
        .any(|a| a.name == "href" && policy.is_fully_qualified(&a.value));
    if external {
        kept.retain(|a| a.name != "rel");
        kept.push(Attribute::new("rel", rel));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitizer::policy::PolicyBuilder;

    fn attrs(pairs: &[(&str, &str)]) -> Vec<Attribute> {
        pairs.iter().map(|(n, v)| Attribute::new(*n, *v)).collect()
    }

    fn policy() -> Policy {
        PolicyBuilder::new()
            .keep(["a", "p"])
            .allow_attributes("a", ["href", "title"])
            .allow_global_attributes(["style", "lang"])
            .allow_global_attribute_prefix("data-")
            .url_schemes(["http", "https"])
            .allow_relative_urls(true)
            .style_properties(["color"])
            .build()
    }

    fn run(policy: &Policy, element: &str, input: &[(&str, &str)]) -> Vec<Attribute> {
        filter_attributes(policy, element, policy.rule_for(element), &attrs(input))
    }

    #[test]
    fn keeps_allowed_attributes_in_order() {
        let policy = policy();
        assert_eq!(
            run(
                &policy,
                "a",
                &[("onclick", "x()"), ("title", "t"), ("href", "/x"), ("data-id", "7")]
            ),
            attrs(&[("title", "t"), ("href", "/x"), ("data-id", "7")])
        );
    }

    #[test]
    fn element_specific_attributes_do_not_leak() {
        let policy = policy();
        assert_eq!(run(&policy, "p", &[("href", "/x"), ("lang", "en")]), attrs(&[("lang", "en")]));
    }

    #[test]
    fn bad_urls_drop_the_whole_attribute() {
        let policy = policy();
        assert!(run(&policy, "a", &[("href", "javascript:alert(1)")]).is_empty());
    }

    #[test]
    fn first_duplicate_wins() {
        let policy = policy();
        assert_eq!(
            run(&policy, "a", &[("href", "/x"), ("HREF", "javascript:evil")]),
            attrs(&[("href", "/x")])
        );
        assert!(run(&policy, "a", &[("href", "javascript:evil"), ("href", "/x")]).is_empty());
    }

    #[test]
    fn style_is_filtered_and_dropped_when_empty() {
        let policy = policy();
        assert_eq!(
            run(&policy, "p", &[("style", "color: red; position: fixed")]),
            attrs(&[("style", "color: red")])
        );
        assert!(run(&policy, "p", &[("style", "position: fixed")]).is_empty());
    }

    #[test]
    fn url_check_applies_even_with_a_permissive_rule() {
        let policy = PolicyBuilder::new()
            .keep(["a"])
            .allow_attribute_with("a", "href", ValueValidator::Any)
            .url_schemes(["https"])
            .build();
        assert!(run(&policy, "a", &[("href", "javascript:x")]).is_empty());
    }

    #[test]
    fn unsafe_names_are_never_emitted() {
        let policy = policy();
        assert!(run(&policy, "a", &[("data-x\"onclick", "1")]).is_empty());
    }

    #[test]
    fn link_rel_is_forced_on_external_links() {
        let policy = PolicyBuilder::new()
            .keep(["a"])
            .allow_attributes("a", ["href", "rel"])
            .url_schemes(["https"])
            .allow_relative_urls(true)
            .link_rel(Some("nofollow"))
            .build();
        assert_eq!(
            run(&policy, "a", &[("rel", "author"), ("href", "https://x.test")]),
            attrs(&[("href", "https://x.test"), ("rel", "nofollow")])
        );
        assert_eq!(
            run(&policy, "a", &[("href", "//x.test/path")]),
            attrs(&[("href", "//x.test/path"), ("rel", "nofollow")])
        );
        assert_eq!(
            run(&policy, "a", &[("href", "/local")]),
            attrs(&[("href", "/local")])
        );
    }
}
