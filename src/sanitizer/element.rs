// src/sanitizer/element.rs

//! Start-tag decisions: keep, unwrap or drop.

use super::policy::{Action, ElementRule, Policy};

/// Elements that never have content or an end tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "keygen", "link", "meta", "param",
    "source", "track", "wbr",
];

pub fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

/// Outcome for one start tag.
#[derive(Debug)]
pub enum Decision<'p> {
    /// Emit the element, filtering attributes with this rule.
    Keep(&'p ElementRule),
    Unwrap,
    Drop,
}

/// Decides what to do with the start tag `name` opened at nesting `depth`.
///
/// Anything nested deeper than the policy allows is dropped.
pub fn decide<'p>(policy: &'p Policy, name: &str, depth: usize) -> Decision<'p> {
    if depth >= policy.max_depth() {
        tracing::debug!(element = name, depth, "nesting limit reached, dropping subtree");
        return Decision::Drop;
    }

    let rule = policy.rule_for(name);
    match rule.action {
        Action::Keep => Decision::Keep(rule),
        Action::Unwrap => Decision::Unwrap,
        Action::Drop => {
            tracing::trace!(element = name, "dropping element");
            Decision::Drop
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitizer::policy::PolicyBuilder;

    #[test]
    fn follows_policy_actions() {
        let policy = PolicyBuilder::new().keep(["b"]).unwrap(["span"]).build();
        assert!(matches!(decide(&policy, "b", 0), Decision::Keep(_)));
        assert!(matches!(decide(&policy, "SPAN", 0), Decision::Unwrap));
        assert!(matches!(decide(&policy, "script", 0), Decision::Drop));
    }

    #[test]
    fn excess_depth_is_an_implicit_drop() {
        let policy = PolicyBuilder::new().keep(["b"]).max_depth(2).build();
        assert!(matches!(decide(&policy, "b", 1), Decision::Keep(_)));
        assert!(matches!(decide(&policy, "b", 2), Decision::Drop));
    }

    #[test]
    fn void_elements() {
        assert!(is_void("br"));
        assert!(is_void("img"));
        assert!(!is_void("p"));
    }
}
