// src/sanitizer/policy/config.rs

//! Policies described in JSON, for deployments that need rules other than the
//! built-in presets.
//!
//! ```json
//! {
//!   "extends": "strict",
//!   "keep": ["a", "img"],
//!   "attributes": { "a": ["href"], "img": ["src", { "name": "width", "pattern": "^[0-9]+$" }] },
//!   "url_schemes": ["https"],
//!   "link_rel": "nofollow noopener"
//! }
//! ```

use std::{collections::HashMap, path::Path};

use regex::Regex;
use serde::Deserialize;
use validator::Validate;

use super::{Action, Policy, PolicyBuilder, Preset, ValueValidator};
use crate::error::AppError;

/// An attribute entry: either a bare name or a name with a value constraint.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AttributeConfig {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        pattern: Option<String>,
        #[serde(default)]
        one_of: Option<Vec<String>>,
    },
}

impl AttributeConfig {
    fn name(&self) -> &str {
        match self {
            AttributeConfig::Name(name) | AttributeConfig::Detailed { name, .. } => name,
        }
    }

    fn validator(&self) -> Result<ValueValidator, AppError> {
        match self {
            AttributeConfig::Name(name) => Ok(ValueValidator::for_attribute(&name.to_ascii_lowercase())),
            AttributeConfig::Detailed {
                pattern: Some(_),
                one_of: Some(_),
                name,
            } => Err(AppError::BadRequest(format!(
                "attribute '{name}' sets both pattern and one_of"
            ))),
            AttributeConfig::Detailed {
                pattern: Some(re), ..
            } => Ok(ValueValidator::Pattern(Regex::new(re)?)),
            AttributeConfig::Detailed {
                one_of: Some(options),
                ..
            } => Ok(ValueValidator::one_of(options)),
            AttributeConfig::Detailed { name, .. } => {
                Ok(ValueValidator::for_attribute(&name.to_ascii_lowercase()))
            }
        }
    }
}

/// JSON shape of a policy file.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    /// Preset to start from. Without it the policy starts empty.
    pub extends: Option<Preset>,
    pub keep: Vec<String>,
    pub unwrap: Vec<String>,
    pub drop: Vec<String>,
    pub default_action: Option<String>,
    pub attributes: HashMap<String, Vec<AttributeConfig>>,
    pub global_attributes: Vec<AttributeConfig>,
    pub global_attribute_prefixes: Vec<String>,
    pub url_schemes: Vec<String>,
    pub allow_relative_urls: Option<bool>,
    pub style_properties: Vec<String>,
    pub allow_comments: Option<bool>,
    #[validate(length(min = 1, max = 64, message = "link_rel must be between 1 and 64 chars"))]
    pub link_rel: Option<String>,
    #[validate(range(min = 1, max = 4096, message = "max_depth must be between 1 and 4096"))]
    pub max_depth: Option<usize>,
}

impl PolicyConfig {
    pub fn from_json(json: &str) -> Result<Self, AppError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        tracing::info!("Loaded policy file {}", path.display());
        Self::from_json(&json)
    }
}

impl TryFrom<PolicyConfig> for Policy {
    type Error = AppError;

    fn try_from(config: PolicyConfig) -> Result<Self, Self::Error> {
        if let Err(validation_errors) = config.validate() {
            return Err(AppError::BadRequest(validation_errors.to_string()));
        }

        let mut builder = match config.extends {
            Some(preset) => preset.builder(),
            None => PolicyBuilder::new(),
        };

        builder
            .keep(&config.keep)
            .unwrap(&config.unwrap)
            .drop(&config.drop);

        if let Some(action) = &config.default_action {
            let action: Action = action.parse().map_err(AppError::BadRequest)?;
            builder.default_action(action);
        }

        for (element, attributes) in &config.attributes {
            for attribute in attributes {
                builder.allow_attribute_with(element, attribute.name(), attribute.validator()?);
            }
        }
        for attribute in &config.global_attributes {
            builder.allow_global_attribute_with(attribute.name(), attribute.validator()?);
        }
        for prefix in &config.global_attribute_prefixes {
            builder.allow_global_attribute_prefix(prefix);
        }

        builder
            .url_schemes(&config.url_schemes)
            .style_properties(&config.style_properties);

        if let Some(allow) = config.allow_relative_urls {
            builder.allow_relative_urls(allow);
        }
        if let Some(allow) = config.allow_comments {
            builder.allow_comments(allow);
        }
        if let Some(rel) = &config.link_rel {
            builder.link_rel(Some(rel));
        }
        if let Some(depth) = config.max_depth {
            builder.max_depth(depth);
        }

        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_policy_from_json() {
        let config = PolicyConfig::from_json(
            r#"{
                "keep": ["a", "img", "p"],
                "unwrap": ["span"],
                "attributes": {
                    "a": ["href"],
                    "img": ["src", { "name": "width", "pattern": "^[0-9]+$" }]
                },
                "global_attributes": [{ "name": "dir", "one_of": ["ltr", "rtl"] }],
                "url_schemes": ["https"],
                "allow_relative_urls": false
            }"#,
        )
        .unwrap();
        let policy = Policy::try_from(config).unwrap();

        assert_eq!(policy.rule_for("img").action, Action::Keep);
        assert_eq!(policy.rule_for("span").action, Action::Unwrap);
        assert!(policy.validate_url("https://x.test"));
        assert!(!policy.validate_url("/relative"));
        assert!(policy.is_global_attribute_allowed("dir"));
        assert_eq!(
            policy.clean(r#"<img src="https://x.test/a.png" width="10px" dir="ltr">"#),
            r#"<img src="https://x.test/a.png" dir="ltr"/>"#
        );
    }

    #[test]
    fn extends_a_preset() {
        let config = PolicyConfig::from_json(r#"{ "extends": "strict", "keep": ["span"] }"#).unwrap();
        let policy = Policy::try_from(config).unwrap();
        assert_eq!(policy.rule_for("span").action, Action::Keep);
        assert_eq!(policy.rule_for("p").action, Action::Keep);
    }

    #[test]
    fn rejects_invalid_configs() {
        assert!(PolicyConfig::from_json(r#"{ "kepe": ["a"] }"#).is_err());

        let bad_regex = PolicyConfig::from_json(
            r#"{ "attributes": { "a": [{ "name": "x", "pattern": "([" }] } }"#,
        )
        .unwrap();
        assert!(Policy::try_from(bad_regex).is_err());

        let bad_depth = PolicyConfig::from_json(r#"{ "max_depth": 0 }"#).unwrap();
        assert!(Policy::try_from(bad_depth).is_err());

        let bad_action = PolicyConfig::from_json(r#"{ "default_action": "explode" }"#).unwrap();
        assert!(Policy::try_from(bad_action).is_err());
    }
}
