//! Rule selector codec.
//!
//! A rule selector names one variant of a diagnostic rule as
//! `rule_id|error_key`, e.g. `ccx_rules_ocp.external.rules.nodes_kubelet_version_check|NODE_KUBELET_VERSION`.
//! Both parts are kept verbatim; no case or whitespace normalization happens.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Delimiter between the rule ID and the error key.
pub const SELECTOR_DELIMITER: char = '|';

/// A parsed `rule_id|error_key` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleSelector {
    rule_id: String,
    error_key: String,
}

impl RuleSelector {
    /// Builds a selector from already separated parts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedSelector`] if either part is empty or contains
    /// the delimiter.
    pub fn new(rule_id: impl Into<String>, error_key: impl Into<String>) -> Result<Self> {
        let rule_id = rule_id.into();
        let error_key = error_key.into();
        if rule_id.is_empty()
            || error_key.is_empty()
            || rule_id.contains(SELECTOR_DELIMITER)
            || error_key.contains(SELECTOR_DELIMITER)
        {
            return Err(Error::malformed_selector(format!(
                "{rule_id}{SELECTOR_DELIMITER}{error_key}"
            )));
        }
        Ok(Self { rule_id, error_key })
    }

    /// Parses `rule_id|error_key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedSelector`] unless the input contains exactly
    /// one delimiter with non-empty text on both sides.
    pub fn parse(selector: &str) -> Result<Self> {
        let mut parts = selector.split(SELECTOR_DELIMITER);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(rule_id), Some(error_key), None)
                if !rule_id.is_empty() && !error_key.is_empty() =>
            {
                Ok(Self {
                    rule_id: rule_id.to_string(),
                    error_key: error_key.to_string(),
                })
            }
            _ => Err(Error::malformed_selector(selector)),
        }
    }

    /// Returns the rule ID (plugin/component name).
    #[must_use]
    pub fn rule_id(&self) -> &str {
        &self.rule_id
    }

    /// Returns the error key.
    #[must_use]
    pub fn error_key(&self) -> &str {
        &self.error_key
    }
}

impl fmt::Display for RuleSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SELECTOR_DELIMITER}{}", self.rule_id, self.error_key)
    }
}

impl FromStr for RuleSelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rule_id_and_error_key() {
        let selector = RuleSelector::parse("abc|xyz").unwrap();
        assert_eq!(selector.rule_id(), "abc");
        assert_eq!(selector.error_key(), "xyz");
    }

    #[test]
    fn rejects_improper_shapes() {
        for input in ["abc", "abc|", "|xyz", "|", "", "a|b|c", "a||b"] {
            let err = RuleSelector::parse(input).unwrap_err();
            assert!(
                matches!(err, Error::MalformedSelector { ref selector } if selector == input),
                "{input:?} should be rejected, got {err:?}"
            );
        }
    }

    #[test]
    fn keeps_input_verbatim() {
        let selector = RuleSelector::parse(" Rule.Module | ERROR_KEY ").unwrap();
        assert_eq!(selector.rule_id(), " Rule.Module ");
        assert_eq!(selector.error_key(), " ERROR_KEY ");
    }

    #[test]
    fn display_is_canonical_form() {
        let selector: RuleSelector = "ccx.rules.node|NODE_DOWN".parse().unwrap();
        assert_eq!(selector.to_string(), "ccx.rules.node|NODE_DOWN");
    }

    #[test]
    fn new_rejects_delimiter_inside_parts() {
        assert!(RuleSelector::new("a|b", "c").is_err());
        assert!(RuleSelector::new("a", "").is_err());
        assert!(RuleSelector::new("a", "b").is_ok());
    }
}
