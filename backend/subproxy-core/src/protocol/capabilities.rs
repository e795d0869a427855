use crate::target::Target;

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

const SELECTOR_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

static SELECTOR_REGEX: OnceLock<Regex> = OnceLock::new();

pub(crate) fn get_selector_regex() -> &'static Regex {
    SELECTOR_REGEX.get_or_init(|| Regex::new(SELECTOR_PATTERN).expect("valid regex pattern"))
}

pub fn is_valid_selector(selector: &str) -> bool {
    get_selector_regex().is_match(selector)
}

/// Member names of a target, captured once when the worker starts.
///
/// `methods` decides call routing on the client: a name listed there is handed out as a
/// bound method, anything else is read as a value. The set is never refreshed, so members
/// a target grows later are reached through `Get` only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    methods: Vec<String>,
    attributes: Vec<String>,
}

impl CapabilitySet {
    pub fn new(methods: Vec<String>, attributes: Vec<String>) -> Self {
        Self {
            methods: normalize(methods),
            attributes: normalize(attributes),
        }
    }

    pub fn from_target(target: &dyn Target) -> Self {
        Self::new(target.methods(), target.attributes())
    }

    pub fn is_callable(&self, selector: &str) -> bool {
        self.methods.iter().any(|m| m == selector)
    }

    pub fn has_member(&self, selector: &str) -> bool {
        self.is_callable(selector) || self.attributes.iter().any(|a| a == selector)
    }

    pub fn methods(&self) -> &[String] {
        &self.methods
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    /// Names that could never be addressed by a selector.
    pub fn invalid_selectors(&self) -> Vec<&str> {
        self.methods
            .iter()
            .chain(self.attributes.iter())
            .map(String::as_str)
            .filter(|name| !is_valid_selector(name))
            .collect()
    }
}

fn normalize(mut names: Vec<String>) -> Vec<String> {
    names.sort();
    names.dedup();
    names
}
