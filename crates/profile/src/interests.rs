//! Keyword taxonomy for interest inference.
//!
//! Each rule maps a set of keywords to a label. A label is contributed when
//! any signal *key* contains any of its keywords as a substring. Rules are
//! evaluated in order; that order is the order of the resulting set.

use evoweb_core::profile::InterestSet;
use evoweb_core::signals::UserSignals;
use tracing::debug;

/// One taxonomy rule: keywords → label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterestRule {
    pub label: String,
    pub keywords: Vec<String>,
}

impl InterestRule {
    pub fn new(label: impl Into<String>, keywords: &[&str]) -> Self {
        Self {
            label: label.into(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    fn matches_key(&self, key: &str) -> bool {
        self.keywords.iter().any(|kw| key.contains(kw.as_str()))
    }
}

/// Ordered list of rules.
#[derive(Debug, Clone)]
pub struct InterestTaxonomy {
    rules: Vec<InterestRule>,
}

impl InterestTaxonomy {
    pub fn new(rules: Vec<InterestRule>) -> Self {
        Self { rules }
    }

    /// shopping ← {shop, cart}, reading ← {article, blog}, technology ← {tech, gadget}
    pub fn builtin() -> Self {
        Self::new(vec![
            InterestRule::new("shopping", &["shop", "cart"]),
            InterestRule::new("reading", &["article", "blog"]),
            InterestRule::new("technology", &["tech", "gadget"]),
        ])
    }

    pub fn rules(&self) -> &[InterestRule] {
        &self.rules
    }

    /// Derive the interest set from signal keys.
    ///
    /// No match is not an error, just an empty contribution.
    pub fn derive(&self, signals: &UserSignals) -> InterestSet {
        let mut interests = InterestSet::new();
        for rule in &self.rules {
            if signals.keys().any(|key| rule.matches_key(key)) {
                interests.add(rule.label.clone());
            }
        }
        debug!(
            signals = signals.len(),
            interests = ?interests.as_slice(),
            "Derived interests"
        );
        interests
    }
}

impl Default for InterestTaxonomy {
    fn default() -> Self {
        Self::builtin()
    }
}
