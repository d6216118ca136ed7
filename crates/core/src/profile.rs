//! User profiles and the catalog they are selected from.
//!
//! A profile is a curated bundle of interests and content preferences. The
//! catalog is a read-only lookup; today it is a fixed in-memory table, but the
//! resolver only sees the `ProfileCatalog` trait so a remote profile service
//! can replace it without touching resolution.

use serde::{Deserialize, Serialize};

/// Content preferences attached to a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentPreferences {
    pub reading_level: String,
    pub length: String,
    pub media_preference: String,
}

/// Presentation hints attached to a profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevicePreferences {
    pub prefers_dark_mode: bool,
    pub prefers_reduced_motion: bool,
}

/// A profile from the catalog. Never mutated after selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub primary_interest: String,
    pub other_interests: Vec<String>,
    pub content_preferences: ContentPreferences,
    #[serde(default)]
    pub device_preferences: DevicePreferences,
}

/// Ordered, duplicate-free interest labels.
///
/// Order is the order labels were first added; re-adding a label is a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterestSet(Vec<String>);

impl InterestSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `label` unless it is already present. Returns whether it was added.
    pub fn add(&mut self, label: impl Into<String>) -> bool {
        let label = label.into();
        if self.0.contains(&label) {
            return false;
        }
        self.0.push(label);
        true
    }

    pub fn contains(&self, label: &str) -> bool {
        self.0.iter().any(|l| l == label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for InterestSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for label in iter {
            set.add(label);
        }
        set
    }
}

/// Read-only profile lookup.
///
/// Implementations: the built-in static catalog; a profile service later.
pub trait ProfileCatalog: Send + Sync {
    /// Number of profiles available for rotation.
    fn len(&self) -> usize;

    /// Profile at a rotation index (`index < len()`).
    fn get(&self, index: usize) -> Option<&UserProfile>;

    /// Profile with the given id, if any.
    fn find(&self, id: &str) -> Option<&UserProfile>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
