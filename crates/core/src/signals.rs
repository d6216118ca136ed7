//! Raw browser signals, device snapshot and visit state.
//!
//! Collecting these is the job of the embedding page (cookies, local storage,
//! user agent). This module only defines what the pipeline consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::trace;

/// Raw signal name → value, cookies and storage entries merged.
///
/// Backed by a `BTreeMap` so iteration is deterministic regardless of the
/// order signals were collected in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserSignals(BTreeMap<String, String>);

impl UserSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `Cookie` header (`a=1; b=2`).
    ///
    /// Entries without a key or without a value are skipped. Values are
    /// percent-decoded; a value that does not decode to UTF-8 is kept verbatim.
    pub fn from_cookie_header(header: &str) -> Self {
        let mut signals = Self::new();
        for pair in header.split(';') {
            let Some((key, value)) = pair.trim().split_once('=') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            if key.is_empty() || value.is_empty() {
                continue;
            }
            let value = match urlencoding::decode(value) {
                Ok(decoded) => decoded.into_owned(),
                Err(_) => {
                    trace!(key, "Cookie value is not valid percent-encoding, keeping raw");
                    value.to_string()
                }
            };
            signals.insert(key, value);
        }
        signals
    }

    /// Insert a signal; a later insert with the same key wins.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Merge another source (e.g. local storage) into this one.
    pub fn merge(&mut self, other: UserSignals) {
        self.0.extend(other.0);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for UserSignals {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Browser family as reported by the embedding page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrowserFamily {
    Chrome,
    Firefox,
    Safari,
    Edge,
    #[default]
    Unknown,
}

/// Form factor of the visiting device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceClass {
    #[default]
    Desktop,
    Mobile,
    Tablet,
}

impl std::fmt::Display for BrowserFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

impl std::fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Immutable device snapshot, produced once per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub browser_family: BrowserFamily,
    pub device_class: DeviceClass,
    pub locale: String,
    pub prefers_dark_mode: bool,
    pub viewport: Viewport,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            browser_family: BrowserFamily::Unknown,
            device_class: DeviceClass::Desktop,
            locale: "en-US".into(),
            prefers_dark_mode: false,
            viewport: Viewport {
                width: 1280,
                height: 800,
            },
        }
    }
}

/// Visit bookkeeping. `visit_count` is at least 1 and never decreases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitState {
    pub visit_count: u32,
    pub last_visit: DateTime<Utc>,
}

impl VisitState {
    /// State of a visitor we have no record of.
    pub fn first_visit() -> Self {
        Self {
            visit_count: 1,
            last_visit: Utc::now(),
        }
    }

    /// `last_visit` rendered as ISO-8601.
    pub fn last_visit_iso(&self) -> String {
        self.last_visit.to_rfc3339()
    }
}
