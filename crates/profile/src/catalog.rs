//! The built-in profile catalog.
//!
//! A fixed in-memory table standing in for a real profile service. It can
//! also be loaded from JSON so deployments can ship their own profiles.

use evoweb_core::profile::{ContentPreferences, DevicePreferences, ProfileCatalog, UserProfile};

/// A read-only, ordered list of profiles.
#[derive(Debug, Clone)]
pub struct StaticCatalog {
    profiles: Vec<UserProfile>,
}

impl StaticCatalog {
    pub fn new(profiles: Vec<UserProfile>) -> Self {
        Self { profiles }
    }

    /// Parse a JSON array of profiles.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    /// The three sample profiles, in rotation order.
    pub fn builtin() -> Self {
        Self::new(vec![
            profile(
                "outdoor-enthusiast",
                "hiking",
                &["camping", "photography", "travel"],
                ("intermediate", "medium", "image-heavy"),
                (true, false),
            ),
            profile(
                "tech-professional",
                "programming",
                &["artificial intelligence", "data science", "gadgets"],
                ("advanced", "long", "code-samples"),
                (true, false),
            ),
            profile(
                "wellness-enthusiast",
                "yoga",
                &["meditation", "nutrition", "mindfulness"],
                ("beginner", "medium", "video"),
                (false, true),
            ),
        ])
    }

    pub fn profiles(&self) -> &[UserProfile] {
        &self.profiles
    }
}

impl Default for StaticCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn profile(
    id: &str,
    primary: &str,
    others: &[&str],
    (reading_level, length, media): (&str, &str, &str),
    (dark, reduced_motion): (bool, bool),
) -> UserProfile {
    UserProfile {
        id: id.into(),
        primary_interest: primary.into(),
        other_interests: others.iter().map(|s| s.to_string()).collect(),
        content_preferences: ContentPreferences {
            reading_level: reading_level.into(),
            length: length.into(),
            media_preference: media.into(),
        },
        device_preferences: DevicePreferences {
            prefers_dark_mode: dark,
            prefers_reduced_motion: reduced_motion,
        },
    }
}

impl ProfileCatalog for StaticCatalog {
    fn len(&self) -> usize {
        self.profiles.len()
    }

    fn get(&self, index: usize) -> Option<&UserProfile> {
        self.profiles.get(index)
    }

    fn find(&self, id: &str) -> Option<&UserProfile> {
        self.profiles.iter().find(|p| p.id == id)
    }
}
