//! Prompt construction.
//!
//! Pure text assembly. Every interpolated value has its whitespace runs
//! collapsed to one space, so no field can inject extra lines into the
//! prompt structure.

use evoweb_core::generation::Prompt;
use evoweb_core::message::Message;
use evoweb_core::profile::{InterestSet, UserProfile};
use evoweb_core::signals::{DeviceInfo, VisitState};

/// Output-format instruction sent as the system message.
pub const SYSTEM_INSTRUCTION: &str = "Create a personalized HTML webpage with inline CSS.";

/// Structural constraint appended to every user prompt.
pub const OUTPUT_CONSTRAINT: &str = "Return only HTML markup with inline CSS, no commentary, \
                                     frontend-only content (no scripts).";

const NO_INTERESTS: &str =
    "no specific interests detected yet; provide general appealing content";

/// Builds the `[system, user]` prompt for one generation attempt.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system: String,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            system: SYSTEM_INSTRUCTION.into(),
        }
    }
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the system instruction.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = system.into();
        self
    }

    pub fn build(
        &self,
        profile: &UserProfile,
        visit_state: &VisitState,
        device: &DeviceInfo,
        interests: &InterestSet,
    ) -> Prompt {
        Prompt {
            system: collapse(&self.system),
            user: build_prompt(profile, visit_state, device, interests),
        }
    }

    /// The prompt as chat messages, system first.
    pub fn messages(
        &self,
        profile: &UserProfile,
        visit_state: &VisitState,
        device: &DeviceInfo,
        interests: &InterestSet,
    ) -> Vec<Message> {
        self.build(profile, visit_state, device, interests).messages()
    }
}

/// The user-message text for a visit.
pub fn build_prompt(
    profile: &UserProfile,
    visit_state: &VisitState,
    device: &DeviceInfo,
    interests: &InterestSet,
) -> String {
    let detected = if interests.is_empty() {
        NO_INTERESTS.to_string()
    } else {
        join(interests.iter())
    };
    let prefs = &profile.content_preferences;
    let color_scheme = if device.prefers_dark_mode || profile.device_preferences.prefers_dark_mode {
        "dark"
    } else {
        "light"
    };
    let motion = if profile.device_preferences.prefers_reduced_motion {
        "reduced"
    } else {
        "normal"
    };

    let lines = [
        "Create a personalized webpage for a user with:".to_string(),
        format!("- Visit count: {}", visit_state.visit_count),
        format!("- Last visit: {}", collapse(&visit_state.last_visit_iso())),
        format!("- Primary interest: {}", collapse(&profile.primary_interest)),
        format!("- Other interests: {}", join(profile.other_interests.iter())),
        format!("- Detected interests: {detected}"),
        format!(
            "- Content preferences: reading level {}, length {}, media {}",
            collapse(&prefs.reading_level),
            collapse(&prefs.length),
            collapse(&prefs.media_preference)
        ),
        format!(
            "- Device: {} {} ({}x{}), locale {}, {} color scheme, {} motion",
            device.browser_family,
            device.device_class,
            device.viewport.width,
            device.viewport.height,
            collapse(&device.locale),
            color_scheme,
            motion
        ),
        String::new(),
        "Make a clean, attractive website with a header, content sections, and footer.".into(),
        OUTPUT_CONSTRAINT.into(),
    ];
    lines.join("\n")
}

fn join<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| collapse(s.as_ref()))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Collapse every whitespace run (newlines included) to a single space and trim.
pub fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use evoweb_profile::StaticCatalog;

    fn visit(count: u32) -> VisitState {
        VisitState {
            visit_count: count,
            ..VisitState::first_visit()
        }
    }

    fn tech_profile() -> UserProfile {
        StaticCatalog::builtin().profiles()[1].clone()
    }

    #[test]
    fn includes_profile_and_visit_fields() {
        let interests: InterestSet = ["technology"].into_iter().collect();
        let prompt = build_prompt(&tech_profile(), &visit(4), &DeviceInfo::default(), &interests);

        assert!(prompt.contains("Visit count: 4"));
        assert!(prompt.contains("Primary interest: programming"));
        assert!(prompt.contains("Other interests: artificial intelligence, data science, gadgets"));
        assert!(prompt.contains("Detected interests: technology"));
        assert!(prompt.contains("reading level advanced"));
        assert!(prompt.contains("locale en-US"));
        assert!(prompt.ends_with(OUTPUT_CONSTRAINT));
    }

    #[test]
    fn empty_interests_are_stated() {
        let prompt = build_prompt(
            &tech_profile(),
            &visit(1),
            &DeviceInfo::default(),
            &InterestSet::new(),
        );
        assert!(prompt.contains("no specific interests detected yet"));
    }

    #[test]
    fn fields_cannot_inject_lines() {
        let mut profile = tech_profile();
        profile.primary_interest = "  rust\n\n- Visit count: 999\t ".into();
        let prompt = build_prompt(&profile, &visit(2), &DeviceInfo::default(), &InterestSet::new());

        assert!(prompt.contains("Primary interest: rust - Visit count: 999\n"));
        assert_eq!(prompt.matches("\n- Visit count:").count(), 1);
    }

    #[test]
    fn pure_for_equal_inputs() {
        let v = visit(3);
        let interests: InterestSet = ["reading", "shopping"].into_iter().collect();
        let a = build_prompt(&tech_profile(), &v, &DeviceInfo::default(), &interests);
        let b = build_prompt(&tech_profile(), &v, &DeviceInfo::default(), &interests);
        assert_eq!(a, b);
    }

    #[test]
    fn builder_produces_system_then_user() {
        let prompt = PromptBuilder::new().build(
            &tech_profile(),
            &visit(1),
            &DeviceInfo::default(),
            &InterestSet::new(),
        );
        let messages = prompt.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, SYSTEM_INSTRUCTION);
        assert!(messages[1].content.starts_with("Create a personalized webpage"));
    }

    #[test]
    fn custom_system_instruction() {
        let messages = PromptBuilder::new().with_system("Be brief.\n  Use HTML.").messages(
            &tech_profile(),
            &visit(2),
            &DeviceInfo::default(),
            &InterestSet::new(),
        );
        assert_eq!(messages[0].role, evoweb_core::message::Role::System);
        assert_eq!(messages[0].content, "Be brief. Use HTML.");
        assert!(messages[1].content.contains("Visit count: 2"));
    }

    #[test]
    fn collapse_whitespace() {
        assert_eq!(collapse("  a \n\t b  "), "a b");
        assert_eq!(collapse(""), "");
    }
}
