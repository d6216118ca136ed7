//! Static pages served when generation does not produce usable markup.
//!
//! Rendering is pure: the same request and reason always give the same page.
//! Every tier has a header showing the visit count and a footer explaining
//! why the visitor is seeing a static page. All interpolated text is escaped.

use std::fmt::Write;

use evoweb_core::generation::{DegradedReason, GenerationRequest};

/// Which static page to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackTier {
    /// Interests were detected: sections for them and the profile's focus.
    Personalized,
    /// Nothing detected yet: the generic welcome page.
    Welcome,
}

impl FallbackTier {
    /// Every request carries a profile, so only detected interests pick the
    /// personalized tier.
    pub fn for_request(request: &GenerationRequest) -> Self {
        if request.interests.is_empty() {
            Self::Welcome
        } else {
            Self::Personalized
        }
    }
}

struct Palette {
    background: &'static str,
    text: &'static str,
    heading: &'static str,
    card: &'static str,
    rule: &'static str,
}

const LIGHT: Palette = Palette {
    background: "#ffffff",
    text: "#1a202c",
    heading: "#2a4365",
    card: "#f3f4f6",
    rule: "#e2e8f0",
};

const DARK: Palette = Palette {
    background: "#1a202c",
    text: "#e2e8f0",
    heading: "#90cdf4",
    card: "#2d3748",
    rule: "#4a5568",
};

/// Footer line shown for each degradation reason.
pub fn status_message(reason: DegradedReason) -> &'static str {
    match reason {
        DegradedReason::Timeout => {
            "Your personalized page took too long to generate, so this is a quick version."
        }
        DegradedReason::EngineError => {
            "The on-device model is unavailable right now, so this is a standard version."
        }
        DegradedReason::MalformedResponse => {
            "The generated page could not be used, so this is a standard version."
        }
    }
}

/// Render the fallback page for `request`.
pub fn static_fallback(request: &GenerationRequest, reason: DegradedReason) -> String {
    let dark = request.device.prefers_dark_mode || request.profile.device_preferences.prefers_dark_mode;
    let palette = if dark { &DARK } else { &LIGHT };
    let visits = request.visit_state.visit_count;
    let visits_text = if visits == 1 {
        "You've visited this site 1 time!".to_string()
    } else {
        format!("You've visited this site {visits} times!")
    };

    let mut html = String::new();
    let _ = write!(
        html,
        "<div style=\"font-family: system-ui, sans-serif; max-width: 800px; margin: 0 auto; \
         padding: 2rem; background-color: {bg}; color: {fg};\">\
         <header style=\"margin-bottom: 2rem;\">\
         <h1 style=\"color: {h}; font-size: 2.5rem;\">Welcome to Your EvoWeb</h1>\
         <p>{visits_text}</p></header><main>",
        bg = palette.background,
        fg = palette.text,
        h = palette.heading,
    );

    match FallbackTier::for_request(request) {
        FallbackTier::Personalized => {
            let interests = request
                .interests
                .iter()
                .map(escape)
                .collect::<Vec<_>>()
                .join(", ");
            section(
                &mut html,
                palette,
                &format!("More on {}", escape(&request.profile.primary_interest)),
                &format!(
                    "Picked for you based on your interest in {}.",
                    escape(&request.profile.primary_interest)
                ),
            );
            section(
                &mut html,
                palette,
                "Because you explored",
                &format!("We noticed you like {interests}. Fresh content on these is on its way."),
            );
        }
        FallbackTier::Welcome => {
            section(
                &mut html,
                palette,
                "Personalized Experience",
                "As you browse more sites, we'll customize your experience based on your interests.",
            );
            section(
                &mut html,
                palette,
                "Today's Recommendations",
                "Explore new content that might interest you!",
            );
        }
    }

    let _ = write!(
        html,
        "</main><footer style=\"margin-top: 2rem; padding-top: 1rem; border-top: 1px solid {rule}; \
         text-align: center;\"><p role=\"status\">{status}</p>\
         <p>This content was dynamically generated for you by EvoWeb.</p></footer></div>",
        rule = palette.rule,
        status = status_message(reason),
    );
    html
}

fn section(html: &mut String, palette: &Palette, title: &str, body: &str) {
    let _ = write!(
        html,
        "<section style=\"padding: 1rem; background-color: {card}; border-radius: 0.5rem; \
         margin-bottom: 1rem;\"><h2 style=\"color: {h};\">{title}</h2><p>{body}</p></section>",
        card = palette.card,
        h = palette.heading,
    );
}

/// Escape text for use in HTML element content and attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
