//! `evoweb generate` — Personalize one page and print it.

use evoweb_core::signals::{DeviceInfo, UserSignals};
use evoweb_pipeline::{Personalizer, status_message};
use tracing::debug;

pub struct GenerateArgs {
    pub signals: Vec<(String, String)>,
    pub cookie: Option<String>,
    pub profile: Option<String>,
    pub offline: bool,
    pub json: bool,
}

/// Parse `key=value`. The value may be empty; the key may not.
pub fn parse_signal(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw.split_once('=').unwrap_or((raw, ""));
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("signal '{raw}' has no key (expected key=value)"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

/// Cookie signals first, explicit `--signal`s override them.
pub fn collect_signals(cookie: Option<&str>, pairs: Vec<(String, String)>) -> UserSignals {
    let mut signals = cookie.map(UserSignals::from_cookie_header).unwrap_or_default();
    signals.merge(pairs.into_iter().collect());
    signals
}

pub async fn run(args: GenerateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config()?;
    if args.offline {
        config.engine.backend = "echo".into();
    }
    if args.profile.is_some() {
        config.profile.explicit_profile_id = args.profile;
    }

    let signals = collect_signals(args.cookie.as_deref(), args.signals);
    debug!(backend = %config.engine.backend, signals = signals.len(), "Generating page");
    let personalizer = Personalizer::from_config(&config).await?;
    let page = personalizer.personalize(&signals, &DeviceInfo::default()).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }

    eprintln!(
        "visit #{} · profile {} · interests: {}",
        page.visit_state.visit_count,
        page.profile_id,
        if page.interests.is_empty() {
            "none".to_string()
        } else {
            page.interests.as_slice().join(", ")
        }
    );
    if let Some(reason) = page.result.degraded_reason() {
        eprintln!("⚠️  {}", status_message(reason));
    }
    println!("{}", page.result.html());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_parsing() {
        assert_eq!(parse_signal("shop_cart=3").unwrap(), ("shop_cart".into(), "3".into()));
        assert_eq!(parse_signal("flag").unwrap(), ("flag".into(), String::new()));
        assert_eq!(parse_signal("a=b=c").unwrap(), ("a".into(), "b=c".into()));
        assert!(parse_signal("=orphan").is_err());
    }

    #[test]
    fn explicit_signals_override_cookie() {
        let signals = collect_signals(
            Some("theme=dark; blogpost=1"),
            vec![("theme".into(), "light".into())],
        );
        assert_eq!(signals.get("theme"), Some("light"));
        assert_eq!(signals.get("blogpost"), Some("1"));
    }
}
