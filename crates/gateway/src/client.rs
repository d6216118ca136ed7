//! What we can learn about the visitor from request headers.

use axum::http::{HeaderMap, header};
use evoweb_core::signals::{BrowserFamily, DeviceClass, DeviceInfo, UserSignals};

/// Cookie carrying the id that keys a visitor's history.
pub const VISITOR_COOKIE: &str = "evoweb_visitor";

/// One year.
const VISITOR_COOKIE_MAX_AGE: u64 = 365 * 24 * 60 * 60;

/// Signals from the `Cookie` header. Missing or non-UTF-8 headers give none.
pub fn signals_from_headers(headers: &HeaderMap) -> UserSignals {
    let mut signals = UserSignals::new();
    for value in headers.get_all(header::COOKIE) {
        if let Ok(cookie) = value.to_str() {
            signals.merge(UserSignals::from_cookie_header(cookie));
        }
    }
    signals
}

/// Pull the visitor id out of the signals so it never reaches interest
/// inference. Ids that could not have come from [`new_visitor_id`] are
/// ignored.
pub fn take_visitor_id(signals: &mut UserSignals) -> Option<String> {
    signals.remove(VISITOR_COOKIE).filter(|id| is_visitor_id(id))
}

pub fn new_visitor_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// `Set-Cookie` value assigning `visitor_id`.
pub fn visitor_cookie(visitor_id: &str) -> String {
    format!("{VISITOR_COOKIE}={visitor_id}; Path=/; Max-Age={VISITOR_COOKIE_MAX_AGE}; HttpOnly; SameSite=Lax")
}

fn is_visitor_id(id: &str) -> bool {
    (1..=64).contains(&id.len()) && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

/// Device snapshot from `User-Agent`, `Accept-Language` and the
/// `Sec-CH-Prefers-Color-Scheme` client hint.
pub fn device_from_headers(headers: &HeaderMap) -> DeviceInfo {
    let user_agent = header_str(headers, header::USER_AGENT.as_str()).unwrap_or_default();
    let mut device = DeviceInfo {
        browser_family: browser_family(user_agent),
        device_class: device_class(user_agent),
        ..DeviceInfo::default()
    };

    if let Some(locale) = header_str(headers, header::ACCEPT_LANGUAGE.as_str()).and_then(primary_locale) {
        device.locale = locale;
    }
    device.prefers_dark_mode = header_str(headers, "sec-ch-prefers-color-scheme")
        .is_some_and(|v| v.trim().trim_matches('"').eq_ignore_ascii_case("dark"));
    if device.device_class != DeviceClass::Desktop {
        device.viewport.width = 390;
        device.viewport.height = 844;
    }
    device
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// First language tag of an `Accept-Language` value, quality ignored.
fn primary_locale(accept_language: &str) -> Option<String> {
    accept_language
        .split(',')
        .map(|tag| tag.split(';').next().unwrap_or_default().trim())
        .find(|tag| !tag.is_empty() && *tag != "*")
        .map(str::to_string)
}

fn browser_family(user_agent: &str) -> BrowserFamily {
    // Edge and Chrome both claim Safari; order matters.
    if user_agent.contains("Edg/") {
        BrowserFamily::Edge
    } else if user_agent.contains("Firefox/") {
        BrowserFamily::Firefox
    } else if user_agent.contains("Chrome/") || user_agent.contains("CriOS/") {
        BrowserFamily::Chrome
    } else if user_agent.contains("Safari/") {
        BrowserFamily::Safari
    } else {
        BrowserFamily::Unknown
    }
}

fn device_class(user_agent: &str) -> DeviceClass {
    if user_agent.contains("iPad") || user_agent.contains("Tablet") {
        DeviceClass::Tablet
    } else if user_agent.contains("Mobi") || user_agent.contains("iPhone") || user_agent.contains("Android") {
        DeviceClass::Mobile
    } else {
        DeviceClass::Desktop
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const CHROME_DESKTOP: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
        (KHTML, like Gecko) Chrome/126.0 Safari/537.36";
    const EDGE: &str = "Mozilla/5.0 (Windows NT 10.0) AppleWebKit/537.36 \
        (KHTML, like Gecko) Chrome/126.0 Safari/537.36 Edg/126.0";
    const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) \
        AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn browsers() {
        assert_eq!(browser_family(CHROME_DESKTOP), BrowserFamily::Chrome);
        assert_eq!(browser_family(EDGE), BrowserFamily::Edge);
        assert_eq!(browser_family(SAFARI_IPHONE), BrowserFamily::Safari);
        assert_eq!(
            browser_family("Mozilla/5.0 (X11; Linux x86_64; rv:127.0) Gecko/20100101 Firefox/127.0"),
            BrowserFamily::Firefox
        );
        assert_eq!(browser_family("curl/8.5"), BrowserFamily::Unknown);
    }

    #[test]
    fn device_classes() {
        assert_eq!(device_class(CHROME_DESKTOP), DeviceClass::Desktop);
        assert_eq!(device_class(SAFARI_IPHONE), DeviceClass::Mobile);
        assert_eq!(device_class("Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X)"), DeviceClass::Tablet);
    }

    #[test]
    fn locale_from_accept_language() {
        let device = device_from_headers(&headers(&[("accept-language", "fr-CA,fr;q=0.9,en;q=0.5")]));
        assert_eq!(device.locale, "fr-CA");
    }

    #[test]
    fn defaults_without_headers() {
        assert_eq!(device_from_headers(&HeaderMap::new()), DeviceInfo::default());
        assert!(signals_from_headers(&HeaderMap::new()).is_empty());
    }

    #[test]
    fn dark_mode_hint() {
        let device = device_from_headers(&headers(&[("sec-ch-prefers-color-scheme", "\"dark\"")]));
        assert!(device.prefers_dark_mode);
    }

    #[test]
    fn mobile_viewport() {
        let device = device_from_headers(&headers(&[("user-agent", SAFARI_IPHONE)]));
        assert_eq!(device.device_class, DeviceClass::Mobile);
        assert_eq!(device.viewport.width, 390);
    }

    #[test]
    fn visitor_id_is_taken_out_of_signals() {
        let mut signals = UserSignals::from_cookie_header("evoweb_visitor=abc-123; techgadget=1");
        assert_eq!(take_visitor_id(&mut signals).as_deref(), Some("abc-123"));
        assert_eq!(signals.len(), 1);
        assert!(signals.get(VISITOR_COOKIE).is_none());
    }

    #[test]
    fn malformed_visitor_id_is_ignored() {
        let mut signals = UserSignals::from_cookie_header("evoweb_visitor=..%2Fother");
        assert!(take_visitor_id(&mut signals).is_none());
        assert!(signals.is_empty());

        let fresh = new_visitor_id();
        assert!(is_visitor_id(&fresh));
        assert!(visitor_cookie(&fresh).starts_with(&format!("evoweb_visitor={fresh}; Path=/")));
    }

    #[test]
    fn multiple_cookie_headers_merge() {
        let signals = signals_from_headers(&headers(&[("cookie", "shop_cart=1"), ("cookie", "blogpost=2")]));
        assert_eq!(signals.get("shop_cart"), Some("1"));
        assert_eq!(signals.get("blogpost"), Some("2"));
    }
}
