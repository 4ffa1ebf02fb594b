// Lightweight user-agent family parser for the Escalation Engine's feature
// vector (SPEC_FULL.md §4.5.1: `ua_browser_family`, `ua_os_family`,
// `ua_device_family`, `ua_is_mobile/tablet/pc/touch`, `ua_library_is_bot`).
//
// `original_source/escalation/escalation_engine.py` reaches for the optional
// `user_agents` Python library and falls back to a handful of fixed fields
// (`'Unknown'`/`'Other'`, `ua_library_is_bot = ua_is_known_bad`) when it isn't
// installed. No example repo in this pack pulls in a UA-parsing crate, so
// rather than fabricate a dependency on one, this reproduces that same
// fixed-field fallback as the *only* path, via `regex` (already a teacher
// dependency, see `noise.rs`) over the handful of substrings the fallback
// actually needs to recognise.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UaFamily {
    pub browser_family: String,
    pub os_family: String,
    pub device_family: String,
    pub is_mobile: bool,
    pub is_tablet: bool,
    pub is_pc: bool,
    pub is_touch: bool,
    pub library_is_bot: bool,
}

struct Patterns {
    bot: Regex,
    tablet: Regex,
    mobile: Regex,
    browsers: Vec<(&'static str, Regex)>,
    os: Vec<(&'static str, Regex)>,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        bot: Regex::new(r"(?i)bot|crawl|spider|slurp|scrape").expect("static bot pattern is valid"),
        tablet: Regex::new(r"(?i)ipad|tablet|kindle").expect("static tablet pattern is valid"),
        mobile: Regex::new(r"(?i)mobile|iphone|android(?!.*tablet)")
            .expect("static mobile pattern is valid"),
        browsers: vec![
            ("Edge", Regex::new(r"(?i)edg/").unwrap()),
            ("Chrome", Regex::new(r"(?i)chrome/").unwrap()),
            ("Firefox", Regex::new(r"(?i)firefox/").unwrap()),
            ("Safari", Regex::new(r"(?i)version/.*safari/").unwrap()),
        ],
        os: vec![
            ("Windows", Regex::new(r"(?i)windows nt").unwrap()),
            ("iOS", Regex::new(r"(?i)iphone os|cpu os").unwrap()),
            ("Mac OS X", Regex::new(r"(?i)mac os x").unwrap()),
            ("Android", Regex::new(r"(?i)android").unwrap()),
            ("Linux", Regex::new(r"(?i)linux").unwrap()),
        ],
    })
}

/// Parses `ua` into family fields, matching
/// `escalation_engine.py::extract_features`'s no-`user_agents`-library
/// fallback: unparseable/empty input yields `"Unknown"`/`"Other"` and
/// `library_is_bot` defaults to whatever the caller's known-bad check found.
pub fn parse(ua: &str, known_bad: bool) -> UaFamily {
    if ua.is_empty() {
        return UaFamily {
            browser_family: "Unknown".to_string(),
            os_family: "Unknown".to_string(),
            device_family: "Unknown".to_string(),
            is_mobile: false,
            is_tablet: false,
            is_pc: false,
            is_touch: false,
            library_is_bot: known_bad,
        };
    }

    let p = patterns();
    let is_bot = p.bot.is_match(ua);
    let is_tablet = p.tablet.is_match(ua);
    let is_mobile = !is_tablet && p.mobile.is_match(ua);
    let is_pc = !is_mobile && !is_tablet && !is_bot;

    let browser_family = p
        .browsers
        .iter()
        .find(|(_, re)| re.is_match(ua))
        .map(|(name, _)| name.to_string())
        .unwrap_or_else(|| "Other".to_string());

    let os_family = p
        .os
        .iter()
        .find(|(_, re)| re.is_match(ua))
        .map(|(name, _)| name.to_string())
        .unwrap_or_else(|| "Other".to_string());

    let device_family = if is_tablet {
        "Tablet".to_string()
    } else if is_mobile {
        "Mobile".to_string()
    } else {
        "Other".to_string()
    };

    UaFamily {
        browser_family,
        os_family,
        device_family,
        is_mobile,
        is_tablet,
        is_pc,
        is_touch: is_mobile || is_tablet,
        library_is_bot: is_bot || known_bad,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ua_falls_back_to_unknown_fields() {
        let f = parse("", false);
        assert_eq!(f.browser_family, "Unknown");
        assert_eq!(f.os_family, "Unknown");
        assert!(!f.library_is_bot);
    }

    #[test]
    fn parses_common_desktop_browser() {
        let f = parse(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36",
            false,
        );
        assert_eq!(f.browser_family, "Chrome");
        assert_eq!(f.os_family, "Windows");
        assert!(f.is_pc);
        assert!(!f.is_mobile);
        assert!(!f.library_is_bot);
    }

    #[test]
    fn parses_mobile_device() {
        let f = parse(
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 Mobile/15E148",
            false,
        );
        assert_eq!(f.os_family, "iOS");
        assert!(f.is_mobile);
        assert!(f.is_touch);
        assert!(!f.is_pc);
    }

    #[test]
    fn bot_substring_sets_library_is_bot_regardless_of_known_bad() {
        let f = parse("Mozilla/5.0 (compatible; SomeCrawler/1.0)", false);
        assert!(f.library_is_bot);
        assert!(!f.is_pc);
    }

    #[test]
    fn known_bad_propagates_when_no_bot_substring_present() {
        let f = parse("python-requests/2.31", true);
        assert!(f.library_is_bot);
    }
}
