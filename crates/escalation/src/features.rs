// Feature extraction (SPEC_FULL.md §4.5.1), grounded on
// `original_source/escalation/escalation_engine.py::extract_features`.

use aho_corasick::AhoCorasick;
use chrono::{DateTime, Datelike, Timelike, Utc};
use defense_core::robots::RobotsRules;
use defense_core::store::frequency::FrequencyReading;
use defense_core::types::{FeatureVector, RequestMetadata};
use defense_core::uaparse;

/// Known-bad/known-benign UA substring matching, built once per process from
/// the env-configured lists and matched with `aho-corasick` the same way the
/// teacher matches scanner/exploit signatures against a request
/// (`rust-protocol/src/reducers.rs` NoiseDetector/ScannerNoiseFilter) rather
/// than a `.contains` loop over each pattern.
pub struct UaLists {
    bad: AhoCorasick,
    benign: AhoCorasick,
}

impl UaLists {
    pub fn new(known_bad: Vec<String>, known_benign: Vec<String>) -> Self {
        Self {
            bad: AhoCorasick::new(&known_bad).expect("configured known-bad UA patterns are valid"),
            benign: AhoCorasick::new(&known_benign)
                .expect("configured known-benign UA patterns are valid"),
        }
    }

    pub fn is_known_bad(&self, ua_lower: &str) -> bool {
        self.bad.is_match(ua_lower)
    }

    pub fn is_known_benign(&self, ua_lower: &str) -> bool {
        self.benign.is_match(ua_lower)
    }
}

pub fn extract(
    metadata: &RequestMetadata,
    freq: &FrequencyReading,
    robots: &RobotsRules,
    ua_lists: &UaLists,
    frequency_window_seconds: u64,
) -> FeatureVector {
    let mut fv = FeatureVector::default();

    let ua = metadata.user_agent.as_str();
    let ua_lower = ua.to_lowercase();
    let path = if metadata.path.starts_with('/') {
        metadata.path.clone()
    } else {
        format!("/{}", metadata.path)
    };
    let path_lower = path.to_lowercase();
    let referer = metadata.referer.as_str();

    fv.set_numeric("ua_length", ua.chars().count() as f64);
    fv.set_numeric("status_code", metadata.status_code.unwrap_or(0) as f64);
    fv.set_numeric("bytes_sent", metadata.bytes_sent.unwrap_or(0) as f64);
    fv.set_categorical(
        "http_method",
        metadata.http_method.clone().unwrap_or_else(|| "UNKNOWN".to_string()),
    );

    fv.set_numeric("path_depth", path.matches('/').count() as f64);
    fv.set_numeric("path_length", path.chars().count() as f64);
    fv.set_bool("path_is_root", path == "/");
    fv.set_bool("path_has_docs", path_lower.contains("/docs"));
    fv.set_bool(
        "path_is_wp",
        path.contains("/wp-") || path.contains("/xmlrpc.php"),
    );
    fv.set_bool("path_disallowed", robots.is_disallowed(&path));

    let is_known_bad = ua_lists.is_known_bad(&ua_lower);
    let is_known_benign = ua_lists.is_known_benign(&ua_lower);
    fv.set_bool("ua_is_known_bad", is_known_bad);
    fv.set_bool("ua_is_known_benign_crawler", is_known_benign);
    fv.set_bool("ua_is_empty", ua.is_empty());

    let ua_family = uaparse::parse(ua, is_known_bad);
    fv.set_categorical("ua_browser_family", ua_family.browser_family);
    fv.set_categorical("ua_os_family", ua_family.os_family);
    fv.set_categorical("ua_device_family", ua_family.device_family);
    fv.set_bool("ua_is_mobile", ua_family.is_mobile);
    fv.set_bool("ua_is_tablet", ua_family.is_tablet);
    fv.set_bool("ua_is_pc", ua_family.is_pc);
    fv.set_bool("ua_is_touch", ua_family.is_touch);
    fv.set_bool("ua_library_is_bot", ua_family.library_is_bot);

    fv.set_bool("referer_is_empty", referer.is_empty() || referer == "-");
    let referer_has_domain = (!referer.is_empty() && referer != "-")
        .then(|| url::Url::parse(referer).ok())
        .flatten()
        .and_then(|u| u.host_str().map(|h| !h.is_empty()))
        .unwrap_or(false);
    fv.set_bool("referer_has_domain", referer_has_domain);

    let (hour, dow) = timestamp_parts(&metadata.timestamp);
    fv.set_numeric("hour_of_day", hour);
    fv.set_numeric("day_of_week", dow);

    fv.set_numeric(&format!("req_freq_{frequency_window_seconds}s"), freq.count as f64);
    fv.set_numeric("time_since_last_sec", freq.time_since_last_sec);

    fv
}

fn timestamp_parts(timestamp: &str) -> (f64, f64) {
    match DateTime::parse_from_rfc3339(timestamp) {
        Ok(ts) => {
            let utc: DateTime<Utc> = ts.with_timezone(&Utc);
            (utc.hour() as f64, utc.weekday().num_days_from_monday() as f64)
        }
        Err(_) => (-1.0, -1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(ua: &str, path: &str, referer: &str) -> RequestMetadata {
        RequestMetadata {
            timestamp: "2026-01-01T12:30:00Z".to_string(),
            ip: "10.0.0.1".to_string(),
            user_agent: ua.to_string(),
            referer: referer.to_string(),
            path: path.to_string(),
            headers: Default::default(),
            source: "tarpit".to_string(),
            status_code: None,
            bytes_sent: None,
            http_method: Some("GET".to_string()),
        }
    }

    fn ua_lists() -> UaLists {
        UaLists::new(
            vec!["python-requests".to_string()],
            vec!["googlebot".to_string()],
        )
    }

    #[test]
    fn root_path_sets_path_is_root() {
        let robots = RobotsRules::default();
        let freq = FrequencyReading {
            count: 1,
            time_since_last_sec: -1.0,
        };
        let fv = extract(&metadata("", "/", ""), &freq, &robots, &ua_lists(), 300);
        assert_eq!(fv.get_numeric("path_is_root"), Some(1.0));
        assert_eq!(fv.get_numeric("ua_is_empty"), Some(1.0));
        assert_eq!(fv.get_numeric("referer_is_empty"), Some(1.0));
    }

    #[test]
    fn known_bad_and_known_benign_are_independent_flags() {
        let robots = RobotsRules::default();
        let freq = FrequencyReading {
            count: 1,
            time_since_last_sec: -1.0,
        };
        let fv = extract(
            &metadata("python-requests/2.31", "/wp-login.php", ""),
            &freq,
            &robots,
            &ua_lists(),
            300,
        );
        assert_eq!(fv.get_numeric("ua_is_known_bad"), Some(1.0));
        assert_eq!(fv.get_numeric("ua_is_known_benign_crawler"), Some(0.0));
        assert_eq!(fv.get_numeric("path_is_wp"), Some(1.0));
    }

    #[test]
    fn referer_with_domain_is_detected() {
        let robots = RobotsRules::default();
        let freq = FrequencyReading {
            count: 1,
            time_since_last_sec: -1.0,
        };
        let fv = extract(
            &metadata("Mozilla/5.0", "/page", "https://example.com/search"),
            &freq,
            &robots,
            &ua_lists(),
            300,
        );
        assert_eq!(fv.get_numeric("referer_has_domain"), Some(1.0));
    }

    #[test]
    fn malformed_timestamp_yields_sentinel_time_fields() {
        let (hour, dow) = timestamp_parts("not-a-timestamp");
        assert_eq!(hour, -1.0);
        assert_eq!(dow, -1.0);
    }
}
