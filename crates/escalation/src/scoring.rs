// Rule score and score-combination (SPEC_FULL.md §4.5.2), grounded on
// `original_source/escalation/escalation_engine.py::run_heuristic_and_model_analysis`.

use defense_core::types::FeatureVector;

/// Rule score in `[0,1]`, built from explicit predicates over the feature vector.
pub fn rule_score(fv: &FeatureVector, frequency_window_seconds: u64) -> f64 {
    let is_known_bad = fv.get_numeric("ua_is_known_bad").unwrap_or(0.0) != 0.0;
    let is_known_benign = fv.get_numeric("ua_is_known_benign_crawler").unwrap_or(0.0) != 0.0;
    let is_empty_ua = fv.get_numeric("ua_is_empty").unwrap_or(0.0) != 0.0;
    let path_disallowed = fv.get_numeric("path_disallowed").unwrap_or(0.0) != 0.0;
    let freq = fv
        .get_numeric(&format!("req_freq_{frequency_window_seconds}s"))
        .unwrap_or(0.0);
    let time_since_last = fv.get_numeric("time_since_last_sec").unwrap_or(-1.0);

    let mut score = 0.0;

    if is_known_bad && !is_known_benign {
        score += 0.7;
    }
    if is_empty_ua {
        score += 0.5;
    }
    if path_disallowed && !is_known_benign {
        score += 0.6;
    }
    if freq > 60.0 {
        score += 0.3;
    } else if freq > 30.0 {
        score += 0.1;
    }
    if (0.0..0.3).contains(&time_since_last) {
        score += 0.2;
    }
    if is_known_benign {
        score -= 0.5;
    }

    score.clamp(0.0, 1.0)
}

/// Combines rule and (optional) model scores, then applies the IP-reputation
/// bonus, per SPEC_FULL.md step 5: `F = 0.3*rule + 0.7*model` when a model
/// score is present, else `F = rule`; reputation-malicious adds `bonus` and
/// re-clamps.
pub fn combine(
    rule: f64,
    model: Option<f64>,
    reputation_malicious: bool,
    reputation_bonus: f64,
) -> f64 {
    let mut combined = match model {
        Some(model_score) => 0.3 * rule + 0.7 * model_score,
        None => rule,
    };
    if reputation_malicious {
        combined = (combined + reputation_bonus).clamp(0.0, 1.0);
    }
    combined.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fv_with(entries: &[(&str, f64)]) -> FeatureVector {
        let mut fv = FeatureVector::default();
        for (k, v) in entries {
            fv.set_numeric(k, *v);
        }
        fv
    }

    #[test]
    fn known_bad_and_empty_ua_and_disallowed_path_sum_and_clamp() {
        let fv = fv_with(&[
            ("ua_is_known_bad", 1.0),
            ("ua_is_known_benign_crawler", 0.0),
            ("ua_is_empty", 1.0),
            ("path_disallowed", 1.0),
            ("req_freq_300s", 0.0),
            ("time_since_last_sec", -1.0),
        ]);
        // 0.7 + 0.5 + 0.6 = 1.8, clamped to 1.0
        assert_eq!(rule_score(&fv, 300), 1.0);
    }

    #[test]
    fn known_benign_suppresses_bad_ua_and_path_contributions() {
        let fv = fv_with(&[
            ("ua_is_known_bad", 1.0),
            ("ua_is_known_benign_crawler", 1.0),
            ("ua_is_empty", 0.0),
            ("path_disallowed", 1.0),
            ("req_freq_300s", 0.0),
            ("time_since_last_sec", -1.0),
        ]);
        // neither +0.7 nor +0.6 apply (known-benign), then -0.5, clamped to 0
        assert_eq!(rule_score(&fv, 300), 0.0);
    }

    #[test]
    fn high_frequency_and_rapid_repeat_add_up() {
        let fv = fv_with(&[
            ("ua_is_known_bad", 0.0),
            ("ua_is_known_benign_crawler", 0.0),
            ("ua_is_empty", 0.0),
            ("path_disallowed", 0.0),
            ("req_freq_300s", 75.0),
            ("time_since_last_sec", 0.1),
        ]);
        assert_eq!(rule_score(&fv, 300), 0.5);
    }

    #[test]
    fn moderate_frequency_adds_smaller_bump() {
        let fv = fv_with(&[
            ("ua_is_known_bad", 0.0),
            ("ua_is_known_benign_crawler", 0.0),
            ("ua_is_empty", 0.0),
            ("path_disallowed", 0.0),
            ("req_freq_300s", 45.0),
            ("time_since_last_sec", -1.0),
        ]);
        assert_eq!(rule_score(&fv, 300), 0.1);
    }

    #[test]
    fn combine_without_model_is_rule_alone() {
        assert_eq!(combine(0.4, None, false, 0.3), 0.4);
    }

    #[test]
    fn combine_with_model_weights_thirty_seventy() {
        let f = combine(1.0, Some(0.0), false, 0.3);
        assert!((f - 0.3).abs() < 1e-9);
    }

    #[test]
    fn reputation_bonus_is_additive_and_clamped() {
        let f = combine(0.9, None, true, 0.3);
        assert_eq!(f, 1.0);
    }
}
