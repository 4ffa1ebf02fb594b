// Stand-in for `original_source/escalation/escalation_engine.py`'s joblib
// Random Forest classifier. No crate in this pack loads sklearn/joblib
// artifacts, so the pre-trained model is instead a JSON file of logistic
// weights (one entry per named feature plus a bias), scored as
// `sigmoid(bias + sum(weight_i * feature_i))`. Loaded once at startup from
// `model_weights_path`; if the file is absent, `None` is carried throughout
// (SPEC_FULL §4.5 step 4: "if loaded, else absent").

use defense_core::error::DefenseError;
use defense_core::types::FeatureVector;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct ModelWeightsFile {
    bias: f64,
    weights: HashMap<String, f64>,
}

pub struct BotScoreModel {
    bias: f64,
    weights: HashMap<String, f64>,
}

impl BotScoreModel {
    pub fn load(path: &Path) -> Result<Self, DefenseError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DefenseError::Configuration(format!("reading model weights {path:?}: {e}"))
        })?;
        let parsed: ModelWeightsFile = serde_json::from_str(&raw).map_err(|e| {
            DefenseError::Configuration(format!("parsing model weights {path:?}: {e}"))
        })?;
        Ok(Self {
            bias: parsed.bias,
            weights: parsed.weights,
        })
    }

    /// Score in `[0,1]`. Only numeric features named in `weights` contribute;
    /// categorical features are not consumed directly (as in the original's
    /// RF, which was trained over the numeric/boolean feature matrix).
    pub fn score(&self, fv: &FeatureVector) -> f64 {
        let logit = self.weights.iter().fold(self.bias, |acc, (name, weight)| {
            acc + weight * fv.get_numeric(name).unwrap_or(0.0)
        });
        sigmoid(logit)
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(bias: f64, weights: &[(&str, f64)]) -> BotScoreModel {
        BotScoreModel {
            bias,
            weights: weights.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }

    #[test]
    fn zero_weights_and_bias_score_as_half() {
        let m = model(0.0, &[]);
        let fv = FeatureVector::default();
        assert!((m.score(&fv) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn positive_weight_on_present_feature_increases_score() {
        let m = model(0.0, &[("ua_is_empty", 4.0)]);
        let mut fv = FeatureVector::default();
        fv.set_bool("ua_is_empty", true);
        assert!(m.score(&fv) > 0.9);
    }

    #[test]
    fn missing_feature_is_treated_as_zero() {
        let m = model(0.0, &[("nonexistent_feature", 10.0)]);
        let fv = FeatureVector::default();
        assert!((m.score(&fv) - 0.5).abs() < 1e-9);
    }
}
