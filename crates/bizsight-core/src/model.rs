//! Trained revenue model
//!
//! The model is consumed as a read-only JSON artifact produced by an offline
//! training pipeline. Every artifact declares its feature list and the category
//! vocabulary it was trained on. Loading fails with
//! [`Error::ModelUnavailable`] when the file is missing, malformed, or declares a
//! feature list different from [`FEATURE_NAMES`].

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::features::{FeatureVector, FEATURE_NAMES};
use crate::vocabulary::CategoryVocabulary;

/// A pure revenue function over the feature vector
pub trait Regressor: Send + Sync {
    /// Short identifier for logs
    fn kind(&self) -> &'static str;

    /// Predicted revenue for one feature vector
    fn predict(&self, features: &FeatureVector) -> f64;
}

/// Linear regression: `intercept + Σ coefficient_i × feature_i`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl Regressor for LinearModel {
    fn kind(&self) -> &'static str {
        "linear"
    }

    fn predict(&self, features: &FeatureVector) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(features.values())
                .map(|(c, x)| c * x)
                .sum::<f64>()
    }
}

/// A node of a regression tree, stored as a flat array per tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        /// Taken when `value < threshold`
        left: usize,
        right: usize,
    },
    Leaf {
        leaf: f64,
    },
}

/// Additive ensemble of regression trees (gradient-boosted style)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    #[serde(default)]
    pub base_score: f64,
    pub trees: Vec<Vec<TreeNode>>,
}

impl TreeEnsemble {
    /// Check every split references a real feature and child node, and that
    /// children point forward so evaluation always terminates
    fn validate(&self, n_features: usize) -> Result<()> {
        for (t, tree) in self.trees.iter().enumerate() {
            if tree.is_empty() {
                return Err(Error::ModelUnavailable(format!("tree {} is empty", t)));
            }
            for (i, node) in tree.iter().enumerate() {
                if let TreeNode::Split {
                    feature,
                    left,
                    right,
                    threshold,
                } = node
                {
                    if *feature >= n_features {
                        return Err(Error::ModelUnavailable(format!(
                            "tree {} node {} splits on feature {} of {}",
                            t, i, feature, n_features
                        )));
                    }
                    if !threshold.is_finite() {
                        return Err(Error::ModelUnavailable(format!(
                            "tree {} node {} has a non-finite threshold",
                            t, i
                        )));
                    }
                    for child in [left, right] {
                        if *child <= i || *child >= tree.len() {
                            return Err(Error::ModelUnavailable(format!(
                                "tree {} node {} has invalid child {}",
                                t, i, child
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn eval_tree(tree: &[TreeNode], values: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &tree[idx] {
                TreeNode::Leaf { leaf } => return *leaf,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if values[*feature] < *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

impl Regressor for TreeEnsemble {
    fn kind(&self) -> &'static str {
        "tree_ensemble"
    }

    fn predict(&self, features: &FeatureVector) -> f64 {
        let values = features.values();
        self.base_score
            + self
                .trees
                .iter()
                .map(|tree| Self::eval_tree(tree, values))
                .sum::<f64>()
    }
}

/// Model parameters, tagged by `kind` in the artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    Linear(LinearModel),
    TreeEnsemble(TreeEnsemble),
}

/// The on-disk model artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub feature_names: Vec<String>,
    pub vocabulary: CategoryVocabulary,
    #[serde(flatten)]
    pub model: ModelSpec,
}

/// A validated, ready-to-serve model and its trained encoders
#[derive(Clone)]
pub struct LoadedModel {
    pub regressor: Arc<dyn Regressor>,
    pub vocabulary: CategoryVocabulary,
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModel")
            .field("kind", &self.regressor.kind())
            .field("vocabulary", &self.vocabulary)
            .finish()
    }
}

impl ModelArtifact {
    /// Read and validate an artifact file
    pub fn load(path: &Path) -> Result<LoadedModel> {
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::ModelUnavailable(format!("cannot read {}: {}", path.display(), e))
        })?;
        let artifact = Self::from_json(&contents)
            .map_err(|e| Error::ModelUnavailable(format!("{}: {}", path.display(), e)))?;
        let model = artifact.into_model()?;
        info!(
            path = %path.display(),
            kind = model.regressor.kind(),
            products = model.vocabulary.products().len(),
            locations = model.vocabulary.locations().len(),
            "Loaded model artifact"
        );
        Ok(model)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::ModelUnavailable(format!("corrupt artifact: {}", e)))
    }

    /// Validate the artifact against the feature contract
    pub fn into_model(self) -> Result<LoadedModel> {
        if self.feature_names.len() != FEATURE_NAMES.len()
            || self
                .feature_names
                .iter()
                .zip(FEATURE_NAMES.iter())
                .any(|(a, b)| a != b)
        {
            let first_mismatch = self
                .feature_names
                .iter()
                .zip(FEATURE_NAMES.iter())
                .position(|(a, b)| a != b)
                .unwrap_or_else(|| self.feature_names.len().min(FEATURE_NAMES.len()));
            return Err(Error::ModelUnavailable(format!(
                "feature contract mismatch at position {} (artifact has {} features, engine builds {})",
                first_mismatch,
                self.feature_names.len(),
                FEATURE_NAMES.len()
            )));
        }

        if self.vocabulary.is_empty() {
            return Err(Error::ModelUnavailable(
                "artifact vocabulary has no locations or products".to_string(),
            ));
        }

        let regressor: Arc<dyn Regressor> = match self.model {
            ModelSpec::Linear(linear) => {
                if linear.coefficients.len() != FEATURE_NAMES.len() {
                    return Err(Error::ModelUnavailable(format!(
                        "linear model has {} coefficients for {} features",
                        linear.coefficients.len(),
                        FEATURE_NAMES.len()
                    )));
                }
                if !linear.intercept.is_finite() || linear.coefficients.iter().any(|c| !c.is_finite()) {
                    return Err(Error::ModelUnavailable(
                        "linear model has non-finite parameters".to_string(),
                    ));
                }
                Arc::new(linear)
            }
            ModelSpec::TreeEnsemble(ensemble) => {
                ensemble.validate(FEATURE_NAMES.len())?;
                Arc::new(ensemble)
            }
        };

        Ok(LoadedModel {
            regressor,
            vocabulary: self.vocabulary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn feature_names_json() -> String {
        serde_json::to_string(&FEATURE_NAMES.to_vec()).unwrap()
    }

    fn linear_json(coefficients: usize) -> String {
        let coefs = vec![0.0; coefficients];
        format!(
            r#"{{"kind": "linear", "feature_names": {}, "intercept": 42.0,
                "coefficients": {}, "vocabulary": {{"locations": ["North"], "products": ["12"]}}}}"#,
            feature_names_json(),
            serde_json::to_string(&coefs).unwrap()
        )
    }

    #[test]
    fn test_load_linear_artifact() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(linear_json(FEATURE_NAMES.len()).as_bytes())
            .unwrap();

        let model = ModelArtifact::load(file.path()).unwrap();
        assert_eq!(model.regressor.kind(), "linear");
        assert_eq!(model.vocabulary.locations(), &["North".to_string()]);
    }

    #[test]
    fn test_missing_file_is_model_unavailable() {
        let err = ModelArtifact::load(Path::new("/nonexistent/model.json")).unwrap_err();
        assert!(matches!(err, Error::ModelUnavailable(_)));
    }

    #[test]
    fn test_corrupt_artifact_is_model_unavailable() {
        let err = ModelArtifact::from_json("{not json").unwrap_err();
        assert!(matches!(err, Error::ModelUnavailable(_)));
    }

    #[test]
    fn test_coefficient_count_mismatch_is_refused() {
        let artifact = ModelArtifact::from_json(&linear_json(3)).unwrap();
        assert!(matches!(
            artifact.into_model(),
            Err(Error::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_feature_contract_mismatch_is_refused() {
        let mut names: Vec<String> = FEATURE_NAMES.iter().map(|s| s.to_string()).collect();
        names.swap(0, 1);
        let artifact = ModelArtifact {
            feature_names: names,
            vocabulary: CategoryVocabulary::new(vec!["N".into()], vec!["P".into()]),
            model: ModelSpec::Linear(LinearModel {
                intercept: 0.0,
                coefficients: vec![0.0; FEATURE_NAMES.len()],
            }),
        };
        match artifact.into_model() {
            Err(Error::ModelUnavailable(msg)) => assert!(msg.contains("position 0")),
            other => panic!("expected ModelUnavailable, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_tree_ensemble_evaluates_splits() {
        // unit_price (feature 0) < 50 => 10, else 20; plus base 5
        let json = format!(
            r#"{{"kind": "tree_ensemble", "feature_names": {}, "base_score": 5.0,
                "trees": [[{{"feature": 0, "threshold": 50.0, "left": 1, "right": 2}},
                           {{"leaf": 10.0}}, {{"leaf": 20.0}}]],
                "vocabulary": {{"locations": ["North"], "products": ["12"]}}}}"#,
            feature_names_json()
        );
        let model = ModelArtifact::from_json(&json).unwrap().into_model().unwrap();

        let reference = crate::reference::ReferenceStats::default();
        let mut record = crate::models::TransactionRecord::new(
            "12",
            "North",
            40.0,
            10.0,
            chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        );
        let low = crate::features::build_features(&record, &reference, &model.vocabulary).unwrap();
        assert_eq!(model.regressor.predict(&low), 15.0);

        record.unit_price = Some(60.0);
        let high = crate::features::build_features(&record, &reference, &model.vocabulary).unwrap();
        assert_eq!(model.regressor.predict(&high), 25.0);
    }

    #[test]
    fn test_tree_with_backward_child_is_refused() {
        let ensemble = TreeEnsemble {
            base_score: 0.0,
            trees: vec![vec![
                TreeNode::Split {
                    feature: 0,
                    threshold: 1.0,
                    left: 0,
                    right: 1,
                },
                TreeNode::Leaf { leaf: 1.0 },
            ]],
        };
        assert!(ensemble.validate(FEATURE_NAMES.len()).is_err());
    }
}
