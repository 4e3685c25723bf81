use crate::core::features::{FeatureSchema, FeatureVector};
use crate::core::model::{check_features, CompatibilityModel, ModelError, ModelOutput};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while loading a model artifact
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Failed to read model artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid model artifact JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported feature schema version: {0}")]
    UnsupportedSchema(u32),

    #[error("Feature names do not match schema v{version}: {detail}")]
    FeatureMismatch { version: u32, detail: String },

    #[error("Invalid model artifact: {0}")]
    Invalid(String),
}

/// On-disk model artifact
///
/// Every artifact declares the feature schema version and the feature names
/// it was trained on. Both are checked against the encoder before the model
/// is accepted.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    /// Logistic regression; emits class probabilities
    Logistic(LinearSpec),
    /// Linear regression; emits a raw value
    Linear(LinearSpec),
    /// Gradient-boosted decision trees
    TreeEnsemble(TreeEnsembleSpec),
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinearSpec {
    pub schema_version: u32,
    pub feature_names: Vec<String>,
    pub weights: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Objective {
    #[serde(rename = "binary:logistic")]
    BinaryLogistic,
    #[serde(rename = "reg:squarederror")]
    Regression,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TreeEnsembleSpec {
    pub schema_version: u32,
    pub feature_names: Vec<String>,
    pub objective: Objective,
    /// Margin added before the trees' contributions
    #[serde(default)]
    pub base_margin: f64,
    pub trees: Vec<TreeSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TreeSpec {
    pub nodes: Vec<NodeSpec>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum NodeSpec {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        #[serde(default)]
        default_left: bool,
    },
    Leaf {
        leaf: f64,
    },
}

impl ModelArtifact {
    /// Parse an artifact from JSON text
    pub fn from_json(json: &str) -> Result<Self, ArtifactError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Validate the artifact and build a shareable model
    pub fn into_model(self) -> Result<Arc<dyn CompatibilityModel>, ArtifactError> {
        match self {
            ModelArtifact::Logistic(spec) => Ok(Arc::new(LinearModel::from_spec(spec, Link::Logistic)?)),
            ModelArtifact::Linear(spec) => Ok(Arc::new(LinearModel::from_spec(spec, Link::Identity)?)),
            ModelArtifact::TreeEnsemble(spec) => Ok(Arc::new(TreeEnsemble::from_spec(spec)?)),
        }
    }
}

/// Load and validate a model artifact from disk
pub async fn load_model<P: AsRef<Path>>(path: P) -> Result<Arc<dyn CompatibilityModel>, ArtifactError> {
    let json = tokio::fs::read_to_string(path.as_ref()).await?;
    ModelArtifact::from_json(&json)?.into_model()
}

/// Resolve a declared schema and confirm the artifact's feature names
fn resolve_schema(version: u32, names: &[String]) -> Result<FeatureSchema, ArtifactError> {
    let schema = FeatureSchema::from_version(version).ok_or(ArtifactError::UnsupportedSchema(version))?;
    let expected = schema.feature_names();

    if names.len() != expected.len() {
        return Err(ArtifactError::FeatureMismatch {
            version,
            detail: format!("expected {} features, artifact lists {}", expected.len(), names.len()),
        });
    }

    if let Some((idx, (got, want))) = names
        .iter()
        .zip(expected.iter())
        .enumerate()
        .find(|(_, (got, want))| got.as_str() != **want)
    {
        return Err(ArtifactError::FeatureMismatch {
            version,
            detail: format!("position {} is '{}', expected '{}'", idx, got, want),
        });
    }

    Ok(schema)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Logistic,
    Identity,
}

/// Linear or logistic regression over encoded features
#[derive(Debug, Clone)]
pub struct LinearModel {
    schema: FeatureSchema,
    weights: Vec<f64>,
    intercept: f64,
    link: Link,
}

impl LinearModel {
    fn from_spec(spec: LinearSpec, link: Link) -> Result<Self, ArtifactError> {
        let schema = resolve_schema(spec.schema_version, &spec.feature_names)?;
        if spec.weights.len() != schema.width() {
            return Err(ArtifactError::Invalid(format!(
                "expected {} weights, found {}",
                schema.width(),
                spec.weights.len()
            )));
        }

        Ok(Self {
            schema,
            weights: spec.weights,
            intercept: spec.intercept,
            link,
        })
    }
}

impl CompatibilityModel for LinearModel {
    fn schema(&self) -> FeatureSchema {
        self.schema
    }

    fn predict(&self, features: &FeatureVector) -> Result<ModelOutput, ModelError> {
        check_features(self.schema, features)?;

        let z = self.intercept
            + self
                .weights
                .iter()
                .zip(features.values())
                .map(|(w, x)| w * x)
                .sum::<f64>();

        Ok(match self.link {
            Link::Logistic => {
                let p = sigmoid(z);
                ModelOutput::Probabilities(vec![1.0 - p, p])
            }
            Link::Identity => ModelOutput::Raw(z),
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        default_left: bool,
    },
    Leaf(f64),
}

/// Gradient-boosted tree ensemble
///
/// A sample goes left when `x < threshold`; missing (NaN) values follow
/// `default_left`.
#[derive(Debug, Clone)]
pub struct TreeEnsemble {
    schema: FeatureSchema,
    objective: Objective,
    base_margin: f64,
    trees: Vec<Vec<Node>>,
}

impl TreeEnsemble {
    fn from_spec(spec: TreeEnsembleSpec) -> Result<Self, ArtifactError> {
        let schema = resolve_schema(spec.schema_version, &spec.feature_names)?;
        if spec.trees.is_empty() {
            return Err(ArtifactError::Invalid("tree ensemble has no trees".to_string()));
        }

        let trees = spec
            .trees
            .iter()
            .enumerate()
            .map(|(t, tree)| build_tree(t, tree, schema.width()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            schema,
            objective: spec.objective,
            base_margin: spec.base_margin,
            trees,
        })
    }

    fn tree_value(&self, tree: &[Node], features: &[f64]) -> Result<f64, ModelError> {
        let mut idx = 0;
        // Children always point forward, so a walk visits each node at most once
        for _ in 0..tree.len() {
            match tree.get(idx) {
                Some(Node::Leaf(value)) => return Ok(*value),
                Some(Node::Split { feature, threshold, left, right, default_left }) => {
                    let x = *features.get(*feature).ok_or_else(|| {
                        ModelError::Evaluation(format!("split on missing feature {}", feature))
                    })?;
                    idx = if x.is_nan() {
                        if *default_left { *left } else { *right }
                    } else if x < *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                None => {
                    return Err(ModelError::Evaluation(format!("node {} out of range", idx)));
                }
            }
        }
        Err(ModelError::Evaluation("tree walk did not reach a leaf".to_string()))
    }
}

fn build_tree(t: usize, tree: &TreeSpec, width: usize) -> Result<Vec<Node>, ArtifactError> {
    if tree.nodes.is_empty() {
        return Err(ArtifactError::Invalid(format!("tree {} has no nodes", t)));
    }

    tree.nodes
        .iter()
        .enumerate()
        .map(|(i, node)| match *node {
            NodeSpec::Leaf { leaf } => Ok(Node::Leaf(leaf)),
            NodeSpec::Split { feature, threshold, left, right, default_left } => {
                if feature >= width {
                    return Err(ArtifactError::Invalid(format!(
                        "tree {} node {} splits on feature {} of {}",
                        t, i, feature, width
                    )));
                }
                for child in [left, right] {
                    if child <= i || child >= tree.nodes.len() {
                        return Err(ArtifactError::Invalid(format!(
                            "tree {} node {} has invalid child {}",
                            t, i, child
                        )));
                    }
                }
                Ok(Node::Split { feature, threshold, left, right, default_left })
            }
        })
        .collect()
}

impl CompatibilityModel for TreeEnsemble {
    fn schema(&self) -> FeatureSchema {
        self.schema
    }

    fn predict(&self, features: &FeatureVector) -> Result<ModelOutput, ModelError> {
        check_features(self.schema, features)?;

        let mut margin = self.base_margin;
        for tree in &self.trees {
            margin += self.tree_value(tree, features.values())?;
        }

        Ok(match self.objective {
            Objective::BinaryLogistic => {
                let p = sigmoid(margin);
                ModelOutput::Probabilities(vec![1.0 - p, p])
            }
            Objective::Regression => ModelOutput::Raw(margin),
        })
    }
}

#[inline]
fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}
