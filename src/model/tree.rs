use anyhow::{bail, Error, Result};
use serde::{Deserialize, Deserializer};

use crate::error::PredictionError;

use super::shap::{self, RowAttribution, ShapTree};
use super::{ModelKind, Regressor};

const TREE_LEAF: i64 = -1;

/// Single regression tree exported from scikit-learn's `tree_` arrays.
///
/// Node `i` is a leaf when `children_left[i] == -1`; otherwise a row goes
/// left when `x[feature[i]] <= threshold[i]`. Children are stored after
/// their parent, which validation enforces so traversal always terminates.
/// Per-node sample counts, when exported, enable per-row attributions.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "TreeFile")]
pub struct DecisionTree {
    n_features: usize,
    feature_names: Option<Vec<String>>,
    children_left: Vec<i64>,
    children_right: Vec<i64>,
    feature: Vec<i64>,
    threshold: Vec<f64>,
    value: Vec<f64>,
    cover: Option<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
struct TreeFile {
    #[serde(default)]
    n_features: Option<usize>,
    #[serde(default)]
    feature_names: Option<Vec<String>>,
    children_left: Vec<i64>,
    children_right: Vec<i64>,
    feature: Vec<i64>,
    threshold: Vec<f64>,
    #[serde(deserialize_with = "leaf_values")]
    value: Vec<f64>,
    #[serde(default)]
    weighted_n_node_samples: Option<Vec<f64>>,
    #[serde(default)]
    n_node_samples: Option<Vec<f64>>,
}

/// `value` is `(n_nodes, n_outputs, 1)` in scikit-learn; a flat list is
/// accepted too. Only the first output is used.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NodeValue {
    Scalar(f64),
    Nested(Vec<NodeValue>),
}

impl NodeValue {
    fn first(&self) -> Option<f64> {
        match self {
            NodeValue::Scalar(v) => Some(*v),
            NodeValue::Nested(values) => values.first().and_then(NodeValue::first),
        }
    }
}

fn leaf_values<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
    let raw = Vec::<NodeValue>::deserialize(deserializer)?;
    raw.iter()
        .enumerate()
        .map(|(i, v)| {
            v.first()
                .ok_or_else(|| serde::de::Error::custom(format!("node {i} has an empty value")))
        })
        .collect()
}

impl TryFrom<TreeFile> for DecisionTree {
    type Error = Error;

    fn try_from(file: TreeFile) -> Result<Self> {
        let n_features = match (file.n_features, &file.feature_names) {
            (Some(n), Some(names)) if n != names.len() => {
                bail!("n_features is {n} but {} feature names are listed", names.len())
            }
            (Some(n), _) => n,
            (None, Some(names)) => names.len(),
            (None, None) => bail!("tree export carries neither n_features nor feature_names"),
        };

        let tree = DecisionTree {
            n_features,
            feature_names: file.feature_names,
            children_left: file.children_left,
            children_right: file.children_right,
            feature: file.feature,
            threshold: file.threshold,
            value: file.value,
            cover: None,
        };
        tree.validate()?;
        let cover = file.weighted_n_node_samples.or(file.n_node_samples);
        Ok(DecisionTree {
            cover: shap::checked_cover(cover, tree.n_nodes()),
            ..tree
        })
    }
}

impl DecisionTree {
    pub fn n_nodes(&self) -> usize {
        self.children_left.len()
    }

    fn validate(&self) -> Result<()> {
        let n = self.n_nodes();
        if n == 0 {
            bail!("tree has no nodes");
        }
        for (name, len) in [
            ("children_right", self.children_right.len()),
            ("feature", self.feature.len()),
            ("threshold", self.threshold.len()),
            ("value", self.value.len()),
        ] {
            if len != n {
                bail!("{name} has {len} entries, expected {n}");
            }
        }

        for node in 0..n {
            let (left, right) = (self.children_left[node], self.children_right[node]);
            if left == TREE_LEAF {
                if right != TREE_LEAF {
                    bail!("node {node} has a right child but no left child");
                }
                if !self.value[node].is_finite() {
                    bail!("leaf {node} has a non-finite value");
                }
                continue;
            }
            for child in [left, right] {
                if child <= node as i64 || child >= n as i64 {
                    bail!("node {node} points to invalid child {child}");
                }
            }
            let feature = self.feature[node];
            if feature < 0 || feature as usize >= self.n_features {
                bail!("node {node} splits on feature {feature}, model has {}", self.n_features);
            }
            if self.threshold[node].is_nan() {
                bail!("node {node} has a NaN threshold");
            }
        }
        Ok(())
    }
}

impl Regressor for DecisionTree {
    fn kind(&self) -> ModelKind {
        ModelKind::DecisionTree
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn predict_row(&self, features: &[f64]) -> Result<f64, PredictionError> {
        let mut node = 0usize;
        loop {
            let left = self.children_left[node];
            if left == TREE_LEAF {
                return Ok(self.value[node]);
            }
            let feature = self.feature[node] as usize;
            let x = features.get(feature).copied().ok_or_else(|| {
                PredictionError::inference(format!("node {node} reads missing feature {feature}"))
            })?;
            node = if x <= self.threshold[node] {
                left as usize
            } else {
                self.children_right[node] as usize
            };
        }
    }

    fn explain_row(&self, features: &[f64]) -> Result<RowAttribution, PredictionError> {
        let cover = self.cover.as_deref().ok_or_else(|| {
            PredictionError::Unexplainable("tree export has no node sample counts".to_string())
        })?;
        let tree = CoveredTree { tree: self, cover };
        let mut contributions = vec![0.0; self.n_features];
        shap::tree_shap(&tree, features, &mut contributions);
        Ok(RowAttribution {
            expected_value: shap::expected_value(&tree, 0),
            contributions,
            log_scale: false,
        })
    }
}

struct CoveredTree<'a> {
    tree: &'a DecisionTree,
    cover: &'a [f64],
}

impl ShapTree for CoveredTree<'_> {
    fn children(&self, node: usize) -> Option<(usize, usize)> {
        match self.tree.children_left[node] {
            TREE_LEAF => None,
            left => Some((left as usize, self.tree.children_right[node] as usize)),
        }
    }

    fn split_feature(&self, node: usize) -> usize {
        self.tree.feature[node] as usize
    }

    fn goes_left(&self, node: usize, x: f64) -> bool {
        x <= self.tree.threshold[node]
    }

    fn leaf_value(&self, node: usize) -> f64 {
        self.tree.value[node]
    }

    fn cover(&self, node: usize) -> f64 {
        self.cover[node]
    }
}
