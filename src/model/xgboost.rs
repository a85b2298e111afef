use anyhow::{bail, Context, Error, Result};
use serde::Deserialize;

use crate::error::PredictionError;

use super::shap::{self, RowAttribution, ShapTree};
use super::{ModelKind, Regressor};

/// Gradient-boosted trees loaded from XGBoost's native JSON model format.
///
/// Only `gbtree` boosters with numerical splits and a single target are
/// supported. The prediction is `link(base_margin + Σ leaf)`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "XgbFile")]
pub struct XgbModel {
    n_features: usize,
    feature_names: Option<Vec<String>>,
    objective: String,
    link: Link,
    base_margin: f64,
    trees: Vec<BoostedTree>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Identity,
    Exp,
}

impl Link {
    fn for_objective(name: &str) -> Result<Self> {
        match name {
            "reg:squarederror" | "reg:linear" | "reg:squaredlogerror" | "reg:pseudohubererror"
            | "reg:absoluteerror" | "reg:quantileerror" => Ok(Link::Identity),
            "reg:gamma" | "reg:tweedie" | "count:poisson" => Ok(Link::Exp),
            other => bail!("unsupported objective '{other}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct BoostedTree {
    left: Vec<i64>,
    right: Vec<i64>,
    split_index: Vec<usize>,
    split_condition: Vec<f32>,
    default_left: Vec<bool>,
    /// `sum_hessian` per node, needed for attributions.
    cover: Option<Vec<f64>>,
}

impl BoostedTree {
    fn goes_left(&self, node: usize, x: f64) -> bool {
        if x.is_nan() {
            self.default_left[node]
        } else {
            (x as f32) < self.split_condition[node]
        }
    }

    fn leaf(&self, features: &[f64]) -> Result<f64, PredictionError> {
        let mut node = 0usize;
        loop {
            let left = self.left[node];
            if left == -1 {
                return Ok(f64::from(self.split_condition[node]));
            }
            let index = self.split_index[node];
            let x = features.get(index).copied().ok_or_else(|| {
                PredictionError::inference(format!("node {node} reads missing feature {index}"))
            })?;
            node = if self.goes_left(node, x) {
                left as usize
            } else {
                self.right[node] as usize
            };
        }
    }
}

struct CoveredTree<'a> {
    tree: &'a BoostedTree,
    cover: &'a [f64],
}

impl ShapTree for CoveredTree<'_> {
    fn children(&self, node: usize) -> Option<(usize, usize)> {
        match self.tree.left[node] {
            -1 => None,
            left => Some((left as usize, self.tree.right[node] as usize)),
        }
    }

    fn split_feature(&self, node: usize) -> usize {
        self.tree.split_index[node]
    }

    fn goes_left(&self, node: usize, x: f64) -> bool {
        self.tree.goes_left(node, x)
    }

    fn leaf_value(&self, node: usize) -> f64 {
        f64::from(self.tree.split_condition[node])
    }

    fn cover(&self, node: usize) -> f64 {
        self.cover[node]
    }
}

// ---------------------------------------------------------------------------
// File layout
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct XgbFile {
    learner: LearnerFile,
}

#[derive(Debug, Deserialize)]
struct LearnerFile {
    #[serde(default)]
    feature_names: Vec<String>,
    gradient_booster: BoosterFile,
    learner_model_param: LearnerParam,
    objective: ObjectiveFile,
}

#[derive(Debug, Deserialize)]
struct BoosterFile {
    name: String,
    #[serde(default)]
    model: Option<GbTreeFile>,
}

#[derive(Debug, Deserialize)]
struct GbTreeFile {
    trees: Vec<TreeFile>,
}

#[derive(Debug, Deserialize)]
struct LearnerParam {
    base_score: String,
    num_feature: String,
    #[serde(default)]
    num_target: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectiveFile {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TreeFile {
    left_children: Vec<i64>,
    right_children: Vec<i64>,
    split_indices: Vec<i64>,
    split_conditions: Vec<f32>,
    default_left: Vec<Flag>,
    #[serde(default)]
    split_type: Vec<i64>,
    #[serde(default)]
    sum_hessian: Option<Vec<f64>>,
}

/// `default_left` is written as 0/1 by most versions and as booleans by some.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
}

impl Flag {
    fn is_set(&self) -> bool {
        match self {
            Flag::Bool(b) => *b,
            Flag::Int(i) => *i != 0,
        }
    }
}

/// Parse a scalar parameter, which XGBoost stores as a string such as
/// `"5E-1"` or, in newer versions, `"[5E-1]"`.
fn parse_param(raw: &str, name: &str) -> Result<f64> {
    let trimmed = raw.trim().trim_start_matches('[').trim_end_matches(']').trim();
    trimmed
        .parse::<f64>()
        .with_context(|| format!("invalid {name} '{raw}'"))
}

impl TryFrom<XgbFile> for XgbModel {
    type Error = Error;

    fn try_from(file: XgbFile) -> Result<Self> {
        let learner = file.learner;

        if learner.gradient_booster.name != "gbtree" {
            bail!("unsupported booster '{}'", learner.gradient_booster.name);
        }
        let param = &learner.learner_model_param;
        if let Some(targets) = &param.num_target {
            let targets = parse_param(targets, "num_target")?;
            if targets != 1.0 {
                bail!("multi-target models are not supported ({targets} targets)");
            }
        }
        let n_features = parse_param(&param.num_feature, "num_feature")?;
        if n_features < 1.0 || n_features.fract() != 0.0 {
            bail!("invalid num_feature {n_features}");
        }
        let n_features = n_features as usize;

        let link = Link::for_objective(&learner.objective.name)?;
        let base_score = parse_param(&param.base_score, "base_score")?;
        let base_margin = match link {
            Link::Identity => base_score,
            Link::Exp if base_score > 0.0 => base_score.ln(),
            Link::Exp => bail!("base_score {base_score} must be positive for '{}'", learner.objective.name),
        };

        let feature_names = match learner.feature_names {
            names if names.is_empty() => None,
            names if names.len() != n_features => {
                bail!("{} feature names for {n_features} features", names.len())
            }
            names => Some(names),
        };

        let model = learner
            .gradient_booster
            .model
            .context("gbtree booster has no model")?;
        let trees = model
            .trees
            .into_iter()
            .enumerate()
            .map(|(i, tree)| build_tree(tree, n_features).with_context(|| format!("tree {i}")))
            .collect::<Result<Vec<_>>>()?;
        if !base_margin.is_finite() {
            bail!("base margin is not finite");
        }

        Ok(XgbModel {
            n_features,
            feature_names,
            objective: learner.objective.name,
            link,
            base_margin,
            trees,
        })
    }
}

fn build_tree(file: TreeFile, n_features: usize) -> Result<BoostedTree> {
    let n = file.left_children.len();
    if n == 0 {
        bail!("tree has no nodes");
    }
    for (name, len) in [
        ("right_children", file.right_children.len()),
        ("split_indices", file.split_indices.len()),
        ("split_conditions", file.split_conditions.len()),
        ("default_left", file.default_left.len()),
    ] {
        if len != n {
            bail!("{name} has {len} entries, expected {n}");
        }
    }
    if file.split_type.iter().any(|t| *t != 0) {
        bail!("categorical splits are not supported");
    }

    let mut split_index = Vec::with_capacity(n);
    for node in 0..n {
        let (left, right) = (file.left_children[node], file.right_children[node]);
        let condition = file.split_conditions[node];
        if left == -1 {
            if right != -1 {
                bail!("node {node} has a right child but no left child");
            }
            if !condition.is_finite() {
                bail!("leaf {node} has a non-finite value");
            }
            split_index.push(0);
            continue;
        }
        for child in [left, right] {
            if child <= node as i64 || child >= n as i64 {
                bail!("node {node} points to invalid child {child}");
            }
        }
        let index = file.split_indices[node];
        if index < 0 || index as usize >= n_features {
            bail!("node {node} splits on feature {index}, model has {n_features}");
        }
        if condition.is_nan() {
            bail!("node {node} has a NaN split condition");
        }
        split_index.push(index as usize);
    }

    Ok(BoostedTree {
        left: file.left_children,
        right: file.right_children,
        split_index,
        split_condition: file.split_conditions,
        default_left: file.default_left.iter().map(Flag::is_set).collect(),
        cover: shap::checked_cover(file.sum_hessian, n),
    })
}

impl XgbModel {
    pub fn objective(&self) -> &str {
        &self.objective
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for XgbModel {
    fn kind(&self) -> ModelKind {
        ModelKind::XGBoost
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn predict_row(&self, features: &[f64]) -> Result<f64, PredictionError> {
        let mut margin = self.base_margin;
        for tree in &self.trees {
            margin += tree.leaf(features)?;
        }
        Ok(match self.link {
            Link::Identity => margin,
            Link::Exp => margin.exp(),
        })
    }

    /// Attributions on the margin, which is the prediction itself for
    /// identity-link objectives and its log otherwise.
    fn explain_row(&self, features: &[f64]) -> Result<RowAttribution, PredictionError> {
        let mut expected_value = self.base_margin;
        let mut contributions = vec![0.0; self.n_features];
        for (i, tree) in self.trees.iter().enumerate() {
            let cover = tree.cover.as_deref().ok_or_else(|| {
                PredictionError::Unexplainable(format!("tree {i} has no sum_hessian"))
            })?;
            let tree = CoveredTree { tree, cover };
            expected_value += shap::expected_value(&tree, 0);
            shap::tree_shap(&tree, features, &mut contributions);
        }
        Ok(RowAttribution {
            expected_value,
            contributions,
            log_scale: self.link == Link::Exp,
        })
    }
}
