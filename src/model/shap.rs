//! Exact TreeSHAP attributions for single regression trees.
//!
//! Path-dependent variant of Lundberg et al. (2020): node covers stand in for
//! the background distribution, so the attributions of a row sum to the
//! tree's output minus its cover-weighted expected output.

/// Read access to one tree with positive node covers.
pub(crate) trait ShapTree {
    /// `(left, right)` of an internal node, `None` for a leaf.
    fn children(&self, node: usize) -> Option<(usize, usize)>;
    fn split_feature(&self, node: usize) -> usize;
    fn goes_left(&self, node: usize, x: f64) -> bool;
    fn leaf_value(&self, node: usize) -> f64;
    fn cover(&self, node: usize) -> f64;
}

/// Attributions of one row against the expected output of a model.
#[derive(Debug, Clone, PartialEq)]
pub struct RowAttribution {
    /// Cover-weighted mean output the attributions start from.
    pub expected_value: f64,
    /// One value per model feature, in model order.
    pub contributions: Vec<f64>,
    /// Attributions explain the log of the prediction (exp-link objectives).
    pub log_scale: bool,
}

impl RowAttribution {
    /// `expected_value + Σ contributions`.
    pub fn output(&self) -> f64 {
        self.expected_value + self.contributions.iter().sum::<f64>()
    }
}

/// `cover` when it holds one finite, positive entry per node.
pub(crate) fn checked_cover(cover: Option<Vec<f64>>, n_nodes: usize) -> Option<Vec<f64>> {
    let cover = cover?;
    if cover.len() == n_nodes && cover.iter().all(|c| c.is_finite() && *c > 0.0) {
        Some(cover)
    } else {
        log::warn!("Ignoring node covers: expected {n_nodes} positive values");
        None
    }
}

/// Cover-weighted mean of the leaf values below `node`.
pub(crate) fn expected_value<T: ShapTree + ?Sized>(tree: &T, node: usize) -> f64 {
    match tree.children(node) {
        None => tree.leaf_value(node),
        Some((left, right)) => {
            let (cl, cr) = (tree.cover(left), tree.cover(right));
            (cl * expected_value(tree, left) + cr * expected_value(tree, right)) / (cl + cr)
        }
    }
}

/// Add the attributions of `x` under `tree` to `phi`.
pub(crate) fn tree_shap<T: ShapTree + ?Sized>(tree: &T, x: &[f64], phi: &mut [f64]) {
    let mut walker = Walker { tree, x, phi };
    walker.recurse(0, Vec::new(), 1.0, 1.0, None);
}

#[derive(Debug, Clone, Copy)]
struct PathElement {
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    weight: f64,
}

fn extend(path: &mut Vec<PathElement>, zero_fraction: f64, one_fraction: f64, feature: Option<usize>) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        weight: if depth == 0 { 1.0 } else { 0.0 },
    });
    let d = depth as f64;
    for i in (0..depth).rev() {
        path[i + 1].weight += one_fraction * path[i].weight * (i + 1) as f64 / (d + 1.0);
        path[i].weight = zero_fraction * path[i].weight * (d - i as f64) / (d + 1.0);
    }
}

/// Remove element `index` from the path, undoing its effect on the weights.
fn unwind(path: &mut Vec<PathElement>, index: usize) {
    let depth = path.len() - 1;
    let PathElement {
        zero_fraction,
        one_fraction,
        ..
    } = path[index];
    let d = depth as f64;
    let mut next = path[depth].weight;
    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = path[i].weight;
            path[i].weight = next * (d + 1.0) / ((i + 1) as f64 * one_fraction);
            next = tmp - path[i].weight * zero_fraction * (d - i as f64) / (d + 1.0);
        } else {
            path[i].weight = path[i].weight * (d + 1.0) / (zero_fraction * (d - i as f64));
        }
    }
    for i in index..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.pop();
}

/// Total path weight with element `index` unwound, without modifying the path.
fn unwound_sum(path: &[PathElement], index: usize) -> f64 {
    let depth = path.len() - 1;
    let PathElement {
        zero_fraction,
        one_fraction,
        ..
    } = path[index];
    let d = depth as f64;
    let mut next = path[depth].weight;
    let mut total = 0.0;
    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = next * (d + 1.0) / ((i + 1) as f64 * one_fraction);
            total += tmp;
            next = path[i].weight - tmp * zero_fraction * (d - i as f64) / (d + 1.0);
        } else {
            total += path[i].weight / zero_fraction / ((d - i as f64) / (d + 1.0));
        }
    }
    total
}

struct Walker<'a, T: ?Sized> {
    tree: &'a T,
    x: &'a [f64],
    phi: &'a mut [f64],
}

impl<T: ShapTree + ?Sized> Walker<'_, T> {
    fn recurse(
        &mut self,
        node: usize,
        mut path: Vec<PathElement>,
        zero_fraction: f64,
        one_fraction: f64,
        feature: Option<usize>,
    ) {
        extend(&mut path, zero_fraction, one_fraction, feature);

        let Some((left, right)) = self.tree.children(node) else {
            let leaf = self.tree.leaf_value(node);
            for i in 1..path.len() {
                let weight = unwound_sum(&path, i);
                let el = path[i];
                if let Some(f) = el.feature.filter(|&f| f < self.phi.len()) {
                    self.phi[f] += weight * (el.one_fraction - el.zero_fraction) * leaf;
                }
            }
            return;
        };

        let split = self.tree.split_feature(node);
        let x = self.x.get(split).copied().unwrap_or(f64::NAN);
        let (hot, cold) = if self.tree.goes_left(node, x) {
            (left, right)
        } else {
            (right, left)
        };
        let total = self.tree.cover(left) + self.tree.cover(right);

        // A feature already on the path is merged into this split.
        let (mut incoming_zero, mut incoming_one) = (1.0, 1.0);
        if let Some(k) = path.iter().position(|e| e.feature == Some(split)) {
            incoming_zero = path[k].zero_fraction;
            incoming_one = path[k].one_fraction;
            unwind(&mut path, k);
        }

        let hot_zero = self.tree.cover(hot) / total * incoming_zero;
        let cold_zero = self.tree.cover(cold) / total * incoming_zero;
        self.recurse(hot, path.clone(), hot_zero, incoming_one, Some(split));
        self.recurse(cold, path, cold_zero, 0.0, Some(split));
    }
}
