//! Descriptive statistics for the data explorer.

use std::collections::BTreeMap;

use super::frame::Frame;

/// Summary of one numeric column, the rows of a `describe()` table.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSummary {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (n - 1); NaN with fewer than two values.
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

/// Summaries for every numeric column, in frame order.
pub fn describe(frame: &Frame) -> Vec<ColumnSummary> {
    frame
        .column_names
        .iter()
        .filter(|c| frame.is_numeric_column(c))
        .filter_map(|c| summarize(c, &frame.numeric_column(c)))
        .collect()
}

fn summarize(column: &str, values: &[Option<f64>]) -> Option<ColumnSummary> {
    let mut sorted: Vec<f64> = values.iter().flatten().copied().collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    let mean = sorted.iter().sum::<f64>() / n as f64;
    let std = if n < 2 {
        f64::NAN
    } else {
        (sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
    };

    Some(ColumnSummary {
        column: column.to_string(),
        count: n,
        mean,
        std,
        min: sorted[0],
        q25: quantile(&sorted, 0.25),
        median: quantile(&sorted, 0.5),
        q75: quantile(&sorted, 0.75),
        max: sorted[n - 1],
    })
}

/// Linear-interpolated quantile of already sorted values.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Pearson correlation between every pair of `columns`, using rows where both
/// cells are numeric. NaN when a column is constant over those rows.
pub fn correlation_matrix(frame: &Frame, columns: &[String]) -> Vec<Vec<f64>> {
    let data: Vec<Vec<Option<f64>>> = columns.iter().map(|c| frame.numeric_column(c)).collect();

    (0..columns.len())
        .map(|i| {
            (0..columns.len())
                .map(|j| pearson(&data[i], &data[j]))
                .collect()
        })
        .collect()
}

fn pearson(a: &[Option<f64>], b: &[Option<f64>]) -> f64 {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }
    let n = pairs.len() as f64;
    let mean_a = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_b = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        cov += (x - mean_a) * (y - mean_b);
        var_a += (x - mean_a).powi(2);
        var_b += (y - mean_b).powi(2);
    }
    if var_a == 0.0 || var_b == 0.0 {
        return f64::NAN;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}

/// Mean of a target column per category of `by`.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupMean {
    pub category: String,
    pub mean: f64,
    pub count: usize,
}

/// Group means sorted by descending mean; rows with a missing category or
/// non-numeric target are skipped.
pub fn group_mean(frame: &Frame, by: &str, target: &str) -> Vec<GroupMean> {
    let mut acc: BTreeMap<String, (f64, usize)> = BTreeMap::new();

    for row in 0..frame.len() {
        let Some(category) = frame.value(row, by).category_label() else {
            continue;
        };
        let Some(y) = frame.value(row, target).as_f64() else {
            continue;
        };
        let entry = acc.entry(category).or_insert((0.0, 0));
        entry.0 += y;
        entry.1 += 1;
    }

    let mut groups: Vec<GroupMean> = acc
        .into_iter()
        .map(|(category, (sum, count))| GroupMean {
            category,
            mean: sum / count as f64,
            count,
        })
        .collect();
    groups.sort_by(|a, b| b.mean.total_cmp(&a.mean));
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::frame::Value;

    fn frame() -> Frame {
        Frame::from_rows(
            &["Crop", "Rainfall_mm", "Yield"],
            vec![
                vec!["Rice".into(), 100.0.into(), 2.0.into()],
                vec!["Rice".into(), 200.0.into(), 4.0.into()],
                vec!["Wheat".into(), 300.0.into(), 6.0.into()],
                vec!["Wheat".into(), 400.0.into(), 8.0.into()],
                vec![Value::Null, 500.0.into(), Value::Null],
            ],
        )
    }

    #[test]
    fn test_describe_numeric_columns_only() {
        let summary = describe(&frame());
        let names: Vec<&str> = summary.iter().map(|s| s.column.as_str()).collect();
        assert_eq!(names, vec!["Rainfall_mm", "Yield"]);

        let rain = &summary[0];
        assert_eq!(rain.count, 5);
        assert_eq!(rain.mean, 300.0);
        assert_eq!(rain.median, 300.0);
        assert_eq!(rain.q25, 200.0);
        assert!((rain.std - 158.113_883).abs() < 1e-5);

        let y = &summary[1];
        assert_eq!(y.count, 4);
        assert_eq!(y.q75, 6.5);
    }

    #[test]
    fn test_correlation_of_linear_columns() {
        let cols = vec!["Rainfall_mm".to_string(), "Yield".to_string()];
        let m = correlation_matrix(&frame(), &cols);
        assert!((m[0][1] - 1.0).abs() < 1e-12);
        assert!((m[1][0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_column_correlation_is_nan() {
        let f = Frame::from_rows(
            &["a", "b"],
            vec![vec![1.0.into(), 1.0.into()], vec![2.0.into(), 1.0.into()]],
        );
        let m = correlation_matrix(&f, &["a".to_string(), "b".to_string()]);
        assert!(m[0][1].is_nan());
    }

    #[test]
    fn test_group_mean_sorted_descending() {
        let groups = group_mean(&frame(), "Crop", "Yield");
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].category, "Wheat");
        assert_eq!(groups[0].mean, 7.0);
        assert_eq!(groups[1].count, 2);
    }
}
