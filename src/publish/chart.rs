//! Renderer-independent chart model.

use serde::{Deserialize, Serialize};

use crate::validation::statistics::Histogram;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    Bar,
    Scatter,
}

/// One trace of a chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub kind: SeriesKind,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<Series>,
}

impl Chart {
    pub fn new(title: impl Into<String>, x_label: impl Into<String>, y_label: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            x_label: x_label.into(),
            y_label: y_label.into(),
            series: Vec::new(),
        }
    }

    /// Builder method to add a trace.
    pub fn with_series(mut self, series: Series) -> Self {
        self.series.push(series);
        self
    }

    /// Histogram of `values` over `bins` equal-width bins. Bars are placed at
    /// bin centres.
    pub fn histogram(title: impl Into<String>, x_label: impl Into<String>, values: &[f64], bins: u32) -> Self {
        let chart = Self::new(title, x_label, "count");
        let (Some(min), Some(max)) = (
            values.iter().copied().reduce(f64::min),
            values.iter().copied().reduce(f64::max),
        ) else {
            return chart;
        };

        let bins = bins.max(1) as usize;
        let width = if max > min { (max - min) / bins as f64 } else { 1.0 };
        let edges: Vec<f64> = (0..=bins)
            .map(|i| if i == bins && max > min { max } else { min + width * i as f64 })
            .collect();
        let counts = Histogram::from_values(values, &edges).counts;

        let centres = edges.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
        let name = chart.x_label.clone();
        chart.with_series(Series {
            name,
            kind: SeriesKind::Bar,
            x: centres,
            y: counts.into_iter().map(|c| c as f64).collect(),
        })
    }

    /// Scatter plot of `(x, y)` points.
    pub fn scatter(
        title: impl Into<String>,
        x_label: impl Into<String>,
        y_label: impl Into<String>,
        points: &[(f64, f64)],
    ) -> Self {
        let chart = Self::new(title, x_label, y_label);
        let name = chart.title.clone();
        chart.with_series(Series {
            name,
            kind: SeriesKind::Scatter,
            x: points.iter().map(|(x, _)| *x).collect(),
            y: points.iter().map(|(_, y)| *y).collect(),
        })
    }

    pub fn point_count(&self) -> usize {
        self.series.iter().map(|s| s.x.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.point_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_counts_every_value() {
        let values = [20.0, 21.0, 25.0, 30.0, 40.0];
        let chart = Chart::histogram("Age", "age", &values, 4);

        let series = &chart.series[0];
        assert_eq!(series.kind, SeriesKind::Bar);
        assert_eq!(series.x.len(), 4);
        assert_eq!(series.y.iter().sum::<f64>(), 5.0);
        assert_eq!(series.x[0], 22.5);
    }

    #[test]
    fn test_histogram_single_value_and_empty() {
        let chart = Chart::histogram("Age", "age", &[30.0, 30.0], 3);
        assert_eq!(chart.series[0].y.iter().sum::<f64>(), 2.0);

        assert!(Chart::histogram("Age", "age", &[], 3).is_empty());
    }

    #[test]
    fn test_scatter() {
        let chart = Chart::scatter("Age vs salary", "age", "salary", &[(30.0, 1e5), (40.0, 2e5)]);
        assert_eq!(chart.point_count(), 2);
        assert_eq!(chart.series[0].y, vec![1e5, 2e5]);
    }
}
