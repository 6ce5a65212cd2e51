//! Numerical routines behind the distribution checks.

use std::f64::consts::PI;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (ddof = 1). `None` for fewer than two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Z-score of every value. All zeros when the deviation is zero or undefined.
pub fn z_scores(values: &[f64]) -> Vec<f64> {
    match (mean(values), sample_std(values)) {
        (Some(m), Some(std)) if std > 0.0 => values.iter().map(|v| (v - m) / std).collect(),
        _ => vec![0.0; values.len()],
    }
}

/// Result of a two-sample Kolmogorov-Smirnov test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KsResult {
    pub statistic: f64,
    pub p_value: f64,
}

/// Largest `n * m` for which the exact p-value is computed.
pub const EXACT_KS_MAX_PRODUCT: usize = 10_000;

/// Two-sided two-sample Kolmogorov-Smirnov test.
///
/// The p-value is exact when `n * m <= EXACT_KS_MAX_PRODUCT` and comes from
/// the asymptotic Kolmogorov distribution otherwise, with the usual
/// small-sample correction of the effective size. Returns `None` when
/// either sample is empty.
pub fn ks_2samp(first: &[f64], second: &[f64]) -> Option<KsResult> {
    if first.is_empty() || second.is_empty() {
        return None;
    }

    let mut a = first.to_vec();
    let mut b = second.to_vec();
    a.sort_by(f64::total_cmp);
    b.sort_by(f64::total_cmp);

    let (n, m) = (a.len(), b.len());
    let (mut i, mut j) = (0usize, 0usize);
    let mut statistic: f64 = 0.0;

    while i < n && j < m {
        let x = a[i].min(b[j]);
        while i < n && a[i] <= x {
            i += 1;
        }
        while j < m && b[j] <= x {
            j += 1;
        }
        let diff = (i as f64 / n as f64 - j as f64 / m as f64).abs();
        statistic = statistic.max(diff);
    }

    if n * m <= EXACT_KS_MAX_PRODUCT {
        return Some(exact_ks_result(n, m, statistic));
    }

    let en = ((n * m) as f64 / (n + m) as f64).sqrt();
    let lambda = (en + 0.12 + 0.11 / en) * statistic;

    Some(KsResult {
        statistic,
        p_value: kolmogorov_survival(lambda),
    })
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Exact result on the lattice of attainable statistics.
///
/// The statistic is snapped to `h / lcm(n, m)`; the p-value is the share of
/// monotone lattice paths from `(0, 0)` to `(n, m)` that touch
/// `|x / n - y / m| >= h / lcm(n, m)`.
fn exact_ks_result(n: usize, m: usize, statistic: f64) -> KsResult {
    let g = gcd(n, m);
    let lcm = (n / g) * m;
    let h = (statistic * lcm as f64).round() as usize;
    let statistic = h as f64 / lcm as f64;
    if h == 0 {
        return KsResult {
            statistic,
            p_value: 1.0,
        };
    }

    let inside = lattice_inside_probability(n, m, g, h);
    KsResult {
        statistic,
        p_value: (1.0 - inside).clamp(0.0, 1.0),
    }
}

/// Probability that a uniformly drawn lattice path stays strictly inside
/// `|x * (m / g) - y * (n / g)| < h`.
///
/// Paths are walked with their transition probabilities instead of raw
/// counts, so intermediate values stay within `[0, 1]`.
fn lattice_inside_probability(n: usize, m: usize, g: usize, h: usize) -> f64 {
    let (mg, ng) = ((m / g) as i64, (n / g) as i64);
    let h = h as i64;
    let inside = |x: usize, y: usize| (x as i64 * mg - y as i64 * ng).abs() < h;

    // probability[y] of the current column x
    let mut column = vec![0.0f64; m + 1];
    column[0] = 1.0;
    for x in 0..=n {
        let mut next = vec![0.0f64; m + 1];
        for y in 0..=m {
            let p = column[y];
            if p == 0.0 {
                continue;
            }
            if !inside(x, y) {
                column[y] = 0.0;
                continue;
            }
            let remaining = (n - x + m - y) as f64;
            if y < m {
                let up = p * (m - y) as f64 / remaining;
                if inside(x, y + 1) {
                    column[y + 1] += up;
                }
            }
            if x < n {
                next[y] += p * (n - x) as f64 / remaining;
            }
        }
        if x == n {
            return column[m];
        }
        column = next;
    }
    0.0
}

/// `P(K > lambda)` for the Kolmogorov distribution.
pub fn kolmogorov_survival(lambda: f64) -> f64 {
    if lambda <= 0.0 {
        return 1.0;
    }

    let q = if lambda < 1.18 {
        let y = (-PI * PI / (8.0 * lambda * lambda)).exp();
        let mut sum = 0.0;
        let mut k = 1i32;
        loop {
            let term = y.powi((2 * k - 1) * (2 * k - 1));
            sum += term;
            if term < 1e-16 || k > 100 {
                break;
            }
            k += 1;
        }
        1.0 - (2.0 * PI).sqrt() / lambda * sum
    } else {
        let x = (-2.0 * lambda * lambda).exp();
        let mut sum = 0.0;
        let mut sign = 1.0;
        for k in 1..=100i32 {
            let term = x.powi(k * k);
            sum += sign * term;
            if term < 1e-16 {
                break;
            }
            sign = -sign;
        }
        2.0 * sum
    };

    q.clamp(0.0, 1.0)
}

/// Counts of values per bin over fixed edges, plus both tails.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub below: usize,
    pub counts: Vec<usize>,
    pub above: usize,
}

impl Histogram {
    /// Bins are `[e0, e1), [e1, e2), ... [e(k-1), ek]`; the first and last
    /// edges are inclusive.
    pub fn from_values(values: &[f64], edges: &[f64]) -> Self {
        let bins = edges.len().saturating_sub(1);
        let mut histogram = Self {
            below: 0,
            counts: vec![0; bins],
            above: 0,
        };
        let (Some(first), Some(last)) = (edges.first(), edges.last()) else {
            return histogram;
        };

        for &value in values {
            if value < *first {
                histogram.below += 1;
            } else if value > *last {
                histogram.above += 1;
            } else {
                let idx = edges[1..]
                    .iter()
                    .position(|edge| value < *edge)
                    .unwrap_or(bins.saturating_sub(1));
                histogram.counts[idx] += 1;
            }
        }

        histogram
    }

    pub fn inner_total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn total(&self) -> usize {
        self.below + self.inner_total() + self.above
    }

    /// Weights of every bin including tails, normalised by the total count.
    /// Layout: `[below, bins..., above]`.
    pub fn weights_with_tails(&self) -> Vec<f64> {
        let total = self.total();
        if total == 0 {
            return vec![0.0; self.counts.len() + 2];
        }
        std::iter::once(self.below)
            .chain(self.counts.iter().copied())
            .chain(std::iter::once(self.above))
            .map(|c| c as f64 / total as f64)
            .collect()
    }

    /// Weights normalised over the inner bins only, with zero tails.
    /// Same layout as [`Histogram::weights_with_tails`].
    pub fn inner_weights(&self) -> Vec<f64> {
        let total = self.inner_total();
        let inner = self
            .counts
            .iter()
            .map(|c| if total == 0 { 0.0 } else { *c as f64 / total as f64 });
        std::iter::once(0.0)
            .chain(inner)
            .chain(std::iter::once(0.0))
            .collect()
    }
}

/// Kullback-Leibler divergence `D(observed || expected)` in nats.
///
/// Infinite when `observed` puts weight where `expected` has none.
pub fn kl_divergence(observed: &[f64], expected: &[f64]) -> f64 {
    observed
        .iter()
        .zip(expected)
        .filter(|(p, _)| **p > 0.0)
        .map(|(p, q)| {
            if *q <= 0.0 {
                f64::INFINITY
            } else {
                p * (p / q).ln()
            }
        })
        .sum()
}
