//! Segment assignment and the Gaussian segment likelihood.
//!
//! The likelihood of a segment only depends on a handful of sums over its returns,
//! so we precompute prefix sums once per model and evaluate any segment in O(1):
//!
//! ```text
//! Σ (y - μ - β·I)² = S2 - 2μ·S1 - 2β·SIY + nμ² + 2μβ·SI + β²·SI
//! ```
//!
//! (`I` is a 0/1 indicator, so `Σ I² = Σ I`.)

use std::ops::Range;

const LN_2PI: f64 = 1.837_877_066_409_345_5;

/// Maps return indices onto contiguous, ordered segments.
///
/// `segment(i)` is the number of boundaries `<= i`. Boundaries are stably sorted on
/// construction, so equal boundaries keep declaration order and produce empty
/// segments rather than an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentAssignment {
    boundaries: Vec<usize>,
}

impl SegmentAssignment {
    pub fn from_boundaries(mut boundaries: Vec<usize>) -> Self {
        boundaries.sort();
        Self { boundaries }
    }

    pub fn boundaries(&self) -> &[usize] {
        &self.boundaries
    }

    pub fn n_segments(&self) -> usize {
        self.boundaries.len() + 1
    }

    pub fn segment(&self, index: usize) -> usize {
        self.boundaries.partition_point(|&b| b <= index)
    }

    /// Index range of every segment over a sequence of length `n`.
    pub fn ranges(&self, n: usize) -> Vec<Range<usize>> {
        let mut out = Vec::with_capacity(self.n_segments());
        let mut start = 0;
        for &b in &self.boundaries {
            let end = b.min(n).max(start);
            out.push(start..end);
            start = end;
        }
        out.push(start..n.max(start));
        out
    }
}

/// Prefix sums of the observed returns (and optional event indicator).
#[derive(Debug, Clone)]
pub struct SufficientStats {
    s1: Vec<f64>,
    s2: Vec<f64>,
    si: Vec<f64>,
    siy: Vec<f64>,
}

impl SufficientStats {
    pub fn new(y: &[f64], indicator: Option<&[f64]>) -> Self {
        let n = y.len();
        let mut s1 = Vec::with_capacity(n + 1);
        let mut s2 = Vec::with_capacity(n + 1);
        let mut si = Vec::with_capacity(n + 1);
        let mut siy = Vec::with_capacity(n + 1);
        let (mut a, mut b, mut c, mut d) = (0.0, 0.0, 0.0, 0.0);
        s1.push(a);
        s2.push(b);
        si.push(c);
        siy.push(d);
        for (i, &v) in y.iter().enumerate() {
            let ind = indicator.and_then(|x| x.get(i)).copied().unwrap_or(0.0);
            a += v;
            b += v * v;
            c += ind;
            d += ind * v;
            s1.push(a);
            s2.push(b);
            si.push(c);
            siy.push(d);
        }
        Self { s1, s2, si, siy }
    }

    pub fn len(&self) -> usize {
        self.s1.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sum(prefix: &[f64], r: &Range<usize>) -> f64 {
        prefix[r.end] - prefix[r.start]
    }

    /// Residual sum of squares of `y[r]` around `mu + beta * I`.
    pub fn residual_ss(&self, r: &Range<usize>, mu: f64, beta: f64) -> f64 {
        let n = (r.end - r.start) as f64;
        let s1 = Self::sum(&self.s1, r);
        let s2 = Self::sum(&self.s2, r);
        let si = Self::sum(&self.si, r);
        let siy = Self::sum(&self.siy, r);
        let ss = s2 - 2.0 * mu * s1 - 2.0 * beta * siy + n * mu * mu + 2.0 * mu * beta * si + beta * beta * si;
        ss.max(0.0)
    }

    /// Gaussian log-likelihood of the segment `r`. Empty segments contribute 0.
    pub fn segment_log_likelihood(&self, r: Range<usize>, mu: f64, beta: f64, sigma: f64) -> f64 {
        if r.start >= r.end {
            return 0.0;
        }
        if !(sigma > 0.0) {
            return f64::NEG_INFINITY;
        }
        let n = (r.end - r.start) as f64;
        let ss = self.residual_ss(&r, mu, beta);
        -0.5 * n * LN_2PI - n * sigma.ln() - ss / (2.0 * sigma * sigma)
    }

    pub fn mean(&self, r: &Range<usize>) -> Option<f64> {
        if r.start >= r.end {
            return None;
        }
        Some(Self::sum(&self.s1, r) / (r.end - r.start) as f64)
    }

    pub fn std(&self, r: &Range<usize>) -> Option<f64> {
        let n = r.end.checked_sub(r.start)?;
        if n < 2 {
            return None;
        }
        let m = self.mean(r)?;
        let var = (Self::sum(&self.s2, r) - n as f64 * m * m) / (n as f64 - 1.0);
        Some(var.max(0.0).sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::prior::normal_ln_pdf;

    fn naive_log_likelihood(y: &[f64], indicator: &[f64], mu: f64, beta: f64, sigma: f64) -> f64 {
        y.iter()
            .zip(indicator)
            .map(|(v, ind)| normal_ln_pdf(*v, mu + beta * ind, sigma))
            .sum()
    }

    #[test]
    fn assignment_is_monotone_for_unsorted_and_tied_boundaries() {
        for boundaries in [vec![5, 2, 8], vec![3, 3], vec![0, 9, 9, 1], vec![]] {
            let a = SegmentAssignment::from_boundaries(boundaries.clone());
            let segs: Vec<usize> = (0..12).map(|i| a.segment(i)).collect();
            assert!(segs.windows(2).all(|w| w[0] <= w[1]), "{boundaries:?} -> {segs:?}");
            assert!(segs.iter().all(|&s| s < a.n_segments()));
        }
    }

    #[test]
    fn tied_boundaries_yield_empty_segment() {
        let a = SegmentAssignment::from_boundaries(vec![3, 3]);
        assert_eq!(a.ranges(6), vec![0..3, 3..3, 3..6]);
        assert_eq!(a.segment(2), 0);
        assert_eq!(a.segment(3), 2);
    }

    #[test]
    fn prefix_likelihood_matches_direct_sum() {
        let y = [0.01, -0.02, 0.03, 0.005, -0.01, 0.0, 0.02];
        let ind = [0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0];
        let stats = SufficientStats::new(&y, Some(&ind));
        let fast = stats.segment_log_likelihood(0..y.len(), 0.004, 0.01, 0.02);
        let slow = naive_log_likelihood(&y, &ind, 0.004, 0.01, 0.02);
        assert!((fast - slow).abs() < 1e-9, "{fast} vs {slow}");

        let sub = stats.segment_log_likelihood(2..5, -0.001, 0.01, 0.03);
        let slow_sub = naive_log_likelihood(&y[2..5], &ind[2..5], -0.001, 0.01, 0.03);
        assert!((sub - slow_sub).abs() < 1e-9);
    }

    #[test]
    fn segment_moments() {
        let stats = SufficientStats::new(&[1.0, 2.0, 3.0, 4.0], None);
        assert_eq!(stats.mean(&(1..3)), Some(2.5));
        assert!((stats.std(&(0..4)).unwrap() - (5.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert_eq!(stats.mean(&(2..2)), None);
        assert_eq!(stats.segment_log_likelihood(2..2, 0.0, 0.0, 1.0), 0.0);
    }
}
