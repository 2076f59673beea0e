//! Classical hypothesis tests.
//!
//! All tests return a [`TestResult`] whose statistic and p-value are `Measure`s, so
//! degenerate inputs (zero variance, too few points, all-zero differences) come
//! back as explained undefined values instead of NaN or a panic.
//!
//! Zero within-group variance with different means is treated as an infinitely
//! large t statistic (`p = 0`); with equal means the test is undefined.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

use crate::domain::{Measure, Undefined};
use crate::math::stats::{average_ranks, mean, sample_variance, sorted};

/// Exact Wilcoxon distribution is used up to this many non-zero differences.
const WILCOXON_EXACT_MAX_N: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub statistic: Measure,
    pub p_value: Measure,
    pub n: usize,
}

impl TestResult {
    fn undefined(reason: Undefined, n: usize) -> Self {
        Self {
            statistic: Measure::Undefined(reason),
            p_value: Measure::Undefined(reason),
            n,
        }
    }

    /// `p < alpha`; an undefined p-value is never significant.
    pub fn significant(&self, alpha: f64) -> bool {
        self.p_value.value().is_some_and(|p| p < alpha)
    }
}

fn standard_normal() -> Option<Normal> {
    Normal::new(0.0, 1.0).ok()
}

/// Two-sided p-value of a t statistic with `df` degrees of freedom.
pub fn t_two_sided_p(t: f64, df: f64) -> Measure {
    if t.is_nan() {
        return Measure::Undefined(Undefined::ZeroVariance);
    }
    if t.is_infinite() {
        return Measure::Defined(0.0);
    }
    if !(df > 0.0) {
        return Measure::Undefined(Undefined::InsufficientData);
    }
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => Measure::Defined((2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0)),
        Err(_) => Measure::Undefined(Undefined::InsufficientData),
    }
}

/// `diff / se`, handling the zero standard-error case.
fn t_statistic(diff: f64, se: f64) -> Measure {
    if se > 0.0 {
        Measure::Defined(diff / se)
    } else if diff != 0.0 {
        Measure::Defined(diff.signum() * f64::INFINITY)
    } else {
        Measure::Undefined(Undefined::ZeroVariance)
    }
}

fn t_result(diff: f64, se: f64, df: f64, n: usize) -> TestResult {
    let statistic = t_statistic(diff, se);
    let p_value = match statistic {
        Measure::Defined(t) => t_two_sided_p(t, df),
        undefined => undefined,
    };
    TestResult { statistic, p_value, n }
}

/// Student two-sample t-test with pooled variance; the statistic is
/// `(mean(a) - mean(b)) / se`.
pub fn two_sample_t_test(a: &[f64], b: &[f64]) -> TestResult {
    let n = a.len() + b.len();
    let (Some(va), Some(vb)) = (sample_variance(a), sample_variance(b)) else {
        return TestResult::undefined(Undefined::InsufficientData, n);
    };
    let (Some(ma), Some(mb)) = (mean(a), mean(b)) else {
        return TestResult::undefined(Undefined::InsufficientData, n);
    };
    let (na, nb) = (a.len() as f64, b.len() as f64);
    let df = na + nb - 2.0;
    let pooled = ((na - 1.0) * va + (nb - 1.0) * vb) / df;
    let se = (pooled * (1.0 / na + 1.0 / nb)).sqrt();
    t_result(ma - mb, se, df, n)
}

/// One-sample t-test of `mean(xs) == mu0`.
pub fn one_sample_t_test(xs: &[f64], mu0: f64) -> TestResult {
    let n = xs.len();
    let (Some(m), Some(v)) = (mean(xs), sample_variance(xs)) else {
        return TestResult::undefined(Undefined::InsufficientData, n);
    };
    let se = (v / n as f64).sqrt();
    t_result(m - mu0, se, n as f64 - 1.0, n)
}

/// Wilcoxon signed-rank test on paired differences (two-sided).
///
/// Zero differences are discarded. The statistic is `min(W+, W-)`. The exact null
/// distribution is used for small samples without ties, otherwise the normal
/// approximation with tie correction.
pub fn wilcoxon_signed_rank(diffs: &[f64]) -> TestResult {
    let nonzero: Vec<f64> = diffs.iter().copied().filter(|d| *d != 0.0 && d.is_finite()).collect();
    let n = nonzero.len();
    if n == 0 {
        return TestResult::undefined(Undefined::AllZeroDifferences, diffs.len());
    }

    let abs: Vec<f64> = nonzero.iter().map(|d| d.abs()).collect();
    let (ranks, ties) = average_ranks(&abs);
    let w_plus: f64 = nonzero
        .iter()
        .zip(&ranks)
        .filter(|(d, _)| **d > 0.0)
        .map(|(_, r)| r)
        .sum();
    let total = (n * (n + 1)) as f64 / 2.0;
    let w = w_plus.min(total - w_plus);

    let p_value = if n <= WILCOXON_EXACT_MAX_N && ties.is_empty() {
        Measure::Defined(wilcoxon_exact_p(n, w))
    } else {
        let nf = n as f64;
        let tie_term: f64 = ties.iter().map(|&t| (t * t * t - t) as f64).sum::<f64>() / 48.0;
        let var = nf * (nf + 1.0) * (2.0 * nf + 1.0) / 24.0 - tie_term;
        if var <= 0.0 {
            Measure::Undefined(Undefined::ZeroVariance)
        } else {
            let z = (w - total / 2.0) / var.sqrt();
            match standard_normal() {
                Some(norm) => Measure::Defined((2.0 * norm.cdf(z)).clamp(0.0, 1.0)),
                None => Measure::Undefined(Undefined::InsufficientData),
            }
        }
    };

    TestResult {
        statistic: Measure::Defined(w),
        p_value,
        n,
    }
}

/// `2 * P(W+ <= w)` under the exact null distribution of `n` untied ranks.
fn wilcoxon_exact_p(n: usize, w: f64) -> f64 {
    let max_sum = n * (n + 1) / 2;
    // counts[s] = number of sign assignments whose positive-rank sum is s
    let mut counts = vec![0.0_f64; max_sum + 1];
    counts[0] = 1.0;
    for rank in 1..=n {
        for s in (rank..=max_sum).rev() {
            counts[s] += counts[s - rank];
        }
    }
    let total = 2f64.powi(n as i32);
    let cutoff = w.floor() as usize;
    let tail: f64 = counts.iter().take(cutoff.min(max_sum) + 1).sum();
    (2.0 * tail / total).min(1.0)
}

/// Shapiro–Wilk normality test (Royston's approximation), valid for `3 <= n <= 5000`.
pub fn shapiro_wilk(xs: &[f64]) -> TestResult {
    let n = xs.len();
    if !(3..=5000).contains(&n) {
        return TestResult::undefined(Undefined::InsufficientData, n);
    }
    let Some(norm) = standard_normal() else {
        return TestResult::undefined(Undefined::InsufficientData, n);
    };

    let x = sorted(xs);
    let Some(x_bar) = mean(&x) else {
        return TestResult::undefined(Undefined::InsufficientData, n);
    };
    let ss: f64 = x.iter().map(|v| (v - x_bar) * (v - x_bar)).sum();
    if ss <= 0.0 {
        return TestResult::undefined(Undefined::ZeroVariance, n);
    }

    let a = shapiro_coefficients(n, &norm);
    let numer: f64 = a.iter().zip(&x).map(|(ai, xi)| ai * xi).sum();
    let w = (numer * numer / ss).min(1.0);

    let nf = n as f64;
    let p = if n == 3 {
        let p = 6.0 / std::f64::consts::PI * (w.sqrt().asin() - (0.75f64).sqrt().asin());
        p.clamp(0.0, 1.0)
    } else {
        let y = (1.0 - w).ln();
        let z = if n <= 11 {
            let gamma = 0.459 * nf - 2.273;
            if y >= gamma {
                return TestResult {
                    statistic: Measure::Defined(w),
                    p_value: Measure::Defined(0.0),
                    n,
                };
            }
            let y = -(gamma - y).ln();
            let mu = 0.5440 - 0.39978 * nf + 0.025054 * nf.powi(2) - 0.0006714 * nf.powi(3);
            let sigma = (1.3822 - 0.77857 * nf + 0.062767 * nf.powi(2) - 0.0020322 * nf.powi(3)).exp();
            (y - mu) / sigma
        } else {
            let ln_n = nf.ln();
            let mu = -1.5861 - 0.31082 * ln_n - 0.083751 * ln_n.powi(2) + 0.0038915 * ln_n.powi(3);
            let sigma = (-0.4803 - 0.082676 * ln_n + 0.0030302 * ln_n.powi(2)).exp();
            (y - mu) / sigma
        };
        (1.0 - norm.cdf(z)).clamp(0.0, 1.0)
    };

    TestResult {
        statistic: Measure::Defined(w),
        p_value: Measure::Defined(p),
        n,
    }
}

fn shapiro_coefficients(n: usize, norm: &Normal) -> Vec<f64> {
    let mut a = vec![0.0; n];
    if n == 3 {
        let c = 0.5f64.sqrt();
        a[0] = -c;
        a[2] = c;
        return a;
    }

    let nf = n as f64;
    let m: Vec<f64> = (1..=n)
        .map(|i| norm.inverse_cdf((i as f64 - 0.375) / (nf + 0.25)))
        .collect();
    let mm: f64 = m.iter().map(|v| v * v).sum();
    let u = 1.0 / nf.sqrt();
    let poly = |c: [f64; 6]| c[0] + u * (c[1] + u * (c[2] + u * (c[3] + u * (c[4] + u * c[5]))));

    let an = poly([m[n - 1] / mm.sqrt(), 0.221157, -0.147981, -2.071190, 4.434685, -2.706056]);
    if n > 5 {
        let an1 = poly([m[n - 2] / mm.sqrt(), 0.042981, -0.293762, -1.752461, 5.682633, -3.582633]);
        let phi = (mm - 2.0 * m[n - 1].powi(2) - 2.0 * m[n - 2].powi(2))
            / (1.0 - 2.0 * an.powi(2) - 2.0 * an1.powi(2));
        for i in 2..n - 2 {
            a[i] = m[i] / phi.sqrt();
        }
        a[n - 1] = an;
        a[n - 2] = an1;
        a[0] = -an;
        a[1] = -an1;
    } else {
        let phi = (mm - 2.0 * m[n - 1].powi(2)) / (1.0 - 2.0 * an.powi(2));
        for i in 1..n - 1 {
            a[i] = m[i] / phi.sqrt();
        }
        a[n - 1] = an;
        a[0] = -an;
    }
    a
}

/// Cohen's d of a single sample against zero: `mean / std`.
pub fn cohens_d(xs: &[f64]) -> Measure {
    let (Some(m), Some(v)) = (mean(xs), sample_variance(xs)) else {
        return Measure::Undefined(Undefined::InsufficientData);
    };
    if v <= 0.0 {
        return Measure::Undefined(Undefined::ZeroVariance);
    }
    Measure::Defined(m / v.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_variance_groups_with_different_means_are_significant() {
        let r = two_sample_t_test(&[120.0, 120.0, 120.0], &[100.0, 100.0, 100.0]);
        assert_eq!(r.statistic, Measure::Defined(f64::INFINITY));
        assert_eq!(r.p_value, Measure::Defined(0.0));
        assert!(r.significant(0.05));
    }

    #[test]
    fn zero_variance_equal_groups_are_undefined() {
        let r = two_sample_t_test(&[5.0, 5.0], &[5.0, 5.0, 5.0]);
        assert_eq!(r.p_value, Measure::Undefined(Undefined::ZeroVariance));
        assert!(!r.significant(0.05));
    }

    #[test]
    fn two_sample_matches_reference_value() {
        // scipy.stats.ttest_ind([1,2,3,4,5],[2,4,6,8,10]) -> t=-1.8973665961, p=0.0943497
        let r = two_sample_t_test(&[1.0, 2.0, 3.0, 4.0, 5.0], &[2.0, 4.0, 6.0, 8.0, 10.0]);
        assert!((r.statistic.value().unwrap() + 1.897_366_596_1).abs() < 1e-8);
        assert!((r.p_value.value().unwrap() - 0.094_349_7).abs() < 1e-5);
    }

    #[test]
    fn one_sample_against_zero() {
        // mean 2, sd sqrt(2/3), n 4
        let r = one_sample_t_test(&[1.0, 2.0, 2.0, 3.0], 0.0);
        let t = r.statistic.value().unwrap();
        assert!((t - 2.0 / ((2.0f64 / 3.0).sqrt() / 2.0)).abs() < 1e-9);
        assert!(r.p_value.value().unwrap() < 0.05);
    }

    #[test]
    fn wilcoxon_all_zero_is_reported() {
        let r = wilcoxon_signed_rank(&[0.0, 0.0, 0.0]);
        assert_eq!(r.p_value, Measure::Undefined(Undefined::AllZeroDifferences));
        assert_eq!(r.statistic, Measure::Undefined(Undefined::AllZeroDifferences));
    }

    #[test]
    fn wilcoxon_exact_small_sample() {
        // All five differences positive: W- = 0, p = 2 / 2^5.
        let r = wilcoxon_signed_rank(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(r.statistic, Measure::Defined(0.0));
        assert!((r.p_value.value().unwrap() - 0.0625).abs() < 1e-12);
    }

    #[test]
    fn wilcoxon_ties_use_normal_approximation() {
        let r = wilcoxon_signed_rank(&[20.0, 20.0, 20.0]);
        assert_eq!(r.n, 3);
        let p = r.p_value.value().unwrap();
        assert!(p > 0.05 && p < 0.2, "p={p}");
    }

    #[test]
    fn shapiro_accepts_symmetric_sample() {
        let xs: Vec<f64> = (1..=20)
            .map(|i| {
                let q = (i as f64 - 0.5) / 20.0;
                Normal::new(0.0, 1.0).unwrap().inverse_cdf(q)
            })
            .collect();
        let r = shapiro_wilk(&xs);
        assert!(r.statistic.value().unwrap() > 0.95);
        assert!(r.p_value.value().unwrap() > 0.5);
    }

    #[test]
    fn shapiro_rejects_heavy_outlier() {
        let mut xs = vec![1.0; 14];
        for (i, x) in xs.iter_mut().enumerate() {
            *x += i as f64 * 0.01;
        }
        xs.push(100.0);
        let r = shapiro_wilk(&xs);
        assert!(r.p_value.value().unwrap() < 0.01);
    }

    #[test]
    fn cohens_d_zero_std_is_undefined() {
        assert_eq!(cohens_d(&[3.0, 3.0, 3.0]), Measure::Undefined(Undefined::ZeroVariance));
        assert!((cohens_d(&[1.0, 3.0]).value().unwrap() - 2.0 / 2f64.sqrt()).abs() < 1e-12);
    }
}
