//! PULSE Stats - Pure statistical comparator
//!
//! Deterministic, side-effect-free functions shared by the deployment impact
//! analyzer and the A/B variant comparator. Nothing in this crate knows about
//! time, I/O, or the sample store; callers hand in plain numbers.
//!
//! Edge cases are policy, not errors: a zero baseline yields a zero percent
//! change, and a zero standard error yields a non-significant result instead
//! of a division by zero.

#![deny(unsafe_code)]

use serde::{Deserialize, Serialize};

/// Significance level for all two-sided tests (95% confidence).
pub const ALPHA: f64 = 0.05;

/// Result of a two-proportion z-test.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ZTestResult {
    /// Test statistic.
    pub z: f64,

    /// Two-sided p-value.
    pub p_value: f64,

    /// Whether `p_value < 0.05`.
    pub significant: bool,
}

/// Comparison between two experiment variants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VariantComparison {
    /// Test statistic of the underlying z-test.
    pub z: f64,

    /// Two-sided p-value.
    pub p_value: f64,

    /// Whether the difference is statistically significant.
    pub significant: bool,

    /// Difference in conversion rates, `rate_b - rate_a`.
    pub effect_size: f64,
}

/// Percent change from `before` to `after`.
///
/// Defined as `0.0` when `before == 0` so a silent baseline never poisons
/// downstream aggregation with NaN or infinity.
pub fn percent_change(before: f64, after: f64) -> f64 {
    if before == 0.0 {
        return 0.0;
    }
    (after - before) / before * 100.0
}

/// Raw difference between two proportions, `p2 - p1`.
pub fn effect_size(p1: f64, p2: f64) -> f64 {
    p2 - p1
}

/// Arithmetic mean, or `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Two-proportion z-test with pooled standard error.
///
/// `success1`/`total1` and `success2`/`total2` are the per-variant counts.
/// A zero standard error (identical or empty variants) reports `z = 0`,
/// `p = 1`, not significant.
pub fn two_proportion_z_test(
    success1: u64,
    total1: u64,
    success2: u64,
    total2: u64,
) -> ZTestResult {
    if total1 == 0 || total2 == 0 {
        return ZTestResult {
            z: 0.0,
            p_value: 1.0,
            significant: false,
        };
    }

    let p1 = success1 as f64 / total1 as f64;
    let p2 = success2 as f64 / total2 as f64;
    let pooled = (success1 + success2) as f64 / (total1 + total2) as f64;
    let se =
        (pooled * (1.0 - pooled) * (1.0 / total1 as f64 + 1.0 / total2 as f64)).sqrt();

    if se == 0.0 {
        return ZTestResult {
            z: 0.0,
            p_value: 1.0,
            significant: false,
        };
    }

    let z = (p2 - p1) / se;
    let p_value = 2.0 * (1.0 - standard_normal_cdf(z.abs()));

    ZTestResult {
        z,
        p_value,
        significant: p_value < ALPHA,
    }
}

/// Compare two experiment variants: z-test plus effect size.
pub fn compare_variants(
    success_a: u64,
    total_a: u64,
    success_b: u64,
    total_b: u64,
) -> VariantComparison {
    let test = two_proportion_z_test(success_a, total_a, success_b, total_b);
    let rate_a = if total_a == 0 {
        0.0
    } else {
        success_a as f64 / total_a as f64
    };
    let rate_b = if total_b == 0 {
        0.0
    } else {
        success_b as f64 / total_b as f64
    };

    VariantComparison {
        z: test.z,
        p_value: test.p_value,
        significant: test.significant,
        effect_size: effect_size(rate_a, rate_b),
    }
}

/// Standard normal cumulative distribution function.
pub fn standard_normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / 2.0_f64.sqrt()))
}

/// Error function, Abramowitz and Stegun approximation 7.1.26.
///
/// Maximum absolute error 1.5e-7, more than enough for a fixed-alpha
/// significance decision.
fn erf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();

    sign * y
}
