//! Scalar special functions used by the densities and transforms.
//!
//! Everything works in log space where it matters:
//! - `logsumexp` for mixture totals
//! - log normal densities, the log-CDF and log in-interval normal mass for
//!   truncation (no probability is formed and re-logged)
//! - stable logistic helpers for the bounded/simplex transforms

use statrs::function::erf::{erfc, erfc_inv};

/// `ln(sqrt(2*pi))`.
pub const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_7;

/// Numerically stable `ln(sum(exp(x_i)))`.
///
/// All `-inf` inputs give `-inf`; any NaN propagates.
pub fn logsumexp(values: &[f64]) -> f64 {
    if values.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    if max == f64::INFINITY {
        return f64::INFINITY;
    }
    let sum: f64 = values.iter().map(|v| (v - max).exp()).sum();
    max + sum.ln()
}

/// Log density of `Normal(loc, scale)` at `x`.
#[inline]
pub fn normal_logpdf(x: f64, loc: f64, scale: f64) -> f64 {
    let z = (x - loc) / scale;
    -0.5 * z * z - scale.ln() - LN_SQRT_2PI
}

/// Standard normal CDF.
#[inline]
pub fn std_normal_cdf(z: f64) -> f64 {
    0.5 * erfc(-z / std::f64::consts::SQRT_2)
}

/// Standard normal quantile (inverse CDF).
#[inline]
pub fn std_normal_quantile(p: f64) -> f64 {
    -std::f64::consts::SQRT_2 * erfc_inv(2.0 * p)
}

/// Below this the log-CDF switches to the asymptotic (Mills ratio) series.
const LOG_CDF_ASYMPTOTIC_BELOW: f64 = -20.0;

/// `ln(Phi(z))`, finite for every finite `z`.
pub fn std_normal_logcdf(z: f64) -> f64 {
    if z.is_nan() {
        return f64::NAN;
    }
    if z > 0.0 {
        (-0.5 * erfc(z / std::f64::consts::SQRT_2)).ln_1p()
    } else if z >= LOG_CDF_ASYMPTOTIC_BELOW {
        (0.5 * erfc(-z / std::f64::consts::SQRT_2)).ln()
    } else {
        // Phi(z) = phi(z) / -z * (1 - 1/z^2 + 3/z^4 - 15/z^6 + 105/z^8 - ...)
        let r = 1.0 / (z * z);
        let series = 1.0 - r * (1.0 - r * (3.0 - r * (15.0 - 105.0 * r)));
        -0.5 * z * z - (-z).ln() - LN_SQRT_2PI + series.ln()
    }
}

/// `ln(exp(a) - exp(b))` for `a >= b`.
#[inline]
pub fn log_diff_exp(a: f64, b: f64) -> f64 {
    if b == f64::NEG_INFINITY {
        return a;
    }
    a + (-((b - a).exp())).ln_1p()
}

/// `ln(Phi(b) - Phi(a))` for standardized bounds `a < b`, computed in log space.
///
/// When both bounds sit in the upper tail the mirrored form
/// `Phi(-a) - Phi(-b)` is used so both terms are lower-tail log-CDFs.
pub fn log_normal_mass(a: f64, b: f64) -> f64 {
    if a > 0.0 {
        log_diff_exp(std_normal_logcdf(-a), std_normal_logcdf(-b))
    } else {
        log_diff_exp(std_normal_logcdf(b), std_normal_logcdf(a))
    }
}

/// Standard normal quantile of `exp(log_p)`.
///
/// Log-probabilities too small for [`std_normal_quantile`] are inverted by
/// Newton steps on [`std_normal_logcdf`].
pub fn std_normal_quantile_from_log(log_p: f64) -> f64 {
    if log_p == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    if log_p > -700.0 {
        return std_normal_quantile(log_p.exp());
    }
    let mut z = -(-2.0 * log_p).sqrt();
    for _ in 0..50 {
        let lc = std_normal_logcdf(z);
        // d/dz ln Phi(z) = phi(z) / Phi(z)
        let slope = (-0.5 * z * z - LN_SQRT_2PI - lc).exp();
        let step = (lc - log_p) / slope;
        z -= step;
        if step.abs() <= 1e-12 * z.abs().max(1.0) {
            break;
        }
    }
    z
}

/// `ln(1 + exp(x))` without overflow.
#[inline]
pub fn log1pexp(x: f64) -> f64 {
    if x > 0.0 {
        x + (-x).exp().ln_1p()
    } else {
        x.exp().ln_1p()
    }
}

/// Logistic sigmoid.
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// `ln(sigmoid(x))`.
#[inline]
pub fn log_sigmoid(x: f64) -> f64 {
    -log1pexp(-x)
}

/// Inverse of [`sigmoid`]; `p` is clamped away from 0 and 1.
#[inline]
pub fn logit(p: f64) -> f64 {
    let p = p.clamp(1e-15, 1.0 - 1e-15);
    (p / (1.0 - p)).ln()
}

/// Linear-interpolated quantile of already sorted values.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            let frac = pos - lo as f64;
            sorted[lo] + frac * (sorted[hi] - sorted[lo])
        }
    }
}
