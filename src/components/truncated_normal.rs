//! Gaussian truncated to a fixed interval `[low, high]`.

use rand::Rng;

use crate::data::FeatureTable;
use crate::error::{Error, Result};
use crate::math::{
    log_diff_exp, log_normal_mass, logsumexp, normal_logpdf, std_normal_logcdf,
    std_normal_quantile_from_log,
};
use crate::params::{Domain, LocalValues, ParamSpec, Parameter, ParameterSet};

#[derive(Debug, Clone, PartialEq)]
pub struct TruncatedNormalDensity {
    name: String,
    features: Vec<String>,
    low: f64,
    high: f64,
    params: ParameterSet,
}

impl TruncatedNormalDensity {
    pub fn new(
        name: &str,
        feature: &str,
        loc: &ParamSpec,
        scale: &ParamSpec,
        low: f64,
        high: f64,
    ) -> Result<Self> {
        check_interval(name, low, high)?;
        let mut params = ParameterSet::new();
        params.push(Parameter::new(name, "loc", Domain::Real, 1, loc)?)?;
        params.push(Parameter::new(name, "scale", Domain::Positive, 1, scale)?)?;
        Ok(Self {
            name: name.to_string(),
            features: vec![feature.to_string()],
            low,
            high,
            params,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.params
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.low, self.high)
    }

    pub fn log_prob(&self, values: &LocalValues<'_>, table: &FeatureTable) -> Result<Vec<f64>> {
        let loc = values.scalar("loc")?;
        let scale = values.scalar("scale")?;
        let x = table.column(&self.features[0])?;
        let log_z = log_normal_mass((self.low - loc) / scale, (self.high - loc) / scale);
        Ok(x
            .iter()
            .map(|&xi| truncated_logpdf(xi, loc, scale, self.low, self.high, log_z))
            .collect())
    }

    pub fn sample<R: Rng + ?Sized>(
        &self,
        values: &LocalValues<'_>,
        n: usize,
        rng: &mut R,
    ) -> Result<Vec<Vec<f64>>> {
        let loc = values.scalar("loc")?;
        let scale = values.scalar("scale")?;
        Ok(vec![
            (0..n)
                .map(|_| sample_truncated_normal(loc, scale, self.low, self.high, rng))
                .collect(),
        ])
    }
}

pub(crate) fn check_interval(owner: &str, low: f64, high: f64) -> Result<()> {
    if low.is_nan() || high.is_nan() || low >= high {
        return Err(Error::Config(format!(
            "component '{owner}': truncation interval needs low < high (got [{low}, {high}])"
        )));
    }
    Ok(())
}

/// Log density of a normal truncated to `[low, high]`, given `log_z` (the log in-interval mass).
#[inline]
pub(crate) fn truncated_logpdf(x: f64, loc: f64, scale: f64, low: f64, high: f64, log_z: f64) -> f64 {
    if x < low || x > high {
        return f64::NEG_INFINITY;
    }
    normal_logpdf(x, loc, scale) - log_z
}

/// Inverse-CDF draw from `Normal(loc, scale)` truncated to `[low, high]`.
pub(crate) fn sample_truncated_normal<R: Rng + ?Sized>(
    loc: f64,
    scale: f64,
    low: f64,
    high: f64,
    rng: &mut R,
) -> f64 {
    let a = (low - loc) / scale;
    let b = (high - loc) / scale;
    let u: f64 = rng.r#gen();
    let z = if a > 0.0 {
        // Upper tail: sample the mirrored interval where the CDF keeps precision.
        -truncated_std_quantile(-b, -a, u)
    } else {
        truncated_std_quantile(a, b, u)
    };
    (loc + scale * z).clamp(low, high)
}

/// Inverse CDF of the standard normal truncated to `[a, b]`, with `a <= 0`.
///
/// `ln Phi(z) = logsumexp(ln Phi(a), ln u + ln(Phi(b) - Phi(a)))`, so draws stay
/// spread over the interval however deep in the tail it lies.
fn truncated_std_quantile(a: f64, b: f64, u: f64) -> f64 {
    let la = std_normal_logcdf(a);
    let lb = std_normal_logcdf(b);
    let log_p = logsumexp(&[la, u.ln() + log_diff_exp(lb, la)]);
    std_normal_quantile_from_log(log_p).clamp(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Prior;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn density(low: f64, high: f64) -> TruncatedNormalDensity {
        TruncatedNormalDensity::new(
            "rv",
            "rv",
            &ParamSpec::new(0.0, Prior::Flat),
            &ParamSpec::new(1.0, Prior::Flat),
            low,
            high,
        )
        .unwrap()
    }

    #[test]
    fn integrates_to_one_on_support() {
        let d = density(-0.5, 2.0);
        let n = 20_000;
        let h = 2.5 / n as f64;
        let xs: Vec<f64> = (0..n).map(|i| -0.5 + (i as f64 + 0.5) * h).collect();
        let table = FeatureTable::new([("rv", xs)]).unwrap();
        let loc = [0.3];
        let scale = [0.8];
        let values = LocalValues::new("rv").with("loc", &loc).with("scale", &scale);
        let lp = d.log_prob(&values, &table).unwrap();
        let integral: f64 = lp.iter().map(|v| v.exp() * h).sum();
        assert!((integral - 1.0).abs() < 1e-6, "integral = {integral}");
    }

    #[test]
    fn outside_support_is_neg_infinity() {
        let d = density(0.0, 1.0);
        let loc = [0.0];
        let scale = [1.0];
        let values = LocalValues::new("rv").with("loc", &loc).with("scale", &scale);
        let table = FeatureTable::new([("rv", vec![-0.1, 1.1, 0.5])]).unwrap();
        let lp = d.log_prob(&values, &table).unwrap();
        assert_eq!(lp[0], f64::NEG_INFINITY);
        assert_eq!(lp[1], f64::NEG_INFINITY);
        assert!(lp[2].is_finite());
    }

    #[test]
    fn empty_interval_is_config_error() {
        let err = TruncatedNormalDensity::new(
            "rv",
            "rv",
            &ParamSpec::new(0.0, Prior::Flat),
            &ParamSpec::new(1.0, Prior::Flat),
            1.0,
            1.0,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn integrates_to_one_fifty_sigma_from_loc() {
        let d = density(0.0, 1.0);
        let n = 20_000;
        let h = 1.0 / n as f64;
        let xs: Vec<f64> = (0..n).map(|i| (i as f64 + 0.5) * h).collect();
        let table = FeatureTable::new([("rv", xs)]).unwrap();
        let loc = [-50.0];
        let scale = [1.0];
        let values = LocalValues::new("rv").with("loc", &loc).with("scale", &scale);
        let lp = d.log_prob(&values, &table).unwrap();
        let integral: f64 = lp.iter().map(|v| v.exp() * h).sum();
        assert!((integral - 1.0).abs() < 1e-4, "integral = {integral}");
    }

    #[test]
    fn far_tail_draws_follow_the_density() {
        // Beyond 38 sigma the interval mass underflows as a probability.
        // Here the draws are close to 50 * exp(-50 x) on [0, 1], mean ~0.02.
        let mut rng = StdRng::seed_from_u64(11);
        let draws: Vec<f64> = (0..4000)
            .map(|_| sample_truncated_normal(-50.0, 1.0, 0.0, 1.0, &mut rng))
            .collect();
        assert!(draws.iter().all(|x| (0.0..=1.0).contains(x)));
        let mean = draws.iter().sum::<f64>() / draws.len() as f64;
        assert!((mean - 0.02).abs() < 0.002, "mean = {mean}");
        let mirrored = sample_truncated_normal(50.0, 1.0, -1.0, 0.0, &mut rng);
        assert!((-1.0..=0.0).contains(&mirrored));
        assert!(draws.iter().filter(|&&x| x > 0.01).count() > 1000);
    }

    #[test]
    fn samples_stay_in_interval_even_in_far_tail() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..500 {
            let x = sample_truncated_normal(0.0, 1.0, 6.0, 7.0, &mut rng);
            assert!((6.0..=7.0).contains(&x));
            let y = sample_truncated_normal(2.0, 0.5, -1.0, 2.5, &mut rng);
            assert!((-1.0..=2.5).contains(&y));
        }
    }
}
