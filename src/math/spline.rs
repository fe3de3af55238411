//! Knot-grid interpolation for spline-parameterized density shapes.
//!
//! A [`KnotGrid`] is a fixed, strictly increasing set of control-coordinate
//! values. Shape values live at the knots; between knots they are interpolated
//! either piecewise linearly or with a monotone cubic Hermite curve using
//! Fritsch–Carlson slopes (no overshoot, so a monotone or positive knot
//! sequence stays monotone or positive between knots).
//!
//! Control values outside the grid are handled by an explicit
//! [`Extrapolation`] policy.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How shape values are interpolated between knots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    #[default]
    Linear,
    MonotoneCubic,
}

/// What happens to control values outside the knot range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Extrapolation {
    /// Hold the boundary knot value.
    #[default]
    Clip,
    /// Reject the value.
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct KnotGrid {
    knots: Vec<f64>,
}

impl KnotGrid {
    pub fn new(knots: Vec<f64>) -> Result<Self> {
        if knots.len() < 2 {
            return Err(Error::Config(format!(
                "knot grid needs at least 2 knots (got {})",
                knots.len()
            )));
        }
        if knots.iter().any(|k| !k.is_finite()) {
            return Err(Error::Config("knot grid contains non-finite values".into()));
        }
        if knots.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Error::Config("knot grid must be strictly increasing".into()));
        }
        Ok(Self { knots })
    }

    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    pub fn len(&self) -> usize {
        self.knots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.knots.is_empty()
    }

    pub fn low(&self) -> f64 {
        self.knots[0]
    }

    pub fn high(&self) -> f64 {
        self.knots[self.knots.len() - 1]
    }

    pub fn contains(&self, x: f64) -> bool {
        x >= self.low() && x <= self.high()
    }

    /// Interpolator over `values` (one per knot).
    ///
    /// Monotone-cubic slopes are computed once here so evaluating many control
    /// values is a binary search plus a few flops each.
    pub fn interpolator<'a>(
        &'a self,
        values: &'a [f64],
        interpolation: Interpolation,
    ) -> Result<Interpolator<'a>> {
        if values.len() != self.knots.len() {
            return Err(Error::Config(format!(
                "expected {} knot values, got {}",
                self.knots.len(),
                values.len()
            )));
        }
        let slopes = match interpolation {
            Interpolation::Linear => Vec::new(),
            Interpolation::MonotoneCubic => fritsch_carlson_slopes(&self.knots, values),
        };
        Ok(Interpolator {
            knots: &self.knots,
            values,
            slopes,
            interpolation,
        })
    }
}

impl TryFrom<Vec<f64>> for KnotGrid {
    type Error = Error;

    fn try_from(knots: Vec<f64>) -> Result<Self> {
        KnotGrid::new(knots)
    }
}

impl From<KnotGrid> for Vec<f64> {
    fn from(grid: KnotGrid) -> Self {
        grid.knots
    }
}

pub struct Interpolator<'a> {
    knots: &'a [f64],
    values: &'a [f64],
    slopes: Vec<f64>,
    interpolation: Interpolation,
}

impl Interpolator<'_> {
    /// Value at `x`, or `None` if `x` is outside the grid under [`Extrapolation::Error`].
    pub fn eval(&self, x: f64, extrapolation: Extrapolation) -> Option<f64> {
        let last = self.knots.len() - 1;
        if x.is_nan() {
            return Some(f64::NAN);
        }
        if x <= self.knots[0] {
            if x < self.knots[0] && extrapolation == Extrapolation::Error {
                return None;
            }
            return Some(self.values[0]);
        }
        if x >= self.knots[last] {
            if x > self.knots[last] && extrapolation == Extrapolation::Error {
                return None;
            }
            return Some(self.values[last]);
        }

        let i = match self.knots.binary_search_by(|k| k.total_cmp(&x)) {
            Ok(i) => return Some(self.values[i]),
            Err(i) => i - 1,
        };

        let x0 = self.knots[i];
        let h = self.knots[i + 1] - x0;
        let t = (x - x0) / h;
        let y0 = self.values[i];
        let y1 = self.values[i + 1];

        let value = match self.interpolation {
            Interpolation::Linear => y0 + t * (y1 - y0),
            Interpolation::MonotoneCubic => {
                let t2 = t * t;
                let t3 = t2 * t;
                let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
                let h10 = t3 - 2.0 * t2 + t;
                let h01 = -2.0 * t3 + 3.0 * t2;
                let h11 = t3 - t2;
                h00 * y0 + h10 * h * self.slopes[i] + h01 * y1 + h11 * h * self.slopes[i + 1]
            }
        };
        Some(value)
    }
}

/// Fritsch–Carlson monotone slopes for knots `x` and values `y`.
pub fn fritsch_carlson_slopes(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len();
    if n < 2 {
        return vec![0.0; n];
    }
    let delta: Vec<f64> = (0..n - 1).map(|i| (y[i + 1] - y[i]) / (x[i + 1] - x[i])).collect();

    let mut m = vec![0.0; n];
    m[0] = delta[0];
    m[n - 1] = delta[n - 2];
    for i in 1..n - 1 {
        if delta[i - 1] * delta[i] > 0.0 {
            m[i] = 0.5 * (delta[i - 1] + delta[i]);
        }
    }

    for i in 0..n - 1 {
        if delta[i] == 0.0 {
            m[i] = 0.0;
            m[i + 1] = 0.0;
            continue;
        }
        let a = m[i] / delta[i];
        let b = m[i + 1] / delta[i];
        let s = a * a + b * b;
        if s > 9.0 {
            let tau = 3.0 / s.sqrt();
            m[i] = tau * a * delta[i];
            m[i + 1] = tau * b * delta[i];
        }
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn rejects_bad_grids() {
        assert!(KnotGrid::new(vec![0.0]).is_err());
        assert!(KnotGrid::new(vec![0.0, 0.0, 1.0]).is_err());
        assert!(KnotGrid::new(vec![1.0, 0.0]).is_err());
        assert!(KnotGrid::new(vec![0.0, f64::NAN]).is_err());
    }

    #[test]
    fn linear_midpoint_between_knots() {
        let grid = KnotGrid::new(vec![0.0, 1.0, 2.0]).unwrap();
        let values = [1.0, 2.0, 3.0];
        let interp = grid.interpolator(&values, Interpolation::Linear).unwrap();
        assert_relative_eq!(interp.eval(1.5, Extrapolation::Clip).unwrap(), 2.5);
    }

    #[test]
    fn knots_are_reproduced_exactly() {
        let grid = KnotGrid::new(vec![-3.0, -0.5, 2.0, 7.5]).unwrap();
        let values = [0.1, 0.7, -0.3, 4.2];
        for interpolation in [Interpolation::Linear, Interpolation::MonotoneCubic] {
            let interp = grid.interpolator(&values, interpolation).unwrap();
            for (k, v) in grid.knots().iter().zip(values) {
                assert_eq!(interp.eval(*k, Extrapolation::Error), Some(v));
            }
        }
    }

    #[test]
    fn clip_holds_boundary_and_error_rejects() {
        let grid = KnotGrid::new(vec![0.0, 1.0]).unwrap();
        let values = [5.0, 6.0];
        let interp = grid.interpolator(&values, Interpolation::Linear).unwrap();
        assert_eq!(interp.eval(-10.0, Extrapolation::Clip), Some(5.0));
        assert_eq!(interp.eval(10.0, Extrapolation::Clip), Some(6.0));
        assert_eq!(interp.eval(-10.0, Extrapolation::Error), None);
        assert_eq!(interp.eval(1.0 + 1e-9, Extrapolation::Error), None);
    }

    #[test]
    fn monotone_cubic_reproduces_linear_data() {
        let grid = KnotGrid::new(vec![0.0, 1.0, 2.0]).unwrap();
        let values = [1.0, 2.0, 3.0];
        let interp = grid.interpolator(&values, Interpolation::MonotoneCubic).unwrap();
        assert_relative_eq!(interp.eval(1.5, Extrapolation::Clip).unwrap(), 2.5, epsilon = 1e-12);
        assert_relative_eq!(interp.eval(0.25, Extrapolation::Clip).unwrap(), 1.25, epsilon = 1e-12);
    }

    #[test]
    fn flat_segment_has_zero_slopes() {
        let m = fritsch_carlson_slopes(&[0.0, 1.0, 2.0, 3.0], &[0.0, 1.0, 1.0, 2.0]);
        assert_eq!(m[1], 0.0);
        assert_eq!(m[2], 0.0);
    }

    proptest! {
        #[test]
        fn monotone_cubic_preserves_increasing_values(
            increments in proptest::collection::vec(0.0f64..5.0, 1..8),
            start in -10.0f64..10.0,
        ) {
            let n = increments.len() + 1;
            let knots: Vec<f64> = (0..n).map(|i| i as f64).collect();
            let mut values = vec![start];
            for inc in &increments {
                let last = values[values.len() - 1];
                values.push(last + inc);
            }
            let grid = KnotGrid::new(knots).unwrap();
            let interp = grid.interpolator(&values, Interpolation::MonotoneCubic).unwrap();
            let mut prev = f64::NEG_INFINITY;
            for step in 0..=(20 * (n - 1)) {
                let x = step as f64 / 20.0;
                let v = interp.eval(x, Extrapolation::Clip).unwrap();
                prop_assert!(v >= prev - 1e-9);
                prev = v;
            }
        }
    }
}
