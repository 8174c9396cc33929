/// Natural cubic spline over strictly increasing knots.
///
/// Natural boundary means the second derivative is held at zero on both
/// ends, so the curve runs straight into its endpoints instead of
/// overshooting. Two knots degrade to plain linear interpolation.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    second_derivs: Vec<f64>,
}

impl CubicSpline {
    pub fn new(xs: &[f64], ys: &[f64]) -> Result<Self, SplineError> {
        if xs.len() != ys.len() {
            return Err(SplineError::LengthMismatch);
        }
        if xs.len() < 2 {
            return Err(SplineError::TooFewKnots);
        }
        if xs.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(SplineError::NonIncreasingKnots);
        }

        Ok(Self {
            xs: xs.to_vec(),
            ys: ys.to_vec(),
            second_derivs: natural_second_derivatives(xs, ys),
        })
    }

    /// Evaluates the interpolant at `x`.
    ///
    /// Callers are expected to stay within the knot span; anything outside
    /// clamps to the nearest endpoint, this is an interpolator not an
    /// extrapolator.
    pub fn evaluate(&self, x: f64) -> f64 {
        let first = self.xs[0];
        let last = self.xs[self.xs.len() - 1];
        debug_assert!(
            x >= first && x <= last,
            "evaluation point {} outside knot span [{}, {}]",
            x,
            first,
            last
        );
        let x = x.clamp(first, last);

        let mut lo = 0;
        let mut hi = self.xs.len() - 1;
        while hi - lo > 1 {
            let mid = (lo + hi) / 2;
            if self.xs[mid] > x {
                hi = mid;
            } else {
                lo = mid;
            }
        }

        let h = self.xs[hi] - self.xs[lo];
        let a = (self.xs[hi] - x) / h;
        let b = (x - self.xs[lo]) / h;

        a * self.ys[lo]
            + b * self.ys[hi]
            + ((a * a * a - a) * self.second_derivs[lo]
                + (b * b * b - b) * self.second_derivs[hi])
                * (h * h)
                / 6.0
    }
}

// Tridiagonal solve for the interior second derivatives, forward sweep then
// back substitution. The boundary rows are pinned at zero.
fn natural_second_derivatives(xs: &[f64], ys: &[f64]) -> Vec<f64> {
    let n = xs.len();
    let mut y2 = vec![0.0; n];
    let mut u = vec![0.0; n];

    for i in 1..n - 1 {
        let sig = (xs[i] - xs[i - 1]) / (xs[i + 1] - xs[i - 1]);
        let p = sig * y2[i - 1] + 2.0;
        y2[i] = (sig - 1.0) / p;

        let slope_right = (ys[i + 1] - ys[i]) / (xs[i + 1] - xs[i]);
        let slope_left = (ys[i] - ys[i - 1]) / (xs[i] - xs[i - 1]);
        u[i] = (6.0 * (slope_right - slope_left) / (xs[i + 1] - xs[i - 1]) - sig * u[i - 1]) / p;
    }

    for k in (0..n - 1).rev() {
        y2[k] = y2[k] * y2[k + 1] + u[k];
    }

    y2
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplineError {
    LengthMismatch,
    TooFewKnots,
    NonIncreasingKnots,
}

impl core::fmt::Display for SplineError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SplineError::LengthMismatch => write!(f, "knot and value arrays differ in length"),
            SplineError::TooFewKnots => write!(f, "at least two knots are required"),
            SplineError::NonIncreasingKnots => write!(f, "knots must be strictly increasing"),
        }
    }
}

impl std::error::Error for SplineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reproduces_knot_values_exactly() {
        let xs = [0.0, 1.0, 2.5, 4.0, 7.0];
        let ys = [1.0, -2.0, 0.5, 3.0, -1.0];
        let spline = CubicSpline::new(&xs, &ys).unwrap();

        for (x, y) in xs.iter().zip(ys.iter()) {
            assert!((spline.evaluate(*x) - y).abs() < 1e-12);
        }
    }

    #[test]
    fn linear_data_stays_linear() {
        let xs = [0.0, 10.0, 20.0, 30.0];
        let ys: Vec<f64> = xs.iter().map(|x| 2.0 * x + 1.0).collect();
        let spline = CubicSpline::new(&xs, &ys).unwrap();

        // A natural spline through collinear points is the line itself.
        for x in [3.0, 12.5, 17.0, 29.0] {
            assert!((spline.evaluate(x) - (2.0 * x + 1.0)).abs() < 1e-9);
        }
    }

    #[test]
    fn two_knots_interpolate_linearly() {
        let spline = CubicSpline::new(&[0.0, 10.0], &[0.0, 20.0]).unwrap();
        assert!((spline.evaluate(5.0) - 10.0).abs() < 1e-12);
        assert!((spline.evaluate(2.5) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn natural_boundary_conditions_hold() {
        let xs = [0.0, 1.0, 2.0, 3.0, 4.0];
        let ys = [0.0, 1.0, 4.0, 9.0, 16.0];
        let spline = CubicSpline::new(&xs, &ys).unwrap();

        assert_eq!(spline.second_derivs[0], 0.0);
        assert_eq!(spline.second_derivs[xs.len() - 1], 0.0);
    }

    #[test]
    fn smooth_curve_interpolates_closely() {
        let xs: Vec<f64> = (0..=8).map(|i| i as f64 * 0.5).collect();
        let ys: Vec<f64> = xs.iter().map(|x| x.sin()).collect();
        let spline = CubicSpline::new(&xs, &ys).unwrap();

        for x in [0.25, 1.1, 2.3, 3.7] {
            assert!((spline.evaluate(x) - x.sin()).abs() < 5e-3);
        }
    }

    #[test]
    fn rejects_bad_knots() {
        assert_eq!(
            CubicSpline::new(&[0.0, 1.0], &[0.0]).unwrap_err(),
            SplineError::LengthMismatch
        );
        assert_eq!(
            CubicSpline::new(&[0.0], &[1.0]).unwrap_err(),
            SplineError::TooFewKnots
        );
        assert_eq!(
            CubicSpline::new(&[0.0, 2.0, 2.0], &[1.0, 2.0, 3.0]).unwrap_err(),
            SplineError::NonIncreasingKnots
        );
        assert_eq!(
            CubicSpline::new(&[0.0, 2.0, 1.0], &[1.0, 2.0, 3.0]).unwrap_err(),
            SplineError::NonIncreasingKnots
        );
    }
}
