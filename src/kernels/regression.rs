//! Ordinary-least-squares slope/intercept from the four sufficient
//! statistics. The degenerate case (constant x, near-zero denominator)
//! resolves to slope 0 and intercept mean(y) rather than an error: every
//! caller in this crate treats a flat fit as "no trend".

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Regression {
    pub slope: f64,
    pub intercept: f64,
}

const DEGENERATE_EPS: f64 = 1e-12;

pub fn linear_regression(x: &[f64], y: &[f64]) -> Regression {
    let n = x.len().min(y.len());
    if n == 0 {
        return Regression {
            slope: 0.0,
            intercept: 0.0,
        };
    }

    let mut sum_x = 0.0f64;
    let mut sum_y = 0.0f64;
    let mut sum_xy = 0.0f64;
    let mut sum_xx = 0.0f64;
    for i in 0..n {
        let xi = x[i];
        let yi = y[i];
        sum_x += xi;
        sum_y += yi;
        sum_xy = xi.mul_add(yi, sum_xy);
        sum_xx = xi.mul_add(xi, sum_xx);
    }

    let nf = n as f64;
    let denom = nf.mul_add(sum_xx, -(sum_x * sum_x));
    if denom.abs() < DEGENERATE_EPS {
        return Regression {
            slope: 0.0,
            intercept: sum_y / nf,
        };
    }

    let slope = nf.mul_add(sum_xy, -(sum_x * sum_y)) / denom;
    let intercept = (sum_y - slope * sum_x) / nf;
    Regression { slope, intercept }
}
