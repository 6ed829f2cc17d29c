//! Levenberg-Marquardt minimization of a sum of squared residuals.

use faer::prelude::SpSolver;

use crate::error::CalibError;

/// Parameters controlling the LM iterations.
#[derive(Debug, Clone)]
pub struct LMParams {
    /// Maximum number of LM iterations.
    pub max_iters: usize,
    /// Convergence threshold on the relative decrease of the cost.
    pub eps: f64,
    /// Initial damping factor (lambda).
    pub lambda_init: f64,
    /// Multiplicative factor to increase/decrease lambda.
    pub lambda_mul: f64,
}

impl Default for LMParams {
    fn default() -> Self {
        Self {
            max_iters: 30,
            eps: 1e-10,
            lambda_init: 1e-3,
            lambda_mul: 10.0,
        }
    }
}

/// Summary of a finished minimization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LMReport {
    /// Final sum of squared residuals.
    pub cost: f64,
    /// Root mean square of the residuals.
    pub rmse: f64,
    /// Number of iterations run.
    pub iterations: usize,
    /// Whether the cost decrease fell below the threshold.
    pub converged: bool,
}

/// A nonlinear least squares problem.
pub trait LeastSquaresProblem {
    /// Number of parameters.
    fn num_params(&self) -> usize;

    /// Number of residuals.
    fn num_residuals(&self) -> usize;

    /// Evaluate the residual vector at `x`.
    fn residuals(&self, x: &[f64], out: &mut [f64]);

    /// Evaluate the jacobian at `x`, one row per residual.
    ///
    /// The default implementation uses central differences.
    fn jacobian(&self, x: &[f64], jac: &mut faer::Mat<f64>) {
        let m = self.num_residuals();
        let mut xp = x.to_vec();
        let mut r_plus = vec![0.0; m];
        let mut r_minus = vec![0.0; m];
        for k in 0..x.len() {
            let h = 1e-6 * x[k].abs().max(1.0);
            xp[k] = x[k] + h;
            self.residuals(&xp, &mut r_plus);
            xp[k] = x[k] - h;
            self.residuals(&xp, &mut r_minus);
            xp[k] = x[k];
            for i in 0..m {
                jac.write(i, k, (r_plus[i] - r_minus[i]) / (2.0 * h));
            }
        }
    }
}

fn sum_sq(r: &[f64]) -> f64 {
    r.iter().map(|v| v * v).sum()
}

/// Minimize `problem` starting from `x`, which is updated in place.
///
/// Solves the damped normal equations `(J^T J + lambda diag(J^T J)) delta = -J^T r`
/// and accepts a step only when it lowers the cost.
pub fn levenberg_marquardt<P: LeastSquaresProblem>(
    problem: &P,
    x: &mut [f64],
    params: &LMParams,
) -> Result<LMReport, CalibError> {
    let n = problem.num_params();
    let m = problem.num_residuals();
    if x.len() != n {
        return Err(CalibError::MismatchedLengths(x.len(), n));
    }
    if m < n {
        return Err(CalibError::NotEnoughPoints {
            required: n,
            actual: m,
        });
    }

    let mut residuals = vec![0.0; m];
    let mut residuals_new = vec![0.0; m];
    problem.residuals(x, &mut residuals);
    let mut cost = sum_sq(&residuals);
    if !cost.is_finite() {
        return Err(CalibError::Degenerate("non finite initial cost".to_string()));
    }

    let mut jac = faer::Mat::<f64>::zeros(m, n);
    let mut lambda = params.lambda_init;
    let mut iterations = 0;
    let mut converged = false;
    let mut x_new = x.to_vec();

    while iterations < params.max_iters {
        iterations += 1;
        problem.jacobian(x, &mut jac);

        let jtj = jac.transpose() * jac.as_ref();
        let r_mat = faer::Mat::<f64>::from_fn(m, 1, |i, _| residuals[i]);
        let jtr = jac.transpose() * r_mat.as_ref();

        // retry with more damping until the cost goes down
        let mut accepted = false;
        while lambda < 1e16 {
            let a = faer::Mat::<f64>::from_fn(n, n, |i, j| {
                let v = jtj.read(i, j);
                if i == j {
                    v + lambda * v.max(1e-9)
                } else {
                    v
                }
            });
            let rhs = faer::Mat::<f64>::from_fn(n, 1, |i, _| -jtr.read(i, 0));
            let delta = a.partial_piv_lu().solve(rhs);

            let mut finite = true;
            for k in 0..n {
                let d = delta.read(k, 0);
                finite &= d.is_finite();
                x_new[k] = x[k] + d;
            }

            if finite {
                problem.residuals(&x_new, &mut residuals_new);
                let cost_new = sum_sq(&residuals_new);
                if cost_new.is_finite() && cost_new < cost {
                    let decrease = cost - cost_new;
                    x.copy_from_slice(&x_new);
                    residuals.copy_from_slice(&residuals_new);
                    cost = cost_new;
                    lambda = (lambda / params.lambda_mul).max(1e-12);
                    accepted = true;
                    if decrease <= params.eps * cost.max(f64::MIN_POSITIVE) {
                        converged = true;
                    }
                    break;
                }
            }
            lambda *= params.lambda_mul;
        }

        if !accepted {
            // no descent direction left, we are at a minimum up to precision
            converged = true;
            break;
        }
        if converged {
            break;
        }
    }

    log::debug!(
        "levenberg-marquardt finished: cost {:.6e}, {} iterations, converged {}",
        cost,
        iterations,
        converged
    );

    Ok(LMReport {
        cost,
        rmse: (cost / m as f64).sqrt(),
        iterations,
        converged,
    })
}
