//! Small dense linear algebra on `nalgebra` matrices.
//!
//! The only heavy operation here is the Moore–Penrose pseudoinverse of a
//! symmetric matrix (a cost Hessian). We use a symmetric eigendecomposition and
//! drop directions whose eigenvalue is not clearly positive: a flat or
//! concave direction of the cost carries no curvature information, so its
//! variance is left undetermined instead of blowing up through a tiny pivot.

use nalgebra::DMatrix;

/// Relative eigenvalue cutoff (fraction of the largest eigenvalue).
pub const EIGEN_REL_EPS: f64 = 1e-12;

/// Pseudoinverse of a symmetric positive semi-definite matrix.
///
/// Returns the pseudoinverse and the number of directions that were dropped.
pub fn pinv_symmetric(m: &DMatrix<f64>) -> (DMatrix<f64>, usize) {
    let n = m.nrows();
    let eig = m.clone().symmetric_eigen();
    let max_eig = eig
        .eigenvalues
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(0.0_f64, f64::max);
    let cutoff = (max_eig * EIGEN_REL_EPS).max(f64::MIN_POSITIVE);

    let mut out = DMatrix::<f64>::zeros(n, n);
    let mut dropped = 0;
    for k in 0..n {
        let lambda = eig.eigenvalues[k];
        if !(lambda.is_finite() && lambda > cutoff) {
            dropped += 1;
            continue;
        }
        let v = eig.eigenvectors.column(k);
        out += (v * v.transpose()) / lambda;
    }
    (out, dropped)
}

/// Parameter covariance from the Hessian of a chi-square cost.
///
/// With `chi2 = -2 ln L`, the observed information is `H / 2`, so the
/// covariance is `2 H⁺`.
pub fn covariance_from_chi2_hessian(hessian: &DMatrix<f64>) -> (DMatrix<f64>, usize) {
    let (pinv, dropped) = pinv_symmetric(hessian);
    (pinv * 2.0, dropped)
}
