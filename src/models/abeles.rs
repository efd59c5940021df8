//! Abeles transfer-matrix reflectivity.
//!
//! For a stack of uniform slabs `0..n` (fronting medium first) and a wavevector
//! transfer `Q`, the z-component of the wavevector in slab `j` is
//!
//! ```text
//! k_j = sqrt((Q/2)² − 4π(ρ_j − ρ_0) + 4πi(ρ''_j + ε))
//! ```
//!
//! with `ε` a tiny absorption that keeps `k_j` off zero when a slab matches the
//! fronting medium (no 0/0 at Q = 0). The Fresnel coefficient of interface
//! `j | j+1` is damped by the Névot–Croce factor `exp(−2 k_j k_{j+1} σ_j²)`.
//!
//! Each slab contributes the characteristic matrix
//!
//! ```text
//! C_j = | 1        r_j |      p_j = exp(2 i k_j d_j)
//!       | r_j p_j  p_j |
//! ```
//!
//! (the fronting medium uses `p_0 = 1`). The matrices are accumulated from the
//! substrate upwards, `M = C_0 · C_1 ⋯ C_{n−2}`, and the reflected amplitude is
//! `r = M₁₀ / M₀₀`. Using `exp(2ikd)` instead of the symmetric `exp(±ikd)` form
//! keeps every entry bounded for absorbing or evanescent slabs.

use std::f64::consts::PI;

use num_complex::Complex64;
use rayon::prelude::*;

use crate::domain::Stack;
use crate::error::{FitError, FitResultOf};
use crate::models::profile::{slabs, EngineOptions, Slab};

/// Absorption floor (Å⁻²) added to every slab below the fronting medium.
const TINY: f64 = 1e-30;

const FOUR_PI: f64 = 4.0 * PI;

type Mat2 = [[Complex64; 2]; 2];

/// Reflected intensity `|r|²` at each Q.
pub fn reflectivity(stack: &Stack, q: &[f64], opts: &EngineOptions) -> FitResultOf<Vec<f64>> {
    let amps = amplitudes(stack, q, opts)?;
    Ok(amps.iter().map(|r| r.norm_sqr()).collect())
}

/// Complex reflection amplitude at each Q, evaluated in parallel.
pub fn amplitudes(stack: &Stack, q: &[f64], opts: &EngineOptions) -> FitResultOf<Vec<Complex64>> {
    if let Some(bad) = q.iter().find(|v| !(v.is_finite() && **v >= 0.0)) {
        return Err(FitError::invalid_dataset(format!(
            "Q values must be finite and >= 0, got {bad}"
        )));
    }
    let slabs = slabs(stack, opts)?;
    Ok(q.par_iter().map(|&qq| amplitude_at(&slabs, qq)).collect())
}

fn amplitude_at(slabs: &[Slab], q: f64) -> Complex64 {
    let n = slabs.len();
    let kz = 0.5 * q;
    let rho0 = slabs[0].sld.real;

    let wavevector = |j: usize| -> Complex64 {
        if j == 0 {
            return Complex64::new(kz, 0.0);
        }
        let sld = slabs[j].sld;
        Complex64::new(
            kz * kz - FOUR_PI * (sld.real - rho0),
            FOUR_PI * (sld.imag + TINY),
        )
        .sqrt()
    };

    let one = Complex64::new(1.0, 0.0);
    let zero = Complex64::new(0.0, 0.0);
    let mut m: Mat2 = [[one, zero], [zero, one]];

    let mut k_below = wavevector(n - 1);
    for j in (0..n - 1).rev() {
        let k_j = wavevector(j);
        let r = interface_coefficient(k_j, k_below, slabs[j].roughness);
        let c: Mat2 = if j == 0 {
            [[one, r], [r, one]]
        } else {
            let p = (Complex64::new(0.0, 2.0) * k_j * slabs[j].thickness).exp();
            [[one, r], [r * p, p]]
        };
        m = mul(&c, &m);
        k_below = k_j;
    }

    m[1][0] / m[0][0]
}

/// Fresnel coefficient between two media with Névot–Croce roughness damping.
fn interface_coefficient(k_upper: Complex64, k_lower: Complex64, sigma: f64) -> Complex64 {
    let r = (k_upper - k_lower) / (k_upper + k_lower);
    if sigma > 0.0 {
        r * (-2.0 * k_upper * k_lower * sigma * sigma).exp()
    } else {
        r
    }
}

fn mul(a: &Mat2, b: &Mat2) -> Mat2 {
    [
        [
            a[0][0] * b[0][0] + a[0][1] * b[1][0],
            a[0][0] * b[0][1] + a[0][1] * b[1][1],
        ],
        [
            a[1][0] * b[0][0] + a[1][1] * b[1][0],
            a[1][0] * b[0][1] + a[1][1] * b[1][1],
        ],
    ]
}
