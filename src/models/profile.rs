//! Stack → slab list conversion and SLD depth profiles.
//!
//! The matrix recursion only understands uniform slabs separated by
//! (Névot–Croce) rough interfaces. Everything else is reduced to that here:
//!
//! - graded layers become `subdivisions` uniform slabs following the linear
//!   SLD ramp, with sharp internal interfaces
//! - in microslice mode the whole error-function profile is sampled into thin
//!   slabs and every interface roughness becomes zero

use statrs::function::erf::erf;

use crate::domain::{ProfilePoint, Profile, Sld, Stack};
use crate::error::{FitError, FitResultOf};

/// Upper limit on the slabs produced by microslicing.
pub const MAX_MICROSLICES: usize = 20_000;

/// Numerical controls of the optical engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineOptions {
    /// Uniform slabs per graded layer.
    pub subdivisions: usize,
    /// Slab thickness (Å) for microslicing rough interfaces; `None` keeps the
    /// Névot–Croce approximation.
    pub microslice: Option<f64>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            subdivisions: 10,
            microslice: None,
        }
    }
}

/// Uniform slab fed to the matrix recursion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slab {
    pub thickness: f64,
    pub sld: Sld,
    /// Roughness of the interface below this slab.
    pub roughness: f64,
}

/// Reduce a stack to uniform slabs, fronting first and backing last.
pub fn slabs(stack: &Stack, opts: &EngineOptions) -> FitResultOf<Vec<Slab>> {
    let n_sub = opts.subdivisions.max(1);
    let layers = stack.layers();
    let last = layers.len() - 1;

    let mut out = Vec::with_capacity(layers.len());
    for (i, layer) in layers.iter().enumerate() {
        let thickness = if i == 0 || i == last { 0.0 } else { layer.thickness };
        match layer.profile {
            Profile::Uniform => out.push(Slab {
                thickness,
                sld: layer.sld,
                roughness: layer.roughness,
            }),
            Profile::Graded { sld_end } => {
                let d = thickness / n_sub as f64;
                for k in 0..n_sub {
                    let u = (k as f64 + 0.5) / n_sub as f64;
                    out.push(Slab {
                        thickness: d,
                        sld: layer.sld.lerp(&sld_end, u),
                        roughness: if k + 1 == n_sub { layer.roughness } else { 0.0 },
                    });
                }
            }
        }
    }

    match opts.microslice {
        None => Ok(out),
        Some(dz) => microslice(&out, dz),
    }
}

/// Depth (Å) of every interface below the fronting medium; interface `j` sits
/// between slab `j` and slab `j + 1`.
fn interface_depths(slabs: &[Slab]) -> Vec<f64> {
    let mut depths = Vec::with_capacity(slabs.len().saturating_sub(1));
    let mut z = 0.0;
    for j in 0..slabs.len() - 1 {
        if j > 0 {
            z += slabs[j].thickness;
        }
        depths.push(z);
    }
    depths
}

/// Complex SLD at depth `z` with error-function interfaces.
fn sld_at(slabs: &[Slab], depths: &[f64], z: f64) -> Sld {
    let mut sld = slabs[0].sld;
    for (j, &zj) in depths.iter().enumerate() {
        let step_real = slabs[j + 1].sld.real - slabs[j].sld.real;
        let step_imag = slabs[j + 1].sld.imag - slabs[j].sld.imag;
        let sigma = slabs[j].roughness;
        let weight = if sigma > 0.0 {
            0.5 * (1.0 + erf((z - zj) / (sigma * std::f64::consts::SQRT_2)))
        } else if z >= zj {
            1.0
        } else {
            0.0
        };
        sld.real += step_real * weight;
        sld.imag += step_imag * weight;
    }
    sld
}

fn microslice(slabs: &[Slab], dz: f64) -> FitResultOf<Vec<Slab>> {
    if !(dz.is_finite() && dz > 0.0) {
        return Err(FitError::invalid_parameter(format!(
            "microslice thickness must be finite and > 0, got {dz}"
        )));
    }

    let depths = interface_depths(slabs);
    let max_sigma = slabs.iter().map(|s| s.roughness).fold(0.0_f64, f64::max);
    let z_top = depths.first().copied().unwrap_or(0.0) - 4.0 * max_sigma;
    let z_bottom = depths.last().copied().unwrap_or(0.0) + 4.0 * max_sigma;
    let span = z_bottom - z_top;
    if span <= 0.0 {
        // Sharp single interface: nothing to slice.
        return Ok(slabs
            .iter()
            .map(|s| Slab { roughness: 0.0, ..*s })
            .collect());
    }

    let count = (span / dz).ceil().max(1.0);
    if count > MAX_MICROSLICES as f64 {
        return Err(FitError::invalid_parameter(format!(
            "microslicing {span:.1} A at {dz} A needs {count} slabs, the limit is {MAX_MICROSLICES}"
        )));
    }
    let n = count as usize;
    let d = span / n as f64;

    let mut out = Vec::with_capacity(n + 2);
    out.push(Slab {
        thickness: 0.0,
        sld: slabs[0].sld,
        roughness: 0.0,
    });
    for k in 0..n {
        let z = z_top + (k as f64 + 0.5) * d;
        out.push(Slab {
            thickness: d,
            sld: sld_at(slabs, &depths, z),
            roughness: 0.0,
        });
    }
    out.push(Slab {
        thickness: 0.0,
        sld: slabs[slabs.len() - 1].sld,
        roughness: 0.0,
    });
    Ok(out)
}

/// Real SLD versus depth, `points` samples spanning the film plus margins.
pub fn sld_profile(stack: &Stack, opts: &EngineOptions, points: usize) -> FitResultOf<Vec<ProfilePoint>> {
    let base = EngineOptions {
        microslice: None,
        ..*opts
    };
    let slabs = slabs(stack, &base)?;
    let depths = interface_depths(&slabs);

    let max_sigma = slabs.iter().map(|s| s.roughness).fold(0.0_f64, f64::max);
    let margin = 4.0 * max_sigma + 10.0;
    let z0 = depths.first().copied().unwrap_or(0.0) - margin;
    let z1 = depths.last().copied().unwrap_or(0.0) + margin;

    let n = points.max(2);
    let step = (z1 - z0) / (n as f64 - 1.0);
    Ok((0..n)
        .map(|i| {
            let z = z0 + step * i as f64;
            ProfilePoint {
                z,
                sld: sld_at(&slabs, &depths, z).real,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Layer;
    use approx::assert_relative_eq;

    fn film(roughness: f64) -> Stack {
        Stack::new(vec![
            Layer::medium(Sld::real(0.0), roughness),
            Layer::new(100.0, Sld::real(4.0e-6), roughness),
            Layer::medium(Sld::real(2.07e-6), 0.0),
        ])
        .unwrap()
    }

    #[test]
    fn graded_layer_is_subdivided() {
        let stack = Stack::new(vec![
            Layer::medium(Sld::real(0.0), 0.0),
            Layer::new(50.0, Sld::real(1.0e-6), 2.0).graded(Sld::real(3.0e-6)),
            Layer::medium(Sld::real(2.07e-6), 0.0),
        ])
        .unwrap();
        let opts = EngineOptions {
            subdivisions: 5,
            microslice: None,
        };
        let s = slabs(&stack, &opts).unwrap();
        assert_eq!(s.len(), 7);
        let total: f64 = s[1..6].iter().map(|x| x.thickness).sum();
        assert_relative_eq!(total, 50.0, epsilon = 1e-12);
        assert_relative_eq!(s[1].sld.real, 1.2e-6, epsilon = 1e-18);
        assert_relative_eq!(s[5].sld.real, 2.8e-6, epsilon = 1e-18);
        // Only the last slab keeps the layer's interface roughness.
        assert_eq!(s[1].roughness, 0.0);
        assert_eq!(s[5].roughness, 2.0);
    }

    #[test]
    fn media_thickness_is_ignored() {
        let stack = Stack::new(vec![
            Layer::new(1e9, Sld::real(0.0), 0.0),
            Layer::new(1e9, Sld::real(2.07e-6), 0.0),
        ])
        .unwrap();
        let s = slabs(&stack, &EngineOptions::default()).unwrap();
        assert!(s.iter().all(|x| x.thickness == 0.0));
    }

    #[test]
    fn profile_is_a_step_without_roughness() {
        let p = sld_profile(&film(0.0), &EngineOptions::default(), 401).unwrap();
        for pt in &p {
            let expected = if pt.z < 0.0 {
                0.0
            } else if pt.z < 100.0 {
                4.0e-6
            } else {
                2.07e-6
            };
            assert_relative_eq!(pt.sld, expected, epsilon = 1e-18);
        }
    }

    #[test]
    fn rough_profile_crosses_midpoint_at_interface() {
        let stack = film(5.0);
        let s = slabs(&stack, &EngineOptions::default()).unwrap();
        let depths = interface_depths(&s);
        let mid = sld_at(&s, &depths, 0.0).real;
        assert_relative_eq!(mid, 2.0e-6, epsilon = 1e-12);
    }

    #[test]
    fn microslicing_removes_roughness() {
        let opts = EngineOptions {
            subdivisions: 10,
            microslice: Some(1.0),
        };
        let s = slabs(&film(3.0), &opts).unwrap();
        assert!(s.iter().all(|x| x.roughness == 0.0));
        assert!(s.len() > 100);

        let bad = EngineOptions {
            subdivisions: 10,
            microslice: Some(0.0),
        };
        assert!(slabs(&film(3.0), &bad).is_err());
    }

    #[test]
    fn microslice_count_is_capped() {
        let opts = EngineOptions {
            subdivisions: 10,
            microslice: Some(1e-4),
        };
        let err = slabs(&film(3.0), &opts).unwrap_err();
        assert!(matches!(err, FitError::InvalidParameter { .. }));
        assert!(err.to_string().contains("limit"), "{err}");

        let huge_roughness = Stack::new(vec![
            Layer::medium(Sld::real(0.0), 1e6),
            Layer::medium(Sld::real(2.07e-6), 0.0),
        ])
        .unwrap();
        let coarse = EngineOptions {
            subdivisions: 10,
            microslice: Some(1.0),
        };
        assert!(slabs(&huge_roughness, &coarse).is_err());
    }
}
