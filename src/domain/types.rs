//! Physical model and measurement types.
//!
//! Units used throughout the crate:
//!
//! - Q in Å⁻¹
//! - thickness and roughness in Å
//! - scattering length density (SLD) in Å⁻² (e.g. silicon ≈ 2.07e-6)

use serde::{Deserialize, Serialize};

use crate::error::{FitError, FitResultOf};

/// Complex scattering length density.
///
/// `imag > 0` describes absorption.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Sld {
    pub real: f64,
    #[serde(default)]
    pub imag: f64,
}

impl Sld {
    pub const fn new(real: f64, imag: f64) -> Self {
        Self { real, imag }
    }

    pub const fn real(real: f64) -> Self {
        Self { real, imag: 0.0 }
    }

    pub fn is_finite(&self) -> bool {
        self.real.is_finite() && self.imag.is_finite()
    }

    /// Linear interpolation between `self` (u=0) and `other` (u=1).
    pub fn lerp(&self, other: &Sld, u: f64) -> Sld {
        Sld {
            real: self.real + (other.real - self.real) * u,
            imag: self.imag + (other.imag - self.imag) * u,
        }
    }
}

/// SLD variation across a layer's depth.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Profile {
    /// Constant SLD through the layer.
    #[default]
    Uniform,
    /// SLD varies linearly from the layer's `sld` (top) to `sld_end` (bottom).
    Graded { sld_end: Sld },
}

/// One entry of a film stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Thickness in Å. Ignored for the fronting and backing media.
    pub thickness: f64,
    pub sld: Sld,
    /// Width (Å) of the interface *below* this layer. Ignored for the backing medium.
    pub roughness: f64,
    #[serde(default)]
    pub profile: Profile,
}

impl Layer {
    pub fn new(thickness: f64, sld: Sld, roughness: f64) -> Self {
        Self {
            name: None,
            thickness,
            sld,
            roughness,
            profile: Profile::Uniform,
        }
    }

    /// A semi-infinite medium (fronting or backing).
    pub fn medium(sld: Sld, roughness: f64) -> Self {
        Self::new(0.0, sld, roughness)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn graded(mut self, sld_end: Sld) -> Self {
        self.profile = Profile::Graded { sld_end };
        self
    }

    /// Label used in messages: the name if any, else `layer{index}`.
    pub fn label(&self, index: usize) -> String {
        self.name.clone().unwrap_or_else(|| format!("layer{index}"))
    }
}

/// Ordered layers from the incident medium (fronting) down to the substrate (backing).
///
/// The fronting and backing media are semi-infinite; interior layers carry a
/// finite thickness. A `Stack` is validated on construction and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Layer>", into = "Vec<Layer>")]
pub struct Stack {
    layers: Vec<Layer>,
}

impl Stack {
    pub fn new(layers: Vec<Layer>) -> FitResultOf<Self> {
        validate_layers(&layers)?;
        Ok(Self { layers })
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn fronting(&self) -> &Layer {
        &self.layers[0]
    }

    pub fn backing(&self) -> &Layer {
        &self.layers[self.layers.len() - 1]
    }

    /// Layers strictly between the fronting and backing media.
    pub fn interior(&self) -> &[Layer] {
        &self.layers[1..self.layers.len() - 1]
    }

    /// Sum of interior layer thicknesses.
    pub fn total_thickness(&self) -> f64 {
        self.interior().iter().map(|l| l.thickness).sum()
    }
}

impl TryFrom<Vec<Layer>> for Stack {
    type Error = FitError;

    fn try_from(layers: Vec<Layer>) -> Result<Self, Self::Error> {
        Stack::new(layers)
    }
}

impl From<Stack> for Vec<Layer> {
    fn from(stack: Stack) -> Self {
        stack.layers
    }
}

fn validate_layers(layers: &[Layer]) -> FitResultOf<()> {
    if layers.len() < 2 {
        return Err(FitError::invalid_stack(format!(
            "a stack needs a fronting and a backing medium, got {} layer(s)",
            layers.len()
        )));
    }

    let last = layers.len() - 1;
    for (i, layer) in layers.iter().enumerate() {
        let label = layer.label(i);
        if !(layer.thickness.is_finite() && layer.thickness >= 0.0) {
            // Media are semi-infinite, but a negative value is still a malformed model.
            return Err(FitError::invalid_stack(format!(
                "{label}: thickness must be finite and >= 0, got {}",
                layer.thickness
            )));
        }
        if !(layer.roughness.is_finite() && layer.roughness >= 0.0) {
            return Err(FitError::invalid_stack(format!(
                "{label}: roughness must be finite and >= 0, got {}",
                layer.roughness
            )));
        }
        if !layer.sld.is_finite() {
            return Err(FitError::invalid_stack(format!("{label}: SLD must be finite")));
        }
        if let Profile::Graded { sld_end } = layer.profile {
            if i == 0 || i == last {
                return Err(FitError::invalid_stack(format!(
                    "{label}: the fronting and backing media cannot be graded"
                )));
            }
            if !sld_end.is_finite() {
                return Err(FitError::invalid_stack(format!("{label}: end SLD must be finite")));
            }
        }
    }
    Ok(())
}

/// One measured reflectivity point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub q: f64,
    pub r: f64,
    /// One-sigma uncertainty of `r`.
    pub dr: f64,
    /// Resolution FWHM at this point (Å⁻¹), when the instrument provides it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dq: Option<f64>,
}

/// A measured reflectivity curve.
///
/// Invariants (checked on construction): at least one point, every value
/// finite, Q strictly increasing and non-negative, `dr > 0`, `dq > 0` when
/// present, and either all points or none carry `dq`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    points: Vec<DataPoint>,
}

impl Dataset {
    pub fn new(points: Vec<DataPoint>) -> FitResultOf<Self> {
        if points.is_empty() {
            return Err(FitError::invalid_dataset("no data points"));
        }

        let has_dq = points[0].dq.is_some();
        let mut prev_q = f64::NEG_INFINITY;
        for (i, p) in points.iter().enumerate() {
            if !(p.q.is_finite() && p.r.is_finite() && p.dr.is_finite()) {
                return Err(FitError::invalid_dataset(format!("point {i}: non-finite value")));
            }
            if p.q < 0.0 {
                return Err(FitError::invalid_dataset(format!("point {i}: negative Q {}", p.q)));
            }
            if p.q <= prev_q {
                return Err(FitError::invalid_dataset(format!(
                    "point {i}: Q must be strictly increasing ({} after {prev_q})",
                    p.q
                )));
            }
            if p.dr <= 0.0 {
                return Err(FitError::invalid_dataset(format!(
                    "point {i}: uncertainty must be > 0, got {}",
                    p.dr
                )));
            }
            match p.dq {
                Some(dq) if !(dq.is_finite() && dq > 0.0) => {
                    return Err(FitError::invalid_dataset(format!(
                        "point {i}: dQ must be finite and > 0, got {dq}"
                    )));
                }
                Some(_) if !has_dq => {
                    return Err(FitError::invalid_dataset("dQ given for some points only"));
                }
                None if has_dq => {
                    return Err(FitError::invalid_dataset("dQ given for some points only"));
                }
                _ => {}
            }
            prev_q = p.q;
        }

        Ok(Self { points })
    }

    /// Build from parallel columns.
    pub fn from_columns(q: &[f64], r: &[f64], dr: &[f64], dq: Option<&[f64]>) -> FitResultOf<Self> {
        if q.len() != r.len() || q.len() != dr.len() || dq.is_some_and(|d| d.len() != q.len()) {
            return Err(FitError::invalid_dataset("column lengths differ"));
        }
        let points = (0..q.len())
            .map(|i| DataPoint {
                q: q[i],
                r: r[i],
                dr: dr[i],
                dq: dq.map(|d| d[i]),
            })
            .collect();
        Self::new(points)
    }

    pub fn points(&self) -> &[DataPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn q(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.q).collect()
    }

    pub fn r(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.r).collect()
    }

    pub fn dr(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.dr).collect()
    }

    /// Per-point resolution FWHM, if the dataset carries a dQ column.
    pub fn dq(&self) -> Option<Vec<f64>> {
        self.points.iter().map(|p| p.dq).collect()
    }

    pub fn q_range(&self) -> (f64, f64) {
        (self.points[0].q, self.points[self.points.len() - 1].q)
    }
}

impl<'de> Deserialize<'de> for Dataset {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            points: Vec<DataPoint>,
        }
        let raw = Raw::deserialize(deserializer)?;
        Dataset::new(raw.points).map_err(serde::de::Error::custom)
    }
}
