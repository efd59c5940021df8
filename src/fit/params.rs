//! Parameter space: the flat optimization vector and the stack it describes.
//!
//! Every physical attribute of the model (layer thickness, roughness, real and
//! imaginary SLD, graded end SLD) plus the instrument `scale` and `background`
//! is a named [`Parameter`] with one of three roles:
//!
//! - free: part of the optimization vector, bounded by finite `[lower, upper]`
//! - fixed: keeps its configured value
//! - tied: `value = factor · source + offset`, recomputed for every vector
//!
//! Ties form a directed graph that must be acyclic. Cycles are rejected when
//! the space is built, and a topological order is stored once so evaluation
//! only walks a flat list. Among ties that are ready at the same time the one
//! declared first resolves first, so the order never depends on hashing or on
//! the optimizer in use.

use crate::domain::{Layer, ModelConfig, ParamConfig, ParameterRole, Profile, Sld, Stack};
use crate::error::{FitError, FitResultOf};

/// Model attribute a parameter writes to. Layer targets carry the layer index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Thickness(usize),
    Roughness(usize),
    SldReal(usize),
    SldImag(usize),
    SldEnd(usize),
    Scale,
    Background,
}

/// Named parameter bound to one model attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub target: Target,
    pub role: ParameterRole,
    /// Configured value, with ties resolved against the other initial values.
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
    tie: Option<Tie>,
}

impl Parameter {
    pub fn has_finite_bounds(&self) -> bool {
        self.lower.is_finite() && self.upper.is_finite()
    }

    fn check(&self, value: f64) -> FitResultOf<()> {
        if value.is_finite() && value >= self.lower && value <= self.upper {
            Ok(())
        } else {
            Err(FitError::OutOfBounds {
                name: self.name.clone(),
                value,
                lower: self.lower,
                upper: self.upper,
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Tie {
    source: usize,
    factor: f64,
    offset: f64,
}

/// Input to [`ParameterSpace::new`]: a name, the attribute it drives and its configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDef {
    pub name: String,
    pub target: Target,
    pub config: ParamConfig,
}

/// A concrete model: the stack plus the instrument terms.
#[derive(Debug, Clone, PartialEq)]
pub struct ReflectModel {
    pub stack: Stack,
    pub scale: f64,
    pub background: f64,
}

/// Mapping between optimization vectors and models.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpace {
    template: Vec<Layer>,
    params: Vec<Parameter>,
    /// Indices of free parameters, in declaration order.
    free: Vec<usize>,
    /// Indices of tied parameters, in resolution order.
    tie_order: Vec<usize>,
}

impl ParameterSpace {
    /// Build a space over `template`. Attributes without a parameter keep the
    /// template's value; the instrument terms default to scale 1, background 0.
    pub fn new(template: Stack, defs: Vec<ParameterDef>) -> FitResultOf<Self> {
        let n_layers = template.len();
        let mut params = Vec::with_capacity(defs.len());
        let mut pending_ties = Vec::with_capacity(defs.len());

        for def in &defs {
            if params.iter().any(|p: &Parameter| p.name == def.name) {
                return Err(FitError::invalid_parameter(format!(
                    "duplicate parameter name '{}'",
                    def.name
                )));
            }
            if let Some(layer) = layer_index(def.target) {
                if layer >= n_layers {
                    return Err(FitError::invalid_parameter(format!(
                        "'{}' refers to layer {layer}, the stack has {n_layers}",
                        def.name
                    )));
                }
            }
            let (param, tie) = parameter_from_config(def)?;
            params.push(param);
            pending_ties.push(tie);
        }

        for (i, tie) in pending_ties.into_iter().enumerate() {
            let Some((source_name, factor, offset)) = tie else {
                continue;
            };
            let source = params
                .iter()
                .position(|p| p.name == source_name)
                .ok_or_else(|| {
                    FitError::invalid_parameter(format!(
                        "'{}' is tied to unknown parameter '{source_name}'",
                        params[i].name
                    ))
                })?;
            if !(factor.is_finite() && offset.is_finite()) {
                return Err(FitError::invalid_parameter(format!(
                    "'{}': tie factor and offset must be finite",
                    params[i].name
                )));
            }
            params[i].tie = Some(Tie {
                source,
                factor,
                offset,
            });
        }

        let tie_order = resolution_order(&params)?;
        for &i in &tie_order {
            if let Some(tie) = params[i].tie {
                let value = tie.factor * params[tie.source].value + tie.offset;
                params[i].check(value)?;
                params[i].value = value;
            }
        }

        let free = params
            .iter()
            .enumerate()
            .filter(|(_, p)| p.role == ParameterRole::Free)
            .map(|(i, _)| i)
            .collect();

        let space = Self {
            template: template.layers().to_vec(),
            params,
            free,
            tie_order,
        };
        // The configured starting point must itself be a valid model.
        space.model_from_values(&space.initial_values())?;
        Ok(space)
    }

    /// Build the space described by a model configuration.
    ///
    /// Parameter names are `<layer>.thickness`, `<layer>.roughness`,
    /// `<layer>.sld`, `<layer>.isld`, `<layer>.sld_end`, `scale` and
    /// `background`, where `<layer>` is the layer name or `layer<index>`.
    /// Media get no thickness parameter and the backing medium no roughness.
    pub fn from_config(config: &ModelConfig) -> FitResultOf<Self> {
        let n = config.layers.len();
        let layers: Vec<Layer> = config
            .layers
            .iter()
            .map(|lc| {
                let mut layer = Layer::new(
                    lc.thickness.value(),
                    Sld::new(lc.sld.value(), lc.isld.value()),
                    lc.roughness.value(),
                );
                layer.name = lc.name.clone();
                if let Some(end) = &lc.sld_end {
                    layer = layer.graded(Sld::new(end.value(), lc.isld.value()));
                }
                layer
            })
            .collect();
        let template = Stack::new(layers)?;

        let mut defs = Vec::new();
        for (i, lc) in config.layers.iter().enumerate() {
            let label = template.layers()[i].label(i);
            let medium = i == 0 || i + 1 == n;
            let mut push = |attr: &str, target: Target, cfg: &ParamConfig| {
                defs.push(ParameterDef {
                    name: format!("{label}.{attr}"),
                    target,
                    config: cfg.clone(),
                });
            };
            if !medium {
                push("thickness", Target::Thickness(i), &lc.thickness);
            }
            push("sld", Target::SldReal(i), &lc.sld);
            push("isld", Target::SldImag(i), &lc.isld);
            if i + 1 < n {
                push("roughness", Target::Roughness(i), &lc.roughness);
            }
            if let Some(end) = &lc.sld_end {
                push("sld_end", Target::SldEnd(i), end);
            }
        }
        defs.push(ParameterDef {
            name: "scale".to_string(),
            target: Target::Scale,
            config: config.scale.clone(),
        });
        defs.push(ParameterDef {
            name: "background".to_string(),
            target: Target::Background,
            config: config.background.clone(),
        });

        let space = Self::new(template, defs)?;
        tracing::debug!(
            parameters = space.params.len(),
            free = space.free.len(),
            tied = space.tie_order.len(),
            "parameter space built"
        );
        Ok(space)
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.params
    }

    pub fn dimension(&self) -> usize {
        self.free.len()
    }

    pub fn free_names(&self) -> Vec<&str> {
        self.free.iter().map(|&i| self.params[i].name.as_str()).collect()
    }

    /// `(lower, upper)` of every free parameter.
    pub fn bounds(&self) -> Vec<(f64, f64)> {
        self.free
            .iter()
            .map(|&i| (self.params[i].lower, self.params[i].upper))
            .collect()
    }

    /// Current free values, in declaration order.
    pub fn to_vector(&self) -> Vec<f64> {
        self.free.iter().map(|&i| self.params[i].value).collect()
    }

    /// Rebuild the stack for a free-parameter vector.
    pub fn from_vector(&self, v: &[f64]) -> FitResultOf<Stack> {
        self.model_from_vector(v).map(|m| m.stack)
    }

    /// Rebuild the full model (stack, scale, background) for a free-parameter vector.
    pub fn model_from_vector(&self, v: &[f64]) -> FitResultOf<ReflectModel> {
        let values = self.values_from_vector(v)?;
        self.model_from_values(&values)
    }

    /// Values of every parameter (free, fixed and tied) for a free-parameter vector.
    pub fn values_from_vector(&self, v: &[f64]) -> FitResultOf<Vec<f64>> {
        if v.len() != self.free.len() {
            return Err(FitError::invalid_parameter(format!(
                "vector has {} entries, the space has {} free parameters",
                v.len(),
                self.free.len()
            )));
        }

        let mut values = self.initial_values();
        for (&i, &x) in self.free.iter().zip(v) {
            self.params[i].check(x)?;
            values[i] = x;
        }
        for &i in &self.tie_order {
            let param = &self.params[i];
            if let Some(tie) = param.tie {
                let x = tie.factor * values[tie.source] + tie.offset;
                param.check(x)?;
                values[i] = x;
            }
        }
        Ok(values)
    }

    /// Map a vector to the unit cube spanned by the bounds.
    pub fn to_unit(&self, v: &[f64]) -> Vec<f64> {
        to_unit(&self.bounds(), v)
    }

    /// Inverse of [`to_unit`](Self::to_unit).
    pub fn from_unit(&self, u: &[f64]) -> Vec<f64> {
        from_unit(&self.bounds(), u)
    }

    /// The model at the configured starting point.
    pub fn initial_model(&self) -> FitResultOf<ReflectModel> {
        self.model_from_values(&self.initial_values())
    }

    fn initial_values(&self) -> Vec<f64> {
        self.params.iter().map(|p| p.value).collect()
    }

    fn model_from_values(&self, values: &[f64]) -> FitResultOf<ReflectModel> {
        let mut layers = self.template.clone();
        let mut scale = 1.0;
        let mut background = 0.0;
        for (param, &x) in self.params.iter().zip(values) {
            match param.target {
                Target::Thickness(i) => layers[i].thickness = x,
                Target::Roughness(i) => layers[i].roughness = x,
                Target::SldReal(i) => layers[i].sld.real = x,
                Target::SldImag(i) => {
                    layers[i].sld.imag = x;
                    if let Profile::Graded { sld_end } = &mut layers[i].profile {
                        sld_end.imag = x;
                    }
                }
                Target::SldEnd(i) => {
                    let imag = match layers[i].profile {
                        Profile::Graded { sld_end } => sld_end.imag,
                        Profile::Uniform => layers[i].sld.imag,
                    };
                    layers[i].profile = Profile::Graded {
                        sld_end: Sld::new(x, imag),
                    };
                }
                Target::Scale => scale = x,
                Target::Background => background = x,
            }
        }
        Ok(ReflectModel {
            stack: Stack::new(layers)?,
            scale,
            background,
        })
    }
}

pub(crate) fn to_unit(bounds: &[(f64, f64)], v: &[f64]) -> Vec<f64> {
    bounds
        .iter()
        .zip(v)
        .map(|(&(lo, hi), &x)| (x - lo) / (hi - lo))
        .collect()
}

/// Inverse of [`to_unit`]. Points inside the cube always land inside the bounds.
pub(crate) fn from_unit(bounds: &[(f64, f64)], u: &[f64]) -> Vec<f64> {
    bounds
        .iter()
        .zip(u)
        .map(|(&(lo, hi), &t)| {
            let x = lo + t * (hi - lo);
            if (0.0..=1.0).contains(&t) { x.clamp(lo, hi) } else { x }
        })
        .collect()
}

fn layer_index(target: Target) -> Option<usize> {
    match target {
        Target::Thickness(i)
        | Target::Roughness(i)
        | Target::SldReal(i)
        | Target::SldImag(i)
        | Target::SldEnd(i) => Some(i),
        Target::Scale | Target::Background => None,
    }
}

type PendingTie = Option<(String, f64, f64)>;

fn parameter_from_config(def: &ParameterDef) -> FitResultOf<(Parameter, PendingTie)> {
    let (value, lower, upper, role, tie) = match &def.config {
        ParamConfig::Fixed(v) => (*v, f64::NEG_INFINITY, f64::INFINITY, ParameterRole::Fixed, None),
        ParamConfig::Spec(spec) => {
            let lower = spec.min.unwrap_or(f64::NEG_INFINITY);
            let upper = spec.max.unwrap_or(f64::INFINITY);
            match &spec.tie {
                Some(tie) => (
                    spec.value,
                    lower,
                    upper,
                    ParameterRole::Tied,
                    Some((tie.source.clone(), tie.factor, tie.offset)),
                ),
                None => {
                    let vary = spec.vary.unwrap_or(spec.min.is_some() && spec.max.is_some());
                    let role = if vary {
                        ParameterRole::Free
                    } else {
                        ParameterRole::Fixed
                    };
                    (spec.value, lower, upper, role, None)
                }
            }
        }
    };

    if lower.is_nan() || upper.is_nan() || lower > upper {
        return Err(FitError::invalid_parameter(format!(
            "'{}': invalid bounds [{lower}, {upper}]",
            def.name
        )));
    }
    if role == ParameterRole::Free && !(lower.is_finite() && upper.is_finite() && lower < upper) {
        return Err(FitError::invalid_parameter(format!(
            "'{}': a free parameter needs finite bounds with min < max",
            def.name
        )));
    }

    let param = Parameter {
        name: def.name.clone(),
        target: def.target,
        role,
        value,
        lower,
        upper,
        tie: None,
    };
    if role != ParameterRole::Tied {
        param.check(value)?;
    }
    Ok((param, tie))
}

/// Topological order of the tied parameters.
fn resolution_order(params: &[Parameter]) -> FitResultOf<Vec<usize>> {
    let mut resolved: Vec<bool> = params.iter().map(|p| p.tie.is_none()).collect();
    let mut order = Vec::new();
    loop {
        let mut progressed = false;
        for (i, p) in params.iter().enumerate() {
            if let Some(tie) = p.tie {
                if !resolved[i] && resolved[tie.source] {
                    resolved[i] = true;
                    order.push(i);
                    progressed = true;
                }
            }
        }
        if !progressed {
            break;
        }
    }

    let stuck: Vec<&str> = params
        .iter()
        .zip(&resolved)
        .filter(|(_, done)| !**done)
        .map(|(p, _)| p.name.as_str())
        .collect();
    if !stuck.is_empty() {
        return Err(FitError::invalid_parameter(format!(
            "tie cycle involving {}",
            stuck.join(", ")
        )));
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LayerConfig, TieSpec};

    fn layer(name: &str, thickness: ParamConfig, sld: ParamConfig, roughness: ParamConfig) -> LayerConfig {
        LayerConfig {
            name: Some(name.to_string()),
            thickness,
            sld,
            isld: ParamConfig::Fixed(0.0),
            roughness,
            sld_end: None,
        }
    }

    fn config(layers: Vec<LayerConfig>) -> ModelConfig {
        ModelConfig {
            layers,
            scale: ParamConfig::Fixed(1.0),
            background: ParamConfig::Fixed(0.0),
            resolution: Default::default(),
            fit: Default::default(),
        }
    }

    fn film() -> ModelConfig {
        config(vec![
            layer("air", 0.0.into(), 0.0.into(), 0.0.into()),
            layer(
                "film",
                ParamConfig::free(100.0, 50.0, 150.0),
                ParamConfig::free(4.0e-6, 1.0e-6, 7.0e-6),
                ParamConfig::tied("air.roughness", 1.0, 0.0),
            ),
            layer("si", 0.0.into(), 2.07e-6.into(), 0.0.into()),
        ])
    }

    #[test]
    fn names_and_free_vector_follow_declaration_order() {
        let space = ParameterSpace::from_config(&film()).unwrap();
        assert_eq!(space.free_names(), vec!["film.thickness", "film.sld"]);
        assert_eq!(space.to_vector(), vec![100.0, 4.0e-6]);
        assert_eq!(space.bounds(), vec![(50.0, 150.0), (1.0e-6, 7.0e-6)]);
        // Media have no thickness and the backing has no roughness.
        assert!(space.parameters().iter().all(|p| p.name != "air.thickness"));
        assert!(space.parameters().iter().all(|p| p.name != "si.roughness"));
    }

    #[test]
    fn round_trip_is_bit_exact() {
        let mut cfg = film();
        cfg.layers[1].roughness = ParamConfig::tied("air.roughness", 0.5, 1.25);
        cfg.layers[0].roughness = ParamConfig::free(3.3, 0.0, 10.0);
        cfg.background = ParamConfig::free(1e-7, 0.0, 1e-5);
        let space = ParameterSpace::from_config(&cfg).unwrap();

        let initial = space.initial_model().unwrap();
        let rebuilt = space.model_from_vector(&space.to_vector()).unwrap();
        assert_eq!(rebuilt, initial);
        assert_eq!(rebuilt.stack.layers()[1].roughness.to_bits(), (0.5_f64 * 3.3 + 1.25).to_bits());
        assert_eq!(rebuilt.background, 1e-7);
        assert_eq!(space.from_vector(&space.to_vector()).unwrap(), initial.stack);
    }

    #[test]
    fn template_round_trips_without_ties() {
        let cfg = config(vec![
            layer("air", 0.0.into(), 0.0.into(), ParamConfig::free(2.0, 0.0, 8.0)),
            layer("a", ParamConfig::free(37.1, 1.0, 90.0), 6.3e-6.into(), 1.5.into()),
            layer("b", 12.0.into(), ParamConfig::free(-0.4e-6, -1e-6, 1e-6), 0.0.into()),
            layer("si", 0.0.into(), 2.07e-6.into(), 0.0.into()),
        ]);
        let space = ParameterSpace::from_config(&cfg).unwrap();
        let stack = space.from_vector(&space.to_vector()).unwrap();
        let layers = stack.layers();
        assert_eq!(layers[0].roughness, 2.0);
        assert_eq!(layers[1].thickness, 37.1);
        assert_eq!(layers[2].sld.real, -0.4e-6);
        assert_eq!(layers[1].name.as_deref(), Some("a"));
    }

    #[test]
    fn free_values_outside_bounds_are_rejected() {
        let space = ParameterSpace::from_config(&film()).unwrap();
        let err = space.from_vector(&[151.0, 4.0e-6]).unwrap_err();
        match err {
            FitError::OutOfBounds { name, value, lower, upper } => {
                assert_eq!(name, "film.thickness");
                assert_eq!(value, 151.0);
                assert_eq!((lower, upper), (50.0, 150.0));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            space.from_vector(&[f64::NAN, 4.0e-6]),
            Err(FitError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn tied_values_respect_their_own_bounds() {
        let mut cfg = film();
        cfg.layers[0].roughness = ParamConfig::free(3.0, 0.0, 10.0);
        cfg.layers[1].roughness = ParamConfig::Spec(crate::domain::ParamSpec {
            value: 0.0,
            min: Some(0.0),
            max: Some(8.0),
            vary: None,
            tie: Some(TieSpec {
                source: "air.roughness".to_string(),
                factor: 2.0,
                offset: 0.0,
            }),
        });
        let space = ParameterSpace::from_config(&cfg).unwrap();
        assert!(space.from_vector(&[3.0, 100.0, 4.0e-6]).is_ok());
        assert!(matches!(
            space.from_vector(&[5.0, 100.0, 4.0e-6]),
            Err(FitError::OutOfBounds { name, .. }) if name == "film.roughness"
        ));
    }

    #[test]
    fn tied_starting_value_outside_its_bounds_is_rejected() {
        let mut cfg = film();
        cfg.layers[0].roughness = ParamConfig::free(5.0, 0.0, 10.0);
        cfg.layers[1].roughness = ParamConfig::Spec(crate::domain::ParamSpec {
            value: 0.0,
            min: Some(0.0),
            max: Some(8.0),
            vary: None,
            tie: Some(TieSpec {
                source: "air.roughness".to_string(),
                factor: 2.0,
                offset: 0.0,
            }),
        });
        let err = ParameterSpace::from_config(&cfg).unwrap_err();
        assert!(matches!(
            err,
            FitError::OutOfBounds { ref name, value, .. } if name == "film.roughness" && value == 10.0
        ));

        cfg.layers[0].roughness = ParamConfig::free(3.0, 0.0, 10.0);
        let space = ParameterSpace::from_config(&cfg).unwrap();
        let stack = space.from_vector(&space.to_vector()).unwrap();
        assert_eq!(stack, space.initial_model().unwrap().stack);
    }

    #[test]
    fn tie_chains_resolve_regardless_of_declaration_order() {
        // air.roughness -> film.roughness -> si.isld, dependent declared first.
        let mut cfg = film();
        cfg.layers[0].roughness = ParamConfig::tied("film.roughness", 1.0, 1.0);
        cfg.layers[1].roughness = ParamConfig::tied("si.isld", 1.0, 2.0);
        cfg.layers[2].isld = ParamConfig::Fixed(0.5);
        let space = ParameterSpace::from_config(&cfg).unwrap();
        let stack = space.from_vector(&space.to_vector()).unwrap();
        assert_eq!(stack.layers()[1].roughness, 2.5);
        assert_eq!(stack.layers()[0].roughness, 3.5);
    }

    #[test]
    fn tie_cycles_are_rejected_at_configuration() {
        let mut cfg = film();
        cfg.layers[0].roughness = ParamConfig::tied("film.roughness", 1.0, 0.0);
        cfg.layers[1].roughness = ParamConfig::tied("air.roughness", 1.0, 0.0);
        let err = ParameterSpace::from_config(&cfg).unwrap_err();
        match err {
            FitError::InvalidParameter { reason } => {
                assert!(reason.contains("cycle"), "{reason}");
                assert!(reason.contains("air.roughness") && reason.contains("film.roughness"));
            }
            other => panic!("unexpected {other:?}"),
        }

        let mut cfg = film();
        cfg.layers[1].roughness = ParamConfig::tied("film.roughness", 1.0, 0.0);
        assert!(matches!(
            ParameterSpace::from_config(&cfg),
            Err(FitError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn unknown_tie_source_is_rejected() {
        let mut cfg = film();
        cfg.layers[1].roughness = ParamConfig::tied("gold.roughness", 1.0, 0.0);
        let err = ParameterSpace::from_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("gold.roughness"));
    }

    #[test]
    fn free_parameters_need_finite_bounds() {
        let mut cfg = film();
        cfg.layers[1].thickness = ParamConfig::Spec(crate::domain::ParamSpec {
            value: 100.0,
            min: Some(50.0),
            max: None,
            vary: Some(true),
            tie: None,
        });
        assert!(matches!(
            ParameterSpace::from_config(&cfg),
            Err(FitError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn initial_value_outside_bounds_is_rejected() {
        let mut cfg = film();
        cfg.layers[1].thickness = ParamConfig::free(200.0, 50.0, 150.0);
        assert!(matches!(
            ParameterSpace::from_config(&cfg),
            Err(FitError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn physically_invalid_vectors_become_invalid_stack() {
        let mut cfg = film();
        cfg.layers[1].thickness = ParamConfig::free(10.0, -50.0, 150.0);
        let space = ParameterSpace::from_config(&cfg).unwrap();
        assert!(matches!(
            space.from_vector(&[-1.0, 4.0e-6]),
            Err(FitError::InvalidStack { .. })
        ));
    }

    #[test]
    fn graded_layers_expose_end_sld() {
        let mut cfg = film();
        cfg.layers[1].sld_end = Some(ParamConfig::free(2.0e-6, 1.0e-6, 5.0e-6));
        let space = ParameterSpace::from_config(&cfg).unwrap();
        assert_eq!(space.free_names(), vec!["film.thickness", "film.sld", "film.sld_end"]);
        let stack = space.from_vector(&[100.0, 4.0e-6, 3.0e-6]).unwrap();
        assert_eq!(
            stack.layers()[1].profile,
            Profile::Graded {
                sld_end: Sld::real(3.0e-6)
            }
        );
    }

    #[test]
    fn unit_cube_mapping_is_affine() {
        let space = ParameterSpace::from_config(&film()).unwrap();
        let u = space.to_unit(&[75.0, 7.0e-6]);
        assert_eq!(u, vec![0.25, 1.0]);
        let v = space.from_unit(&[0.5, 0.0]);
        assert_eq!(v, vec![100.0, 1.0e-6]);
    }

    #[test]
    fn labels_default_to_layer_index() {
        let mut cfg = film();
        cfg.layers[1].name = None;
        let space = ParameterSpace::from_config(&cfg).unwrap();
        assert!(space.free_names().contains(&"layer1.thickness"));
    }
}
