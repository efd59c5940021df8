//! Shared fixtures for the optimizer tests.

use crate::domain::{Dataset, LayerConfig, ModelConfig, ParamConfig};
use crate::fit::params::ParameterSpace;
use crate::math::lin_space;
use crate::models::{reflectivity, EngineOptions};

/// Air | film | silicon, with the film's thickness and SLD as given.
pub(crate) fn film_config(thickness: ParamConfig, sld: ParamConfig) -> ModelConfig {
    ModelConfig {
        layers: vec![
            LayerConfig {
                name: Some("air".to_string()),
                sld: 0.0.into(),
                roughness: 3.0.into(),
                ..Default::default()
            },
            LayerConfig {
                name: Some("film".to_string()),
                thickness,
                sld,
                roughness: 3.0.into(),
                ..Default::default()
            },
            LayerConfig {
                name: Some("si".to_string()),
                sld: 2.07e-6.into(),
                ..Default::default()
            },
        ],
        scale: ParamConfig::Fixed(1.0),
        background: ParamConfig::Fixed(0.0),
        resolution: Default::default(),
        fit: Default::default(),
    }
}

/// Noiseless curve of the space's starting model with 5% error bars.
pub(crate) fn noiseless(space: &ParameterSpace, points: usize) -> Dataset {
    let q = lin_space(0.01, 0.25, points).unwrap();
    let model = space.initial_model().unwrap();
    let r: Vec<f64> = reflectivity(&model.stack, &q, &EngineOptions::default())
        .unwrap()
        .into_iter()
        .map(|r| model.scale * r + model.background)
        .collect();
    let dr: Vec<f64> = r.iter().map(|v| 0.05 * v).collect();
    Dataset::from_columns(&q, &r, &dr, None).unwrap()
}
