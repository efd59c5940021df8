//! Model configuration files (JSON).

use std::fs::File;
use std::path::Path;

use crate::domain::ModelConfig;
use crate::error::AppError;

/// Read a [`ModelConfig`] JSON file.
pub fn read_model_config(path: &Path) -> Result<ModelConfig, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open model file '{}': {e}", path.display())))?;
    serde_json::from_reader(file)
        .map_err(|e| AppError::new(2, format!("Invalid model JSON '{}': {e}", path.display())))
}

/// Write a [`ModelConfig`] as pretty JSON.
pub fn write_model_config(path: &Path, config: &ModelConfig) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create model file '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, config)
        .map_err(|e| AppError::new(2, format!("Failed to write model JSON: {e}")))
}
