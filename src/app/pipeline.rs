//! Shared "fit pipeline" logic used by the CLI.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! load data -> configure -> fit -> residual rankings
//!
//! Front-ends can then focus on presentation.

use crate::domain::{Dataset, FitResult, ModelConfig};
use crate::error::AppError;
use crate::fit::FitSession;
use crate::report::{Outliers, rank_outliers};

/// All computed outputs of a single `rose fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub dataset: Dataset,
    pub config: ModelConfig,
    pub result: FitResult,
    pub outliers: Outliers,
}

/// Execute the full fitting pipeline through a [`FitSession`].
pub fn run_fit(dataset: Dataset, config: ModelConfig, top_n: usize) -> Result<RunOutput, AppError> {
    let mut session = FitSession::new();
    session.load_data(dataset.clone())?;
    session.configure(config.clone())?;
    let result = session.run()?.clone();
    let outliers = rank_outliers(&result.residuals, top_n);

    Ok(RunOutput {
        dataset,
        config,
        result,
        outliers,
    })
}
