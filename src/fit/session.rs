//! Fit session lifecycle.
//!
//! ```text
//! Created ──load_data──▶ DataLoaded ──configure──▶ ModelConfigured ──run──▶ Fitting ──▶ Failed
//!                                                        ▲                    │
//!                                                        └──── reset ─── Completed
//! ```
//!
//! `reset` only leaves `Completed`; `Failed` is terminal and keeps its error.
//!
//! Each state owns exactly the inputs valid in it, so a session can never run
//! without data or report a result it has not produced. Calls that the
//! current state does not allow return [`FitError::InvalidTransition`] and
//! leave the session untouched.

use crate::domain::{Dataset, FitResult, ModelConfig};
use crate::error::{FitError, FitResultOf};
use crate::fit::cancel::CancelToken;
use crate::fit::objective::{Objective, ObjectiveOptions};
use crate::fit::params::ParameterSpace;
use crate::fit::runner::{run_fit, validate_settings};

/// Inputs of a configured session.
#[derive(Debug, Clone, PartialEq)]
pub struct FitInputs {
    pub dataset: Dataset,
    pub config: ModelConfig,
    pub space: ParameterSpace,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    #[default]
    Created,
    DataLoaded { dataset: Dataset },
    ModelConfigured { inputs: Box<FitInputs> },
    /// Only observable while `run` is executing.
    Fitting,
    Completed { inputs: Box<FitInputs>, result: Box<FitResult> },
    Failed { inputs: Box<FitInputs>, error: FitError },
}

/// State tag without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Created,
    DataLoaded,
    ModelConfigured,
    Fitting,
    Completed,
    Failed,
}

impl Phase {
    pub fn name(self) -> &'static str {
        match self {
            Phase::Created => "created",
            Phase::DataLoaded => "data-loaded",
            Phase::ModelConfigured => "model-configured",
            Phase::Fitting => "fitting",
            Phase::Completed => "completed",
            Phase::Failed => "failed",
        }
    }
}

impl SessionState {
    pub fn phase(&self) -> Phase {
        match self {
            SessionState::Created => Phase::Created,
            SessionState::DataLoaded { .. } => Phase::DataLoaded,
            SessionState::ModelConfigured { .. } => Phase::ModelConfigured,
            SessionState::Fitting => Phase::Fitting,
            SessionState::Completed { .. } => Phase::Completed,
            SessionState::Failed { .. } => Phase::Failed,
        }
    }
}

#[derive(Debug, Default)]
pub struct FitSession {
    state: SessionState,
    cancel: CancelToken,
}

impl FitSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// Token that stops a running fit at its next iteration boundary. The
    /// flag stays set until [`reset`](Self::reset).
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Attach a measured curve. Allowed before configuration; replaces an
    /// earlier dataset.
    pub fn load_data(&mut self, dataset: Dataset) -> FitResultOf<()> {
        match self.phase() {
            Phase::Created | Phase::DataLoaded => {}
            other => return Err(self.refuse(other, "load data")),
        }
        tracing::info!(points = dataset.len(), "dataset loaded");
        self.transition(SessionState::DataLoaded { dataset });
        Ok(())
    }

    /// Build and validate the parameter space, method settings and objective
    /// for `config`.
    ///
    /// Setup errors (stack, resolution, parameters, settings) are returned and
    /// leave the session where it was. The starting point is evaluated once so
    /// that errors other than domain violations surface here rather than
    /// mid-fit.
    pub fn configure(&mut self, config: ModelConfig) -> FitResultOf<()> {
        let dataset = match &self.state {
            SessionState::DataLoaded { dataset } => dataset,
            SessionState::ModelConfigured { inputs } => &inputs.dataset,
            other => return Err(self.refuse(other.phase(), "configure the model")),
        };
        let space = ParameterSpace::from_config(&config)?;
        validate_settings(&config.fit, space.dimension())?;
        let objective = Objective::new(
            dataset,
            &space,
            &config.resolution,
            ObjectiveOptions::from_settings(&config.fit),
        )?;
        if let Err(error) = objective.evaluate(&space.to_vector()) {
            if !error.is_recoverable() {
                return Err(error);
            }
        }

        let inputs = FitInputs {
            dataset: dataset.clone(),
            config,
            space,
        };
        tracing::info!(free = inputs.space.dimension(), "model configured");
        self.transition(SessionState::ModelConfigured {
            inputs: Box::new(inputs),
        });
        Ok(())
    }

    /// Run the configured fit to completion.
    ///
    /// Numerical failures move the session to `Failed` and are also returned.
    pub fn run(&mut self) -> FitResultOf<&FitResult> {
        let inputs = match std::mem::replace(&mut self.state, SessionState::Fitting) {
            SessionState::ModelConfigured { inputs } => inputs,
            other => {
                let phase = other.phase();
                self.state = other;
                return Err(self.refuse(phase, "run a fit"));
            }
        };
        tracing::info!(from = Phase::ModelConfigured.name(), to = Phase::Fitting.name(), "session transition");

        match fit_in_pool(&inputs, &self.cancel) {
            Ok(result) => {
                self.transition(SessionState::Completed {
                    inputs,
                    result: Box::new(result),
                });
                self.result().ok_or_else(|| self.refuse(Phase::Fitting, "report a result"))
            }
            Err(error) => {
                tracing::error!(%error, "fit failed");
                self.transition(SessionState::Failed {
                    inputs,
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }

    /// Return a completed session to `ModelConfigured` with the same inputs
    /// and clear the cancellation flag.
    pub fn reset(&mut self) -> FitResultOf<()> {
        let from = self.phase();
        match std::mem::take(&mut self.state) {
            SessionState::Completed { inputs, .. } => {
                self.cancel.reset();
                tracing::info!(from = from.name(), to = Phase::ModelConfigured.name(), "session transition");
                self.state = SessionState::ModelConfigured { inputs };
                Ok(())
            }
            other => {
                let phase = other.phase();
                self.state = other;
                Err(self.refuse(phase, "reset"))
            }
        }
    }

    pub fn result(&self) -> Option<&FitResult> {
        match &self.state {
            SessionState::Completed { result, .. } => Some(&**result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&FitError> {
        match &self.state {
            SessionState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn inputs(&self) -> Option<&FitInputs> {
        match &self.state {
            SessionState::ModelConfigured { inputs }
            | SessionState::Completed { inputs, .. }
            | SessionState::Failed { inputs, .. } => Some(&**inputs),
            _ => None,
        }
    }

    fn transition(&mut self, next: SessionState) {
        tracing::info!(from = self.phase().name(), to = next.phase().name(), "session transition");
        self.state = next;
    }

    fn refuse(&self, from: Phase, action: &'static str) -> FitError {
        FitError::InvalidTransition {
            from: from.name(),
            action,
        }
    }
}

/// Run on a dedicated pool when a worker count is configured.
fn fit_in_pool(inputs: &FitInputs, cancel: &CancelToken) -> FitResultOf<FitResult> {
    let run = || run_fit(&inputs.dataset, &inputs.config, &inputs.space, cancel);
    match inputs.config.fit.workers {
        Some(workers) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .build()
                .map_err(|e| FitError::invalid_parameter(format!("cannot start {workers} workers: {e}")))?;
            pool.install(run)
        }
        None => run(),
    }
}
