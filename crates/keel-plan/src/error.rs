//! Engine error types.

use thiserror::Error;

use crate::status::Status;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("invalid transition for step '{step}': {from} -> {to}")]
    InvalidTransition { step: String, from: Status, to: Status },

    #[error("step not found: {0}")]
    StepNotFound(String),

    #[error("phase not found: {0}")]
    PhaseNotFound(String),

    #[error("failed to build phase for pod '{pod}': {reason}")]
    PhaseConstruction { pod: String, reason: String },
}

pub type PlanResult<T> = Result<T, PlanError>;
