//! Phases — the deployment of one pod type, as ordered steps.

use tracing::info;

use crate::error::{PlanError, PlanResult};
use crate::status::Status;
use crate::step::Step;
use crate::strategy::{status_under, Element, Strategy};

#[derive(Debug)]
pub struct Phase {
    name: String,
    steps: Vec<Step>,
    strategy: Box<dyn Strategy<Step>>,
    interrupted: bool,
}

impl Phase {
    pub fn new(name: impl Into<String>, steps: Vec<Step>, strategy: Box<dyn Strategy<Step>>) -> Self {
        Self {
            name: name.into(),
            steps,
            strategy,
            interrupted: false,
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn strategy(&self) -> &dyn Strategy<Step> {
        self.strategy.as_ref()
    }

    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name() == name)
    }

    pub fn step_mut(&mut self, name: &str) -> PlanResult<&mut Step> {
        self.steps
            .iter_mut()
            .find(|s| s.name() == name)
            .ok_or_else(|| PlanError::StepNotFound(name.to_string()))
    }

    /// Steps the strategy allows to proceed, whatever their status.
    pub fn eligible_steps(&self) -> Vec<&Step> {
        self.strategy.eligible(&self.steps)
    }

    /// Eligible steps still waiting for resources. Empty while interrupted.
    pub fn candidates(&self) -> Vec<&Step> {
        if self.interrupted {
            return Vec::new();
        }
        self.eligible_steps()
            .into_iter()
            .filter(|s| s.needs_work())
            .collect()
    }

    /// Stop handing out new work. Running steps are not affected.
    pub fn interrupt(&mut self) {
        if !self.interrupted {
            info!(phase = %self.name, "phase interrupted");
            self.interrupted = true;
        }
    }

    pub fn proceed(&mut self) {
        if self.interrupted {
            info!(phase = %self.name, "phase resumed");
            self.interrupted = false;
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted
    }
}

impl Element for Phase {
    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self) -> Status {
        match status_under(self.strategy.as_ref(), &self.steps) {
            status @ (Status::Complete | Status::Error) => status,
            _ if self.interrupted => Status::Waiting,
            status => status,
        }
    }
}
