//! Steps — the atomic unit of deployment work.
//!
//! A step brings one pod instance to its goal state:
//!
//! ```text
//! PENDING -> PREPARED -> STARTING -> COMPLETE
//!               |           |
//!               +-> ERROR <-+
//! ```
//!
//! Nothing leaves ERROR. Remediation builds a fresh step instead.

use keel_state::task_name;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{PlanError, PlanResult};
use crate::status::Status;
use crate::strategy::Element;

/// Why a pod instance is being (re)launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryType {
    /// Initial deployment.
    #[default]
    None,
    /// Relaunch in place after a transient loss.
    Transient,
    /// Replace after the host is gone for good.
    Permanent,
}

/// The pod instance a step is responsible for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodInstanceRequirement {
    pub pod_type: String,
    pub index: u32,
    pub tasks: Vec<String>,
    #[serde(default)]
    pub recovery: RecoveryType,
}

impl PodInstanceRequirement {
    pub fn new(pod_type: impl Into<String>, index: u32, tasks: Vec<String>) -> Self {
        Self {
            pod_type: pod_type.into(),
            index,
            tasks,
            recovery: RecoveryType::None,
        }
    }

    pub fn with_recovery(mut self, recovery: RecoveryType) -> Self {
        self.recovery = recovery;
        self
    }

    /// `<pod>-<index>`, e.g. `hello-0`.
    pub fn pod_instance_name(&self) -> String {
        format!("{}-{}", self.pod_type, self.index)
    }

    /// `<pod>-<index>:[task, ...]`, the conventional step name.
    pub fn step_name(&self) -> String {
        format!("{}:[{}]", self.pod_instance_name(), self.tasks.join(", "))
    }

    /// Full names of the tasks this requirement launches.
    pub fn task_names(&self) -> Vec<String> {
        self.tasks
            .iter()
            .map(|task| task_name(&self.pod_type, self.index, task))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Step {
    name: String,
    requirement: Option<PodInstanceRequirement>,
    status: Status,
    errors: Vec<String>,
}

impl Step {
    pub fn new(name: impl Into<String>, requirement: Option<PodInstanceRequirement>) -> Self {
        Self {
            name: name.into(),
            requirement,
            status: Status::Pending,
            errors: Vec::new(),
        }
    }

    /// Step for a pod instance, named after it.
    pub fn for_pod(requirement: PodInstanceRequirement) -> Self {
        Self::new(requirement.step_name(), Some(requirement))
    }

    pub fn requirement(&self) -> Option<&PodInstanceRequirement> {
        self.requirement.as_ref()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Whether the scheduling loop should look for resources for this step.
    pub fn needs_work(&self) -> bool {
        matches!(self.status, Status::Pending | Status::Prepared)
    }

    /// Resources were matched and a launch is being prepared.
    pub fn prepare(&mut self) -> PlanResult<()> {
        self.transition(&[Status::Pending], Status::Prepared)
    }

    /// Tasks were launched.
    pub fn start(&mut self) -> PlanResult<()> {
        self.transition(&[Status::Prepared], Status::Starting)
    }

    /// Tasks reached their goal state.
    pub fn complete(&mut self) -> PlanResult<()> {
        self.transition(&[Status::Starting], Status::Complete)
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> PlanResult<()> {
        self.transition(&[Status::Prepared, Status::Starting], Status::Error)?;
        let reason = reason.into();
        warn!(step = %self.name, %reason, "step failed");
        self.errors.push(reason);
        Ok(())
    }

    fn transition(&mut self, from: &[Status], to: Status) -> PlanResult<()> {
        if !from.contains(&self.status) {
            return Err(PlanError::InvalidTransition {
                step: self.name.clone(),
                from: self.status,
                to,
            });
        }
        debug!(step = %self.name, from = %self.status, %to, "step transition");
        self.status = to;
        Ok(())
    }
}

impl Element for Step {
    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self) -> Status {
        self.status
    }
}

/// Drive a fresh step into `status` through legal transitions.
#[cfg(test)]
pub(crate) fn step_in(name: &str, status: Status) -> Step {
    let mut step = Step::new(name, None);
    match status {
        Status::Pending => {}
        Status::Prepared => step.prepare().unwrap(),
        Status::Starting => {
            step.prepare().unwrap();
            step.start().unwrap();
        }
        Status::Complete => {
            step.prepare().unwrap();
            step.start().unwrap();
            step.complete().unwrap();
        }
        Status::Error => {
            step.prepare().unwrap();
            step.fail("test failure").unwrap();
        }
        other => panic!("steps never reach {other}"),
    }
    step
}
