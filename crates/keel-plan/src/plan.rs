//! Plans — ordered phases driven under a strategy.

use serde::Serialize;
use tracing::info;

use crate::error::{PlanError, PlanResult};
use crate::phase::Phase;
use crate::status::Status;
use crate::step::Step;
use crate::strategy::{status_under, Element, Strategy};

#[derive(Debug)]
pub struct Plan {
    name: String,
    phases: Vec<Phase>,
    strategy: Box<dyn Strategy<Phase>>,
    errors: Vec<String>,
    interrupted: bool,
}

impl Plan {
    pub fn new(name: impl Into<String>, phases: Vec<Phase>, strategy: Box<dyn Strategy<Phase>>) -> Self {
        Self::with_errors(name, phases, strategy, Vec::new())
    }

    /// A plan that records errors hit while it was being built.
    pub fn with_errors(
        name: impl Into<String>,
        phases: Vec<Phase>,
        strategy: Box<dyn Strategy<Phase>>,
        errors: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            phases,
            strategy,
            errors,
            interrupted: false,
        }
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn into_phases(self) -> Vec<Phase> {
        self.phases
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn strategy(&self) -> &dyn Strategy<Phase> {
        self.strategy.as_ref()
    }

    pub fn phase(&self, name: &str) -> Option<&Phase> {
        self.phases.iter().find(|p| p.name() == name)
    }

    pub fn phase_mut(&mut self, name: &str) -> PlanResult<&mut Phase> {
        self.phases
            .iter_mut()
            .find(|p| p.name() == name)
            .ok_or_else(|| PlanError::PhaseNotFound(name.to_string()))
    }

    /// Look a step up by name across every phase.
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.phases.iter().find_map(|p| p.step(name))
    }

    pub fn step_mut(&mut self, name: &str) -> PlanResult<&mut Step> {
        self.phases
            .iter_mut()
            .flat_map(|p| p.step_mut(name).ok())
            .next()
            .ok_or_else(|| PlanError::StepNotFound(name.to_string()))
    }

    pub fn is_complete(&self) -> bool {
        self.status().is_complete()
    }

    /// Phases the strategy allows to proceed, whatever their status.
    pub fn eligible_phases(&self) -> Vec<&Phase> {
        self.strategy.eligible(&self.phases)
    }

    /// Steps the scheduling loop should try to launch this cycle.
    ///
    /// A plan that failed construction or is interrupted hands out nothing.
    pub fn candidates(&self) -> Vec<&Step> {
        if self.interrupted || !self.errors.is_empty() {
            return Vec::new();
        }
        self.eligible_phases()
            .into_iter()
            .flat_map(Phase::candidates)
            .collect()
    }

    pub fn interrupt(&mut self) {
        if !self.interrupted {
            info!(plan = %self.name, "plan interrupted");
            self.interrupted = true;
        }
    }

    pub fn proceed(&mut self) {
        if self.interrupted {
            info!(plan = %self.name, "plan resumed");
            self.interrupted = false;
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted
    }

    /// Serializable snapshot for status reporting.
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            name: self.name.clone(),
            status: self.status(),
            strategy: self.strategy.name(),
            errors: self.errors.clone(),
            phases: self
                .phases
                .iter()
                .map(|phase| PhaseSummary {
                    name: phase.name().to_string(),
                    status: phase.status(),
                    strategy: phase.strategy().name(),
                    steps: phase
                        .steps()
                        .iter()
                        .map(|step| StepSummary {
                            name: step.name().to_string(),
                            status: step.status(),
                            errors: step.errors().to_vec(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

impl Element for Plan {
    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self) -> Status {
        if !self.errors.is_empty() {
            return Status::Error;
        }
        match status_under(self.strategy.as_ref(), &self.phases) {
            status @ (Status::Complete | Status::Error) => status,
            _ if self.interrupted => Status::Waiting,
            status => status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanSummary {
    pub name: String,
    pub status: Status,
    pub strategy: &'static str,
    pub errors: Vec<String>,
    pub phases: Vec<PhaseSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseSummary {
    pub name: String,
    pub status: Status,
    pub strategy: &'static str,
    pub steps: Vec<StepSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepSummary {
    pub name: String,
    pub status: Status,
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::step_in;
    use crate::strategy::{ParallelStrategy, SerialStrategy};

    fn phase(name: &str, statuses: &[Status]) -> Phase {
        let steps = statuses
            .iter()
            .enumerate()
            .map(|(i, s)| step_in(&format!("{name}-{i}"), *s))
            .collect();
        Phase::new(name, steps, Box::new(SerialStrategy))
    }

    fn names(steps: Vec<&Step>) -> Vec<&str> {
        steps.into_iter().map(|s| s.name()).collect()
    }

    #[test]
    fn empty_plan_is_complete() {
        let plan = Plan::new("deploy", vec![], Box::new(SerialStrategy));
        assert_eq!(plan.status(), Status::Complete);
        assert!(plan.candidates().is_empty());
    }

    #[test]
    fn serial_plan_walks_phases_in_order() {
        let mut plan = Plan::new(
            "deploy",
            vec![
                phase("hello", &[Status::Pending]),
                phase("world", &[Status::Pending]),
            ],
            Box::new(SerialStrategy),
        );
        assert_eq!(plan.status(), Status::Pending);
        assert_eq!(names(plan.candidates()), vec!["hello-0"]);

        let step = plan.step_mut("hello-0").unwrap();
        step.prepare().unwrap();
        step.start().unwrap();
        assert!(plan.candidates().is_empty());
        assert_eq!(plan.status(), Status::InProgress);

        plan.step_mut("hello-0").unwrap().complete().unwrap();
        assert_eq!(names(plan.candidates()), vec!["world-0"]);

        let step = plan.step_mut("world-0").unwrap();
        step.prepare().unwrap();
        step.start().unwrap();
        step.complete().unwrap();
        assert!(plan.is_complete());
        assert!(plan.candidates().is_empty());
    }

    #[test]
    fn parallel_plan_offers_each_phase_head() {
        let plan = Plan::new(
            "deploy",
            vec![
                phase("hello", &[Status::Pending, Status::Pending]),
                phase("world", &[Status::Complete, Status::Pending]),
            ],
            Box::new(ParallelStrategy),
        );
        assert_eq!(names(plan.candidates()), vec!["hello-0", "world-1"]);
    }

    #[test]
    fn errored_phase_blocks_serial_plan() {
        let plan = Plan::new(
            "deploy",
            vec![
                phase("hello", &[Status::Error]),
                phase("world", &[Status::Pending]),
            ],
            Box::new(SerialStrategy),
        );
        assert_eq!(plan.status(), Status::Error);
        assert_eq!(plan.eligible_phases().len(), 1);
        assert!(plan.candidates().is_empty());
    }

    #[test]
    fn parallel_plan_status_agrees_with_candidates() {
        let mut plan = Plan::new(
            "deploy",
            vec![phase("a", &[Status::Error]), phase("b", &[Status::Pending])],
            Box::new(ParallelStrategy),
        );
        assert_eq!(names(plan.candidates()), vec!["b-0"]);
        assert_eq!(plan.status(), Status::InProgress);

        let step = plan.step_mut("b-0").unwrap();
        step.prepare().unwrap();
        step.start().unwrap();
        step.complete().unwrap();
        assert!(plan.candidates().is_empty());
        assert_eq!(plan.status(), Status::Error);
    }

    #[test]
    fn construction_errors_mark_plan_errored() {
        let plan = Plan::with_errors(
            "deploy",
            vec![phase("hello", &[Status::Pending])],
            Box::new(SerialStrategy),
            vec!["pod 'broken' has no tasks".to_string()],
        );
        assert_eq!(plan.status(), Status::Error);
        assert!(plan.candidates().is_empty());
        // Still inspectable.
        assert_eq!(plan.phases().len(), 1);
        assert_eq!(plan.summary().errors, vec!["pod 'broken' has no tasks"]);
    }

    #[test]
    fn interrupted_plan_waits() {
        let mut plan = Plan::new(
            "deploy",
            vec![phase("hello", &[Status::Pending])],
            Box::new(SerialStrategy),
        );
        plan.interrupt();
        assert_eq!(plan.status(), Status::Waiting);
        assert!(plan.candidates().is_empty());
        plan.proceed();
        assert_eq!(names(plan.candidates()), vec!["hello-0"]);
    }

    #[test]
    fn interrupted_phase_is_skipped() {
        let mut plan = Plan::new(
            "deploy",
            vec![
                phase("hello", &[Status::Pending]),
                phase("world", &[Status::Pending]),
            ],
            Box::new(ParallelStrategy),
        );
        plan.phase_mut("hello").unwrap().interrupt();
        assert_eq!(names(plan.candidates()), vec!["world-0"]);
        assert_eq!(plan.phase("hello").unwrap().status(), Status::Waiting);
        assert!(matches!(plan.phase_mut("nope"), Err(PlanError::PhaseNotFound(_))));
    }

    #[test]
    fn summary_mirrors_structure() {
        let plan = Plan::new(
            "deploy",
            vec![phase("hello", &[Status::Complete, Status::Error])],
            Box::new(SerialStrategy),
        );
        let summary = plan.summary();
        assert_eq!(summary.status, Status::Error);
        assert_eq!(summary.strategy, "serial");
        assert_eq!(summary.phases[0].steps[1].status, Status::Error);
        assert_eq!(summary.phases[0].steps[1].errors, vec!["test failure"]);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["phases"][0]["status"], "ERROR");
    }

    #[test]
    fn step_lookup_across_phases() {
        let mut plan = Plan::new(
            "deploy",
            vec![phase("hello", &[Status::Pending]), phase("world", &[Status::Pending])],
            Box::new(SerialStrategy),
        );
        assert!(plan.step("world-0").is_some());
        assert!(plan.step("ghost").is_none());
        assert!(matches!(plan.step_mut("ghost"), Err(PlanError::StepNotFound(_))));
    }
}
