//! Builds the deploy plan from a service spec.

use keel_core::{PodSpec, ServiceSpec, StrategyKind};
use tracing::{debug, warn};

use crate::error::{PlanError, PlanResult};
use crate::phase::Phase;
use crate::plan::Plan;
use crate::step::{PodInstanceRequirement, Step};
use crate::strategy::{generator_for, StrategyGenerator};

pub const DEPLOY_PLAN_NAME: &str = "deploy";

/// Turns one pod declaration into a phase.
pub trait PhaseFactory: Send + Sync {
    fn phase(&self, pod: &PodSpec) -> PlanResult<Phase>;
}

/// One step per pod instance, ordered by index, under the pod's own strategy.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPhaseFactory;

impl PhaseFactory for DefaultPhaseFactory {
    fn phase(&self, pod: &PodSpec) -> PlanResult<Phase> {
        if pod.count == 0 {
            return Err(PlanError::PhaseConstruction {
                pod: pod.pod_type.clone(),
                reason: "pod has no instances".to_string(),
            });
        }
        if pod.tasks.is_empty() {
            return Err(PlanError::PhaseConstruction {
                pod: pod.pod_type.clone(),
                reason: "pod declares no tasks".to_string(),
            });
        }

        let steps: Vec<Step> = (0..pod.count)
            .map(|index| Step::for_pod(PodInstanceRequirement::new(&pod.pod_type, index, pod.tasks.clone())))
            .collect();
        let strategy = generator_for::<Step>(pod.strategy).generate(&steps);
        Ok(Phase::new(&pod.pod_type, steps, strategy))
    }
}

pub struct PlanFactory {
    phases: Box<dyn PhaseFactory>,
    strategy: Box<dyn StrategyGenerator<Phase>>,
}

impl PlanFactory {
    /// Phases of the resulting plan run serially.
    pub fn new(phases: Box<dyn PhaseFactory>) -> Self {
        Self::with_strategy_generator(phases, generator_for(StrategyKind::Serial))
    }

    pub fn with_strategy_generator(
        phases: Box<dyn PhaseFactory>,
        strategy: Box<dyn StrategyGenerator<Phase>>,
    ) -> Self {
        Self { phases, strategy }
    }

    /// Build the `deploy` plan. Pods that fail to build are recorded as plan
    /// errors instead of aborting; the plan then reports ERROR.
    pub fn plan(&self, spec: &ServiceSpec) -> Plan {
        let mut phases = Vec::with_capacity(spec.pods.len());
        let mut errors = Vec::new();

        for pod in &spec.pods {
            match self.phases.phase(pod) {
                Ok(phase) => phases.push(phase),
                Err(e) => {
                    warn!(service = %spec.name, pod = %pod.pod_type, error = %e, "phase construction failed");
                    errors.push(e.to_string());
                }
            }
        }

        let strategy = self.strategy.generate(&phases);
        debug!(
            service = %spec.name,
            phases = phases.len(),
            errors = errors.len(),
            strategy = strategy.name(),
            "built deploy plan"
        );
        Plan::with_errors(DEPLOY_PLAN_NAME, phases, strategy, errors)
    }
}
