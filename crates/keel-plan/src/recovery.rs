//! Recovery overrides.
//!
//! When a pod instance stops abnormally the scheduler builds a recovery phase
//! for it. By default that is a single transient relaunch step. A
//! [`RecoveryPlanOverrider`] gets the first say: returning `Some(phase)`
//! replaces the default for that instance, `None` keeps it.
//!
//! Overriders are built once per scheduler by a [`RecoveryPlanOverriderFactory`]
//! from durable task state and the plans the scheduler knows about.

use keel_state::StateStore;
use tracing::{debug, info};

use crate::phase::Phase;
use crate::plan::Plan;
use crate::step::{PodInstanceRequirement, RecoveryType, Step};
use crate::strategy::{Element, ParallelStrategy, SerialStrategy};

pub const RECOVERY_PLAN_NAME: &str = "recovery";
pub const REPLACE_PLAN_NAME: &str = "replace";
pub const PERMANENT_RECOVERY_PHASE_NAME: &str = "permanent-node-failure-recovery";

pub trait RecoveryPlanOverrider: Send + Sync {
    /// Custom recovery for a stopped pod instance, or `None` for the default.
    ///
    /// Must not modify persisted state.
    fn override_recovery(&self, stopped: &PodInstanceRequirement) -> anyhow::Result<Option<Phase>>;
}

pub trait RecoveryPlanOverriderFactory: Send + Sync {
    fn create(&self, state: StateStore, plans: &[Plan]) -> anyhow::Result<Box<dyn RecoveryPlanOverrider>>;
}

/// Never overrides.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopOverrider;

impl RecoveryPlanOverrider for NoopOverrider {
    fn override_recovery(&self, _stopped: &PodInstanceRequirement) -> anyhow::Result<Option<Phase>> {
        Ok(None)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopOverriderFactory;

impl RecoveryPlanOverriderFactory for NoopOverriderFactory {
    fn create(&self, _state: StateStore, _plans: &[Plan]) -> anyhow::Result<Box<dyn RecoveryPlanOverrider>> {
        Ok(Box::new(NoopOverrider))
    }
}

/// Replaces pods lost to a permanent node failure using the steps of the
/// `replace` plan.
///
/// Fires when the stopped requirement is marked permanent or when any of its
/// tasks is flagged permanently failed in the state store. The returned phase
/// holds fresh copies of the replace steps for that one instance.
pub struct PermanentReplaceOverrider {
    state: StateStore,
    /// Step templates of the replace plan, if the scheduler has one.
    replace: Option<Vec<(String, PodInstanceRequirement)>>,
}

impl PermanentReplaceOverrider {
    pub fn new(state: StateStore, plans: &[Plan]) -> Self {
        let replace = plans.iter().find(|p| p.name() == REPLACE_PLAN_NAME).map(|plan| {
            plan.phases()
                .iter()
                .flat_map(Phase::steps)
                .filter_map(|step| step.requirement().map(|r| (step.name().to_string(), r.clone())))
                .collect()
        });
        Self { state, replace }
    }

    fn is_permanent(&self, stopped: &PodInstanceRequirement) -> anyhow::Result<bool> {
        if stopped.recovery == RecoveryType::Permanent {
            return Ok(true);
        }
        for task in stopped.task_names() {
            if self.state.is_permanently_failed(&task)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl RecoveryPlanOverrider for PermanentReplaceOverrider {
    fn override_recovery(&self, stopped: &PodInstanceRequirement) -> anyhow::Result<Option<Phase>> {
        let Some(templates) = &self.replace else {
            return Ok(None);
        };
        if !self.is_permanent(stopped)? {
            return Ok(None);
        }

        let steps: Vec<Step> = templates
            .iter()
            .filter(|(_, r)| r.pod_type == stopped.pod_type && r.index == stopped.index)
            .map(|(name, r)| Step::new(name, Some(r.clone().with_recovery(RecoveryType::Permanent))))
            .collect();
        if steps.is_empty() {
            debug!(pod = %stopped.pod_instance_name(), "replace plan has no steps for pod instance");
            return Ok(None);
        }

        info!(
            pod = %stopped.pod_instance_name(),
            steps = steps.len(),
            "replacing permanently failed pod instance"
        );
        Ok(Some(Phase::new(PERMANENT_RECOVERY_PHASE_NAME, steps, Box::new(SerialStrategy))))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PermanentReplaceOverriderFactory;

impl RecoveryPlanOverriderFactory for PermanentReplaceOverriderFactory {
    fn create(&self, state: StateStore, plans: &[Plan]) -> anyhow::Result<Box<dyn RecoveryPlanOverrider>> {
        Ok(Box::new(PermanentReplaceOverrider::new(state, plans)))
    }
}

/// Builds the `recovery` plan for a set of stopped pod instances.
#[derive(Default)]
pub struct RecoveryPlanner {
    overrider: Option<Box<dyn RecoveryPlanOverrider>>,
}

impl RecoveryPlanner {
    pub fn new(overrider: Box<dyn RecoveryPlanOverrider>) -> Self {
        Self {
            overrider: Some(overrider),
        }
    }

    /// Planner that always uses default recovery.
    pub fn without_overrider() -> Self {
        Self::default()
    }

    /// The overrider's phase if it returns one, else the default relaunch.
    pub fn recovery_phase(&self, stopped: &PodInstanceRequirement) -> anyhow::Result<Phase> {
        if let Some(overrider) = &self.overrider {
            if let Some(phase) = overrider.override_recovery(stopped)? {
                debug!(pod = %stopped.pod_instance_name(), phase = %phase.name(), "recovery overridden");
                return Ok(phase);
            }
        }
        Ok(default_recovery_phase(stopped))
    }

    /// Recovery phases for all stopped instances run in parallel.
    pub fn plan(&self, stopped: &[PodInstanceRequirement]) -> anyhow::Result<Plan> {
        let phases = stopped
            .iter()
            .map(|req| self.recovery_phase(req))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Plan::new(RECOVERY_PLAN_NAME, phases, Box::new(ParallelStrategy)))
    }
}

/// One step relaunching the instance in place.
pub fn default_recovery_phase(stopped: &PodInstanceRequirement) -> Phase {
    let recovery = match stopped.recovery {
        RecoveryType::None => RecoveryType::Transient,
        other => other,
    };
    let step = Step::for_pod(stopped.clone().with_recovery(recovery));
    Phase::new(stopped.pod_instance_name(), vec![step], Box::new(SerialStrategy))
}
