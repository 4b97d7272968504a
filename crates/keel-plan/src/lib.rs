//! Keel deployment engine — plans, phases, steps and their ordering.
//!
//! A [`Plan`] holds ordered [`Phase`]s, a phase holds ordered [`Step`]s, and
//! each level is bound to a [`Strategy`] deciding which children may make
//! progress. The engine performs no I/O: an external scheduling loop asks a
//! plan for [`Plan::candidates`] once per cycle and advances step status as
//! work is launched and reported.
//!
//! # Components
//!
//! - **`status`** — Status enum and the aggregation shared by plans and phases
//! - **`strategy`** — Serial and Parallel strategies plus their generators
//! - **`step`**, **`phase`**, **`plan`** — the state-machine hierarchy
//! - **`factory`** — builds the deploy plan from a `ServiceSpec`
//! - **`recovery`** — pluggable recovery overrides and the recovery planner

pub mod error;
pub mod factory;
pub mod phase;
pub mod plan;
pub mod recovery;
pub mod status;
pub mod step;
pub mod strategy;

pub use error::{PlanError, PlanResult};
pub use factory::{DefaultPhaseFactory, PhaseFactory, PlanFactory, DEPLOY_PLAN_NAME};
pub use phase::Phase;
pub use plan::{PhaseSummary, Plan, PlanSummary, StepSummary};
pub use recovery::{
    default_recovery_phase, NoopOverrider, NoopOverriderFactory, PermanentReplaceOverrider,
    PermanentReplaceOverriderFactory, RecoveryPlanOverrider, RecoveryPlanOverriderFactory,
    RecoveryPlanner, PERMANENT_RECOVERY_PHASE_NAME, RECOVERY_PLAN_NAME, REPLACE_PLAN_NAME,
};
pub use status::Status;
pub use step::{PodInstanceRequirement, RecoveryType, Step};
pub use strategy::{
    generator_for, Element, ParallelStrategy, SerialStrategy, Strategy, StrategyGenerator,
};
