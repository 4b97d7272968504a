//! Scheduler bootstrap.
//!
//! Wires a service spec to its durable state and plans:
//!
//! ```text
//! ServiceSpec ──> CoordinatedPersister ──(optional)──> PersisterCache
//!                        │
//!                        ├─> ensure_service_name
//!                        └─> StateStore ──> recovery overrider
//!
//! ServiceSpec ──> PlanFactory ──> deploy / replace plans
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use keel_core::ServiceSpec;
use keel_plan::{
    generator_for, DefaultPhaseFactory, NoopOverriderFactory, PermanentReplaceOverriderFactory,
    Plan, PlanFactory, PodInstanceRequirement, RecoveryPlanOverriderFactory, RecoveryPlanner,
    SerialStrategy, REPLACE_PLAN_NAME,
};
use keel_state::{
    ensure_service_name, CoordinatedPersister, Ensemble, Persister, PersisterCache, StateStore,
    TaskState, TaskStatus,
};
use tracing::info;

/// File name of the ensemble database inside the data directory.
pub const ENSEMBLE_FILE: &str = "keel.redb";

/// Process-level options, independent of the service spec.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub spec: PathBuf,
    pub data_dir: PathBuf,
    pub state_cache_enabled: bool,
    pub overrider: OverriderKind,
}

/// Which recovery overrider the scheduler installs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OverriderKind {
    Noop,
    #[default]
    PermanentReplace,
}

impl OverriderKind {
    fn factory(self) -> Box<dyn RecoveryPlanOverriderFactory> {
        match self {
            OverriderKind::Noop => Box::new(NoopOverriderFactory),
            OverriderKind::PermanentReplace => Box::new(PermanentReplaceOverriderFactory),
        }
    }
}

pub struct Scheduler {
    spec: ServiceSpec,
    state: StateStore,
    deploy: Plan,
    recovery: RecoveryPlanner,
}

impl Scheduler {
    /// Load the spec and open the on-disk ensemble under `data_dir`.
    pub fn bootstrap(options: &RuntimeOptions) -> anyhow::Result<Self> {
        let spec = ServiceSpec::from_file(&options.spec)
            .with_context(|| format!("failed to load service spec {}", options.spec.display()))?;

        // A bad credential or connect string must fail before the store exists.
        CoordinatedPersister::builder_for(&spec)
            .validate()
            .context("invalid coordination settings")?;

        std::fs::create_dir_all(&options.data_dir)?;
        let db_path = options.data_dir.join(ENSEMBLE_FILE);
        let ensemble = Ensemble::open(&db_path)?;
        info!(path = ?db_path, "ensemble opened");

        Self::with_ensemble(spec, ensemble, options.state_cache_enabled, options.overrider)
    }

    pub fn with_ensemble(
        spec: ServiceSpec,
        ensemble: Ensemble,
        state_cache_enabled: bool,
        overrider: OverriderKind,
    ) -> anyhow::Result<Self> {
        let persister = CoordinatedPersister::builder_for(&spec)
            .build(ensemble)
            .context("failed to connect to the coordination store")?;
        info!(root = %persister.root(), hosts = ?persister.hosts(), "persister ready");

        let persister: Arc<dyn Persister> = if state_cache_enabled {
            info!("state cache enabled");
            Arc::new(PersisterCache::new(persister))
        } else {
            Arc::new(persister)
        };

        ensure_service_name(persister.as_ref(), &spec.name)
            .context("service identity check failed")?;

        let factory = PlanFactory::with_strategy_generator(
            Box::new(DefaultPhaseFactory),
            generator_for(spec.deploy_strategy),
        );
        let deploy = factory.plan(&spec);
        let replace = Plan::new(
            REPLACE_PLAN_NAME,
            factory.plan(&spec).into_phases(),
            Box::new(SerialStrategy),
        );

        let state = StateStore::new(persister);
        let recovery = RecoveryPlanner::new(overrider.factory().create(state.clone(), &[replace])?);

        info!(service = %spec.name, status = %deploy.summary().status, "scheduler initialized");
        Ok(Self {
            spec,
            state,
            deploy,
            recovery,
        })
    }

    pub fn spec(&self) -> &ServiceSpec {
        &self.spec
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    pub fn deploy_plan(&self) -> &Plan {
        &self.deploy
    }

    pub fn deploy_plan_mut(&mut self) -> &mut Plan {
        &mut self.deploy
    }

    /// Plan for relaunching the given stopped pod instances.
    pub fn recovery_plan(&self, stopped: &[PodInstanceRequirement]) -> anyhow::Result<Plan> {
        self.recovery.plan(stopped)
    }

    /// Requirement for an instance of a declared pod.
    pub fn pod_instance(&self, pod_type: &str, index: u32) -> anyhow::Result<PodInstanceRequirement> {
        let pod = self
            .spec
            .pod(pod_type)
            .with_context(|| format!("unknown pod type '{pod_type}'"))?;
        anyhow::ensure!(
            index < pod.count,
            "pod '{pod_type}' has {} instances, no index {index}",
            pod.count
        );
        Ok(PodInstanceRequirement::new(pod_type, index, pod.tasks.clone()))
    }

    /// Record that a task's host is gone for good.
    pub fn mark_permanently_failed(&self, pod_type: &str, index: u32, task: &str) -> anyhow::Result<()> {
        let pod = self.pod_instance(pod_type, index)?;
        anyhow::ensure!(
            pod.tasks.iter().any(|t| t == task),
            "pod '{pod_type}' has no task '{task}'"
        );
        let name = keel_state::task_name(pod_type, index, task);
        if self.state.fetch_task(&name)?.is_none() {
            self.state
                .store_task(&TaskState::new(pod_type, index, task, TaskStatus::Lost))?;
        }
        self.state.set_permanently_failed(&name)?;
        info!(task = %name, "task marked permanently failed");
        Ok(())
    }
}

/// Default data directory, next to the spec file.
pub fn default_data_dir(spec: &Path) -> PathBuf {
    spec.parent()
        .unwrap_or_else(|| Path::new("."))
        .join("keel-data")
}
