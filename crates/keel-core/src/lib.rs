//! keel-core — service specification types shared across Keel crates.

pub mod spec;

pub use spec::{
    ConfigError, ConfigResult, PodSpec, SchedulerConfig, ServiceSpec, StrategyKind,
};
