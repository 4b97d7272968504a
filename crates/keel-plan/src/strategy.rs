//! Strategies — which children of a plan or phase may proceed now.
//!
//! One trait serves both levels: `Strategy<Phase>` orders the phases of a
//! plan and `Strategy<Step>` orders the steps of a phase. Strategies hold
//! no counters; eligibility is recomputed from child status on every call.

use std::fmt;

use keel_core::StrategyKind;

use crate::status::{aggregate, Status};

/// A progressable unit a strategy can order.
pub trait Element {
    fn name(&self) -> &str;
    fn status(&self) -> Status;
}

pub trait Strategy<E: Element>: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Children eligible to proceed, in declaration order.
    fn eligible<'a>(&self, children: &'a [E]) -> Vec<&'a E>;
}

/// Produces a strategy for a list of children.
pub trait StrategyGenerator<E: Element>: Send + Sync {
    fn generate(&self, children: &[E]) -> Box<dyn Strategy<E>>;
}

/// The first incomplete child, and nothing after it.
///
/// An errored child stays eligible so it can be inspected or remediated,
/// and keeps blocking its successors.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialStrategy;

impl<E: Element> Strategy<E> for SerialStrategy {
    fn name(&self) -> &'static str {
        "serial"
    }

    fn eligible<'a>(&self, children: &'a [E]) -> Vec<&'a E> {
        children
            .iter()
            .find(|child| !child.status().is_complete())
            .into_iter()
            .collect()
    }
}

impl<E: Element> StrategyGenerator<E> for SerialStrategy {
    fn generate(&self, _children: &[E]) -> Box<dyn Strategy<E>> {
        Box::new(SerialStrategy)
    }
}

/// Every incomplete child at once.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelStrategy;

impl<E: Element> Strategy<E> for ParallelStrategy {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn eligible<'a>(&self, children: &'a [E]) -> Vec<&'a E> {
        children
            .iter()
            .filter(|child| !child.status().is_complete())
            .collect()
    }
}

impl<E: Element> StrategyGenerator<E> for ParallelStrategy {
    fn generate(&self, _children: &[E]) -> Box<dyn Strategy<E>> {
        Box::new(ParallelStrategy)
    }
}

/// Generator for a configured strategy kind.
pub fn generator_for<E: Element + 'static>(kind: StrategyKind) -> Box<dyn StrategyGenerator<E>> {
    match kind {
        StrategyKind::Serial => Box::new(SerialStrategy),
        StrategyKind::Parallel => Box::new(ParallelStrategy),
    }
}

/// Status of a parent whose children run under `strategy`.
///
/// An errored child only makes the parent `Error` once the strategy offers
/// nothing else to work on. Until then the parent is `InProgress`.
pub fn status_under<E: Element>(strategy: &dyn Strategy<E>, children: &[E]) -> Status {
    match aggregate(children.iter().map(E::status)) {
        Status::Error
            if strategy
                .eligible(children)
                .iter()
                .any(|child| !child.status().is_error()) =>
        {
            Status::InProgress
        }
        status => status,
    }
}
