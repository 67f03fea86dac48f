//! In-memory coalescing of domain change events between flushes.
use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

use crate::event::{Activation, DomainChangeEvent};

/// Batch contents handed to a flush. Ordered sets keep per-domain
/// processing and log output deterministic.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DrainedBatch {
    pub activations: BTreeSet<String>,
    pub deactivations: BTreeSet<String>,
    pub domain_info: HashMap<String, DomainChangeEvent>,
}

impl DrainedBatch {
    pub fn is_empty(&self) -> bool {
        self.activations.is_empty() && self.deactivations.is_empty()
    }
}

/// Last-write-wins accumulator keyed by domain. A domain is never in both
/// the activation and deactivation sets.
#[derive(Debug, Default)]
pub struct BatchAccumulator {
    pending: DrainedBatch,
}

impl BatchAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest(&mut self, event: DomainChangeEvent) {
        let domain = event.domain.clone();
        match event.active {
            Activation::Activate => {
                self.pending.deactivations.remove(&domain);
                self.pending.activations.insert(domain.clone());
                self.pending.domain_info.insert(domain, event);
            }
            Activation::Deactivate => {
                self.pending.activations.remove(&domain);
                self.pending.domain_info.remove(&domain);
                self.pending.deactivations.insert(domain);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of distinct domains waiting for the next flush.
    pub fn len(&self) -> usize {
        self.pending.activations.len() + self.pending.deactivations.len()
    }

    pub fn pending_activations(&self) -> usize {
        self.pending.activations.len()
    }

    pub fn pending_deactivations(&self) -> usize {
        self.pending.deactivations.len()
    }

    pub fn is_due(&self, now: Instant, last_flush: Instant, batch_timeout: Duration) -> bool {
        !self.is_empty() && now.saturating_duration_since(last_flush) >= batch_timeout
    }

    pub fn drain(&mut self) -> DrainedBatch {
        std::mem::take(&mut self.pending)
    }
}
