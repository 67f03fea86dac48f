//! Crate entrypoint wiring together the queue, registry, DNS, deployment and
//! garbage-collection collaborators behind the batch orchestrator.

pub mod batch;
pub mod config;
pub mod db;
pub mod deploy;
pub mod dns;
pub mod error;
pub mod event;
pub mod gc;
pub mod orchestrator;
pub mod powerdns;
pub mod queue;
pub mod registry;
pub mod stats;
pub mod validation;

#[cfg(test)]
mod test_utils;

use std::sync::Arc;

use deploy::DeploymentTrigger;
use dns::DnsZoneManager;
use gc::ResourceTeardown;
use registry::DomainRegistry;

pub use config::WorkerConfig;
pub use error::{ErrorKind, WorkerError, WorkerResult};
pub use event::{Activation, DomainChangeEvent};
pub use orchestrator::{FlushOutcome, FlushReport, Orchestrator};

/// Downstream systems the orchestrator drives, shared behind trait objects.
#[derive(Clone)]
pub struct Collaborators {
    pub registry: Arc<dyn DomainRegistry>,
    pub dns: Arc<dyn DnsZoneManager>,
    pub deploy: Arc<dyn DeploymentTrigger>,
    pub teardown: Arc<dyn ResourceTeardown>,
}
