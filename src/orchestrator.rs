//! Batch orchestration: queue intake, flush scheduling and the ordered
//! registry → DNS → deploy → GC workflow.
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio::time;
use tracing::{debug, error, info, warn};

use crate::Collaborators;
use crate::batch::BatchAccumulator;
use crate::config::WorkerConfig;
use crate::deploy::DeploymentTrigger;
use crate::dns::{DnsZoneManager, ZoneProvision};
use crate::error::{ErrorKind, WorkerError};
use crate::event::{DomainChangeEvent, parse_message_body};
use crate::gc::{GarbageCollector, GcReport};
use crate::queue::{QueueClient, QueueMessage};
use crate::registry::DomainRegistry;
use crate::stats::WorkerStats;

/// What happened to a received message. Both outcomes delete it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ingested,
    Discarded,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FlushReport {
    pub deactivated: usize,
    pub deactivation_failures: usize,
    pub records_removed: usize,
    pub record_removal_failures: usize,
    pub activated: usize,
    pub activation_failures: usize,
    pub zones_created: usize,
    pub zone_failures: usize,
    /// Size of the authoritative snapshot, if the re-read succeeded.
    pub deployed_domains: Option<usize>,
    pub triggered: bool,
    pub gc: Option<GcReport>,
    /// The registry connection was lost and could not be re-established;
    /// remaining registry writes in this cycle were skipped.
    pub registry_unavailable: bool,
}

impl FlushReport {
    fn registry_updates(&self) -> usize {
        self.deactivated + self.activated
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was pending; no collaborator was called.
    Empty,
    /// No registry update succeeded, or the registry became unreachable, so
    /// deployment and GC were skipped.
    Aborted(FlushReport),
    Completed(FlushReport),
}

pub struct Orchestrator {
    config: WorkerConfig,
    registry: Arc<dyn DomainRegistry>,
    dns: Arc<dyn DnsZoneManager>,
    deploy: Arc<dyn DeploymentTrigger>,
    gc: GarbageCollector,
    batch: BatchAccumulator,
    stats: WorkerStats,
    last_flush: Instant,
    last_stats: Instant,
}

impl Orchestrator {
    pub fn new(config: WorkerConfig, collaborators: Collaborators) -> Self {
        let now = Instant::now();
        Self {
            config,
            registry: collaborators.registry,
            dns: collaborators.dns,
            deploy: collaborators.deploy,
            gc: GarbageCollector::new(collaborators.teardown),
            batch: BatchAccumulator::new(),
            stats: WorkerStats::new(),
            last_flush: now,
            last_stats: now,
        }
    }

    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    pub fn pending(&self) -> &BatchAccumulator {
        &self.batch
    }

    /// Fold one queue message into the pending batch. Malformed messages
    /// are dropped for good.
    pub fn ingest_message(&mut self, message: &QueueMessage) -> Disposition {
        match parse_message_body(&message.body) {
            Ok(event) => {
                self.ingest(event);
                Disposition::Ingested
            }
            Err(err) => {
                warn!(
                    message_id = %message.message_id,
                    error = %WorkerError::Malformed(err.to_string()),
                    "discarding message"
                );
                self.stats.messages_discarded += 1;
                Disposition::Discarded
            }
        }
    }

    pub fn ingest(&mut self, event: DomainChangeEvent) {
        info!(
            domain = %event.domain,
            active = event.active.as_status(),
            tenant = event.tenant_id.as_deref().unwrap_or("-"),
            "queued domain change"
        );
        self.batch.ingest(event);
        self.stats.messages_processed += 1;
    }

    /// Ingest received messages and acknowledge each one. Ingestion is the
    /// commit point; a failed delete only causes a harmless redelivery.
    pub async fn absorb(&mut self, queue: &dyn QueueClient, messages: Vec<QueueMessage>) -> usize {
        let received = messages.len();
        if received > 0 {
            debug!(received, "received messages");
        }
        for message in &messages {
            self.ingest_message(message);
            if let Err(err) = queue.delete(&message.receipt_handle).await {
                warn!(message_id = %message.message_id, error = %err, "failed to delete message");
            }
        }
        received
    }

    /// One long-poll followed by ingestion.
    pub async fn poll_once(&mut self, queue: &dyn QueueClient) -> Result<usize, WorkerError> {
        let messages = queue
            .receive(self.config.max_messages, self.config.wait_time_seconds)
            .await?;
        Ok(self.absorb(queue, messages).await)
    }

    pub async fn flush_if_due(&mut self, now: Instant) -> Option<FlushOutcome> {
        if !self
            .batch
            .is_due(now, self.last_flush, self.config.batch_timeout)
        {
            return None;
        }
        Some(self.flush(now).await)
    }

    pub async fn flush(&mut self, now: Instant) -> FlushOutcome {
        let batch = self.batch.drain();
        if batch.is_empty() {
            return FlushOutcome::Empty;
        }
        self.last_flush = now;

        info!(
            activations = batch.activations.len(),
            deactivations = batch.deactivations.len(),
            "processing batch"
        );
        let mut report = FlushReport::default();

        for domain in &batch.deactivations {
            self.deactivate(domain, &mut report).await;
        }
        for domain in &batch.activations {
            self.activate(domain, batch.domain_info.get(domain), &mut report)
                .await;
        }
        self.stats.zones_created += report.zones_created as u64;
        self.stats.records_removed += report.records_removed as u64;

        if report.registry_unavailable {
            error!(
                deactivated = report.deactivated,
                activated = report.activated,
                "registry unreachable, aborting cycle"
            );
            return FlushOutcome::Aborted(report);
        }
        if report.registry_updates() == 0 {
            warn!(
                failures = report.activation_failures + report.deactivation_failures,
                "no registry update succeeded, skipping deployment"
            );
            return FlushOutcome::Aborted(report);
        }

        match self.registry.list_active().await {
            Ok(active) => {
                info!(count = active.len(), "fetched active domains from registry");
                report.deployed_domains = Some(active.len());
                match self.deploy.trigger(&active).await {
                    Ok(()) => {
                        report.triggered = true;
                        self.stats.triggers_fired += 1;
                        self.stats.batches_processed += 1;
                        self.stats.domains_processed += active.len() as u64;
                    }
                    Err(err) => {
                        self.stats.trigger_failures += 1;
                        error!(error = %err, domains = active.len(), "deployment trigger failed");
                    }
                }
            }
            Err(err) => {
                error!(error = %err, kind = ?err.kind(), "failed to re-read active domains, skipping deployment");
            }
        }

        match self.gc.collect(self.registry.as_ref()).await {
            Ok(gc) => {
                self.stats.domains_collected += gc.collected as u64;
                report.gc = Some(gc);
            }
            Err(err) => error!(error = %err, "garbage collection failed"),
        }

        info!(
            deactivated = report.deactivated,
            activated = report.activated,
            zones_created = report.zones_created,
            records_removed = report.records_removed,
            triggered = report.triggered,
            "batch complete"
        );
        FlushOutcome::Completed(report)
    }

    /// Classify a failed registry write. A lost connection takes the
    /// registry out for the rest of the cycle; anything else is isolated to
    /// the one domain.
    fn registry_write_failed(domain: &str, err: &WorkerError, report: &mut FlushReport) {
        match err.kind() {
            ErrorKind::ConnectionLost => {
                error!(%domain, error = %err, "registry connection lost, skipping remaining registry writes");
                report.registry_unavailable = true;
            }
            kind => error!(%domain, error = %err, ?kind, "registry write failed, skipping domain"),
        }
    }

    async fn deactivate(&self, domain: &str, report: &mut FlushReport) {
        if report.registry_unavailable {
            report.deactivation_failures += 1;
            return;
        }
        if let Err(err) = self.registry.mark_inactive(domain).await {
            Self::registry_write_failed(domain, &err, report);
            report.deactivation_failures += 1;
            return;
        }
        report.deactivated += 1;

        match self.dns.delete_non_essential_records(domain).await {
            Ok(removed) => {
                report.records_removed += removed;
                info!(%domain, removed, "deactivated domain");
            }
            Err(err) => {
                report.record_removal_failures += 1;
                warn!(%domain, error = %err, "registry updated but record deletion failed");
            }
        }
    }

    async fn activate(
        &self,
        domain: &str,
        info: Option<&DomainChangeEvent>,
        report: &mut FlushReport,
    ) {
        let Some(tenant_id) = info.and_then(|e| e.tenant_id.as_deref()) else {
            let err = WorkerError::MissingDomainInfo(domain.to_string());
            warn!(%domain, error = %err, "skipping activation");
            report.activation_failures += 1;
            return;
        };
        let zone_hint = info.and_then(|e| e.zone_hint);

        if report.registry_unavailable {
            report.activation_failures += 1;
            return;
        }
        if let Err(err) = self
            .registry
            .upsert_active(domain, tenant_id, zone_hint)
            .await
        {
            Self::registry_write_failed(domain, &err, report);
            report.activation_failures += 1;
            return;
        }
        report.activated += 1;

        match self.dns.ensure_zone(domain).await {
            Ok(ZoneProvision::Created(zone_id)) => {
                report.zones_created += 1;
                info!(%domain, %zone_id, tenant = tenant_id, "activated domain, zone created");
            }
            Ok(ZoneProvision::AlreadyExists) => {
                info!(%domain, tenant = tenant_id, "activated domain, zone already exists");
            }
            Err(err) => {
                report.zone_failures += 1;
                warn!(%domain, error = %err, "registry updated but zone provisioning failed");
            }
        }
    }

    fn log_stats_if_due(&mut self) {
        if self.last_stats.elapsed() >= self.config.stats_interval {
            self.stats.log_summary();
            self.last_stats = Instant::now();
        }
    }

    /// Receive, batch and flush until `shutdown` resolves, then flush
    /// whatever is still pending.
    pub async fn run<F>(&mut self, queue: &dyn QueueClient, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(
            batch_timeout_secs = self.config.batch_timeout.as_secs(),
            max_messages = self.config.max_messages,
            wait_time_secs = self.config.wait_time_seconds,
            "worker started"
        );

        loop {
            let received = tokio::select! {
                biased;
                () = &mut shutdown => break,
                received = queue.receive(self.config.max_messages, self.config.wait_time_seconds) => received,
            };

            match received {
                Ok(messages) => {
                    self.absorb(queue, messages).await;
                }
                Err(err) => {
                    error!(error = %err, "failed to receive messages");
                    tokio::select! {
                        biased;
                        () = &mut shutdown => break,
                        () = time::sleep(self.config.receive_error_backoff) => {}
                    }
                }
            }

            self.flush_if_due(Instant::now()).await;
            self.log_stats_if_due();
        }

        info!(pending = self.batch.len(), "shutdown requested, stopping receives");
        if !self.batch.is_empty() {
            self.flush(Instant::now()).await;
        }
        self.stats.log_summary();
        info!("worker stopped");
    }
}
