//! In-memory collaborators for orchestrator and GC tests.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::deploy::DeploymentTrigger;
use crate::dns::{DnsZoneManager, REMOVABLE_RECORD_TYPES};
use crate::error::{WorkerError, WorkerResult};
use crate::event::Activation;
use crate::gc::ResourceTeardown;
use crate::queue::{QueueClient, QueueMessage};
use crate::registry::DomainRegistry;

// ===== MockRegistry =====

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockRow {
    pub tenant_id: String,
    pub status: Activation,
    pub zone_hint: Option<i64>,
}

pub struct MockRegistry {
    rows: RwLock<BTreeMap<String, MockRow>>,
    calls: RwLock<Vec<String>>,
    /// Writes for these domains fail.
    failing: RwLock<BTreeSet<String>>,
    fail_reads: RwLock<bool>,
    connection_lost: RwLock<bool>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            calls: RwLock::new(Vec::new()),
            failing: RwLock::new(BTreeSet::new()),
            fail_reads: RwLock::new(false),
            connection_lost: RwLock::new(false),
        }
    }

    async fn seed(&self, domain: &str, tenant: &str, status: Activation) {
        self.rows.write().await.insert(
            domain.to_string(),
            MockRow {
                tenant_id: tenant.to_string(),
                status,
                zone_hint: None,
            },
        );
    }

    pub async fn seed_active(&self, domain: &str, tenant: &str) {
        self.seed(domain, tenant, Activation::Activate).await;
    }

    pub async fn seed_inactive(&self, domain: &str, tenant: &str) {
        self.seed(domain, tenant, Activation::Deactivate).await;
    }

    pub async fn fail_writes_for(&self, domain: &str) {
        self.failing.write().await.insert(domain.to_string());
    }

    pub async fn fail_writes_for_all(&self, domains: &[&str]) {
        for domain in domains {
            self.fail_writes_for(domain).await;
        }
    }

    pub async fn set_fail_reads(&self, fail: bool) {
        *self.fail_reads.write().await = fail;
    }

    /// Every call fails as if the reconnect attempt failed.
    pub async fn set_connection_lost(&self, lost: bool) {
        *self.connection_lost.write().await = lost;
    }

    pub async fn row(&self, domain: &str) -> Option<MockRow> {
        self.rows.read().await.get(domain).cloned()
    }

    pub async fn contains(&self, domain: &str) -> bool {
        self.rows.read().await.contains_key(domain)
    }

    pub async fn calls(&self) -> Vec<String> {
        self.calls.read().await.clone()
    }

    async fn record(&self, call: String) {
        self.calls.write().await.push(call);
    }

    async fn check_write(&self, domain: &str) -> WorkerResult<()> {
        if *self.connection_lost.read().await {
            return Err(WorkerError::ConnectionLost("reconnect failed".into()));
        }
        if self.failing.read().await.contains(domain) {
            return Err(WorkerError::Registry(sqlx::Error::RowNotFound));
        }
        Ok(())
    }

    async fn list(&self, status: Activation) -> WorkerResult<Vec<String>> {
        if *self.connection_lost.read().await {
            return Err(WorkerError::ConnectionLost("reconnect failed".into()));
        }
        if *self.fail_reads.read().await {
            return Err(WorkerError::ConnectionLost("read refused".into()));
        }
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .filter(|(_, row)| row.status == status)
            .map(|(domain, _)| domain.clone())
            .collect())
    }
}

#[async_trait]
impl DomainRegistry for MockRegistry {
    async fn upsert_active(
        &self,
        domain: &str,
        tenant_id: &str,
        zone_hint: Option<i64>,
    ) -> WorkerResult<()> {
        self.record(format!("upsert_active:{domain}")).await;
        self.check_write(domain).await?;
        let mut rows = self.rows.write().await;
        let previous_hint = rows.get(domain).and_then(|r| r.zone_hint);
        rows.insert(
            domain.to_string(),
            MockRow {
                tenant_id: tenant_id.to_string(),
                status: Activation::Activate,
                zone_hint: zone_hint.or(previous_hint),
            },
        );
        Ok(())
    }

    async fn mark_inactive(&self, domain: &str) -> WorkerResult<()> {
        self.record(format!("mark_inactive:{domain}")).await;
        self.check_write(domain).await?;
        if let Some(row) = self.rows.write().await.get_mut(domain) {
            row.status = Activation::Deactivate;
        }
        Ok(())
    }

    async fn list_active(&self) -> WorkerResult<Vec<String>> {
        self.record("list_active".into()).await;
        self.list(Activation::Activate).await
    }

    async fn list_inactive(&self) -> WorkerResult<Vec<String>> {
        self.record("list_inactive".into()).await;
        self.list(Activation::Deactivate).await
    }

    async fn delete_domain(&self, domain: &str) -> WorkerResult<()> {
        self.record(format!("delete_domain:{domain}")).await;
        self.check_write(domain).await?;
        self.rows.write().await.remove(domain);
        Ok(())
    }
}

// ===== MockDns =====

pub struct MockDns {
    /// zone name -> record types present
    zones: RwLock<BTreeMap<String, Vec<String>>>,
    calls: RwLock<Vec<String>>,
    failing: RwLock<BTreeSet<String>>,
}

impl MockDns {
    pub fn new() -> Self {
        Self {
            zones: RwLock::new(BTreeMap::new()),
            calls: RwLock::new(Vec::new()),
            failing: RwLock::new(BTreeSet::new()),
        }
    }

    pub async fn seed_zone(&self, domain: &str, record_types: &[&str]) {
        self.zones.write().await.insert(
            domain.to_string(),
            record_types.iter().map(|t| t.to_string()).collect(),
        );
    }

    pub async fn fail_for(&self, domain: &str) {
        self.failing.write().await.insert(domain.to_string());
    }

    pub async fn records(&self, domain: &str) -> Option<Vec<String>> {
        self.zones.read().await.get(domain).cloned()
    }

    pub async fn zone_count(&self) -> usize {
        self.zones.read().await.len()
    }

    pub async fn calls(&self) -> Vec<String> {
        self.calls.read().await.clone()
    }

    async fn enter(&self, call: &str, domain: &str) -> WorkerResult<()> {
        self.calls.write().await.push(format!("{call}:{domain}"));
        if self.failing.read().await.contains(domain) {
            return Err(WorkerError::dns(anyhow::anyhow!("provider refused {domain}")));
        }
        Ok(())
    }
}

#[async_trait]
impl DnsZoneManager for MockDns {
    async fn zone_exists(&self, domain: &str) -> WorkerResult<bool> {
        self.enter("zone_exists", domain).await?;
        Ok(self.zones.read().await.contains_key(domain))
    }

    async fn create_zone(&self, domain: &str) -> WorkerResult<String> {
        self.enter("create_zone", domain).await?;
        self.zones.write().await.insert(
            domain.to_string(),
            vec!["SOA".to_string(), "NS".to_string()],
        );
        Ok(format!("zone-{domain}"))
    }

    async fn delete_non_essential_records(&self, domain: &str) -> WorkerResult<usize> {
        self.enter("delete_records", domain).await?;
        let mut zones = self.zones.write().await;
        let Some(records) = zones.get_mut(domain) else {
            return Ok(0);
        };
        let before = records.len();
        records.retain(|t| !REMOVABLE_RECORD_TYPES.contains(&t.as_str()));
        Ok(before - records.len())
    }
}

// ===== MockTrigger =====

pub struct MockTrigger {
    snapshots: RwLock<Vec<Vec<String>>>,
    fail: RwLock<bool>,
}

impl MockTrigger {
    pub fn new() -> Self {
        Self {
            snapshots: RwLock::new(Vec::new()),
            fail: RwLock::new(false),
        }
    }

    pub async fn set_fail(&self, fail: bool) {
        *self.fail.write().await = fail;
    }

    pub async fn snapshots(&self) -> Vec<Vec<String>> {
        self.snapshots.read().await.clone()
    }
}

#[async_trait]
impl DeploymentTrigger for MockTrigger {
    async fn trigger(&self, active_domains: &[String]) -> WorkerResult<()> {
        self.snapshots.write().await.push(active_domains.to_vec());
        if *self.fail.read().await {
            return Err(WorkerError::deploy(anyhow::anyhow!("dispatch rejected")));
        }
        Ok(())
    }
}

// ===== MockTeardown =====

pub struct MockTeardown {
    attempts: RwLock<Vec<String>>,
    failing: RwLock<BTreeSet<String>>,
}

impl MockTeardown {
    pub fn new() -> Self {
        Self {
            attempts: RwLock::new(Vec::new()),
            failing: RwLock::new(BTreeSet::new()),
        }
    }

    pub async fn fail_for(&self, domain: &str) {
        self.failing.write().await.insert(domain.to_string());
    }

    pub async fn clear_failures(&self) {
        self.failing.write().await.clear();
    }

    pub async fn attempts(&self) -> Vec<String> {
        self.attempts.read().await.clone()
    }
}

#[async_trait]
impl ResourceTeardown for MockTeardown {
    async fn teardown(&self, domain: &str) -> WorkerResult<()> {
        self.attempts.write().await.push(domain.to_string());
        if self.failing.read().await.contains(domain) {
            return Err(WorkerError::teardown(domain, "still referenced"));
        }
        Ok(())
    }
}

// ===== MockQueue =====

pub struct MockQueue {
    pending: RwLock<VecDeque<QueueMessage>>,
    deleted: RwLock<Vec<String>>,
    next_id: RwLock<usize>,
    receive_failures: RwLock<usize>,
}

impl MockQueue {
    pub fn new() -> Self {
        Self {
            pending: RwLock::new(VecDeque::new()),
            deleted: RwLock::new(Vec::new()),
            next_id: RwLock::new(0),
            receive_failures: RwLock::new(0),
        }
    }

    pub async fn push(&self, body: impl Into<String>) -> String {
        let mut next_id = self.next_id.write().await;
        *next_id += 1;
        let handle = format!("rh-{}", *next_id);
        self.pending.write().await.push_back(QueueMessage {
            message_id: format!("m-{}", *next_id),
            receipt_handle: handle.clone(),
            body: body.into(),
        });
        handle
    }

    /// The next `count` receives fail.
    pub async fn fail_receives(&self, count: usize) {
        *self.receive_failures.write().await = count;
    }

    pub async fn deleted(&self) -> Vec<String> {
        self.deleted.read().await.clone()
    }

    pub async fn pending(&self) -> usize {
        self.pending.read().await.len()
    }
}

#[async_trait]
impl QueueClient for MockQueue {
    async fn receive(
        &self,
        max_messages: u8,
        _wait_time_seconds: u8,
    ) -> WorkerResult<Vec<QueueMessage>> {
        {
            let mut failures = self.receive_failures.write().await;
            if *failures > 0 {
                *failures -= 1;
                return Err(WorkerError::queue(anyhow::anyhow!("queue unavailable")));
            }
        }
        let batch: Vec<QueueMessage> = {
            let mut pending = self.pending.write().await;
            let take = pending.len().min(usize::from(max_messages));
            pending.drain(..take).collect()
        };
        if batch.is_empty() {
            // stand-in for the long poll
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        Ok(batch)
    }

    async fn delete(&self, receipt_handle: &str) -> WorkerResult<()> {
        self.deleted.write().await.push(receipt_handle.to_string());
        Ok(())
    }
}
