//! DNS zone lifecycle for storefront domains.
use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::zone_name;
use crate::error::{WorkerError, WorkerResult};
use crate::powerdns::client::PowerDnsClient;
use crate::powerdns::types::{PdnsRrset, PdnsZoneCreate};

/// Record types removed when a domain is deactivated. NS and SOA stay so the
/// zone itself remains valid.
pub const REMOVABLE_RECORD_TYPES: [&str; 4] = ["A", "MX", "TXT", "CNAME"];

/// Result of [`DnsZoneManager::ensure_zone`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneProvision {
    Created(String),
    AlreadyExists,
}

#[async_trait]
pub trait DnsZoneManager: Send + Sync {
    /// Whether a zone with exactly this name exists.
    async fn zone_exists(&self, domain: &str) -> WorkerResult<bool>;

    /// Create the zone and return the provider's zone id.
    async fn create_zone(&self, domain: &str) -> WorkerResult<String>;

    /// Delete A, MX, TXT and CNAME record sets, keeping the zone. Returns the
    /// number of record sets removed; a missing zone counts as zero.
    async fn delete_non_essential_records(&self, domain: &str) -> WorkerResult<usize>;

    async fn ensure_zone(&self, domain: &str) -> WorkerResult<ZoneProvision> {
        if self.zone_exists(domain).await? {
            return Ok(ZoneProvision::AlreadyExists);
        }
        let zone_id = self.create_zone(domain).await?;
        Ok(ZoneProvision::Created(zone_id))
    }
}

/// Zone manager talking to the PowerDNS HTTP API.
#[derive(Clone)]
pub struct PowerDnsZoneManager {
    client: PowerDnsClient,
    nameservers: Vec<String>, // "ns1.example.net.", ...
}

impl PowerDnsZoneManager {
    pub fn new(client: PowerDnsClient, nameservers: Vec<String>) -> Self {
        Self {
            client,
            nameservers,
        }
    }
}

#[async_trait]
impl DnsZoneManager for PowerDnsZoneManager {
    async fn zone_exists(&self, domain: &str) -> WorkerResult<bool> {
        let name = zone_name(domain);
        let zone = self.client.find_zone(&name).await.map_err(WorkerError::dns)?;
        Ok(zone.is_some_and(|z| z.name.eq_ignore_ascii_case(&name)))
    }

    async fn create_zone(&self, domain: &str) -> WorkerResult<String> {
        let z = PdnsZoneCreate {
            name: zone_name(domain),
            kind: "Native".into(),
            nameservers: self.nameservers.clone(),
        };
        let zone = self.client.create_zone(&z).await.map_err(WorkerError::dns)?;
        info!(%domain, zone_id = %zone.id, "created zone");
        Ok(zone.id)
    }

    async fn delete_non_essential_records(&self, domain: &str) -> WorkerResult<usize> {
        let name = zone_name(domain);
        let Some(zone) = self.client.find_zone(&name).await.map_err(WorkerError::dns)? else {
            warn!(%domain, "no zone found, nothing to delete");
            return Ok(0);
        };

        let deletions: Vec<PdnsRrset> = zone
            .rrsets
            .unwrap_or_default()
            .into_iter()
            .filter(|rr| REMOVABLE_RECORD_TYPES.contains(&rr.rrtype.as_str()))
            .map(|rr| {
                info!(%domain, record = %rr.name, rrtype = %rr.rrtype, "scheduling record deletion");
                PdnsRrset::deletion(rr.name, rr.rrtype)
            })
            .collect();

        if deletions.is_empty() {
            return Ok(0);
        }

        self.client
            .patch_rrsets(&name, &deletions)
            .await
            .map_err(WorkerError::dns)?;
        info!(%domain, removed = deletions.len(), "deleted records, zone retained");
        Ok(deletions.len())
    }
}
