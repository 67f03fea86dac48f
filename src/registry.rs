//! Domain registry: the system of record for which domains are active.
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Connection, SqliteConnection};
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::db::{self, domain_repo};
use crate::error::{WorkerError, WorkerResult};
use crate::event::Activation;

pub use domain_repo::DomainRecord;

#[async_trait]
pub trait DomainRegistry: Send + Sync {
    /// Create or re-activate the row, stamping today's activation date.
    async fn upsert_active(
        &self,
        domain: &str,
        tenant_id: &str,
        zone_hint: Option<i64>,
    ) -> WorkerResult<()>;

    /// Set the row inactive, stamping today's deactivation date.
    async fn mark_inactive(&self, domain: &str) -> WorkerResult<()>;

    async fn list_active(&self) -> WorkerResult<Vec<String>>;

    async fn list_inactive(&self) -> WorkerResult<Vec<String>>;

    async fn delete_domain(&self, domain: &str) -> WorkerResult<()>;
}

/// SQLite-backed registry holding one long-lived connection. The connection
/// is pinged before each call and re-opened if the ping fails.
///
/// Reconnecting to `sqlite::memory:` yields a fresh, empty database; use a
/// file URL anywhere a reconnect matters.
pub struct SqliteDomainRegistry {
    url: String,
    conn: Mutex<Option<SqliteConnection>>,
}

impl SqliteDomainRegistry {
    pub async fn connect(url: impl Into<String>) -> anyhow::Result<Self> {
        let url = url.into();
        let mut conn = db::connect(&url).await?;
        db::migrate(&mut conn).await?;
        Ok(Self {
            url,
            conn: Mutex::new(Some(conn)),
        })
    }

    async fn live_connection(&self) -> WorkerResult<MappedMutexGuard<'_, SqliteConnection>> {
        let mut guard = self.conn.lock().await;

        let alive = match guard.as_mut() {
            Some(conn) => conn.ping().await.is_ok(),
            None => false,
        };
        if !alive {
            if guard.take().is_some() {
                warn!("registry connection lost, reconnecting");
            }
            let conn = db::connect(&self.url)
                .await
                .map_err(|e| WorkerError::ConnectionLost(e.to_string()))?;
            *guard = Some(conn);
            info!("registry connection restored");
        }

        MutexGuard::try_map(guard, Option::as_mut)
            .map_err(|_| WorkerError::ConnectionLost("registry connection unavailable".into()))
    }

    /// Fetch the full row for a domain.
    pub async fn find(&self, domain: &str) -> WorkerResult<Option<DomainRecord>> {
        let mut conn = self.live_connection().await?;
        Ok(domain_repo::find_by_url(&mut conn, domain).await?)
    }
}

#[async_trait]
impl DomainRegistry for SqliteDomainRegistry {
    async fn upsert_active(
        &self,
        domain: &str,
        tenant_id: &str,
        zone_hint: Option<i64>,
    ) -> WorkerResult<()> {
        let mut conn = self.live_connection().await?;
        let today = Utc::now().date_naive();
        domain_repo::upsert_active(&mut conn, domain, tenant_id, zone_hint, today).await?;
        Ok(())
    }

    async fn mark_inactive(&self, domain: &str) -> WorkerResult<()> {
        let mut conn = self.live_connection().await?;
        let today = Utc::now().date_naive();
        let touched = domain_repo::mark_inactive(&mut conn, domain, today).await?;
        if touched == 0 {
            debug!(%domain, "deactivated domain has no registry row");
        }
        Ok(())
    }

    async fn list_active(&self) -> WorkerResult<Vec<String>> {
        let mut conn = self.live_connection().await?;
        Ok(domain_repo::list_by_status(&mut conn, Activation::Activate).await?)
    }

    async fn list_inactive(&self) -> WorkerResult<Vec<String>> {
        let mut conn = self.live_connection().await?;
        Ok(domain_repo::list_by_status(&mut conn, Activation::Deactivate).await?)
    }

    async fn delete_domain(&self, domain: &str) -> WorkerResult<()> {
        let mut conn = self.live_connection().await?;
        domain_repo::delete(&mut conn, domain).await?;
        Ok(())
    }
}
