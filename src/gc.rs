//! Second phase of domain teardown: remove leftover per-domain resources for
//! draining (inactive) domains, then drop their registry rows.
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::error::{WorkerError, WorkerResult};
use crate::registry::DomainRegistry;

pub const DEFAULT_TEARDOWN_TIMEOUT: Duration = Duration::from_secs(300);

#[async_trait]
pub trait ResourceTeardown: Send + Sync {
    /// Remove every domain-scoped resource. An error means something is
    /// still in place (or still referenced) and the domain must be retried.
    async fn teardown(&self, domain: &str) -> WorkerResult<()>;
}

/// Per-domain certificate stack name, e.g. `CertificateStack-shop-example-com`.
pub fn certificate_stack_name(domain: &str) -> String {
    format!("CertificateStack-{}", domain.replace('.', "-"))
}

/// Tears resources down by running an external provisioning command.
/// `{stack}` and `{domain}` in the arguments are substituted per domain.
#[derive(Debug, Clone)]
pub struct CommandTeardown {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    timeout: Duration,
}

impl CommandTeardown {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: None,
            timeout: DEFAULT_TEARDOWN_TIMEOUT,
        }
    }

    /// `cdk destroy CertificateStack-<domain> --force --app "python app.py"`
    pub fn cdk_destroy() -> Self {
        Self::new(
            "cdk",
            ["destroy", "{stack}", "--force", "--app", "python app.py"]
                .into_iter()
                .map(String::from)
                .collect(),
        )
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn render_args(&self, domain: &str) -> Vec<String> {
        let stack = certificate_stack_name(domain);
        self.args
            .iter()
            .map(|arg| arg.replace("{stack}", &stack).replace("{domain}", domain))
            .collect()
    }
}

#[async_trait]
impl ResourceTeardown for CommandTeardown {
    async fn teardown(&self, domain: &str) -> WorkerResult<()> {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.render_args(domain)).kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                WorkerError::teardown(domain, format!("timed out after {:?}", self.timeout))
            })?
            .map_err(|e| WorkerError::teardown(domain, format!("failed to spawn: {e}")))?;

        if !output.status.success() {
            debug!(%domain, stderr = %String::from_utf8_lossy(&output.stderr), "teardown output");
            return Err(WorkerError::teardown(
                domain,
                format!("{} exited with {}", self.program, output.status),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GcReport {
    pub examined: usize,
    pub collected: usize,
    pub retained: usize,
}

pub struct GarbageCollector {
    teardown: Arc<dyn ResourceTeardown>,
}

impl GarbageCollector {
    pub fn new(teardown: Arc<dyn ResourceTeardown>) -> Self {
        Self { teardown }
    }

    /// One GC pass. Only a failure to list draining domains is returned;
    /// per-domain failures leave the row in place for the next pass.
    pub async fn collect(&self, registry: &dyn DomainRegistry) -> WorkerResult<GcReport> {
        let draining = registry.list_inactive().await?;
        if draining.is_empty() {
            info!("no draining domains, skipping garbage collection");
            return Ok(GcReport::default());
        }

        info!(count = draining.len(), "garbage collecting draining domains");
        let mut report = GcReport {
            examined: draining.len(),
            ..GcReport::default()
        };

        for domain in &draining {
            if let Err(err) = self.teardown.teardown(domain).await {
                warn!(%domain, error = %err, "teardown incomplete, will retry next pass");
                report.retained += 1;
                continue;
            }
            match registry.delete_domain(domain).await {
                Ok(()) => {
                    info!(%domain, "removed drained domain from registry");
                    report.collected += 1;
                }
                Err(err) => {
                    error!(%domain, error = %err, "resources removed but registry delete failed");
                    report.retained += 1;
                }
            }
        }

        if report.collected > 0 {
            info!(collected = report.collected, "garbage collection finished");
        }
        Ok(report)
    }
}
