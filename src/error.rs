// src/error.rs
use thiserror::Error;

/// Coarse classification the orchestrator matches on to decide whether a
/// failure is isolated to one domain or ends part of the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input that will never become valid; discard it.
    Malformed,
    /// A single registry write or DNS call failed; skip that domain.
    PerDomain,
    /// The registry connection is gone and could not be re-established.
    ConnectionLost,
    /// Queue, deployment trigger or teardown failure.
    Downstream,
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("registry error: {0}")]
    Registry(#[from] sqlx::Error),

    #[error("registry connection lost: {0}")]
    ConnectionLost(String),

    #[error("dns provider error: {0}")]
    Dns(#[source] anyhow::Error),

    #[error("deployment trigger failed: {0}")]
    Deploy(#[source] anyhow::Error),

    #[error("queue error: {0}")]
    Queue(#[source] anyhow::Error),

    #[error("resource teardown failed for {domain}: {reason}")]
    Teardown { domain: String, reason: String },

    #[error("no pending event recorded for {0}")]
    MissingDomainInfo(String),
}

pub type WorkerResult<T> = Result<T, WorkerError>;

impl WorkerError {
    pub fn dns(err: impl Into<anyhow::Error>) -> Self {
        WorkerError::Dns(err.into())
    }

    pub fn deploy(err: impl Into<anyhow::Error>) -> Self {
        WorkerError::Deploy(err.into())
    }

    pub fn queue(err: impl Into<anyhow::Error>) -> Self {
        WorkerError::Queue(err.into())
    }

    pub fn teardown(domain: impl Into<String>, reason: impl Into<String>) -> Self {
        WorkerError::Teardown {
            domain: domain.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkerError::Malformed(_) => ErrorKind::Malformed,
            WorkerError::Registry(_)
            | WorkerError::Dns(_)
            | WorkerError::MissingDomainInfo(_) => ErrorKind::PerDomain,
            WorkerError::ConnectionLost(_) => ErrorKind::ConnectionLost,
            WorkerError::Deploy(_)
            | WorkerError::Queue(_)
            | WorkerError::Teardown { .. } => ErrorKind::Downstream,
        }
    }
}
