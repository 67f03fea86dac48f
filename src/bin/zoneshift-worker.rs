use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use zoneshift::{
    Collaborators, Orchestrator, WorkerConfig,
    deploy::GitHubDispatchTrigger,
    dns::PowerDnsZoneManager,
    gc::CommandTeardown,
    powerdns::client::PowerDnsClient,
    queue::{ContainerCredentials, CredentialSource, SqsClient, sigv4::AwsCredentials},
    registry::SqliteDomainRegistry,
};

#[derive(Parser, Debug)]
#[command(author, version, about, rename_all = "kebab-case")]
struct Cli {
    /// SQS queue URL carrying domain change events
    #[arg(long, env = "SQS_DNS_OPERATIONS_QUEUE_URL", value_name = "URL")]
    queue_url: String,
    /// AWS region of the queue
    #[arg(long, env = "AWS_DEFAULT_REGION", default_value = "us-east-1")]
    region: String,
    /// Override the SQS endpoint (local emulators)
    #[arg(long, env = "SQS_ENDPOINT", value_name = "URL")]
    sqs_endpoint: Option<String>,
    /// Static keys; when absent the task role is read from the container
    /// credentials endpoint
    #[arg(long, env = "AWS_ACCESS_KEY_ID", hide_env_values = true, requires = "aws_secret_access_key")]
    aws_access_key_id: Option<String>,
    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    aws_secret_access_key: Option<String>,
    #[arg(long, env = "AWS_SESSION_TOKEN", hide_env_values = true)]
    aws_session_token: Option<String>,
    #[arg(long, env = "AWS_CONTAINER_CREDENTIALS_RELATIVE_URI", value_name = "PATH")]
    container_credentials_relative_uri: Option<String>,
    #[arg(long, env = "AWS_CONTAINER_CREDENTIALS_FULL_URI", value_name = "URL")]
    container_credentials_full_uri: Option<String>,
    #[arg(long, env = "AWS_CONTAINER_AUTHORIZATION_TOKEN", hide_env_values = true)]
    container_authorization_token: Option<String>,

    /// Seconds to accumulate changes before flushing a batch
    #[arg(long, env = "BATCH_TIMEOUT_SECONDS", default_value_t = 30)]
    batch_timeout_seconds: u64,
    /// Messages per receive call (1-10)
    #[arg(long, env = "SQS_MAX_MESSAGES", default_value_t = 10)]
    max_messages: u8,
    /// Long-poll wait per receive call (0-20)
    #[arg(long, env = "SQS_WAIT_TIME_SECONDS", default_value_t = 20)]
    wait_time_seconds: u8,
    /// Seconds between statistics log lines
    #[arg(long, env = "STATS_INTERVAL_SECONDS", default_value_t = 300)]
    stats_interval_seconds: u64,

    /// SQLite database URL for the domain registry
    #[arg(long, env = "DATABASE_URL", value_name = "URL", default_value = "sqlite://data/domains.db")]
    database_url: String,

    /// PowerDNS API URL (e.g. http://127.0.0.1:8081/api/v1)
    #[arg(long, env = "PDNS_API_URL", value_name = "URL")]
    pdns_url: String,
    #[arg(long, env = "PDNS_API_KEY", hide_env_values = true)]
    pdns_key: String,
    #[arg(long, env = "PDNS_SERVER_ID", value_name = "ID", default_value = "localhost")]
    pdns_server_id: String,
    /// Nameservers for newly created zones
    #[arg(
        long = "nameserver",
        env = "ZONE_NAMESERVERS",
        value_name = "FQDN",
        value_delimiter = ',',
        required = true
    )]
    nameservers: Vec<String>,

    /// GitHub token used for repository_dispatch
    #[arg(long, env = "GH_TOKEN", hide_env_values = true)]
    github_token: String,
    /// Repository receiving the dispatch ("owner/name")
    #[arg(long, env = "REPO", value_name = "OWNER/NAME")]
    repo: String,
    #[arg(long, env = "ENVIRONMENT", default_value = "dev")]
    environment: String,
    #[arg(long, env = "GITHUB_API_URL", value_name = "URL")]
    github_api_url: Option<String>,

    /// Teardown program run for each drained domain
    #[arg(long, env = "GC_TEARDOWN_PROGRAM", default_value = "cdk")]
    teardown_program: String,
    /// Teardown arguments; `{stack}` and `{domain}` are substituted
    #[arg(long, env = "GC_TEARDOWN_ARGS", value_delimiter = ',')]
    teardown_args: Vec<String>,
    #[arg(long, env = "GC_TEARDOWN_WORKDIR", value_name = "PATH")]
    teardown_workdir: Option<PathBuf>,
    #[arg(long, env = "GC_TEARDOWN_TIMEOUT_SECONDS", default_value_t = 300)]
    teardown_timeout_seconds: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = WorkerConfig::new(
        Duration::from_secs(cli.batch_timeout_seconds),
        cli.max_messages,
        cli.wait_time_seconds,
    )
    .with_stats_interval(Duration::from_secs(cli.stats_interval_seconds));

    let queue = build_queue(&cli)?;
    let collaborators = build_collaborators(&cli).await?;

    info!(
        queue = %cli.queue_url,
        environment = %cli.environment,
        repo = %cli.repo,
        "starting domain batch worker"
    );

    let mut orchestrator = Orchestrator::new(config, collaborators);
    orchestrator.run(&queue, shutdown_signal()).await;

    Ok(())
}

/// Static keys win; otherwise fall back to the ECS/Fargate task role.
fn credential_source(cli: &Cli) -> Result<CredentialSource> {
    if let (Some(access_key_id), Some(secret_access_key)) =
        (&cli.aws_access_key_id, &cli.aws_secret_access_key)
    {
        return Ok(CredentialSource::fixed(AwsCredentials {
            access_key_id: access_key_id.clone(),
            secret_access_key: secret_access_key.clone(),
            session_token: cli.aws_session_token.clone(),
        }));
    }

    let provider = match (
        &cli.container_credentials_relative_uri,
        &cli.container_credentials_full_uri,
    ) {
        (Some(uri), _) => ContainerCredentials::from_relative_uri(uri),
        (None, Some(url)) => ContainerCredentials::new(url),
        (None, None) => bail!(
            "no AWS credentials: set AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY or run with a container credentials endpoint"
        ),
    };
    info!("using container credentials endpoint");
    Ok(CredentialSource::container(
        match &cli.container_authorization_token {
            Some(token) => provider.with_auth_token(token),
            None => provider,
        },
    ))
}

fn build_queue(cli: &Cli) -> Result<SqsClient> {
    let credentials = credential_source(cli)?;
    let queue = SqsClient::new(&cli.queue_url, &cli.region, credentials)
        .context("failed to build SQS client")?;
    match &cli.sqs_endpoint {
        Some(endpoint) => queue
            .with_endpoint(endpoint)
            .with_context(|| format!("invalid sqs-endpoint '{endpoint}'")),
        None => Ok(queue),
    }
}

async fn build_collaborators(cli: &Cli) -> Result<Collaborators> {
    if let Some(parent) = sqlite_file_path(&cli.database_url)
        .as_ref()
        .and_then(|p| p.parent())
        .filter(|p| !p.as_os_str().is_empty())
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create db directory {}", parent.display()))?;
    }
    let registry = SqliteDomainRegistry::connect(&cli.database_url)
        .await
        .with_context(|| format!("failed to open registry at {}", cli.database_url))?;

    let nameservers = cli
        .nameservers
        .iter()
        .map(|ns| normalize_fqdn(ns).with_context(|| format!("invalid nameserver value '{ns}'")))
        .collect::<Result<Vec<_>>>()?;
    let pdns = PowerDnsClient::new(&cli.pdns_url, &cli.pdns_key, &cli.pdns_server_id);

    let mut deploy = GitHubDispatchTrigger::new(&cli.repo, &cli.github_token, &cli.environment);
    if let Some(api) = &cli.github_api_url {
        deploy = deploy.with_api_base(api);
    }

    let mut teardown = if cli.teardown_args.is_empty() && cli.teardown_program == "cdk" {
        CommandTeardown::cdk_destroy()
    } else {
        CommandTeardown::new(&cli.teardown_program, cli.teardown_args.clone())
    }
    .with_timeout(Duration::from_secs(cli.teardown_timeout_seconds));
    if let Some(dir) = &cli.teardown_workdir {
        teardown = teardown.with_working_dir(dir);
    }

    Ok(Collaborators {
        registry: Arc::new(registry),
        dns: Arc::new(PowerDnsZoneManager::new(pdns, nameservers)),
        deploy: Arc::new(deploy),
        teardown: Arc::new(teardown),
    })
}

/// Filesystem path behind a `sqlite:` URL, if it names one.
fn sqlite_file_path(url: &str) -> Option<PathBuf> {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = path.split('?').next().unwrap_or_default();
    if path.is_empty() || path == ":memory:" {
        return None;
    }
    Some(PathBuf::from(path))
}

fn normalize_fqdn(input: &str) -> Result<String> {
    let trimmed = input.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        bail!("FQDN cannot be empty");
    }
    Ok(format!("{}.", trimmed.to_ascii_lowercase()))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("failed to install CTRL+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,sqlx=warn".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}
