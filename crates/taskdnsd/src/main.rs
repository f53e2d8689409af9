// # taskdnsd - taskdns invocation runner
//
// This binary is a THIN integration layer:
// - All reconciliation logic lives in taskdns-core
// - Configuration is via environment variables only
//
// taskdnsd is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Building the Route 53, EC2 and record store adapters
// 4. Running exactly one invocation and exiting
//
// ## Commands
//
// - `taskdnsd` / `taskdnsd handle`: read one queue event (JSON) from stdin
//   and reconcile it
// - `taskdnsd teardown`: delete the record set and wait until it is gone
//
// ## Configuration
//
// ### Service
// - `CLUSTER_ARN`: Cluster the service runs in
// - `SERVICE_NAME`: Service whose tasks are tracked
//
// ### Record set
// - `HOSTED_ZONE_ID`: Hosted zone of the record set
// - `RECORD_NAME`: Record name
//
// ### State Store (ignored by `teardown`)
// - `TASKDNS_STATE_STORE_TYPE`: Type of record store (dynamodb, file, memory)
// - `RECORDS_TABLE`: Table name (for dynamodb)
// - `TASKDNS_STATE_STORE_PATH`: Path to the record file (for file)
//
// ### Misc
// - `TASKDNS_MODE`: `live` (default) or `dry-run` (DNS changes are only logged)
// - `TASKDNS_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export CLUSTER_ARN=arn:aws:ecs:us-east-1:123456789012:cluster/main
// export SERVICE_NAME=web
// export HOSTED_ZONE_ID=Z0123456789
// export RECORD_NAME=web.example.com
// export RECORDS_TABLE=taskdns-records
//
// taskdnsd < event.json
// ```

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use taskdns_core::traits::RecordStore;
use taskdns_core::{
    FileRecordStore, MemoryRecordStore, RecordSetConfig, ReconcileEngine, ServiceConfig,
    StateStoreConfig, TaskDnsConfig,
};
use taskdns_provider_route53::Route53RecordSetProvider;
use taskdns_resolver_ec2::Ec2AddressResolver;
use tokio::io::AsyncReadExt;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
///
/// - 0: Invocation succeeded
/// - 1: Configuration or startup error
/// - 2: Invocation failed
#[derive(Debug, Clone, Copy)]
enum TaskDnsExitCode {
    Success = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<TaskDnsExitCode> for ExitCode {
    fn from(code: TaskDnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// What this run does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Reconcile one queue event read from stdin
    Handle,
    /// Delete the record set and confirm it is gone
    Teardown,
}

impl Command {
    fn parse(arg: Option<&str>) -> Result<Self> {
        match arg {
            None | Some("handle") => Ok(Command::Handle),
            Some("teardown") => Ok(Command::Teardown),
            Some(other) => anyhow::bail!(
                "Unknown command '{}'. Valid commands: handle, teardown",
                other
            ),
        }
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    cluster_arn: String,
    service_name: String,
    hosted_zone_id: String,
    record_name: String,
    records_table: Option<String>,
    state_store_type: String,
    state_store_path: Option<String>,
    dry_run: bool,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |name: &str| {
            lookup(name)
                .filter(|value| !value.is_empty())
                .with_context(|| format!("{name} is required. Set it via: export {name}=..."))
        };

        Ok(Self {
            cluster_arn: required("CLUSTER_ARN")?,
            service_name: required("SERVICE_NAME")?,
            hosted_zone_id: required("HOSTED_ZONE_ID")?,
            record_name: required("RECORD_NAME")?,
            records_table: lookup("RECORDS_TABLE"),
            state_store_type: lookup("TASKDNS_STATE_STORE_TYPE")
                .unwrap_or_else(|| "dynamodb".to_string()),
            state_store_path: lookup("TASKDNS_STATE_STORE_PATH"),
            dry_run: lookup("TASKDNS_MODE").is_some_and(|mode| mode == "dry-run"),
            log_level: lookup("TASKDNS_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration for `command`
    fn validate(&self, command: Command) -> Result<()> {
        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "TASKDNS_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        self.to_core(command)?.validate()?;

        Ok(())
    }

    fn state_store(&self, command: Command) -> Result<StateStoreConfig> {
        // Teardown never touches the record, only the record set
        if command == Command::Teardown {
            return Ok(StateStoreConfig::Memory);
        }

        match self.state_store_type.as_str() {
            "dynamodb" => {
                let table_name = self.records_table.clone().context(
                    "RECORDS_TABLE is required when TASKDNS_STATE_STORE_TYPE=dynamodb",
                )?;
                Ok(StateStoreConfig::DynamoDb { table_name })
            }
            "file" => {
                let path = self.state_store_path.clone().context(
                    "TASKDNS_STATE_STORE_PATH is required when TASKDNS_STATE_STORE_TYPE=file",
                )?;
                Ok(StateStoreConfig::File { path })
            }
            "memory" => Ok(StateStoreConfig::Memory),
            other => anyhow::bail!(
                "TASKDNS_STATE_STORE_TYPE '{}' is not supported. \
                Supported types: dynamodb, file, memory",
                other
            ),
        }
    }

    /// Build the core configuration for `command`
    fn to_core(&self, command: Command) -> Result<TaskDnsConfig> {
        let mut config = TaskDnsConfig::new(
            ServiceConfig::new(&self.cluster_arn, &self.service_name),
            RecordSetConfig::new(&self.hosted_zone_id, &self.record_name),
        );
        config.state_store = self.state_store(command)?;
        Ok(config)
    }

    fn log_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

fn main() -> ExitCode {
    let command = match Command::parse(env::args().nth(1).as_deref()) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}", e);
            return TaskDnsExitCode::ConfigError.into();
        }
    };

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return TaskDnsExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate(command) {
        eprintln!("Configuration validation error: {:#}", e);
        return TaskDnsExitCode::ConfigError.into();
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level())
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return TaskDnsExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return TaskDnsExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run(command, config).await {
            error!("Invocation failed: {:#}", e);
            TaskDnsExitCode::RuntimeError
        } else {
            TaskDnsExitCode::Success
        }
    });

    result.into()
}

async fn build_store(config: &StateStoreConfig) -> Result<Arc<dyn RecordStore>> {
    let store: Arc<dyn RecordStore> = match config {
        #[cfg(feature = "dynamodb")]
        StateStoreConfig::DynamoDb { table_name } => Arc::new(
            taskdns_store_dynamodb::DynamoDbRecordStore::from_env(table_name.as_str()).await,
        ),
        #[cfg(not(feature = "dynamodb"))]
        StateStoreConfig::DynamoDb { .. } => {
            anyhow::bail!("taskdnsd was built without the dynamodb feature")
        }
        StateStoreConfig::File { path } => Arc::new(FileRecordStore::new(path).await?),
        StateStoreConfig::Memory => {
            warn!("Using the in-memory record store; records will not survive this run");
            Arc::new(MemoryRecordStore::new())
        }
    };
    Ok(store)
}

/// Run one invocation
async fn run(command: Command, config: Config) -> Result<()> {
    let core = config.to_core(command)?;

    info!(
        command = ?command,
        store = core.state_store.type_name(),
        dry_run = config.dry_run,
        "Starting taskdnsd"
    );

    let store = build_store(&core.state_store).await?;
    let provider = Arc::new(Route53RecordSetProvider::from_env(config.dry_run).await);
    let resolver = Arc::new(Ec2AddressResolver::from_env().await);

    let engine = ReconcileEngine::new(&core, store, provider, resolver)?;

    match command {
        Command::Handle => {
            let mut event = String::new();
            tokio::io::stdin()
                .read_to_string(&mut event)
                .await
                .context("Failed to read the queue event from stdin")?;

            let report = engine.handle_queue_event(&event).await?;
            info!(
                version = report.version,
                addresses = report.addresses.len(),
                dns = ?report.dns,
                stale_failed = report.stale_cleanup.failed.len(),
                "Record set reconciled"
            );
        }
        Command::Teardown => {
            let outcome = engine.teardown().await?;
            info!(outcome = ?outcome, "Teardown finished");
        }
    }

    Ok(())
}
