use clap::Parser;
use kafka_fleet_driver::{DriverConfig, DriverStatus, HttpSchedulerDriver};
use kafka_fleet_persistence::{Cluster, SnapshotStore};
use kafka_fleet_scheduler::{api, Scheduler, SchedulerConfig};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "kf-scheduler")]
#[command(about = "Kafka fleet scheduler", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Master URL override
    #[arg(long)]
    master: Option<String>,

    /// API port override
    #[arg(long)]
    api_port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let mut config = if std::path::Path::new(&args.config).exists() {
        SchedulerConfig::from_file(&args.config)?
    } else {
        tracing::warn!("Config file not found, using defaults");
        SchedulerConfig::default()
    };

    // Override with CLI args
    if let Some(master) = args.master {
        config.scheduler.master = master;
    }
    if let Some(api_port) = args.api_port {
        config.api.port = api_port;
    }

    // Recover the cluster; stale task handles are dropped and repopulated
    // by status updates and fresh offers
    let store = SnapshotStore::new(&config.storage.state_file);
    let mut cluster = Cluster::new(store);
    cluster.load(true)?;

    // Seed declared brokers the snapshot does not know yet
    for decl in &config.brokers {
        if cluster.get_broker(&decl.id).is_none() {
            tracing::info!("Adding declared broker {}", decl.id);
            cluster.add_broker(decl.to_broker()?)?;
        }
    }
    cluster.save()?;
    let framework_id = cluster.framework_id().map(str::to_string);

    let config = Arc::new(config);
    let scheduler = Arc::new(Scheduler::new(config.clone(), cluster)?);

    // Start the artifact/status server
    let api_scheduler = scheduler.clone();
    let api_config = config.clone();
    let api_handle = tokio::spawn(async move {
        if let Err(e) = serve_api(api_scheduler, api_config).await {
            tracing::error!("API server error: {}", e);
        }
    });

    // SIGINT stops the driver; the reconciler leaves in-flight tasks running
    let signal_scheduler = scheduler.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping driver");
            signal_scheduler.stop();
        }
    });

    let driver = HttpSchedulerDriver::new(DriverConfig {
        master: config.scheduler.master.clone(),
        framework_name: config.scheduler.framework_name.clone(),
        framework_user: config.scheduler.framework_user.clone(),
        framework_id,
        failover_timeout_secs: config.scheduler.failover_timeout_secs,
        resubscribe_delay_ms: config.scheduler.resubscribe_delay_ms,
    });

    tracing::info!(
        "Starting driver against master {}",
        config.scheduler.master
    );
    let status = driver.run(scheduler.clone()).await?;

    // Driver first, artifact server second
    api_handle.abort();

    Ok(match status {
        DriverStatus::Stopped => ExitCode::SUCCESS,
        DriverStatus::Aborted => ExitCode::from(1),
    })
}

async fn serve_api(scheduler: Arc<Scheduler>, config: Arc<SchedulerConfig>) -> anyhow::Result<()> {
    let app = api::create_api(scheduler, &config.api.artifact_dir);
    let addr = format!("{}:{}", config.api.host, config.api.port);

    tracing::info!("Artifact and status server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
