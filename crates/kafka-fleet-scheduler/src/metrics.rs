use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

/// Prometheus metrics for the scheduler
pub struct SchedulerMetrics {
    pub registry: Registry,

    pub offers_received: IntCounter,
    pub offers_declined: IntCounter,
    pub tasks_launched: IntCounterVec,
    pub tasks_killed: IntCounter,
    pub broker_failures: IntCounterVec,

    pub brokers_active: IntGauge,
    pub tasks_running: IntGauge,
}

impl SchedulerMetrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let offers_received =
            IntCounter::new("kf_offers_received", "Total resource offers received")?;
        registry.register(Box::new(offers_received.clone()))?;

        let offers_declined =
            IntCounter::new("kf_offers_declined", "Total resource offers declined")?;
        registry.register(Box::new(offers_declined.clone()))?;

        let tasks_launched = IntCounterVec::new(
            Opts::new("kf_tasks_launched", "Broker tasks launched, by broker"),
            &["broker"],
        )?;
        registry.register(Box::new(tasks_launched.clone()))?;

        let tasks_killed = IntCounter::new("kf_tasks_killed", "Kill requests issued")?;
        registry.register(Box::new(tasks_killed.clone()))?;

        let broker_failures = IntCounterVec::new(
            Opts::new("kf_broker_failures", "Broker task failures, by broker"),
            &["broker"],
        )?;
        registry.register(Box::new(broker_failures.clone()))?;

        let brokers_active = IntGauge::new("kf_brokers_active", "Brokers declared active")?;
        registry.register(Box::new(brokers_active.clone()))?;

        let tasks_running = IntGauge::new("kf_tasks_running", "Broker tasks in running state")?;
        registry.register(Box::new(tasks_running.clone()))?;

        Ok(SchedulerMetrics {
            registry,
            offers_received,
            offers_declined,
            tasks_launched,
            tasks_killed,
            broker_failures,
            brokers_active,
            tasks_running,
        })
    }
}
