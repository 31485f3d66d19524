use crate::config::SchedulerConfig;
use crate::metrics::SchedulerMetrics;
use crate::task_builder;
use chrono::{DateTime, Utc};
use kafka_fleet_core::{broker_id_from_task_id, Broker, Offer, StatusUpdate, TaskState};
use kafka_fleet_driver::{SchedulerCallbacks, SchedulerDriver};
use kafka_fleet_persistence::Cluster;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// The reconciliation engine.
///
/// Ingests driver events, converges the cluster toward its declared state by
/// launching, declining and killing, and applies per-broker failover policy.
/// All handlers execute under one mutex; the driver handle's presence is the
/// sole "driver available" signal, and every driver upcall is a non-blocking
/// handoff.
pub struct Scheduler {
    config: Arc<SchedulerConfig>,
    metrics: Arc<SchedulerMetrics>,
    inner: Mutex<SchedulerState>,
}

struct SchedulerState {
    cluster: Cluster,
    driver: Option<Arc<dyn SchedulerDriver>>,
    /// Ids of launched tasks. Kills go by id, so this outlives `Broker.task`;
    /// only a terminal status update removes an entry.
    task_ids: HashSet<String>,
}

impl Scheduler {
    pub fn new(config: Arc<SchedulerConfig>, cluster: Cluster) -> anyhow::Result<Self> {
        let metrics = Arc::new(SchedulerMetrics::new()?);
        Ok(Scheduler {
            config,
            metrics,
            inner: Mutex::new(SchedulerState {
                cluster,
                driver: None,
                task_ids: HashSet::new(),
            }),
        })
    }

    pub fn metrics(&self) -> Arc<SchedulerMetrics> {
        self.metrics.clone()
    }

    /// Cloned broker records for read-only surfaces, never live aliases
    pub fn broker_snapshot(&self) -> Vec<Broker> {
        self.inner.lock().cluster.brokers().to_vec()
    }

    pub fn framework_id(&self) -> Option<String> {
        self.inner
            .lock()
            .cluster
            .framework_id()
            .map(str::to_string)
    }

    /// Forward a stop to the driver, if one is attached
    pub fn stop(&self) {
        let driver = self.inner.lock().driver.clone();
        if let Some(driver) = driver {
            driver.stop();
        }
    }

    fn handle_offers(&self, offers: Vec<Offer>, now: DateTime<Utc>) {
        let mut state = self.inner.lock();
        self.reconcile(&mut state, offers, now);
    }

    fn handle_status(&self, status: StatusUpdate, now: DateTime<Utc>) {
        let mut state = self.inner.lock();
        let broker_id = broker_id_from_task_id(&status.task_id).to_string();

        match status.state {
            TaskState::Running => match state.cluster.get_broker_mut(&broker_id) {
                Some(broker) => {
                    let owns = broker
                        .task
                        .as_ref()
                        .map(|t| t.id == status.task_id)
                        .unwrap_or(false);
                    if owns {
                        if let Some(task) = broker.task.as_mut() {
                            task.running = true;
                        }
                        broker.failover.reset_failures();
                        info!("Broker {} running as task {}", broker_id, status.task_id);
                    } else {
                        warn!(
                            "TASK_RUNNING for task {} which broker {} does not own",
                            status.task_id, broker_id
                        );
                    }
                }
                None => debug!(
                    "TASK_RUNNING for task {} of unknown broker {}",
                    status.task_id, broker_id
                ),
            },
            terminal if terminal.is_terminal() => {
                let tracked = state.task_ids.remove(&status.task_id);

                match state.cluster.get_broker_mut(&broker_id) {
                    Some(broker) => {
                        // Delivery is at-least-once; a re-delivered terminal
                        // for an older task must not touch the current one
                        let owns = broker
                            .task
                            .as_ref()
                            .map(|t| t.id == status.task_id)
                            .unwrap_or(false);
                        if !owns {
                            debug!(
                                "Stale terminal status {} for task {} which broker {} does not own",
                                terminal.as_str(),
                                status.task_id,
                                broker_id
                            );
                        } else if terminal.is_clean_exit() {
                            broker.task = None;
                            info!(
                                "Broker {} task {} exited cleanly ({})",
                                broker_id,
                                status.task_id,
                                terminal.as_str()
                            );
                        } else {
                            broker.task = None;
                            broker.failover.register_failure(now);
                            self.metrics
                                .broker_failures
                                .with_label_values(&[&broker_id])
                                .inc();
                            warn!(
                                "Broker {} task {} failed ({}), failure {} backs off until {:?}",
                                broker_id,
                                status.task_id,
                                terminal.as_str(),
                                broker.failover.failures,
                                broker.failover.delay_expires()
                            );
                            if broker.failover.is_max_tries_exceeded() {
                                broker.active = false;
                                warn!(
                                    "Broker {} exceeded {:?} tries, deactivating",
                                    broker_id, broker.failover.max_tries
                                );
                            }
                        }
                    }
                    None if tracked => warn!(
                        "Terminal status {} for task {} of unknown broker {}",
                        terminal.as_str(),
                        status.task_id,
                        broker_id
                    ),
                    None => debug!(
                        "Terminal status {} for untracked task {}",
                        terminal.as_str(),
                        status.task_id
                    ),
                }
            }
            other => {
                debug!(
                    "Ignoring status {} for task {}",
                    other.as_str(),
                    status.task_id
                );
            }
        }

        self.reconcile(&mut state, Vec::new(), now);
    }

    /// One idempotent convergence pass: persist, then match offers against
    /// brokers in stable cluster order, then kill orphans.
    fn reconcile(&self, state: &mut SchedulerState, offers: Vec<Offer>, now: DateTime<Utc>) {
        if let Err(e) = state.cluster.save() {
            error!("Failed to persist cluster state: {}", e);
        }

        let Some(driver) = state.driver.clone() else {
            if !offers.is_empty() {
                debug!("Driver unavailable, ignoring {} offer(s)", offers.len());
            }
            return;
        };

        let mut launched = false;
        for offer in &offers {
            self.metrics.offers_received.inc();

            // First acceptable broker in insertion order takes the offer;
            // a fresh task handle makes it ineligible for the rest of the
            // pass, so each broker consumes at most one offer.
            let candidate = state
                .cluster
                .brokers()
                .iter()
                .find(|b| b.acceptable(offer, now))
                .map(|b| b.id.clone());

            let Some(broker_id) = candidate else {
                debug!("Declining offer {} from {}", offer.id, offer.hostname);
                self.metrics.offers_declined.inc();
                driver.decline_offer(&offer.id);
                continue;
            };

            let built = state
                .cluster
                .get_broker(&broker_id)
                .map(|broker| task_builder::build_task(&self.config, broker, offer));

            match built {
                Some(Ok((descriptor, task))) => {
                    info!(
                        "Launching task {} for broker {} on {}:{}",
                        task.id, broker_id, task.hostname, task.port
                    );
                    driver.launch_tasks(
                        std::slice::from_ref(&offer.id),
                        std::slice::from_ref(&descriptor),
                    );
                    state.task_ids.insert(task.id.clone());
                    if let Some(broker) = state.cluster.get_broker_mut(&broker_id) {
                        broker.task = Some(task);
                    }
                    self.metrics
                        .tasks_launched
                        .with_label_values(&[&broker_id])
                        .inc();
                    launched = true;
                }
                Some(Err(e)) => {
                    error!("Launch of broker {} on offer {} aborted: {}", broker_id, offer.id, e);
                    self.metrics.offers_declined.inc();
                    driver.decline_offer(&offer.id);
                }
                None => {
                    self.metrics.offers_declined.inc();
                    driver.decline_offer(&offer.id);
                }
            }
        }

        // Kill tasks whose broker is gone or no longer wants to run. The id
        // stays tracked; the terminal status update is the sole remover.
        for task_id in &state.task_ids {
            let wanted = match state.cluster.get_broker(broker_id_from_task_id(task_id)) {
                Some(broker) => broker.active,
                None => false,
            };
            if !wanted {
                info!("Killing orphan task {}", task_id);
                self.metrics.tasks_killed.inc();
                driver.kill_task(task_id);
            }
        }

        if launched {
            if let Err(e) = state.cluster.save() {
                error!("Failed to persist cluster state: {}", e);
            }
        }

        let active = state.cluster.brokers().iter().filter(|b| b.active).count();
        let running = state
            .cluster
            .brokers()
            .iter()
            .filter(|b| b.task.as_ref().map(|t| t.running).unwrap_or(false))
            .count();
        self.metrics.brokers_active.set(active as i64);
        self.metrics.tasks_running.set(running as i64);
    }
}

impl SchedulerCallbacks for Scheduler {
    fn registered(&self, driver: Arc<dyn SchedulerDriver>, framework_id: &str, master: &str) {
        info!(
            "Registered as framework {} with master {}",
            framework_id, master
        );
        let mut state = self.inner.lock();
        state.driver = Some(driver);
        state.cluster.set_framework_id(framework_id);
        self.reconcile(&mut state, Vec::new(), Utc::now());
    }

    fn reregistered(&self, driver: Arc<dyn SchedulerDriver>, master: &str) {
        info!("Re-registered with master {}", master);
        let mut state = self.inner.lock();
        state.driver = Some(driver);
        self.reconcile(&mut state, Vec::new(), Utc::now());
    }

    fn resource_offers(&self, offers: Vec<Offer>) {
        debug!("Received {} offer(s)", offers.len());
        self.handle_offers(offers, Utc::now());
    }

    fn offer_rescinded(&self, offer_id: &str) {
        debug!("Offer {} rescinded", offer_id);
    }

    fn status_update(&self, status: StatusUpdate) {
        debug!("Status {} for task {}", status.state.as_str(), status.task_id);
        self.handle_status(status, Utc::now());
    }

    fn framework_message(&self, executor_id: &str, slave_id: &str, data: &[u8]) {
        debug!(
            "Message from executor {} on slave {} ({} bytes)",
            executor_id,
            slave_id,
            data.len()
        );
    }

    fn disconnected(&self) {
        warn!("Disconnected from master, suppressing driver actions");
        self.inner.lock().driver = None;
    }

    fn slave_lost(&self, slave_id: &str) {
        warn!("Slave {} lost", slave_id);
    }

    fn executor_lost(&self, executor_id: &str, slave_id: &str, status: i32) {
        warn!(
            "Executor {} lost on slave {} (status {})",
            executor_id, slave_id, status
        );
    }

    fn error(&self, message: &str) {
        error!("Framework error: {}", message);
    }
}
