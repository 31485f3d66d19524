use crate::api::{DriverStatus, SchedulerCallbacks, SchedulerDriver, TaskDescriptor};
use crate::wire::{self, Call, Event, FrameworkInfo, WireId};
use crate::{DriverError, RecordIoCodec, Result};
use futures::{StreamExt, TryStreamExt};
use kafka_fleet_core::{OfferId, TaskId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tokio_util::io::StreamReader;
use tracing::{debug, info, warn};

/// Connection settings for the master's v1 scheduler endpoint
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Master base URL, e.g. `http://master:5050`
    pub master: String,
    pub framework_name: String,
    pub framework_user: String,
    /// Present when re-subscribing as a previously registered framework
    pub framework_id: Option<String>,
    pub failover_timeout_secs: f64,
    pub resubscribe_delay_ms: u64,
}

enum Outbound {
    Call(Call),
    Stop,
}

/// Driver handle given to the scheduler. Upcalls enqueue and return; a
/// sender task drains the queue toward the master.
struct CallQueue {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl SchedulerDriver for CallQueue {
    fn launch_tasks(&self, offer_ids: &[OfferId], tasks: &[TaskDescriptor]) {
        let call = Call::accept(
            offer_ids.iter().map(|id| WireId::new(id.clone())).collect(),
            tasks.iter().map(wire::task_to_wire).collect(),
        );
        let _ = self.tx.send(Outbound::Call(call));
    }

    fn kill_task(&self, task_id: &TaskId) {
        let _ = self
            .tx
            .send(Outbound::Call(Call::kill(WireId::new(task_id.clone()))));
    }

    fn decline_offer(&self, offer_id: &OfferId) {
        let _ = self
            .tx
            .send(Outbound::Call(Call::decline(vec![WireId::new(
                offer_id.clone(),
            )])));
    }

    fn stop(&self) {
        let _ = self.tx.send(Outbound::Stop);
    }
}

/// Framework driver speaking the master's v1 HTTP scheduler API.
///
/// Subscribes, decodes the RecordIO event stream, dispatches events to the
/// injected callbacks and forwards queued upcalls. Status updates carrying
/// an acknowledgement token are acknowledged automatically. A broken stream
/// triggers `disconnected()` and a re-subscribe after a pause.
pub struct HttpSchedulerDriver {
    config: DriverConfig,
    client: reqwest::Client,
}

impl HttpSchedulerDriver {
    pub fn new(config: DriverConfig) -> Self {
        HttpSchedulerDriver {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/api/v1/scheduler",
            self.config.master.trim_end_matches('/')
        )
    }

    /// Run until `stop()` is called (`Stopped`) or the master reports a
    /// framework error (`Aborted`).
    pub async fn run(&self, callbacks: Arc<dyn SchedulerCallbacks>) -> Result<DriverStatus> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ack_tx = tx.clone();
        let handle: Arc<dyn SchedulerDriver> = Arc::new(CallQueue { tx });

        let mut framework_id = self.config.framework_id.clone();
        let mut ever_subscribed = framework_id.is_some();

        loop {
            // A stop may arrive while disconnected
            while let Ok(outbound) = rx.try_recv() {
                if matches!(outbound, Outbound::Stop) {
                    info!("Driver stopped");
                    return Ok(DriverStatus::Stopped);
                }
            }

            let subscribe = Call::subscribe(FrameworkInfo {
                user: self.config.framework_user.clone(),
                name: self.config.framework_name.clone(),
                id: framework_id.as_ref().map(|id| WireId::new(id.clone())),
                failover_timeout: self.config.failover_timeout_secs,
            });

            let response = match self
                .client
                .post(self.endpoint())
                .header("Accept", "application/json")
                .json(&subscribe)
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    warn!("Master connection failed: {}", e);
                    self.resubscribe_pause().await;
                    continue;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                if !ever_subscribed {
                    return Err(DriverError::SubscriptionRejected {
                        status: status.as_u16(),
                        body,
                    });
                }
                warn!("Re-subscription rejected (HTTP {}): {}", status, body);
                self.resubscribe_pause().await;
                continue;
            }

            let stream_id = response
                .headers()
                .get("Mesos-Stream-Id")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            let body = response
                .bytes_stream()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
            let mut events = FramedRead::new(StreamReader::new(body), RecordIoCodec);

            info!("Connected to master event stream at {}", self.endpoint());

            loop {
                tokio::select! {
                    frame = events.next() => match frame {
                        Some(Ok(bytes)) => {
                            let event: Event = match serde_json::from_slice(&bytes) {
                                Ok(event) => event,
                                Err(e) => {
                                    warn!("Dropping undecodable event: {}", e);
                                    continue;
                                }
                            };
                            if let Some(terminal) = self.dispatch(
                                event,
                                &callbacks,
                                &handle,
                                &ack_tx,
                                &mut framework_id,
                                &mut ever_subscribed,
                            ) {
                                return Ok(terminal);
                            }
                        }
                        Some(Err(e)) => {
                            warn!("Event stream error: {}", e);
                            break;
                        }
                        None => {
                            info!("Master closed the event stream");
                            break;
                        }
                    },
                    outbound = rx.recv() => match outbound {
                        Some(Outbound::Call(call)) => {
                            self.post_call(call, framework_id.as_deref(), stream_id.as_deref())
                                .await;
                        }
                        Some(Outbound::Stop) | None => {
                            info!("Driver stopped");
                            return Ok(DriverStatus::Stopped);
                        }
                    },
                }
            }

            callbacks.disconnected();
            self.resubscribe_pause().await;
        }
    }

    fn dispatch(
        &self,
        event: Event,
        callbacks: &Arc<dyn SchedulerCallbacks>,
        handle: &Arc<dyn SchedulerDriver>,
        ack_tx: &mpsc::UnboundedSender<Outbound>,
        framework_id: &mut Option<String>,
        ever_subscribed: &mut bool,
    ) -> Option<DriverStatus> {
        match event.kind.as_str() {
            "SUBSCRIBED" => {
                if let Some(subscribed) = event.subscribed {
                    let id = subscribed.framework_id.value;
                    if *ever_subscribed && framework_id.as_deref() == Some(id.as_str()) {
                        callbacks.reregistered(handle.clone(), &self.config.master);
                    } else {
                        callbacks.registered(handle.clone(), &id, &self.config.master);
                    }
                    *framework_id = Some(id);
                    *ever_subscribed = true;
                }
            }
            "OFFERS" => {
                if let Some(offers) = event.offers {
                    callbacks
                        .resource_offers(offers.offers.into_iter().map(Into::into).collect());
                }
            }
            "UPDATE" => {
                if let Some(update) = event.update {
                    let status = update.status;
                    if let (Some(uuid), Some(agent_id)) = (&status.uuid, &status.agent_id) {
                        let _ = ack_tx.send(Outbound::Call(Call::acknowledge(
                            agent_id.clone(),
                            status.task_id.clone(),
                            uuid.clone(),
                        )));
                    }
                    match status.to_status() {
                        Some(update) => callbacks.status_update(update),
                        None => warn!(
                            "Unexpected state {} for task {}",
                            status.state, status.task_id.value
                        ),
                    }
                }
            }
            "RESCIND" => {
                if let Some(rescind) = event.rescind {
                    callbacks.offer_rescinded(&rescind.offer_id.value);
                }
            }
            "MESSAGE" => {
                if let Some(message) = event.message {
                    callbacks.framework_message(
                        &message.executor_id.value,
                        &message.agent_id.value,
                        &message.decoded_data(),
                    );
                }
            }
            "FAILURE" => {
                if let Some(failure) = event.failure {
                    match (failure.executor_id, failure.agent_id) {
                        (Some(executor_id), Some(agent_id)) => callbacks.executor_lost(
                            &executor_id.value,
                            &agent_id.value,
                            failure.status.unwrap_or(-1),
                        ),
                        (None, Some(agent_id)) => callbacks.slave_lost(&agent_id.value),
                        _ => debug!("Ignoring FAILURE event without agent id"),
                    }
                }
            }
            "ERROR" => {
                let message = event
                    .error
                    .map(|e| e.message)
                    .unwrap_or_else(|| "unknown framework error".to_string());
                callbacks.error(&message);
                return Some(DriverStatus::Aborted);
            }
            "HEARTBEAT" => debug!("Master heartbeat"),
            other => debug!("Ignoring event type {}", other),
        }
        None
    }

    async fn post_call(
        &self,
        mut call: Call,
        framework_id: Option<&str>,
        stream_id: Option<&str>,
    ) {
        if call.framework_id.is_none() {
            call.framework_id = framework_id.map(WireId::new);
        }

        let mut request = self.client.post(self.endpoint()).json(&call);
        if let Some(id) = stream_id {
            request = request.header("Mesos-Stream-Id", id);
        }

        match request.send().await {
            Ok(response) if !response.status().is_success() => {
                warn!(
                    "Master rejected {} call: HTTP {}",
                    call.kind,
                    response.status()
                );
            }
            Ok(_) => debug!("Delivered {} call", call.kind),
            Err(e) => warn!("Failed to deliver {} call: {}", call.kind, e),
        }
    }

    async fn resubscribe_pause(&self) {
        tokio::time::sleep(Duration::from_millis(self.config.resubscribe_delay_ms)).await;
    }
}
