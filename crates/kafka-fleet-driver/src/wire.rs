//! Serde types for the subset of the master's v1 scheduler API the driver
//! speaks, plus conversions to and from the domain model.

use crate::TaskDescriptor;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use kafka_fleet_core::{Offer, PortRange, Resource, StatusUpdate, TaskState};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireId {
    pub value: String,
}

impl WireId {
    pub fn new(value: impl Into<String>) -> Self {
        WireId {
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireScalar {
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireRange {
    pub begin: u64,
    pub end: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireRanges {
    #[serde(default)]
    pub range: Vec<WireRange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireResource {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scalar: Option<WireScalar>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ranges: Option<WireRanges>,
}

pub fn resource_to_wire(resource: &Resource) -> WireResource {
    match resource {
        Resource::Scalar { name, value } => WireResource {
            name: name.clone(),
            kind: "SCALAR".to_string(),
            scalar: Some(WireScalar { value: *value }),
            ranges: None,
        },
        Resource::Ranges { name, ranges } => WireResource {
            name: name.clone(),
            kind: "RANGES".to_string(),
            scalar: None,
            ranges: Some(WireRanges {
                range: ranges
                    .iter()
                    .map(|r| WireRange {
                        begin: r.begin,
                        end: r.end,
                    })
                    .collect(),
            }),
        },
    }
}

/// Unknown resource kinds are dropped; matching is best-effort
pub fn resource_from_wire(resource: WireResource) -> Option<Resource> {
    match resource.kind.as_str() {
        "SCALAR" => Some(Resource::Scalar {
            name: resource.name,
            value: resource.scalar?.value,
        }),
        "RANGES" => Some(Resource::Ranges {
            name: resource.name,
            ranges: resource
                .ranges?
                .range
                .into_iter()
                .map(|r| PortRange::new(r.begin, r.end))
                .collect(),
        }),
        _ => None,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireOffer {
    pub id: WireId,
    pub agent_id: WireId,
    pub hostname: String,
    #[serde(default)]
    pub resources: Vec<WireResource>,
}

impl From<WireOffer> for Offer {
    fn from(wire: WireOffer) -> Self {
        Offer {
            id: wire.id.value,
            slave_id: wire.agent_id.value,
            hostname: wire.hostname,
            resources: wire
                .resources
                .into_iter()
                .filter_map(resource_from_wire)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireTaskStatus {
    pub task_id: WireId,
    pub state: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub agent_id: Option<WireId>,
}

impl WireTaskStatus {
    /// `None` for states outside the known set; the caller logs and ignores
    pub fn to_status(&self) -> Option<StatusUpdate> {
        let state = TaskState::from_str(&self.state)?;
        Some(StatusUpdate {
            task_id: self.task_id.value.clone(),
            state,
            message: self.message.clone(),
            uuid: self.uuid.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Calls (scheduler -> master)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct FrameworkInfo {
    pub user: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<WireId>,
    pub failover_timeout: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Subscribe {
    pub framework_info: FrameworkInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct WireUri {
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WireCommandInfo {
    pub value: String,
    pub uris: Vec<WireUri>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WireExecutorInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub executor_id: WireId,
    pub name: String,
    pub command: WireCommandInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct WireTaskInfo {
    pub name: String,
    pub task_id: WireId,
    pub agent_id: WireId,
    pub executor: WireExecutorInfo,
    pub resources: Vec<WireResource>,
    /// Base64 per the JSON rendering of wire bytes
    pub data: String,
}

pub fn task_to_wire(task: &TaskDescriptor) -> WireTaskInfo {
    WireTaskInfo {
        name: task.name.clone(),
        task_id: WireId::new(task.id.clone()),
        agent_id: WireId::new(task.slave_id.clone()),
        executor: WireExecutorInfo {
            kind: "CUSTOM".to_string(),
            executor_id: WireId::new(task.executor.id.clone()),
            name: task.executor.name.clone(),
            command: WireCommandInfo {
                value: task.executor.command.value.clone(),
                uris: task
                    .executor
                    .command
                    .uris
                    .iter()
                    .map(|u| WireUri { value: u.clone() })
                    .collect(),
            },
        },
        resources: task.resources.iter().map(resource_to_wire).collect(),
        data: BASE64.encode(&task.data),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Launch {
    pub task_infos: Vec<WireTaskInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Operation {
    #[serde(rename = "type")]
    pub kind: String,
    pub launch: Launch,
}

#[derive(Debug, Clone, Serialize)]
pub struct Accept {
    pub offer_ids: Vec<WireId>,
    pub operations: Vec<Operation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Decline {
    pub offer_ids: Vec<WireId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Kill {
    pub task_id: WireId,
}

#[derive(Debug, Clone, Serialize)]
pub struct Acknowledge {
    pub agent_id: WireId,
    pub task_id: WireId,
    pub uuid: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Call {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework_id: Option<WireId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<Subscribe>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accept: Option<Accept>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decline: Option<Decline>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kill: Option<Kill>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledge: Option<Acknowledge>,
}

impl Call {
    fn empty(kind: &str) -> Self {
        Call {
            kind: kind.to_string(),
            framework_id: None,
            subscribe: None,
            accept: None,
            decline: None,
            kill: None,
            acknowledge: None,
        }
    }

    pub fn subscribe(framework_info: FrameworkInfo) -> Self {
        let mut call = Call::empty("SUBSCRIBE");
        call.framework_id = framework_info.id.clone();
        call.subscribe = Some(Subscribe { framework_info });
        call
    }

    pub fn accept(offer_ids: Vec<WireId>, tasks: Vec<WireTaskInfo>) -> Self {
        let mut call = Call::empty("ACCEPT");
        call.accept = Some(Accept {
            offer_ids,
            operations: vec![Operation {
                kind: "LAUNCH".to_string(),
                launch: Launch { task_infos: tasks },
            }],
        });
        call
    }

    pub fn decline(offer_ids: Vec<WireId>) -> Self {
        let mut call = Call::empty("DECLINE");
        call.decline = Some(Decline { offer_ids });
        call
    }

    pub fn kill(task_id: WireId) -> Self {
        let mut call = Call::empty("KILL");
        call.kill = Some(Kill { task_id });
        call
    }

    pub fn acknowledge(agent_id: WireId, task_id: WireId, uuid: String) -> Self {
        let mut call = Call::empty("ACKNOWLEDGE");
        call.acknowledge = Some(Acknowledge {
            agent_id,
            task_id,
            uuid,
        });
        call
    }
}

// ---------------------------------------------------------------------------
// Events (master -> scheduler)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Subscribed {
    pub framework_id: WireId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventOffers {
    #[serde(default)]
    pub offers: Vec<WireOffer>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventUpdate {
    pub status: WireTaskStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventRescind {
    pub offer_id: WireId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventMessage {
    pub agent_id: WireId,
    pub executor_id: WireId,
    pub data: String,
}

impl EventMessage {
    pub fn decoded_data(&self) -> Vec<u8> {
        BASE64.decode(&self.data).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventFailure {
    #[serde(default)]
    pub agent_id: Option<WireId>,
    #[serde(default)]
    pub executor_id: Option<WireId>,
    #[serde(default)]
    pub status: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventError {
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub subscribed: Option<Subscribed>,
    #[serde(default)]
    pub offers: Option<EventOffers>,
    #[serde(default)]
    pub update: Option<EventUpdate>,
    #[serde(default)]
    pub rescind: Option<EventRescind>,
    #[serde(default)]
    pub message: Option<EventMessage>,
    #[serde(default)]
    pub failure: Option<EventFailure>,
    #[serde(default)]
    pub error: Option<EventError>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CommandDescriptor, ExecutorDescriptor};
    use serde_json::json;

    #[test]
    fn test_parse_offers_event() {
        let raw = json!({
            "type": "OFFERS",
            "offers": {
                "offers": [{
                    "id": {"value": "offer-1"},
                    "agent_id": {"value": "agent-7"},
                    "hostname": "node1",
                    "resources": [
                        {"name": "cpus", "type": "SCALAR", "scalar": {"value": 4.0}},
                        {"name": "mem", "type": "SCALAR", "scalar": {"value": 8192.0}},
                        {"name": "ports", "type": "RANGES",
                         "ranges": {"range": [{"begin": 31000, "end": 31010}]}},
                        {"name": "gpus", "type": "SET"}
                    ]
                }]
            }
        });

        let event: Event = serde_json::from_value(raw).unwrap();
        assert_eq!(event.kind, "OFFERS");

        let offers = event.offers.unwrap().offers;
        let offer: Offer = offers.into_iter().next().unwrap().into();
        assert_eq!(offer.id, "offer-1");
        assert_eq!(offer.slave_id, "agent-7");
        assert_eq!(offer.hostname, "node1");
        assert_eq!(offer.scalar("cpus"), 4.0);
        assert_eq!(offer.ranges("ports")[0].begin, 31000);
        // unknown resource kind dropped
        assert_eq!(offer.resources.len(), 3);
    }

    #[test]
    fn test_parse_update_event() {
        let raw = json!({
            "type": "UPDATE",
            "update": {
                "status": {
                    "task_id": {"value": "0-17"},
                    "state": "TASK_RUNNING",
                    "uuid": "YWJj",
                    "agent_id": {"value": "agent-7"}
                }
            }
        });

        let event: Event = serde_json::from_value(raw).unwrap();
        let status = event.update.unwrap().status.to_status().unwrap();
        assert_eq!(status.task_id, "0-17");
        assert_eq!(status.state, TaskState::Running);
        assert_eq!(status.uuid.as_deref(), Some("YWJj"));
    }

    #[test]
    fn test_unknown_task_state_maps_to_none() {
        let status = WireTaskStatus {
            task_id: WireId::new("0-17"),
            state: "TASK_UNREACHABLE".to_string(),
            message: None,
            uuid: None,
            agent_id: None,
        };
        assert!(status.to_status().is_none());
    }

    #[test]
    fn test_accept_call_shape() {
        let task = TaskDescriptor {
            id: "0-17".to_string(),
            name: "broker-0".to_string(),
            slave_id: "agent-7".to_string(),
            executor: ExecutorDescriptor {
                id: "0-18".to_string(),
                name: "broker-0".to_string(),
                command: CommandDescriptor {
                    value: "java -Xmx256m -jar executor.jar".to_string(),
                    uris: vec!["http://sched:7000/executor/executor.jar".to_string()],
                },
            },
            resources: vec![
                Resource::scalar("cpus", 1.0),
                Resource::ranges("ports", vec![PortRange::new(31000, 31000)]),
            ],
            data: b"broker.id=0\n".to_vec(),
        };

        let call = Call::accept(vec![WireId::new("offer-1")], vec![task_to_wire(&task)]);
        let value = serde_json::to_value(&call).unwrap();

        assert_eq!(value["type"], "ACCEPT");
        assert_eq!(value["accept"]["offer_ids"][0]["value"], "offer-1");
        let op = &value["accept"]["operations"][0];
        assert_eq!(op["type"], "LAUNCH");
        let info = &op["launch"]["task_infos"][0];
        assert_eq!(info["task_id"]["value"], "0-17");
        assert_eq!(info["executor"]["type"], "CUSTOM");
        assert_eq!(
            info["resources"][1]["ranges"]["range"][0]["begin"],
            31000
        );
        assert_eq!(info["data"], BASE64.encode(b"broker.id=0\n"));
        // untouched call bodies stay absent
        assert!(value.get("kill").is_none());
        assert!(value.get("framework_id").is_none());
    }

    #[test]
    fn test_subscribe_call_carries_framework_id_on_resubscribe() {
        let call = Call::subscribe(FrameworkInfo {
            user: "kafka".to_string(),
            name: "kafka-fleet".to_string(),
            id: Some(WireId::new("fw-1")),
            failover_timeout: 604800.0,
        });

        let value = serde_json::to_value(&call).unwrap();
        assert_eq!(value["type"], "SUBSCRIBE");
        assert_eq!(value["framework_id"]["value"], "fw-1");
        assert_eq!(value["subscribe"]["framework_info"]["id"]["value"], "fw-1");
    }
}
