use crate::config::SchedulerConfig;
use kafka_fleet_core::{
    Broker, BrokerTask, Offer, PortRange, Resource, Result, SchedulerError,
};
use kafka_fleet_driver::{CommandDescriptor, ExecutorDescriptor, TaskDescriptor};

/// Injected into the properties payload when the option map leaves it unset
pub const DEFAULT_LOG_DIRS: &str = "kafka-logs";

/// The broker's port: `begin` of the first range of the first `ports`
/// resource. Anything else is a malformed offer for this launch attempt.
fn select_port(offer: &Offer) -> Result<u64> {
    let first = offer.resources.iter().find_map(|r| match r {
        Resource::Ranges { name, ranges } if name == "ports" => Some(ranges.first().copied()),
        _ => None,
    });

    match first.flatten() {
        Some(range) if !range.is_empty() => Ok(range.begin),
        _ => Err(SchedulerError::MalformedOffer {
            offer_id: offer.id.clone(),
        }),
    }
}

/// Render the executor's properties payload: the broker's option map merged
/// with the injected keys (which win on conflict), `log.dirs` defaulted.
/// Lines are sorted by key so successive payloads diff cleanly.
pub fn broker_properties(broker: &Broker, port: u64, zookeeper_connect: &str) -> String {
    let mut props = broker.options.clone();
    props.insert("broker.id".to_string(), broker.id.clone());
    props.insert("port".to_string(), port.to_string());
    props.insert("zookeeper.connect".to_string(), zookeeper_connect.to_string());
    props
        .entry("log.dirs".to_string())
        .or_insert_with(|| DEFAULT_LOG_DIRS.to_string());

    let mut out = String::new();
    for (key, value) in &props {
        out.push_str(key);
        out.push('=');
        out.push_str(value);
        out.push('\n');
    }
    out
}

/// Serialize a broker plus an accepted offer into a launch descriptor and
/// the runtime handle the reconciler attaches to the broker.
pub fn build_task(
    config: &SchedulerConfig,
    broker: &Broker,
    offer: &Offer,
) -> Result<(TaskDescriptor, BrokerTask)> {
    let port = select_port(offer)?;
    let task_id = broker.next_task_id();

    let debug_flag = if config.kafka.executor_debug {
        " -Ddebug=true"
    } else {
        ""
    };
    let command = format!(
        "java -Xmx{}m{} -jar {}",
        broker.heap, debug_flag, config.api.executor_jar
    );

    let executor = ExecutorDescriptor {
        id: broker.next_executor_id(),
        name: format!("broker-{}", broker.id),
        command: CommandDescriptor {
            value: command,
            uris: vec![config.executor_uri(), config.kafka_uri()],
        },
    };

    let data = broker_properties(broker, port, &config.kafka.zookeeper_connect).into_bytes();

    let descriptor = TaskDescriptor {
        id: task_id.clone(),
        name: format!("broker-{}", broker.id),
        slave_id: offer.slave_id.clone(),
        executor,
        resources: vec![
            Resource::scalar("cpus", broker.cpus),
            Resource::scalar("mem", broker.mem as f64),
            Resource::ranges("ports", vec![PortRange::new(port, port)]),
        ],
        data,
    };

    let task = BrokerTask::new(task_id, offer.hostname.clone(), port);
    Ok((descriptor, task))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn test_config() -> Arc<SchedulerConfig> {
        let mut config = SchedulerConfig::default();
        config.api.advertised_host = "sched".to_string();
        config.kafka.zookeeper_connect = "zk:2181".to_string();
        Arc::new(config)
    }

    fn test_offer(ports: Vec<PortRange>) -> Offer {
        Offer {
            id: "offer-1".to_string(),
            slave_id: "slave-1".to_string(),
            hostname: "node1".to_string(),
            resources: vec![
                Resource::scalar("cpus", 4.0),
                Resource::scalar("mem", 8192.0),
                Resource::ranges("ports", ports),
            ],
        }
    }

    #[test]
    fn test_build_task_shape() {
        let config = test_config();
        let broker = Broker::new("0", 1.0, 512, 256).unwrap();
        let offer = test_offer(vec![PortRange::new(31000, 31005)]);

        let (descriptor, task) = build_task(&config, &broker, &offer).unwrap();

        assert_eq!(descriptor.name, "broker-0");
        assert_eq!(descriptor.slave_id, "slave-1");
        assert_eq!(task.port, 31000);
        assert_eq!(task.hostname, "node1");
        assert_eq!(task.id, descriptor.id);
        assert!(!task.running);

        assert_eq!(
            descriptor.executor.command.value,
            "java -Xmx256m -jar kafka-fleet-executor.jar"
        );
        assert_eq!(
            descriptor.executor.command.uris,
            vec![
                "http://sched:7000/executor/kafka-fleet-executor.jar".to_string(),
                "http://sched:7000/kafka/kafka_2.13-3.7.0.tgz".to_string(),
            ]
        );

        // single-port range attached
        let ports: Vec<_> = descriptor
            .resources
            .iter()
            .filter_map(|r| match r {
                Resource::Ranges { name, ranges } if name == "ports" => Some(ranges.clone()),
                _ => None,
            })
            .flatten()
            .collect();
        assert_eq!(ports, vec![PortRange::new(31000, 31000)]);
    }

    #[test]
    fn test_debug_flag() {
        let mut config = SchedulerConfig::default();
        config.kafka.executor_debug = true;
        let broker = Broker::new("0", 1.0, 512, 256).unwrap();
        let offer = test_offer(vec![PortRange::new(31000, 31000)]);

        let (descriptor, _) = build_task(&config, &broker, &offer).unwrap();
        assert_eq!(
            descriptor.executor.command.value,
            "java -Xmx256m -Ddebug=true -jar kafka-fleet-executor.jar"
        );
    }

    #[test]
    fn test_missing_or_empty_port_range_is_malformed() {
        let config = test_config();
        let broker = Broker::new("0", 1.0, 512, 256).unwrap();

        let no_ports = Offer {
            id: "offer-1".to_string(),
            slave_id: "slave-1".to_string(),
            hostname: "node1".to_string(),
            resources: vec![Resource::scalar("cpus", 4.0)],
        };
        assert!(matches!(
            build_task(&config, &broker, &no_ports),
            Err(SchedulerError::MalformedOffer { .. })
        ));

        let empty_first = test_offer(vec![PortRange::new(10, 9)]);
        assert!(matches!(
            build_task(&config, &broker, &empty_first),
            Err(SchedulerError::MalformedOffer { .. })
        ));

        let no_ranges = test_offer(vec![]);
        assert!(build_task(&config, &broker, &no_ranges).is_err());
    }

    #[test]
    fn test_properties_injection_and_precedence() {
        let mut broker = Broker::new("7", 1.0, 512, 256).unwrap();
        broker
            .options
            .insert("num.io.threads".to_string(), "16".to_string());
        // operator tries to pin a port; the injected value wins
        broker.options.insert("port".to_string(), "9092".to_string());

        let props = broker_properties(&broker, 31000, "zk:2181");
        assert_eq!(
            props,
            "broker.id=7\n\
             log.dirs=kafka-logs\n\
             num.io.threads=16\n\
             port=31000\n\
             zookeeper.connect=zk:2181\n"
        );
    }

    #[test]
    fn test_log_dirs_not_overridden_when_set() {
        let mut broker = Broker::new("7", 1.0, 512, 256).unwrap();
        broker
            .options
            .insert("log.dirs".to_string(), "/data/kafka".to_string());

        let props = broker_properties(&broker, 31000, "zk:2181");
        assert!(props.contains("log.dirs=/data/kafka\n"));
        assert!(!props.contains(DEFAULT_LOG_DIRS));
    }
}
