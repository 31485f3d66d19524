use kafka_fleet_core::{Broker, Failover};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub scheduler: FrameworkConfig,
    pub storage: StorageConfig,
    pub api: ApiConfig,
    pub kafka: KafkaConfig,
    /// Desired brokers; declarations missing from the loaded snapshot are
    /// added at startup
    #[serde(default)]
    pub brokers: Vec<BrokerDecl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameworkConfig {
    /// Master base URL, e.g. `http://master:5050`
    pub master: String,
    pub framework_name: String,
    pub framework_user: String,
    /// How long the master keeps the framework alive across scheduler
    /// restarts before reaping its tasks
    pub failover_timeout_secs: f64,
    pub resubscribe_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub state_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// Hostname executors use to reach the artifact server
    pub advertised_host: String,
    pub artifact_dir: PathBuf,
    pub executor_jar: String,
    pub kafka_dist: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaConfig {
    pub zookeeper_connect: String,
    /// Adds `-Ddebug=true` to the executor command line
    #[serde(default)]
    pub executor_debug: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerDecl {
    pub id: String,
    pub cpus: f64,
    pub mem: u64,
    pub heap: u64,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    #[serde(default)]
    pub failover: FailoverDecl,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverDecl {
    pub delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_tries: Option<u32>,
}

impl Default for FailoverDecl {
    fn default() -> Self {
        FailoverDecl {
            delay_ms: 10_000,
            max_delay_ms: 300_000,
            max_tries: None,
        }
    }
}

impl BrokerDecl {
    pub fn to_broker(&self) -> kafka_fleet_core::Result<Broker> {
        let mut broker = Broker::new(self.id.clone(), self.cpus, self.mem, self.heap)?;
        broker.active = self.active;
        broker.options = self.options.clone();
        broker.failover = Failover::new(
            self.failover.delay_ms,
            self.failover.max_delay_ms,
            self.failover.max_tries,
        );
        Ok(broker)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            scheduler: FrameworkConfig {
                master: "http://127.0.0.1:5050".to_string(),
                framework_name: "kafka-fleet".to_string(),
                framework_user: "kafka".to_string(),
                failover_timeout_secs: 604_800.0,
                resubscribe_delay_ms: 5_000,
            },
            storage: StorageConfig {
                state_file: PathBuf::from("./data/cluster.json"),
            },
            api: ApiConfig {
                host: "0.0.0.0".to_string(),
                port: 7000,
                advertised_host: "127.0.0.1".to_string(),
                artifact_dir: PathBuf::from("./artifacts"),
                executor_jar: "kafka-fleet-executor.jar".to_string(),
                kafka_dist: "kafka_2.13-3.7.0.tgz".to_string(),
            },
            kafka: KafkaConfig {
                zookeeper_connect: "127.0.0.1:2181".to_string(),
                executor_debug: false,
            },
            brokers: vec![],
        }
    }
}

impl SchedulerConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: SchedulerConfig = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Download URI for the executor jar
    pub fn executor_uri(&self) -> String {
        format!(
            "http://{}:{}/executor/{}",
            self.api.advertised_host, self.api.port, self.api.executor_jar
        )
    }

    /// Download URI for the Kafka distribution
    pub fn kafka_uri(&self) -> String {
        format!(
            "http://{}:{}/kafka/{}",
            self.api.advertised_host, self.api.port, self.api.kafka_dist
        )
    }
}
