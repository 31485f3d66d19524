use serde::{Deserialize, Serialize};

/// Offer identifier issued by the master
pub type OfferId = String;

/// Slave (agent) identifier
pub type SlaveId = String;

/// Task identifier string, shape `<broker-id>-<nonce>`
pub type TaskId = String;

/// Executor identifier string
pub type ExecutorId = String;

/// Inclusive value range inside a RANGES resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub begin: u64,
    pub end: u64,
}

impl PortRange {
    pub fn new(begin: u64, end: u64) -> Self {
        PortRange { begin, end }
    }

    /// A range with `begin > end` carries no ports
    pub fn is_empty(&self) -> bool {
        self.begin > self.end
    }
}

/// One named resource advertised in an offer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Resource {
    Scalar { name: String, value: f64 },
    Ranges { name: String, ranges: Vec<PortRange> },
}

impl Resource {
    pub fn scalar(name: &str, value: f64) -> Self {
        Resource::Scalar {
            name: name.to_string(),
            value,
        }
    }

    pub fn ranges(name: &str, ranges: Vec<PortRange>) -> Self {
        Resource::Ranges {
            name: name.to_string(),
            ranges,
        }
    }
}

/// A snapshot of resources available on one slave, presented by the master
/// for a short acceptance window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub slave_id: SlaveId,
    pub hostname: String,
    pub resources: Vec<Resource>,
}

impl Offer {
    /// Aggregate value of all scalar resources with the given name.
    ///
    /// Matching is best-effort scalar comparison; roles and reservations are
    /// not modeled.
    pub fn scalar(&self, name: &str) -> f64 {
        self.resources
            .iter()
            .map(|r| match r {
                Resource::Scalar { name: n, value } if n == name => *value,
                _ => 0.0,
            })
            .sum()
    }

    /// All ranges of ranged resources with the given name, in offer order
    pub fn ranges(&self, name: &str) -> Vec<PortRange> {
        self.resources
            .iter()
            .filter_map(|r| match r {
                Resource::Ranges { name: n, ranges } if n == name => Some(ranges.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(resources: Vec<Resource>) -> Offer {
        Offer {
            id: "offer-1".to_string(),
            slave_id: "slave-1".to_string(),
            hostname: "node1".to_string(),
            resources,
        }
    }

    #[test]
    fn test_scalar_aggregates_same_name() {
        let o = offer(vec![
            Resource::scalar("cpus", 1.5),
            Resource::scalar("cpus", 0.5),
            Resource::scalar("mem", 1024.0),
        ]);

        assert_eq!(o.scalar("cpus"), 2.0);
        assert_eq!(o.scalar("mem"), 1024.0);
        assert_eq!(o.scalar("disk"), 0.0);
    }

    #[test]
    fn test_ranges_concatenate_in_offer_order() {
        let o = offer(vec![
            Resource::ranges("ports", vec![PortRange::new(31000, 31001)]),
            Resource::ranges("ports", vec![PortRange::new(32000, 32005)]),
        ]);

        let ports = o.ranges("ports");
        assert_eq!(ports.len(), 2);
        assert_eq!(ports[0].begin, 31000);
        assert_eq!(ports[1].begin, 32000);
        assert!(o.ranges("other").is_empty());
    }

    #[test]
    fn test_empty_range() {
        assert!(PortRange::new(5, 4).is_empty());
        assert!(!PortRange::new(5, 5).is_empty());
    }
}
