//! Node configuration.

use souk_types::MAX_EVENT_SIZE;

/// Tunables for the node's state path.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Hard bound on a serialized event envelope, enforced at publish and
    /// at sync ingress.
    pub max_event_size: usize,
    /// Take a snapshot automatically every N appended events; `None`
    /// leaves snapshotting to the host.
    pub snapshot_every: Option<u64>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            max_event_size: MAX_EVENT_SIZE,
            snapshot_every: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bound_matches_protocol_default() {
        assert_eq!(NodeConfig::default().max_event_size, 64 * 1024);
    }
}
