//! # Peer Scoring
//!
//! Local, non-replicated bookkeeping of peer behavior. Invalid messages
//! and signatures debit a peer's score; scores feed the host's peer
//! management (disconnect decisions stay outside the core). The table also
//! bounds outstanding range serves per peer so a chatty peer cannot queue
//! unbounded response work.

use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Per-peer counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerScore {
    /// Messages dropped before dispatch (oversize, undecodable,
    /// mislabeled).
    pub invalid_messages: u64,
    /// Envelope signature failures.
    pub invalid_signatures: u64,
    /// Events from this peer applied successfully.
    pub events_applied: u64,
    /// Events from this peer rejected by the reducer.
    pub events_rejected: u64,
    /// Range serves currently in flight.
    in_flight_requests: u32,
}

impl PeerScore {
    /// Net score: applied events minus every debit.
    #[must_use]
    pub fn net(&self) -> i64 {
        self.events_applied as i64
            - self.events_rejected as i64
            - self.invalid_messages as i64
            - self.invalid_signatures as i64
    }
}

/// Thread-safe score table keyed by peer id.
#[derive(Debug, Default)]
pub struct PeerScoreTable {
    scores: RwLock<BTreeMap<String, PeerScore>>,
    max_in_flight_requests: u32,
}

impl PeerScoreTable {
    /// Default bound on outstanding range serves per peer.
    pub const DEFAULT_MAX_IN_FLIGHT: u32 = 4;

    /// Create a table with the default in-flight bound.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_in_flight(Self::DEFAULT_MAX_IN_FLIGHT)
    }

    /// Create a table with a custom in-flight bound.
    #[must_use]
    pub fn with_max_in_flight(max_in_flight_requests: u32) -> Self {
        Self {
            scores: RwLock::new(BTreeMap::new()),
            max_in_flight_requests,
        }
    }

    /// Record an invalid message.
    pub fn debit_invalid_message(&self, peer: &str) {
        self.scores
            .write()
            .entry(peer.to_string())
            .or_default()
            .invalid_messages += 1;
    }

    /// Record a signature failure.
    pub fn debit_invalid_signature(&self, peer: &str) {
        self.scores
            .write()
            .entry(peer.to_string())
            .or_default()
            .invalid_signatures += 1;
    }

    /// Record a successfully applied event.
    pub fn credit_event_applied(&self, peer: &str) {
        self.scores
            .write()
            .entry(peer.to_string())
            .or_default()
            .events_applied += 1;
    }

    /// Record a reducer-rejected event.
    pub fn debit_event_rejected(&self, peer: &str) {
        self.scores
            .write()
            .entry(peer.to_string())
            .or_default()
            .events_rejected += 1;
    }

    /// Try to begin serving a request for this peer; `false` means the
    /// peer is at its bound and the request is dropped.
    pub fn try_begin_request(&self, peer: &str) -> bool {
        let mut scores = self.scores.write();
        let score = scores.entry(peer.to_string()).or_default();
        if score.in_flight_requests >= self.max_in_flight_requests {
            return false;
        }
        score.in_flight_requests += 1;
        true
    }

    /// Mark a serve finished.
    pub fn end_request(&self, peer: &str) {
        let mut scores = self.scores.write();
        if let Some(score) = scores.get_mut(peer) {
            score.in_flight_requests = score.in_flight_requests.saturating_sub(1);
        }
    }

    /// Snapshot of a peer's counters.
    #[must_use]
    pub fn score(&self, peer: &str) -> PeerScore {
        self.scores.read().get(peer).cloned().unwrap_or_default()
    }

    /// All peers and their counters.
    #[must_use]
    pub fn all(&self) -> BTreeMap<String, PeerScore> {
        self.scores.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debits_accumulate() {
        let table = PeerScoreTable::new();
        table.debit_invalid_message("p1");
        table.debit_invalid_message("p1");
        table.debit_invalid_signature("p1");
        table.credit_event_applied("p1");

        let score = table.score("p1");
        assert_eq!(score.invalid_messages, 2);
        assert_eq!(score.invalid_signatures, 1);
        assert_eq!(score.net(), -2);
    }

    #[test]
    fn test_in_flight_bound() {
        let table = PeerScoreTable::with_max_in_flight(2);

        assert!(table.try_begin_request("p1"));
        assert!(table.try_begin_request("p1"));
        assert!(!table.try_begin_request("p1"));

        table.end_request("p1");
        assert!(table.try_begin_request("p1"));

        // Other peers are unaffected
        assert!(table.try_begin_request("p2"));
    }

    #[test]
    fn test_unknown_peer_scores_zero() {
        let table = PeerScoreTable::new();
        assert_eq!(table.score("ghost"), PeerScore::default());
    }
}
