//! Gossip topic names.

/// Newly produced event envelopes, one per message.
pub const TOPIC_EVENTS: &str = "souk/events/1";

/// Range and snapshot requests.
pub const TOPIC_REQUESTS: &str = "souk/requests/1";

/// Range and snapshot responses.
pub const TOPIC_RESPONSES: &str = "souk/responses/1";

/// All topics the engine subscribes to.
pub const ALL_TOPICS: [&str; 3] = [TOPIC_EVENTS, TOPIC_REQUESTS, TOPIC_RESPONSES];
