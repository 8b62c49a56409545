//! Publisher configuration.

use diffcast_broker::ProducerConfig;

/// Configuration for a change-event publisher.
///
/// Defaults target a local broker with the conventional topic pair:
/// node changes on `nodes`, relationship changes on `relationships`.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Broker addresses, tried in order.
    pub servers: Vec<String>,
    /// Topic receiving node change records.
    pub node_topic: String,
    /// Topic receiving relationship change records.
    pub relationship_topic: String,
    /// Client name announced at handshake.
    pub client_name: String,
    /// Producer tuning (ack level, compression, retry, buffering).
    pub producer: ProducerConfig,
}

impl PublisherConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            servers: vec!["localhost:9092".to_string()],
            node_topic: "nodes".to_string(),
            relationship_topic: "relationships".to_string(),
            client_name: "diffcast".to_string(),
            producer: ProducerConfig::new(),
        }
    }

    /// Sets the broker addresses.
    #[must_use]
    pub fn with_servers(mut self, servers: Vec<String>) -> Self {
        self.servers = servers;
        self
    }

    /// Sets the node topic.
    #[must_use]
    pub fn with_node_topic(mut self, topic: impl Into<String>) -> Self {
        self.node_topic = topic.into();
        self
    }

    /// Sets the relationship topic.
    #[must_use]
    pub fn with_relationship_topic(mut self, topic: impl Into<String>) -> Self {
        self.relationship_topic = topic.into();
        self
    }

    /// Sets the client name.
    #[must_use]
    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    /// Sets the producer configuration.
    #[must_use]
    pub fn with_producer(mut self, producer: ProducerConfig) -> Self {
        self.producer = producer;
        self
    }
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diffcast_broker::AckLevel;

    #[test]
    fn defaults_target_local_broker() {
        let config = PublisherConfig::new();
        assert_eq!(config.servers, vec!["localhost:9092"]);
        assert_eq!(config.node_topic, "nodes");
        assert_eq!(config.relationship_topic, "relationships");
        assert_eq!(config.producer.ack_level, AckLevel::Acknowledged);
    }

    #[test]
    fn builders_override_fields() {
        let config = PublisherConfig::new()
            .with_servers(vec!["broker-1:9092".into(), "broker-2:9092".into()])
            .with_node_topic("graph.nodes")
            .with_relationship_topic("graph.edges")
            .with_client_name("app");

        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.node_topic, "graph.nodes");
        assert_eq!(config.relationship_topic, "graph.edges");
        assert_eq!(config.client_name, "app");
    }
}
