//! Graph fixtures and pre-wired publishers.
//!
//! Provides convenience builders for common test scenarios: small
//! social graphs, brokers with scripted faults, and publishers already
//! connected to an in-memory broker.

use diffcast_broker::{
    ChannelProducer, LoopbackChannel, MemoryBroker, MemoryProducer, ProducerConfig,
};
use diffcast_model::{
    DiffBuilder, EntityId, NodeChange, PropertyMap, PropertyValue, RelationshipChange,
    TransactionDiff,
};
use diffcast_publisher::{ChangeEventPublisher, PublisherConfig};
use std::sync::Arc;

/// A `Person` node carrying a name property.
pub fn person_node(id: EntityId, name: &str) -> NodeChange {
    let mut properties = PropertyMap::new();
    properties.insert("name".to_string(), PropertyValue::from(name));
    NodeChange::created(id, vec!["Person".to_string()], properties)
}

/// A `KNOWS` relationship between two nodes.
pub fn knows(id: EntityId, start: EntityId, end: EntityId) -> RelationshipChange {
    let mut properties = PropertyMap::new();
    properties.insert("since".to_string(), PropertyValue::from(2020i64));
    RelationshipChange::created(id, start, end, "KNOWS", properties)
}

/// One committed transaction creating two people and a friendship.
pub fn social_graph_diff(sequence: u64) -> TransactionDiff {
    let ada = EntityId::new();
    let grace = EntityId::new();
    DiffBuilder::new(sequence)
        .node(person_node(ada, "ada"))
        .node(person_node(grace, "grace"))
        .relationship(knows(EntityId::new(), ada, grace))
        .build()
}

/// A run of committed transactions over one entity: a create followed
/// by updates, ending with a delete.
///
/// Useful for asserting per-entity ordering; every diff touches the
/// same node id.
pub fn entity_lifetime_diffs(count: usize) -> (EntityId, Vec<TransactionDiff>) {
    let id = EntityId::new();
    let mut diffs = Vec::with_capacity(count);
    for index in 0..count {
        let sequence = (index + 1) as u64;
        let change = if index == 0 {
            person_node(id, "ada")
        } else if index + 1 == count {
            NodeChange::deleted(id)
        } else {
            let mut properties = PropertyMap::new();
            properties.insert("version".to_string(), PropertyValue::from(index as i64));
            NodeChange::updated(id, vec!["Person".to_string()], properties)
        };
        diffs.push(DiffBuilder::new(sequence).node(change).build());
    }
    (id, diffs)
}

/// An empty in-memory broker.
pub fn broker() -> Arc<MemoryBroker> {
    Arc::new(MemoryBroker::new())
}

/// A broker that terminally refuses the given partition keys.
pub fn broker_refusing_keys<I, S>(keys: I) -> Arc<MemoryBroker>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let broker = MemoryBroker::new();
    for key in keys {
        broker.refuse_key(key);
    }
    Arc::new(broker)
}

/// A broker whose next `count` appends fail transiently.
pub fn broker_with_transient_failures(count: u64) -> Arc<MemoryBroker> {
    let broker = MemoryBroker::new();
    broker.fail_next_appends(count);
    Arc::new(broker)
}

/// A running publisher appending straight into the given broker.
pub fn running_publisher(
    broker: &Arc<MemoryBroker>,
    producer_config: ProducerConfig,
) -> ChangeEventPublisher<MemoryProducer> {
    let config = PublisherConfig::new().with_producer(producer_config.clone());
    let producer = MemoryProducer::new(Arc::clone(broker), producer_config);
    let publisher = ChangeEventPublisher::new(config, producer);
    publisher.start().expect("publisher failed to start");
    publisher
}

/// A running publisher wired to the broker through the frame protocol.
pub fn running_loopback_publisher(
    broker: &Arc<MemoryBroker>,
    producer_config: ProducerConfig,
) -> ChangeEventPublisher<ChannelProducer<LoopbackChannel>> {
    let config = PublisherConfig::new().with_producer(producer_config.clone());
    let channel = LoopbackChannel::new(Arc::clone(broker));
    let producer = ChannelProducer::new(channel, config.client_name.clone(), producer_config);
    let publisher = ChangeEventPublisher::new(config, producer);
    publisher.start().expect("publisher failed to start");
    publisher
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn social_graph_diff_shape() {
        let diff = social_graph_diff(5);
        assert_eq!(diff.sequence.as_u64(), 5);
        assert_eq!(diff.nodes.len(), 2);
        assert_eq!(diff.relationships.len(), 1);
        assert_eq!(diff.change_count(), 3);
    }

    #[test]
    fn entity_lifetime_touches_one_id() {
        let (id, diffs) = entity_lifetime_diffs(4);
        assert_eq!(diffs.len(), 4);
        for diff in &diffs {
            assert_eq!(diff.nodes.len(), 1);
            assert_eq!(diff.nodes[0].id, id);
        }
        assert_eq!(diffs[0].sequence.as_u64(), 1);
        assert_eq!(diffs[3].sequence.as_u64(), 4);
    }

    #[test]
    fn running_publisher_is_usable_immediately() {
        let broker = broker();
        let publisher = running_publisher(&broker, ProducerConfig::new());

        publisher.publish(&social_graph_diff(1)).unwrap();
        assert_eq!(broker.topic_len("nodes"), 2);
        assert_eq!(broker.topic_len("relationships"), 1);
    }

    #[test]
    fn refusing_broker_rejects_only_listed_keys() {
        let broker = broker_refusing_keys(["bad"]);
        assert!(broker.append("nodes", "bad", b"x".to_vec().into()).is_err());
        assert!(broker.append("nodes", "good", b"x".to_vec().into()).is_ok());
    }
}
