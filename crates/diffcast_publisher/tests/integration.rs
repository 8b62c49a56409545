//! Integration tests for the publisher over the framed broker path.

use diffcast_broker::{
    AckLevel, ChannelProducer, LoopbackChannel, MemoryBroker, ProducerConfig, RetryPolicy,
};
use diffcast_model::{
    ChangeKind, DiffBuilder, EntityId, NodeChange, PropertyMap, PropertyValue, RelationshipChange,
    SequenceNumber,
};
use diffcast_publisher::{
    ChangeEventPublisher, CommitObserver, LifecycleState, ObserverRegistry, PublisherConfig,
    PublisherError,
};
use diffcast_wire::EventPayload;
use std::sync::Arc;

/// A publisher wired to the broker through the frame protocol.
fn loopback_publisher(
    broker: &Arc<MemoryBroker>,
    producer_config: ProducerConfig,
) -> ChangeEventPublisher<ChannelProducer<LoopbackChannel>> {
    let config = PublisherConfig::new().with_producer(producer_config);
    let channel = LoopbackChannel::new(Arc::clone(broker));
    let producer = ChannelProducer::new(channel, config.client_name.clone(), config.producer.clone());
    ChangeEventPublisher::new(config, producer)
}

fn person(id: EntityId, name: &str) -> NodeChange {
    let mut properties = PropertyMap::new();
    properties.insert("name".to_string(), PropertyValue::from(name));
    NodeChange::created(id, vec!["Person".to_string()], properties)
}

#[test]
fn publishes_decodable_records_end_to_end() {
    let broker = Arc::new(MemoryBroker::new());
    let publisher = loopback_publisher(&broker, ProducerConfig::new());
    publisher.start().unwrap();

    let node_id = EntityId::new();
    let rel_id = EntityId::new();
    let start = EntityId::new();
    let end = EntityId::new();
    let diff = DiffBuilder::new(42u64)
        .node(person(node_id, "ada"))
        .relationship(RelationshipChange::created(
            rel_id,
            start,
            end,
            "KNOWS",
            PropertyMap::new(),
        ))
        .build();

    let report = publisher.publish(&diff).unwrap();
    assert_eq!(report.records, 2);

    let nodes = broker.records("nodes");
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].key, node_id.partition_key());
    let payload = EventPayload::decode(&nodes[0].payload).unwrap();
    assert_eq!(payload.sequence(), SequenceNumber::new(42));
    assert_eq!(payload.entity_id(), node_id);
    assert_eq!(payload.kind(), ChangeKind::Created);
    match payload {
        EventPayload::Node { change, .. } => {
            assert_eq!(change.labels, vec!["Person"]);
            assert_eq!(
                change.properties.get("name"),
                Some(&PropertyValue::from("ada"))
            );
        }
        EventPayload::Relationship { .. } => panic!("expected a node payload"),
    }

    let relationships = broker.records("relationships");
    assert_eq!(relationships.len(), 1);
    assert_eq!(relationships[0].key, rel_id.partition_key());
    match EventPayload::decode(&relationships[0].payload).unwrap() {
        EventPayload::Relationship { change, .. } => {
            assert_eq!(change.start, start);
            assert_eq!(change.end, end);
            assert_eq!(change.rel_type, "KNOWS");
        }
        EventPayload::Node { .. } => panic!("expected a relationship payload"),
    }
}

#[test]
fn records_for_an_entity_stay_ordered_across_diffs() {
    let broker = Arc::new(MemoryBroker::new());
    let publisher = loopback_publisher(&broker, ProducerConfig::new());
    publisher.start().unwrap();

    let id = EntityId::new();
    publisher
        .publish(&DiffBuilder::new(1u64).node(person(id, "ada")).build())
        .unwrap();
    publisher
        .publish(
            &DiffBuilder::new(2u64)
                .node(NodeChange::updated(
                    id,
                    vec!["Person".to_string()],
                    PropertyMap::new(),
                ))
                .build(),
        )
        .unwrap();
    publisher
        .publish(&DiffBuilder::new(3u64).node(NodeChange::deleted(id)).build())
        .unwrap();

    let records = broker.records_for_key("nodes", &id.partition_key());
    assert_eq!(records.len(), 3);
    assert!(records[0].offset < records[1].offset);
    assert!(records[1].offset < records[2].offset);

    let kinds: Vec<ChangeKind> = records
        .iter()
        .map(|r| EventPayload::decode(&r.payload).unwrap().kind())
        .collect();
    assert_eq!(
        kinds,
        vec![ChangeKind::Created, ChangeKind::Updated, ChangeKind::Deleted]
    );
}

#[test]
fn buffered_publisher_delivers_on_stop() {
    let broker = Arc::new(MemoryBroker::new());
    let producer_config = ProducerConfig::new().with_ack_level(AckLevel::Buffered);
    let publisher = loopback_publisher(&broker, producer_config);
    publisher.start().unwrap();

    publisher
        .publish(&DiffBuilder::new(1u64).node(person(EntityId::new(), "ada")).build())
        .unwrap();
    publisher
        .publish(
            &DiffBuilder::new(2u64)
                .node(person(EntityId::new(), "grace"))
                .relationship(RelationshipChange::created(
                    EntityId::new(),
                    EntityId::new(),
                    EntityId::new(),
                    "KNOWS",
                    PropertyMap::new(),
                ))
                .build(),
        )
        .unwrap();

    // Nothing reaches the broker until the stop flush.
    assert_eq!(broker.topic_len("nodes"), 0);

    let report = publisher.stop().unwrap();
    assert!(report.is_clean());
    assert_eq!(report.flushed, 3);
    assert_eq!(broker.topic_len("nodes"), 2);
    assert_eq!(broker.topic_len("relationships"), 1);
    assert_eq!(publisher.state(), LifecycleState::Stopped);
}

#[test]
fn broker_refusals_are_reported_per_record() {
    let broker = Arc::new(MemoryBroker::new());
    let bad = EntityId::new();
    let good = EntityId::new();
    broker.refuse_key(bad.partition_key());

    let producer_config = ProducerConfig::new().with_retry(RetryPolicy::none());
    let publisher = loopback_publisher(&broker, producer_config);
    publisher.start().unwrap();

    let diff = DiffBuilder::new(5u64)
        .node(person(bad, "bad"))
        .node(person(good, "good"))
        .build();

    let err = publisher.publish(&diff).unwrap_err();
    match &err {
        PublisherError::Publish { failed } => {
            assert_eq!(failed.len(), 1);
            assert_eq!(failed[0].key, bad.partition_key());
            assert_eq!(failed[0].topic, "nodes");
        }
        other => panic!("unexpected error: {other}"),
    }

    // The refusal did not block the other record.
    assert_eq!(broker.topic_len("nodes"), 1);
    assert_eq!(broker.records("nodes")[0].key, good.partition_key());
}

#[test]
fn undeliverable_buffered_records_show_up_in_the_stop_report() {
    let broker = Arc::new(MemoryBroker::new());
    let bad = EntityId::new();
    broker.refuse_key(bad.partition_key());

    let producer_config = ProducerConfig::new()
        .with_ack_level(AckLevel::Buffered)
        .with_retry(RetryPolicy::none());
    let publisher = loopback_publisher(&broker, producer_config);
    publisher.start().unwrap();

    let diff = DiffBuilder::new(9u64)
        .node(person(bad, "bad"))
        .node(person(EntityId::new(), "good"))
        .build();
    publisher.publish(&diff).unwrap();

    let report = publisher.stop().unwrap();
    assert_eq!(report.flushed, 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].key, bad.partition_key());
}

#[test]
fn restart_needs_a_fresh_producer() {
    let broker = Arc::new(MemoryBroker::new());
    let publisher = loopback_publisher(&broker, ProducerConfig::new());
    publisher.start().unwrap();
    publisher.stop().unwrap();

    // The producer was closed by the stop; a new publisher is needed to
    // resume publishing.
    let err = publisher.start().unwrap_err();
    match err {
        PublisherError::Connection { message } => assert!(message.contains("closed")),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(publisher.state(), LifecycleState::Stopped);

    let replacement = loopback_publisher(&broker, ProducerConfig::new());
    replacement.start().unwrap();
    replacement
        .publish(&DiffBuilder::new(1u64).node(person(EntityId::new(), "ada")).build())
        .unwrap();
    assert_eq!(broker.topic_len("nodes"), 1);
}

#[test]
fn host_commit_flow_through_the_registry() {
    let broker = Arc::new(MemoryBroker::new());
    let publisher = Arc::new(loopback_publisher(&broker, ProducerConfig::new()));
    publisher.start().unwrap();

    let registry = ObserverRegistry::new();
    let id = registry.register(Arc::clone(&publisher) as Arc<dyn CommitObserver>);

    let diff = DiffBuilder::new(1u64).node(person(EntityId::new(), "ada")).build();
    let results = registry.notify(&diff);
    assert!(results[0].1.is_ok());
    assert_eq!(broker.topic_len("nodes"), 1);

    // After unregistering, commits no longer reach the broker.
    assert!(registry.unregister(id));
    registry.notify(&diff);
    assert_eq!(broker.topic_len("nodes"), 1);
}
