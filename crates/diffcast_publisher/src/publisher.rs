//! The change-event publisher.

use crate::config::PublisherConfig;
use crate::error::{PublisherError, PublisherResult};
use crate::state::{LifecycleState, PublishReport, PublisherStats, StopReport};
use diffcast_broker::{FailedDelivery, FlushOutcome, ProducerClient};
use diffcast_model::TransactionDiff;
use diffcast_wire::PublishRecord;
use parking_lot::RwLock;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Publishes committed transaction diffs as keyed broker records.
///
/// One diff becomes one record per change: node changes on the node
/// topic, relationship changes on the relationship topic, each keyed by
/// the entity id so records for the same entity stay ordered. Delivery
/// is at-least-once; a failed publish may leave some records delivered,
/// and the error enumerates exactly which ones were not.
///
/// The publisher is a state machine
/// (`Stopped -> Starting -> Running -> Stopping -> Stopped`). Publishes
/// are only accepted while `Running`; everything else is rejected
/// without touching the producer.
pub struct ChangeEventPublisher<P: ProducerClient> {
    config: PublisherConfig,
    producer: P,
    state: RwLock<LifecycleState>,
    stats: RwLock<PublisherStats>,
}

impl<P: ProducerClient> ChangeEventPublisher<P> {
    /// Creates a publisher in the `Stopped` state.
    pub fn new(config: PublisherConfig, producer: P) -> Self {
        Self {
            config,
            producer,
            state: RwLock::new(LifecycleState::Stopped),
            stats: RwLock::new(PublisherStats::default()),
        }
    }

    /// The configuration this publisher runs with.
    #[must_use]
    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// The producer this publisher delivers through.
    #[must_use]
    pub fn producer(&self) -> &P {
        &self.producer
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        *self.state.read()
    }

    /// A snapshot of the lifetime counters.
    #[must_use]
    pub fn stats(&self) -> PublisherStats {
        self.stats.read().clone()
    }

    fn set_state(&self, state: LifecycleState) {
        *self.state.write() = state;
    }

    fn record_error(&self, message: &str) {
        self.stats.write().last_error = Some(message.to_string());
    }

    /// Connects the producer and moves to `Running`.
    ///
    /// A failed connection reverts to `Stopped`, so a later `start` can
    /// retry.
    pub fn start(&self) -> PublisherResult<()> {
        {
            let mut state = self.state.write();
            if !state.can_start() {
                return Err(PublisherError::InvalidTransition {
                    from: *state,
                    to: LifecycleState::Starting,
                });
            }
            *state = LifecycleState::Starting;
        }

        if let Err(err) = self.producer.connect(&self.config.servers) {
            let message = err.to_string();
            warn!(error = %message, "publisher start failed");
            self.record_error(&message);
            self.set_state(LifecycleState::Stopped);
            return Err(PublisherError::connection(message));
        }

        self.set_state(LifecycleState::Running);
        info!(
            client = %self.config.client_name,
            node_topic = %self.config.node_topic,
            relationship_topic = %self.config.relationship_topic,
            "publisher running"
        );
        Ok(())
    }

    /// Publishes one committed diff.
    ///
    /// Node changes are sent first, then relationship changes, each in
    /// diff order. A change that cannot be serialized is skipped and
    /// counted; a record that cannot be delivered is recorded and the
    /// remaining records are still attempted. When any delivery failed
    /// the result is [`PublisherError::Publish`] listing every failed
    /// record.
    pub fn publish(&self, diff: &TransactionDiff) -> PublisherResult<PublishReport> {
        let state = self.state();
        if !state.accepts_publishes() {
            return Err(PublisherError::NotRunning { state });
        }
        if diff.is_empty() {
            return Ok(PublishReport::empty());
        }
        if !self.producer.is_connected() {
            let message = "producer is not connected";
            self.record_error(message);
            return Err(PublisherError::connection(message));
        }

        let mut report = PublishReport::empty();
        let mut failed = Vec::new();

        for change in &diff.nodes {
            match PublishRecord::for_node(&self.config.node_topic, diff.sequence, change) {
                Ok(record) => match self.producer.send(record) {
                    Ok(_) => {
                        report.records += 1;
                        report.nodes += 1;
                    }
                    Err(err) => failed.push(FailedDelivery::new(
                        &self.config.node_topic,
                        change.id.partition_key(),
                        err.to_string(),
                    )),
                },
                Err(err) => {
                    warn!(id = %change.id, error = %err, "skipping unserializable node change");
                    report.skipped += 1;
                }
            }
        }

        for change in &diff.relationships {
            match PublishRecord::for_relationship(
                &self.config.relationship_topic,
                diff.sequence,
                change,
            ) {
                Ok(record) => match self.producer.send(record) {
                    Ok(_) => {
                        report.records += 1;
                        report.relationships += 1;
                    }
                    Err(err) => failed.push(FailedDelivery::new(
                        &self.config.relationship_topic,
                        change.id.partition_key(),
                        err.to_string(),
                    )),
                },
                Err(err) => {
                    warn!(
                        id = %change.id,
                        error = %err,
                        "skipping unserializable relationship change"
                    );
                    report.skipped += 1;
                }
            }
        }

        {
            let mut stats = self.stats.write();
            stats.records_published += report.records as u64;
            stats.records_failed += failed.len() as u64;
            stats.serialization_skips += report.skipped as u64;
            if failed.is_empty() {
                stats.diffs_published += 1;
                stats.last_publish_time = Some(Instant::now());
                stats.last_error = None;
            } else {
                stats.last_error = Some(format!("{} record(s) failed delivery", failed.len()));
            }
        }

        if failed.is_empty() {
            debug!(
                sequence = %diff.sequence,
                records = report.records,
                skipped = report.skipped,
                "diff published"
            );
            Ok(report)
        } else {
            warn!(
                sequence = %diff.sequence,
                delivered = report.records,
                failed = failed.len(),
                "diff partially published"
            );
            Err(PublisherError::Publish { failed })
        }
    }

    /// Drains buffered records, closes the producer, and moves to
    /// `Stopped`.
    ///
    /// Stopping a stopped publisher is a no-op; stopping one that is
    /// already stopping is an error. The report lists every record that
    /// was lost to the shutdown.
    pub fn stop(&self) -> PublisherResult<StopReport> {
        {
            let mut state = self.state.write();
            match *state {
                LifecycleState::Stopped => return Ok(StopReport::default()),
                current if !current.can_stop() => {
                    return Err(PublisherError::InvalidTransition {
                        from: current,
                        to: LifecycleState::Stopping,
                    });
                }
                _ => *state = LifecycleState::Stopping,
            }
        }

        let outcome = match self.producer.flush(self.config.producer.flush_deadline) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(error = %err, "flush failed during stop");
                self.record_error(&err.to_string());
                FlushOutcome::empty()
            }
        };

        if let Err(err) = self.producer.close() {
            warn!(error = %err, "producer close failed");
            self.record_error(&err.to_string());
        }

        {
            let mut stats = self.stats.write();
            stats.records_published += outcome.delivered as u64;
            stats.records_failed += outcome.failed.len() as u64;
        }
        self.set_state(LifecycleState::Stopped);

        info!(
            flushed = outcome.delivered,
            failed = outcome.failed.len(),
            "publisher stopped"
        );
        Ok(StopReport {
            flushed: outcome.delivered,
            failed: outcome.failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diffcast_broker::{BrokerError, ScriptedProducer};
    use diffcast_model::{DiffBuilder, EntityId, NodeChange, PropertyValue, RelationshipChange};

    fn publisher_with(producer: ScriptedProducer) -> ChangeEventPublisher<ScriptedProducer> {
        ChangeEventPublisher::new(PublisherConfig::new(), producer)
    }

    fn sample_diff(node: EntityId, rel: EntityId) -> TransactionDiff {
        DiffBuilder::new(7u64)
            .node(NodeChange::created(
                node,
                vec!["Person".into()],
                [("name".to_string(), PropertyValue::from("ada"))]
                    .into_iter()
                    .collect(),
            ))
            .relationship(RelationshipChange::created(
                rel,
                EntityId::new(),
                EntityId::new(),
                "KNOWS",
                Default::default(),
            ))
            .build()
    }

    #[test]
    fn starts_into_running() {
        let publisher = publisher_with(ScriptedProducer::new());
        assert_eq!(publisher.state(), LifecycleState::Stopped);

        publisher.start().unwrap();
        assert_eq!(publisher.state(), LifecycleState::Running);
        assert!(publisher.producer().is_connected());
    }

    #[test]
    fn failed_start_reverts_to_stopped() {
        let producer = ScriptedProducer::new();
        producer.set_connect_error("no route to broker");
        let publisher = publisher_with(producer);

        let err = publisher.start().unwrap_err();
        assert!(matches!(err, PublisherError::Connection { .. }));
        assert_eq!(publisher.state(), LifecycleState::Stopped);
        assert!(publisher.stats().last_error.is_some());

        // The connection failure was transient; starting again works.
        publisher.start().unwrap();
        assert_eq!(publisher.state(), LifecycleState::Running);
    }

    #[test]
    fn double_start_is_invalid() {
        let publisher = publisher_with(ScriptedProducer::new());
        publisher.start().unwrap();

        let err = publisher.start().unwrap_err();
        assert!(matches!(err, PublisherError::InvalidTransition { .. }));
        assert_eq!(publisher.state(), LifecycleState::Running);
    }

    #[test]
    fn publish_requires_running() {
        let publisher = publisher_with(ScriptedProducer::new());
        let diff = sample_diff(EntityId::new(), EntityId::new());

        let err = publisher.publish(&diff).unwrap_err();
        match err {
            PublisherError::NotRunning { state } => assert_eq!(state, LifecycleState::Stopped),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_diff_publishes_nothing() {
        let publisher = publisher_with(ScriptedProducer::new());
        publisher.start().unwrap();

        let report = publisher.publish(&TransactionDiff::new(1u64.into())).unwrap();
        assert_eq!(report, PublishReport::empty());
        assert!(publisher.producer().sent().is_empty());
        assert_eq!(publisher.stats().diffs_published, 0);
    }

    #[test]
    fn publish_routes_topics_and_keys() {
        let publisher = publisher_with(ScriptedProducer::new());
        publisher.start().unwrap();

        let node = EntityId::new();
        let rel = EntityId::new();
        let report = publisher.publish(&sample_diff(node, rel)).unwrap();

        assert_eq!(report.records, 2);
        assert_eq!(report.nodes, 1);
        assert_eq!(report.relationships, 1);

        let sent = publisher.producer().sent();
        assert_eq!(sent[0].topic, "nodes");
        assert_eq!(sent[0].key, node.partition_key());
        assert_eq!(sent[1].topic, "relationships");
        assert_eq!(sent[1].key, rel.partition_key());
    }

    #[test]
    fn nodes_are_sent_before_relationships() {
        let publisher = publisher_with(ScriptedProducer::new());
        publisher.start().unwrap();

        let diff = DiffBuilder::new(1u64)
            .relationship(RelationshipChange::deleted(
                EntityId::new(),
                EntityId::new(),
                EntityId::new(),
                "KNOWS",
            ))
            .node(NodeChange::deleted(EntityId::new()))
            .node(NodeChange::deleted(EntityId::new()))
            .build();

        publisher.publish(&diff).unwrap();

        let topics: Vec<String> = publisher
            .producer()
            .sent()
            .iter()
            .map(|r| r.topic.clone())
            .collect();
        assert_eq!(topics, vec!["nodes", "nodes", "relationships"]);
    }

    #[test]
    fn delivery_failures_are_enumerated_and_the_rest_delivered() {
        let producer = ScriptedProducer::new();
        let bad = EntityId::new();
        producer.fail_key(bad.partition_key());
        let publisher = publisher_with(producer);
        publisher.start().unwrap();

        let good = EntityId::new();
        let rel = EntityId::new();
        let diff = DiffBuilder::new(3u64)
            .node(NodeChange::deleted(bad))
            .node(NodeChange::deleted(good))
            .relationship(RelationshipChange::deleted(
                rel,
                EntityId::new(),
                EntityId::new(),
                "KNOWS",
            ))
            .build();

        let err = publisher.publish(&diff).unwrap_err();
        let failed = err.failed_deliveries();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].key, bad.partition_key());

        // The failure did not stop the remaining records.
        assert_eq!(publisher.producer().sent().len(), 2);
        let stats = publisher.stats();
        assert_eq!(stats.records_published, 2);
        assert_eq!(stats.records_failed, 1);
        assert_eq!(stats.diffs_published, 0);
    }

    #[test]
    fn lost_connection_is_a_connection_error() {
        let publisher = publisher_with(ScriptedProducer::new());
        publisher.start().unwrap();
        publisher.producer().close().unwrap();

        let diff = sample_diff(EntityId::new(), EntityId::new());
        let err = publisher.publish(&diff).unwrap_err();
        assert!(matches!(err, PublisherError::Connection { .. }));
    }

    #[test]
    fn stop_flushes_closes_and_reports() {
        let producer = ScriptedProducer::new();
        producer.set_flush_failures(vec![FailedDelivery::new("nodes", "x", "stuck")]);
        let publisher = publisher_with(producer);
        publisher.start().unwrap();

        let report = publisher.stop().unwrap();
        assert!(!report.is_clean());
        assert_eq!(report.failed[0].key, "x");
        assert_eq!(publisher.state(), LifecycleState::Stopped);
        assert!(!publisher.producer().is_connected());

        // The producer is closed, not just disconnected.
        assert!(matches!(
            publisher.producer().connect(&[]),
            Err(BrokerError::Closed)
        ));
    }

    #[test]
    fn stop_when_stopped_is_a_noop() {
        let publisher = publisher_with(ScriptedProducer::new());

        let report = publisher.stop().unwrap();
        assert!(report.is_clean());
        assert_eq!(report.flushed, 0);
        assert_eq!(publisher.state(), LifecycleState::Stopped);
    }

    #[test]
    fn publish_after_stop_is_rejected() {
        let publisher = publisher_with(ScriptedProducer::new());
        publisher.start().unwrap();
        publisher.stop().unwrap();

        let diff = sample_diff(EntityId::new(), EntityId::new());
        let err = publisher.publish(&diff).unwrap_err();
        assert!(matches!(err, PublisherError::NotRunning { .. }));
    }

    #[test]
    fn stats_accumulate_across_publishes() {
        let publisher = publisher_with(ScriptedProducer::new());
        publisher.start().unwrap();

        publisher
            .publish(&sample_diff(EntityId::new(), EntityId::new()))
            .unwrap();
        publisher
            .publish(&sample_diff(EntityId::new(), EntityId::new()))
            .unwrap();

        let stats = publisher.stats();
        assert_eq!(stats.diffs_published, 2);
        assert_eq!(stats.records_published, 4);
        assert_eq!(stats.records_failed, 0);
        assert!(stats.last_publish_time.is_some());
        assert!(stats.last_error.is_none());
    }
}
