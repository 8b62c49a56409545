//! Publish command implementation.

use diffcast_broker::{AckLevel, ChannelProducer, LoopbackChannel, MemoryBroker, ProducerConfig};
use diffcast_model::TransactionDiff;
use diffcast_publisher::{ChangeEventPublisher, PublisherConfig};
use diffcast_testkit::fixtures;
use diffcast_wire::EventPayload;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Flags for the publish command.
pub struct PublishOptions {
    /// Diff file to publish (unless `demo`).
    pub path: Option<PathBuf>,
    /// Generate a demo workload instead of reading a file.
    pub demo: bool,
    /// Number of demo transactions.
    pub diffs: usize,
    /// Demo a single entity's lifecycle instead of a social graph.
    pub lifecycle: bool,
    /// Broker addresses.
    pub servers: Vec<String>,
    /// Topic receiving node change records.
    pub node_topic: String,
    /// Topic receiving relationship change records.
    pub relationship_topic: String,
    /// Ack level name.
    pub ack: String,
    /// Include every stored record in the output.
    pub dump: bool,
    /// Output format (text, json).
    pub format: String,
}

/// Result of a publish run.
#[derive(Debug, Serialize)]
pub struct PublishSummary {
    /// Ack level used for sends.
    pub ack_level: String,
    /// Transactions published.
    pub diffs: usize,
    /// Records accepted by the producer.
    pub records: usize,
    /// Node change records.
    pub nodes: usize,
    /// Relationship change records.
    pub relationships: usize,
    /// Changes skipped because they would not serialize.
    pub skipped: usize,
    /// Records delivered by the closing flush.
    pub flushed: usize,
    /// Deliveries that failed.
    pub failed: usize,
    /// Per-topic breakdown of what the broker stored.
    pub topics: Vec<TopicSummary>,
    /// Every stored record (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored: Option<Vec<StoredRecordInfo>>,
}

/// Stored-record statistics for one topic.
#[derive(Debug, Serialize)]
pub struct TopicSummary {
    /// Topic name.
    pub topic: String,
    /// Records stored.
    pub records: usize,
    /// Distinct partition keys.
    pub distinct_keys: usize,
    /// Total payload bytes.
    pub payload_bytes: usize,
}

/// One stored record, with its payload decoded where possible.
#[derive(Debug, Serialize)]
pub struct StoredRecordInfo {
    /// Topic the record was stored under.
    pub topic: String,
    /// Offset within the topic log.
    pub offset: u64,
    /// Partition key.
    pub key: String,
    /// Payload size in bytes.
    pub payload_bytes: usize,
    /// Entity discriminant (if the payload decoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    /// Change kind (if the payload decoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Commit sequence (if the payload decoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
}

/// Runs the publish command.
///
/// Drives a real publisher wired to an in-memory broker over the frame
/// protocol, then reports what the broker stored.
pub fn run(options: PublishOptions) -> Result<(), Box<dyn std::error::Error>> {
    let transactions = load_workload(&options)?;
    info!(diffs = transactions.len(), "workload loaded");
    let ack_level: AckLevel = options.ack.parse()?;

    let producer_config = ProducerConfig::new().with_ack_level(ack_level);
    let config = PublisherConfig::new()
        .with_servers(options.servers.clone())
        .with_node_topic(&options.node_topic)
        .with_relationship_topic(&options.relationship_topic)
        .with_producer(producer_config.clone());

    let broker = Arc::new(MemoryBroker::new());
    let channel = LoopbackChannel::new(Arc::clone(&broker));
    let producer = ChannelProducer::new(channel, config.client_name.clone(), producer_config);
    let publisher = ChangeEventPublisher::new(config, producer);

    publisher.start()?;

    let mut summary = PublishSummary {
        ack_level: ack_level.as_str().to_string(),
        diffs: transactions.len(),
        records: 0,
        nodes: 0,
        relationships: 0,
        skipped: 0,
        flushed: 0,
        failed: 0,
        topics: Vec::new(),
        stored: None,
    };

    for diff in &transactions {
        let report = publisher.publish(diff)?;
        summary.records += report.records;
        summary.nodes += report.nodes;
        summary.relationships += report.relationships;
        summary.skipped += report.skipped;
    }

    let stop = publisher.stop()?;
    summary.flushed = stop.flushed;
    summary.failed = stop.failed.len();

    let stored = collect_stored(&broker);
    summary.topics = topic_summaries(&stored);
    if options.dump {
        summary.stored = Some(stored);
    }

    match options.format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        _ => {
            print_text_output(&summary);
        }
    }

    Ok(())
}

fn load_workload(
    options: &PublishOptions,
) -> Result<Vec<TransactionDiff>, Box<dyn std::error::Error>> {
    if options.demo {
        let diffs = if options.lifecycle {
            fixtures::entity_lifetime_diffs(options.diffs).1
        } else {
            (1..=options.diffs as u64)
                .map(fixtures::social_graph_diff)
                .collect()
        };
        return Ok(diffs);
    }

    let path = options
        .path
        .as_deref()
        .ok_or("Diff file required for publish (or pass --demo)")?;
    let text = std::fs::read_to_string(path)?;
    let diffs: Vec<TransactionDiff> = serde_json::from_str(&text)?;
    Ok(diffs)
}

fn collect_stored(broker: &MemoryBroker) -> Vec<StoredRecordInfo> {
    let mut stored = Vec::new();
    for topic in broker.topics() {
        for record in broker.records(&topic) {
            let mut info = StoredRecordInfo {
                topic: topic.clone(),
                offset: record.offset,
                key: record.key,
                payload_bytes: record.payload.len(),
                entity: None,
                kind: None,
                sequence: None,
            };
            if let Ok(payload) = EventPayload::decode(&record.payload) {
                info.entity = Some(payload.entity_label().to_string());
                info.kind = Some(payload.kind().as_str().to_string());
                info.sequence = Some(payload.sequence().as_u64());
            }
            stored.push(info);
        }
    }
    stored
}

fn topic_summaries(stored: &[StoredRecordInfo]) -> Vec<TopicSummary> {
    let mut summaries: Vec<TopicSummary> = Vec::new();
    for record in stored {
        match summaries.iter_mut().find(|s| s.topic == record.topic) {
            Some(summary) => {
                summary.records += 1;
                summary.payload_bytes += record.payload_bytes;
            }
            None => summaries.push(TopicSummary {
                topic: record.topic.clone(),
                records: 1,
                distinct_keys: 0,
                payload_bytes: record.payload_bytes,
            }),
        }
    }

    for summary in &mut summaries {
        let keys: HashSet<&str> = stored
            .iter()
            .filter(|r| r.topic == summary.topic)
            .map(|r| r.key.as_str())
            .collect();
        summary.distinct_keys = keys.len();
    }

    summaries
}

fn print_text_output(summary: &PublishSummary) {
    println!("Diffcast Publish");
    println!("================");
    println!();
    println!("Ack level:     {}", summary.ack_level);
    println!("Transactions:  {}", summary.diffs);
    println!(
        "Records:       {} ({} nodes, {} relationships)",
        summary.records, summary.nodes, summary.relationships
    );
    if summary.skipped > 0 {
        println!("Skipped:       {}", summary.skipped);
    }
    println!(
        "Closing flush: {} delivered, {} failed",
        summary.flushed, summary.failed
    );
    println!();
    println!("Topics:");
    for topic in &summary.topics {
        println!(
            "  {:<14} {} records, {} keys, {}",
            topic.topic,
            topic.records,
            topic.distinct_keys,
            format_size(topic.payload_bytes)
        );
    }

    if let Some(stored) = &summary.stored {
        println!();
        println!("Stored records:");
        for record in stored {
            print!(
                "  [{}/{:08}] key={}",
                record.topic, record.offset, record.key
            );
            if let (Some(entity), Some(kind)) = (&record.entity, &record.kind) {
                print!(" {} {}", entity, kind);
            }
            if let Some(sequence) = record.sequence {
                print!(" seq={}", sequence);
            }
            println!(" payload={} bytes", record.payload_bytes);
        }
    }
}

fn format_size(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
