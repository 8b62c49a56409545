//! Inspect command implementation.

use diffcast_model::{ChangeKind, TransactionDiff};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Diff file inspection result.
#[derive(Debug, Serialize)]
pub struct InspectReport {
    /// Diff file path.
    pub path: String,
    /// Transactions in the file.
    pub diffs: usize,
    /// Transactions carrying no changes.
    pub empty_diffs: usize,
    /// Total changes.
    pub changes: usize,
    /// Node changes.
    pub nodes: usize,
    /// Relationship changes.
    pub relationships: usize,
    /// Created changes.
    pub created: usize,
    /// Updated changes.
    pub updated: usize,
    /// Deleted changes.
    pub deleted: usize,
    /// Lowest commit sequence in the file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_sequence: Option<u64>,
    /// Highest commit sequence in the file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sequence: Option<u64>,
    /// Node label counts (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<NameCount>>,
    /// Relationship type counts (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rel_types: Option<Vec<NameCount>>,
}

/// Occurrence count for one name.
#[derive(Debug, Serialize)]
pub struct NameCount {
    /// Label or relationship type.
    pub name: String,
    /// Occurrences across the file.
    pub count: usize,
}

/// Runs the inspect command.
pub fn run(path: &Path, show_labels: bool, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    let diffs: Vec<TransactionDiff> = serde_json::from_str(&text)?;

    let mut report = InspectReport {
        path: path.display().to_string(),
        diffs: diffs.len(),
        empty_diffs: 0,
        changes: 0,
        nodes: 0,
        relationships: 0,
        created: 0,
        updated: 0,
        deleted: 0,
        first_sequence: None,
        last_sequence: None,
        labels: None,
        rel_types: None,
    };
    let mut labels: BTreeMap<String, usize> = BTreeMap::new();
    let mut rel_types: BTreeMap<String, usize> = BTreeMap::new();

    for diff in &diffs {
        if diff.is_empty() {
            report.empty_diffs += 1;
        }
        let seq = diff.sequence.as_u64();
        report.first_sequence = Some(report.first_sequence.map_or(seq, |s| s.min(seq)));
        report.last_sequence = Some(report.last_sequence.map_or(seq, |s| s.max(seq)));

        report.changes += diff.change_count();
        report.nodes += diff.nodes.len();
        report.relationships += diff.relationships.len();

        for change in &diff.nodes {
            count_kind(&mut report, change.kind);
            for label in &change.labels {
                *labels.entry(label.clone()).or_insert(0) += 1;
            }
        }
        for change in &diff.relationships {
            count_kind(&mut report, change.kind);
            if !change.rel_type.is_empty() {
                *rel_types.entry(change.rel_type.clone()).or_insert(0) += 1;
            }
        }
    }

    if show_labels {
        report.labels = Some(into_counts(labels));
        report.rel_types = Some(into_counts(rel_types));
    }

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            print_text_output(&report);
        }
    }

    Ok(())
}

fn count_kind(report: &mut InspectReport, kind: ChangeKind) {
    match kind {
        ChangeKind::Created => report.created += 1,
        ChangeKind::Updated => report.updated += 1,
        ChangeKind::Deleted => report.deleted += 1,
    }
}

fn into_counts(map: BTreeMap<String, usize>) -> Vec<NameCount> {
    map.into_iter()
        .map(|(name, count)| NameCount { name, count })
        .collect()
}

fn print_text_output(report: &InspectReport) {
    println!("Diffcast Diff Inspection");
    println!("========================");
    println!();
    println!("Path:  {}", report.path);
    print!("Diffs: {}", report.diffs);
    if report.empty_diffs > 0 {
        print!(" ({} empty)", report.empty_diffs);
    }
    println!();
    if let (Some(first), Some(last)) = (report.first_sequence, report.last_sequence) {
        println!("Sequences: {} to {}", first, last);
    }
    println!();
    println!(
        "Changes: {} ({} nodes, {} relationships)",
        report.changes, report.nodes, report.relationships
    );
    println!("  Created: {}", report.created);
    println!("  Updated: {}", report.updated);
    println!("  Deleted: {}", report.deleted);

    if let Some(labels) = &report.labels {
        println!();
        println!("Labels:");
        for label in labels {
            println!("  {:<20} {}", label.name, label.count);
        }
    }
    if let Some(rel_types) = &report.rel_types {
        println!();
        println!("Relationship types:");
        for rel_type in rel_types {
            println!("  {:<20} {}", rel_type.name, rel_type.count);
        }
    }
}
