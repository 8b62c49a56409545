//! Decode command implementation.

use diffcast_model::{PropertyMap, PropertyValue};
use diffcast_wire::EventPayload;
use serde::Serialize;

/// A decoded payload ready for output.
#[derive(Debug, Serialize)]
pub struct DecodedEvent {
    /// Entity discriminant (`node` or `relationship`).
    pub entity: String,
    /// What happened to the entity.
    pub kind: String,
    /// Commit sequence of the owning transaction.
    pub sequence: u64,
    /// Entity ID; doubles as the record's partition key.
    pub id: String,
    /// Payload size in bytes.
    pub payload_bytes: usize,
    /// Node labels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    /// Relationship start node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    /// Relationship end node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    /// Relationship type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rel_type: Option<String>,
    /// Properties carried by the change.
    pub properties: PropertyMap,
}

/// Runs the decode command.
///
/// `input` is either hex text or `@path` naming a file of hex text.
pub fn run(input: &str, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let hex = if let Some(path) = input.strip_prefix('@') {
        std::fs::read_to_string(path)?
    } else {
        input.to_string()
    };

    let bytes = hex_decode(&hex)?;
    let payload = EventPayload::decode(&bytes)?;
    let event = describe(&payload, bytes.len());

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&event)?);
        }
        _ => {
            print_text_output(&event);
        }
    }

    Ok(())
}

fn describe(payload: &EventPayload, payload_bytes: usize) -> DecodedEvent {
    let mut event = DecodedEvent {
        entity: payload.entity_label().to_string(),
        kind: payload.kind().as_str().to_string(),
        sequence: payload.sequence().as_u64(),
        id: payload.entity_id().to_string(),
        payload_bytes,
        labels: None,
        start: None,
        end: None,
        rel_type: None,
        properties: PropertyMap::new(),
    };

    match payload {
        EventPayload::Node { change, .. } => {
            event.labels = Some(change.labels.clone());
            event.properties = change.properties.clone();
        }
        EventPayload::Relationship { change, .. } => {
            event.start = Some(change.start.to_string());
            event.end = Some(change.end.to_string());
            event.rel_type = Some(change.rel_type.clone());
            event.properties = change.properties.clone();
        }
    }

    event
}

fn hex_decode(text: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let text = text.trim();
    if !text.is_ascii() {
        return Err("hex payload contains non-ASCII characters".into());
    }
    if text.len() % 2 != 0 {
        return Err("hex payload has odd length".into());
    }
    (0..text.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&text[i..i + 2], 16)
                .map_err(|e| format!("invalid hex at byte {}: {}", i / 2, e).into())
        })
        .collect()
}

fn print_text_output(event: &DecodedEvent) {
    println!("Decoded Event");
    println!("=============");
    println!();
    println!("Entity:    {} ({})", event.entity, event.kind);
    println!("ID:        {}", event.id);
    println!("Sequence:  {}", event.sequence);
    println!("Payload:   {} bytes", event.payload_bytes);
    if let Some(labels) = &event.labels {
        if !labels.is_empty() {
            println!("Labels:    {}", labels.join(", "));
        }
    }
    if let (Some(start), Some(end)) = (&event.start, &event.end) {
        println!("Endpoints: {} -> {}", start, end);
    }
    if let Some(rel_type) = &event.rel_type {
        println!("Type:      {}", rel_type);
    }

    if !event.properties.is_empty() {
        println!();
        println!("Properties:");
        for (name, value) in &event.properties {
            println!("  {} = {}", name, render_value(value));
        }
    }
}

fn render_value(value: &PropertyValue) -> String {
    match value {
        PropertyValue::Null => "null".to_string(),
        PropertyValue::Bool(b) => b.to_string(),
        PropertyValue::Int(i) => i.to_string(),
        PropertyValue::Float(f) => f.to_string(),
        PropertyValue::Text(s) => format!("{:?}", s),
        PropertyValue::Bytes(b) => format!("{} bytes", b.len()),
        PropertyValue::List(items) => {
            let rendered: Vec<String> = items.iter().map(render_value).collect();
            format!("[{}]", rendered.join(", "))
        }
    }
}
