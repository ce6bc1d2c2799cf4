use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::database::WebhookEvent;

/// Prints `{success, message, data}` in JSON mode, a check line plus the
/// pretty-printed data in text mode.
pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({ "success": true, "message": message });
            if let Some(data) = data {
                response["data"] = data;
            }
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
            if let Some(data) = data {
                println!("{}", serde_json::to_string_pretty(&data)?);
            }
        }
    }
    Ok(())
}

/// Reports a failure Keap answered with. JSON goes to stdout so scripts can
/// parse it; text goes to stderr.
pub fn output_error(output_format: &OutputFormat, message: &str, upstream_status: Option<u16>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let response = json!({
                "success": false,
                "error": message,
                "upstream_status": upstream_status,
            });
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => match upstream_status {
            Some(status) => eprintln!("Error ({}): {}", status, message),
            None => eprintln!("Error: {}", message),
        },
    }
    Ok(())
}

pub fn output_empty_collection(output_format: &OutputFormat, collection_name: &str, message: &str) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ collection_name: [] }))?);
        }
        OutputFormat::Text => println!("{}", message),
    }
    Ok(())
}

/// One webhook event per line in text mode, the full rows in JSON mode.
pub fn output_events(output_format: &OutputFormat, events: &[WebhookEvent]) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ "events": events }))?);
        }
        OutputFormat::Text => {
            for event in events {
                println!("{}", event_line(event));
            }
            println!("{} event(s)", events.len());
        }
    }
    Ok(())
}

fn event_line(event: &WebhookEvent) -> String {
    format!(
        "{:>8}  {}  {:<24} {}",
        event.id,
        event.received_at.format("%Y-%m-%d %H:%M:%S"),
        event.event_key.as_deref().unwrap_or("-"),
        event.object_type.as_deref().unwrap_or("-"),
    )
}
