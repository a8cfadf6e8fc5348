//! Artifact discovery.
//!
//! Three sources, in strict preference order:
//! 1. `executed` event payloads collected by the stream monitor,
//! 2. the history record fetched by the polling monitor,
//! 3. a modification-time scan of the output directory, tried only when
//!    a history record came back without containers.
//!
//! The directory scan backstops engines whose custom nodes write files
//! without recording them in history. A live stream that reported no
//! outputs resolves to no artifacts; stale files in the shared
//! directory stay untouched. The scan is capped and filtered to media
//! files so an unrelated dump of the shared directory can not balloon
//! the result envelope.

use std::time::SystemTime;

use camino::Utf8Path;
use serde_json::Value;
use tracing::{debug, warn};

use crate::artifact::{ArtifactDescriptor, ArtifactKind};
use crate::engine::Completion;
use crate::util::MAX_SCANNED_ARTIFACTS;

/// Turn a terminal payload into artifact descriptors.
pub fn resolve(completion: &Completion, output_dir: &Utf8Path) -> Vec<ArtifactDescriptor> {
    let mut found = Vec::new();

    for node_output in &completion.outputs {
        collect_containers(&node_output.output, &mut found);
    }

    // The scan sits behind the history channel only: a stream that
    // reported no outputs is a no-output run.
    if found.is_empty() {
        if let Some(history) = &completion.history {
            collect_history(history, &mut found);

            if found.is_empty() {
                match scan_output_dir(output_dir) {
                    Ok(scanned) => found = scanned,
                    Err(e) => {
                        warn!(error = %e, dir = %output_dir, "output directory scan failed")
                    }
                }
            }
        }
    }

    found
}

/// Walk one node's output payload: any field holding an array of objects
/// with a `filename` counts as an artifact container (`images`, `gifs`,
/// `videos`, whatever a custom node invents).
fn collect_containers(output: &Value, found: &mut Vec<ArtifactDescriptor>) {
    let Some(map) = output.as_object() else { return };
    for items in map.values() {
        let Some(items) = items.as_array() else { continue };
        for item in items {
            if let Some(descriptor) = descriptor_from_item(item) {
                found.push(descriptor);
            }
        }
    }
}

fn descriptor_from_item(item: &Value) -> Option<ArtifactDescriptor> {
    let filename = item.get("filename").and_then(Value::as_str)?;
    if filename.is_empty() {
        return None;
    }
    // Intermediate previews are marked type "temp" and never returned.
    if item.get("type").and_then(Value::as_str) == Some("temp") {
        debug!(filename, "skipping temp artifact");
        return None;
    }

    let subfolder = item.get("subfolder").and_then(Value::as_str).unwrap_or("");
    let format = item
        .get("format")
        .and_then(Value::as_str)
        .map(str::to_string);
    Some(ArtifactDescriptor::new(filename, subfolder, format))
}

fn collect_history(record: &Value, found: &mut Vec<ArtifactDescriptor>) {
    let Some(outputs) = record.get("outputs").and_then(Value::as_object) else {
        return;
    };
    for node_output in outputs.values() {
        collect_containers(node_output, found);
    }
}

fn scan_output_dir(dir: &Utf8Path) -> std::io::Result<Vec<ArtifactDescriptor>> {
    let mut entries: Vec<(SystemTime, ArtifactDescriptor)> = Vec::new();

    for entry in dir.read_dir_utf8()? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }

        let descriptor = ArtifactDescriptor::new(entry.file_name(), "", None);
        if descriptor.kind == ArtifactKind::Other {
            continue;
        }

        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        entries.push((modified, descriptor));
    }

    // Newest first, bounded.
    entries.sort_by(|a, b| b.0.cmp(&a.0));
    entries.truncate(MAX_SCANNED_ARTIFACTS);

    Ok(entries.into_iter().map(|(_, descriptor)| descriptor).collect())
}
