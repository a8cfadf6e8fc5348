//! Workflow normalization.
//!
//! Callers hand us graphs in several shapes: the engine's API format (a
//! map keyed by node id), UI exports (`{"nodes": [...], "links": [...]}`),
//! a list of node objects, or wrapper objects some tools emit
//! (`{"graph": ...}`, `{"workflow": [...]}`). Everything funnels into the
//! keyed canonical [`Graph`]. Normalization is pure and idempotent: the
//! canonical form normalizes to itself.

use rustc_hash::FxHashMap;
use serde_json::{Map, Value};

use crate::error::{FerryError, Result};
use crate::workflow::{Graph, Node};

/// Normalize any accepted workflow shape into a canonical [`Graph`].
pub fn normalize(raw: &Value) -> Result<Graph> {
    let graph = match raw {
        Value::Array(items) => from_node_list(items)?,
        Value::Object(map) => {
            if let Some(inner) = unwrap_wrapper(map) {
                return normalize(inner);
            }
            from_keyed_map(map)?
        }
        other => {
            return Err(FerryError::MalformedWorkflow {
                details: format!("workflow must be an object or a list, got {other}"),
            })
        }
    };

    if graph.is_empty() {
        return Err(FerryError::EmptyGraph);
    }
    Ok(graph)
}

/// Peel one wrapper layer, if present.
///
/// A keyed map could legitimately contain a node whose id is `graph`, so
/// an object under that key only counts as a wrapper when it does not
/// itself look like a node.
fn unwrap_wrapper(map: &Map<String, Value>) -> Option<&Value> {
    if let Some(nodes @ Value::Array(_)) = map.get("nodes") {
        return Some(nodes);
    }
    if let Some(graph) = map.get("graph") {
        match graph {
            Value::Array(_) => return Some(graph),
            Value::Object(inner) if !inner.contains_key("class_type") => return Some(graph),
            _ => {}
        }
    }
    if let Some(workflow @ Value::Array(_)) = map.get("workflow") {
        return Some(workflow);
    }
    None
}

/// Engine-native shape: `{"<id>": {"class_type": ..., "inputs": {...}}}`.
///
/// Unknown node fields (`_meta` and friends) ride along untouched.
fn from_keyed_map(map: &Map<String, Value>) -> Result<Graph> {
    let mut nodes = FxHashMap::default();
    for (id, raw) in map {
        let fields = raw.as_object().ok_or_else(|| FerryError::NodeSchema {
            node: id.clone(),
            reason: "not an object".to_string(),
        })?;

        let class_type = required_class_type(id, fields, false)?;
        let inputs = match fields.get("inputs") {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(Value::Object(inputs)) => Value::Object(inputs.clone()),
            Some(_) => {
                return Err(FerryError::NodeSchema {
                    node: id.clone(),
                    reason: "'inputs' must be an object".to_string(),
                })
            }
        };

        let extra: Map<String, Value> = fields
            .iter()
            .filter(|(key, _)| key.as_str() != "class_type" && key.as_str() != "inputs")
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        nodes.insert(
            id.clone(),
            Node {
                class_type,
                inputs,
                extra,
            },
        );
    }
    Ok(Graph(nodes))
}

/// Legacy/export shape: a list of node objects.
///
/// Ids come from each node's `id` field, falling back to the list index.
/// Export-style decoration (positions, link slots, widget state) is
/// dropped; only `class_type` and object-shaped `inputs` survive.
fn from_node_list(items: &[Value]) -> Result<Graph> {
    let mut nodes = FxHashMap::default();
    for (index, raw) in items.iter().enumerate() {
        let fallback = index.to_string();
        let fields = raw.as_object().ok_or_else(|| FerryError::NodeSchema {
            node: fallback.clone(),
            reason: "not an object".to_string(),
        })?;

        let id = list_node_id(fields).unwrap_or(fallback);
        let class_type = required_class_type(&id, fields, true)?;
        let inputs = match fields.get("inputs") {
            Some(Value::Object(inputs)) => Value::Object(inputs.clone()),
            _ => Value::Object(Map::new()),
        };

        let previous = nodes.insert(id.clone(), Node::new(class_type, inputs));
        if previous.is_some() {
            return Err(FerryError::NodeSchema {
                node: id,
                reason: "duplicate node id".to_string(),
            });
        }
    }
    Ok(Graph(nodes))
}

fn list_node_id(fields: &Map<String, Value>) -> Option<String> {
    match fields.get("id") {
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Extract the operation type. List-shaped nodes may spell it `type`.
fn required_class_type(
    id: &str,
    fields: &Map<String, Value>,
    allow_type_alias: bool,
) -> Result<String> {
    let candidate = fields.get("class_type").or_else(|| {
        if allow_type_alias {
            fields.get("type")
        } else {
            None
        }
    });

    match candidate {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => Err(FerryError::NodeSchema {
            node: id.to_string(),
            reason: "'class_type' is empty".to_string(),
        }),
        Some(_) => Err(FerryError::NodeSchema {
            node: id.to_string(),
            reason: "'class_type' must be a string".to_string(),
        }),
        None => Err(FerryError::NodeSchema {
            node: id.to_string(),
            reason: "missing 'class_type'".to_string(),
        }),
    }
}
