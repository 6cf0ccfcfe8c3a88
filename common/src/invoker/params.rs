// Trigger payload flattening

use crate::models::{Parameter, VcsChanges};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const GIT_HASH: &str = "git.hash";
pub const GIT_BRANCH: &str = "git.branch";
pub const GIT_AUTHOR: &str = "git.author";

/// Flatten an arbitrary payload into string parameters sorted by name
///
/// Nested objects join their keys with `.`, array elements are indexed
/// (`items.0`), strings are taken verbatim, other scalars as JSON text and
/// `null` as an empty string.
pub fn flatten_payload(payload: &Map<String, Value>) -> Vec<Parameter> {
    let mut flat = BTreeMap::new();
    for (key, value) in payload {
        flatten_into(key.clone(), value, &mut flat);
    }

    flat.into_iter()
        .map(|(name, value)| Parameter::string(name, value))
        .collect()
}

fn flatten_into(prefix: String, value: &Value, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                flatten_into(format!("{}.{}", prefix, key), nested, out);
            }
        }
        Value::Array(items) => {
            for (index, nested) in items.iter().enumerate() {
                flatten_into(format!("{}.{}", prefix, index), nested, out);
            }
        }
        Value::String(s) => {
            out.insert(prefix, s.clone());
        }
        Value::Null => {
            out.insert(prefix, String::new());
        }
        other => {
            out.insert(prefix, other.to_string());
        }
    }
}

/// Collect the well-known VCS parameters; `params` keeps all of them
pub fn extract_vcs_changes(params: &[Parameter]) -> VcsChanges {
    let mut vcs = VcsChanges::default();

    for param in params {
        match param.name.as_str() {
            GIT_HASH => vcs.hash = Some(param.value.clone()),
            GIT_BRANCH => vcs.branch = Some(param.value.clone()),
            GIT_AUTHOR => vcs.author = Some(param.value.clone()),
            _ => {}
        }
    }

    vcs
}
