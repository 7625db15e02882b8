//! Endpoint descriptors and payload normalization

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use super::EndpointError;

/// Category used when an entry names none
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Category used for user-added entries that name none
pub const CUSTOM_CATEGORY: &str = "Custom";

/// One callable HTTP route of the request builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDescriptor {
    pub id: String,
    pub method: String,
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub parameters: Vec<EndpointParameter>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_example: Option<Value>,
    #[serde(default)]
    pub requires_auth: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_custom: bool,
}

/// A documented request parameter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointParameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: String,
    #[serde(rename = "type")]
    pub param_type: String,
    pub required: bool,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
}

/// The accepted wire shapes of an endpoint listing
#[derive(Debug, Clone, PartialEq)]
pub enum EndpointPayload {
    /// `[{...}, {...}]`
    List(Vec<Value>),
    /// `{"endpoints": [{...}]}`
    Wrapped(Vec<Value>),
    /// `{"Users": [{...}], "Flows": [{...}]}`
    Categorized(Vec<(String, Vec<Value>)>),
}

impl EndpointPayload {
    /// Detect the shape of a raw listing
    ///
    /// In strict mode only the wrapped shape is accepted.
    pub fn detect(value: Value, strict: bool) -> Result<Self, EndpointError> {
        match value {
            Value::Object(mut map) if map.contains_key("endpoints") => match map.remove("endpoints") {
                Some(Value::Array(items)) => Ok(EndpointPayload::Wrapped(items)),
                _ => Err(EndpointError::InvalidFormat("'endpoints' must be an array".into())),
            },
            _ if strict => Err(EndpointError::InvalidFormat(
                "expected an object with an 'endpoints' array".into(),
            )),
            Value::Array(items) => Ok(EndpointPayload::List(items)),
            Value::Object(map) => Ok(EndpointPayload::Categorized(categorized(map))),
            other => Err(EndpointError::InvalidFormat(format!(
                "expected an array or object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Normalize every entry, dropping the ones without a path
    pub fn normalize(self) -> Vec<EndpointDescriptor> {
        match self {
            EndpointPayload::List(items) | EndpointPayload::Wrapped(items) => items
                .iter()
                .filter_map(|item| normalize_endpoint(item, UNCATEGORIZED))
                .collect(),
            EndpointPayload::Categorized(groups) => groups
                .iter()
                .flat_map(|(category, items)| items.iter().filter_map(move |item| normalize_endpoint(item, category)))
                .collect(),
        }
    }
}

fn categorized(map: Map<String, Value>) -> Vec<(String, Vec<Value>)> {
    map.into_iter()
        .filter_map(|(category, items)| match items {
            Value::Array(items) => Some((category, items)),
            other => {
                warn!(%category, kind = json_kind(&other), "Skipping non-array endpoint category");
                None
            }
        })
        .collect()
}

/// Detect the shape of `value` and normalize it into descriptors
pub fn process_endpoints(value: Value, strict: bool) -> Result<Vec<EndpointDescriptor>, EndpointError> {
    Ok(EndpointPayload::detect(value, strict)?.normalize())
}

/// Normalize one raw entry
///
/// Returns `None` (with a warning) when the entry is not an object or has no
/// `path`, `url` or `endpoint` field.
pub fn normalize_endpoint(raw: &Value, default_category: &str) -> Option<EndpointDescriptor> {
    let Some(obj) = raw.as_object() else {
        warn!(kind = json_kind(raw), "Dropping endpoint entry that is not an object");
        return None;
    };

    let Some(path) = ["path", "url", "endpoint"].iter().find_map(|k| non_empty_str(obj, k)) else {
        warn!(entry = %raw, "Dropping endpoint without path, url or endpoint");
        return None;
    };

    let method = non_empty_str(obj, "method")
        .map(|m| m.to_ascii_uppercase())
        .unwrap_or_else(|| "GET".to_string());

    let id = match obj.get("id") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => format!("{}:{}", method, path),
    };

    Some(EndpointDescriptor {
        id,
        name: non_empty_str(obj, "name").unwrap_or_else(|| path.clone()),
        description: non_empty_str(obj, "description").unwrap_or_default(),
        category: non_empty_str(obj, "category").unwrap_or_else(|| default_category.to_string()),
        parameters: parameters(obj),
        headers: headers(obj),
        request_body: field(obj, &["requestBody", "request_body", "body"]),
        response_example: field(obj, &["responseExample", "response_example"]),
        requires_auth: ["requiresAuth", "requires_auth"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_bool))
            .unwrap_or(false),
        tags: tags(obj),
        is_custom: obj.get("isCustom").and_then(Value::as_bool).unwrap_or(false),
        method,
        path,
    })
}

fn non_empty_str(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn field(obj: &Map<String, Value>, keys: &[&str]) -> Option<Value> {
    keys.iter()
        .find_map(|k| obj.get(*k))
        .filter(|v| !v.is_null())
        .cloned()
}

fn parameters(obj: &Map<String, Value>) -> Vec<EndpointParameter> {
    let Some(items) = obj.get("parameters").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match serde_json::from_value(item.clone()) {
            Ok(param) => Some(param),
            Err(e) => {
                warn!(error = %e, "Dropping malformed endpoint parameter");
                None
            }
        })
        .collect()
}

fn headers(obj: &Map<String, Value>) -> BTreeMap<String, String> {
    let Some(map) = obj.get("headers").and_then(Value::as_object) else {
        return BTreeMap::new();
    };
    map.iter()
        .map(|(k, v)| {
            let value = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), value)
        })
        .collect()
}

fn tags(obj: &Map<String, Value>) -> Vec<String> {
    obj.get("tags")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Group descriptors by category, sorted by category name
pub fn group_by_category(endpoints: &[EndpointDescriptor]) -> BTreeMap<String, Vec<EndpointDescriptor>> {
    let mut groups: BTreeMap<String, Vec<EndpointDescriptor>> = BTreeMap::new();
    for endpoint in endpoints {
        groups.entry(endpoint.category.clone()).or_default().push(endpoint.clone());
    }
    groups
}
