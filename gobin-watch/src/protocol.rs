//! Watchman JSON protocol: request builders and response/push decoding.
//!
//! Every request and every daemon message is one JSON value on one line.

use serde::Deserialize;
use serde_json::{json, Map, Value};

use gobin_core::{ChangeEvent, SubscriptionId};

use crate::error::WatchError;

/// Fields requested for every changed file.
pub const SUBSCRIBE_FIELDS: [&str; 5] = ["name", "type", "mode", "size", "exists"];

/// Directories never reported, neither their contents nor the entry itself.
pub const EXCLUDED_DIRS: [&str; 2] = [".git", ".idea"];

/// `watch-project` response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WatchProjectResponse {
    #[serde(default)]
    pub version: String,
    pub watch: String,
    #[serde(default)]
    pub relative_path: Option<String>,
    #[serde(default)]
    pub warning: Option<String>,
}

/// `subscribe` acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubscribeResponse {
    #[serde(default)]
    pub version: String,
    pub subscribe: String,
}

/// A line received after the subscription was acknowledged.
#[derive(Debug, Clone, PartialEq)]
pub enum DaemonMessage {
    Change(ChangeEvent),
    /// `state-enter` / `state-leave` notifications carry no file list.
    State { name: String, entering: bool },
    /// Unilateral log lines from the daemon.
    Log(String),
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub fn watch_project_request(dir: &str) -> Value {
    json!(["watch-project", dir])
}

/// Match everything, dotfiles included, except [`EXCLUDED_DIRS`].
pub fn match_expression() -> Value {
    let mut terms = vec![
        json!("allof"),
        json!(["match", "**/*", "wholename", { "includedotfiles": true }]),
    ];
    for dir in EXCLUDED_DIRS {
        terms.push(json!(["not", ["dirname", dir]]));
        terms.push(json!(["not", ["match", dir, "wholename"]]));
    }
    Value::Array(terms)
}

pub fn subscribe_request(
    watch_root: &str,
    subscription: &SubscriptionId,
    relative_root: Option<&str>,
) -> Value {
    let mut options = Map::new();
    options.insert("expression".to_string(), match_expression());
    options.insert("fields".to_string(), json!(SUBSCRIBE_FIELDS));
    if let Some(relative) = relative_root.filter(|r| !r.is_empty()) {
        options.insert("relative_root".to_string(), json!(relative));
    }
    json!(["subscribe", watch_root, subscription.as_str(), options])
}

/// Serialize a request as one newline-terminated line.
pub fn encode_line(request: &Value) -> Result<String, WatchError> {
    let mut line = serde_json::to_string(request)?;
    line.push('\n');
    Ok(line)
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

fn parse_object(line: &str) -> Result<Map<String, Value>, WatchError> {
    let value: Value = serde_json::from_str(line).map_err(|source| WatchError::Decode {
        line: line.to_string(),
        source,
    })?;
    let Value::Object(object) = value else {
        return Err(WatchError::Protocol(format!(
            "expected a JSON object, got {line:?}"
        )));
    };
    if let Some(error) = object.get("error") {
        let message = error.as_str().map(str::to_owned).unwrap_or_else(|| error.to_string());
        return Err(WatchError::Protocol(format!("daemon error: {message}")));
    }
    Ok(object)
}

fn from_object<T: serde::de::DeserializeOwned>(
    object: Map<String, Value>,
    line: &str,
) -> Result<T, WatchError> {
    serde_json::from_value(Value::Object(object)).map_err(|source| WatchError::Decode {
        line: line.to_string(),
        source,
    })
}

pub fn decode_watch_project(line: &str) -> Result<WatchProjectResponse, WatchError> {
    from_object(parse_object(line)?, line)
}

/// Decode the subscribe acknowledgement and check it names `expected`.
pub fn decode_subscribe(
    line: &str,
    expected: &SubscriptionId,
) -> Result<SubscribeResponse, WatchError> {
    let object = parse_object(line)?;
    if !object.contains_key("subscribe") {
        return Err(WatchError::Protocol(format!(
            "expected subscribe acknowledgement, got {line:?}"
        )));
    }
    let response: SubscribeResponse = from_object(object, line)?;
    if response.subscribe != expected.as_str() {
        return Err(WatchError::Protocol(format!(
            "subscribe acknowledged {:?}, requested {:?}",
            response.subscribe,
            expected.as_str()
        )));
    }
    Ok(response)
}

/// Classify one pushed line. Anything that is not bookkeeping must decode as
/// a change event.
pub fn decode_message(line: &str) -> Result<DaemonMessage, WatchError> {
    let object = parse_object(line)?;

    for (key, entering) in [("state-enter", true), ("state-leave", false)] {
        if let Some(name) = object.get(key) {
            return Ok(DaemonMessage::State {
                name: name.as_str().unwrap_or_default().to_string(),
                entering,
            });
        }
    }
    if !object.contains_key("files") {
        if let Some(log) = object.get("log") {
            return Ok(DaemonMessage::Log(
                log.as_str().map(str::to_owned).unwrap_or_else(|| log.to_string()),
            ));
        }
    }

    from_object(object, line).map(DaemonMessage::Change)
}
