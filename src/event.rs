//! Structured events forwarded to the parent frame
//!
//! An [`Event`] is built by an interceptor or scanner with only the fields it
//! knows about; the publisher fills in `id` and `timestamp` and sanitizes the
//! arguments right before sending.

use serde::{Serialize, Serializer};
use std::fmt;

/// Marker attached to events produced by a chaining decorator
pub const INTERCEPTED_BY_CHAIN: &str = "lasy-chain";

/// Where an event was observed
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum EventSource {
    ClientConsole,
    GlobalError,
    ClientError,
    ClientPromise,
    ClientPromiseListener,
    ClientFetch,
    ClientXhr,
    ClientBridge,
    NextjsExisting,
    PerformanceExisting,
    PageExisting,
}

/// Severity of an event
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Level {
    Log,
    Info,
    Warn,
    Error,
    Network,
    NetworkError,
}

/// Sub-kind of an event, serialized as its `type` field
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    ConsoleCall,
    WindowOnerror,
    JavascriptError,
    PromiseRejection,
    PromiseRejectionListener,
    FetchError,
    FetchFailure,
    XhrError,
    XhrStatusError,
    ServerError,
    NetworkPerformance,
    PageError,
    BridgeInitialized,
}

/// A positional argument of a console call
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    /// A structured object or array
    Object(serde_json::Value),
    /// An object with no JSON form (cyclic graphs, host objects); holds its text rendering
    Opaque(String),
}

impl Arg {
    /// Whether the argument is a non-null object and therefore subject to sanitizing
    pub fn is_object(&self) -> bool {
        matches!(self, Arg::Object(_) | Arg::Opaque(_))
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Undefined => f.write_str("undefined"),
            Arg::Null => f.write_str("null"),
            Arg::Bool(b) => write!(f, "{}", b),
            Arg::Number(n) => f.write_str(&format_number(*n)),
            Arg::Str(s) => f.write_str(s),
            Arg::Object(value) => f.write_str(&object_text(value)),
            Arg::Opaque(text) => f.write_str(text),
        }
    }
}

/// Text rendering of a JSON value the way the page stringifies objects
fn object_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.as_f64().map(format_number).unwrap_or_else(|| n.to_string()),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items.iter().map(object_text).collect::<Vec<_>>().join(","),
        serde_json::Value::Object(_) => "[object Object]".to_string(),
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else {
        // f64 Display already drops a zero fraction
        format!("{}", n)
    }
}

impl Serialize for Arg {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Arg::Undefined | Arg::Null => serializer.serialize_none(),
            Arg::Bool(b) => serializer.serialize_bool(*b),
            Arg::Number(n) => serializer.serialize_f64(*n),
            Arg::Str(s) => serializer.serialize_str(s),
            Arg::Object(value) => value.serialize(serializer),
            Arg::Opaque(text) => serializer.serialize_str(text),
        }
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Str(s.to_string())
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::Str(s)
    }
}

impl From<bool> for Arg {
    fn from(b: bool) -> Self {
        Arg::Bool(b)
    }
}

impl From<f64> for Arg {
    fn from(n: f64) -> Self {
        Arg::Number(n)
    }
}

impl From<i64> for Arg {
    fn from(n: i64) -> Self {
        Arg::Number(n as f64)
    }
}

impl From<serde_json::Value> for Arg {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Arg::Null,
            serde_json::Value::Bool(b) => Arg::Bool(b),
            serde_json::Value::Number(n) => Arg::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Arg::Str(s),
            other => Arg::Object(other),
        }
    }
}

/// Join arguments the way a console line renders them
pub fn join_args(args: &[Arg]) -> String {
    args.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(" ")
}

/// A unit of communication to the parent frame
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Unique id, assigned on publish
    pub id: String,

    /// Capture time in milliseconds since the epoch, assigned on publish
    pub timestamp: u64,

    pub source: EventSource,

    pub level: Level,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// Positional arguments, sanitized on publish
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Arg>,

    #[serde(rename = "type")]
    pub kind: EventKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub intercepted_by: Option<String>,

    /// Resource timing in milliseconds (performance entries only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,

    /// Origin reported by the framework for a pre-existing error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_source: Option<String>,
}

impl Event {
    /// Create a draft event; `id` and `timestamp` are filled in by the publisher
    pub fn new(source: EventSource, level: Level, kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            timestamp: 0,
            source,
            level,
            message: message.into(),
            stack: None,
            url: None,
            line: None,
            column: None,
            status: None,
            method: None,
            args: Vec::new(),
            kind,
            intercepted_by: None,
            duration: None,
            error_source: None,
        }
    }

    /// Builder method: set positional arguments
    pub fn with_args(mut self, args: Vec<Arg>) -> Self {
        self.args = args;
        self
    }

    /// Builder method: set a single text argument
    pub fn with_arg(mut self, arg: impl Into<Arg>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Builder method: set the stack trace
    pub fn with_stack(mut self, stack: Option<String>) -> Self {
        self.stack = stack;
        self
    }

    /// Builder method: set the url
    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.url = url;
        self
    }

    /// Builder method: set line and column
    pub fn with_position(mut self, line: Option<u32>, column: Option<u32>) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    /// Builder method: set the HTTP status
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Builder method: set the HTTP method
    pub fn with_method(mut self, method: Option<String>) -> Self {
        self.method = method;
        self
    }

    /// Builder method: mark the event as produced by a chaining decorator
    pub fn chained(mut self) -> Self {
        self.intercepted_by = Some(INTERCEPTED_BY_CHAIN.to_string());
        self
    }

    /// Builder method: set the resource duration
    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Builder method: set the framework error origin
    pub fn with_error_source(mut self, origin: impl Into<String>) -> Self {
        self.error_source = Some(origin.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_arg_display() {
        assert_eq!(Arg::Undefined.to_string(), "undefined");
        assert_eq!(Arg::Null.to_string(), "null");
        assert_eq!(Arg::from(3.0).to_string(), "3");
        assert_eq!(Arg::from(2.5).to_string(), "2.5");
        assert_eq!(Arg::Number(f64::NAN).to_string(), "NaN");
        assert_eq!(Arg::from(json!({"a": 1})).to_string(), "[object Object]");
        assert_eq!(Arg::from(json!([1, "b", [2, 3]])).to_string(), "1,b,2,3");
        assert_eq!(Arg::Opaque("[object Window]".into()).to_string(), "[object Window]");
    }

    #[test]
    fn test_arg_from_value() {
        assert_eq!(Arg::from(json!(null)), Arg::Null);
        assert_eq!(Arg::from(json!("x")), Arg::Str("x".into()));
        assert!(Arg::from(json!({"k": true})).is_object());
        assert!(!Arg::from(json!(true)).is_object());
    }

    #[test]
    fn test_join_args() {
        let args = vec![Arg::from("saved"), Arg::from(2_i64), Arg::from(json!({"id": 1}))];
        assert_eq!(join_args(&args), "saved 2 [object Object]");
    }

    #[test]
    fn test_event_serialization_shape() {
        let event = Event::new(EventSource::ClientFetch, Level::NetworkError, EventKind::FetchFailure, "offline")
            .with_method(Some("GET".into()))
            .with_url(Some("/api".into()))
            .with_arg("Network Failed: GET /api - offline");

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["source"], "client-fetch");
        assert_eq!(value["level"], "network-error");
        assert_eq!(value["type"], "fetch-failure");
        assert_eq!(value["method"], "GET");
        assert!(value.get("stack").is_none());
        assert!(value.get("interceptedBy").is_none());
    }

    #[test]
    fn test_chained_marker() {
        let event = Event::new(EventSource::GlobalError, Level::Error, EventKind::WindowOnerror, "boom").chained();
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["interceptedBy"], "lasy-chain");
    }
}
