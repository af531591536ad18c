//! The page the bridge is installed into
//!
//! Every browser global the bridge observes is a capability slot on [`Page`]
//! holding a trait object. Installing the bridge means reading the current
//! occupant of a slot and replacing it with a decorator that keeps the old one
//! as its delegate.

pub mod location;
pub mod network;
pub mod page;

pub use location::Location;
pub use network::{NetworkRoute, ScriptedFetch, ScriptedXhr, ScriptedXhrFactory};
pub use page::{
    DomEvent, DomEventKind, DomListener, ErrorListener, ListenerId, MessageListener, MutationCallback, Page,
    PerformanceEntry, PopStateListener, RejectionListener,
};

use crate::event::{Arg, Level};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The four console severities the bridge chains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Log,
    Info,
    Warn,
    Error,
}

impl ConsoleLevel {
    pub const ALL: [ConsoleLevel; 4] = [ConsoleLevel::Log, ConsoleLevel::Info, ConsoleLevel::Warn, ConsoleLevel::Error];
}

impl From<ConsoleLevel> for Level {
    fn from(level: ConsoleLevel) -> Self {
        match level {
            ConsoleLevel::Log => Level::Log,
            ConsoleLevel::Info => Level::Info,
            ConsoleLevel::Warn => Level::Warn,
            ConsoleLevel::Error => Level::Error,
        }
    }
}

/// One console method (`console.log`, `console.warn`, ...)
pub trait ConsoleMethod: Send + Sync {
    fn call(&self, args: &[Arg]);
}

/// Console method that writes through the `log` facade
#[derive(Debug, Clone, Copy)]
pub struct LogConsole {
    pub level: ConsoleLevel,
}

impl ConsoleMethod for LogConsole {
    fn call(&self, args: &[Arg]) {
        let line = crate::event::join_args(args);
        match self.level {
            ConsoleLevel::Log | ConsoleLevel::Info => log::info!(target: "page::console", "{}", line),
            ConsoleLevel::Warn => log::warn!(target: "page::console", "{}", line),
            ConsoleLevel::Error => log::error!(target: "page::console", "{}", line),
        }
    }
}

/// A thrown script error
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScriptError {
    pub message: String,
    #[serde(default)]
    pub stack: Option<String>,
}

impl ScriptError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

/// Arguments of the page-level synchronous error callback
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ErrorReport {
    pub message: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub column: Option<u32>,
    #[serde(default)]
    pub error: Option<ScriptError>,
}

impl ErrorReport {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn at(mut self, source: impl Into<String>, line: u32, column: u32) -> Self {
        self.source = Some(source.into());
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn with_error(mut self, error: ScriptError) -> Self {
        self.error = Some(error);
        self
    }
}

/// Page-level error callback; returns `true` when the error counts as handled
pub trait ErrorHandler: Send + Sync {
    fn on_error(&self, report: &ErrorReport) -> bool;
}

/// Why a promise was rejected
#[derive(Debug, Clone, PartialEq)]
pub enum RejectionReason {
    Error(ScriptError),
    Value(Arg),
}

impl RejectionReason {
    /// The error message, or the value's text
    pub fn message(&self) -> String {
        match self {
            RejectionReason::Error(e) => e.message.clone(),
            RejectionReason::Value(v) => v.to_string(),
        }
    }

    pub fn stack(&self) -> Option<String> {
        match self {
            RejectionReason::Error(e) => e.stack.clone(),
            RejectionReason::Value(_) => None,
        }
    }
}

/// An unhandled promise rejection
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub reason: RejectionReason,
}

impl Rejection {
    pub fn error(error: ScriptError) -> Self {
        Self {
            reason: RejectionReason::Error(error),
        }
    }

    pub fn value(value: impl Into<Arg>) -> Self {
        Self {
            reason: RejectionReason::Value(value.into()),
        }
    }
}

/// Page-level unhandled-rejection callback
pub trait RejectionHandler: Send + Sync {
    fn on_rejection(&self, rejection: &Rejection);
}

/// A fetch call's input
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FetchRequest {
    pub url: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Upper-cased method, `GET` when unset
    pub fn effective_method(&self) -> String {
        self.method.as_deref().unwrap_or("GET").to_ascii_uppercase()
    }
}

/// A settled fetch response
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FetchResponse {
    pub url: String,
    pub status: u16,
    #[serde(default)]
    pub status_text: String,
    #[serde(default)]
    pub body: String,
}

impl FetchResponse {
    /// Whether the status is in the success range
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A fetch that never produced a response
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct NetworkError {
    pub message: String,
    pub stack: Option<String>,
}

impl NetworkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }
}

/// The page's fetch primitive
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, NetworkError>;
}

/// Events a request object reports to its listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XhrEvent {
    Load,
    Error,
}

/// Status snapshot handed to request object listeners
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XhrStatus {
    pub status: u16,
    pub status_text: String,
}

pub type XhrListener = Box<dyn Fn(XhrEvent, &XhrStatus) + Send + Sync>;

/// A request object (`XMLHttpRequest` capability)
pub trait Xhr: Send {
    fn open(&mut self, method: &str, url: &str);
    fn send(&mut self, body: Option<String>);
    fn status(&self) -> u16;
    fn status_text(&self) -> String;
    fn add_event_listener(&mut self, listener: XhrListener);
}

/// Constructor of request objects
pub trait XhrFactory: Send + Sync {
    fn create(&self) -> Box<dyn Xhr>;
}

/// The programmatic half of the History API
pub trait History: Send + Sync {
    fn push_state(&self, url: &str) -> crate::error::Result<()>;
    fn replace_state(&self, url: &str) -> crate::error::Result<()>;
}
