//! Scripted network primitives
//!
//! Pages need a fetch and a request-object constructor even when nothing is
//! listening on the other side. These implementations answer from a fixed
//! route table, which is how the replay tool and the tests drive traffic.

use crate::host::{Fetch, FetchRequest, FetchResponse, NetworkError, Xhr, XhrEvent, XhrFactory, XhrListener, XhrStatus};
use crate::lock;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// How a scripted url answers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NetworkRoute {
    /// Respond with a status code
    Respond {
        status: u16,
        #[serde(default)]
        status_text: Option<String>,
        #[serde(default)]
        body: String,
    },
    /// Fail before any response
    Fail { error: String },
}

impl NetworkRoute {
    pub fn status(status: u16) -> Self {
        NetworkRoute::Respond {
            status,
            status_text: None,
            body: String::new(),
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        NetworkRoute::Fail { error: error.into() }
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "",
    }
}

fn lookup(routes: &HashMap<String, NetworkRoute>, url: &str) -> NetworkRoute {
    routes
        .get(url)
        .cloned()
        .unwrap_or_else(|| NetworkRoute::fail("Failed to fetch"))
}

/// Fetch answering from a route table; unknown urls fail
#[derive(Debug, Default)]
pub struct ScriptedFetch {
    routes: HashMap<String, NetworkRoute>,
    calls: Mutex<Vec<FetchRequest>>,
}

impl ScriptedFetch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_routes(routes: HashMap<String, NetworkRoute>) -> Self {
        Self {
            routes,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Builder method: add a route
    pub fn route(mut self, url: impl Into<String>, route: NetworkRoute) -> Self {
        self.routes.insert(url.into(), route);
        self
    }

    /// Requests received so far
    pub fn calls(&self) -> Vec<FetchRequest> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl Fetch for ScriptedFetch {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, NetworkError> {
        lock(&self.calls).push(request.clone());

        match lookup(&self.routes, &request.url) {
            NetworkRoute::Respond { status, status_text, body } => Ok(FetchResponse {
                url: request.url,
                status,
                status_text: status_text.unwrap_or_else(|| reason_phrase(status).to_string()),
                body,
            }),
            NetworkRoute::Fail { error } => Err(NetworkError {
                stack: Some(format!("TypeError: {}\n    at fetch ({})", error, request.url)),
                message: error,
            }),
        }
    }
}

/// Request-object constructor answering from a route table
#[derive(Debug, Default, Clone)]
pub struct ScriptedXhrFactory {
    routes: Arc<HashMap<String, NetworkRoute>>,
    opened: Arc<Mutex<Vec<(String, String)>>>,
}

impl ScriptedXhrFactory {
    pub fn new(routes: HashMap<String, NetworkRoute>) -> Self {
        Self {
            routes: Arc::new(routes),
            opened: Arc::default(),
        }
    }

    /// `(method, url)` pairs passed to `open`, across all created objects
    pub fn opened(&self) -> Vec<(String, String)> {
        lock(&self.opened).clone()
    }
}

impl XhrFactory for ScriptedXhrFactory {
    fn create(&self) -> Box<dyn Xhr> {
        Box::new(ScriptedXhr {
            routes: self.routes.clone(),
            opened: self.opened.clone(),
            url: None,
            state: XhrStatus::default(),
            listeners: Vec::new(),
        })
    }
}

/// A request object created by [`ScriptedXhrFactory`]
///
/// `send` completes synchronously and fires listeners before returning.
pub struct ScriptedXhr {
    routes: Arc<HashMap<String, NetworkRoute>>,
    opened: Arc<Mutex<Vec<(String, String)>>>,
    url: Option<String>,
    state: XhrStatus,
    listeners: Vec<XhrListener>,
}

impl ScriptedXhr {
    fn fire(&self, event: XhrEvent) {
        for listener in &self.listeners {
            listener(event, &self.state);
        }
    }
}

impl Xhr for ScriptedXhr {
    fn open(&mut self, method: &str, url: &str) {
        lock(&self.opened).push((method.to_string(), url.to_string()));
        self.url = Some(url.to_string());
    }

    fn send(&mut self, _body: Option<String>) {
        let Some(url) = self.url.clone() else {
            self.fire(XhrEvent::Error);
            return;
        };

        match lookup(&self.routes, &url) {
            NetworkRoute::Respond { status, status_text, .. } => {
                self.state = XhrStatus {
                    status,
                    status_text: status_text.unwrap_or_else(|| reason_phrase(status).to_string()),
                };
                self.fire(XhrEvent::Load);
            }
            NetworkRoute::Fail { .. } => {
                self.state = XhrStatus::default();
                self.fire(XhrEvent::Error);
            }
        }
    }

    fn status(&self) -> u16 {
        self.state.status
    }

    fn status_text(&self) -> String {
        self.state.status_text.clone()
    }

    fn add_event_listener(&mut self, listener: XhrListener) {
        self.listeners.push(listener);
    }
}
