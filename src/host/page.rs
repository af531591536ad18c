use crate::bridge::InitGuard;
use crate::dom::{Document, ElementNode, NodeId};
use crate::error::Result;
use crate::event::Arg;
use crate::host::location::Location;
use crate::host::network::{ScriptedFetch, ScriptedXhrFactory};
use crate::host::{
    ConsoleLevel, ConsoleMethod, ErrorHandler, ErrorReport, Fetch, FetchRequest, FetchResponse, History, LogConsole,
    NetworkError, Rejection, RejectionHandler, Xhr, XhrFactory,
};
use crate::lock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

pub type ErrorListener = Arc<dyn Fn(&ErrorReport) + Send + Sync>;
pub type RejectionListener = Arc<dyn Fn(&Rejection) + Send + Sync>;
pub type PopStateListener = Arc<dyn Fn() + Send + Sync>;
pub type MessageListener = Arc<dyn Fn(&serde_json::Value) + Send + Sync>;
pub type MutationCallback = Arc<dyn Fn(&[NodeId]) + Send + Sync>;
pub type DomListener = Arc<dyn Fn(&mut DomEvent) + Send + Sync>;

/// Pointer events the page dispatches to capturing listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomEventKind {
    PointerOver,
    Click,
}

/// A dispatched DOM event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomEvent {
    pub kind: DomEventKind,
    pub target: NodeId,
    default_prevented: bool,
    propagation_stopped: bool,
}

impl DomEvent {
    pub fn new(kind: DomEventKind, target: NodeId) -> Self {
        Self {
            kind,
            target,
            default_prevented: false,
            propagation_stopped: false,
        }
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

/// Handle returned when registering a DOM listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// A resource timing record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceEntry {
    pub name: String,
    pub duration: f64,
}

impl PerformanceEntry {
    pub fn new(name: impl Into<String>, duration: f64) -> Self {
        Self {
            name: name.into(),
            duration,
        }
    }
}

/// History that moves the page's location and nothing else
struct LocationHistory {
    location: Arc<Mutex<Location>>,
}

impl History for LocationHistory {
    fn push_state(&self, url: &str) -> Result<()> {
        lock(&self.location).navigate(url)
    }

    fn replace_state(&self, url: &str) -> Result<()> {
        lock(&self.location).navigate(url)
    }
}

/// A single page: its location, document and every observable global
///
/// Slots are read and replaced through explicit accessors. Callbacks are
/// always invoked after the slot's lock is released, so a callback may
/// freely call back into the page.
pub struct Page {
    location: Arc<Mutex<Location>>,
    document: Mutex<Document>,
    console: Mutex<HashMap<ConsoleLevel, Arc<dyn ConsoleMethod>>>,
    error_handler: Mutex<Option<Arc<dyn ErrorHandler>>>,
    rejection_handler: Mutex<Option<Arc<dyn RejectionHandler>>>,
    error_listeners: Mutex<Vec<ErrorListener>>,
    rejection_listeners: Mutex<Vec<RejectionListener>>,
    fetch: Mutex<Arc<dyn Fetch>>,
    xhr_factory: Mutex<Arc<dyn XhrFactory>>,
    history: Mutex<Arc<dyn History>>,
    popstate_listeners: Mutex<Vec<PopStateListener>>,
    dom_listeners: Mutex<Vec<(ListenerId, DomEventKind, DomListener)>>,
    next_listener_id: AtomicU64,
    mutation_observers: Mutex<Vec<MutationCallback>>,
    message_listeners: Mutex<Vec<MessageListener>>,
    framework_data: Mutex<Option<serde_json::Value>>,
    performance_entries: Mutex<Vec<PerformanceEntry>>,
    bridge_guard: InitGuard,
}

impl Page {
    /// Create a page at `url` with an empty document
    pub fn new(url: &str) -> Result<Self> {
        Self::with_document(url, Document::new())
    }

    /// Create a page at `url` showing `document`
    pub fn with_document(url: &str, document: Document) -> Result<Self> {
        let location = Arc::new(Mutex::new(Location::parse(url)?));
        let console: HashMap<ConsoleLevel, Arc<dyn ConsoleMethod>> = ConsoleLevel::ALL
            .iter()
            .map(|level| (*level, Arc::new(LogConsole { level: *level }) as Arc<dyn ConsoleMethod>))
            .collect();

        Ok(Self {
            history: Mutex::new(Arc::new(LocationHistory {
                location: location.clone(),
            })),
            location,
            document: Mutex::new(document),
            console: Mutex::new(console),
            error_handler: Mutex::new(None),
            rejection_handler: Mutex::new(None),
            error_listeners: Mutex::new(Vec::new()),
            rejection_listeners: Mutex::new(Vec::new()),
            fetch: Mutex::new(Arc::new(ScriptedFetch::new())),
            xhr_factory: Mutex::new(Arc::new(ScriptedXhrFactory::default())),
            popstate_listeners: Mutex::new(Vec::new()),
            dom_listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
            mutation_observers: Mutex::new(Vec::new()),
            message_listeners: Mutex::new(Vec::new()),
            framework_data: Mutex::new(None),
            performance_entries: Mutex::new(Vec::new()),
            bridge_guard: InitGuard::new(),
        })
    }

    /// The one-time bridge installation guard for this page
    pub fn bridge_guard(&self) -> &InitGuard {
        &self.bridge_guard
    }

    // ---- location ----

    pub fn location(&self) -> Location {
        lock(&self.location).clone()
    }

    pub fn href(&self) -> String {
        lock(&self.location).href().to_string()
    }

    // ---- document ----

    /// Run `f` against the document
    pub fn read_document<R>(&self, f: impl FnOnce(&Document) -> R) -> R {
        f(&lock(&self.document))
    }

    /// Run `f` against the document mutably; mutation observers are not notified
    pub fn write_document<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R {
        f(&mut lock(&self.document))
    }

    /// Insert a subtree and notify mutation observers when it lands inside the body
    pub fn append_child(&self, parent: NodeId, node: &ElementNode) -> Result<NodeId> {
        let (id, observed) = {
            let mut doc = lock(&self.document);
            let id = doc.append(parent, node)?;
            (id, is_in_body(&doc, parent))
        };
        if observed {
            self.notify_mutation(&[id]);
        }
        Ok(id)
    }

    /// Detach a subtree and notify mutation observers when it was inside the body
    pub fn remove_node(&self, node: NodeId) -> Result<()> {
        let observed = {
            let mut doc = lock(&self.document);
            let observed = doc.parent(node).is_some_and(|p| is_in_body(&doc, p));
            doc.remove(node)?;
            observed
        };
        if observed {
            self.notify_mutation(&[node]);
        }
        Ok(())
    }

    /// Watch child insertions and removals anywhere under the body
    pub fn observe_mutations(&self, callback: MutationCallback) {
        lock(&self.mutation_observers).push(callback);
    }

    fn notify_mutation(&self, nodes: &[NodeId]) {
        let observers = lock(&self.mutation_observers).clone();
        for observer in observers {
            observer(nodes);
        }
    }

    // ---- console ----

    pub fn console_method(&self, level: ConsoleLevel) -> Arc<dyn ConsoleMethod> {
        lock(&self.console)
            .get(&level)
            .cloned()
            .unwrap_or_else(|| Arc::new(LogConsole { level }))
    }

    pub fn set_console_method(&self, level: ConsoleLevel, method: Arc<dyn ConsoleMethod>) {
        lock(&self.console).insert(level, method);
    }

    /// Call the console method for `level`
    pub fn console(&self, level: ConsoleLevel, args: &[Arg]) {
        self.console_method(level).call(args);
    }

    // ---- errors ----

    pub fn error_handler(&self) -> Option<Arc<dyn ErrorHandler>> {
        lock(&self.error_handler).clone()
    }

    pub fn set_error_handler(&self, handler: Option<Arc<dyn ErrorHandler>>) {
        *lock(&self.error_handler) = handler;
    }

    pub fn add_error_listener(&self, listener: ErrorListener) {
        lock(&self.error_listeners).push(listener);
    }

    /// Report an uncaught error; returns what the error callback returned
    pub fn report_error(&self, report: &ErrorReport) -> bool {
        let handled = self.error_handler().is_some_and(|h| h.on_error(report));
        let listeners = lock(&self.error_listeners).clone();
        for listener in listeners {
            listener(report);
        }
        handled
    }

    pub fn rejection_handler(&self) -> Option<Arc<dyn RejectionHandler>> {
        lock(&self.rejection_handler).clone()
    }

    pub fn set_rejection_handler(&self, handler: Option<Arc<dyn RejectionHandler>>) {
        *lock(&self.rejection_handler) = handler;
    }

    pub fn add_rejection_listener(&self, listener: RejectionListener) {
        lock(&self.rejection_listeners).push(listener);
    }

    /// Report an unhandled promise rejection
    pub fn report_rejection(&self, rejection: &Rejection) {
        if let Some(handler) = self.rejection_handler() {
            handler.on_rejection(rejection);
        }
        let listeners = lock(&self.rejection_listeners).clone();
        for listener in listeners {
            listener(rejection);
        }
    }

    // ---- network ----

    pub fn fetch_primitive(&self) -> Arc<dyn Fetch> {
        lock(&self.fetch).clone()
    }

    pub fn set_fetch(&self, fetch: Arc<dyn Fetch>) {
        *lock(&self.fetch) = fetch;
    }

    /// Issue a request through the current fetch primitive
    pub async fn fetch(&self, request: FetchRequest) -> std::result::Result<FetchResponse, NetworkError> {
        let fetch = self.fetch_primitive();
        fetch.fetch(request).await
    }

    pub fn xhr_factory(&self) -> Arc<dyn XhrFactory> {
        lock(&self.xhr_factory).clone()
    }

    pub fn set_xhr_factory(&self, factory: Arc<dyn XhrFactory>) {
        *lock(&self.xhr_factory) = factory;
    }

    /// Construct a request object through the current constructor
    pub fn create_xhr(&self) -> Box<dyn Xhr> {
        self.xhr_factory().create()
    }

    // ---- history ----

    pub fn history(&self) -> Arc<dyn History> {
        lock(&self.history).clone()
    }

    pub fn set_history(&self, history: Arc<dyn History>) {
        *lock(&self.history) = history;
    }

    pub fn push_state(&self, url: &str) -> Result<()> {
        self.history().push_state(url)
    }

    pub fn replace_state(&self, url: &str) -> Result<()> {
        self.history().replace_state(url)
    }

    /// Back/forward navigation to `url`: moves the location, then fires pop-state listeners
    pub fn pop_state(&self, url: &str) -> Result<()> {
        lock(&self.location).navigate(url)?;
        let listeners = lock(&self.popstate_listeners).clone();
        for listener in listeners {
            listener();
        }
        Ok(())
    }

    pub fn add_popstate_listener(&self, listener: PopStateListener) {
        lock(&self.popstate_listeners).push(listener);
    }

    // ---- DOM events ----

    /// Register a capturing listener for `kind`
    pub fn add_capture_listener(&self, kind: DomEventKind, listener: DomListener) -> ListenerId {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.dom_listeners).push((id, kind, listener));
        id
    }

    /// Unregister a listener; returns whether it was registered
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = lock(&self.dom_listeners);
        let before = listeners.len();
        listeners.retain(|(lid, _, _)| *lid != id);
        listeners.len() != before
    }

    pub fn listener_count(&self, kind: DomEventKind) -> usize {
        lock(&self.dom_listeners).iter().filter(|(_, k, _)| *k == kind).count()
    }

    fn is_registered(&self, id: ListenerId) -> bool {
        lock(&self.dom_listeners).iter().any(|(lid, _, _)| *lid == id)
    }

    /// Dispatch a pointer event at `target` and return it for default-action checks
    ///
    /// Listeners removed by an earlier listener of the same dispatch are skipped.
    pub fn dispatch(&self, kind: DomEventKind, target: NodeId) -> DomEvent {
        let mut event = DomEvent::new(kind, target);
        let snapshot: Vec<(ListenerId, DomListener)> = lock(&self.dom_listeners)
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(id, _, l)| (*id, l.clone()))
            .collect();

        for (id, listener) in snapshot {
            if !self.is_registered(id) {
                continue;
            }
            listener(&mut event);
        }
        event
    }

    // ---- cross-frame messages ----

    pub fn add_message_listener(&self, listener: MessageListener) {
        lock(&self.message_listeners).push(listener);
    }

    /// Deliver a message posted by the parent frame
    pub fn receive_message(&self, data: &serde_json::Value) {
        let listeners = lock(&self.message_listeners).clone();
        for listener in listeners {
            listener(data);
        }
    }

    // ---- pre-existing state ----

    /// Framework-embedded page data (error object, page props)
    pub fn framework_data(&self) -> Option<serde_json::Value> {
        lock(&self.framework_data).clone()
    }

    pub fn set_framework_data(&self, data: Option<serde_json::Value>) {
        *lock(&self.framework_data) = data;
    }

    pub fn performance_entries(&self) -> Vec<PerformanceEntry> {
        lock(&self.performance_entries).clone()
    }

    pub fn add_performance_entry(&self, entry: PerformanceEntry) {
        lock(&self.performance_entries).push(entry);
    }
}

fn is_in_body(doc: &Document, node: NodeId) -> bool {
    let mut current = Some(node);
    while let Some(id) = current {
        if id == doc.body() {
            return doc.contains(id);
        }
        current = doc.parent(id);
    }
    false
}
