use crate::event::{Event, EventKind, EventSource, Level};
use crate::host::{Fetch, FetchRequest, FetchResponse, NetworkError, Xhr, XhrEvent, XhrFactory, XhrListener, XhrStatus};
use crate::lock;
use crate::publisher::Publisher;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Event message for a failure that carried no message of its own
const FETCH_FAILED_FALLBACK: &str = "Network request failed";

/// Fetch that reports failed statuses and network failures, passing every outcome through
pub struct ObservedFetch {
    previous: Arc<dyn Fetch>,
    publisher: Arc<Publisher>,
}

impl ObservedFetch {
    pub fn new(previous: Arc<dyn Fetch>, publisher: Arc<Publisher>) -> Self {
        Self { previous, publisher }
    }
}

#[async_trait]
impl Fetch for ObservedFetch {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, NetworkError> {
        let method = request.effective_method();
        let url = request.url.clone();

        match self.previous.fetch(request).await {
            Ok(response) => {
                if !response.ok() {
                    let event = Event::new(
                        EventSource::ClientFetch,
                        Level::Network,
                        EventKind::FetchError,
                        format!("{} {} {} {}", method, response.url, response.status, response.status_text),
                    )
                    .with_status(response.status)
                    .with_method(Some(method.clone()))
                    .with_url(Some(response.url.clone()))
                    .with_arg(format!("Network Error: {} {} returned {}", method, response.url, response.status));
                    self.publisher.publish(event);
                }
                Ok(response)
            }
            Err(error) => {
                let message = if error.message.is_empty() {
                    FETCH_FAILED_FALLBACK.to_string()
                } else {
                    error.message.clone()
                };
                let event = Event::new(EventSource::ClientFetch, Level::NetworkError, EventKind::FetchFailure, message)
                    .with_stack(error.stack.clone())
                    .with_method(Some(method.clone()))
                    .with_url(Some(url.clone()))
                    .with_arg(format!("Network Failed: {} {} - {}", method, url, error.message));
                self.publisher.publish(event);
                Err(error)
            }
        }
    }
}

/// Request-object constructor whose objects report failures
pub struct ObservedXhrFactory {
    previous: Arc<dyn XhrFactory>,
    publisher: Arc<Publisher>,
}

impl ObservedXhrFactory {
    pub fn new(previous: Arc<dyn XhrFactory>, publisher: Arc<Publisher>) -> Self {
        Self { previous, publisher }
    }
}

impl XhrFactory for ObservedXhrFactory {
    fn create(&self) -> Box<dyn Xhr> {
        Box::new(ObservedXhr::new(self.previous.create(), self.publisher.clone()))
    }
}

/// Wraps a request object, remembering what it was opened with
pub struct ObservedXhr {
    inner: Box<dyn Xhr>,
    target: Arc<Mutex<Option<(String, String)>>>,
}

impl ObservedXhr {
    fn new(mut inner: Box<dyn Xhr>, publisher: Arc<Publisher>) -> Self {
        let target: Arc<Mutex<Option<(String, String)>>> = Arc::default();
        let opened = target.clone();
        inner.add_event_listener(Box::new(move |event, status| {
            let (method, url) = lock(&opened).clone().unwrap_or_default();
            if let Some(event) = xhr_event(event, status, &method, &url) {
                publisher.publish(event);
            }
        }));
        Self { inner, target }
    }
}

fn xhr_event(event: XhrEvent, status: &XhrStatus, method: &str, url: &str) -> Option<Event> {
    match event {
        XhrEvent::Error => Some(
            Event::new(EventSource::ClientXhr, Level::NetworkError, EventKind::XhrError, "XMLHttpRequest failed")
                .with_method(Some(method.to_string()))
                .with_url(Some(url.to_string()))
                .with_arg(format!("XHR Failed: {} {}", method, url)),
        ),
        XhrEvent::Load if status.status >= 400 => Some(
            Event::new(
                EventSource::ClientXhr,
                Level::Network,
                EventKind::XhrStatusError,
                format!("{} {} {} {}", method, url, status.status, status.status_text),
            )
            .with_status(status.status)
            .with_method(Some(method.to_string()))
            .with_url(Some(url.to_string()))
            .with_arg(format!("Network Error: {} {} returned {}", method, url, status.status)),
        ),
        XhrEvent::Load => None,
    }
}

impl Xhr for ObservedXhr {
    fn open(&mut self, method: &str, url: &str) {
        *lock(&self.target) = Some((method.to_string(), url.to_string()));
        self.inner.open(method, url);
    }

    fn send(&mut self, body: Option<String>) {
        self.inner.send(body);
    }

    fn status(&self) -> u16 {
        self.inner.status()
    }

    fn status_text(&self) -> String {
        self.inner.status_text()
    }

    fn add_event_listener(&mut self, listener: XhrListener) {
        self.inner.add_event_listener(listener);
    }
}
