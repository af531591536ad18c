use crate::event::{Event, EventKind, EventSource, Level};
use crate::host::{ErrorHandler, ErrorListener, ErrorReport, Rejection, RejectionHandler, RejectionListener};
use crate::publisher::Publisher;
use std::sync::Arc;

/// Error callback that publishes the error, then defers to the callback it replaced
pub struct ChainedErrorHandler {
    previous: Option<Arc<dyn ErrorHandler>>,
    publisher: Arc<Publisher>,
}

impl ChainedErrorHandler {
    pub fn new(previous: Option<Arc<dyn ErrorHandler>>, publisher: Arc<Publisher>) -> Self {
        Self { previous, publisher }
    }
}

impl ErrorHandler for ChainedErrorHandler {
    fn on_error(&self, report: &ErrorReport) -> bool {
        let event = Event::new(EventSource::GlobalError, Level::Error, EventKind::WindowOnerror, report.message.clone())
            .with_stack(report.error.as_ref().and_then(|e| e.stack.clone()))
            .with_url(report.source.clone())
            .with_position(report.line, report.column)
            .with_arg(report.message.clone())
            .chained();
        self.publisher.publish(event);

        match &self.previous {
            Some(previous) => previous.on_error(report),
            None => false,
        }
    }
}

/// Rejection callback that publishes the rejection, then defers to the callback it replaced
pub struct ChainedRejectionHandler {
    previous: Option<Arc<dyn RejectionHandler>>,
    publisher: Arc<Publisher>,
}

impl ChainedRejectionHandler {
    pub fn new(previous: Option<Arc<dyn RejectionHandler>>, publisher: Arc<Publisher>) -> Self {
        Self { previous, publisher }
    }
}

impl RejectionHandler for ChainedRejectionHandler {
    fn on_rejection(&self, rejection: &Rejection) {
        self.publisher.publish(rejection_event(
            rejection,
            EventSource::ClientPromise,
            EventKind::PromiseRejection,
        ));

        if let Some(previous) = &self.previous {
            previous.on_rejection(rejection);
        }
    }
}

fn rejection_event(rejection: &Rejection, source: EventSource, kind: EventKind) -> Event {
    let message = rejection.reason.message();
    Event::new(source, Level::Error, kind, message.clone())
        .with_stack(rejection.reason.stack())
        .with_arg(message)
        .chained()
}

/// Passive listener for error events
pub fn error_listener(publisher: Arc<Publisher>) -> ErrorListener {
    Arc::new(move |report: &ErrorReport| {
        let event = Event::new(EventSource::ClientError, Level::Error, EventKind::JavascriptError, report.message.clone())
            .with_stack(report.error.as_ref().and_then(|e| e.stack.clone()))
            .with_url(report.source.clone())
            .with_position(report.line, report.column)
            .with_arg(report.message.clone())
            .chained();
        publisher.publish(event);
    })
}

/// Passive listener for rejection events
pub fn rejection_listener(publisher: Arc<Publisher>) -> RejectionListener {
    Arc::new(move |rejection: &Rejection| {
        publisher.publish(rejection_event(
            rejection,
            EventSource::ClientPromiseListener,
            EventKind::PromiseRejectionListener,
        ));
    })
}
