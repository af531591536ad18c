//! One-shot scan of problems that happened before the bridge was installed

use crate::event::{Arg, Event, EventKind, EventSource, Level};
use crate::host::{Page, PerformanceEntry};
use crate::publisher::Publisher;
use serde_json::Value;

const DEFAULT_ERROR_SOURCE: &str = "server";

/// Publish the framework's embedded error, suspicious resource timings and
/// an error page status. Missing data means nothing to report.
pub fn scan_existing_state(page: &Page, publisher: &Publisher) {
    let framework_data = page.framework_data();

    if let Some(event) = framework_data.as_ref().and_then(server_error_event) {
        publisher.publish(event);
    }

    for entry in page.performance_entries().iter().filter(|e| is_resource_issue(e)) {
        publisher.publish(resource_event(entry));
    }

    if let Some(event) = framework_data.as_ref().and_then(page_status_event) {
        publisher.publish(event);
    }
}

fn server_error_event(data: &Value) -> Option<Event> {
    let err = data.get("err").filter(|e| !e.is_null())?;
    let message = err.pointer("/message").map(value_text).unwrap_or_default();
    let stack = err.pointer("/stack").and_then(Value::as_str).map(str::to_string);
    let origin = err
        .pointer("/source")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_ERROR_SOURCE);

    Some(
        Event::new(EventSource::NextjsExisting, Level::Error, EventKind::ServerError, message.clone())
            .with_stack(stack)
            .with_arg(message)
            .with_error_source(origin),
    )
}

/// Best-effort match for favicon fetches and zero-duration remote loads
fn is_resource_issue(entry: &PerformanceEntry) -> bool {
    entry.name.contains("favicon")
        || entry.name.contains("ico")
        || (entry.duration == 0.0 && entry.name.contains("http"))
}

fn resource_event(entry: &PerformanceEntry) -> Event {
    let level = if entry.duration == 0.0 { Level::Warn } else { Level::Info };
    let duration = Arg::Number(entry.duration);

    Event::new(
        EventSource::PerformanceExisting,
        level,
        EventKind::NetworkPerformance,
        format!("Resource issue: {} (duration: {}ms)", entry.name, duration),
    )
    .with_arg(format!("Resource: {}", entry.name))
    .with_url(Some(entry.name.clone()))
    .with_duration(entry.duration)
}

fn page_status_event(data: &Value) -> Option<Event> {
    let code = data.pointer("/props/pageProps/statusCode").and_then(Value::as_u64)?;
    if code < 400 {
        return None;
    }
    let status = u16::try_from(code).ok()?;
    let level = if status >= 500 { Level::Error } else { Level::Warn };

    Some(
        Event::new(EventSource::PageExisting, level, EventKind::PageError, format!("Page error: HTTP {}", status))
            .with_arg(format!("HTTP {}", status))
            .with_status(status),
    )
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => Arg::from(other.clone()).to_string(),
    }
}
