use crate::channel::ParentChannel;
use crate::event::{Arg, Event};
use crate::protocol::{Envelope, OutgoingMessage};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Suffix appended to a serialized argument cut at the cap
pub const TRUNCATION_MARKER: &str = "...[truncated]";

/// Replacement for an argument with no JSON form
pub const UNSERIALIZABLE_PLACEHOLDER: &str = "[Object - could not serialize]";

/// Formats events and posts them to the parent frame
///
/// Publishing never fails from the caller's point of view: formatting or
/// delivery problems are logged at debug level and dropped.
pub struct Publisher {
    channel: Arc<dyn ParentChannel>,
    sequence: AtomicU64,
    arg_cap: usize,
}

impl Publisher {
    pub fn new(channel: Arc<dyn ParentChannel>, arg_cap: usize) -> Self {
        Self {
            channel,
            sequence: AtomicU64::new(0),
            arg_cap,
        }
    }

    /// Stamp, sanitize and send an event as a `sandbox-log` message
    pub fn publish(&self, mut event: Event) {
        let now = now_millis();
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;

        event.id = format!("log_{}_{}", now, seq);
        event.timestamp = now;
        event.args = event.args.into_iter().map(|arg| sanitize_arg(arg, self.arg_cap)).collect();

        self.send(OutgoingMessage::SandboxLog(event));
    }

    /// Send any message to the parent frame
    pub fn send(&self, message: OutgoingMessage) {
        let kind = message.kind();
        if let Err(e) = self.channel.post_message(&Envelope::new(message)) {
            log::debug!("Dropped {} message: {}", kind, e);
        }
    }
}

/// Reduce an object argument to something safe to post
///
/// Objects whose JSON form exceeds `cap` characters become the first `cap`
/// characters followed by [`TRUNCATION_MARKER`]; objects with no JSON form
/// become [`UNSERIALIZABLE_PLACEHOLDER`]. Everything else passes through.
pub fn sanitize_arg(arg: Arg, cap: usize) -> Arg {
    match arg {
        Arg::Object(value) => match serde_json::to_string(&value) {
            Ok(json) if json.chars().count() > cap => {
                let mut truncated: String = json.chars().take(cap).collect();
                truncated.push_str(TRUNCATION_MARKER);
                Arg::Str(truncated)
            }
            Ok(_) => Arg::Object(value),
            Err(e) => {
                log::debug!("Could not serialize console argument: {}", e);
                Arg::Str(UNSERIALIZABLE_PLACEHOLDER.to_string())
            }
        },
        Arg::Opaque(_) => Arg::Str(UNSERIALIZABLE_PLACEHOLDER.to_string()),
        other => other,
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{DetachedChannel, MemoryChannel};
    use crate::event::{EventKind, EventSource, Level};
    use serde_json::json;
    use std::collections::HashSet;

    fn console_event(args: Vec<Arg>) -> Event {
        Event::new(EventSource::ClientConsole, Level::Log, EventKind::ConsoleCall, "test").with_args(args)
    }

    #[test]
    fn test_publish_stamps_id_and_time() {
        let channel = MemoryChannel::new();
        let publisher = Publisher::new(Arc::new(channel.clone()), 1000);

        publisher.publish(console_event(vec![]));

        let events = channel.events();
        assert_eq!(events.len(), 1);
        let id = events[0]["id"].as_str().unwrap();
        assert!(id.starts_with("log_"));
        assert!(id.ends_with("_1"));
        assert!(events[0]["timestamp"].as_u64().unwrap() > 0);
    }

    #[test]
    fn test_ids_unique_in_burst() {
        let channel = MemoryChannel::new();
        let publisher = Publisher::new(Arc::new(channel.clone()), 1000);

        for _ in 0..200 {
            publisher.publish(console_event(vec![]));
        }

        let ids: HashSet<String> = channel
            .events()
            .iter()
            .map(|e| e["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids.len(), 200);
    }

    #[test]
    fn test_large_object_truncated_to_cap() {
        let big = json!({ "payload": "x".repeat(5000) });
        let sanitized = sanitize_arg(Arg::Object(big), 1000);

        match sanitized {
            Arg::Str(s) => {
                assert!(s.ends_with(TRUNCATION_MARKER));
                assert_eq!(s.chars().count(), 1000 + TRUNCATION_MARKER.chars().count());
                assert!(s.starts_with("{\"payload\":\"xxx"));
            }
            other => panic!("Expected truncated string, got {:?}", other),
        }
    }

    #[test]
    fn test_cap_counts_characters() {
        let wide = json!(["é".repeat(20)]);
        match sanitize_arg(Arg::Object(wide), 10) {
            Arg::Str(s) => assert_eq!(s, format!("[\"{}{}", "é".repeat(8), TRUNCATION_MARKER)),
            other => panic!("Expected truncated string, got {:?}", other),
        }
    }

    #[test]
    fn test_small_object_kept_structured() {
        let small = json!({ "ship": "Aurora", "speed": 12 });
        assert_eq!(sanitize_arg(Arg::Object(small.clone()), 1000), Arg::Object(small));
    }

    #[test]
    fn test_object_exactly_at_cap_kept() {
        let value = json!("a".repeat(8));
        let arr = json!([value]);
        let len = serde_json::to_string(&arr).unwrap().len();
        assert_eq!(sanitize_arg(Arg::Object(arr.clone()), len), Arg::Object(arr));
    }

    #[test]
    fn test_opaque_object_replaced() {
        let sanitized = sanitize_arg(Arg::Opaque("[object Window]".into()), 1000);
        assert_eq!(sanitized, Arg::Str(UNSERIALIZABLE_PLACEHOLDER.to_string()));
    }

    #[test]
    fn test_primitives_untouched() {
        assert_eq!(sanitize_arg(Arg::from("x".repeat(2000)), 10), Arg::from("x".repeat(2000)));
        assert_eq!(sanitize_arg(Arg::Number(1.5), 1), Arg::Number(1.5));
        assert_eq!(sanitize_arg(Arg::Null, 1), Arg::Null);
    }

    #[test]
    fn test_send_failure_swallowed() {
        let publisher = Publisher::new(Arc::new(DetachedChannel), 1000);
        publisher.publish(console_event(vec![Arg::from("still fine")]));
        publisher.send(OutgoingMessage::BridgeReady);
    }
}
