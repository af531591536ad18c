use crate::config::BridgeConfig;
use crate::event::{Arg, Event, EventKind, EventSource, join_args};
use crate::host::{ConsoleLevel, ConsoleMethod};
use crate::publisher::Publisher;
use std::sync::Arc;

/// Console method that publishes each call, then hands it to the method it replaced
pub struct ChainedConsole {
    level: ConsoleLevel,
    previous: Arc<dyn ConsoleMethod>,
    publisher: Arc<Publisher>,
    config: Arc<BridgeConfig>,
}

impl ChainedConsole {
    pub fn new(
        level: ConsoleLevel,
        previous: Arc<dyn ConsoleMethod>,
        publisher: Arc<Publisher>,
        config: Arc<BridgeConfig>,
    ) -> Self {
        Self {
            level,
            previous,
            publisher,
            config,
        }
    }
}

impl ConsoleMethod for ChainedConsole {
    fn call(&self, args: &[Arg]) {
        let first = args.first().map(Arg::to_string).unwrap_or_default();

        if !self.config.is_noise(&first) {
            let event = Event::new(EventSource::ClientConsole, self.level.into(), EventKind::ConsoleCall, join_args(args))
                .with_args(args.to_vec())
                .chained();
            self.publisher.publish(event);
        }

        self.previous.call(args);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryChannel;
    use crate::lock;
    use crate::publisher::{TRUNCATION_MARKER, UNSERIALIZABLE_PLACEHOLDER};
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingConsole {
        calls: Mutex<Vec<Vec<Arg>>>,
    }

    impl ConsoleMethod for RecordingConsole {
        fn call(&self, args: &[Arg]) {
            lock(&self.calls).push(args.to_vec());
        }
    }

    fn chained(level: ConsoleLevel) -> (ChainedConsole, Arc<RecordingConsole>, MemoryChannel) {
        let channel = MemoryChannel::new();
        let previous = Arc::new(RecordingConsole::default());
        let publisher = Arc::new(Publisher::new(Arc::new(channel.clone()), 1000));
        let console = ChainedConsole::new(level, previous.clone(), publisher, Arc::new(BridgeConfig::default()));
        (console, previous, channel)
    }

    #[test]
    fn test_publishes_then_delegates() {
        let (console, previous, channel) = chained(ConsoleLevel::Warn);
        let args = vec![Arg::from("low fuel"), Arg::from(12_i64)];

        console.call(&args);

        let events = channel.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["level"], "warn");
        assert_eq!(events[0]["source"], "client-console");
        assert_eq!(events[0]["type"], "console-call");
        assert_eq!(events[0]["message"], "low fuel 12");
        assert_eq!(events[0]["interceptedBy"], "lasy-chain");
        assert_eq!(events[0]["args"], json!(["low fuel", 12.0]));

        let calls = previous.calls.lock().unwrap();
        assert_eq!(calls.as_slice(), &[args]);
    }

    #[test]
    fn test_noise_skips_publish_but_delegates() {
        let (console, previous, channel) = chained(ConsoleLevel::Log);

        console.call(&[Arg::from("[HMR] connected"), Arg::from(json!({"x": 1}))]);
        console.call(&[Arg::from("webpack compiled successfully")]);
        console.call(&[Arg::from("Lasy bridge error:"), Arg::from("boom")]);

        assert!(channel.events().is_empty());
        assert_eq!(previous.calls.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_noise_only_checks_first_argument() {
        let (console, _previous, channel) = chained(ConsoleLevel::Info);
        console.call(&[Arg::from("status"), Arg::from("HMR")]);
        assert_eq!(channel.events().len(), 1);
    }

    #[test]
    fn test_large_object_published_truncated_original_untouched() {
        let (console, previous, channel) = chained(ConsoleLevel::Error);
        let big = json!({ "track": "p".repeat(3000) });

        console.call(&[Arg::from(big.clone())]);

        let published = channel.events()[0]["args"][0].as_str().unwrap().to_string();
        assert!(published.ends_with(TRUNCATION_MARKER));
        assert_eq!(published.chars().count(), 1000 + TRUNCATION_MARKER.len());

        let calls = previous.calls.lock().unwrap();
        assert_eq!(calls[0], vec![Arg::Object(big)]);
    }

    #[test]
    fn test_unserializable_object_placeholder() {
        let (console, previous, channel) = chained(ConsoleLevel::Log);
        let window = Arg::Opaque("[object Window]".into());

        console.call(&[Arg::from("ctx"), window.clone()]);

        assert_eq!(channel.events()[0]["args"][1], UNSERIALIZABLE_PLACEHOLDER);
        assert_eq!(previous.calls.lock().unwrap()[0][1], window);
    }

    #[test]
    fn test_empty_call() {
        let (console, previous, channel) = chained(ConsoleLevel::Log);
        console.call(&[]);
        assert_eq!(channel.events()[0]["message"], "");
        assert_eq!(previous.calls.lock().unwrap().len(), 1);
    }
}
