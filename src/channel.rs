//! Transport from the page to its parent frame
//!
//! Delivery is fire-and-forget: a channel either accepts a message or reports
//! an error, and the bridge never retries.

use crate::error::{BridgeError, Result};
use crate::lock;
use crate::protocol::Envelope;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// The page's native messaging primitive towards the hosting frame
pub trait ParentChannel: Send + Sync {
    fn post_message(&self, envelope: &Envelope) -> Result<()>;
}

/// Channel that keeps every posted envelope in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryChannel {
    messages: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every message posted so far, in order
    pub fn messages(&self) -> Vec<serde_json::Value> {
        lock(&self.messages).clone()
    }

    /// Messages of one `type`
    pub fn messages_of(&self, kind: &str) -> Vec<serde_json::Value> {
        self.messages()
            .into_iter()
            .filter(|m| m.get("type").and_then(|t| t.as_str()) == Some(kind))
            .collect()
    }

    /// Payloads of `sandbox-log` messages
    pub fn events(&self) -> Vec<serde_json::Value> {
        self.messages_of("sandbox-log")
            .into_iter()
            .filter_map(|mut m| m.get_mut("payload").map(serde_json::Value::take))
            .collect()
    }

    pub fn clear(&self) {
        lock(&self.messages).clear();
    }
}

impl ParentChannel for MemoryChannel {
    fn post_message(&self, envelope: &Envelope) -> Result<()> {
        let value = envelope.to_value()?;
        lock(&self.messages).push(value);
        Ok(())
    }
}

/// Channel that writes one JSON document per line
pub struct JsonLinesChannel<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesChannel<W> {
    pub fn new(writer: W) -> Self {
        Self { writer: Mutex::new(writer) }
    }
}

impl<W: Write + Send> ParentChannel for JsonLinesChannel<W> {
    fn post_message(&self, envelope: &Envelope) -> Result<()> {
        let line = serde_json::to_string(envelope)?;
        let mut writer = lock(&self.writer);
        writeln!(writer, "{}", line)
            .and_then(|_| writer.flush())
            .map_err(|e| BridgeError::Send(e.to_string()))
    }
}

/// Channel whose parent has gone away; every post fails
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedChannel;

impl ParentChannel for DetachedChannel {
    fn post_message(&self, _envelope: &Envelope) -> Result<()> {
        Err(BridgeError::ChannelClosed)
    }
}
