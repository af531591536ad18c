//! # sandbox-bridge
//!
//! An in-page bridge for sandboxed preview frames. Installed once into a page, it
//! forwards what happens inside the page to the hosting (parent) frame.
//!
//! ## Features
//!
//! - **Console & Error Forwarding**: Every console call, uncaught error and unhandled rejection is published, then handed to whatever handled it before
//! - **Network Failure Reporting**: Failed fetches and request objects are reported without changing what the page sees
//! - **Existing-State Scan**: Framework errors, error pages and suspicious resource timings present before install are reported once
//! - **Element Picker**: The parent can switch on a hover-and-click picker that reports a CSS-like selector for the chosen element
//! - **Route Discovery**: URL changes and the internal routes linked from the page are reported as the user navigates
//!
//! ## Installing the Bridge
//!
//! ```rust,no_run
//! use sandbox_bridge::{Bridge, BridgeConfig, MemoryChannel, Page};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> sandbox_bridge::Result<()> {
//! let page = Arc::new(Page::new("http://localhost:3000/")?);
//! let channel = MemoryChannel::new();
//!
//! Bridge::install(&page, BridgeConfig::default(), Arc::new(channel.clone()))?;
//!
//! // Console calls now reach the parent as `sandbox-log` messages
//! page.console(sandbox_bridge::host::ConsoleLevel::Warn, &[sandbox_bridge::Arg::from("low fuel")]);
//! assert_eq!(channel.events().len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Driving the Element Picker
//!
//! The parent frame controls the picker with
//! `{"type": "lasy-element-selector", "action": "activate" | "deactivate"}`:
//!
//! ```rust,no_run
//! # use sandbox_bridge::{Bridge, BridgeConfig, MemoryChannel, Page};
//! # use sandbox_bridge::host::DomEventKind;
//! # use std::sync::Arc;
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> sandbox_bridge::Result<()> {
//! # let page = Arc::new(Page::new("http://localhost:3000/")?);
//! # let channel = MemoryChannel::new();
//! # Bridge::install(&page, BridgeConfig::default(), Arc::new(channel.clone()))?;
//! page.receive_message(&serde_json::json!({"type": "lasy-element-selector", "action": "activate"}));
//!
//! let body = page.read_document(|doc| doc.body());
//! page.dispatch(DomEventKind::Click, body);
//!
//! assert_eq!(channel.messages_of("element-selected").len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - [`bridge`]: Installation and the one-time guard
//! - [`host`]: The page model and its capability slots
//! - [`intercept`]: Decorators chained in front of console, error, rejection and network slots
//! - [`scanner`]: Pre-existing state scan
//! - [`picker`]: Element picker
//! - [`tracker`]: URL change and route discovery
//! - [`publisher`] / [`channel`] / [`protocol`]: Formatting and delivery to the parent frame
//! - [`dom`]: Document tree and selector generation
//! - [`error`]: Error types and result aliases

pub mod bridge;
pub mod channel;
pub mod config;
pub mod dom;
pub mod error;
pub mod event;
pub mod host;
pub mod intercept;
pub mod picker;
pub mod protocol;
pub mod publisher;
pub mod scanner;
pub mod schedule;
pub mod tracker;

pub use bridge::{Bridge, InitGuard};
pub use channel::{DetachedChannel, JsonLinesChannel, MemoryChannel, ParentChannel};
pub use config::BridgeConfig;
pub use dom::{Document, ElementInfo, ElementNode, NodeId};
pub use error::{BridgeError, Result};
pub use event::{Arg, Event, EventKind, EventSource, Level};
pub use host::Page;
pub use picker::ElementPicker;
pub use protocol::{Envelope, IncomingCommand, OutgoingMessage};
pub use publisher::Publisher;
pub use tracker::NavigationTracker;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a previous holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
