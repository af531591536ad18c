//! Wire format between the bridge and the hosting frame
//!
//! Every outgoing message is wrapped in an [`Envelope`] whose `__lasy` field is
//! always `true`, letting the parent tell bridge traffic apart from any other
//! cross-frame messages.

use crate::dom::ElementInfo;
use crate::event::Event;
use serde::{Deserialize, Serialize};

/// Incoming message type that drives the element selector
pub const ELEMENT_SELECTOR_COMMAND: &str = "lasy-element-selector";

/// Scan method reported with discovered routes
pub const SCAN_METHOD_DOM_LINKS: &str = "dom-links";

/// A message sent to the parent frame
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum OutgoingMessage {
    /// The bridge finished installing
    #[serde(rename = "lasy-bridge-ready")]
    BridgeReady,

    /// An observed console, error or network event
    #[serde(rename = "sandbox-log")]
    SandboxLog(Event),

    /// Result of a pick interaction
    #[serde(rename = "element-selected")]
    ElementSelected(ElementSelection),

    /// The page navigated
    #[serde(rename = "url-change")]
    UrlChange(UrlChange),

    /// The link crawler found routes the parent has not seen yet
    #[serde(rename = "routes-discovered")]
    RoutesDiscovered(RoutesDiscovered),
}

impl OutgoingMessage {
    /// The `type` tag as it appears on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            OutgoingMessage::BridgeReady => "lasy-bridge-ready",
            OutgoingMessage::SandboxLog(_) => "sandbox-log",
            OutgoingMessage::ElementSelected(_) => "element-selected",
            OutgoingMessage::UrlChange(_) => "url-change",
            OutgoingMessage::RoutesDiscovered(_) => "routes-discovered",
        }
    }
}

/// Outgoing wrapper carrying the bridge discriminator
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Envelope {
    #[serde(rename = "__lasy")]
    pub marker: bool,

    #[serde(flatten)]
    pub message: OutgoingMessage,
}

impl Envelope {
    pub fn new(message: OutgoingMessage) -> Self {
        Self { marker: true, message }
    }

    /// Render the envelope as the JSON value posted to the parent
    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ElementSelection {
    pub selector: String,
    pub element_info: ElementInfo,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UrlChange {
    pub full_url: String,
    pub pathname: String,
    pub search: String,
    pub hash: String,
    pub discovered_routes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoutesDiscovered {
    pub all_routes: Vec<String>,
    pub new_routes: Vec<String>,
    pub source: String,
    pub scan_method: String,
}

/// What the parent asks the element selector to do
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SelectorAction {
    Activate,
    Deactivate,
}

/// A recognised command from the parent frame
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum IncomingCommand {
    #[serde(rename = "lasy-element-selector")]
    ElementSelector { action: SelectorAction },
}

impl IncomingCommand {
    /// Parse a message received from the parent; anything unrecognised yields `None`
    pub fn parse(data: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(data.clone()).ok()
    }
}
