//! Interactive element picker driven by the parent frame

use crate::config::BridgeConfig;
use crate::dom::{Document, ElementNode, HIGHLIGHT_CLASS, NodeId, SELECTOR_ATTRIBUTE, describe_element, generate_selector};
use crate::host::{DomEvent, DomEventKind, DomListener, ListenerId, Page};
use crate::lock;
use crate::protocol::{ElementSelection, IncomingCommand, OutgoingMessage, SelectorAction};
use crate::publisher::Publisher;
use std::sync::{Arc, Mutex, Weak};

/// id of the style node injected while the picker is active
pub const STYLE_ELEMENT_ID: &str = "lasy-selector-style";

const HIGHLIGHT_STYLE: &str = r#"
.lasy-highlight {
  outline: 3px solid #3b82f6 !important;
  outline-offset: 2px !important;
  cursor: pointer !important;
  position: relative !important;
  background-color: rgba(59, 130, 246, 0.1) !important;
}
.lasy-highlight::before {
  content: attr(data-lasy-selector);
  position: absolute;
  top: -28px;
  left: 0;
  background: #3b82f6;
  color: white;
  padding: 4px 8px;
  border-radius: 4px;
  font-size: 12px;
  font-family: 'Courier New', monospace;
  z-index: 10000;
  white-space: nowrap;
  pointer-events: none;
}
body {
  cursor: crosshair !important;
}
"#;

#[derive(Debug, Default)]
struct Session {
    active: bool,
    style: Option<NodeId>,
    listeners: Vec<ListenerId>,
}

/// Lets the parent frame pick an element by hovering and clicking
///
/// Inactive until an `activate` command arrives. While active, hovered
/// elements are outlined with their selector; the first click reports the
/// element and switches the picker off again.
pub struct ElementPicker {
    page: Weak<Page>,
    publisher: Arc<Publisher>,
    config: Arc<BridgeConfig>,
    session: Mutex<Session>,
    // Style node kept across sessions; detached while inactive
    style_node: Mutex<Option<NodeId>>,
}

impl ElementPicker {
    pub fn new(page: &Arc<Page>, publisher: Arc<Publisher>, config: Arc<BridgeConfig>) -> Arc<Self> {
        Arc::new(Self {
            page: Arc::downgrade(page),
            publisher,
            config,
            session: Mutex::new(Session::default()),
            style_node: Mutex::new(None),
        })
    }

    pub fn is_active(&self) -> bool {
        lock(&self.session).active
    }

    /// Apply a command posted by the parent frame
    pub fn handle_command(self: &Arc<Self>, command: &IncomingCommand) {
        match command {
            IncomingCommand::ElementSelector { action: SelectorAction::Activate } => self.activate(),
            IncomingCommand::ElementSelector { action: SelectorAction::Deactivate } => self.deactivate(),
        }
    }

    /// Inject the highlight style and start listening; no-op when already active
    pub fn activate(self: &Arc<Self>) {
        let Some(page) = self.page.upgrade() else { return };
        let mut session = lock(&self.session);
        if session.active {
            log::debug!("Element picker already active");
            return;
        }
        session.active = true;

        session.style = self.attach_style(&page);

        let picker = Arc::downgrade(self);
        let on_hover: DomListener = Arc::new(move |event: &mut DomEvent| {
            if let Some(picker) = picker.upgrade() {
                picker.on_pointer_over(event);
            }
        });
        let picker = Arc::downgrade(self);
        let on_click: DomListener = Arc::new(move |event: &mut DomEvent| {
            if let Some(picker) = picker.upgrade() {
                picker.on_click(event);
            }
        });

        session.listeners = vec![
            page.add_capture_listener(DomEventKind::PointerOver, on_hover),
            page.add_capture_listener(DomEventKind::Click, on_click),
        ];
        log::debug!("Element picker activated");
    }

    /// Stop listening and remove all picker markup; no-op when inactive
    pub fn deactivate(&self) {
        let Some(page) = self.page.upgrade() else { return };
        let session = {
            let mut session = lock(&self.session);
            if !session.active {
                log::debug!("Element picker already inactive");
                return;
            }
            std::mem::take(&mut *session)
        };

        for id in session.listeners {
            page.remove_listener(id);
        }
        page.write_document(clear_highlights);
        if let Some(style) = session.style {
            if let Err(e) = page.remove_node(style) {
                log::debug!("Could not remove picker style: {}", e);
            }
        }
        log::debug!("Element picker deactivated");
    }

    fn attach_style(&self, page: &Page) -> Option<NodeId> {
        let head = page.read_document(Document::head);
        let mut parked = lock(&self.style_node);
        if let Some(id) = *parked {
            match page.write_document(|doc| doc.reattach(head, id)) {
                Ok(()) => return Some(id),
                Err(e) => log::debug!("Could not reuse picker style {}: {}", id, e),
            }
        }

        let style = ElementNode::new("style").with_id(STYLE_ELEMENT_ID).with_text(HIGHLIGHT_STYLE);
        match page.append_child(head, &style) {
            Ok(id) => {
                *parked = Some(id);
                Some(id)
            }
            Err(e) => {
                log::debug!("Could not inject picker style: {}", e);
                None
            }
        }
    }

    fn on_pointer_over(&self, event: &mut DomEvent) {
        let style = {
            let session = lock(&self.session);
            if !session.active {
                return;
            }
            session.style
        };
        let Some(page) = self.page.upgrade() else { return };
        event.stop_propagation();

        let target = event.target;
        page.write_document(|doc| {
            clear_highlights(doc);
            if Some(target) == style || doc.has_class(target, HIGHLIGHT_CLASS) {
                return;
            }
            let selector = generate_selector(doc, target);
            let marked = doc
                .add_class(target, HIGHLIGHT_CLASS)
                .and_then(|_| doc.set_attribute(target, SELECTOR_ATTRIBUTE, selector));
            if let Err(e) = marked {
                log::debug!("Could not highlight {}: {}", target, e);
            }
        });
    }

    fn on_click(&self, event: &mut DomEvent) {
        if !self.is_active() {
            return;
        }
        let Some(page) = self.page.upgrade() else { return };
        event.prevent_default();
        event.stop_propagation();

        let selection = page.read_document(|doc| ElementSelection {
            selector: generate_selector(doc, event.target),
            element_info: describe_element(doc, event.target, self.config.text_preview_chars),
        });
        log::debug!("Element selected: {}", selection.selector);

        self.publisher.send(OutgoingMessage::ElementSelected(selection));
        self.deactivate();
    }
}

fn clear_highlights(doc: &mut Document) {
    for id in doc.elements_with_class(HIGHLIGHT_CLASS) {
        let cleared = doc
            .remove_class(id, HIGHLIGHT_CLASS)
            .and_then(|_| doc.remove_attribute(id, SELECTOR_ATTRIBUTE));
        if let Err(e) = cleared {
            log::debug!("Could not clear highlight on {}: {}", id, e);
        }
    }
}
