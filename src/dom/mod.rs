//! Page structure used by the element picker and the route crawler
//!
//! This module provides:
//! - ElementNode: owned element subtree used to build and extend documents
//! - Document: live arena-backed element tree with stable node handles
//! - selector: CSS-like selector generation and picked-element descriptors

pub mod document;
pub mod element;
pub mod selector;

pub use document::{Document, NodeId};
pub use element::ElementNode;
pub use selector::{ElementInfo, HIGHLIGHT_CLASS, SELECTOR_ATTRIBUTE, describe_element, generate_selector};
