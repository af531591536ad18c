use crate::dom::document::{Document, NodeId};
use serde::{Deserialize, Serialize};

/// Class the element picker puts on the hovered element
pub const HIGHLIGHT_CLASS: &str = "lasy-highlight";

/// Attribute holding the selector shown in the highlight label
pub const SELECTOR_ATTRIBUTE: &str = "data-lasy-selector";

/// Descriptor of a picked element
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ElementInfo {
    /// Lower-case tag name
    pub tag: String,

    /// Trimmed text content, cut to the preview length
    pub text: String,

    /// id attribute, empty when absent
    pub id: String,

    /// Raw class attribute, empty when absent
    pub class_name: String,
}

/// Compute a CSS-like selector for a node
///
/// Priority: `#id`, then the node's classes (ignoring the picker's own
/// highlight class) joined as `.a.b`, then `tag:nth-child(k)` with `k` the
/// position among same-tag siblings, and finally the bare tag for a node
/// without a parent. Unknown nodes yield an empty string.
pub fn generate_selector(doc: &Document, node: NodeId) -> String {
    let Ok(tag) = doc.tag_name(node) else {
        return String::new();
    };

    let id = doc.element_id(node);
    if !id.is_empty() {
        return format!("#{}", id);
    }

    let classes: Vec<&str> = doc
        .class_list(node)
        .into_iter()
        .filter(|c| !c.contains(HIGHLIGHT_CLASS))
        .collect();
    if !classes.is_empty() {
        return format!(".{}", classes.join("."));
    }

    match doc.same_tag_position(node) {
        Some(position) => format!("{}:nth-child({})", tag, position),
        None => tag.to_string(),
    }
}

/// Build the descriptor reported for a picked element
pub fn describe_element(doc: &Document, node: NodeId, text_preview_chars: usize) -> ElementInfo {
    let text = doc.text_content(node);
    ElementInfo {
        tag: doc.tag_name(node).unwrap_or_default().to_string(),
        text: text.trim().chars().take(text_preview_chars).collect(),
        id: doc.element_id(node).to_string(),
        class_name: doc.class_name(node).to_string(),
    }
}
