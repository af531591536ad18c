//! Decorators placed into the page's capability slots
//!
//! Each one publishes what it observes and then delegates to whatever
//! occupied the slot before it, returning the delegate's result unchanged.

pub mod console;
pub mod errors;
pub mod network;

pub use console::ChainedConsole;
pub use errors::{ChainedErrorHandler, ChainedRejectionHandler, error_listener, rejection_listener};
pub use network::{ObservedFetch, ObservedXhr, ObservedXhrFactory};
