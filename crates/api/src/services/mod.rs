//! Outbound integrations used by the HTTP layer.

pub mod messaging;

pub use messaging::{build_dispatcher, ConsoleMessageDispatcher, HttpMessageDispatcher};
