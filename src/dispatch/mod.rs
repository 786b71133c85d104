//! Conversation dispatch — event types, reserved labels, validation, and
//! the per-conversation state machine.

pub mod dispatcher;
pub mod event;
pub mod labels;
pub mod validate;

pub use dispatcher::Dispatcher;
pub use event::{Command, Event, EventPayload, Menu, MenuAction, Outgoing};
