//! Workshop Bot — registration, approval, and work-order tracking over chat.

pub mod auth;
pub mod channels;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod registry;
pub mod session;
pub mod store;
