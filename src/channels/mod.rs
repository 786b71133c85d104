//! Channel abstraction for conversation I/O.

pub mod cli;
pub mod telegram;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::dispatch::{Event, Outgoing};
use crate::error::ChannelError;

pub use cli::CliChannel;
pub use telegram::TelegramChannel;

/// Stream of inbound events produced by a running channel.
pub type EventStream = Pin<Box<dyn Stream<Item = Event> + Send>>;

/// A conversation transport. Implementations reduce network input to
/// [`Event`]s and render [`Outgoing`] notifications back out; everything
/// role- or state-dependent stays in the dispatcher.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Channel name for logging.
    fn name(&self) -> &str;

    /// Start listening and return the inbound event stream.
    async fn start(&self) -> Result<EventStream, ChannelError>;

    /// Deliver one outbound notification.
    async fn send(&self, note: &Outgoing) -> Result<(), ChannelError>;

    /// Verify the transport is reachable before serving.
    async fn health_check(&self) -> Result<(), ChannelError>;

    /// Graceful shutdown.
    async fn shutdown(&self) -> Result<(), ChannelError>;
}
