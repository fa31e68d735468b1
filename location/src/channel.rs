//! Connection events delivered over an async channel.

use std::fmt;

use async_channel::{Receiver, Sender, unbounded};
use log::warn;

use crate::{ConnectionDelegate, ConnectionResult};

/// A connection lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The client connected.
    Connected,
    /// The connection failed but can be resolved and retried.
    NeedRetry(ConnectionResult),
    /// The connection failed with no resolution.
    Failed {
        /// Backend error code.
        error_code: i32,
    },
}

/// A [`ConnectionDelegate`] that forwards events into a channel, so callers
/// can await connection outcomes.
///
/// ```ignore
/// let (delegate, events) = ChannelConnectionDelegate::new();
/// facade.connect(Arc::new(delegate));
/// match events.recv().await? {
///     ConnectionEvent::Connected => { /* request a fix */ }
///     ConnectionEvent::NeedRetry(result) => { /* resolve, then facade.retry() */ }
///     ConnectionEvent::Failed { error_code } => { /* give up */ }
/// }
/// ```
pub struct ChannelConnectionDelegate {
    sender: Sender<ConnectionEvent>,
}

impl ChannelConnectionDelegate {
    /// Creates a delegate and the receiver its events arrive on.
    #[must_use]
    pub fn new() -> (Self, Receiver<ConnectionEvent>) {
        let (sender, receiver) = unbounded();
        (Self { sender }, receiver)
    }

    fn send(&self, event: ConnectionEvent) {
        if let Err(err) = self.sender.try_send(event) {
            warn!("dropping connection event: {err}");
        }
    }
}

impl fmt::Debug for ChannelConnectionDelegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelConnectionDelegate").finish()
    }
}

impl ConnectionDelegate for ChannelConnectionDelegate {
    fn on_connected(&self) {
        self.send(ConnectionEvent::Connected);
    }

    fn on_connect_need_retry(&self, result: &ConnectionResult) {
        self.send(ConnectionEvent::NeedRetry(result.clone()));
    }

    fn on_connect_failed(&self, error_code: i32) {
        self.send(ConnectionEvent::Failed { error_code });
    }
}
