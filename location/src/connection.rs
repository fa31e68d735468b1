//! Connection lifecycle types shared between the facade and its client.

use std::fmt;
use std::sync::Weak;

use serde::{Deserialize, Serialize};

use crate::facade::Shared;

/// What the user can do to fix a failed connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Grant the location permission.
    GrantPermission,
    /// Switch on device location services.
    EnableLocationServices,
    /// Install or update the provider service.
    UpdateService,
    /// A backend-specific resolution flow.
    Other(String),
}

/// Outcome of a failed connection attempt as reported by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionResult {
    /// Backend error code.
    pub error_code: i32,
    /// Resolution flow the user can go through, if any.
    pub resolution: Option<Resolution>,
    /// Human-readable detail from the backend.
    pub message: Option<String>,
}

impl ConnectionResult {
    /// The provider service is not installed.
    pub const SERVICE_MISSING: i32 = 1;
    /// The installed provider service is out of date.
    pub const SERVICE_VERSION_UPDATE_REQUIRED: i32 = 2;
    /// The provider service is disabled.
    pub const SERVICE_DISABLED: i32 = 3;
    /// The user has not granted access.
    pub const ACCESS_DENIED: i32 = 4;
    /// A network error occurred.
    pub const NETWORK_ERROR: i32 = 7;
    /// An internal error occurred.
    pub const INTERNAL_ERROR: i32 = 8;
    /// The requested API is not available on this device.
    pub const API_UNAVAILABLE: i32 = 16;

    /// A failure the user can fix through `resolution`.
    #[must_use]
    pub const fn resolvable(error_code: i32, resolution: Resolution) -> Self {
        Self {
            error_code,
            resolution: Some(resolution),
            message: None,
        }
    }

    /// A failure with no resolution flow.
    #[must_use]
    pub const fn fatal(error_code: i32) -> Self {
        Self {
            error_code,
            resolution: None,
            message: None,
        }
    }

    /// Attaches a backend message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Whether a resolution flow exists for this failure.
    #[must_use]
    pub const fn has_resolution(&self) -> bool {
        self.resolution.is_some()
    }
}

impl fmt::Display for ConnectionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connection failed with code {}", self.error_code)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

/// Connection state tracked by the facade.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection attempt in flight.
    #[default]
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// The client is connected.
    Connected,
    /// The last attempt failed and the user can resolve it.
    FailedResolvable(ConnectionResult),
    /// The last attempt failed with no resolution.
    FailedFatal {
        /// Backend error code.
        error_code: i32,
    },
}

impl ConnectionState {
    /// Whether a failure has already been delivered for the current attempt.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::FailedResolvable(_) | Self::FailedFatal { .. })
    }
}

/// Receiver of connection lifecycle events.
pub trait ConnectionDelegate: Send + Sync {
    /// The client connected.
    fn on_connected(&self);

    /// The connection failed but the user can resolve it and retry.
    fn on_connect_need_retry(&self, result: &ConnectionResult);

    /// The connection failed with no resolution.
    fn on_connect_failed(&self, error_code: i32);
}

/// Sink through which a [`LocationClient`](crate::LocationClient) reports
/// connection events to the facade that owns it.
///
/// Events arriving after the facade has been dropped are ignored.
#[derive(Clone)]
pub struct ConnectionHooks {
    shared: Weak<Shared>,
}

impl ConnectionHooks {
    pub(crate) const fn new(shared: Weak<Shared>) -> Self {
        Self { shared }
    }

    /// Reports a successful connection.
    pub fn connected(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.handle_connected();
        }
    }

    /// Reports that the connection was suspended.
    pub fn suspended(&self, cause: i32) {
        if let Some(shared) = self.shared.upgrade() {
            shared.handle_suspended(cause);
        }
    }

    /// Reports a failed connection attempt.
    pub fn failed(&self, result: ConnectionResult) {
        if let Some(shared) = self.shared.upgrade() {
            shared.handle_failed(result);
        }
    }
}

impl fmt::Debug for ConnectionHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHooks")
            .field("attached", &(self.shared.strong_count() > 0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_decides_result_kind() {
        let result = ConnectionResult::resolvable(
            ConnectionResult::ACCESS_DENIED,
            Resolution::GrantPermission,
        );
        assert!(result.has_resolution());
        assert!(!ConnectionResult::fatal(ConnectionResult::SERVICE_MISSING).has_resolution());
    }

    #[test]
    fn display_includes_message() {
        let result = ConnectionResult::fatal(8).with_message("bus closed");
        assert_eq!(result.to_string(), "connection failed with code 8: bus closed");
    }

    #[test]
    fn detached_hooks_ignore_events() {
        let hooks = ConnectionHooks::new(Weak::new());
        hooks.connected();
        hooks.failed(ConnectionResult::fatal(1));
        assert_eq!(format!("{hooks:?}"), "ConnectionHooks { attached: false }");
    }
}
