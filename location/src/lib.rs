//! Location facade for presentation layers.
//!
//! This crate wraps an external location-service client and an external
//! reverse geocoder behind a single [`LocationFacade`]. The facade tracks the
//! client's connection lifecycle, relays one-shot location fixes and formats
//! the district string for the latest fix.
//!
//! Platform backends live in [`sys`]: GeoClue2 on Linux and WinRT on Windows.
//! Mobile embedders implement [`LocationClient`] and [`Geocoder`] over their
//! own bridge layer.
//!
//! # Usage
//!
//! ```ignore
//! use geokit_location::{FilePreferences, LocationFacade};
//!
//! let preferences = FilePreferences::load(FilePreferences::default_path("myapp")?)?;
//! let facade = LocationFacade::platform(&preferences)?;
//! facade.connect(delegate);
//!
//! // Later, once the delegate reported a connection:
//! let fix = facade.request_location_timeout(Duration::from_secs(10)).await?;
//! let district = facade.address_district(&facade.read_language_code(), fix.latitude, fix.longitude);
//! ```

#![warn(missing_docs)]

mod channel;
mod client;
mod connection;
mod facade;
mod geocode;
pub mod permission;
mod prefs;

/// Platform-specific implementations.
pub mod sys;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

pub use channel::{ChannelConnectionDelegate, ConnectionEvent};
pub use client::{FixListener, LocationClient, ServiceAvailability};
pub use connection::{
    ConnectionDelegate, ConnectionHooks, ConnectionResult, ConnectionState, Resolution,
};
pub use facade::{FixDelegate, LocationFacade};
pub use geocode::{Address, GeocodeError, Geocoder, UnsupportedGeocoder};
pub use prefs::{
    FilePreferences, LANGUAGE_KEY, MemoryPreferences, PreferenceError, PreferenceStore,
    normalize_language,
};

/// A single reported geographic coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    /// Latitude in degrees (-90 to 90).
    pub latitude: f64,
    /// Longitude in degrees (-180 to 180).
    pub longitude: f64,
    /// Horizontal accuracy in meters, if available.
    pub accuracy: Option<f64>,
    /// Timestamp as Unix epoch milliseconds.
    pub timestamp: u64,
}

impl Fix {
    /// Creates a fix at the given coordinate, stamped with the current time.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: None,
            timestamp: timestamp_now(),
        }
    }

    /// Sets the horizontal accuracy.
    #[must_use]
    pub const fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }
}

/// Errors that can occur when accessing location.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    /// Location permission was not granted.
    #[error("location permission denied")]
    PermissionDenied,
    /// Location services are disabled on the device.
    #[error("location services disabled")]
    ServiceDisabled,
    /// The location client is not connected.
    #[error("location client not connected")]
    NotConnected,
    /// The provider reported an update without a location.
    #[error("no location fix available")]
    NoFix,
    /// Location request timed out.
    #[error("location request timed out")]
    Timeout,
    /// The client dropped the request without reporting.
    #[error("location request cancelled")]
    Cancelled,
    /// Location is not available on this platform.
    #[error("location not available")]
    NotAvailable,
    /// An unknown error occurred.
    #[error("unknown error: {0}")]
    Unknown(String),
}

/// Convenience alias for location results.
pub type LocationResult<T> = Result<T, LocationError>;

/// Power/accuracy trade-off requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Most accurate fix the device can provide.
    HighAccuracy,
    /// Roughly block-level accuracy.
    #[default]
    BalancedPowerAccuracy,
    /// Roughly city-level accuracy.
    LowPower,
    /// Only fixes other consumers already triggered.
    NoPower,
}

/// Request descriptor handed to [`LocationClient::request_updates`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRequest {
    /// Power/accuracy trade-off.
    pub priority: Priority,
    /// Fastest rate at which updates may be delivered.
    pub fastest_interval: Duration,
    /// Desired update interval.
    pub interval: Duration,
    /// Number of updates after which the listener is released.
    pub num_updates: u32,
}

impl LocationRequest {
    /// The request used for one-shot fixes: balanced priority, 1 s fastest
    /// interval, 5 s interval, a single update.
    #[must_use]
    pub const fn one_shot() -> Self {
        Self {
            priority: Priority::BalancedPowerAccuracy,
            fastest_interval: Duration::from_millis(1000),
            interval: Duration::from_millis(5000),
            num_updates: 1,
        }
    }
}

impl Default for LocationRequest {
    fn default() -> Self {
        Self::one_shot()
    }
}

pub(crate) fn timestamp_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
