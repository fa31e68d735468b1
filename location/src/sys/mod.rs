//! Platform-specific location backends.

use std::sync::Arc;

use crate::{Geocoder, LocationClient, LocationResult};
#[cfg(not(target_os = "windows"))]
use crate::UnsupportedGeocoder;

#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "linux")]
pub use linux::GeoClueClient;

#[cfg(target_os = "windows")]
pub use windows::{WinRtClient, WinRtGeocoder};

#[cfg(target_os = "windows")]
pub(crate) use windows::{check_permission, request_permission};

#[cfg(target_os = "linux")]
pub(crate) use linux::{check_permission, request_permission};

/// The location client for this platform.
///
/// # Errors
///
/// Returns [`LocationError::NotAvailable`](crate::LocationError::NotAvailable)
/// on platforms without a backend.
#[cfg(target_os = "linux")]
pub fn platform_client() -> LocationResult<Arc<dyn LocationClient>> {
    Ok(Arc::new(GeoClueClient::new(linux::DEFAULT_DESKTOP_ID)))
}

/// The location client for this platform.
///
/// # Errors
///
/// Returns [`LocationError::NotAvailable`](crate::LocationError::NotAvailable)
/// on platforms without a backend.
#[cfg(target_os = "windows")]
pub fn platform_client() -> LocationResult<Arc<dyn LocationClient>> {
    Ok(Arc::new(WinRtClient::new()))
}

/// The reverse geocoder for this platform.
#[cfg(target_os = "windows")]
#[must_use]
pub fn platform_geocoder() -> Arc<dyn Geocoder> {
    Arc::new(WinRtGeocoder)
}

/// The reverse geocoder for this platform.
#[cfg(not(target_os = "windows"))]
#[must_use]
pub fn platform_geocoder() -> Arc<dyn Geocoder> {
    Arc::new(UnsupportedGeocoder)
}

/// The location client for this platform.
///
/// # Errors
///
/// Always [`LocationError::NotAvailable`](crate::LocationError::NotAvailable):
/// this platform has no built-in backend.
#[cfg(not(any(target_os = "windows", target_os = "linux")))]
pub fn platform_client() -> LocationResult<Arc<dyn LocationClient>> {
    Err(crate::LocationError::NotAvailable)
}

#[cfg(not(any(target_os = "windows", target_os = "linux")))]
pub(crate) async fn check_permission() -> crate::permission::PermissionStatus {
    crate::permission::PermissionStatus::NotDetermined
}

#[cfg(not(any(target_os = "windows", target_os = "linux")))]
pub(crate) async fn request_permission()
-> Result<crate::permission::PermissionStatus, crate::permission::PermissionError> {
    Err(crate::permission::PermissionError::NotSupported)
}
