//! Location permission handling.
//!
//! On Linux, access is mediated by GeoClue's own agent when the client
//! connects, so the permission always reads as granted. On Windows, checking
//! reads the geolocator status and requesting shows the system prompt.

use crate::{LocationError, sys};

/// The current status of the location permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionStatus {
    /// Permission has been granted by the user.
    Granted,
    /// Permission has been denied by the user.
    Denied,
    /// Permission is restricted by policy.
    Restricted,
    /// Permission has not been requested yet.
    NotDetermined,
}

/// Errors that can occur when requesting the permission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PermissionError {
    /// The platform has no location permission to request.
    #[error("permission not supported on this platform")]
    NotSupported,
    /// An unknown error occurred.
    #[error("unknown error: {0}")]
    Unknown(String),
}

impl From<PermissionError> for LocationError {
    fn from(err: PermissionError) -> Self {
        match err {
            PermissionError::NotSupported => Self::NotAvailable,
            PermissionError::Unknown(msg) => Self::Unknown(msg),
        }
    }
}

/// Check the current status of the location permission without prompting.
pub async fn check() -> PermissionStatus {
    sys::check_permission().await
}

/// Request the location permission from the user.
///
/// If the permission has already been granted or denied, this returns
/// the current status without showing a prompt. On Windows the call blocks
/// the current task until the prompt is answered.
///
/// # Errors
/// Returns a [`PermissionError`] if the platform cannot request it.
pub async fn request() -> Result<PermissionStatus, PermissionError> {
    sys::request_permission().await
}
