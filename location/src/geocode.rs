//! Reverse geocoding collaborator.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

/// A postal address returned by a [`Geocoder`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// State, province or prefecture.
    pub admin_area: Option<String>,
    /// City or town.
    pub locality: Option<String>,
    /// Street name.
    pub thoroughfare: Option<String>,
    /// ISO country code.
    pub country_code: Option<String>,
    /// Postal code.
    pub postal_code: Option<String>,
}

impl Address {
    /// Admin area, locality and thoroughfare concatenated in that order with
    /// no separators. Missing parts contribute nothing.
    #[must_use]
    pub fn district(&self) -> String {
        [&self.admin_area, &self.locality, &self.thoroughfare]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect()
    }
}

/// Errors that can occur when reverse geocoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeocodeError {
    /// The backend returned no address for the coordinate.
    #[error("no address found")]
    NoResult,
    /// The backend could not be reached.
    #[error("geocoder I/O error: {0}")]
    Io(String),
    /// No geocoder exists on this platform.
    #[error("geocoder not available")]
    NotAvailable,
}

/// A reverse geocoder.
pub trait Geocoder: Send + Sync + Debug {
    /// Looks up at most `max_results` addresses at the coordinate, localized
    /// for `locale`.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Io`] if the backend fails.
    fn reverse_geocode(
        &self,
        latitude: f64,
        longitude: f64,
        max_results: usize,
        locale: &str,
    ) -> Result<Vec<Address>, GeocodeError>;
}

/// Geocoder for platforms without a backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedGeocoder;

impl Geocoder for UnsupportedGeocoder {
    fn reverse_geocode(
        &self,
        _latitude: f64,
        _longitude: f64,
        _max_results: usize,
        _locale: &str,
    ) -> Result<Vec<Address>, GeocodeError> {
        Err(GeocodeError::NotAvailable)
    }
}
