//! # Geokit
//!
//! Location services for presentation layers: connection lifecycle of the
//! platform location client, one-shot fixes, and reverse-geocoded district
//! strings.
//!
//! ## Features
//!
//! - `location` (default): the [`location`] facade and its platform backends.
//!
//! Use the `full` feature to enable everything.
//!
//! ## Example
//!
//! ```toml
//! [dependencies]
//! geokit = { version = "0.1", features = ["location"] }
//! ```
//!
//! ```ignore
//! use geokit::location::{LocationFacade, MemoryPreferences};
//!
//! async fn coords(facade: &LocationFacade) {
//!     if let Ok(fix) = facade.request_location().await {
//!         println!("Latitude: {}, Longitude: {}", fix.latitude, fix.longitude);
//!     }
//! }
//! ```

#[cfg(feature = "location")]
pub use geokit_location as location;
