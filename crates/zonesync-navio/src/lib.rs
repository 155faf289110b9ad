//! Navio provider client.
//!
//! Read-only access to the third-party delivery-zone API: zone list with
//! geofences, active flags and city hints. The geofence ordinate order is
//! swapped into GeoJSON order at ingestion, so downstream code only ever
//! sees `Geofence<LngLat>`.

pub mod client;
pub mod config;
pub mod error;
pub mod models;

pub use client::NavioClient;
pub use config::NavioConfig;
pub use error::{NavioError, NavioResult};
pub use models::ProviderZone;
