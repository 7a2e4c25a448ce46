//! Position acquisition for rescuelink.
//!
//! [`GeoPositionProvider`] combines a [`DeviceLocator`] and a
//! [`ReverseGeocoder`] and adds manual entry, centroid estimates, and a short
//! memory of the last good fix.

pub mod error;
pub mod geocoder;
pub mod locator;
pub mod position;

pub use error::{GeocodeError, PositionError};
pub use geocoder::{BigDataCloudGeocoder, ReverseGeocoder};
pub use locator::{DeviceFix, DeviceLocator, HttpLocator, StaticLocator, IP_FIX_ACCURACY_METERS};
pub use position::{GeoPositionProvider, GeoSettings, NO_POSITION_LABEL};
