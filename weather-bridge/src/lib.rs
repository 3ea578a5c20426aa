//! Core library for the watch weather bridge.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Ports for location, weather and host delivery, with their adapters
//! - The `WeatherBridge` event handler that runs fetch cycles
//!
//! It is used by `weather-bridge-cli`, but the bridge can be embedded in any
//! host that can raise `HostEvent`s.

pub mod bridge;
pub mod config;
pub mod error;
pub mod location;
pub mod model;
pub mod provider;
pub mod transport;

pub use bridge::{FetchOutcome, FetchPolicy, HostEvent, WeatherBridge};
pub use config::{Config, LocationConfig};
pub use error::{BridgeError, FailureKind, LocationError, TransportError};
pub use location::{CachedLocation, LocationProvider, PositionOptions, StaticLocation};
pub use model::{Coordinates, OutboundMessage, WeatherReading, kelvin_to_fahrenheit};
pub use provider::{WeatherProvider, openweather::OpenWeatherProvider, provider_from_config};
pub use transport::{ChannelTransport, HostTransport, JsonLinesTransport};
