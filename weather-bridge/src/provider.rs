use crate::{BridgeError, Config, Coordinates, WeatherReading, provider::openweather::OpenWeatherProvider};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openweather;

#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn current_weather(&self, coords: &Coordinates) -> Result<WeatherReading, BridgeError>;
}

/// Construct the OpenWeather provider from config.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Box<dyn WeatherProvider>> {
    let api_key = config.require_api_key()?;

    Ok(Box::new(OpenWeatherProvider::with_timeout(
        api_key.to_owned(),
        config.endpoint().to_owned(),
        config.request_timeout(),
    )?))
}
