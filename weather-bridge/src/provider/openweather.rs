use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::{
    config::{DEFAULT_ENDPOINT, DEFAULT_REQUEST_TIMEOUT_SECS},
    error::BridgeError,
    model::{Coordinates, WeatherReading, kelvin_to_fahrenheit},
};

use super::WeatherProvider;

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    endpoint: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String) -> Result<Self, BridgeError> {
        Self::with_endpoint(api_key, DEFAULT_ENDPOINT.to_string())
    }

    pub fn with_endpoint(api_key: String, endpoint: String) -> Result<Self, BridgeError> {
        Self::with_timeout(
            api_key,
            endpoint,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    /// `timeout` bounds the whole request, body included.
    pub fn with_timeout(
        api_key: String,
        endpoint: String,
        timeout: Duration,
    ) -> Result<Self, BridgeError> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            api_key,
            endpoint,
            http,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    main: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    main: Option<OwMain>,
    #[serde(default)]
    weather: Vec<OwWeather>,
    dt: Option<i64>,
}

impl OwCurrentResponse {
    fn into_reading(self) -> Result<WeatherReading, BridgeError> {
        let kelvin = self
            .main
            .and_then(|m| m.temp)
            .ok_or_else(|| BridgeError::Schema("missing main.temp".to_string()))?;

        let conditions = self
            .weather
            .into_iter()
            .next()
            .and_then(|w| w.main)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| BridgeError::Schema("missing weather[0].main".to_string()))?;

        Ok(WeatherReading {
            temperature_f: kelvin_to_fahrenheit(kelvin),
            conditions,
            observed_at: self.dt.and_then(unix_to_utc),
        })
    }
}

/// Decode a current-weather body into a reading.
pub fn parse_current(body: &str) -> Result<WeatherReading, BridgeError> {
    let parsed: OwCurrentResponse = serde_json::from_str(body)
        .map_err(|e| BridgeError::Schema(format!("invalid JSON: {e}")))?;
    parsed.into_reading()
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn current_weather(&self, coords: &Coordinates) -> Result<WeatherReading, BridgeError> {
        let res = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("lat", coords.latitude.to_string()),
                ("lon", coords.longitude.to_string()),
                ("appid", self.api_key.clone()),
            ])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(BridgeError::Status {
                status,
                body: truncate_body(&body),
            });
        }

        parse_current(&body)
    }
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(ts, 0)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;

    #[test]
    fn parses_documented_shape() {
        let reading =
            parse_current(r#"{"main":{"temp":273.15},"weather":[{"main":"Clear"}]}"#).unwrap();

        assert_eq!(reading.temperature_f, 32);
        assert_eq!(reading.conditions, "Clear");
        assert!(reading.observed_at.is_none());
    }

    #[test]
    fn ignores_extra_fields_and_reads_observation_time() {
        let body = r#"{
            "coord": {"lon": -0.13, "lat": 51.51},
            "weather": [{"id": 500, "main": "Rain", "description": "light rain"}, {"main": "Mist"}],
            "main": {"temp": 300.15, "humidity": 81},
            "dt": 1700000000,
            "name": "London"
        }"#;
        let reading = parse_current(body).unwrap();

        assert_eq!(reading.temperature_f, 81);
        assert_eq!(reading.conditions, "Rain");
        assert_eq!(reading.observed_at.map(|t| t.timestamp()), Some(1_700_000_000));
    }

    #[test]
    fn empty_weather_list_is_schema_error() {
        let err = parse_current(r#"{"main":{"temp":280.0},"weather":[]}"#).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Schema);
        assert!(err.to_string().contains("weather[0].main"));
    }

    #[test]
    fn missing_temperature_is_schema_error() {
        let err = parse_current(r#"{"weather":[{"main":"Clear"}]}"#).unwrap_err();
        assert!(err.to_string().contains("main.temp"));
    }

    #[test]
    fn non_json_body_is_schema_error() {
        let err = parse_current("<html>502</html>").unwrap_err();
        assert_eq!(err.kind(), FailureKind::Schema);
    }

    #[test]
    fn truncate_keeps_short_bodies() {
        assert_eq!(truncate_body("short"), "short");
        let long = "x".repeat(250);
        assert_eq!(truncate_body(&long).len(), 203);
    }
}
