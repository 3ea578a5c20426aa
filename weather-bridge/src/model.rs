use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Device position in degrees, as reported by the host's location service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// Current conditions converted to the watch's display unit.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReading {
    pub temperature_f: i32,
    pub conditions: String,
    pub observed_at: Option<DateTime<Utc>>,
}

/// The two-key dictionary delivered to the watch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    #[serde(rename = "TEMPERATURE")]
    pub temperature: i32,
    #[serde(rename = "CONDITIONS")]
    pub conditions: String,
}

impl From<WeatherReading> for OutboundMessage {
    fn from(reading: WeatherReading) -> Self {
        Self {
            temperature: reading.temperature_f,
            conditions: reading.conditions,
        }
    }
}

/// Kelvin to whole Fahrenheit degrees. Halves round towards positive infinity.
pub fn kelvin_to_fahrenheit(kelvin: f64) -> i32 {
    round_half_up((kelvin - 273.15) * 9.0 / 5.0 + 32.0)
}

fn round_half_up(value: f64) -> i32 {
    (value + 0.5).floor() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freezing_point_is_32() {
        assert_eq!(kelvin_to_fahrenheit(273.15), 32);
    }

    #[test]
    fn rounds_to_nearest_degree() {
        // 27 K above freezing -> 80.6 F
        assert_eq!(kelvin_to_fahrenheit(300.15), 81);
        assert_eq!(kelvin_to_fahrenheit(0.0), -460);
        assert_eq!(kelvin_to_fahrenheit(373.15), 212);
    }

    #[test]
    fn exact_halves_round_towards_positive_infinity() {
        assert_eq!(round_half_up(80.5), 81);
        assert_eq!(round_half_up(32.5), 33);
        assert_eq!(round_half_up(-0.5), 0);
        assert_eq!(round_half_up(-1.5), -1);
        assert_eq!(round_half_up(80.49), 80);
    }

    #[test]
    fn slightly_below_zero_fahrenheit() {
        // -0.67 F and -0.13 F
        assert_eq!(kelvin_to_fahrenheit(255.0), -1);
        assert_eq!(kelvin_to_fahrenheit(255.3), 0);
    }

    #[test]
    fn outbound_message_uses_watch_keys() {
        let msg = OutboundMessage::from(WeatherReading {
            temperature_f: 32,
            conditions: "Clear".to_string(),
            observed_at: None,
        });

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json, serde_json::json!({ "TEMPERATURE": 32, "CONDITIONS": "Clear" }));
    }
}
