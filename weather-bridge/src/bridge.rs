//! The event handler that ties location, weather and host delivery together.
//!
//! Each trigger runs one fetch cycle: position, weather request, conversion,
//! send. Every failure is logged and ends the cycle; nothing is retried.

use serde::{Deserialize, Serialize};
use std::{
    str::FromStr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tokio::{
    sync::mpsc,
    task::{JoinError, JoinSet},
};

use crate::{
    error::{BridgeError, FailureKind, LocationError},
    location::{LocationProvider, PositionOptions},
    model::OutboundMessage,
    provider::WeatherProvider,
    transport::HostTransport,
};

/// Events raised by the host device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    Ready,
    AppMessage,
    ShowConfiguration,
}

impl FromStr for HostEvent {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ready" => Ok(HostEvent::Ready),
            "appmessage" => Ok(HostEvent::AppMessage),
            "showconfiguration" => Ok(HostEvent::ShowConfiguration),
            _ => Err(anyhow::anyhow!(
                "Unknown host event '{s}'. Expected ready, appmessage or showConfiguration."
            )),
        }
    }
}

/// Whether a trigger may start a cycle while another is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchPolicy {
    /// Every trigger starts its own cycle.
    #[default]
    Overlap,
    /// Triggers arriving during a cycle are dropped.
    Coalesce,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Sent(OutboundMessage),
    /// Another cycle was already in flight.
    Skipped,
    Failed(FailureKind),
}

/// Clears the in-flight flag when the cycle ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug)]
pub struct WeatherBridge {
    location: Arc<dyn LocationProvider>,
    weather: Arc<dyn WeatherProvider>,
    host: Arc<dyn HostTransport>,
    options: PositionOptions,
    policy: FetchPolicy,
    settings_url: Option<String>,
    in_flight: AtomicBool,
}

impl WeatherBridge {
    pub fn new(
        location: Arc<dyn LocationProvider>,
        weather: Arc<dyn WeatherProvider>,
        host: Arc<dyn HostTransport>,
    ) -> Self {
        Self {
            location,
            weather,
            host,
            options: PositionOptions::default(),
            policy: FetchPolicy::default(),
            settings_url: None,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn with_options(mut self, options: PositionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_policy(mut self, policy: FetchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_settings_url(mut self, url: Option<String>) -> Self {
        self.settings_url = url;
        self
    }

    pub async fn on_host_ready(&self) -> FetchOutcome {
        tracing::info!("Host ready");
        self.fetch_weather().await
    }

    pub async fn on_host_message(&self) -> FetchOutcome {
        tracing::info!("AppMessage received");
        self.fetch_weather().await
    }

    pub fn on_show_configuration(&self) {
        match &self.settings_url {
            Some(url) => tracing::info!(url = %url, "Settings open"),
            None => tracing::info!("Settings open"),
        }
    }

    /// Returns `None` for events that do not start a fetch.
    pub async fn handle_event(&self, event: HostEvent) -> Option<FetchOutcome> {
        match event {
            HostEvent::Ready => Some(self.on_host_ready().await),
            HostEvent::AppMessage => Some(self.on_host_message().await),
            HostEvent::ShowConfiguration => {
                self.on_show_configuration();
                None
            }
        }
    }

    pub async fn fetch_weather(&self) -> FetchOutcome {
        let _guard = match self.policy {
            FetchPolicy::Overlap => None,
            FetchPolicy::Coalesce => {
                if self.in_flight.swap(true, Ordering::AcqRel) {
                    tracing::debug!("Fetch already in flight, skipping");
                    return FetchOutcome::Skipped;
                }
                Some(InFlight(&self.in_flight))
            }
        };

        match self.run_cycle().await {
            Ok(message) => {
                tracing::info!("Weather info sent to host successfully");
                FetchOutcome::Sent(message)
            }
            Err(err) => {
                match &err {
                    BridgeError::Transport(_) => {
                        tracing::error!(error = %err, "Error sending weather info to host")
                    }
                    _ => tracing::warn!(error = %err, "Fetch cycle failed"),
                }
                FetchOutcome::Failed(err.kind())
            }
        }
    }

    async fn run_cycle(&self) -> Result<OutboundMessage, BridgeError> {
        let coords = tokio::time::timeout(
            self.options.timeout,
            self.location.current_position(&self.options),
        )
        .await
        .map_err(|_| LocationError::Timeout)??;

        tracing::debug!(
            latitude = coords.latitude,
            longitude = coords.longitude,
            "Position acquired"
        );

        let reading = self.weather.current_weather(&coords).await?;
        tracing::info!(
            temperature = reading.temperature_f,
            conditions = %reading.conditions,
            "Weather received"
        );

        let message = OutboundMessage::from(reading);
        self.host.send_app_message(&message).await?;
        Ok(message)
    }

    /// Runs one fetch task per trigger until `events` closes, then waits for
    /// the outstanding tasks.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<HostEvent>) {
        let mut tasks = JoinSet::new();

        while let Some(event) = events.recv().await {
            if event == HostEvent::ShowConfiguration {
                self.on_show_configuration();
                continue;
            }

            let bridge = Arc::clone(&self);
            tasks.spawn(async move { bridge.handle_event(event).await });

            // reap finished cycles so the set does not grow unbounded
            while let Some(res) = tasks.try_join_next() {
                log_join_error(res);
            }
        }

        while let Some(res) = tasks.join_next().await {
            log_join_error(res);
        }
    }
}

fn log_join_error<T>(res: Result<T, JoinError>) {
    if let Err(err) = res {
        tracing::error!(error = %err, "Fetch task panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_event_names() {
        assert_eq!("ready".parse::<HostEvent>().unwrap(), HostEvent::Ready);
        assert_eq!("appmessage".parse::<HostEvent>().unwrap(), HostEvent::AppMessage);
        assert_eq!(
            "showConfiguration".parse::<HostEvent>().unwrap(),
            HostEvent::ShowConfiguration
        );
    }

    #[test]
    fn unknown_host_event_errors() {
        let err = "tick".parse::<HostEvent>().unwrap_err();
        assert!(err.to_string().contains("Unknown host event"));
    }

    #[tokio::test]
    async fn join_errors_are_logged_not_propagated() {
        let handle: tokio::task::JoinHandle<()> = tokio::spawn(async { panic!("cycle blew up") });
        let res: Result<(), JoinError> = handle.await;
        assert!(res.as_ref().is_err_and(|e| e.is_panic()));
        log_join_error(res);
    }

    #[test]
    fn in_flight_guard_clears_flag() {
        let flag = AtomicBool::new(true);
        drop(InFlight(&flag));
        assert!(!flag.load(Ordering::Acquire));
    }
}
