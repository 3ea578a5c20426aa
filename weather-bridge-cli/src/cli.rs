use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use inquire::{CustomType, Password, PasswordDisplayMode};
use std::{sync::Arc, time::Duration};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use weather_bridge::{
    CachedLocation, Config, Coordinates, FetchOutcome, FetchPolicy, HostEvent, JsonLinesTransport,
    StaticLocation, WeatherBridge, WeatherProvider, provider_from_config,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-bridge", version, about = "Relays weather to a watch host")]
pub struct Cli {
    /// OpenWeatherMap API key; overrides the stored one.
    #[arg(long, global = true, env = "OPENWEATHER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct LocationArgs {
    /// Latitude in degrees; falls back to the configured location.
    #[arg(long, requires = "lon", allow_negative_numbers = true)]
    pub lat: Option<f64>,

    /// Longitude in degrees.
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    pub lon: Option<f64>,
}

impl LocationArgs {
    fn coordinates(&self, config: &Config) -> Option<Coordinates> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => config.default_coordinates(),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the API key and a default location.
    Configure,

    /// Run one fetch cycle and print the outbound message.
    Fetch {
        #[command(flatten)]
        location: LocationArgs,
    },

    /// Read host events from stdin and write outbound messages to stdout.
    Run {
        #[command(flatten)]
        location: LocationArgs,

        /// Inject an update request every N minutes, like the watch's tick.
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        refresh_minutes: Option<u64>,

        /// Drop triggers that arrive while a fetch is in flight.
        #[arg(long)]
        coalesce: bool,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let mut config = Config::load()?;
        if let Some(key) = self.api_key {
            config.api_key = Some(key);
        }

        match self.command {
            Command::Configure => configure(config),
            Command::Fetch { location } => fetch_once(&config, &location).await,
            Command::Run {
                location,
                refresh_minutes,
                coalesce,
            } => {
                if coalesce {
                    config.fetch_policy = FetchPolicy::Coalesce;
                }
                serve(&config, &location, refresh_minutes).await
            }
        }
    }
}

fn configure(mut config: Config) -> anyhow::Result<()> {
    let api_key = Password::new("OpenWeatherMap API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    config.api_key = Some(api_key.trim().to_string());

    let lat = CustomType::<f64>::new("Default latitude (Esc to skip):")
        .with_error_message("Please enter a number of degrees")
        .prompt_skippable()
        .context("Failed to read latitude")?;

    if let Some(lat) = lat {
        let lon = CustomType::<f64>::new("Default longitude:")
            .with_error_message("Please enter a number of degrees")
            .prompt()
            .context("Failed to read longitude")?;
        config.set_default_coordinates(Coordinates::new(lat, lon));
    }

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

fn build_bridge(config: &Config, location: &LocationArgs) -> anyhow::Result<WeatherBridge> {
    let weather: Arc<dyn WeatherProvider> = Arc::from(provider_from_config(config)?);
    let locator = CachedLocation::new(StaticLocation::new(location.coordinates(config)));
    let host = JsonLinesTransport::new(tokio::io::stdout());

    Ok(WeatherBridge::new(Arc::new(locator), weather, Arc::new(host))
        .with_options(config.position_options())
        .with_policy(config.fetch_policy)
        .with_settings_url(config.settings_url.clone()))
}

async fn fetch_once(config: &Config, location: &LocationArgs) -> anyhow::Result<()> {
    let bridge = build_bridge(config, location)?;

    match bridge.fetch_weather().await {
        FetchOutcome::Sent(_) | FetchOutcome::Skipped => Ok(()),
        FetchOutcome::Failed(kind) => {
            Err(anyhow::anyhow!("Fetch failed ({kind:?}); see log for details"))
        }
    }
}

async fn serve(
    config: &Config,
    location: &LocationArgs,
    refresh_minutes: Option<u64>,
) -> anyhow::Result<()> {
    let bridge = Arc::new(build_bridge(config, location)?);
    let (tx, rx) = mpsc::channel(16);

    tx.send(HostEvent::Ready).await?;

    if let Some(minutes) = refresh_minutes {
        tokio::spawn(refresh_ticker(tx.clone(), Duration::from_secs(minutes * 60)));
    }

    let reader = tokio::spawn(read_host_events(BufReader::new(tokio::io::stdin()), tx));
    let bridge_task = tokio::spawn(bridge.run(rx));

    reader.await??;
    // with a refresh ticker the channel stays open past stdin EOF
    bridge_task.await?;
    Ok(())
}

/// Sends an update request every `period`, starting one period from now,
/// until the receiving side goes away.
async fn refresh_ticker(tx: mpsc::Sender<HostEvent>, period: Duration) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    loop {
        ticker.tick().await;
        if tx.send(HostEvent::AppMessage).await.is_err() {
            break;
        }
    }
}

/// One event name per line; blank lines and unknown names are skipped.
async fn read_host_events<R>(reader: R, tx: mpsc::Sender<HostEvent>) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await.context("Failed to read host events")? {
        // payload after the event name is ignored
        let Some(name) = line.split_whitespace().next() else {
            continue;
        };

        match name.parse::<HostEvent>() {
            Ok(event) => {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
            Err(err) => tracing::warn!(error = %err, "Ignoring host event"),
        }
    }

    tracing::info!("Host event stream closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_run_with_negative_coordinates() {
        let cli = Cli::try_parse_from([
            "weather-bridge",
            "run",
            "--lat",
            "-33.9",
            "--lon",
            "151.2",
            "--refresh-minutes",
            "30",
            "--coalesce",
        ])
        .unwrap();

        match cli.command {
            Command::Run {
                location,
                refresh_minutes,
                coalesce,
            } => {
                assert_eq!(location.lat, Some(-33.9));
                assert_eq!(location.lon, Some(151.2));
                assert_eq!(refresh_minutes, Some(30));
                assert!(coalesce);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    async fn collect_events(mut rx: mpsc::Receiver<HostEvent>) -> Vec<HostEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn event_reader_skips_blank_and_unknown_lines() {
        let (tx, rx) = mpsc::channel(8);
        read_host_events(&b"ready extra\n\nbogus\n   \nappmessage {\"KEY\":0}\n"[..], tx)
            .await
            .unwrap();

        assert_eq!(
            collect_events(rx).await,
            vec![HostEvent::Ready, HostEvent::AppMessage]
        );
    }

    #[tokio::test]
    async fn event_reader_accepts_settings_events() {
        let (tx, rx) = mpsc::channel(8);
        read_host_events(&b"showConfiguration\nREADY"[..], tx).await.unwrap();

        assert_eq!(
            collect_events(rx).await,
            vec![HostEvent::ShowConfiguration, HostEvent::Ready]
        );
    }

    #[tokio::test]
    async fn event_reader_stops_when_bridge_is_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        assert!(read_host_events(&b"ready\nready\n"[..], tx).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_ticker_requests_update_each_period() {
        let period = Duration::from_secs(30 * 60);
        let (tx, mut rx) = mpsc::channel(4);
        let start = tokio::time::Instant::now();
        let ticker = tokio::spawn(refresh_ticker(tx, period));

        assert_eq!(rx.recv().await, Some(HostEvent::AppMessage));
        assert!(start.elapsed() >= period);

        assert_eq!(rx.recv().await, Some(HostEvent::AppMessage));
        assert!(start.elapsed() >= period * 2);

        drop(rx);
        ticker.await.unwrap();
    }

    #[test]
    fn latitude_requires_longitude() {
        assert!(Cli::try_parse_from(["weather-bridge", "fetch", "--lat", "1.0"]).is_err());
    }

    #[test]
    fn explicit_coordinates_win_over_config() {
        let mut cfg = Config::default();
        cfg.set_default_coordinates(Coordinates::new(1.0, 2.0));

        let args = LocationArgs {
            lat: Some(3.0),
            lon: Some(4.0),
        };
        assert_eq!(args.coordinates(&cfg), Some(Coordinates::new(3.0, 4.0)));

        let none = LocationArgs { lat: None, lon: None };
        assert_eq!(none.coordinates(&cfg), Some(Coordinates::new(1.0, 2.0)));
    }
}
