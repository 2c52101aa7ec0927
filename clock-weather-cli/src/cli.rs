use std::time::Duration;

use anyhow::Context;
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use clock_weather_core::{
    Config, Coordinates, ProviderId, Scenario, WeatherData, WeatherProvider, provider_from_config,
};
use inquire::{CustomType, Select, Text};
use tracing::info;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "clock-weather", version, about = "Weather panel for the clock dashboard")]
pub struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactively set location and provider.
    Configure,

    /// Fetch the current weather once.
    Show {
        #[command(flatten)]
        overrides: Overrides,

        /// Print the raw WeatherData JSON.
        #[arg(long)]
        json: bool,
    },

    /// Poll periodically, as the dashboard does.
    Watch {
        #[command(flatten)]
        overrides: Overrides,

        /// Seconds between polls; defaults to the configured interval.
        #[arg(long)]
        interval: Option<u64>,

        /// Print the raw WeatherData JSON.
        #[arg(long)]
        json: bool,
    },
}

/// One-off overrides of the stored configuration.
#[derive(Debug, Args)]
pub struct Overrides {
    /// Provider short name: "nws" or "mock".
    #[arg(long)]
    provider: Option<String>,

    /// Location as "lat,lon".
    #[arg(long, allow_hyphen_values = true)]
    location: Option<String>,

    /// Mock scenario, e.g. "rainy" or "random".
    #[arg(long)]
    scenario: Option<String>,

    /// Cache lifetime in seconds.
    #[arg(long)]
    cache_secs: Option<u64>,
}

impl Overrides {
    fn apply(&self, cfg: &mut Config) -> anyhow::Result<()> {
        if let Some(p) = &self.provider {
            cfg.provider = ProviderId::try_from(p.as_str())?;
        }
        if let Some(loc) = &self.location {
            let c = Coordinates::parse_pair(loc).context("Invalid --location")?;
            cfg.set_coordinates(c);
        }
        if let Some(s) = &self.scenario {
            cfg.mock.scenario = s.parse().context("Invalid --scenario")?;
            if self.provider.is_none() {
                cfg.provider = ProviderId::Mock;
            }
        }
        if let Some(secs) = self.cache_secs {
            cfg.cache_duration_secs = secs;
        }
        Ok(())
    }
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { overrides, json } => {
                let mut cfg = Config::load()?;
                overrides.apply(&mut cfg)?;

                let mut provider = provider_from_config(&cfg)?;
                let data = provider.get_current_weather().await;
                print_weather(&data, json)?;
                Ok(())
            }
            Command::Watch {
                overrides,
                interval,
                json,
            } => {
                let mut cfg = Config::load()?;
                overrides.apply(&mut cfg)?;
                let every = Duration::from_secs(interval.unwrap_or(cfg.poll_interval_secs).max(1));

                let provider = provider_from_config(&cfg)?;
                watch(provider, every, json).await
            }
        }
    }
}

fn configure() -> anyhow::Result<()> {
    let mut cfg = Config::load()?;

    let providers: Vec<&str> = ProviderId::all().iter().map(|p| p.as_str()).collect();
    let provider = Select::new("Weather provider:", providers)
        .with_starting_cursor(ProviderId::all().iter().position(|p| *p == cfg.provider).unwrap_or(0))
        .prompt()?;
    cfg.provider = ProviderId::try_from(provider)?;

    let latitude = Text::new("Latitude:")
        .with_default(&cfg.latitude)
        .with_validator(|s: &str| {
            Ok(match Coordinates::parse(s, "0") {
                Ok(_) => inquire::validator::Validation::Valid,
                Err(e) => inquire::validator::Validation::Invalid(e.to_string().into()),
            })
        })
        .prompt()?;
    let longitude = Text::new("Longitude:")
        .with_default(&cfg.longitude)
        .with_validator(|s: &str| {
            Ok(match Coordinates::parse("0", s) {
                Ok(_) => inquire::validator::Validation::Valid,
                Err(e) => inquire::validator::Validation::Invalid(e.to_string().into()),
            })
        })
        .prompt()?;
    cfg.set_coordinates(Coordinates::parse(&latitude, &longitude)?);

    cfg.cache_duration_secs = CustomType::<u64>::new("Cache lifetime (seconds):")
        .with_default(cfg.cache_duration_secs)
        .prompt()?;

    match cfg.provider {
        ProviderId::Mock => {
            let scenarios: Vec<&str> = Scenario::all().map(|s| s.as_str()).collect();
            let choice = Select::new("Mock scenario:", scenarios).prompt()?;
            cfg.mock.scenario = choice.parse()?;
        }
        ProviderId::Nws => {
            cfg.nws.user_agent = Text::new("User-Agent sent to weather.gov (include contact info):")
                .with_default(&cfg.nws.user_agent)
                .prompt()?;
        }
    }

    let path = cfg.save()?;
    println!("Saved configuration to {}", path.display());
    Ok(())
}

async fn watch(mut provider: Box<dyn WeatherProvider>, every: Duration, json: bool) -> anyhow::Result<()> {
    info!(provider = %provider.id(), interval_secs = every.as_secs(), "watching weather");
    let mut ticker = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let data = provider.get_current_weather().await;
                print_weather(&data, json)?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("stopping");
                return Ok(());
            }
        }
    }
}

fn print_weather(data: &WeatherData, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(data)?);
        return Ok(());
    }

    let stamp = Local::now().format("%H:%M:%S");
    match data {
        WeatherData::Ok(r) | WeatherData::Cached(r) => {
            println!(
                "[{stamp}] {status:<6} {t:.0}°F (low {lo:.0}°F / high {hi:.0}°F)  precip {p}% ({pmin}–{pmax}%)  sunrise {rise}  sunset {set}",
                status = data.status(),
                t = r.temperature,
                lo = r.temperature_min,
                hi = r.temperature_max,
                p = r.precipitation,
                pmin = r.precipitation_min,
                pmax = r.precipitation_max,
                rise = r.sunrise_hhmm(),
                set = r.sunset_hhmm(),
            );
        }
        WeatherData::Error { error_message } => {
            println!("[{stamp}] --     no weather data: {error_message}");
        }
    }
    Ok(())
}
