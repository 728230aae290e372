use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, FixedOffset, Local};
use clap::{Parser, Subcommand};

use crate::{
    config::{default_config_path, BackendSettings, ConfigStore},
    remote::RemoteStore,
    screen::{
        session_name, ScreenAction, ScreenEffect, ScreenState, ANGLES, DISTANCES,
        EMPTY_LIST_MESSAGE,
    },
    store::SessionMeasurementStore,
    utils::logging::init_logging,
};

/// record distance/angle measurements into named sessions
#[derive(Parser, Debug)]
#[clap(version, about)]
pub struct Cli {
    /// config file to use instead of the default location
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    /// log at debug level
    #[clap(short, long, global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// record one measurement into a session
    Record {
        #[clap(short, long, default_value = "session1")]
        session: String,

        /// distance preset in meters
        #[clap(short, long, default_value_t = DISTANCES[0])]
        distance: f64,

        /// angle preset in degrees
        #[clap(short, long, default_value_t = ANGLES[0])]
        angle: u16,
    },

    /// list the measurements stored for a session
    History {
        #[clap(short, long, default_value = "session1")]
        session: String,
    },

    /// print the session name that follows `session<after>`
    NewSession {
        #[clap(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        after: u32,
    },

    /// print the distance and angle presets
    Presets,

    /// show or change the storage backend
    Config {
        #[clap(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    Show,
    /// store measurements in a local SQLite file
    UseSqlite { path: Option<PathBuf> },
    /// store measurements in a Firebase Realtime Database
    UseFirebase {
        database_url: String,
        #[clap(long)]
        auth: Option<String>,
    },
    /// keep measurements in memory for the lifetime of one command
    UseMemory,
}

pub async fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose);

    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path()
            .ok_or_else(|| anyhow!("could not determine a config directory; pass --config"))?,
    };
    let config_store = ConfigStore::new(config_path)?;

    match cli.command {
        Command::Record {
            session,
            distance,
            angle,
        } => {
            let store = SessionMeasurementStore::new(config_store.config().backend.open()?);
            record(&store, session, distance, angle, Local::now().into()).await
        }
        Command::History { session } => {
            let store = SessionMeasurementStore::new(config_store.config().backend.open()?);
            history(&store, &session).await
        }
        Command::NewSession { after } => {
            println!("{}", next_session_after(after)?);
            Ok(())
        }
        Command::Presets => {
            let distances: Vec<String> = DISTANCES.iter().map(|d| format!("{d:?} m")).collect();
            let angles: Vec<String> = ANGLES.iter().map(|a| format!("{a}°")).collect();
            println!("distances: {}", distances.join(", "));
            println!("angles: {}", angles.join(", "));
            Ok(())
        }
        Command::Config { action } => configure(&config_store, action),
    }
}

async fn record<S: RemoteStore>(
    store: &SessionMeasurementStore<S>,
    session: String,
    distance: f64,
    angle: u16,
    at: DateTime<FixedOffset>,
) -> Result<()> {
    let mut screen = ScreenState::with_sessions([session]);
    screen.apply(ScreenAction::SelectDistance(distance))?;
    screen.apply(ScreenAction::SelectAngle(angle))?;

    let ScreenEffect::Record { session, draft } =
        screen.apply(ScreenAction::StartMeasurement { at })?
    else {
        bail!("starting a measurement produced nothing to record");
    };

    let measurement = store.append_measurement(&session, draft).await?;
    for line in screen.display_lines() {
        println!("{line}");
    }
    println!("stored as measurement #{}", measurement.measurement_number);
    Ok(())
}

async fn history<S: RemoteStore>(store: &SessionMeasurementStore<S>, session: &str) -> Result<()> {
    let history = store.fetch_history(session).await?;

    if history.measurements.is_empty() {
        println!("{EMPTY_LIST_MESSAGE}");
    }
    for measurement in &history.measurements {
        let at = measurement
            .recorded_at()
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| measurement.timestamp.to_string());
        println!(
            "#{} distance {:?} cm, angle {:?}°, at {}",
            measurement.measurement_number, measurement.distance, measurement.angle, at
        );
    }
    if !history.malformed.is_empty() {
        println!("({} unreadable entries skipped)", history.malformed.len());
    }
    Ok(())
}

fn next_session_after(after: u32) -> Result<String> {
    let mut screen = ScreenState::with_sessions((1..=after).map(session_name));
    screen.apply(ScreenAction::CreateSession)?;
    Ok(screen.selected_session)
}

fn configure(config_store: &ConfigStore, action: ConfigAction) -> Result<()> {
    let backend = match action {
        ConfigAction::Show => {
            println!("config: {}", config_store.path().display());
            println!("{}", serde_json::to_string_pretty(&config_store.config())?);
            return Ok(());
        }
        ConfigAction::UseSqlite { path } => BackendSettings::Sqlite { path },
        ConfigAction::UseFirebase { database_url, auth } => BackendSettings::Firebase {
            database_url,
            auth_token: auth,
        },
        ConfigAction::UseMemory => BackendSettings::Memory,
    };

    // Fail before persisting a backend that cannot be opened.
    backend.open()?;
    config_store.update_backend(backend)?;
    println!("saved {}", config_store.path().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryStore;

    fn fixed(raw: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(raw).unwrap()
    }

    #[test]
    fn next_session_follows_counter() {
        assert_eq!(next_session_after(1).unwrap(), "session2");
        assert_eq!(next_session_after(9).unwrap(), "session10");
    }

    #[test]
    fn parses_record_arguments() {
        let cli = Cli::try_parse_from([
            "relative-location",
            "record",
            "--session",
            "lab",
            "--distance",
            "3",
            "--angle",
            "120",
        ])
        .unwrap();

        match cli.command {
            Command::Record {
                session,
                distance,
                angle,
            } => {
                assert_eq!(session, "lab");
                assert_eq!(distance, 3.0);
                assert_eq!(angle, 120);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_zero_session_counter() {
        assert!(Cli::try_parse_from(["relative-location", "new-session", "--after", "0"]).is_err());
    }

    #[tokio::test]
    async fn record_stores_centimeters_and_numbers_sequentially() {
        let store = SessionMeasurementStore::new(MemoryStore::new());
        let at = fixed("2024-05-01T12:00:00Z");

        record(&store, "lab".into(), 2.0, 90, at).await.unwrap();
        record(&store, "lab".into(), 0.5, 0, at).await.unwrap();

        let stored = store.fetch_measurements("lab").await.unwrap();
        let summary: Vec<_> = stored
            .iter()
            .map(|m| (m.measurement_number, m.distance, m.angle))
            .collect();
        assert_eq!(summary, vec![(1, 200.0, 90.0), (2, 50.0, 0.0)]);
        assert_eq!(stored[0].timestamp, at.timestamp_millis());
    }

    #[tokio::test]
    async fn record_rejects_off_preset_values_without_writing() {
        let store = SessionMeasurementStore::new(MemoryStore::new());
        let at = fixed("2024-05-01T12:00:00Z");

        assert!(record(&store, "lab".into(), 4.0, 90, at).await.is_err());
        assert!(record(&store, "lab".into(), 1.0, 45, at).await.is_err());
        assert_eq!(store.remote().write_count(), 0);
    }
}
