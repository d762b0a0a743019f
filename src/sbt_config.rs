// Command line and environment configuration
//
// Every global option can also come from an SBT_* environment variable; main
// loads a `.env` file first so those can live next to the binary.

use crate::sbt_eta::EtaEngine;
use crate::sbt_geocoding::GeocodingTable;
use crate::sbt_history::JsonFileHistoryStore;
use crate::sbt_models::Result;
use crate::sbt_routes::RouteCatalogue;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "sbt",
    version,
    about = "Smart Bus Tracker: simulated live bus ETAs and positions"
)]
pub struct Cli {
    /// Simulation speed multiplier (1 = real time)
    #[arg(long, env = "SBT_SPEED", default_value_t = 1.0, global = true)]
    pub speed: f64,

    /// Tick period of live tracking, in milliseconds
    #[arg(long, env = "SBT_TICK_MS", default_value_t = 1000, global = true)]
    pub tick_ms: u64,

    /// JSON file with route seeds, replacing the built-in network
    #[arg(long, env = "SBT_ROUTES_FILE", global = true)]
    pub routes_file: Option<PathBuf>,

    /// CSV file (name,latitude,longitude) extending the built-in stop table
    #[arg(long, env = "SBT_STOPS_FILE", global = true)]
    pub stops_file: Option<PathBuf>,

    /// History file location
    #[arg(long, env = "SBT_HISTORY_FILE", global = true)]
    pub history_file: Option<PathBuf>,

    /// User whose history is read and updated
    #[arg(long, env = "SBT_USER", default_value = "guest", global = true)]
    pub user: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List routes and their buses
    Routes,
    /// List known stops, or the destinations reachable from one
    Stops {
        #[arg(long)]
        from: Option<String>,
    },
    /// Find buses running from SOURCE to DESTINATION
    Search { source: String, destination: String },
    /// One-off snapshot of a bus
    Status {
        bus_id: String,
        #[arg(long)]
        route: Option<String>,
    },
    /// Follow a bus live until it finishes its trip
    Track {
        bus_id: String,
        #[arg(long)]
        route: Option<String>,
        /// Stop after this many ticks
        #[arg(long)]
        ticks: Option<u64>,
        /// Write expected route, observed trace and deviation as GeoJSON
        #[arg(long)]
        geojson: Option<PathBuf>,
    },
    /// Show or edit the user's history
    History {
        #[command(subcommand)]
        action: Option<HistoryAction>,
    },
}

#[derive(Subcommand, Debug)]
pub enum HistoryAction {
    Show,
    /// Clear searches and viewed buses (favorites are kept)
    Clear,
    /// Star or unstar a bus
    Favorite {
        bus_id: String,
        #[arg(long)]
        route: Option<String>,
    },
}

/// Resolved runtime configuration.
pub struct Settings {
    pub engine: EtaEngine,
    pub tick: Duration,
    pub table: Arc<GeocodingTable>,
    pub catalogue: RouteCatalogue,
    pub history: JsonFileHistoryStore,
    pub user: String,
}

impl Settings {
    pub fn load(cli: &Cli, now_ms: i64) -> Result<Self> {
        let table = match &cli.stops_file {
            Some(path) => {
                let extra = GeocodingTable::from_csv_path(path)?;
                log::info!("Loaded {} stop coordinates from {}", extra.len(), path.display());
                GeocodingTable::builtin().merged_with(&extra)
            }
            None => GeocodingTable::builtin().clone(),
        };

        let catalogue = match &cli.routes_file {
            Some(path) => RouteCatalogue::from_json_path(path, now_ms)?,
            None => RouteCatalogue::builtin(now_ms),
        };
        log::info!("{} routes loaded", catalogue.routes().len());

        for (route, stop) in catalogue.missing_coordinates(&table) {
            log::warn!("Stop '{}' on route {} has no coordinates", stop, route);
        }

        let history_path = cli
            .history_file
            .clone()
            .unwrap_or_else(JsonFileHistoryStore::default_path);

        Ok(Settings {
            engine: EtaEngine::with_speed(cli.speed),
            tick: Duration::from_millis(cli.tick_ms.max(1)),
            table: Arc::new(table),
            catalogue,
            history: JsonFileHistoryStore::new(history_path),
            user: cli.user.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_options_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "sbt", "track", "KA01 F 5521", "--route", "blr-chikkaballapur", "--speed", "30",
            "--ticks", "5",
        ])
        .unwrap();
        assert_eq!(cli.speed, 30.0);
        match cli.command {
            Command::Track { bus_id, route, ticks, geojson } => {
                assert_eq!(bus_id, "KA01 F 5521");
                assert_eq!(route.as_deref(), Some("blr-chikkaballapur"));
                assert_eq!(ticks, Some(5));
                assert!(geojson.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn settings_use_builtin_data_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let history = dir.path().join("h.json");
        let cli = Cli::try_parse_from([
            "sbt",
            "routes",
            "--history-file",
            history.to_str().unwrap(),
        ])
        .unwrap();

        let settings = Settings::load(&cli, 1_760_000_000_000).unwrap();
        assert_eq!(settings.catalogue.routes().len(), 10);
        assert_eq!(settings.tick, Duration::from_millis(1000));
        assert_eq!(settings.history.path(), history.as_path());
        assert_eq!(settings.user, "guest");
    }
}
