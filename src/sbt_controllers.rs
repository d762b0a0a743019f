// Controllers for the Smart Bus Tracker console
use crate::sbt_config::{Command, HistoryAction, Settings};
use crate::sbt_deviation::expected_polyline;
use crate::sbt_export::{session_geojson, write_geojson};
use crate::sbt_history::HistoryStore;
use crate::sbt_models::{Coordinate, DeviationSummary};
use crate::sbt_projector::project_position;
use crate::sbt_scheduler::{Clock, SystemClock, TrackingScheduler};
use crate::sbt_views::SBTViews;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc::unbounded_channel;

pub struct SBTControllers;

impl SBTControllers {
    pub async fn run(command: Command, mut settings: Settings) -> Result<()> {
        match command {
            Command::Routes => {
                SBTViews::show_routes(settings.catalogue.routes());
                Ok(())
            }
            Command::Stops { from } => {
                Self::handle_stops(&settings, from.as_deref());
                Ok(())
            }
            Command::Search { source, destination } => {
                Self::handle_search(&mut settings, &source, &destination)
            }
            Command::Status { bus_id, route } => {
                Self::handle_status(&settings, &bus_id, route.as_deref());
                Ok(())
            }
            Command::Track { bus_id, route, ticks, geojson } => {
                Self::handle_track(
                    &mut settings,
                    &bus_id,
                    route.as_deref(),
                    ticks,
                    geojson.as_deref(),
                )
                .await
            }
            Command::History { action } => {
                Self::handle_history(&mut settings, action.unwrap_or(HistoryAction::Show))
            }
        }
    }

    fn handle_stops(settings: &Settings, from: Option<&str>) {
        match from {
            Some(source) => {
                let destinations = settings.catalogue.destinations_from(source);
                SBTViews::show_stops(&format!("Destinations from {}", source), &destinations);
            }
            None => SBTViews::show_stops("All stops", &settings.catalogue.all_stops()),
        }
    }

    fn handle_search(settings: &mut Settings, source: &str, destination: &str) -> Result<()> {
        let now = SystemClock.now_ms();
        let matches = settings.catalogue.search(source, destination)?;

        let results: Vec<_> = matches
            .into_iter()
            .map(|m| {
                let metrics = settings.engine.compute_metrics(m.bus, Some(m.route), now);
                (m, metrics)
            })
            .filter(|(_, metrics)| !metrics.is_departed)
            .collect();

        SBTViews::show_search_results(source, destination, &results);

        let route_name = results
            .first()
            .map(|(m, _)| m.route.name.clone())
            .unwrap_or_default();
        let user = settings.user.clone();
        if let Err(e) = settings
            .history
            .update(&user, |r| r.record_search(source, destination, &route_name, now))
        {
            log::warn!("Could not save search history: {}", e);
        }
        Ok(())
    }

    fn handle_status(settings: &Settings, bus_id: &str, route_id: Option<&str>) {
        let Some((route, bus)) = settings.catalogue.find_bus(bus_id, route_id) else {
            SBTViews::bus_not_found(bus_id);
            return;
        };

        let metrics = settings.engine.compute_metrics(bus, Some(route), SystemClock.now_ms());
        SBTViews::show_bus_card(route, bus, &metrics);
        SBTViews::show_position(&project_position(bus, &metrics, &settings.table));
    }

    async fn handle_track(
        settings: &mut Settings,
        bus_id: &str,
        route_id: Option<&str>,
        max_ticks: Option<u64>,
        geojson: Option<&Path>,
    ) -> Result<()> {
        let Some((route, bus)) = settings.catalogue.find_bus(bus_id, route_id) else {
            SBTViews::bus_not_found(bus_id);
            return Ok(());
        };
        let (route, bus) = (route.clone(), bus.clone());

        let user = settings.user.clone();
        let now = SystemClock.now_ms();
        if let Err(e) = settings
            .history
            .update(&user, |r| r.record_bus_view(&bus.id, &route.id, &route.name, now))
        {
            log::warn!("Could not save bus view: {}", e);
        }

        let mut scheduler = TrackingScheduler::new(
            settings.engine,
            Arc::clone(&settings.table),
            Arc::new(SystemClock),
            settings.tick,
        );
        let (tx, mut rx) = unbounded_channel();
        let session = scheduler.track(bus.clone(), route.clone(), tx);

        println!("\n🔄 Tracking {} on {} (Ctrl-C to stop)", bus.id, route.name);

        let mut observed: Vec<Coordinate> = Vec::new();
        let mut deviation: Option<DeviationSummary> = None;
        let mut tick = 0u64;

        loop {
            tokio::select! {
                report = rx.recv() => {
                    let Some(report) = report else { break };
                    tick += 1;
                    SBTViews::show_tick(&report, tick);
                    if report.recorded {
                        observed.push(report.position);
                    }
                    if report.deviation.is_some() {
                        deviation = report.deviation;
                    }
                    if report.metrics.is_departed {
                        SBTViews::show_trip_finished(&report.bus_id, deviation.as_ref());
                        break;
                    }
                    if max_ticks.is_some_and(|max| tick >= max) {
                        scheduler.cancel(session);
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    println!("\n👋 Stopping live tracking...");
                    scheduler.cancel(session);
                    break;
                }
            }
        }

        if let Some(path) = geojson {
            let stops: Vec<(String, Coordinate)> = route
                .stops
                .iter()
                .filter_map(|s| settings.table.get(s).map(|c| (s.clone(), c)))
                .collect();
            let expected = expected_polyline(&route, &settings.table);
            let doc = session_geojson(
                &route,
                &bus.id,
                &expected,
                &observed,
                &stops,
                deviation.as_ref(),
            );
            write_geojson(path, &doc).with_context(|| format!("exporting {}", path.display()))?;
            println!("✓ GeoJSON written to {}", path.display());
        }
        Ok(())
    }

    fn handle_history(settings: &mut Settings, action: HistoryAction) -> Result<()> {
        let user = settings.user.clone();
        match action {
            HistoryAction::Show => {
                let record = settings.history.get(&user)?.unwrap_or_default();
                SBTViews::show_history(&user, &record);
            }
            HistoryAction::Clear => {
                settings.history.update(&user, |r| r.clear())?;
                println!("✓ History cleared for {}", user);
            }
            HistoryAction::Favorite { bus_id, route } => {
                let Some((route, bus)) = settings.catalogue.find_bus(&bus_id, route.as_deref())
                else {
                    SBTViews::bus_not_found(&bus_id);
                    return Ok(());
                };
                let (bus_id, route_id, route_name) =
                    (bus.id.clone(), route.id.clone(), route.name.clone());
                let now = SystemClock.now_ms();
                let mut starred = false;
                settings.history.update(&user, |r| {
                    starred = r.toggle_favorite(&bus_id, &route_id, &route_name, now);
                })?;
                if starred {
                    println!("⭐ {} added to favorites", bus_id);
                } else {
                    println!("☆ {} removed from favorites", bus_id);
                }
            }
        }
        Ok(())
    }
}
