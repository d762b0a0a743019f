// Console views for Smart Bus Tracker
use crate::sbt_history::HistoryRecord;
use crate::sbt_models::{Bus, BusStatus, Coordinate, DeviationSummary, MetricsSnapshot, Route};
use crate::sbt_routes::BusMatch;
use crate::sbt_scheduler::TickReport;
use chrono::{TimeZone, Utc};
use chrono_tz::Asia::Kolkata;

pub struct SBTViews;

impl SBTViews {
    /// Epoch milliseconds as local (IST) wall-clock time
    pub fn format_time(epoch_ms: i64) -> String {
        match Utc.timestamp_millis_opt(epoch_ms).single() {
            Some(dt) => dt.with_timezone(&Kolkata).format("%H:%M:%S").to_string(),
            None => "??:??:??".to_string(),
        }
    }

    fn status_icon(status: BusStatus) -> &'static str {
        match status {
            BusStatus::OnTheWay => "🚌",
            BusStatus::AtStop => "🚏",
            BusStatus::Departed => "🏁",
        }
    }

    pub fn show_routes(routes: &[Route]) {
        println!("\n{}", "═".repeat(70));
        println!("🗺️  ROUTES ({})", routes.len());
        println!("{}", "═".repeat(70));
        for route in routes {
            println!("\n  {} [{}]", route.name, route.id);
            println!("     📍 {}", route.stops.join(" → "));
            let ids: Vec<&str> = route.buses.iter().map(|b| b.id.as_str()).collect();
            println!("     🚌 {}", ids.join(", "));
        }
        println!("{}", "─".repeat(70));
    }

    pub fn show_stops(title: &str, stops: &[&str]) {
        println!("\n📍 {} ({})", title, stops.len());
        println!("{}", "─".repeat(60));
        for stop in stops {
            println!("  • {}", stop);
        }
    }

    pub fn show_search_results(
        source: &str,
        destination: &str,
        results: &[(BusMatch<'_>, MetricsSnapshot)],
    ) {
        println!("\n{}", "═".repeat(70));
        println!("🔍 {} → {}", source, destination);
        println!("{}", "═".repeat(70));

        if results.is_empty() {
            println!("\n  No buses found for this source and destination.");
            println!("  💡 Try `sbt stops --from \"{}\"` for valid destinations.", source);
            return;
        }

        for (m, metrics) in results {
            Self::show_bus_card(m.route, m.bus, metrics);
        }
    }

    pub fn show_bus_card(route: &Route, bus: &Bus, metrics: &MetricsSnapshot) {
        println!(
            "\n  {} {}  ({})",
            Self::status_icon(metrics.status),
            bus.id,
            route.name
        );
        println!("     Status: {}", metrics.status);
        if !metrics.is_departed {
            println!("     ⏱  ETA: {}   📍 Next stop: {}", metrics.eta, metrics.next_stop);
        }
    }

    pub fn show_tick(report: &TickReport, tick: u64) {
        let m = &report.metrics;
        println!(
            "[{}] #{:<4} {} {:<10} now: {:<26} next: {:<26} ETA {:<7} {}",
            Self::format_time(report.at_ms),
            tick,
            Self::status_icon(m.status),
            m.status.to_string(),
            m.current_stop,
            m.next_stop,
            m.eta,
            report.position
        );
    }

    pub fn show_trip_finished(bus_id: &str, deviation: Option<&DeviationSummary>) {
        println!("\n{}", "─".repeat(70));
        println!("🏁 {} has finished its trip", bus_id);
        match deviation {
            Some(d) => {
                println!("   Route deviation over {} samples:", d.samples);
                println!("     • Avg: {} m", d.mean_meters.round());
                println!("     • Max: {} m", d.max_meters.round());
            }
            None => println!("   Not enough trace data for deviation analysis"),
        }
    }

    pub fn show_position(position: &Coordinate) {
        println!("     🛰️  Position: {}", position);
    }

    pub fn show_history(user: &str, record: &HistoryRecord) {
        println!("\n{}", "═".repeat(60));
        println!("📜 HISTORY for {}", user);
        println!("{}", "═".repeat(60));

        println!("\n  ⭐ Favorites ({})", record.favorites.len());
        for f in &record.favorites {
            println!("     • {} ({})", f.bus_id, f.route_name);
        }

        println!("\n  🔍 Recent searches ({})", record.recent_searches.len());
        for s in &record.recent_searches {
            println!(
                "     • {} → {}  [{}]",
                s.source,
                s.destination,
                Self::format_time(s.timestamp)
            );
        }

        println!("\n  🚌 Frequent buses ({})", record.frequent_buses.len());
        for b in &record.frequent_buses {
            println!("     • {} ×{} ({})", b.bus_id, b.count, b.route_name);
        }
    }

    pub fn bus_not_found(bus_id: &str) {
        println!("\n✗ Bus '{}' not found", bus_id);
        println!("  💡 Use `sbt routes` to list buses");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn times_are_rendered_in_ist() {
        // 2025-10-09 08:53:20 UTC
        assert_eq!(SBTViews::format_time(1_760_000_000_000), "14:23:20");
    }
}
