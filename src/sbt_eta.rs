// Segment/ETA engine
//
// Reconstructs where a bus is on its route purely from elapsed wall-clock time.
// A bus spends `segment_time_seconds` travelling each segment and then dwells
// STOP_DURATION_SECONDS at the stop it reached. No state is kept between calls.

use crate::sbt_models::{Bus, BusStatus, MetricsSnapshot, Route};
use lazy_static::lazy_static;
use regex::Regex;

/// Dwell time at every stop, final stop included.
pub const STOP_DURATION_SECONDS: i64 = 30;

/// Segment time used when a bus carries neither a segment time nor a parsable ETA.
pub const DEFAULT_SEGMENT_SECONDS: i64 = 60;

lazy_static! {
    static ref ETA_PATTERN: Regex = Regex::new(r"(\d+)\s*min").expect("valid ETA regex");
}

// ============================================================================
// ETA text helpers
// ============================================================================

/// Parses "N min" into seconds. Anything unparsable counts as 0.
pub fn parse_eta_to_seconds(eta: &str) -> i64 {
    ETA_PATTERN
        .captures(eta)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .and_then(|minutes| minutes.checked_mul(60))
        .unwrap_or(0)
}

/// Renders remaining seconds as whole minutes, rounding up.
pub fn seconds_to_eta_string(seconds: i64) -> String {
    if seconds <= 0 {
        return "0 min".to_string();
    }
    let minutes = seconds / 60 + i64::from(seconds % 60 != 0);
    format!("{} min", minutes)
}

/// Single-cycle result used when no stop list is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemainingEta {
    pub remaining_seconds: i64,
    pub has_arrived: bool,
    pub is_departed: bool,
}

/// Treats the whole bus lifetime as one `travel + dwell` cycle.
pub fn calculate_remaining_eta(elapsed_seconds: i64, initial_eta_seconds: i64) -> RemainingEta {
    let remaining_seconds = (initial_eta_seconds - elapsed_seconds).max(0);
    RemainingEta {
        remaining_seconds,
        has_arrived: remaining_seconds == 0,
        is_departed: elapsed_seconds > initial_eta_seconds.saturating_add(STOP_DURATION_SECONDS),
    }
}

pub fn calculate_bus_status(has_arrived: bool, is_departed: bool) -> BusStatus {
    if is_departed {
        BusStatus::Departed
    } else if has_arrived {
        BusStatus::AtStop
    } else {
        BusStatus::OnTheWay
    }
}

/// Segment time actually used for a bus: its own value, else its seed ETA,
/// else DEFAULT_SEGMENT_SECONDS.
pub fn resolve_segment_time(bus: &Bus) -> i64 {
    if bus.segment_time_seconds > 0 {
        return bus.segment_time_seconds;
    }
    match parse_eta_to_seconds(&bus.eta) {
        0 => DEFAULT_SEGMENT_SECONDS,
        seconds => seconds,
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Derives `MetricsSnapshot`s from (bus, route, now).
///
/// `speed` scales elapsed time; 1.0 is real time.
#[derive(Debug, Clone, Copy)]
pub struct EtaEngine {
    speed: f64,
}

impl Default for EtaEngine {
    fn default() -> Self {
        EtaEngine { speed: 1.0 }
    }
}

impl EtaEngine {
    pub fn with_speed(speed: f64) -> Self {
        let speed = if speed.is_finite() && speed > 0.0 { speed } else { 1.0 };
        EtaEngine { speed }
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Whole simulated seconds since departure, clamped at zero for clock skew.
    pub fn elapsed_seconds(&self, departure_ms: i64, now_ms: i64) -> i64 {
        let elapsed_ms = now_ms.saturating_sub(departure_ms) as f64;
        ((elapsed_ms / 1000.0) * self.speed).floor().max(0.0) as i64
    }

    pub fn compute_metrics(
        &self,
        bus: &Bus,
        route: Option<&Route>,
        now_ms: i64,
    ) -> MetricsSnapshot {
        let elapsed = self.elapsed_seconds(bus.departure_time, now_ms);

        match route {
            Some(route) if !route.stops.is_empty() => {
                Self::route_metrics(bus, &route.stops, elapsed)
            }
            _ => Self::single_eta_metrics(bus, elapsed),
        }
    }

    fn route_metrics(bus: &Bus, stops: &[String], elapsed: i64) -> MetricsSnapshot {
        let segment_time = resolve_segment_time(bus);
        let total_cycle = segment_time.saturating_add(STOP_DURATION_SECONDS);
        let cycles_passed = (elapsed / total_cycle) as usize;
        let cycle_elapsed = elapsed % total_cycle;

        let last = stops.len() - 1;
        let start_index = bus.start_index.min(last);
        let current_segment = start_index.saturating_add(cycles_passed);

        if current_segment >= last {
            let final_stop = stops[last].clone();
            // Only the first cycle that reaches the terminus has a dwell window;
            // after that the trip stays finished.
            let dwelling = current_segment == last && cycle_elapsed < STOP_DURATION_SECONDS;
            let status = if dwelling { BusStatus::AtStop } else { BusStatus::Departed };

            return MetricsSnapshot {
                status,
                current_stop: final_stop.clone(),
                next_stop: final_stop,
                remaining_seconds: 0,
                eta: seconds_to_eta_string(0),
                is_departed: !dwelling,
            };
        }

        let next_stop = stops[current_segment + 1].clone();
        // The instant a dwell ends is still spent at the stop, mirroring the
        // arrival instant. The upcoming stop is already the next one.
        let leaving_stop = cycles_passed > 0 && cycle_elapsed == 0;

        if leaving_stop {
            MetricsSnapshot {
                status: BusStatus::AtStop,
                current_stop: stops[current_segment].clone(),
                next_stop,
                remaining_seconds: 0,
                eta: seconds_to_eta_string(0),
                is_departed: false,
            }
        } else if cycle_elapsed < segment_time {
            let remaining = segment_time - cycle_elapsed;
            MetricsSnapshot {
                status: BusStatus::OnTheWay,
                current_stop: stops[current_segment].clone(),
                next_stop,
                remaining_seconds: remaining,
                eta: seconds_to_eta_string(remaining),
                is_departed: false,
            }
        } else {
            MetricsSnapshot {
                status: BusStatus::AtStop,
                current_stop: next_stop.clone(),
                next_stop,
                remaining_seconds: 0,
                eta: seconds_to_eta_string(0),
                is_departed: false,
            }
        }
    }

    fn single_eta_metrics(bus: &Bus, elapsed: i64) -> MetricsSnapshot {
        let initial = parse_eta_to_seconds(&bus.eta);
        let calc = calculate_remaining_eta(elapsed, initial);

        MetricsSnapshot {
            status: calculate_bus_status(calc.has_arrived, calc.is_departed),
            current_stop: bus.next_stop.clone(),
            next_stop: bus.next_stop.clone(),
            remaining_seconds: calc.remaining_seconds,
            eta: seconds_to_eta_string(calc.remaining_seconds),
            is_departed: calc.is_departed,
        }
    }
}
