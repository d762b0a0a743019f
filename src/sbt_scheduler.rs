// Tracking sessions and the per-bus tick scheduler
//
// A session follows one bus: every tick it asks the ETA engine for a snapshot,
// projects a position, appends it to the session's trace and, once the bus has
// departed from its final stop, freezes the trace and finalizes the deviation.
// The scheduler owns one ticking task per session. Cancelling a session aborts
// its task and removes the entry.

use crate::sbt_deviation::{expected_polyline, DeviationCache, Trace};
use crate::sbt_eta::EtaEngine;
use crate::sbt_geocoding::GeocodingTable;
use crate::sbt_models::{Bus, Coordinate, DeviationSummary, MetricsSnapshot, Route};
use crate::sbt_projector::project_position;
use futures::StreamExt;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_stream::wrappers::IntervalStream;
use uuid::Uuid;

pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

// ============================================================================
// Clocks
// ============================================================================

/// Wall-clock source in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Epoch time anchored at `origin_ms` and advanced by tokio's clock, so it
/// follows paused/advanced time in tests.
#[derive(Debug, Clone, Copy)]
pub struct AnchoredClock {
    origin_ms: i64,
    start: Instant,
}

impl AnchoredClock {
    pub fn new(origin_ms: i64) -> Self {
        AnchoredClock {
            origin_ms,
            start: Instant::now(),
        }
    }
}

impl Clock for AnchoredClock {
    fn now_ms(&self) -> i64 {
        self.origin_ms + self.start.elapsed().as_millis() as i64
    }
}

// ============================================================================
// Session
// ============================================================================

/// Everything a display layer needs for one tick.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    pub session_id: Uuid,
    pub bus_id: String,
    pub at_ms: i64,
    pub metrics: MetricsSnapshot,
    pub position: Coordinate,
    /// Whether `position` was appended to the trace
    pub recorded: bool,
    /// Set on the tick that finalizes the trip
    pub deviation: Option<DeviationSummary>,
}

pub struct TrackingSession {
    id: Uuid,
    bus: Bus,
    route: Route,
    engine: EtaEngine,
    table: Arc<GeocodingTable>,
    trace: Trace,
}

impl TrackingSession {
    pub fn new(bus: Bus, route: Route, engine: EtaEngine, table: Arc<GeocodingTable>) -> Self {
        TrackingSession {
            id: Uuid::new_v4(),
            bus,
            route,
            engine,
            table,
            trace: Trace::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn is_finished(&self) -> bool {
        self.trace.is_frozen()
    }

    /// One synchronous evaluation at `now_ms`.
    pub fn tick(&mut self, now_ms: i64, deviations: &mut DeviationCache) -> TickReport {
        let metrics = self.engine.compute_metrics(&self.bus, Some(&self.route), now_ms);
        let position = project_position(&self.bus, &metrics, &self.table);

        let mut recorded = false;
        let mut deviation = None;

        if !self.trace.is_frozen() {
            if metrics.is_departed {
                self.trace.freeze();
                let expected = expected_polyline(&self.route, &self.table);
                deviation = deviations.finalize(&self.bus.id, &expected, self.trace.points());
            } else {
                recorded = self.trace.push(position);
            }
        }

        TickReport {
            session_id: self.id,
            bus_id: self.bus.id.clone(),
            at_ms: now_ms,
            metrics,
            position,
            recorded,
            deviation,
        }
    }
}

// ============================================================================
// Scheduler
// ============================================================================

struct SessionHandle {
    bus_id: String,
    task: JoinHandle<()>,
}

/// Owns the ticking task of every active session.
///
/// Must be used from within a tokio runtime. Dropping the scheduler cancels
/// every session.
pub struct TrackingScheduler {
    engine: EtaEngine,
    table: Arc<GeocodingTable>,
    clock: Arc<dyn Clock>,
    tick: Duration,
    deviations: Arc<Mutex<DeviationCache>>,
    sessions: HashMap<Uuid, SessionHandle>,
}

impl TrackingScheduler {
    pub fn new(
        engine: EtaEngine,
        table: Arc<GeocodingTable>,
        clock: Arc<dyn Clock>,
        tick: Duration,
    ) -> Self {
        let tick = if tick.is_zero() { DEFAULT_TICK } else { tick };
        TrackingScheduler {
            engine,
            table,
            clock,
            tick,
            deviations: Arc::new(Mutex::new(DeviationCache::new())),
            sessions: HashMap::new(),
        }
    }

    /// Starts following `bus`. Reports are sent to `sink` every tick until the
    /// bus departs its final stop, the session is cancelled or `sink` closes.
    pub fn track(&mut self, bus: Bus, route: Route, sink: UnboundedSender<TickReport>) -> Uuid {
        let mut session = TrackingSession::new(bus, route, self.engine, Arc::clone(&self.table));
        let id = session.id();
        let bus_id = session.bus().id.clone();

        let clock = Arc::clone(&self.clock);
        let deviations = Arc::clone(&self.deviations);
        let mut ticker = interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        log::info!("Tracking {} on {} (session {})", bus_id, session.route().id, id);

        let task = tokio::spawn(async move {
            let mut ticks = IntervalStream::new(ticker);
            while ticks.next().await.is_some() {
                let report = {
                    let mut cache = match deviations.lock() {
                        Ok(guard) => guard,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    session.tick(clock.now_ms(), &mut cache)
                };

                let finished = session.is_finished();
                if let Some(d) = &report.deviation {
                    log::info!(
                        "{} finished its trip: mean deviation {:.1} m, max {:.1} m",
                        report.bus_id,
                        d.mean_meters,
                        d.max_meters
                    );
                }

                if sink.send(report).is_err() {
                    log::debug!("Session {} lost its consumer", id);
                    break;
                }
                if finished {
                    break;
                }
            }
        });

        self.sessions.insert(id, SessionHandle { bus_id, task });
        id
    }

    /// Cancels one session. Returns false if it was unknown.
    pub fn cancel(&mut self, session_id: Uuid) -> bool {
        match self.sessions.remove(&session_id) {
            Some(handle) => {
                handle.task.abort();
                log::info!("Cancelled session {} for {}", session_id, handle.bus_id);
                true
            }
            None => false,
        }
    }

    /// Cancels every session following `bus_id`; returns how many there were.
    pub fn cancel_bus(&mut self, bus_id: &str) -> usize {
        let ids: Vec<Uuid> = self
            .sessions
            .iter()
            .filter(|(_, h)| h.bus_id == bus_id)
            .map(|(id, _)| *id)
            .collect();
        ids.into_iter().filter(|id| self.cancel(*id)).count()
    }

    pub fn cancel_all(&mut self) {
        for (_, handle) in self.sessions.drain() {
            handle.task.abort();
        }
    }

    /// Drops entries whose task has completed.
    pub fn prune(&mut self) {
        self.sessions.retain(|_, h| !h.task.is_finished());
    }

    pub fn active_sessions(&mut self) -> usize {
        self.prune();
        self.sessions.len()
    }

    pub fn deviation_for(&self, bus_id: &str) -> Option<DeviationSummary> {
        match self.deviations.lock() {
            Ok(cache) => cache.get(bus_id),
            Err(poisoned) => poisoned.into_inner().get(bus_id),
        }
    }
}

impl Drop for TrackingScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
