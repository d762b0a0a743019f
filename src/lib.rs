//! Smart Bus Tracker: simulated bus motion, ETAs and positions along fixed routes.
//!
//! The core (`sbt_eta`, `sbt_projector`, `sbt_deviation`) is pure and takes the
//! current time as an argument. `sbt_scheduler` drives it on a tokio timer.

pub mod sbt_config;
pub mod sbt_controllers;
pub mod sbt_deviation;
pub mod sbt_eta;
pub mod sbt_export;
pub mod sbt_geocoding;
pub mod sbt_history;
pub mod sbt_models;
pub mod sbt_projector;
pub mod sbt_routes;
pub mod sbt_scheduler;
pub mod sbt_views;
