//! Firmware core for a networked air quality sensor node.
//!
//! Everything except [`esp`] is platform-independent, so the scheduling,
//! link management, telemetry, and sensor bookkeeping can be tested on the
//! host against fakes.
pub mod config;
pub mod display;
pub mod ingest;
pub mod logger;
pub mod metric;
pub mod net;
pub mod node;
pub mod retry;
pub mod scheduler;
pub mod sensor;
pub mod signing;
pub mod telemetry;
pub mod units;
pub mod wheel;

#[cfg(target_os = "espidf")]
pub mod esp;

#[cfg(test)]
mod test_util;

pub use self::{
    config::Config,
    node::Node,
    telemetry::{TelemetryError, TelemetryManager},
};
