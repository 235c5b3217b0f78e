//! Downage - internet outage monitor
//!
//! Pings a set of servers at a fixed interval and records contiguous
//! outages ("episodes") with their start time, duration and whether they
//! are still in progress.
//!
//! - `tracker`: pure state machine turning up/down samples into episodes
//! - `prober`: randomized, short-circuiting reachability check
//! - `sinks`: SQLite and JSON-lines episode storage
//! - `monitor`: the poll loop tying them together

pub mod config;
pub mod models;
pub mod monitor;
pub mod prober;
pub mod sinks;
pub mod tracker;

pub use config::{Cli, ConfigError, MonitorConfig, SinkBackend};
pub use models::Episode;
pub use monitor::Monitor;
pub use prober::{some_host_reachable, PingProber, Prober};
pub use sinks::{open_sink, EpisodeSink, SinkError, SinkInfo};
pub use tracker::{OutageTracker, Transition};
