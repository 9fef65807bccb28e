//! Connection mode tracking and server reachability.

mod manager;
mod mode;
mod monitor;
mod reachability;

pub use manager::{
    format_elapsed, AutoSync, ConnectionModeManager, Detection, ListenerId, ModeListener,
};
pub use mode::ConnectionMode;
pub use reachability::{
    classify, HttpHealthProbe, NetworkReachability, ProbeReport, ProbeStatus, ReachabilityProbe,
    StaticReachability, TcpReachability,
};
