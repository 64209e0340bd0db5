mod monitor;
mod prober;
#[cfg(test)]
mod tests;

pub use monitor::{ConnectivityMonitor, ConnectivitySignal, ConnectivityState};
pub use prober::HealthProber;
