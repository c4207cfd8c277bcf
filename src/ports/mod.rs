//! Port traits implemented by adapters.

pub mod clock_port;
pub mod config_port;
pub mod data_port;
