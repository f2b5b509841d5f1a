pub mod config;
pub mod distance;
pub mod marker;
pub mod watch;
