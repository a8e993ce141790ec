mod app;
mod config;
mod console;
mod logging;
mod telemetry;

pub use app::run_from_args;
