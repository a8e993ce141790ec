pub mod console;
pub mod metrics;
pub mod sample_file;

pub use console::{ConsoleCommand, ConsoleError};
pub use metrics::{init_metrics, record_snapshot, serve_metrics};
pub use sample_file::FileSink;
