//! C8 Worker Engine.
pub mod engine;
pub mod handler;
pub mod logger;
pub mod progress;

pub use engine::{WorkerEngine, generate_worker_id};
pub use handler::JobHandler;
pub use logger::JobLogger;
pub use progress::ProgressReporter;
