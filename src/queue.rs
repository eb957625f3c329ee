//! C7 Job Queue: durable storage and state-machine operations over the `jobs` table.
//! The polling/dispatch loop that consumes this queue is `worker`, a separate
//! component (C8) — this module owns persistence only.
mod store;

pub use store::{JobQueueStore, JobStats};
