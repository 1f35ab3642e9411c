//! Pipeline orchestration
//!
//! Drives the five dubbing stages in sequence, threads artifacts between
//! them, tracks per-session progress through fixed checkpoints, and runs
//! sessions as background tasks against a session store.

mod pipeline;
pub mod progress;
mod registry;
mod runner;

pub use pipeline::{DefaultPipeline, DubJob, DubbingPipeline, PipelineResults};
pub use progress::{NoopObserver, PipelineObserver};
pub use registry::{
    InMemorySessionStore, SessionError, SessionSnapshot, SessionStatus, SessionStore,
};
pub use runner::{run_session, RegistryObserver};
