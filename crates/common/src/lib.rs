//! Common types for the dubbing pipeline
//!
//! Defines the classified error that crosses every stage boundary, the
//! `Stage` trait all pipeline steps implement, and the shared media
//! duration probe.

mod error;
mod probe;
mod stage;

pub use error::{ErrorType, PipelineError, Result};
pub use probe::probe_duration;
pub use stage::Stage;
