//! Stage contract
//!
//! Every pipeline step implements one capability: accept a typed input
//! record and produce a typed output record, or fail with a classified
//! error. Stages never retry internally and never see each other's
//! records; the orchestrator owns all cross-stage knowledge.

use crate::PipelineError;
use async_trait::async_trait;

/// A single pipeline step with a narrow input/output contract
#[async_trait]
pub trait Stage: Send + Sync {
    /// Input record this stage consumes
    type Input: Send;
    /// Output record this stage produces
    type Output: Send;

    /// Stage name used for error classification and result keys
    fn name(&self) -> &'static str;

    /// Run the stage on one input record.
    ///
    /// # Errors
    ///
    /// Returns a classified `PipelineError` carrying this stage's name;
    /// untyped failures are wrapped before crossing the boundary.
    async fn process(&self, input: Self::Input) -> Result<Self::Output, PipelineError>;
}
