//! Progress checkpoints and the stage-boundary observer seam
//!
//! Progress is reported only at fixed checkpoints, one per stage, so a
//! poller sees the same sequence regardless of how long each stage takes.

use async_trait::async_trait;
use serde_json::Value;

pub const QUEUED: u8 = 0;
pub const DOWNLOAD: u8 = 15;
pub const TRANSCRIBE: u8 = 35;
pub const TRANSLATE: u8 = 55;
pub const SYNTHESIZE: u8 = 75;
pub const OVERLAY: u8 = 90;
pub const COMPLETED: u8 = 100;

/// Checkpoint reported when the named stage begins
#[must_use]
pub fn checkpoint(stage: &str) -> u8 {
    match stage {
        "download" => DOWNLOAD,
        "transcribe" => TRANSCRIBE,
        "translate" => TRANSLATE,
        "synthesize" => SYNTHESIZE,
        "overlay" => OVERLAY,
        _ => QUEUED,
    }
}

/// Receives stage-boundary events from a running pipeline.
///
/// The pipeline itself stays synchronous-looking; background runs plug in
/// a store-backed observer, synchronous callers the no-op one.
#[async_trait]
pub trait PipelineObserver: Send + Sync {
    async fn on_stage_start(&self, stage: &'static str, progress: u8);
    async fn on_stage_complete(&self, stage: &'static str, record: Value);
}

/// Observer for callers that do not track progress
pub struct NoopObserver;

#[async_trait]
impl PipelineObserver for NoopObserver {
    async fn on_stage_start(&self, _stage: &'static str, _progress: u8) {}
    async fn on_stage_complete(&self, _stage: &'static str, _record: Value) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoints_strictly_increase_along_the_pipeline() {
        let sequence = [
            QUEUED,
            checkpoint("download"),
            checkpoint("transcribe"),
            checkpoint("translate"),
            checkpoint("synthesize"),
            checkpoint("overlay"),
            COMPLETED,
        ];
        assert!(sequence.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_unknown_stage_maps_to_queued() {
        assert_eq!(checkpoint("mystery"), QUEUED);
    }
}
