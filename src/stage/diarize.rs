//! Optional diarization stage: assigns speaker labels to segments.

use crate::context::JobContext;
use crate::engine::{Diarizer, SpeakerTurn};
use crate::job::JobOptions;
use crate::stage::{Stage, StageError};
use crate::types::Segment;
use std::sync::Arc;

pub struct DiarizeStage {
    diarizer: Arc<dyn Diarizer>,
}

impl DiarizeStage {
    pub fn new(diarizer: Arc<dyn Diarizer>) -> Self {
        Self { diarizer }
    }

    /// Speaker whose turn overlaps the segment the most, if any.
    fn best_speaker(segment: &Segment, turns: &[SpeakerTurn]) -> Option<String> {
        let mut best: Option<(&SpeakerTurn, f64)> = None;
        for turn in turns {
            let overlap = turn.end.min(segment.end) - turn.start.max(segment.start);
            if overlap > 0.0 && best.map(|(_, b)| overlap > b).unwrap_or(true) {
                best = Some((turn, overlap));
            }
        }
        best.map(|(turn, _)| turn.speaker.clone())
    }
}

impl Stage for DiarizeStage {
    fn name(&self) -> &'static str {
        "diarize"
    }

    fn is_optional(&self) -> bool {
        true
    }

    fn enabled(&self, options: &JobOptions) -> bool {
        options.enable_diarization
    }

    fn process(&self, ctx: &mut JobContext) -> Result<(), StageError> {
        if ctx.segments.is_empty() {
            return Ok(());
        }
        let turns = self
            .diarizer
            .diarize(&ctx.audio)
            .map_err(|e| StageError::Engine {
                message: format!("{}: {e}", self.diarizer.name()),
            })?;

        for segment in &mut ctx.segments {
            if segment.speaker.is_none() {
                segment.speaker = Self::best_speaker(segment, &turns);
            }
        }
        Ok(())
    }
}
