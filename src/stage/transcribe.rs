//! Mandatory transcription stage: calls the ASR engine boundary.

use crate::context::JobContext;
use crate::engine::{AsrEngine, AsrRequest, EngineError};
use crate::job::JobOptions;
use crate::stage::{Stage, StageError, langid};
use crate::types::validate_segments;
use std::sync::Arc;

pub struct TranscribeStage {
    engine: Arc<dyn AsrEngine>,
}

impl TranscribeStage {
    pub fn new(engine: Arc<dyn AsrEngine>) -> Self {
        Self { engine }
    }

    /// Newline-joined lexicon entries followed by the context prompt.
    fn prompt_bias(options: &JobOptions) -> Option<String> {
        let mut entries: Vec<String> = options.custom_lexicon.clone().unwrap_or_default();
        if let Some(prompt) = &options.context_prompt {
            entries.push(prompt.clone());
        }
        if entries.is_empty() {
            None
        } else {
            Some(entries.join("\n"))
        }
    }
}

impl Stage for TranscribeStage {
    fn name(&self) -> &'static str {
        "transcribe"
    }

    fn is_optional(&self) -> bool {
        false
    }

    fn enabled(&self, _options: &JobOptions) -> bool {
        true
    }

    fn process(&self, ctx: &mut JobContext) -> Result<(), StageError> {
        let request = AsrRequest {
            model_size: ctx.options.model_size,
            language_hint: ctx.language.clone(),
            prompt_bias: Self::prompt_bias(&ctx.options),
        };

        let mut segments = self
            .engine
            .transcribe(&ctx.audio, &request)
            .map_err(|e| match e {
                EngineError::UnsupportedAudio { message } => StageError::Validation { message },
                EngineError::Inference { message } => StageError::Engine { message },
            })?;

        validate_segments(&segments).map_err(|e| StageError::Engine {
            message: format!("{} returned malformed segments: {e}", self.engine.name()),
        })?;

        let job_language = ctx.language.clone();
        for segment in &mut segments {
            if segment.language.is_none() {
                segment.language = Some(langid::detect(&segment.text, job_language.as_deref()));
            }
        }

        ctx.segments = segments;
        Ok(())
    }
}
