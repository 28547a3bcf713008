//! Stage registry: the ordered pipeline of processing stages.
//!
//! Every stage implements one uniform process contract over the job context.
//! The registry holds the fixed stage order; per-job option toggles decide
//! which optional stages actually run.

pub mod dialect;
pub mod diarize;
pub mod itn;
pub mod langid;
pub mod punctuate;
pub mod redact;
pub mod transcribe;

use crate::context::JobContext;
use crate::engine::{AsrEngine, Diarizer};
use crate::job::JobOptions;
use std::sync::Arc;
use thiserror::Error;

pub use dialect::{DialectMapStage, DialectMapper};
pub use diarize::DiarizeStage;
pub use itn::ItnStage;
pub use langid::DetectLanguageStage;
pub use punctuate::PunctuateStage;
pub use redact::{RedactStage, Redactor};
pub use transcribe::TranscribeStage;

/// Typed stage failure. Any variant aborts the remaining stages for the job.
#[derive(Error, Debug, Clone)]
pub enum StageError {
    #[error("invalid input: {message}")]
    Validation { message: String },

    #[error("engine failure: {message}")]
    Engine { message: String },

    #[error("cancelled: {reason}")]
    Cancelled { reason: String },
}

/// One discrete processing step in the pipeline.
pub trait Stage: Send + Sync {
    /// Stable stage name, recorded in job status and error messages.
    fn name(&self) -> &'static str;

    /// Optional stages may be disabled per job; mandatory ones always run.
    fn is_optional(&self) -> bool;

    /// Whether this stage runs for a job with the given options. Mandatory
    /// stages are always enabled.
    fn enabled(&self, options: &JobOptions) -> bool;

    /// Processes the job context in place.
    fn process(&self, ctx: &mut JobContext) -> Result<(), StageError>;
}

/// Ordered, configurable stage list.
pub struct StageRegistry {
    stages: Vec<Box<dyn Stage>>,
}

impl StageRegistry {
    /// The default fixed order: detect-language, transcribe, diarize,
    /// punctuate, itn, dialect-map, redact.
    pub fn standard(
        asr: Arc<dyn AsrEngine>,
        diarizer: Arc<dyn Diarizer>,
        mapper: DialectMapper,
        redactor: Redactor,
    ) -> Self {
        Self {
            stages: vec![
                Box::new(DetectLanguageStage::new()),
                Box::new(TranscribeStage::new(asr)),
                Box::new(DiarizeStage::new(diarizer)),
                Box::new(PunctuateStage::new()),
                Box::new(ItnStage::new()),
                Box::new(DialectMapStage::new(mapper)),
                Box::new(RedactStage::new(redactor)),
            ],
        }
    }

    /// Builds a registry from an explicit stage list (tests, custom wiring).
    pub fn from_stages(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    pub fn stages(&self) -> &[Box<dyn Stage>] {
        &self.stages
    }

    /// Stages that will run for a job with these options, in pipeline order.
    pub fn enabled_stages(&self, options: &JobOptions) -> Vec<&dyn Stage> {
        self.stages
            .iter()
            .map(|s| s.as_ref())
            .filter(|s| s.enabled(options))
            .collect()
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EnergyDiarizer, MockEngine};

    fn registry() -> StageRegistry {
        StageRegistry::standard(
            Arc::new(MockEngine::new()),
            Arc::new(EnergyDiarizer::default()),
            DialectMapper::default(),
            Redactor::default(),
        )
    }

    #[test]
    fn test_standard_order_is_fixed() {
        assert_eq!(
            registry().stage_names(),
            vec![
                "detect-language",
                "transcribe",
                "diarize",
                "punctuate",
                "itn",
                "dialect-map",
                "redact"
            ]
        );
    }

    #[test]
    fn test_mandatory_stages_always_enabled() {
        let registry = registry();
        let options = JobOptions {
            enable_diarization: false,
            enable_punct: false,
            enable_itn: false,
            enable_dialect_map: false,
            enable_redaction: false,
            ..JobOptions::default()
        };
        let names: Vec<_> = registry
            .enabled_stages(&options)
            .iter()
            .map(|s| s.name())
            .collect();
        assert_eq!(names, vec!["detect-language", "transcribe"]);
    }

    #[test]
    fn test_all_toggles_enable_all_stages() {
        let registry = registry();
        let options = JobOptions {
            enable_dialect_map: true,
            enable_redaction: true,
            ..JobOptions::default()
        };
        assert_eq!(registry.enabled_stages(&options).len(), 7);
    }

    #[test]
    fn test_optionality_flags() {
        let registry = registry();
        let optional: Vec<_> = registry
            .stages()
            .iter()
            .filter(|s| s.is_optional())
            .map(|s| s.name())
            .collect();
        assert_eq!(
            optional,
            vec!["diarize", "punctuate", "itn", "dialect-map", "redact"]
        );
    }
}
