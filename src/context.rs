//! Per-execution job context, owned exclusively by the worker running the job.

use crate::ingest::DecodedAudio;
use crate::job::{JobId, JobOptions};
use crate::types::Segment;
use serde::{Deserialize, Serialize};

/// A text span masked by the redaction stage. Offsets are character indices
/// into the segment's (pre-redaction) text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedactionMarker {
    pub segment_index: usize,
    pub kind: String,
    pub start_char: usize,
    pub end_char: usize,
}

/// Ephemeral state threaded through the stage pipeline for one run.
///
/// Never shared across workers; discarded after the run, with durable pieces
/// persisted at stage boundaries through the gateway.
pub struct JobContext {
    pub job_id: JobId,
    pub options: JobOptions,
    pub audio: DecodedAudio,
    /// Primary language for the job, set by the detect-language stage.
    pub language: Option<String>,
    /// Recognized segments; post-processing stages rewrite text in place but
    /// never touch timing.
    pub segments: Vec<Segment>,
    /// Standard-dialect full text, populated by the dialect-map stage.
    pub dialect_text: Option<String>,
    /// Standard-dialect text per segment, parallel to `segments`.
    pub dialect_segment_texts: Option<Vec<String>>,
    /// Masked text per segment, parallel to `segments`.
    pub redacted_segment_texts: Option<Vec<String>>,
    /// Where the masks were applied.
    pub redaction_markers: Vec<RedactionMarker>,
}

impl JobContext {
    pub fn new(job_id: JobId, options: JobOptions, audio: DecodedAudio) -> Self {
        Self {
            job_id,
            options,
            audio,
            language: None,
            segments: Vec::new(),
            dialect_text: None,
            dialect_segment_texts: None,
            redacted_segment_texts: None,
            redaction_markers: Vec::new(),
        }
    }

    /// Language to assume for post-processing when a segment carries none.
    pub fn language_or_default(&self) -> &str {
        self.language.as_deref().unwrap_or(crate::defaults::DEFAULT_LANGUAGE)
    }
}
