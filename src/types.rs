//! Transcript data types shared across the pipeline.

use crate::error::{Result, ScribedError};
use serde::{Deserialize, Serialize};

/// One time-coded span of recognized speech.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds; always greater than `start`.
    pub end: f64,
    /// Recognized text.
    pub text: String,
    /// Speaker label assigned by diarization, if any.
    #[serde(default)]
    pub speaker: Option<String>,
    /// Recognition confidence in [0, 1].
    #[serde(default)]
    pub confidence: f64,
    /// Per-segment language tag (e.g. "th", "en", "lo").
    #[serde(default)]
    pub language: Option<String>,
}

impl Segment {
    pub fn new(start: f64, end: f64, text: impl Into<String>, confidence: f64) -> Self {
        Self {
            start,
            end,
            text: text.into(),
            speaker: None,
            confidence,
            language: None,
        }
    }
}

/// Validates a segment sequence: each span well-formed, confidence in range,
/// ascending by start time, non-overlapping.
pub fn validate_segments(segments: &[Segment]) -> Result<()> {
    for (index, segment) in segments.iter().enumerate() {
        if !(segment.end > segment.start) {
            return Err(ScribedError::Validation {
                message: format!(
                    "segment {index} has non-positive span ({} >= {})",
                    segment.start, segment.end
                ),
            });
        }
        if !(0.0..=1.0).contains(&segment.confidence) {
            return Err(ScribedError::Validation {
                message: format!(
                    "segment {index} confidence {} outside [0, 1]",
                    segment.confidence
                ),
            });
        }
    }
    for (index, pair) in segments.windows(2).enumerate() {
        if pair[1].start < pair[0].end {
            return Err(ScribedError::Validation {
                message: format!(
                    "segments {index} and {} overlap ({} < {})",
                    index + 1,
                    pair[1].start,
                    pair[0].end
                ),
            });
        }
    }
    Ok(())
}

/// Joins segment texts into one transcript string.
pub fn full_text(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
