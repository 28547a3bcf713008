//! Language identification: hint-first, then cheap script heuristics.

use crate::context::JobContext;
use crate::defaults::DEFAULT_LANGUAGE;
use crate::job::JobOptions;
use crate::stage::{Stage, StageError};

/// Marker words that distinguish Lao from Thai in informal speech.
const LAO_MARKERS: &[&str] = &["ซำ", "บ่", "เด้อ"];

/// Detects the language of a text snippet. An explicit hint always wins.
pub fn detect(text: &str, hint: Option<&str>) -> String {
    if let Some(hint) = hint
        && !hint.is_empty()
    {
        return hint.to_string();
    }
    let cleaned = text.trim().to_lowercase();
    if cleaned.is_empty() {
        return DEFAULT_LANGUAGE.to_string();
    }
    if cleaned.chars().any(|c| c.is_ascii_lowercase()) {
        return "en".to_string();
    }
    if LAO_MARKERS.iter().any(|word| cleaned.contains(word)) {
        return "lo".to_string();
    }
    DEFAULT_LANGUAGE.to_string()
}

/// Mandatory first stage: fixes the job's primary language from the caller's
/// hint, defaulting to Thai. Per-segment languages are refined after
/// transcription once text is available.
#[derive(Debug, Default)]
pub struct DetectLanguageStage;

impl DetectLanguageStage {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for DetectLanguageStage {
    fn name(&self) -> &'static str {
        "detect-language"
    }

    fn is_optional(&self) -> bool {
        false
    }

    fn enabled(&self, _options: &JobOptions) -> bool {
        true
    }

    fn process(&self, ctx: &mut JobContext) -> Result<(), StageError> {
        let language = ctx
            .options
            .language_hint
            .clone()
            .filter(|hint| !hint.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());
        ctx.language = Some(language);
        Ok(())
    }
}
