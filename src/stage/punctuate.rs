//! Optional punctuation restoration stage.

use crate::context::JobContext;
use crate::job::JobOptions;
use crate::stage::{Stage, StageError};

/// Restores sentence-final punctuation. Thai text is conventionally written
/// without terminal punctuation, so the Thai path only tidies sentence
/// boundaries; the English path appends a period when missing.
pub fn restore_punctuation(text: &str, language: &str) -> String {
    if text.is_empty() {
        return text.to_string();
    }
    if language.starts_with("en") {
        restore_english(text)
    } else {
        restore_thai(text)
    }
}

fn restore_thai(text: &str) -> String {
    let sentences: Vec<&str> = split_after_terminal(text)
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if sentences.is_empty() {
        return text.trim().to_string();
    }
    sentences.join(" ")
}

fn restore_english(text: &str) -> String {
    let mut out = text.trim().to_string();
    if let Some(last) = out.chars().last()
        && !matches!(last, '.' | '!' | '?')
    {
        out.push('.');
    }
    out
}

/// Splits text into runs ending at `.`, `!` or `?` followed by whitespace.
fn split_after_terminal(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut prev_terminal = false;
    for (index, ch) in text.char_indices() {
        if prev_terminal && ch.is_whitespace() {
            parts.push(&text[start..index]);
            start = index;
        }
        prev_terminal = matches!(ch, '.' | '!' | '?');
    }
    parts.push(&text[start..]);
    parts
}

#[derive(Debug, Default)]
pub struct PunctuateStage;

impl PunctuateStage {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for PunctuateStage {
    fn name(&self) -> &'static str {
        "punctuate"
    }

    fn is_optional(&self) -> bool {
        true
    }

    fn enabled(&self, options: &JobOptions) -> bool {
        options.enable_punct
    }

    fn process(&self, ctx: &mut JobContext) -> Result<(), StageError> {
        let default_language = ctx.language_or_default().to_string();
        for segment in &mut ctx.segments {
            let language = segment.language.as_deref().unwrap_or(&default_language);
            segment.text = restore_punctuation(&segment.text, language);
        }
        Ok(())
    }
}
