//! Optional redaction stage: masks sensitive numbers in output text.
//!
//! Always the final stage. Produces masked variants and markers only —
//! segment timing and the raw recognized text are never altered; the masked
//! text is applied at export time when the caller asks for it.

use crate::context::{JobContext, RedactionMarker};
use crate::job::JobOptions;
use crate::stage::{Stage, StageError};
use regex::Regex;

const MASK_CHAR: char = '*';

/// A named pattern to mask.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RedactPattern {
    pub name: String,
    pub pattern: String,
}

/// Default patterns: Thai mobile numbers, national ids, bank account numbers.
pub fn default_patterns() -> Vec<RedactPattern> {
    vec![
        RedactPattern {
            name: "phone".to_string(),
            pattern: r"0[689]\d{8}".to_string(),
        },
        RedactPattern {
            name: "national_id".to_string(),
            pattern: r"\d{13}".to_string(),
        },
        RedactPattern {
            name: "account".to_string(),
            pattern: r"\d{10,12}".to_string(),
        },
    ]
}

pub struct Redactor {
    patterns: Vec<(String, Regex)>,
}

impl Default for Redactor {
    // Built-in patterns are literals; compilation cannot fail.
    #[allow(clippy::expect_used)]
    fn default() -> Self {
        Self::new(&default_patterns()).expect("default redaction patterns compile")
    }
}

impl Redactor {
    pub fn new(patterns: &[RedactPattern]) -> Result<Self, regex::Error> {
        let mut compiled = Vec::with_capacity(patterns.len());
        for p in patterns {
            compiled.push((p.name.clone(), Regex::new(&p.pattern)?));
        }
        Ok(Self { patterns: compiled })
    }

    /// Masks every pattern match with `*`, one per character. Returns the
    /// masked text and the matched spans (character offsets).
    pub fn mask(&self, text: &str) -> (String, Vec<(String, usize, usize)>) {
        let mut masked = text.to_string();
        let mut hits = Vec::new();
        for (name, regex) in &self.patterns {
            let snapshot = masked.clone();
            let matches: Vec<(usize, usize)> = regex
                .find_iter(&snapshot)
                .map(|m| (m.start(), m.end()))
                .collect();
            for &(start, end) in &matches {
                let char_start = snapshot[..start].chars().count();
                let char_len = snapshot[start..end].chars().count();
                hits.push((name.clone(), char_start, char_start + char_len));
            }
            // Replace back-to-front so earlier byte offsets stay valid.
            for &(start, end) in matches.iter().rev() {
                let char_len = snapshot[start..end].chars().count();
                masked.replace_range(start..end, &MASK_CHAR.to_string().repeat(char_len));
            }
        }
        (masked, hits)
    }
}

pub struct RedactStage {
    redactor: Redactor,
}

impl RedactStage {
    pub fn new(redactor: Redactor) -> Self {
        Self { redactor }
    }
}

impl Stage for RedactStage {
    fn name(&self) -> &'static str {
        "redact"
    }

    fn is_optional(&self) -> bool {
        true
    }

    fn enabled(&self, options: &JobOptions) -> bool {
        options.enable_redaction
    }

    fn process(&self, ctx: &mut JobContext) -> Result<(), StageError> {
        let mut masked_texts = Vec::with_capacity(ctx.segments.len());
        let mut markers = Vec::new();
        for (index, segment) in ctx.segments.iter().enumerate() {
            let (masked, hits) = self.redactor.mask(&segment.text);
            for (kind, start_char, end_char) in hits {
                markers.push(RedactionMarker {
                    segment_index: index,
                    kind,
                    start_char,
                    end_char,
                });
            }
            masked_texts.push(masked);
        }
        ctx.redacted_segment_texts = Some(masked_texts);
        ctx.redaction_markers = markers;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::SAMPLE_RATE;
    use crate::ingest::DecodedAudio;
    use crate::job::JobId;
    use crate::types::Segment;

    #[test]
    fn test_phone_number_masked() {
        let redactor = Redactor::default();
        let (masked, hits) = redactor.mask("โทร 0812345678 นะ");
        assert_eq!(masked, "โทร ********** นะ");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, "phone");
    }

    #[test]
    fn test_national_id_masked() {
        let redactor = Redactor::default();
        let (masked, hits) = redactor.mask("เลขบัตร 1234567890123");
        assert!(masked.ends_with("*************"));
        assert!(hits.iter().any(|(kind, _, _)| kind == "national_id"));
    }

    #[test]
    fn test_clean_text_untouched() {
        let redactor = Redactor::default();
        let (masked, hits) = redactor.mask("ไปตลาดกัน");
        assert_eq!(masked, "ไปตลาดกัน");
        assert!(hits.is_empty());
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let patterns = vec![RedactPattern {
            name: "broken".to_string(),
            pattern: "(".to_string(),
        }];
        assert!(Redactor::new(&patterns).is_err());
    }

    #[test]
    fn test_stage_preserves_timing_and_raw_text() {
        let audio = DecodedAudio {
            samples: vec![1i16; 16],
            sample_rate: SAMPLE_RATE,
            source_path: None,
        };
        let options = JobOptions {
            enable_redaction: true,
            ..JobOptions::default()
        };
        let mut ctx = JobContext::new(JobId::new(), options, audio);
        ctx.segments = vec![Segment::new(1.25, 4.75, "โทร 0898765432", 0.9)];

        RedactStage::new(Redactor::default())
            .process(&mut ctx)
            .unwrap();

        // Raw text and timing untouched.
        assert_eq!(ctx.segments[0].text, "โทร 0898765432");
        assert_eq!(ctx.segments[0].start, 1.25);
        assert_eq!(ctx.segments[0].end, 4.75);

        let masked = ctx.redacted_segment_texts.as_ref().unwrap();
        assert_eq!(masked[0], "โทร **********");
        assert_eq!(ctx.redaction_markers.len(), 1);
        assert_eq!(ctx.redaction_markers[0].segment_index, 0);
        assert_eq!(ctx.redaction_markers[0].kind, "phone");
    }
}
