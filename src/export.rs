//! Result assembly and artifact export.
//!
//! Renders a finished job's transcript into the supported output formats and
//! writes content-hashed artifact files. Export is idempotent: an unchanged
//! result re-renders byte-identically and reuses the existing artifact
//! record; a changed result gets a new artifact version.

use crate::context::JobContext;
use crate::error::{Result, ScribedError};
use crate::types::{Segment, full_text};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    Txt,
    Srt,
    Vtt,
    Jsonl,
}

impl ArtifactFormat {
    pub const ALL: [ArtifactFormat; 4] = [
        ArtifactFormat::Txt,
        ArtifactFormat::Srt,
        ArtifactFormat::Vtt,
        ArtifactFormat::Jsonl,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactFormat::Txt => "txt",
            ArtifactFormat::Srt => "srt",
            ArtifactFormat::Vtt => "vtt",
            ArtifactFormat::Jsonl => "jsonl",
        }
    }
}

impl FromStr for ArtifactFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "txt" => Ok(ArtifactFormat::Txt),
            "srt" => Ok(ArtifactFormat::Srt),
            "vtt" => Ok(ArtifactFormat::Vtt),
            "jsonl" => Ok(ArtifactFormat::Jsonl),
            other => Err(format!("unknown artifact format '{other}'")),
        }
    }
}

impl fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which text variant to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TextVariant {
    #[default]
    Standard,
    Dialect,
}

/// One generated output file. Immutable once written; regeneration with
/// different content creates a new version instead of mutating in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub format: ArtifactFormat,
    pub variant: TextVariant,
    pub redacted: bool,
    pub path: PathBuf,
    pub sha256: String,
    pub version: u32,
    pub created_at: DateTime<Utc>,
}

/// Canonical result of a successful pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledResult {
    pub job_id: String,
    pub text: String,
    pub segments: Vec<Segment>,
    pub dialect_text: Option<String>,
    pub dialect_segment_texts: Option<Vec<String>>,
    pub redacted_segment_texts: Option<Vec<String>>,
}

impl AssembledResult {
    pub fn from_context(ctx: &JobContext) -> Self {
        Self {
            job_id: ctx.job_id.to_string(),
            text: full_text(&ctx.segments),
            segments: ctx.segments.clone(),
            dialect_text: ctx.dialect_text.clone(),
            dialect_segment_texts: ctx.dialect_segment_texts.clone(),
            redacted_segment_texts: ctx.redacted_segment_texts.clone(),
        }
    }

    /// Per-segment text for the requested variant, with masks applied when
    /// `redacted` is set. Fails when the job was not run with the stage that
    /// produces the variant.
    fn segment_texts(&self, variant: TextVariant, redacted: bool) -> Result<Vec<String>> {
        let base: Vec<String> = match variant {
            TextVariant::Standard => self.segments.iter().map(|s| s.text.clone()).collect(),
            TextVariant::Dialect => self
                .dialect_segment_texts
                .clone()
                .ok_or_else(|| ScribedError::Validation {
                    message: "dialect variant not available: dialect mapping was not enabled"
                        .to_string(),
                })?,
        };
        if !redacted {
            return Ok(base);
        }
        let masked = self
            .redacted_segment_texts
            .as_ref()
            .ok_or_else(|| ScribedError::Validation {
                message: "redacted variant not available: redaction was not enabled".to_string(),
            })?;
        // Masks are computed over the standard text; serving it for the
        // dialect variant too is the conservative choice.
        Ok(masked.clone())
    }
}

/// `HH:MM:SS` + millisecond part with the given separator (`,` srt, `.` vtt).
fn format_timestamp(seconds: f64, millis_sep: char) -> String {
    let total_millis = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_millis / 3_600_000;
    let minutes = (total_millis % 3_600_000) / 60_000;
    let secs = (total_millis % 60_000) / 1000;
    let millis = total_millis % 1000;
    format!("{hours:02}:{minutes:02}:{secs:02}{millis_sep}{millis:03}")
}

fn speaker_prefix(segment: &Segment) -> String {
    segment
        .speaker
        .as_deref()
        .map(|s| format!("{s}: "))
        .unwrap_or_default()
}

/// Renders the result into the requested format/variant as a string.
pub fn render(
    result: &AssembledResult,
    format: ArtifactFormat,
    variant: TextVariant,
    redacted: bool,
) -> Result<String> {
    let texts = result.segment_texts(variant, redacted)?;
    match format {
        ArtifactFormat::Txt => Ok(render_txt(&texts)),
        ArtifactFormat::Srt => Ok(render_srt(&result.segments, &texts)),
        ArtifactFormat::Vtt => Ok(render_vtt(&result.segments, &texts)),
        ArtifactFormat::Jsonl => render_jsonl(result, &texts),
    }
}

fn render_txt(texts: &[String]) -> String {
    let mut out = texts
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

fn render_srt(segments: &[Segment], texts: &[String]) -> String {
    let mut lines = Vec::new();
    for (index, (segment, text)) in segments.iter().zip(texts).enumerate() {
        lines.push((index + 1).to_string());
        lines.push(format!(
            "{} --> {}",
            format_timestamp(segment.start, ','),
            format_timestamp(segment.end, ',')
        ));
        lines.push(format!("{}{}", speaker_prefix(segment), text));
        lines.push(String::new());
    }
    lines.join("\n").trim_end().to_string()
}

fn render_vtt(segments: &[Segment], texts: &[String]) -> String {
    let mut lines = vec!["WEBVTT".to_string(), String::new()];
    for (segment, text) in segments.iter().zip(texts) {
        lines.push(format!(
            "{} --> {}",
            format_timestamp(segment.start, '.'),
            format_timestamp(segment.end, '.')
        ));
        lines.push(format!("{}{}", speaker_prefix(segment), text));
        lines.push(String::new());
    }
    lines.join("\n").trim_end().to_string()
}

#[derive(Serialize)]
struct JsonlRecord<'a> {
    job_id: &'a str,
    start: f64,
    end: f64,
    text: &'a str,
    speaker: Option<&'a str>,
    confidence: f64,
    language: Option<&'a str>,
}

fn render_jsonl(result: &AssembledResult, texts: &[String]) -> Result<String> {
    let mut out = String::new();
    for (segment, text) in result.segments.iter().zip(texts) {
        let record = JsonlRecord {
            job_id: &result.job_id,
            start: segment.start,
            end: segment.end,
            text,
            speaker: segment.speaker.as_deref(),
            confidence: segment.confidence,
            language: segment.language.as_deref(),
        };
        let line = serde_json::to_string(&record).map_err(|e| ScribedError::Storage {
            message: format!("failed to encode JSONL record: {e}"),
        })?;
        out.push_str(&line);
        out.push('\n');
    }
    Ok(out)
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Writes artifacts under `<out_dir>/<job_id>/`.
pub struct Exporter {
    out_dir: PathBuf,
}

impl Exporter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    fn file_name(format: ArtifactFormat, variant: TextVariant, redacted: bool, version: u32) -> String {
        let mut name = String::from("transcript");
        if variant == TextVariant::Dialect {
            name.push_str(".dialect");
        }
        if redacted {
            name.push_str(".redacted");
        }
        if version > 1 {
            name.push_str(&format!(".v{version}"));
        }
        name.push('.');
        name.push_str(format.as_str());
        name
    }

    /// Renders and writes one artifact. When an existing artifact record for
    /// the same format/variant already matches the content hash, no file is
    /// written and the existing record is returned unchanged.
    pub fn export(
        &self,
        result: &AssembledResult,
        format: ArtifactFormat,
        variant: TextVariant,
        redacted: bool,
        existing: &[Artifact],
    ) -> Result<(Artifact, bool)> {
        let rendered = render(result, format, variant, redacted)?;
        let hash = sha256_hex(rendered.as_bytes());

        let latest = existing
            .iter()
            .filter(|a| a.format == format && a.variant == variant && a.redacted == redacted)
            .max_by_key(|a| a.version);
        if let Some(artifact) = latest {
            if artifact.sha256 == hash {
                return Ok((artifact.clone(), true));
            }
        }
        let version = latest.map(|a| a.version + 1).unwrap_or(1);

        let job_dir = self.out_dir.join(&result.job_id);
        std::fs::create_dir_all(&job_dir).map_err(|e| ScribedError::Storage {
            message: format!("failed to create artifact dir {}: {e}", job_dir.display()),
        })?;
        let path = job_dir.join(Self::file_name(format, variant, redacted, version));
        std::fs::write(&path, rendered.as_bytes()).map_err(|e| ScribedError::Storage {
            message: format!("failed to write artifact {}: {e}", path.display()),
        })?;

        Ok((
            Artifact {
                format,
                variant,
                redacted,
                path,
                sha256: hash,
                version,
                created_at: Utc::now(),
            },
            false,
        ))
    }

    /// Reads a previously written artifact's bytes.
    pub fn read(&self, artifact: &Artifact) -> Result<Vec<u8>> {
        std::fs::read(&artifact.path).map_err(|e| ScribedError::Storage {
            message: format!("failed to read artifact {}: {e}", artifact.path.display()),
        })
    }
}
