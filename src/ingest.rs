//! Audio ingest adapter: decodes uploads into canonical 16 kHz mono PCM.

use crate::defaults::SAMPLE_RATE;
use crate::error::{Result, ScribedError};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Decoded audio in canonical form: 16 kHz mono 16-bit PCM.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    /// Original file the audio was decoded from, when known. Engines may use
    /// it to locate sidecar data (e.g. fixture transcripts).
    pub source_path: Option<PathBuf>,
}

impl DecodedAudio {
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decodes WAV data from any reader, downmixing stereo and resampling to
/// the canonical rate. Corrupt or empty input is a validation failure.
pub fn decode_wav(reader: Box<dyn Read + Send>) -> Result<DecodedAudio> {
    let mut wav_reader = hound::WavReader::new(reader).map_err(|e| ScribedError::Validation {
        message: format!("failed to parse WAV data: {e}"),
    })?;

    let spec = wav_reader.spec();
    let source_rate = spec.sample_rate;
    let source_channels = spec.channels;

    if source_channels == 0 || source_channels > 2 {
        return Err(ScribedError::Validation {
            message: format!("unsupported channel count: {source_channels}"),
        });
    }

    let raw_samples: Vec<i16> = wav_reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| ScribedError::Validation {
            message: format!("failed to read WAV samples: {e}"),
        })?;

    if raw_samples.is_empty() {
        return Err(ScribedError::Validation {
            message: "WAV data contains no samples".to_string(),
        });
    }

    let mono_samples = if source_channels == 2 {
        raw_samples
            .chunks_exact(2)
            .map(|chunk| {
                let left = chunk[0] as i32;
                let right = chunk[1] as i32;
                ((left + right) / 2) as i16
            })
            .collect()
    } else {
        raw_samples
    };

    let samples = if source_rate != SAMPLE_RATE {
        resample(&mono_samples, source_rate, SAMPLE_RATE)
    } else {
        mono_samples
    };

    Ok(DecodedAudio {
        samples,
        sample_rate: SAMPLE_RATE,
        source_path: None,
    })
}

/// Decodes a WAV file from disk, remembering the source path.
pub fn decode_wav_file(path: &Path) -> Result<DecodedAudio> {
    let file = std::fs::File::open(path)?;
    let mut audio = decode_wav(Box::new(std::io::BufReader::new(file)))?;
    audio.source_path = Some(path.to_path_buf());
    Ok(audio)
}

/// Writes canonical audio to a scratch WAV so workers can reload it without
/// re-validating the upload.
pub fn write_canonical(path: &Path, audio: &DecodedAudio) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ScribedError::Storage {
            message: format!("failed to create scratch dir {}: {e}", parent.display()),
        })?;
    }
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).map_err(|e| ScribedError::Storage {
        message: format!("failed to create scratch WAV {}: {e}", path.display()),
    })?;
    for &sample in &audio.samples {
        writer.write_sample(sample).map_err(|e| ScribedError::Storage {
            message: format!("failed to write scratch WAV {}: {e}", path.display()),
        })?;
    }
    writer.finalize().map_err(|e| ScribedError::Storage {
        message: format!("failed to finalize scratch WAV {}: {e}", path.display()),
    })?;
    Ok(())
}

/// Reloads canonical audio written by [`write_canonical`].
pub fn load_canonical(path: &Path) -> Result<DecodedAudio> {
    decode_wav_file(path)
}

/// Simple linear interpolation resampling.
fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = source_pos.floor() as usize;
            let fraction = source_pos - source_idx as f64;

            if source_idx + 1 >= samples.len() {
                samples[samples.len() - 1]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as i16
            }
        })
        .collect()
}
