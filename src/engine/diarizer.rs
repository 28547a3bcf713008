//! Diarization boundary and the energy-based fallback.

use crate::engine::EngineError;
use crate::ingest::DecodedAudio;

/// A time range attributed to one speaker.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeakerTurn {
    pub start: f64,
    pub end: f64,
    pub speaker: String,
}

/// Boundary contract for speaker diarization. The contract is unaffected by
/// whether the implementation is model-backed or the energy fallback.
pub trait Diarizer: Send + Sync {
    fn diarize(&self, audio: &DecodedAudio) -> Result<Vec<SpeakerTurn>, EngineError>;

    fn name(&self) -> &str;
}

/// Lightweight fallback diarizer for environments without a speaker model.
///
/// Splits the signal into RMS-energy windows, groups consecutive voiced
/// windows into turns, and alternates speaker labels across turns separated
/// by silence. Crude, but deterministic and cheap.
#[derive(Debug, Clone)]
pub struct EnergyDiarizer {
    /// Analysis window length in milliseconds.
    pub window_ms: u32,
    /// RMS threshold below which a window counts as silence.
    pub energy_threshold: f64,
    /// Minimum silence gap (seconds) that starts a new turn.
    pub min_gap_secs: f64,
    /// Labels cycle through SPEAKER_00..SPEAKER_{n-1}.
    pub max_speakers: usize,
}

impl Default for EnergyDiarizer {
    fn default() -> Self {
        Self {
            window_ms: 100,
            energy_threshold: 120.0,
            min_gap_secs: 0.6,
            max_speakers: 4,
        }
    }
}

impl EnergyDiarizer {
    fn rms(window: &[i16]) -> f64 {
        if window.is_empty() {
            return 0.0;
        }
        let sum: f64 = window.iter().map(|&s| (s as f64) * (s as f64)).sum();
        (sum / window.len() as f64).sqrt()
    }
}

impl Diarizer for EnergyDiarizer {
    fn diarize(&self, audio: &DecodedAudio) -> Result<Vec<SpeakerTurn>, EngineError> {
        if audio.sample_rate == 0 {
            return Err(EngineError::UnsupportedAudio {
                message: "zero sample rate".to_string(),
            });
        }
        let window_len = (audio.sample_rate as usize * self.window_ms as usize) / 1000;
        if window_len == 0 {
            return Err(EngineError::UnsupportedAudio {
                message: "analysis window shorter than one sample".to_string(),
            });
        }
        let window_secs = window_len as f64 / audio.sample_rate as f64;

        let mut turns: Vec<SpeakerTurn> = Vec::new();
        let mut speaker_index = 0usize;
        let mut current: Option<(f64, f64)> = None;
        let mut silence_run = 0.0f64;

        for (i, window) in audio.samples.chunks(window_len).enumerate() {
            let t0 = i as f64 * window_secs;
            let t1 = t0 + window.len() as f64 / audio.sample_rate as f64;
            if Self::rms(window) >= self.energy_threshold {
                match current.as_mut() {
                    Some((_, end)) => *end = t1,
                    None => current = Some((t0, t1)),
                }
                silence_run = 0.0;
            } else {
                silence_run += window_secs;
                if silence_run >= self.min_gap_secs
                    && let Some((start, end)) = current.take()
                {
                    turns.push(SpeakerTurn {
                        start,
                        end,
                        speaker: format!("SPEAKER_{:02}", speaker_index % self.max_speakers),
                    });
                    speaker_index += 1;
                }
            }
        }
        if let Some((start, end)) = current.take() {
            turns.push(SpeakerTurn {
                start,
                end,
                speaker: format!("SPEAKER_{:02}", speaker_index % self.max_speakers),
            });
        }

        Ok(turns)
    }

    fn name(&self) -> &str {
        "energy"
    }
}

/// Scripted diarizer for unit tests.
#[derive(Debug, Default)]
pub struct MockDiarizer {
    turns: Vec<SpeakerTurn>,
    failure: Option<EngineError>,
}

impl MockDiarizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_turns(mut self, turns: Vec<SpeakerTurn>) -> Self {
        self.turns = turns;
        self
    }

    pub fn with_failure(mut self, failure: EngineError) -> Self {
        self.failure = Some(failure);
        self
    }
}

impl Diarizer for MockDiarizer {
    fn diarize(&self, _audio: &DecodedAudio) -> Result<Vec<SpeakerTurn>, EngineError> {
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        Ok(self.turns.clone())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::SAMPLE_RATE;

    fn audio(samples: Vec<i16>) -> DecodedAudio {
        DecodedAudio {
            samples,
            sample_rate: SAMPLE_RATE,
            source_path: None,
        }
    }

    /// voiced_secs of loud signal, gap_secs of silence, voiced_secs again.
    fn two_bursts(voiced_secs: f64, gap_secs: f64) -> Vec<i16> {
        let voiced = (SAMPLE_RATE as f64 * voiced_secs) as usize;
        let gap = (SAMPLE_RATE as f64 * gap_secs) as usize;
        let mut samples = vec![5000i16; voiced];
        samples.extend(std::iter::repeat_n(0i16, gap));
        samples.extend(std::iter::repeat_n(5000i16, voiced));
        samples
    }

    #[test]
    fn test_energy_diarizer_splits_on_silence_gap() {
        let diarizer = EnergyDiarizer::default();
        let turns = diarizer.diarize(&audio(two_bursts(1.0, 1.0))).unwrap();

        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].speaker, "SPEAKER_00");
        assert_eq!(turns[1].speaker, "SPEAKER_01");
        assert!(turns[0].end <= turns[1].start);
    }

    #[test]
    fn test_energy_diarizer_short_gap_keeps_one_turn() {
        let diarizer = EnergyDiarizer::default();
        let turns = diarizer.diarize(&audio(two_bursts(1.0, 0.2))).unwrap();

        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].speaker, "SPEAKER_00");
    }

    #[test]
    fn test_energy_diarizer_silence_yields_no_turns() {
        let diarizer = EnergyDiarizer::default();
        let turns = diarizer
            .diarize(&audio(vec![0i16; SAMPLE_RATE as usize * 5]))
            .unwrap();
        assert!(turns.is_empty());
    }

    #[test]
    fn test_energy_diarizer_labels_wrap_at_max_speakers() {
        let diarizer = EnergyDiarizer {
            max_speakers: 2,
            ..EnergyDiarizer::default()
        };
        let mut samples = Vec::new();
        for _ in 0..3 {
            samples.extend(two_bursts(0.5, 1.0));
            samples.extend(std::iter::repeat_n(0i16, SAMPLE_RATE as usize));
        }
        let turns = diarizer.diarize(&audio(samples)).unwrap();

        assert!(turns.len() >= 3);
        assert_eq!(turns[2].speaker, "SPEAKER_00");
    }
}
