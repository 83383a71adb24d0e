//! Deterministic stand-in engines built on cheap signal statistics.
//!
//! The real biometric engines are vendor SDKs consumed behind this crate's
//! engine traits. The stubs here implement the same traits with simple
//! energy statistics: enough to drive the orchestration layer end-to-end in
//! tests, demos, and benches, with fully deterministic output (same audio
//! in, same bytes out). They are not biometric algorithms.

use std::path::Path;
use std::sync::Arc;

use crate::engine::{
    EngineFactory, LivenessEngine, SummaryEngine, VerifyEngine, VerifyMethod,
};
use crate::error::EngineError;
use crate::result::{LivenessResult, SpeechSummary, VerifyResult};
use crate::sample::AudioSample;
use crate::template::VoiceTemplate;

/// Minimum clip length for a meaningful statistic (250ms @ 16kHz).
const MIN_SAMPLES: usize = 4000;

/// Cosine-similarity score at or above which the stub verifies.
const VERIFY_THRESHOLD: f32 = 0.85;

/// Spoof score at or above which the stub rejects liveness.
const SPOOF_THRESHOLD: f32 = 0.5;

/// Frame RMS above which a frame counts as speech.
const SPEECH_RMS: f32 = 0.02;

/// Envelope bins in the content-matching feature block.
const ENVELOPE_BINS: usize = 8;

/// Builds the stub engines.
///
/// Init-data paths are validated for existence even though the stubs read
/// nothing from them, so registry init-failure paths behave as they would
/// with a real SDK.
pub struct StubFactory;

fn check_init_data(path: &Path) -> Result<(), EngineError> {
    std::fs::metadata(path)
        .map(drop)
        .map_err(|source| EngineError::InitData {
            path: path.to_path_buf(),
            source,
        })
}

impl EngineFactory for StubFactory {
    fn verify_engine(
        &self,
        init_data: &Path,
        methods: &[VerifyMethod],
    ) -> Result<Arc<dyn VerifyEngine>, EngineError> {
        check_init_data(init_data)?;
        Ok(Arc::new(StubVerifyEngine {
            methods: methods.to_vec(),
        }))
    }

    fn liveness_engine(&self, init_data: &Path) -> Result<Arc<dyn LivenessEngine>, EngineError> {
        check_init_data(init_data)?;
        Ok(Arc::new(StubLivenessEngine))
    }

    fn summary_engine(&self, init_data: &Path) -> Result<Arc<dyn SummaryEngine>, EngineError> {
        check_init_data(init_data)?;
        Ok(Arc::new(StubSummaryEngine))
    }
}

/// Verify engine over a small feature vector.
///
/// The feature layout follows the sub-method set the engine was constructed
/// with: content matching contributes an 8-bin time envelope (a crude
/// phrase signature), content-independent comparison contributes global
/// statistics (RMS, zero-crossing rate, first-difference RMS). Templates
/// from an engine with a different method set have a different length and
/// are rejected at comparison time.
pub struct StubVerifyEngine {
    methods: Vec<VerifyMethod>,
}

impl StubVerifyEngine {
    fn feature_dim(&self) -> usize {
        self.methods
            .iter()
            .map(|method| match method {
                VerifyMethod::ContentMatching => ENVELOPE_BINS,
                VerifyMethod::ContentIndependent => 3,
            })
            .sum()
    }

    fn features(&self, sample: &AudioSample) -> Result<Vec<f32>, EngineError> {
        let signal = normalized(sample)?;
        let mut features = Vec::with_capacity(self.feature_dim());
        for method in &self.methods {
            match method {
                VerifyMethod::ContentMatching => features.extend(envelope(&signal)),
                VerifyMethod::ContentIndependent => {
                    features.push(rms(&signal));
                    features.push(zero_crossing_rate(&signal));
                    features.push(diff_rms(&signal));
                }
            }
        }
        Ok(features)
    }
}

impl VerifyEngine for StubVerifyEngine {
    fn create_template(&self, sample: &AudioSample) -> Result<VoiceTemplate, EngineError> {
        let features = self.features(sample)?;
        let mut bytes = Vec::with_capacity(features.len() * 4);
        for value in features {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        VoiceTemplate::from_bytes(bytes).map_err(|err| EngineError::Failed(err.to_string()))
    }

    fn verify(
        &self,
        enrolled: &VoiceTemplate,
        probe: &VoiceTemplate,
    ) -> Result<VerifyResult, EngineError> {
        let enrolled = decode_features(enrolled, self.feature_dim())?;
        let probe = decode_features(probe, self.feature_dim())?;
        let score = ((cosine(&enrolled, &probe) + 1.0) / 2.0).clamp(0.0, 1.0);
        Ok(VerifyResult {
            score,
            verified: score >= VERIFY_THRESHOLD,
        })
    }
}

/// Liveness engine over clipping and DC-offset heuristics.
///
/// Replayed audio that went through a small speaker tends to clip and to
/// carry a DC bias; a clean capture has neither.
pub struct StubLivenessEngine;

impl LivenessEngine for StubLivenessEngine {
    fn check_liveness(&self, sample: &AudioSample) -> Result<LivenessResult, EngineError> {
        let signal = normalized(sample)?;
        let clipped = signal.iter().filter(|v| v.abs() >= 0.995).count();
        let clip_ratio = clipped as f32 / signal.len() as f32;
        let dc_bias = (signal.iter().sum::<f32>() / signal.len() as f32).abs();
        let score = (3.0 * clip_ratio + 2.0 * dc_bias).clamp(0.0, 1.0);
        Ok(LivenessResult {
            score,
            live: score < SPOOF_THRESHOLD,
        })
    }
}

/// Summary engine counting frames whose RMS clears a speech floor.
pub struct StubSummaryEngine;

impl SummaryEngine for StubSummaryEngine {
    fn summarize(&self, sample: &AudioSample) -> Result<SpeechSummary, EngineError> {
        let signal = normalized(sample)?;
        // 25ms frames at the sample's own rate.
        let frame_len = (sample.sample_rate() as usize / 40).max(1);
        let ms_per_sample = 1000.0 / sample.sample_rate() as f32;

        let mut speech_ms = 0.0f32;
        for frame in signal.chunks(frame_len) {
            if rms(frame) > SPEECH_RMS {
                speech_ms += frame.len() as f32 * ms_per_sample;
            }
        }
        Ok(SpeechSummary {
            speech_ms,
            total_ms: sample.duration_ms() as f32,
        })
    }
}

/// PCM16 -> [-1, 1] floats, with the short-clip guard every stub shares.
fn normalized(sample: &AudioSample) -> Result<Vec<f32>, EngineError> {
    if sample.len() < MIN_SAMPLES {
        return Err(EngineError::AudioTooShort {
            min_samples: MIN_SAMPLES,
            got_samples: sample.len(),
        });
    }
    Ok(sample
        .samples()
        .iter()
        .map(|&s| s as f32 / 32768.0)
        .collect())
}

fn rms(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    (signal.iter().map(|v| v * v).sum::<f32>() / signal.len() as f32).sqrt()
}

/// Sign changes per sample, in [0, 1].
fn zero_crossing_rate(signal: &[f32]) -> f32 {
    if signal.len() < 2 {
        return 0.0;
    }
    let crossings = signal
        .windows(2)
        .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
        .count();
    crossings as f32 / (signal.len() - 1) as f32
}

/// RMS of the first difference; a crude high-frequency energy proxy.
fn diff_rms(signal: &[f32]) -> f32 {
    if signal.len() < 2 {
        return 0.0;
    }
    let diffs: Vec<f32> = signal.windows(2).map(|pair| pair[1] - pair[0]).collect();
    rms(&diffs)
}

/// Per-bin RMS over equal time slices, normalized by the overall RMS.
fn envelope(signal: &[f32]) -> Vec<f32> {
    let overall = rms(signal);
    if overall == 0.0 {
        return vec![0.0; ENVELOPE_BINS];
    }
    let bin_len = (signal.len() / ENVELOPE_BINS).max(1);
    let mut bins: Vec<f32> = signal
        .chunks(bin_len)
        .take(ENVELOPE_BINS)
        .map(|bin| rms(bin) / overall)
        .collect();
    bins.resize(ENVELOPE_BINS, 0.0);
    bins
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn decode_features(template: &VoiceTemplate, expected: usize) -> Result<Vec<f32>, EngineError> {
    let bytes = template.as_bytes();
    if bytes.len() % 4 != 0 {
        return Err(EngineError::Failed("template bytes truncated".into()));
    }
    let features: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    if features.len() != expected {
        return Err(EngineError::Failed(format!(
            "template has {} features, engine expects {expected}",
            features.len()
        )));
    }
    Ok(features)
}
