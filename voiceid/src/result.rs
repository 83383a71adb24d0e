use serde::{Deserialize, Serialize};

/// Outcome of comparing an enrolled template against a probe template.
///
/// Produced exactly once per verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerifyResult {
    /// Similarity in [0, 1]; higher means more likely the same speaker.
    pub score: f32,
    /// Decision at the engine's configured threshold.
    pub verified: bool,
}

/// Outcome of the anti-spoofing judgment for one sample.
///
/// Produced at most once per attempt, only when liveness checking was
/// requested.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LivenessResult {
    /// Spoof probability in [0, 1]; higher means more likely a replay or
    /// synthetic voice.
    pub score: f32,
    /// True when the sample is judged to come from a live speaker.
    pub live: bool,
}

/// The joined outcome of one verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombinedResult {
    pub verify: VerifyResult,
    /// `None` when the attempt ran without a liveness check.
    pub liveness: Option<LivenessResult>,
}

/// Net-speech measurement for one sample.
///
/// Hosts use this to gate recording quality (enough actual speech) before
/// spending an expensive verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeechSummary {
    /// Milliseconds of detected speech.
    pub speech_ms: f32,
    /// Total clip length in milliseconds.
    pub total_ms: f32,
}

impl SpeechSummary {
    /// Fraction of the clip that is speech, in [0, 1].
    pub fn speech_ratio(&self) -> f32 {
        if self.total_ms <= 0.0 {
            return 0.0;
        }
        (self.speech_ms / self.total_ms).clamp(0.0, 1.0)
    }
}
