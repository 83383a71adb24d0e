//! Engine seams: the vendor biometric SDK sits behind these traits.
//!
//! Engines are heavyweight, thread-capable objects constructed once from
//! initialization data on disk and shared read-mostly across calls. The
//! registry owns construction; everything else sees `Arc<dyn ...>`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::EngineError;
use crate::result::{LivenessResult, SpeechSummary, VerifyResult};
use crate::sample::AudioSample;
use crate::template::VoiceTemplate;

/// Subpath under the assets dir holding 16 kHz verification init data.
pub const VERIFY_INIT_DATA_16K: &str = "verify-16k";

/// Subpath under the assets dir holding liveness init data.
pub const LIVENESS_INIT_DATA: &str = "liveness";

/// Subpath under the assets dir holding speech-summary init data.
pub const SPEECH_SUMMARY_INIT_DATA: &str = "speech-summary";

/// A single verification sub-method an engine can combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyMethod {
    /// Matches the spoken content against the enrolled phrase.
    /// Small init data, large templates.
    ContentMatching,
    /// Compares voices regardless of what is said.
    /// Large init data, small templates.
    ContentIndependent,
}

/// Computes voice templates and compares them.
///
/// Implementations must be safe for concurrent use: the verify tasks of
/// overlapping attempts share one instance.
pub trait VerifyEngine: Send + Sync {
    /// Computes a probe template from raw audio.
    ///
    /// CPU-bound; can take hundreds of milliseconds for a few seconds of
    /// audio. Callers run it on a worker, never on a UI thread.
    fn create_template(&self, sample: &AudioSample) -> Result<VoiceTemplate, EngineError>;

    /// Compares an enrolled template against a probe template.
    fn verify(
        &self,
        enrolled: &VoiceTemplate,
        probe: &VoiceTemplate,
    ) -> Result<VerifyResult, EngineError>;
}

/// Judges whether a sample comes from a live speaker or a replay.
pub trait LivenessEngine: Send + Sync {
    fn check_liveness(&self, sample: &AudioSample) -> Result<LivenessResult, EngineError>;
}

/// Measures net speech within a sample.
pub trait SummaryEngine: Send + Sync {
    fn summarize(&self, sample: &AudioSample) -> Result<SpeechSummary, EngineError>;
}

/// Constructs engines from their on-disk initialization data.
///
/// This is the seam to the vendor SDK. The registry owns a factory and calls
/// each method at most once per cached slot; a factory is never asked to
/// construct the same engine twice while the first instance is alive.
pub trait EngineFactory: Send + Sync {
    /// Builds a verification engine combining the given sub-methods.
    fn verify_engine(
        &self,
        init_data: &Path,
        methods: &[VerifyMethod],
    ) -> Result<Arc<dyn VerifyEngine>, EngineError>;

    fn liveness_engine(&self, init_data: &Path) -> Result<Arc<dyn LivenessEngine>, EngineError>;

    fn summary_engine(&self, init_data: &Path) -> Result<Arc<dyn SummaryEngine>, EngineError>;
}

/// Supplies the directory holding engine initialization data.
///
/// The directory must be fully populated before [`EngineRegistry::init`]
/// completes; extracting bundled assets onto the filesystem is the
/// provider's business, not this crate's.
///
/// [`EngineRegistry::init`]: crate::registry::EngineRegistry::init
pub trait AssetsProvider {
    fn assets_dir(&self) -> Result<PathBuf, EngineError>;
}

/// Assets provider backed by an already-populated directory.
pub struct DirAssets(pub PathBuf);

impl AssetsProvider for DirAssets {
    fn assets_dir(&self) -> Result<PathBuf, EngineError> {
        let meta = std::fs::metadata(&self.0).map_err(|source| EngineError::InitData {
            path: self.0.clone(),
            source,
        })?;
        if !meta.is_dir() {
            return Err(EngineError::InitData {
                path: self.0.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotADirectory, "not a directory"),
            });
        }
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dir_assets_missing_dir() {
        let assets = DirAssets(PathBuf::from("/nonexistent/voiceid-assets"));
        assert!(assets.assets_dir().is_err());
    }

    #[test]
    fn dir_assets_resolves() {
        let dir = tempfile::tempdir().unwrap();
        let assets = DirAssets(dir.path().to_path_buf());
        assert_eq!(assets.assets_dir().unwrap(), dir.path());
    }
}
