//! Concurrent voice-identity verification core.
//!
//! # Architecture
//!
//! Two components, leaf first:
//!
//! 1. [`EngineRegistry`]: lazily constructs and caches the heavyweight
//!    biometric engines (verification per [`TemplateMode`], liveness, speech
//!    summary) behind per-slot locks, and releases the memory-heavy liveness
//!    engine on demand.
//! 2. [`VerificationRunner`]: schedules the verification computation and,
//!    optionally, the liveness computation for one sample as independent
//!    jobs on a bounded [`WorkerPool`], joins them on a pool worker, and
//!    resolves a one-shot [`ResultHandle`] with the combined outcome exactly
//!    once.
//!
//! The biometric math itself lives behind the [`VerifyEngine`],
//! [`LivenessEngine`], and [`SummaryEngine`] seams; [`stub`] provides
//! deterministic stand-ins so the orchestration runs without a vendor SDK.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use voiceid::{DirAssets, EngineRegistry, TemplateMode, VerificationRunner};
//!
//! let registry = Arc::new(EngineRegistry::new(Box::new(voiceid::stub::StubFactory)));
//! registry.init(&DirAssets(assets_dir))?;
//!
//! let runner = VerificationRunner::new(registry, store, true);
//! let handle = runner.execute(sample, TemplateMode::TextIndependent);
//! let combined = handle.wait().await?;
//! ```

mod engine;
mod error;
mod pool;
mod registry;
mod result;
mod runner;
mod sample;
mod store;
pub mod stub;
mod template;

pub use engine::{
    AssetsProvider, DirAssets, EngineFactory, LivenessEngine, SummaryEngine, VerifyEngine,
    VerifyMethod, LIVENESS_INIT_DATA, SPEECH_SUMMARY_INIT_DATA, VERIFY_INIT_DATA_16K,
};
pub use error::{
    Abandoned, EngineError, RegistryError, StoreError, TaskError, TemplateError,
};
pub use pool::{PoolHandle, WorkerPool};
pub use registry::EngineRegistry;
pub use result::{CombinedResult, LivenessResult, SpeechSummary, VerifyResult};
pub use runner::{ResultHandle, VerificationRunner};
pub use sample::AudioSample;
pub use store::{FileTemplateStore, MemoryTemplateStore, TemplateStore};
pub use template::{TemplateMode, VoiceTemplate};
