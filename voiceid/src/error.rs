use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::template::TemplateMode;

/// Errors surfaced by the black-box computation engines.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Initialization data for an engine is missing or unreadable.
    #[error("engine init data missing or unreadable: {path}")]
    InitData {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("audio too short: need at least {min_samples} samples, got {got_samples}")]
    AudioTooShort {
        min_samples: usize,
        got_samples: usize,
    },

    /// Any other failure inside an engine computation.
    #[error("engine failure: {0}")]
    Failed(String),
}

/// Errors returned by the engine registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// An engine was requested before the assets directory was recorded.
    #[error("engine registry not initialized: call init() first")]
    NotInitialized,

    /// Engine construction failed. The slot stays empty, so a later call
    /// retries construction.
    #[error("engine init failed: {0}")]
    EngineInit(#[from] EngineError),
}

/// Errors from decoding a persisted voice template.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("voice template blob is empty")]
    Empty,
}

/// Errors returned by a template store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no enrollment template stored for {mode} mode")]
    NotFound { mode: TemplateMode },

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Any error that aborts a verification attempt.
///
/// Task errors are caught at the task boundary and logged; they never cross
/// a worker thread as a panic.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("template store error: {0}")]
    Store(#[from] StoreError),

    #[error("malformed voice template: {0}")]
    Template(#[from] TemplateError),

    #[error("worker pool is shut down")]
    PoolClosed,
}

/// The verification attempt failed and its handle will never resolve.
///
/// The underlying [`TaskError`] goes to the log, not to the caller; a caller
/// that needs a hard failure signal races the handle against its own timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("verification attempt abandoned")]
pub struct Abandoned;
