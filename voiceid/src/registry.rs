//! Lazy get-or-create cache for the four engine variants.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::engine::{
    AssetsProvider, EngineFactory, LivenessEngine, SummaryEngine, VerifyEngine,
    LIVENESS_INIT_DATA, SPEECH_SUMMARY_INIT_DATA, VERIFY_INIT_DATA_16K,
};
use crate::error::RegistryError;
use crate::template::TemplateMode;

/// Single authority for creating, caching, and releasing the engines.
///
/// Each engine variant lives in its own lock-guarded slot: construction is
/// not idempotent-safe if raced, so concurrent first-uses of one slot
/// serialize, while unrelated slots never block each other. A construction
/// failure leaves its slot empty, so a later call retries; a slot is never
/// left half-constructed.
///
/// The registry is injected (the factory is a constructor argument, and the
/// registry itself is passed to the runner as an `Arc`), not looked up
/// globally, so tests swap in doubles freely. With a single registry per
/// process, at most one instance of each engine variant exists at a time.
pub struct EngineRegistry {
    factory: Box<dyn EngineFactory>,
    assets: Mutex<Option<PathBuf>>,
    verify_td: Mutex<Option<Arc<dyn VerifyEngine>>>,
    verify_ti: Mutex<Option<Arc<dyn VerifyEngine>>>,
    liveness: Mutex<Option<Arc<dyn LivenessEngine>>>,
    summary: Mutex<Option<Arc<dyn SummaryEngine>>>,
}

impl EngineRegistry {
    /// Creates a registry that builds engines with `factory`.
    /// No engine is constructed until first requested.
    pub fn new(factory: Box<dyn EngineFactory>) -> Self {
        Self {
            factory,
            assets: Mutex::new(None),
            verify_td: Mutex::new(None),
            verify_ti: Mutex::new(None),
            liveness: Mutex::new(None),
            summary: Mutex::new(None),
        }
    }

    /// Records the assets directory engines read their init data from.
    ///
    /// Must complete before any `get_*` call. Calling it again replaces the
    /// recorded directory; engines already constructed are unaffected.
    pub fn init(&self, provider: &dyn AssetsProvider) -> Result<(), RegistryError> {
        let dir = provider.assets_dir()?;
        info!(dir = %dir.display(), "engine assets directory recorded");
        *self.assets.lock() = Some(dir);
        Ok(())
    }

    fn assets_dir(&self) -> Result<PathBuf, RegistryError> {
        self.assets.lock().clone().ok_or(RegistryError::NotInitialized)
    }

    /// Returns the cached verification engine for `mode`, constructing it on
    /// first request with the mode's sub-method set.
    pub fn get_verify_engine(
        &self,
        mode: TemplateMode,
    ) -> Result<Arc<dyn VerifyEngine>, RegistryError> {
        let dir = self.assets_dir()?;
        let slot = match mode {
            TemplateMode::TextDependent => &self.verify_td,
            TemplateMode::TextIndependent => &self.verify_ti,
        };
        let mut slot = slot.lock();
        if let Some(engine) = &*slot {
            return Ok(Arc::clone(engine));
        }
        debug!(%mode, "constructing verify engine");
        let engine = self
            .factory
            .verify_engine(&dir.join(VERIFY_INIT_DATA_16K), mode.methods())?;
        *slot = Some(Arc::clone(&engine));
        Ok(engine)
    }

    /// Returns the cached liveness engine, constructing it on first request.
    pub fn get_liveness_engine(&self) -> Result<Arc<dyn LivenessEngine>, RegistryError> {
        let dir = self.assets_dir()?;
        let mut slot = self.liveness.lock();
        if let Some(engine) = &*slot {
            return Ok(Arc::clone(engine));
        }
        debug!("constructing liveness engine");
        let engine = self.factory.liveness_engine(&dir.join(LIVENESS_INIT_DATA))?;
        *slot = Some(Arc::clone(&engine));
        Ok(engine)
    }

    /// Returns the cached speech-summary engine, constructing it on first
    /// request.
    pub fn get_summary_engine(&self) -> Result<Arc<dyn SummaryEngine>, RegistryError> {
        let dir = self.assets_dir()?;
        let mut slot = self.summary.lock();
        if let Some(engine) = &*slot {
            return Ok(Arc::clone(engine));
        }
        debug!("constructing speech-summary engine");
        let engine = self
            .factory
            .summary_engine(&dir.join(SPEECH_SUMMARY_INIT_DATA))?;
        *slot = Some(Arc::clone(&engine));
        Ok(engine)
    }

    /// Drops the cached liveness engine; it is unusually memory-heavy.
    ///
    /// An in-flight computation that already cloned the reference finishes
    /// unaffected; the memory is reclaimed once the last clone is gone. The
    /// next [`get_liveness_engine`](Self::get_liveness_engine) constructs a
    /// fresh instance.
    pub fn release_liveness_engine(&self) {
        if self.liveness.lock().take().is_some() {
            debug!("liveness engine released");
        }
    }

    /// Drops every cached engine and forgets the assets directory.
    ///
    /// The registry returns to its pre-[`init`](Self::init) state; any
    /// subsequent `get_*` fails with `NotInitialized` until `init` is called
    /// again. In-flight computations holding engine clones finish
    /// unaffected.
    pub fn shutdown(&self) {
        *self.assets.lock() = None;
        *self.verify_td.lock() = None;
        *self.verify_ti.lock() = None;
        *self.liveness.lock() = None;
        *self.summary.lock() = None;
        info!("engine registry shut down");
    }
}
