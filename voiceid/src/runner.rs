//! Pooled orchestration of verification attempts.
//!
//! One attempt runs the verification computation and, optionally, the
//! liveness computation for a single audio sample as independent jobs on a
//! bounded [`WorkerPool`], joins them on a pool worker, and resolves a
//! one-shot [`ResultHandle`] with the combined outcome. Verify and liveness
//! are comparably expensive CPU-bound computations on the same input, so
//! running them concurrently roughly halves the wall-clock latency of an
//! interactive unlock flow.

use std::sync::Arc;

use crossbeam_channel::bounded;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{Abandoned, TaskError};
use crate::pool::{PoolHandle, WorkerPool};
use crate::registry::EngineRegistry;
use crate::result::{CombinedResult, LivenessResult, VerifyResult};
use crate::sample::AudioSample;
use crate::store::TemplateStore;
use crate::template::{TemplateMode, VoiceTemplate};

/// One-shot handle to the outcome of a verification attempt.
///
/// Resolves exactly once with the combined result, in the context the host
/// awaits it from, never on the worker that produced it. If the attempt
/// fails, the handle yields [`Abandoned`] and the cause goes to the log;
/// callers wanting a hard deadline race the handle against their own timer
/// and discard a late result.
pub struct ResultHandle {
    rx: oneshot::Receiver<CombinedResult>,
}

impl ResultHandle {
    /// Awaits the result.
    pub async fn wait(self) -> Result<CombinedResult, Abandoned> {
        self.rx.await.map_err(|_| Abandoned)
    }

    /// Blocking variant for hosts without an async context.
    ///
    /// Must not be called from an async runtime thread.
    pub fn wait_blocking(self) -> Result<CombinedResult, Abandoned> {
        self.rx.blocking_recv().map_err(|_| Abandoned)
    }
}

/// Runs verification attempts against a shared engine registry and template
/// store.
///
/// The `check_liveness` flag is fixed at construction: it sizes the pool and
/// decides whether the liveness branch runs at all. The pool's lifetime is
/// independent of any single call; [`execute`](Self::execute) is
/// reentrant-safe and the pool is torn down when the runner is dropped
/// (dropping blocks until in-flight attempts finish).
pub struct VerificationRunner {
    registry: Arc<EngineRegistry>,
    store: Arc<dyn TemplateStore>,
    check_liveness: bool,
    pool: WorkerPool,
}

impl VerificationRunner {
    /// Creates a runner whose pool is sized for the task mix: three workers
    /// when liveness is checked (dispatch, verify, liveness), two otherwise,
    /// capped at the hardware concurrency.
    pub fn new(
        registry: Arc<EngineRegistry>,
        store: Arc<dyn TemplateStore>,
        check_liveness: bool,
    ) -> Self {
        let desired = if check_liveness { 3 } else { 2 };
        Self {
            registry,
            store,
            check_liveness,
            pool: WorkerPool::new(desired),
        }
    }

    /// Like [`new`](Self::new) but pins the exact worker count.
    ///
    /// A 1-worker runner serializes its tasks and still completes; only
    /// latency suffers.
    pub fn with_workers(
        registry: Arc<EngineRegistry>,
        store: Arc<dyn TemplateStore>,
        check_liveness: bool,
        workers: usize,
    ) -> Self {
        Self {
            registry,
            store,
            check_liveness,
            pool: WorkerPool::with_workers(workers),
        }
    }

    pub fn check_liveness(&self) -> bool {
        self.check_liveness
    }

    /// Number of pool workers backing this runner.
    pub fn workers(&self) -> usize {
        self.pool.workers()
    }

    /// Schedules one verification attempt and returns immediately.
    ///
    /// A dispatch job fans out the verify task and, when enabled, the
    /// liveness task as independent pool jobs, joins both on a pool worker
    /// (never the caller's thread), and resolves the handle iff every
    /// required task succeeded. The two tasks may complete in either order;
    /// the combined result is materialized only after both have. On any
    /// failure the attempt is abandoned: the error is logged and the handle
    /// yields [`Abandoned`].
    pub fn execute(&self, sample: Arc<AudioSample>, mode: TemplateMode) -> ResultHandle {
        let (result_tx, result_rx) = oneshot::channel();
        let registry = Arc::clone(&self.registry);
        let store = Arc::clone(&self.store);
        let check_liveness = self.check_liveness;
        let pool = self.pool.handle();

        let scheduled = self.pool.submit(move || {
            match run_attempt(&pool, &registry, &store, &sample, mode, check_liveness) {
                Ok(result) => {
                    // The caller may have stopped waiting; a refused send is
                    // its timeout, not our error.
                    let _ = result_tx.send(result);
                }
                Err(err) => warn!(%mode, error = %err, "verification attempt abandoned"),
            }
        });
        if let Err(err) = scheduled {
            warn!(%mode, error = %err, "verification attempt not scheduled");
        }

        ResultHandle { rx: result_rx }
    }
}

/// Dispatch body: fan out, join, combine.
fn run_attempt(
    pool: &PoolHandle,
    registry: &Arc<EngineRegistry>,
    store: &Arc<dyn TemplateStore>,
    sample: &Arc<AudioSample>,
    mode: TemplateMode,
    check_liveness: bool,
) -> Result<CombinedResult, TaskError> {
    let (verify_tx, verify_rx) = bounded(1);
    {
        let registry = Arc::clone(registry);
        let store = Arc::clone(store);
        let sample = Arc::clone(sample);
        pool.submit(move || {
            let _ = verify_tx.send(verify_task(&registry, store.as_ref(), &sample, mode));
        })?;
    }

    let liveness_rx = if check_liveness {
        let (liveness_tx, rx) = bounded(1);
        let registry = Arc::clone(registry);
        let sample = Arc::clone(sample);
        pool.submit(move || {
            let _ = liveness_tx.send(liveness_task(&registry, &sample));
        })?;
        Some(rx)
    } else {
        None
    };

    let verify = pool.help_recv(&verify_rx)??;
    let liveness = match &liveness_rx {
        Some(rx) => Some(pool.help_recv(rx)??),
        None => None,
    };
    Ok(CombinedResult { verify, liveness })
}

fn verify_task(
    registry: &EngineRegistry,
    store: &dyn TemplateStore,
    sample: &AudioSample,
    mode: TemplateMode,
) -> Result<VerifyResult, TaskError> {
    let engine = registry.get_verify_engine(mode)?;
    debug!(%mode, "verify task started");
    // Computing the probe template dominates the cost of this task.
    let probe = engine.create_template(sample)?;
    let enrolled = VoiceTemplate::from_bytes(store.load(mode)?)?;
    Ok(engine.verify(&enrolled, &probe)?)
}

fn liveness_task(
    registry: &EngineRegistry,
    sample: &AudioSample,
) -> Result<LivenessResult, TaskError> {
    let engine = registry.get_liveness_engine()?;
    debug!("liveness task started");
    Ok(engine.check_liveness(sample)?)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::engine::{
        DirAssets, LIVENESS_INIT_DATA, SPEECH_SUMMARY_INIT_DATA, VERIFY_INIT_DATA_16K,
    };
    use crate::registry::EngineRegistry;
    use crate::store::MemoryTemplateStore;
    use crate::stub::StubFactory;

    /// 16 kHz sine burst, loud enough to pass the stub speech gates.
    fn speech_sample(freq_hz: f64, seconds: f64) -> Arc<AudioSample> {
        let rate = 16000u32;
        let n = (seconds * rate as f64) as usize;
        let samples = (0..n)
            .map(|i| {
                let t = i as f64 / rate as f64;
                (16000.0 * (freq_hz * 2.0 * std::f64::consts::PI * t).sin()) as i16
            })
            .collect();
        Arc::new(AudioSample::new(samples, rate))
    }

    fn stub_registry() -> (Arc<EngineRegistry>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        for sub in [
            VERIFY_INIT_DATA_16K,
            LIVENESS_INIT_DATA,
            SPEECH_SUMMARY_INIT_DATA,
        ] {
            fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        let registry = Arc::new(EngineRegistry::new(Box::new(StubFactory)));
        registry
            .init(&DirAssets(dir.path().to_path_buf()))
            .unwrap();
        (registry, dir)
    }

    fn enroll(
        registry: &EngineRegistry,
        store: &dyn TemplateStore,
        mode: TemplateMode,
        sample: &AudioSample,
    ) {
        let engine = registry.get_verify_engine(mode).unwrap();
        let template = engine.create_template(sample).unwrap();
        store.save(mode, template.as_bytes()).unwrap();
    }

    #[tokio::test]
    async fn verify_without_liveness() {
        let (registry, _dir) = stub_registry();
        let store = Arc::new(MemoryTemplateStore::new());
        let sample = speech_sample(220.0, 1.0);
        enroll(&registry, store.as_ref(), TemplateMode::TextIndependent, &sample);

        let runner = VerificationRunner::new(Arc::clone(&registry), store, false);
        let result = runner
            .execute(Arc::clone(&sample), TemplateMode::TextIndependent)
            .wait()
            .await
            .unwrap();

        assert!(result.verify.verified, "same sample must verify");
        assert!(
            result.liveness.is_none(),
            "liveness slot must be absent when not requested"
        );
    }

    #[tokio::test]
    async fn verify_with_liveness() {
        let (registry, _dir) = stub_registry();
        let store = Arc::new(MemoryTemplateStore::new());
        let sample = speech_sample(220.0, 1.0);
        enroll(&registry, store.as_ref(), TemplateMode::TextDependent, &sample);

        let runner = VerificationRunner::new(Arc::clone(&registry), store, true);
        let result = runner
            .execute(Arc::clone(&sample), TemplateMode::TextDependent)
            .wait()
            .await
            .unwrap();

        assert!(result.verify.verified);
        let liveness = result.liveness.expect("liveness slot must be populated");
        assert!(liveness.live, "a clean sine burst is not a spoof");
    }

    #[tokio::test]
    async fn missing_template_abandons_attempt() {
        let (registry, _dir) = stub_registry();
        let store = Arc::new(MemoryTemplateStore::new());
        let sample = speech_sample(220.0, 1.0);
        // No enrollment saved for the requested mode.

        let runner = VerificationRunner::new(registry, store, false);
        let outcome = runner
            .execute(sample, TemplateMode::TextDependent)
            .wait()
            .await;
        assert_eq!(outcome, Err(Abandoned));
    }

    #[tokio::test]
    async fn liveness_failure_abandons_whole_attempt() {
        let (registry, dir) = stub_registry();
        let store = Arc::new(MemoryTemplateStore::new());
        let sample = speech_sample(220.0, 1.0);
        enroll(&registry, store.as_ref(), TemplateMode::TextIndependent, &sample);

        // Break the liveness slot only: remove its init data before the
        // engine is first constructed.
        fs::remove_dir_all(dir.path().join(LIVENESS_INIT_DATA)).unwrap();

        let runner = VerificationRunner::new(registry, store, true);
        let outcome = runner
            .execute(sample, TemplateMode::TextIndependent)
            .wait()
            .await;
        assert_eq!(
            outcome,
            Err(Abandoned),
            "a verify success must not leak through when liveness fails"
        );
    }

    #[tokio::test]
    async fn no_liveness_request_never_touches_liveness_engine() {
        let (registry, dir) = stub_registry();
        let store = Arc::new(MemoryTemplateStore::new());
        let sample = speech_sample(220.0, 1.0);
        enroll(&registry, store.as_ref(), TemplateMode::TextIndependent, &sample);

        // If the runner asked for the liveness engine, construction would
        // fail loudly on the missing init data and abandon the attempt.
        fs::remove_dir_all(dir.path().join(LIVENESS_INIT_DATA)).unwrap();

        let runner = VerificationRunner::new(registry, store, false);
        let result = runner
            .execute(sample, TemplateMode::TextIndependent)
            .wait()
            .await
            .unwrap();
        assert!(result.liveness.is_none());
    }

    #[tokio::test]
    async fn single_worker_serializes_without_deadlock() {
        let (registry, _dir) = stub_registry();
        let store = Arc::new(MemoryTemplateStore::new());
        let sample = speech_sample(330.0, 1.0);
        enroll(&registry, store.as_ref(), TemplateMode::TextIndependent, &sample);

        // Simulated 1-core host: dispatch, verify, and liveness all share
        // one worker.
        let runner = VerificationRunner::with_workers(registry, store, true, 1);
        assert_eq!(runner.workers(), 1);

        let result = runner
            .execute(sample, TemplateMode::TextIndependent)
            .wait()
            .await
            .unwrap();
        assert!(result.verify.verified);
        assert!(result.liveness.is_some());
    }

    #[tokio::test]
    async fn concurrent_matches_sequential() {
        let (registry, _dir) = stub_registry();
        let store = Arc::new(MemoryTemplateStore::new());
        let sample = speech_sample(440.0, 1.0);
        enroll(&registry, store.as_ref(), TemplateMode::TextIndependent, &sample);

        // Sequential reference: run both computations inline.
        let verify_engine = registry
            .get_verify_engine(TemplateMode::TextIndependent)
            .unwrap();
        let probe = verify_engine.create_template(&sample).unwrap();
        let enrolled =
            VoiceTemplate::from_bytes(store.load(TemplateMode::TextIndependent).unwrap()).unwrap();
        let sequential_verify = verify_engine.verify(&enrolled, &probe).unwrap();
        let sequential_liveness = registry
            .get_liveness_engine()
            .unwrap()
            .check_liveness(&sample)
            .unwrap();

        let runner = VerificationRunner::new(Arc::clone(&registry), store, true);
        let concurrent = runner
            .execute(Arc::clone(&sample), TemplateMode::TextIndependent)
            .wait()
            .await
            .unwrap();

        assert_eq!(concurrent.verify, sequential_verify);
        assert_eq!(concurrent.liveness, Some(sequential_liveness));
    }

    #[test]
    fn blocking_wait_works_without_runtime() {
        let (registry, _dir) = stub_registry();
        let store = Arc::new(MemoryTemplateStore::new());
        let sample = speech_sample(220.0, 0.5);
        enroll(&registry, store.as_ref(), TemplateMode::TextIndependent, &sample);

        let runner = VerificationRunner::new(registry, store, false);
        let result = runner
            .execute(sample, TemplateMode::TextIndependent)
            .wait_blocking()
            .unwrap();
        assert!(result.verify.verified);
    }

    #[tokio::test]
    async fn runner_is_reusable_across_attempts() {
        let (registry, _dir) = stub_registry();
        let store = Arc::new(MemoryTemplateStore::new());
        let sample = speech_sample(220.0, 1.0);
        enroll(&registry, store.as_ref(), TemplateMode::TextIndependent, &sample);

        let runner = VerificationRunner::new(Arc::clone(&registry), store, true);
        for _ in 0..3 {
            let result = runner
                .execute(Arc::clone(&sample), TemplateMode::TextIndependent)
                .wait()
                .await
                .unwrap();
            assert!(result.verify.verified);
        }
    }

    #[tokio::test]
    async fn overlapping_attempts_resolve_independently() {
        let (registry, _dir) = stub_registry();
        let store = Arc::new(MemoryTemplateStore::new());
        let matching = speech_sample(220.0, 1.0);
        let other = speech_sample(3500.0, 1.0);
        enroll(&registry, store.as_ref(), TemplateMode::TextIndependent, &matching);

        let runner = VerificationRunner::new(Arc::clone(&registry), store, false);
        let first = runner.execute(Arc::clone(&matching), TemplateMode::TextIndependent);
        let second = runner.execute(Arc::clone(&other), TemplateMode::TextIndependent);

        let first = first.wait().await.unwrap();
        let second = second.wait().await.unwrap();
        assert!(first.verify.verified);
        assert!(
            second.verify.score <= first.verify.score,
            "a very different signal must not outscore the enrolled one"
        );
    }
}
