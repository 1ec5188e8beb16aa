//! Background model loads
//!
//! A load runs on its own thread and hands back a `PendingModel` the frame
//! loop polls, so the view keeps rendering while assets stream in. Progress
//! is published through a shared atomic the loader reads from any thread.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[cfg(not(target_arch = "wasm32"))]
use std::sync::mpsc::{channel, Receiver, TryRecvError};
#[cfg(not(target_arch = "wasm32"))]
use std::thread;

use crate::config::StageId;
use crate::error::AssetError;
use crate::scene::Model;

pub type LoadResult = Result<Model, AssetError>;

/// Load fraction in [0, 1] shared between a load thread and the loader
#[derive(Debug, Clone, Default)]
pub struct Progress(Arc<AtomicU32>);

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, fraction: f32) {
        self.0.store(fraction.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// A model load that may still be running
pub struct PendingModel {
    stage: StageId,
    #[cfg(not(target_arch = "wasm32"))]
    receiver: Option<Receiver<LoadResult>>,
    result: Option<LoadResult>,
}

impl PendingModel {
    /// Already finished (cache hit, placeholder, or a host without threads)
    pub fn ready(stage: StageId, result: LoadResult) -> Self {
        Self {
            stage,
            #[cfg(not(target_arch = "wasm32"))]
            receiver: None,
            result: Some(result),
        }
    }

    /// Run `job` on a background thread
    #[cfg(not(target_arch = "wasm32"))]
    pub fn spawn<F>(stage: StageId, job: F) -> Self
    where
        F: FnOnce() -> LoadResult + Send + 'static,
    {
        let (sender, receiver) = channel();
        thread::spawn(move || {
            let _ = sender.send(job());
        });
        Self {
            stage,
            receiver: Some(receiver),
            result: None,
        }
    }

    #[cfg(target_arch = "wasm32")]
    pub fn spawn<F>(stage: StageId, job: F) -> Self
    where
        F: FnOnce() -> LoadResult + Send + 'static,
    {
        let result = job();
        Self::ready(stage, result)
    }

    pub fn stage(&self) -> &StageId {
        &self.stage
    }

    /// Check the channel without blocking
    pub fn is_complete(&mut self) -> bool {
        if self.result.is_some() {
            return true;
        }
        #[cfg(not(target_arch = "wasm32"))]
        if let Some(receiver) = &self.receiver {
            let result = match receiver.try_recv() {
                Ok(result) => result,
                Err(TryRecvError::Empty) => return false,
                // Load thread panicked before sending
                Err(TryRecvError::Disconnected) => Err(AssetError::load_failed(&self.stage, "load thread stopped")),
            };
            self.receiver = None;
            self.result = Some(result);
        }
        self.result.is_some()
    }

    /// Take the result once it is in. Returns None while the load runs and
    /// after the result has been taken.
    pub fn poll(&mut self) -> Option<LoadResult> {
        if self.is_complete() {
            self.result.take()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn wait(pending: &mut PendingModel) -> LoadResult {
        let start = Instant::now();
        loop {
            if let Some(result) = pending.poll() {
                return result;
            }
            assert!(start.elapsed() < Duration::from_secs(5), "load never finished");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_progress_is_clamped() {
        let p = Progress::new();
        assert_eq!(p.get(), 0.0);
        p.set(1.5);
        assert_eq!(p.clone().get(), 1.0);
    }

    #[test]
    fn test_spawned_job_is_polled_once() {
        let stage = StageId::from("baby");
        let mut pending = PendingModel::spawn(stage.clone(), move || Ok(Model::new("m", StageId::from("baby"))));
        let model = wait(&mut pending).expect("model");
        assert_eq!(model.stage, stage);
        assert!(pending.poll().is_none());
    }

    #[test]
    fn test_panicking_job_reports_failure() {
        let mut pending = PendingModel::spawn(StageId::from("teen"), || panic!("boom"));
        assert!(matches!(wait(&mut pending), Err(AssetError::LoadFailed { .. })));
    }

    #[test]
    fn test_taken_result_is_not_replaced() {
        let mut pending = PendingModel::spawn(StageId::from("adult"), || Ok(Model::new("m", StageId::from("adult"))));
        assert!(wait(&mut pending).is_ok());
        for _ in 0..3 {
            assert!(!pending.is_complete());
            assert!(pending.poll().is_none());
        }
    }
}
