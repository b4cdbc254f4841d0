//! Stands in for the original design's single GPU device stream (spec.md
//! §5): one coordinating driver issuing ordered, data-parallel work over
//! shared buffers, with explicit synchronization points between stages.
//! Here that's a dedicated `rayon::ThreadPool` the orchestrator installs
//! each stage's work onto; barriers are just returning from `run`.

use crate::errors::{QszError, QszResult};

pub struct Stream {
  pool: rayon::ThreadPool,
}

impl Stream {
  pub fn new() -> QszResult<Self> {
    let pool = rayon::ThreadPoolBuilder::new()
      .build()
      .map_err(|e| QszError::device_failure(format!("failed to start compute stream: {}", e)))?;
    Ok(Stream { pool })
  }

  /// Runs `f` to completion on this stream's pool, modeling the
  /// synchronization barrier the orchestrator inserts between stages
  /// that need the previous stage's sizes before launching.
  pub fn run<F, R>(&self, f: F) -> R
  where
    F: FnOnce() -> R + Send,
    R: Send,
  {
    self.pool.install(f)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn runs_work_and_returns_result() {
    let stream = Stream::new().unwrap();
    let sum: i32 = stream.run(|| (1..=100).sum());
    assert_eq!(sum, 5050);
  }
}
