//! Executor seam for renewal cycles.
//!
//! Each renewal is handed to a [`Spawner`] as soon as it is claimed, so it runs to completion
//! even when every caller waiting on it is dropped or aborted. Callers only observe the outcome.

// crates.io
use futures::task::{FutureObj, Spawn, SpawnError};
// self
use crate::_prelude::*;

/// Shared handle to the executor renewal cycles run on.
///
/// Any [`Spawn`] implementation works, e.g. `futures::executor::ThreadPool` for transports that do
/// not depend on a specific runtime.
pub type Spawner = Arc<dyn Spawn + Send + Sync>;

/// [`Spawn`] adapter over the ambient Tokio runtime.
///
/// Spawning outside a runtime context fails with [`SpawnError::shutdown`].
#[cfg(any(test, feature = "reqwest"))]
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSpawner;
#[cfg(any(test, feature = "reqwest"))]
impl TokioSpawner {
	/// Returns the adapter as a shareable [`Spawner`].
	pub fn shared() -> Spawner {
		Arc::new(Self)
	}
}
#[cfg(any(test, feature = "reqwest"))]
impl Spawn for TokioSpawner {
	fn spawn_obj(&self, future: FutureObj<'static, ()>) -> Result<(), SpawnError> {
		let handle = tokio::runtime::Handle::try_current().map_err(|_| SpawnError::shutdown())?;

		handle.spawn(future);

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicBool, Ordering};
	// crates.io
	use futures::task::SpawnExt;
	// self
	use super::*;

	#[test]
	fn spawning_without_runtime_reports_shutdown() {
		let err = TokioSpawner.spawn(async {}).expect_err("No runtime is running.");

		assert!(err.is_shutdown());
	}

	#[tokio::test]
	async fn spawned_work_runs_on_the_ambient_runtime() {
		let ran = Arc::new(AtomicBool::new(false));
		let flag = ran.clone();

		TokioSpawner::shared()
			.spawn(async move { flag.store(true, Ordering::SeqCst) })
			.expect("Spawn inside a runtime should succeed.");
		tokio::time::sleep(std::time::Duration::from_millis(10)).await;

		assert!(ran.load(Ordering::SeqCst));
	}
}
