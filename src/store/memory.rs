//! Thread-safe in-memory [`CredentialStore`] for tests, demos, and ephemeral sessions.

// self
use crate::{
	_prelude::*,
	auth::CredentialPair,
	store::{CredentialStore, StoreError},
};

/// Keeps the credential pair in-process; nothing survives a restart.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<Option<CredentialPair>>>);
impl MemoryStore {
	/// Creates a store already holding `pair`.
	pub fn with_pair(pair: CredentialPair) -> Self {
		Self(Arc::new(RwLock::new(Some(pair))))
	}
}
impl CredentialStore for MemoryStore {
	fn get(&self) -> Result<Option<CredentialPair>, StoreError> {
		Ok(self.0.read().clone())
	}

	fn set(&self, pair: CredentialPair) -> Result<(), StoreError> {
		*self.0.write() = Some(pair);

		Ok(())
	}

	fn clear(&self) -> Result<(), StoreError> {
		self.0.write().take();

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn set_replaces_pair_and_clear_removes_it() {
		let store = MemoryStore::with_pair(CredentialPair::new("T1", "R1"));

		store.set(CredentialPair::new("T2", "R2")).expect("Memory store set should succeed.");

		assert_eq!(
			store.get().expect("Memory store get should succeed."),
			Some(CredentialPair::new("T2", "R2"))
		);

		store.clear().expect("Memory store clear should succeed.");

		assert_eq!(store.get().expect("Memory store get should succeed."), None);
	}

	#[test]
	fn clones_share_the_same_slot() {
		let store = MemoryStore::default();
		let view = store.clone();

		store.set(CredentialPair::new("T1", "R1")).expect("Memory store set should succeed.");

		assert!(view.get().expect("Memory store get should succeed.").is_some());
	}
}
