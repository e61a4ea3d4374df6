//! Storage contract and built-in implementations for the session's credential pair.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{_prelude::*, auth::CredentialPair};

/// Durable holder of the current [`CredentialPair`].
///
/// Every operation is synchronous and a write must be persisted before it returns. Only the
/// refresh coordinator (on a renewal outcome) and explicit login/logout mutate the store; the
/// request dispatcher only reads it.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Returns the stored pair, if any.
	fn get(&self) -> Result<Option<CredentialPair>, StoreError>;

	/// Replaces the stored pair as one unit.
	fn set(&self, pair: CredentialPair) -> Result<(), StoreError>;

	/// Removes both the access and the refresh value.
	fn clear(&self) -> Result<(), StoreError>;
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
