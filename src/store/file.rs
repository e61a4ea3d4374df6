//! Simple file-backed [`CredentialStore`] for CLIs, bots, and desktop sessions.

// std
use std::{
	fs::{self, File},
	io::{ErrorKind, Write},
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{CredentialPair, TokenSecret},
	store::{CredentialStore, StoreError},
};

/// On-disk layout: two string values under the fixed `token` / `refreshToken` keys.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
	#[serde(default, rename = "token", skip_serializing_if = "Option::is_none")]
	access_token: Option<TokenSecret>,
	#[serde(default, rename = "refreshToken", skip_serializing_if = "Option::is_none")]
	refresh_token: Option<TokenSecret>,
}
impl Snapshot {
	fn into_pair(self) -> Option<CredentialPair> {
		match (self.access_token, self.refresh_token) {
			(Some(access_token), Some(refresh_token)) =>
				Some(CredentialPair { access_token, refresh_token }),
			_ => None,
		}
	}
}
impl From<&CredentialPair> for Snapshot {
	fn from(pair: &CredentialPair) -> Self {
		Self {
			access_token: Some(pair.access_token.clone()),
			refresh_token: Some(pair.refresh_token.clone()),
		}
	}
}

/// Persists the credential pair to a JSON file after each mutation.
///
/// Writes go to a sibling `.tmp` file which is synced and then renamed over the target, so a
/// crash mid-write leaves either the old pair or the new one on disk, never a mix.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<Option<CredentialPair>>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let pair = Self::load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(pair)) })
	}

	/// Returns the backing file path.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<Option<CredentialPair>, StoreError> {
		if !path.exists() {
			return Ok(None);
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.is_empty() {
			return Ok(None);
		}

		let snapshot: Snapshot =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		Ok(snapshot.into_pair())
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist(&self, pair: &CredentialPair) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized = serde_json::to_vec_pretty(&Snapshot::from(pair)).map_err(|e| {
			StoreError::Serialization { message: format!("Failed to serialize credentials: {e}") }
		})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	fn remove(&self) -> Result<(), StoreError> {
		match fs::remove_file(&self.path) {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StoreError::Backend {
				message: format!("Failed to remove {}: {e}", self.path.display()),
			}),
		}
	}
}
impl CredentialStore for FileStore {
	fn get(&self) -> Result<Option<CredentialPair>, StoreError> {
		Ok(self.inner.read().clone())
	}

	fn set(&self, pair: CredentialPair) -> Result<(), StoreError> {
		let mut guard = self.inner.write();

		self.persist(&pair)?;
		*guard = Some(pair);

		Ok(())
	}

	fn clear(&self) -> Result<(), StoreError> {
		let mut guard = self.inner.write();

		self.remove()?;
		guard.take();

		Ok(())
	}
}
