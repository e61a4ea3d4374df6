//! Bearer-token session layer that renews expired access credentials behind a single-flight
//! coordinator, replays each rejected request exactly once, and publishes session lifecycle
//! events to whoever is listening.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod notify;
pub mod obs;
pub mod refresh;
pub mod runtime;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::CredentialPair,
		client::AuthClient,
		config::SessionConfig,
		http::ReqwestHttpClient,
		runtime::TokioSpawner,
		store::{CredentialStore, MemoryStore},
	};

	/// Client type alias used by reqwest-backed integration tests.
	pub type ReqwestTestClient = AuthClient<ReqwestHttpClient>;

	/// Builds the session config used across integration tests, pointing at `base_url`.
	pub fn test_session_config(base_url: &str) -> SessionConfig {
		let base_url = Url::parse(base_url).expect("Mock server base URL should parse.");

		SessionConfig::builder(base_url)
			.build()
			.expect("Session config fixture should build successfully.")
	}

	/// Constructs an [`AuthClient`] backed by an in-memory store seeded with `seed`, plus the
	/// store handle so tests can inspect persisted credentials.
	pub fn build_reqwest_test_client(
		base_url: &str,
		seed: Option<CredentialPair>,
	) -> (ReqwestTestClient, Arc<MemoryStore>) {
		let store_backend = Arc::new(MemoryStore::default());

		if let Some(pair) = seed {
			store_backend.set(pair).expect("Seeding the memory store should succeed.");
		}

		let store: Arc<dyn CredentialStore> = store_backend.clone();
		let client = AuthClient::with_transport(
			test_session_config(base_url),
			store,
			ReqwestHttpClient::default(),
			TokioSpawner::shared(),
		)
		.expect("Reqwest test client should build successfully.");

		(client, store_backend)
	}
}

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
