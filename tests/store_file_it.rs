#![cfg(feature = "reqwest")]

// std
use std::{
	env, fs,
	path::{Path, PathBuf},
	process,
};
// crates.io
use httpmock::prelude::*;
use serde_json::{Value, json};
// self
use bearer_session::{
	_preludet::*,
	auth::CredentialPair,
	client::AuthClient,
	http::ReqwestHttpClient,
	runtime::TokioSpawner,
	store::{CredentialStore, FileStore},
};

fn temp_path(label: &str) -> PathBuf {
	env::temp_dir().join(format!(
		"bearer_session_it_{label}_{}_{}.json",
		process::id(),
		OffsetDateTime::now_utc().unix_timestamp_nanos(),
	))
}

fn build_file_client(base_url: &str, path: &Path) -> AuthClient<ReqwestHttpClient> {
	let store: Arc<dyn CredentialStore> =
		Arc::new(FileStore::open(path).expect("File store should open."));

	AuthClient::with_transport(
		test_session_config(base_url),
		store,
		ReqwestHttpClient::default(),
		TokioSpawner::shared(),
	)
	.expect("File-backed client should build.")
}

#[tokio::test]
async fn renewal_is_persisted_under_fixed_keys() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/profile").header("authorization", "Bearer T1");
			then.status(401);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/profile").header("authorization", "Bearer T2");
			then.status(200).json_body(json!({ "name": "ada" }));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200).json_body(json!({ "token": "T2", "refreshToken": "R2" }));
		})
		.await;

	let path = temp_path("persist");
	let client = build_file_client(&server.base_url(), &path);

	client.login(CredentialPair::new("T1", "R1")).expect("Login should persist the pair.");
	client.get("/profile").await.expect("Call should succeed after renewal.");

	let raw = fs::read_to_string(&path).expect("Credential file should exist.");
	let document: Value = serde_json::from_str(&raw).expect("Credential file should be JSON.");

	assert_eq!(document["token"], "T2");
	assert_eq!(document["refreshToken"], "R2");

	// A fresh client over the same file sees the renewed session.
	let reopened = build_file_client(&server.base_url(), &path);

	assert_eq!(
		reopened.store().get().expect("Reopened store should load."),
		Some(CredentialPair::new("T2", "R2"))
	);

	reopened.logout().expect("Logout should clear the file.");

	assert!(!path.exists());
}

#[tokio::test]
async fn expiry_removes_persisted_credentials() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/profile");
			then.status(401);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(403);
		})
		.await;

	let path = temp_path("expire");
	let client = build_file_client(&server.base_url(), &path);

	client.login(CredentialPair::new("T1", "R1")).expect("Login should persist the pair.");

	let err = client.get("/profile").await.expect_err("Rejected renewal should expire the session.");

	assert!(err.is_auth_expired());
	assert_eq!(err.status(), Some(403));
	assert!(!path.exists());
}
