//! Demonstrates a session whose access token expires mid-flight: the first call is rejected,
//! the client renews the credential pair once, and the call is replayed with the new token.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::json;
use url::Url;
// self
use bearer_session::{
	auth::CredentialPair,
	client::AuthClient,
	config::SessionConfig,
	notify::SessionEvent,
	store::{CredentialStore, MemoryStore},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let expired = server
		.mock_async(|when, then| {
			when.method(GET).path("/reports").header("authorization", "Bearer demo-access");
			then.status(401);
		})
		.await;
	let renewed = server
		.mock_async(|when, then| {
			when.method(GET).path("/reports").header("authorization", "Bearer demo-access-2");
			then.status(200).json_body(json!({ "reports": ["daily", "weekly"] }));
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh").json_body(json!({ "refreshToken": "demo-refresh" }));
			then.status(200).json_body(json!({
				"token": "demo-access-2",
				"refreshToken": "demo-refresh-2"
			}));
		})
		.await;
	let config = SessionConfig::builder(Url::parse(&server.base_url())?)
		.user_agent("bearer-session-demo")
		.build()?;
	let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::default());
	let client = AuthClient::new(config, store)?;

	client.register_observer(Arc::new(|event: &SessionEvent| {
		println!("Session event: {event}.");
	}));
	client.login(CredentialPair::new("demo-access", "demo-refresh"))?;

	let response = client.get("/reports").await?;

	println!("Reports: {}.", String::from_utf8_lossy(response.body()));
	println!("Renewals issued: {}.", client.metrics().renewals());

	expired.assert_async().await;
	renewed.assert_async().await;
	refresh.assert_async().await;

	Ok(())
}
