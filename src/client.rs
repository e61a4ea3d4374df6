//! High-level session client wiring the store, coordinator, dispatcher, and notification bus.

// crates.io
use ::http::Method;
use futures::future::AbortRegistration;
// self
use crate::{
	_prelude::*,
	auth::CredentialPair,
	config::SessionConfig,
	dispatch::{RequestDispatcher, RequestEnvelope},
	http::{HttpResponse, HttpTransport},
	notify::{NotificationBus, SessionObserver, Subscription},
	refresh::{RefreshCoordinator, RefreshMetrics},
	runtime::Spawner,
	store::CredentialStore,
};
#[cfg(feature = "reqwest")] use crate::{http::ReqwestHttpClient, runtime::TokioSpawner};

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport.
pub type ReqwestAuthClient = AuthClient<ReqwestHttpClient>;

/// Authenticated API client for one session.
///
/// The client owns exactly one [`RefreshCoordinator`]; every call made through it (or through
/// clones of its dispatcher) shares that coordinator, so concurrent expiries collapse into a
/// single renewal. Login and logout are the only other writers of the credential store.
pub struct AuthClient<T>
where
	T: ?Sized + HttpTransport,
{
	config: SessionConfig,
	store: Arc<dyn CredentialStore>,
	bus: NotificationBus,
	dispatcher: RequestDispatcher<T>,
}
impl<T> AuthClient<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a client that reuses the caller-provided transport.
	///
	/// Renewal cycles run on `spawner`, which must be able to drive `transport` futures.
	pub fn with_transport(
		config: SessionConfig,
		store: Arc<dyn CredentialStore>,
		transport: impl Into<Arc<T>>,
		spawner: Spawner,
	) -> Result<Self> {
		let endpoint = config.refresh_endpoint()?;
		let transport = transport.into();
		let bus = NotificationBus::default();
		let coordinator = RefreshCoordinator::new(
			store.clone(),
			transport.clone(),
			endpoint,
			config.notifications.then(|| bus.clone()),
			spawner,
		);
		let dispatcher = RequestDispatcher::new(store.clone(), transport, coordinator);

		Ok(Self { config, store, bus, dispatcher })
	}

	/// Stores the credential pair issued by a login or registration.
	pub fn login(&self, pair: CredentialPair) -> Result<()> {
		Ok(self.store.set(pair)?)
	}

	/// Ends the session by removing both stored credentials.
	pub fn logout(&self) -> Result<()> {
		Ok(self.store.clear()?)
	}

	/// Returns `true` while a credential pair is stored.
	pub fn is_authenticated(&self) -> Result<bool> {
		Ok(self.store.get()?.is_some())
	}

	/// Resolves `path` against the configured base URL.
	pub fn url(&self, path: &str) -> Result<Url> {
		Ok(self.config.endpoint(path)?)
	}

	/// Sends an arbitrary envelope.
	pub async fn send(&self, envelope: RequestEnvelope) -> Result<HttpResponse> {
		self.dispatcher.dispatch(envelope).await
	}

	/// Sends an envelope that resolves with [`Error::Cancelled`] once its abort handle fires.
	pub async fn send_abortable(
		&self,
		envelope: RequestEnvelope,
		registration: AbortRegistration,
	) -> Result<HttpResponse> {
		self.dispatcher.dispatch_abortable(envelope, registration).await
	}

	/// Issues `GET path`.
	pub async fn get(&self, path: &str) -> Result<HttpResponse> {
		self.send(RequestEnvelope::new(Method::GET, self.url(path)?)).await
	}

	/// Issues `DELETE path`.
	pub async fn delete(&self, path: &str) -> Result<HttpResponse> {
		self.send(RequestEnvelope::new(Method::DELETE, self.url(path)?)).await
	}

	/// Issues `POST path` with a JSON body.
	pub async fn post_json<B>(&self, path: &str, body: &B) -> Result<HttpResponse>
	where
		B: ?Sized + Serialize,
	{
		self.send(RequestEnvelope::new(Method::POST, self.url(path)?).with_json(body)?).await
	}

	/// Issues `PUT path` with a JSON body.
	pub async fn put_json<B>(&self, path: &str, body: &B) -> Result<HttpResponse>
	where
		B: ?Sized + Serialize,
	{
		self.send(RequestEnvelope::new(Method::PUT, self.url(path)?).with_json(body)?).await
	}

	/// Opens a stream of session lifecycle events.
	pub fn subscribe(&self) -> Subscription {
		self.bus.subscribe()
	}

	/// Registers a callback observer for session lifecycle events.
	pub fn register_observer(&self, observer: Arc<dyn SessionObserver>) {
		self.bus.register(observer);
	}

	/// Returns the notification bus.
	pub fn notifications(&self) -> &NotificationBus {
		&self.bus
	}

	/// Returns the configuration the client was built with.
	pub fn config(&self) -> &SessionConfig {
		&self.config
	}

	/// Returns the credential store.
	pub fn store(&self) -> &Arc<dyn CredentialStore> {
		&self.store
	}

	/// Returns the dispatcher; clones share this client's coordinator.
	pub fn dispatcher(&self) -> &RequestDispatcher<T> {
		&self.dispatcher
	}

	/// Returns the single renewal coordinator of this session.
	pub fn coordinator(&self) -> &RefreshCoordinator<T> {
		self.dispatcher.coordinator()
	}

	/// Returns renewal counters.
	pub fn metrics(&self) -> &RefreshMetrics {
		self.coordinator().metrics()
	}
}
#[cfg(feature = "reqwest")]
impl AuthClient<ReqwestHttpClient> {
	/// Creates a client with its own reqwest transport, renewing on the ambient Tokio runtime.
	///
	/// Honors [`SessionConfig::user_agent`] when set.
	pub fn new(config: SessionConfig, store: Arc<dyn CredentialStore>) -> Result<Self> {
		let transport = match config.user_agent.as_deref() {
			Some(user_agent) => ReqwestHttpClient::with_user_agent(user_agent)?,
			None => ReqwestHttpClient::default(),
		};

		Self::with_transport(config, store, transport, TokioSpawner::shared())
	}
}
impl<T> Clone for AuthClient<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			config: self.config.clone(),
			store: self.store.clone(),
			bus: self.bus.clone(),
			dispatcher: self.dispatcher.clone(),
		}
	}
}
impl<T> Debug for AuthClient<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthClient")
			.field("base_url", &self.config.base_url.as_str())
			.field("coordinator", self.coordinator())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;
	use crate::{
		error::TransportError,
		http::{HttpRequest, TransportFuture},
		notify::SessionEvent,
		runtime::TokioSpawner,
		store::MemoryStore,
	};

	#[derive(Default)]
	struct Offline {
		calls: AtomicUsize,
	}
	impl HttpTransport for Offline {
		fn execute(&self, request: HttpRequest) -> TransportFuture<'_> {
			self.calls.fetch_add(1, Ordering::SeqCst);

			let url = request.uri().to_string();

			Box::pin(async move {
				Err(TransportError::network(
					url,
					std::io::Error::new(std::io::ErrorKind::NotConnected, "offline"),
				))
			})
		}
	}

	fn build_client(notifications: bool) -> (AuthClient<Offline>, Arc<Offline>) {
		let config = SessionConfig::builder(
			Url::parse("https://api.example.com/api").expect("Fixture URL should parse."),
		)
		.notifications(notifications)
		.build()
		.expect("Fixture config should validate.");
		let transport = Arc::new(Offline::default());
		let client = AuthClient::with_transport(
			config,
			Arc::new(MemoryStore::default()) as Arc<dyn CredentialStore>,
			transport.clone(),
			TokioSpawner::shared(),
		)
		.expect("Client should build.");

		(client, transport)
	}

	#[test]
	fn login_and_logout_manage_the_stored_pair() {
		let (client, _transport) = build_client(true);

		assert!(!client.is_authenticated().expect("Store read should succeed."));

		client.login(CredentialPair::new("T1", "R1")).expect("Login should store the pair.");

		assert!(client.is_authenticated().expect("Store read should succeed."));

		client.logout().expect("Logout should clear the pair.");

		assert!(!client.is_authenticated().expect("Store read should succeed."));
	}

	#[test]
	fn refresh_endpoint_follows_base_path() {
		let (client, _transport) = build_client(true);

		assert_eq!(client.coordinator().endpoint().as_str(), "https://api.example.com/api/auth/refresh");
		assert_eq!(
			client.url("/forecasts").expect("URL should resolve.").as_str(),
			"https://api.example.com/api/forecasts"
		);
	}

	#[tokio::test]
	async fn network_errors_never_trigger_renewal() {
		let (client, transport) = build_client(true);

		client.login(CredentialPair::new("T1", "R1")).expect("Login should store the pair.");

		let err = client.get("/forecasts").await.expect_err("Offline call should fail.");

		assert!(matches!(err, Error::Transport(_)));
		assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
		assert_eq!(client.metrics().renewals(), 0);
		assert!(client.is_authenticated().expect("Store read should succeed."));
	}

	#[tokio::test]
	async fn disabled_notifications_stay_silent() {
		let (client, _transport) = build_client(false);
		let mut events = client.subscribe();
		let err = client
			.coordinator()
			.acquire_token()
			.await
			.expect_err("Renewal without credentials should fail.");

		assert!(err.is_auth_expired());
		assert_eq!(events.try_next(), None);

		let (client, _transport) = build_client(true);
		let mut events = client.subscribe();

		client.coordinator().acquire_token().await.expect_err("Renewal should fail again.");

		assert_eq!(events.try_next(), Some(SessionEvent::CredentialExpired));
	}
}
