//! Authenticated request dispatch with replay-once recovery from credential expiry.
//!
//! [`RequestDispatcher`] attaches the stored access token to every call. When the upstream answers
//! `401 Unauthorized` to an envelope that has not been retried yet, the dispatcher marks it
//! retried, waits for [`RefreshCoordinator::acquire_token`], and resubmits the call exactly once
//! with the renewed token. Every other failure reaches the caller untouched.

// crates.io
use ::http::{
	HeaderMap, Method, StatusCode, Uri,
	header::{AUTHORIZATION, CONTENT_TYPE, HeaderName, HeaderValue},
};
use futures::future::{AbortRegistration, Abortable};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::{ConfigError, StatusError},
	http::{self, HttpRequest, HttpResponse, HttpTransport},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	refresh::RefreshCoordinator,
	store::CredentialStore,
};

/// Outbound call descriptor plus its replay marker.
///
/// The envelope owns everything needed to rebuild the request, so it can be issued once with the
/// current token and once more with a renewed one.
#[derive(Clone, Debug)]
pub struct RequestEnvelope {
	method: Method,
	url: Url,
	headers: HeaderMap,
	body: Vec<u8>,
	retried: bool,
}
impl RequestEnvelope {
	/// Creates an envelope with an empty body.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, headers: HeaderMap::new(), body: Vec::new(), retried: false }
	}

	/// Shorthand for a `GET` envelope.
	pub fn get(url: Url) -> Self {
		Self::new(Method::GET, url)
	}

	/// Shorthand for a `POST` envelope.
	pub fn post(url: Url) -> Self {
		Self::new(Method::POST, url)
	}

	/// Adds (or replaces) a header.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Sets the raw body.
	pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = body.into();

		self
	}

	/// Serializes `payload` as the JSON body and sets `Content-Type` accordingly.
	pub fn with_json<B>(self, payload: &B) -> Result<Self>
	where
		B: ?Sized + Serialize,
	{
		let body = serde_json::to_vec(payload).map_err(ConfigError::BodySerialize)?;

		Ok(self
			.with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
			.with_body(body))
	}

	/// Returns the request method.
	pub fn method(&self) -> &Method {
		&self.method
	}

	/// Returns the target URL.
	pub fn url(&self) -> &Url {
		&self.url
	}

	/// Returns the caller-supplied headers.
	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	/// Returns the request body.
	pub fn body(&self) -> &[u8] {
		&self.body
	}

	/// Returns `true` once the envelope has been resubmitted after a renewal.
	pub fn is_retried(&self) -> bool {
		self.retried
	}

	/// Marks the envelope as already replayed; a later `401` then propagates directly.
	pub fn mark_retried(&mut self) {
		self.retried = true;
	}

	/// Builds the wire request, attaching `bearer` as the `Authorization` header when present.
	pub fn to_request(&self, bearer: Option<&TokenSecret>) -> Result<HttpRequest> {
		let mut request = HttpRequest::new(self.body.clone());

		*request.method_mut() = self.method.clone();
		*request.uri_mut() =
			self.url.as_str().parse::<Uri>().map_err(|e| ConfigError::from(::http::Error::from(e)))?;
		*request.headers_mut() = self.headers.clone();

		if let Some(token) = bearer {
			let mut value = HeaderValue::from_str(&token.bearer())
				.map_err(|e| ConfigError::from(::http::Error::from(e)))?;

			value.set_sensitive(true);
			request.headers_mut().insert(AUTHORIZATION, value);
		}

		Ok(request)
	}
}

/// Sends envelopes through a transport, recovering from access-token expiry once per call.
pub struct RequestDispatcher<T>
where
	T: ?Sized + HttpTransport,
{
	transport: Arc<T>,
	store: Arc<dyn CredentialStore>,
	coordinator: RefreshCoordinator<T>,
}
impl<T> RequestDispatcher<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a dispatcher that reads tokens from `store` and renews through `coordinator`.
	pub fn new(
		store: Arc<dyn CredentialStore>,
		transport: impl Into<Arc<T>>,
		coordinator: RefreshCoordinator<T>,
	) -> Self {
		Self { transport: transport.into(), store, coordinator }
	}

	/// Returns the coordinator this dispatcher renews through.
	pub fn coordinator(&self) -> &RefreshCoordinator<T> {
		&self.coordinator
	}

	/// Sends `envelope`, replaying it once after a renewal if the access token has expired.
	///
	/// 2xx responses are returned as-is. A non-2xx status becomes [`Error::Status`] with the
	/// untouched response; a renewal failure becomes [`Error::AuthExpired`] and the call is not
	/// resubmitted.
	pub async fn dispatch(&self, mut envelope: RequestEnvelope) -> Result<HttpResponse> {
		const KIND: FlowKind = FlowKind::Dispatch;

		let span = FlowSpan::new(KIND, "dispatch");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result: Result<HttpResponse> = span
			.instrument(async {
				let access_token = self.store.get()?.map(|pair| pair.access_token);
				let response = self.issue(&envelope, access_token.as_ref()).await?;

				if response.status() != StatusCode::UNAUTHORIZED || envelope.is_retried() {
					return into_result(response);
				}

				span.note("access token rejected; waiting for renewal");
				envelope.mark_retried();

				let renewed = self.coordinator.acquire_token().await?;

				self.replay(&envelope, &renewed).await
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Like [`dispatch`](Self::dispatch), but resolves with [`Error::Cancelled`] once the paired
	/// [`AbortHandle`](futures::future::AbortHandle) fires.
	///
	/// A call aborted while it waits for a renewal never performs its replay; the renewal itself
	/// keeps running for the other callers attached to it.
	pub async fn dispatch_abortable(
		&self,
		envelope: RequestEnvelope,
		registration: AbortRegistration,
	) -> Result<HttpResponse> {
		Abortable::new(self.dispatch(envelope), registration)
			.await
			.unwrap_or_else(|_aborted| Err(Error::Cancelled))
	}

	async fn replay(&self, envelope: &RequestEnvelope, token: &TokenSecret) -> Result<HttpResponse> {
		const KIND: FlowKind = FlowKind::Replay;

		let span = FlowSpan::new(KIND, "replay");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.issue(envelope, Some(token))).await.and_then(into_result);

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	async fn issue(
		&self,
		envelope: &RequestEnvelope,
		bearer: Option<&TokenSecret>,
	) -> Result<HttpResponse> {
		let request = envelope.to_request(bearer)?;

		Ok(self.transport.execute(request).await?)
	}
}
impl<T> Clone for RequestDispatcher<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			store: self.store.clone(),
			coordinator: self.coordinator.clone(),
		}
	}
}
impl<T> Debug for RequestDispatcher<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestDispatcher").field("coordinator", &self.coordinator).finish()
	}
}

fn into_result(response: HttpResponse) -> Result<HttpResponse> {
	if response.status().is_success() {
		return Ok(response);
	}

	let retry_after = http::parse_retry_after(response.headers());

	Err(StatusError { response, retry_after }.into())
}
