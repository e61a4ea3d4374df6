//! Transport primitives for outbound API calls and credential renewals.
//!
//! The module exposes [`HttpTransport`], the crate's only dependency on an HTTP stack, together
//! with the [`HttpRequest`] / [`HttpResponse`] aliases every layer speaks. The default
//! [`ReqwestHttpClient`] lives behind the `reqwest` feature; custom transports (test doubles,
//! other clients) implement the trait directly.

pub use ::http::{HeaderMap, HeaderValue, Method, StatusCode, header};

// crates.io
use ::http::header::RETRY_AFTER;
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::TransportError};

/// Outbound request handed to an [`HttpTransport`].
pub type HttpRequest = ::http::Request<Vec<u8>>;
/// Fully buffered response returned by an [`HttpTransport`].
pub type HttpResponse = ::http::Response<Vec<u8>>;

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP clients capable of executing a single request.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared by the
/// dispatcher and the refresh coordinator, and the returned future must be `Send` so a renewal
/// can be driven from whichever task happens to poll it. A transport reports every HTTP status
/// as `Ok`; only failures that prevent a response from arriving are errors.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Executes `request` and buffers the response body.
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_>;
}
impl<T> HttpTransport for Arc<T>
where
	T: ?Sized + HttpTransport,
{
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_> {
		(**self).execute(request)
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client that sends `user_agent` on every request.
	pub fn with_user_agent(user_agent: &str) -> Result<Self> {
		let client = ReqwestClient::builder()
			.user_agent(user_agent)
			.build()
			.map_err(crate::error::ConfigError::from)?;

		Ok(Self(client))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestHttpClient {
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let url = request.uri().to_string();
			let request = reqwest::Request::try_from(request)
				.map_err(|e| TransportError::network(url.clone(), e))?;
			let response =
				client.execute(request).await.map_err(|e| TransportError::network(url.clone(), e))?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body =
				response.bytes().await.map_err(|e| TransportError::network(url, e))?.to_vec();
			let mut buffered = HttpResponse::new(body);

			*buffered.status_mut() = status;
			*buffered.headers_mut() = headers;

			Ok(buffered)
		})
	}
}

/// Parses a `Retry-After` header expressed either in seconds or as an RFC 2822 date.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn retry_after_accepts_seconds() {
		let mut headers = HeaderMap::new();

		headers.insert(RETRY_AFTER, HeaderValue::from_static("30"));

		assert_eq!(parse_retry_after(&headers), Some(Duration::seconds(30)));
	}

	#[test]
	fn retry_after_ignores_past_dates_and_garbage() {
		let mut headers = HeaderMap::new();

		assert_eq!(parse_retry_after(&headers), None);

		headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));

		assert_eq!(parse_retry_after(&headers), None);

		headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));

		assert_eq!(parse_retry_after(&headers), None);
	}

	#[test]
	fn retry_after_accepts_future_dates() {
		let mut headers = HeaderMap::new();
		let moment = (OffsetDateTime::now_utc() + Duration::hours(1))
			.format(&Rfc2822)
			.expect("Future instant should format as RFC 2822.");

		headers.insert(
			RETRY_AFTER,
			HeaderValue::from_str(&moment).expect("RFC 2822 date should be a valid header."),
		);

		let hint = parse_retry_after(&headers).expect("Future Retry-After should parse.");

		assert!(hint > Duration::minutes(59));
	}
}
