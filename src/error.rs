//! Session-level error types shared across the dispatcher, coordinator, and stores.

// self
use crate::{_prelude::*, http::HttpResponse};

/// Session-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS). Never triggers a renewal.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Terminal session expiry; stored credentials have been cleared.
	#[error(transparent)]
	AuthExpired(#[from] SessionExpired),
	/// Upstream answered with a non-success status that this layer does not recover.
	#[error(transparent)]
	Status(#[from] StatusError),

	/// Caller aborted the request before it completed.
	#[error("Request was cancelled before completion.")]
	Cancelled,
}
impl Error {
	/// Returns `true` when the error signals a terminal session expiry.
	pub fn is_auth_expired(&self) -> bool {
		matches!(self, Self::AuthExpired(_))
	}

	/// Returns the upstream HTTP status code when the error carries one.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Status(e) => Some(e.status()),
			Self::AuthExpired(e) => e.status(),
			_ => None,
		}
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] ::http::Error),
	/// Base URL cannot act as a prefix for API paths.
	#[error("Base URL `{url}` must be an absolute http(s) URL.")]
	InvalidBaseUrl {
		/// Offending URL string.
		url: String,
	},
	/// A path could not be joined onto the base URL.
	#[error("Path `{path}` cannot be joined onto the base URL.")]
	InvalidPath {
		/// Offending path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	BodySerialize(#[source] serde_json::Error),
	/// Serialized configuration is malformed.
	#[error("Session configuration is malformed.")]
	Parse(#[source] serde_path_to_error::Error<serde_json::Error>),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failure of an outbound call.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling `{url}`.")]
	Network {
		/// Target URL of the failed call.
		url: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		url: impl Into<String>,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { url: url.into(), source: Box::new(src) }
	}
}

/// Terminal session expiry shared by every caller waiting on the same renewal.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Session expired: {reason}.")]
pub struct SessionExpired {
	/// Why the session could not be renewed.
	pub reason: ExpiryReason,
}
impl SessionExpired {
	/// Builds an expiry carrying `reason`.
	pub fn new(reason: ExpiryReason) -> Self {
		Self { reason }
	}

	/// Returns the renewal endpoint's status, when the expiry came from a rejection.
	pub fn status(&self) -> Option<u16> {
		match self.reason {
			ExpiryReason::Rejected { status } => Some(status),
			_ => None,
		}
	}
}

/// Cause attached to a [`SessionExpired`] error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExpiryReason {
	/// No refresh credential was stored, so no renewal was attempted.
	MissingRefreshToken,
	/// The renewal endpoint answered with a non-success status.
	Rejected {
		/// HTTP status returned by the renewal endpoint.
		status: u16,
	},
	/// The renewal call failed before a response arrived.
	Transport {
		/// Rendered transport failure.
		message: String,
	},
	/// The renewal endpoint answered 2xx with a body that could not be parsed.
	MalformedResponse {
		/// Structured parsing failure, rendered.
		message: String,
	},
	/// The renewed credentials could not be persisted.
	Storage {
		/// Rendered storage failure.
		message: String,
	},
}
impl Display for ExpiryReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::MissingRefreshToken => f.write_str("no refresh token is stored"),
			Self::Rejected { status } =>
				write!(f, "renewal endpoint rejected the refresh token with status {status}"),
			Self::Transport { message } => write!(f, "renewal call failed: {message}"),
			Self::MalformedResponse { message } =>
				write!(f, "renewal response is malformed: {message}"),
			Self::Storage { message } => write!(f, "renewed credentials were not persisted: {message}"),
		}
	}
}

/// Non-success response returned to the caller unchanged.
#[derive(Debug, ThisError)]
#[error("Upstream responded with status {}.", .response.status().as_u16())]
pub struct StatusError {
	/// Untouched upstream response, body included.
	pub response: HttpResponse,
	/// Retry-After hint from upstream, if supplied.
	pub retry_after: Option<Duration>,
}
impl StatusError {
	/// Returns the numeric HTTP status.
	pub fn status(&self) -> u16 {
		self.response.status().as_u16()
	}

	/// Returns `true` for `401 Unauthorized`.
	pub fn is_unauthorized(&self) -> bool {
		self.response.status() == ::http::StatusCode::UNAUTHORIZED
	}

	/// Returns the raw response body.
	pub fn body(&self) -> &[u8] {
		self.response.body()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn store_error_converts_into_session_error_with_source() {
		let store_error =
			crate::store::StoreError::Backend { message: "disk unavailable".into() };
		let error: Error = store_error.clone().into();

		assert!(matches!(error, Error::Storage(_)));
		assert!(error.to_string().contains("disk unavailable"));

		let source = StdError::source(&error)
			.expect("Session error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn session_expired_reports_rejection_status() {
		let error: Error = SessionExpired::new(ExpiryReason::Rejected { status: 403 }).into();

		assert!(error.is_auth_expired());
		assert_eq!(error.status(), Some(403));
		assert_eq!(
			error.to_string(),
			"Session expired: renewal endpoint rejected the refresh token with status 403."
		);
	}

	#[test]
	fn status_error_exposes_response_untouched() {
		let mut response = HttpResponse::new(b"{\"field\":\"missing\"}".to_vec());

		*response.status_mut() = ::http::StatusCode::UNPROCESSABLE_ENTITY;

		let error = StatusError { response, retry_after: None };

		assert_eq!(error.status(), 422);
		assert!(!error.is_unauthorized());
		assert_eq!(error.body(), b"{\"field\":\"missing\"}");
		assert_eq!(error.to_string(), "Upstream responded with status 422.");
	}

	#[test]
	fn transport_error_names_the_failed_url_and_keeps_its_cause() {
		let error: Error = TransportError::network(
			"https://api.example.com/data",
			std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer"),
		)
		.into();

		assert!(!error.is_auth_expired());
		assert_eq!(error.status(), None);
		assert_eq!(
			error.to_string(),
			"Network error occurred while calling `https://api.example.com/data`."
		);

		let source = StdError::source(&error).expect("Network error should expose its cause.");

		assert_eq!(source.to_string(), "reset by peer");
	}
}
