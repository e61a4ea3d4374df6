//! Session configuration: where the API lives, where renewals go, and who hears about them.

// self
use crate::{_prelude::*, error::ConfigError};

/// Configuration shared by one [`AuthClient`](crate::client::AuthClient).
///
/// A single configurable client replaces per-deployment copies: point `base_url` at the API,
/// override `refresh_path` when the renewal route differs, and turn `notifications` off when no
/// session observer exists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
	/// Prefix joined with every relative API path.
	pub base_url: Url,
	/// Renewal route relative to `base_url`.
	#[serde(default = "default_refresh_path")]
	pub refresh_path: String,
	/// Publishes lifecycle events on the client's notification bus when `true`.
	#[serde(default = "default_notifications")]
	pub notifications: bool,
	/// Optional `User-Agent` for the default reqwest transport.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user_agent: Option<String>,
}
impl SessionConfig {
	/// Renewal route used when none is configured.
	pub const DEFAULT_REFRESH_PATH: &'static str = "/auth/refresh";

	/// Starts a builder for `base_url`.
	pub fn builder(base_url: Url) -> SessionConfigBuilder {
		SessionConfigBuilder::new(base_url)
	}

	/// Parses a JSON document, reporting the failing field path on error.
	pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
		let mut deserializer = serde_json::Deserializer::from_str(raw);
		let config: Self =
			serde_path_to_error::deserialize(&mut deserializer).map_err(ConfigError::Parse)?;

		config.validate()?;

		Ok(config)
	}

	/// Checks that the base URL can prefix API paths and that the renewal route joins.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if !matches!(self.base_url.scheme(), "http" | "https") || self.base_url.cannot_be_a_base() {
			return Err(ConfigError::InvalidBaseUrl { url: self.base_url.to_string() });
		}

		self.refresh_endpoint().map(|_| ())
	}

	/// Resolves the absolute renewal endpoint.
	pub fn refresh_endpoint(&self) -> Result<Url, ConfigError> {
		self.endpoint(&self.refresh_path)
	}

	/// Resolves `path` against the base URL, keeping any path prefix the base carries.
	///
	/// `https://host/api` + `/users` resolves to `https://host/api/users`.
	pub fn endpoint(&self, path: &str) -> Result<Url, ConfigError> {
		let mut base = self.base_url.clone();

		if !base.path().ends_with('/') {
			let prefixed = format!("{}/", base.path());

			base.set_path(&prefixed);
		}

		base.join(path.trim_start_matches('/'))
			.map_err(|source| ConfigError::InvalidPath { path: path.to_owned(), source })
	}
}

/// Builder for [`SessionConfig`].
#[derive(Clone, Debug)]
pub struct SessionConfigBuilder {
	config: SessionConfig,
}
impl SessionConfigBuilder {
	fn new(base_url: Url) -> Self {
		Self {
			config: SessionConfig {
				base_url,
				refresh_path: default_refresh_path(),
				notifications: default_notifications(),
				user_agent: None,
			},
		}
	}

	/// Overrides the renewal route.
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.config.refresh_path = path.into();

		self
	}

	/// Enables or disables lifecycle notifications.
	pub fn notifications(mut self, enabled: bool) -> Self {
		self.config.notifications = enabled;

		self
	}

	/// Sets the `User-Agent` for the default transport.
	pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
		self.config.user_agent = Some(user_agent.into());

		self
	}

	/// Validates and returns the configuration.
	pub fn build(self) -> Result<SessionConfig, ConfigError> {
		self.config.validate()?;

		Ok(self.config)
	}
}

fn default_refresh_path() -> String {
	SessionConfig::DEFAULT_REFRESH_PATH.into()
}

fn default_notifications() -> bool {
	true
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(value: &str) -> Url {
		Url::parse(value).expect("Failed to parse config fixture URL.")
	}

	#[test]
	fn builder_defaults_refresh_route_and_notifications() {
		let config = SessionConfig::builder(url("https://api.example.com"))
			.build()
			.expect("Default config should validate.");

		assert_eq!(config.refresh_path, "/auth/refresh");
		assert!(config.notifications);
		assert_eq!(
			config.refresh_endpoint().expect("Refresh endpoint should resolve.").as_str(),
			"https://api.example.com/auth/refresh"
		);
	}

	#[test]
	fn endpoint_keeps_base_path_prefix() {
		let config = SessionConfig::builder(url("https://api.example.com/api"))
			.refresh_path("token/refresh")
			.build()
			.expect("Prefixed config should validate.");

		assert_eq!(
			config.endpoint("/forecasts/42").expect("Endpoint should resolve.").as_str(),
			"https://api.example.com/api/forecasts/42"
		);
		assert_eq!(
			config.refresh_endpoint().expect("Refresh endpoint should resolve.").as_str(),
			"https://api.example.com/api/token/refresh"
		);
	}

	#[test]
	fn builder_rejects_non_http_base() {
		let err = SessionConfig::builder(url("mailto:ops@example.com"))
			.build()
			.expect_err("Non-http base URL should be rejected.");

		assert!(matches!(err, ConfigError::InvalidBaseUrl { .. }));
	}

	#[test]
	fn json_config_reports_field_path() {
		let config = SessionConfig::from_json_str(
			r#"{"baseUrl":"http://localhost:8000","notifications":false}"#,
		)
		.expect("Minimal JSON config should parse.");

		assert_eq!(config.refresh_path, SessionConfig::DEFAULT_REFRESH_PATH);
		assert!(!config.notifications);

		let err = SessionConfig::from_json_str(r#"{"baseUrl":"http://localhost","refreshPath":7}"#)
			.expect_err("Mistyped refresh path should fail.");

		match err {
			ConfigError::Parse(e) => assert_eq!(e.path().to_string(), "refreshPath"),
			other => panic!("Unexpected config error: {other:?}."),
		}
	}
}
