//! Wire format of the refresh endpoint.

// crates.io
use ::http::{
	Method,
	header::{ACCEPT, CONTENT_TYPE, HeaderValue},
};
// self
use crate::{
	_prelude::*,
	auth::{CredentialPair, TokenSecret},
	error::ExpiryReason,
	http::{HttpRequest, HttpResponse},
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RenewalRequest<'a> {
	refresh_token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenewalResponse {
	token: String,
	#[serde(default)]
	refresh_token: Option<String>,
}

/// Builds the `POST { refreshToken }` renewal request.
pub(crate) fn build_request(
	endpoint: &Url,
	refresh_token: &TokenSecret,
) -> Result<HttpRequest, ExpiryReason> {
	let body = serde_json::to_vec(&RenewalRequest { refresh_token: refresh_token.expose() })
		.map_err(|e| ExpiryReason::Transport { message: e.to_string() })?;
	let json = HeaderValue::from_static("application/json");

	::http::Request::builder()
		.method(Method::POST)
		.uri(endpoint.as_str())
		.header(CONTENT_TYPE, json.clone())
		.header(ACCEPT, json)
		.body(body)
		.map_err(|e| ExpiryReason::Transport { message: e.to_string() })
}

/// Turns the endpoint's answer into the next credential pair.
///
/// Any non-2xx status is a rejection. A 2xx body without `refreshToken` keeps `previous` so
/// endpoints that do not rotate refresh tokens still work.
pub(crate) fn parse_response(
	response: HttpResponse,
	previous: &TokenSecret,
) -> Result<CredentialPair, ExpiryReason> {
	let status = response.status();

	if !status.is_success() {
		return Err(ExpiryReason::Rejected { status: status.as_u16() });
	}

	let mut deserializer = serde_json::Deserializer::from_slice(response.body());
	let parsed: RenewalResponse = serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|e| ExpiryReason::MalformedResponse { message: e.to_string() })?;

	if parsed.token.is_empty() {
		return Err(ExpiryReason::MalformedResponse {
			message: "token: access token is empty".into(),
		});
	}

	Ok(CredentialPair {
		access_token: TokenSecret::new(parsed.token),
		refresh_token: parsed
			.refresh_token
			.filter(|value| !value.is_empty())
			.map(TokenSecret::new)
			.unwrap_or_else(|| previous.clone()),
	})
}
