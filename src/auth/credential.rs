//! Access/refresh credential pair that is always replaced as a unit.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Storage key holding the access token.
pub const ACCESS_TOKEN_KEY: &str = "token";
/// Storage key holding the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Current access/refresh credential pair.
///
/// Both halves travel together; stores persist and replace the pair as one value so no reader
/// ever observes a new access token next to a stale refresh token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
	/// Short-lived credential attached to every API call.
	#[serde(rename = "token")]
	pub access_token: TokenSecret,
	/// Longer-lived credential exchanged for a new pair.
	#[serde(rename = "refreshToken")]
	pub refresh_token: TokenSecret,
}
impl CredentialPair {
	/// Builds a pair from raw token strings.
	pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			refresh_token: TokenSecret::new(refresh_token),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn pair_serializes_under_fixed_keys() {
		let pair = CredentialPair::new("T1", "R1");
		let value = serde_json::to_value(&pair).expect("Credential pair should serialize.");

		assert_eq!(value[ACCESS_TOKEN_KEY], "T1");
		assert_eq!(value[REFRESH_TOKEN_KEY], "R1");
	}

	#[test]
	fn pair_debug_redacts_both_halves() {
		let rendered = format!("{:?}", CredentialPair::new("access-raw", "refresh-raw"));

		assert!(!rendered.contains("access-raw"));
		assert!(!rendered.contains("refresh-raw"));
	}
}
