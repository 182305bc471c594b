//! Access/refresh credential pair and its storage keys.

// self
use crate::{
	_prelude::*,
	auth::{AccessClaims, ClaimsError, TokenSecret},
};

/// Storage key holding the access credential.
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Storage key holding the refresh credential.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Short-lived access credential plus the long-lived refresh credential that renews it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
	/// Bearer credential attached to API requests.
	#[serde(rename = "access_token")]
	pub access: TokenSecret,
	/// Credential exchanged for a new access credential.
	#[serde(rename = "refresh_token")]
	pub refresh: TokenSecret,
}
impl CredentialPair {
	/// Creates a pair from raw credential strings.
	pub fn new(access: impl Into<TokenSecret>, refresh: impl Into<TokenSecret>) -> Self {
		Self { access: access.into(), refresh: refresh.into() }
	}

	/// Decodes the access credential's claims without verification.
	pub fn access_claims(&self) -> Result<AccessClaims, ClaimsError> {
		AccessClaims::decode_unverified(self.access.expose())
	}

	/// Expiry of the access credential, when it can be read from the token.
	pub fn access_expires_at(&self) -> Option<OffsetDateTime> {
		self.access_claims().ok().and_then(|claims| claims.expires_at())
	}

	/// Returns `true` if the access credential is expired or expires within `buffer` of `now`.
	///
	/// Credentials whose claims cannot be decoded are left to the server to judge.
	pub fn needs_refresh_at(&self, now: OffsetDateTime, buffer: Duration) -> bool {
		self.access_claims().is_ok_and(|claims| claims.expires_within(now, buffer))
	}

	/// Applies a refresh response: the access credential always changes, the refresh
	/// credential only when the backend rotated it.
	pub fn rotated(&self, access: impl Into<TokenSecret>, refresh: Option<TokenSecret>) -> Self {
		Self { access: access.into(), refresh: refresh.unwrap_or_else(|| self.refresh.clone()) }
	}
}
impl Debug for CredentialPair {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialPair")
			.field("access", &"<redacted>")
			.field("refresh", &"<redacted>")
			.finish()
	}
}
