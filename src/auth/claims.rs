//! Unverified JWT payload decoding used to schedule proactive refreshes.
//!
//! Signature verification belongs to the backend. The client only reads the `exp` claim so
//! it can refresh an access credential before the server starts rejecting it.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::_prelude::*;

/// Errors raised while decoding a JWT payload.
#[derive(Debug, ThisError)]
pub enum ClaimsError {
	/// Token is not in `header.payload.signature` form.
	#[error("Token has {segments} segments; expected 3.")]
	Malformed {
		/// Number of `.`-separated segments found.
		segments: usize,
	},
	/// Payload segment is not valid base64url.
	#[error("Token payload is not valid base64url.")]
	Base64(#[from] base64::DecodeError),
	/// Payload is not the expected JSON object.
	#[error("Token payload is not a valid claims object.")]
	Json(#[from] serde_path_to_error::Error<serde_json::Error>),
}

/// Subset of registered and backend-specific claims read by the client.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct AccessClaims {
	/// Expiry as seconds since the Unix epoch.
	#[serde(default)]
	pub exp: Option<i64>,
	/// Issued-at as seconds since the Unix epoch.
	#[serde(default)]
	pub iat: Option<i64>,
	/// Registered subject claim.
	#[serde(default)]
	pub sub: Option<String>,
	/// Backend user identifier; numeric or string depending on the deployment.
	#[serde(default)]
	pub user_id: Option<serde_json::Value>,
	/// Backend token kind (`access` or `refresh`).
	#[serde(default)]
	pub token_type: Option<String>,
}
impl AccessClaims {
	/// Decodes the payload segment without verifying the signature.
	pub fn decode_unverified(token: &str) -> Result<Self, ClaimsError> {
		let segments = token.split('.').collect::<Vec<_>>();
		let [_, payload, _] = segments.as_slice() else {
			return Err(ClaimsError::Malformed { segments: segments.len() });
		};
		let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;
		let mut de = serde_json::Deserializer::from_slice(&bytes);

		Ok(serde_path_to_error::deserialize(&mut de)?)
	}

	/// Expiry instant, if the token carries a representable `exp` claim.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		self.exp.and_then(|exp| OffsetDateTime::from_unix_timestamp(exp).ok())
	}

	/// Returns `true` if the token is expired at `now` or expires within `buffer`.
	///
	/// Tokens without an `exp` claim never report as expiring.
	pub fn expires_within(&self, now: OffsetDateTime, buffer: Duration) -> bool {
		self.expires_at().is_some_and(|expires_at| expires_at - now <= buffer)
	}

	/// Identifier of the user the token was issued to, from `sub` or `user_id`.
	pub fn subject(&self) -> Option<String> {
		if let Some(sub) = &self.sub {
			return Some(sub.clone());
		}

		match self.user_id.as_ref()? {
			serde_json::Value::String(id) => Some(id.clone()),
			serde_json::Value::Number(id) => Some(id.to_string()),
			_ => None,
		}
	}
}

/// Builds an unsigned token around `payload` for tests.
#[cfg(test)]
pub(crate) fn mint_unverified_jwt(payload: &serde_json::Value) -> String {
	let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
	let body = URL_SAFE_NO_PAD.encode(payload.to_string());

	format!("{header}.{body}.c2lnbmF0dXJl")
}
