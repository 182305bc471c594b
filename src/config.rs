//! Validated client configuration: backend location, endpoint paths, and timing windows.

/// Builder API for assembling client configurations.
pub mod builder;

pub use builder::*;

// self
use crate::{_prelude::*, error::ConfigError};

/// Endpoint paths, relative to [`ClientConfig::base_url`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
	/// Credential issuance (`POST`, unauthenticated).
	pub login: String,
	/// Account registration (`POST`, unauthenticated).
	pub register: String,
	/// Credential refresh (`POST`, unauthenticated).
	pub refresh: String,
	/// Current user profile (`GET`, bearer).
	pub profile: String,
	/// Session logout (`POST`, bearer).
	pub logout: String,
	/// Email verification status (`GET`, bearer).
	pub verification_status: String,
	/// Email verification token submission (`POST`, unauthenticated).
	pub verify_email: String,
	/// Verification email resend (`POST`, bearer).
	pub resend_verification: String,
	/// Password reset request (`POST`, unauthenticated).
	pub password_reset: String,
	/// Password reset confirmation (`POST`, unauthenticated).
	pub password_reset_confirm: String,
}
impl Endpoints {
	pub(crate) fn named(&self) -> [(&'static str, &str); 10] {
		[
			("login", &self.login),
			("register", &self.register),
			("refresh", &self.refresh),
			("profile", &self.profile),
			("logout", &self.logout),
			("verification_status", &self.verification_status),
			("verify_email", &self.verify_email),
			("resend_verification", &self.resend_verification),
			("password_reset", &self.password_reset),
			("password_reset_confirm", &self.password_reset_confirm),
		]
	}
}
impl Default for Endpoints {
	fn default() -> Self {
		Self {
			login: "auth/login/".into(),
			register: "auth/register/".into(),
			refresh: "auth/token/refresh/".into(),
			profile: "auth/user/".into(),
			logout: "auth/logout/".into(),
			verification_status: "auth/verification-status/".into(),
			verify_email: "auth/verify-email/".into(),
			resend_verification: "auth/verify-email/resend/".into(),
			password_reset: "auth/password-reset/".into(),
			password_reset_confirm: "auth/password-reset/confirm/".into(),
		}
	}
}

/// Immutable client configuration consumed by [`ApiClient`](crate::client::ApiClient).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
	/// Backend root; always ends with `/` so relative paths join beneath it.
	pub base_url: Url,
	/// Endpoint paths for the session flows.
	#[serde(default)]
	pub endpoints: Endpoints,
	/// Access credentials expiring within this window are refreshed before use.
	#[serde(default = "defaults::expiry_buffer", with = "duration_secs")]
	pub expiry_buffer: Duration,
	/// Verification status results younger than this are reused without a request.
	#[serde(default = "defaults::verification_dedup_window", with = "duration_secs")]
	pub verification_dedup_window: Duration,
}
impl ClientConfig {
	/// Default proactive refresh window.
	pub const DEFAULT_EXPIRY_BUFFER: Duration = Duration::seconds(30);
	/// Default verification status dedup window.
	pub const DEFAULT_VERIFICATION_DEDUP_WINDOW: Duration = Duration::seconds(2);

	/// Creates a new builder for the provided backend root.
	pub fn builder(base_url: Url) -> ClientConfigBuilder {
		ClientConfigBuilder::new(base_url)
	}

	/// Parses a JSON document and validates the result.
	pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
		let mut de = serde_json::Deserializer::from_str(raw);
		let parsed: Self = serde_path_to_error::deserialize(&mut de)
			.map_err(|e| ClientConfigError::Parse { message: e.to_string() })?;

		Ok(ClientConfigBuilder::from(parsed).build()?)
	}

	/// Resolves `path` against the base URL, refusing anything that leaves its origin.
	pub fn url(&self, path: &str) -> Result<Url, ConfigError> {
		let joined = self
			.base_url
			.join(path.trim_start_matches('/'))
			.map_err(|source| ConfigError::InvalidPath { path: path.to_owned(), source })?;

		if joined.origin() != self.base_url.origin() {
			return Err(ConfigError::ForeignPath { path: path.to_owned() });
		}

		Ok(joined)
	}
}

mod defaults {
	// self
	use super::*;

	pub(super) fn expiry_buffer() -> Duration {
		ClientConfig::DEFAULT_EXPIRY_BUFFER
	}

	pub(super) fn verification_dedup_window() -> Duration {
		ClientConfig::DEFAULT_VERIFICATION_DEDUP_WINDOW
	}
}

mod duration_secs {
	// crates.io
	use serde::{Deserializer, Serializer, de::Error as _};
	// self
	use super::*;

	// Far beyond any useful window and well inside what `Duration::seconds_f64` accepts.
	const MAX_SECONDS: f64 = 1e12;

	pub(super) fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		if value.subsec_nanoseconds() == 0 {
			serializer.serialize_i64(value.whole_seconds())
		} else {
			serializer.serialize_f64(value.as_seconds_f64())
		}
	}

	pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		let secs = f64::deserialize(deserializer)?;

		if !secs.is_finite() || secs.abs() > MAX_SECONDS {
			return Err(D::Error::custom(format!("{secs} is not a usable number of seconds")));
		}

		Ok(Duration::seconds_f64(secs))
	}
}
