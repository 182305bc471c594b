//! Client-level error types shared across requests, session flows, and stores.

// self
use crate::_prelude::*;

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Field name to messages, as reported by the backend for form display.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Credential storage failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Network failure; no response was received.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Backend answered with a body that does not match the expected shape.
	#[error("Backend returned an undecodable body (HTTP {status}).")]
	Decode {
		/// Structured parsing failure including the JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the response.
		status: u16,
	},

	/// Credential was rejected and the single refresh-and-retry did not help.
	#[error("Request was not authorized (HTTP {status}).")]
	Unauthorized {
		/// HTTP status code, normally 401.
		status: u16,
	},
	/// Backend rejected the payload with field-level errors; never retried.
	#[error("Request failed validation: {message}.")]
	Validation {
		/// HTTP status code (400 or 422).
		status: u16,
		/// Top-level message, if the backend supplied one.
		message: String,
		/// Field-level messages suitable for form display.
		fields: FieldErrors,
	},
	/// Any other 4xx response.
	#[error("Request was rejected with HTTP {status}: {message}.")]
	Rejected {
		/// HTTP status code.
		status: u16,
		/// Backend-supplied message or status reason.
		message: String,
	},
	/// 5xx response.
	#[error("Server failed with HTTP {status}: {message}.")]
	Server {
		/// HTTP status code.
		status: u16,
		/// Backend-supplied message or status reason.
		message: String,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},

	/// The refresh exchange failed; credentials were cleared and the user must log in again.
	#[error("Session expired and requires a new login: {reason}.")]
	SessionExpired {
		/// Human-readable cause of the refresh failure.
		reason: String,
		/// HTTP status of the refresh response, when one was received.
		status: Option<u16>,
	},
	/// The operation needs credentials but none are stored.
	#[error("No credentials are available; log in first.")]
	NotAuthenticated,
	/// Email verification polling gave up before the address was verified.
	#[error("Email address is still unverified after {attempts} checks.")]
	VerificationPending {
		/// Number of status checks performed.
		attempts: u32,
	},
}
impl Error {
	/// HTTP status associated with the error, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Decode { status, .. }
			| Self::Unauthorized { status }
			| Self::Validation { status, .. }
			| Self::Rejected { status, .. }
			| Self::Server { status, .. } => Some(*status),
			Self::SessionExpired { status, .. } => *status,
			_ => None,
		}
	}

	/// Returns `true` when the caller has to send the user back to the login screen.
	pub fn requires_login(&self) -> bool {
		matches!(
			self,
			Self::Unauthorized { .. } | Self::SessionExpired { .. } | Self::NotAuthenticated
		)
	}

	/// Field-level validation messages, if this is a validation failure.
	pub fn field_errors(&self) -> Option<&FieldErrors> {
		match self {
			Self::Validation { fields, .. } => Some(fields),
			_ => None,
		}
	}
}

/// Configuration and request construction failures raised by the client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Client configuration failed validation.
	#[error(transparent)]
	InvalidConfig(#[from] crate::config::ClientConfigError),
	/// Request path cannot be resolved against the base URL.
	#[error("Request path `{path}` cannot be resolved against the base URL.")]
	InvalidPath {
		/// Path supplied by the caller.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Request path resolves to a different origin than the base URL.
	#[error("Request path `{path}` points outside the configured backend.")]
	ForeignPath {
		/// Path supplied by the caller.
		path: String,
	},
	/// Request body could not be serialized to JSON.
	#[error("Request body could not be serialized.")]
	RequestBody(#[source] serde_json::Error),
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the backend.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the backend.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
