// std
use std::net::IpAddr;
// self
use crate::{
	_prelude::*,
	config::{ClientConfig, Endpoints},
};

/// Errors raised while constructing or validating a [`ClientConfig`].
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum ClientConfigError {
	/// Configuration document could not be parsed.
	#[error("Configuration could not be parsed: {message}.")]
	Parse {
		/// Parser message including the failing path.
		message: String,
	},
	/// Base URL must use HTTPS unless it points at a loopback host.
	#[error("The base URL must use HTTPS: {url}.")]
	InsecureBaseUrl {
		/// Base URL that failed validation.
		url: String,
	},
	/// Base URL cannot carry relative paths (e.g. `mailto:` or `data:` URLs).
	#[error("The base URL cannot be used as a base: {url}.")]
	CannotBeABase {
		/// Base URL that failed validation.
		url: String,
	},
	/// Endpoint path is empty.
	#[error("The {endpoint} endpoint path is empty.")]
	EmptyEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
	},
	/// Endpoint path is an absolute URL.
	#[error("The {endpoint} endpoint must be a relative path: {path}.")]
	AbsoluteEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Offending path.
		path: String,
	},
	/// Durations must not be negative.
	#[error("The {setting} window must not be negative.")]
	NegativeWindow {
		/// Which setting failed validation.
		setting: &'static str,
	},
}

/// Builder for [`ClientConfig`] values.
#[derive(Debug)]
pub struct ClientConfigBuilder {
	/// Backend root.
	pub base_url: Url,
	/// Endpoint paths.
	pub endpoints: Endpoints,
	/// Proactive refresh window.
	pub expiry_buffer: Duration,
	/// Verification status dedup window.
	pub verification_dedup_window: Duration,
}
impl ClientConfigBuilder {
	/// Creates a new builder with default endpoints and windows.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			endpoints: Endpoints::default(),
			expiry_buffer: ClientConfig::DEFAULT_EXPIRY_BUFFER,
			verification_dedup_window: ClientConfig::DEFAULT_VERIFICATION_DEDUP_WINDOW,
		}
	}

	/// Replaces every endpoint path.
	pub fn endpoints(mut self, endpoints: Endpoints) -> Self {
		self.endpoints = endpoints;

		self
	}

	/// Overrides the proactive refresh window (defaults to 30 seconds).
	pub fn expiry_buffer(mut self, window: Duration) -> Self {
		self.expiry_buffer = window;

		self
	}

	/// Overrides the verification status dedup window (defaults to 2 seconds).
	pub fn verification_dedup_window(mut self, window: Duration) -> Self {
		self.verification_dedup_window = window;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ClientConfig, ClientConfigError> {
		let mut base_url = self.base_url;

		if base_url.cannot_be_a_base() {
			return Err(ClientConfigError::CannotBeABase { url: base_url.to_string() });
		}
		if base_url.scheme() != "https" && !is_loopback(&base_url) {
			return Err(ClientConfigError::InsecureBaseUrl { url: base_url.to_string() });
		}
		if !base_url.path().ends_with('/') {
			let path = format!("{}/", base_url.path());

			base_url.set_path(&path);
		}

		base_url.set_query(None);
		base_url.set_fragment(None);

		let config = ClientConfig {
			base_url,
			endpoints: self.endpoints,
			expiry_buffer: self.expiry_buffer,
			verification_dedup_window: self.verification_dedup_window,
		};

		config.validate()?;

		Ok(config)
	}
}
impl From<ClientConfig> for ClientConfigBuilder {
	fn from(config: ClientConfig) -> Self {
		Self {
			base_url: config.base_url,
			endpoints: config.endpoints,
			expiry_buffer: config.expiry_buffer,
			verification_dedup_window: config.verification_dedup_window,
		}
	}
}

impl ClientConfig {
	fn validate(&self) -> Result<(), ClientConfigError> {
		for (endpoint, path) in self.endpoints.named() {
			validate_endpoint(endpoint, path)?;
		}

		if self.expiry_buffer.is_negative() {
			return Err(ClientConfigError::NegativeWindow { setting: "expiry_buffer" });
		}
		if self.verification_dedup_window.is_negative() {
			return Err(ClientConfigError::NegativeWindow { setting: "verification_dedup_window" });
		}

		Ok(())
	}
}

fn validate_endpoint(endpoint: &'static str, path: &str) -> Result<(), ClientConfigError> {
	if path.trim().is_empty() {
		return Err(ClientConfigError::EmptyEndpoint { endpoint });
	}
	if Url::parse(path).is_ok() || path.starts_with("//") {
		return Err(ClientConfigError::AbsoluteEndpoint { endpoint, path: path.to_owned() });
	}

	Ok(())
}

fn is_loopback(url: &Url) -> bool {
	match url.host_str() {
		Some("localhost") => true,
		Some(host) => host
			.trim_start_matches('[')
			.trim_end_matches(']')
			.parse::<IpAddr>()
			.is_ok_and(|ip| ip.is_loopback()),
		None => false,
	}
}
