//! The authenticated API client and its session flows.

pub mod account;
pub mod refresh;
pub mod request;
pub mod verification;

pub use account::*;
pub use refresh::RefreshMetrics;
pub use verification::*;

// self
use crate::{
	_prelude::*,
	auth::UserProfile,
	config::ClientConfig,
	http::ApiTransport,
	session::{Session, SessionState},
	store::CredentialStore,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport.
pub type ReqwestApiClient = ApiClient<ReqwestTransport>;

/// Issues backend requests with a valid bearer credential attached.
///
/// The client owns the transport, the credential store, and the [`Session`]. Clones share
/// all of them, including the refresh guard, so every clone observes the same in-flight
/// refresh. The session is only mutated through the client's action methods.
pub struct ApiClient<T>
where
	T: ApiTransport,
{
	/// Transport used for every outbound call.
	pub transport: Arc<T>,
	/// Store that persists the credential pair.
	pub store: Arc<dyn CredentialStore>,
	/// Validated configuration.
	pub config: Arc<ClientConfig>,
	/// Shared counters for refresh outcomes.
	pub refresh_metrics: Arc<RefreshMetrics>,
	session: Arc<Session>,
	refresh_slot: Arc<refresh::RefreshSlot>,
	verification_slot: Arc<verification::VerificationSlot>,
}
impl<T> ApiClient<T>
where
	T: ApiTransport,
{
	/// Creates a client over a caller-provided transport.
	pub fn with_transport(
		config: ClientConfig,
		store: Arc<dyn CredentialStore>,
		transport: impl Into<Arc<T>>,
	) -> Self {
		Self {
			transport: transport.into(),
			store,
			config: Arc::new(config),
			refresh_metrics: Default::default(),
			session: Default::default(),
			refresh_slot: Default::default(),
			verification_slot: Default::default(),
		}
	}

	/// Read access to the session.
	pub fn session(&self) -> &Session {
		&self.session
	}

	/// Current lifecycle state.
	pub fn session_state(&self) -> SessionState {
		self.session.state()
	}

	/// Cached user profile, if one has been fetched.
	pub fn current_user(&self) -> Option<UserProfile> {
		self.session.user()
	}

	/// Returns `true` while credentials are held.
	pub fn is_authenticated(&self) -> bool {
		self.session.is_authenticated()
	}
}
#[cfg(feature = "reqwest")]
impl ApiClient<ReqwestTransport> {
	/// Creates a client that provisions its own reqwest transport.
	pub fn new(config: ClientConfig, store: Arc<dyn CredentialStore>) -> Self {
		Self::with_transport(config, store, ReqwestTransport::default())
	}
}
impl<T> Clone for ApiClient<T>
where
	T: ApiTransport,
{
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			store: self.store.clone(),
			config: self.config.clone(),
			refresh_metrics: self.refresh_metrics.clone(),
			session: self.session.clone(),
			refresh_slot: self.refresh_slot.clone(),
			verification_slot: self.verification_slot.clone(),
		}
	}
}
impl<T> Debug for ApiClient<T>
where
	T: ApiTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient")
			.field("base_url", &self.config.base_url.as_str())
			.field("state", &self.session.state())
			.field("user", &self.session.user().map(|user| user.id))
			.finish()
	}
}
