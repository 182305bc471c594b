//! Session state machine and the in-memory session record.
//!
//! A [`Session`] is owned by one [`ApiClient`](crate::client::ApiClient). Outside the crate
//! it is read-only; every transition goes through the client's action methods (login,
//! registration, refresh, logout), so there is a single writer for credentials.
//!
//! ```text
//! Unauthenticated -> Authenticating -> Authenticated -> Refreshing -> Authenticated
//!                                                                  \-> Unauthenticated
//! ```

// self
use crate::{
	_prelude::*,
	auth::{CredentialPair, UserProfile},
};

/// Lifecycle state of a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
	/// No credentials are held.
	#[default]
	Unauthenticated,
	/// A login or registration exchange is in progress.
	Authenticating,
	/// Credentials are held and usable.
	Authenticated,
	/// Credentials are held while a refresh exchange is in flight.
	Refreshing,
}
impl SessionState {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Unauthenticated => "unauthenticated",
			Self::Authenticating => "authenticating",
			Self::Authenticated => "authenticated",
			Self::Refreshing => "refreshing",
		}
	}

	/// Returns `true` while credentials are held.
	pub const fn has_credentials(self) -> bool {
		matches!(self, Self::Authenticated | Self::Refreshing)
	}
}
impl Display for SessionState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Point-in-time copy of the session.
#[derive(Clone, Debug, Default)]
pub struct SessionSnapshot {
	/// Lifecycle state.
	pub state: SessionState,
	/// Credential pair; kept while a refresh or a re-login is in flight.
	pub credentials: Option<CredentialPair>,
	/// Cached user profile, once fetched.
	pub user: Option<UserProfile>,
	/// Counter bumped on every credential change; lets callers detect a completed refresh.
	pub epoch: u64,
}

/// Session owned by the client; readers get copies, writers are crate-internal.
#[derive(Debug, Default)]
pub struct Session(RwLock<SessionSnapshot>);
impl Session {
	/// Returns a copy of the whole session.
	pub fn snapshot(&self) -> SessionSnapshot {
		self.0.read().clone()
	}

	/// Current lifecycle state.
	pub fn state(&self) -> SessionState {
		self.0.read().state
	}

	/// Current credential pair.
	pub fn credentials(&self) -> Option<CredentialPair> {
		self.0.read().credentials.clone()
	}

	/// Cached user profile.
	pub fn user(&self) -> Option<UserProfile> {
		self.0.read().user.clone()
	}

	/// Current credential epoch.
	pub fn epoch(&self) -> u64 {
		self.0.read().epoch
	}

	/// Returns `true` while credentials are held, including during a refresh or a re-login.
	pub fn is_authenticated(&self) -> bool {
		self.0.read().credentials.is_some()
	}

	/// Enters `Authenticating`, returning the state to restore if the exchange fails.
	pub(crate) fn begin_authentication(&self) -> SessionState {
		let mut inner = self.0.write();
		let previous = inner.state;

		inner.state = SessionState::Authenticating;

		previous
	}

	/// Leaves `Authenticating` without new credentials.
	pub(crate) fn abort_authentication(&self, previous: SessionState) {
		let mut inner = self.0.write();

		if inner.state == SessionState::Authenticating {
			inner.state = match (&inner.credentials, previous) {
				(None, _) => SessionState::Unauthenticated,
				// A refresh overlapping the login settles on its own; never resume `Refreshing`.
				(Some(_), SessionState::Refreshing) => SessionState::Authenticated,
				(Some(_), previous) => previous,
			};
		}
	}

	/// Installs a freshly issued pair and returns the new epoch.
	pub(crate) fn establish(&self, credentials: CredentialPair, user: Option<UserProfile>) -> u64 {
		let mut inner = self.0.write();

		inner.state = SessionState::Authenticated;
		inner.credentials = Some(credentials);
		inner.user = user;
		inner.epoch += 1;

		inner.epoch
	}

	/// Enters `Refreshing` if credentials are held.
	///
	/// The returned guard leaves `Refreshing` when dropped, so an abandoned exchange cannot
	/// strand the session there.
	#[must_use]
	pub(crate) fn begin_refresh(&self) -> RefreshingGuard<'_> {
		let mut inner = self.0.write();

		if inner.state == SessionState::Authenticated {
			inner.state = SessionState::Refreshing;
		}

		RefreshingGuard(self)
	}

	/// Replaces the credentials after a refresh, keeping the cached user.
	///
	/// Does nothing and returns `None` if the epoch moved since `expected_epoch`.
	pub(crate) fn rotate(&self, expected_epoch: u64, credentials: CredentialPair) -> Option<u64> {
		let mut inner = self.0.write();

		if inner.epoch != expected_epoch {
			return None;
		}

		inner.state = SessionState::Authenticated;
		inner.credentials = Some(credentials);
		inner.epoch += 1;

		Some(inner.epoch)
	}

	/// Returns to `Authenticated` after a refresh that ended without new credentials.
	pub(crate) fn end_refresh(&self) {
		let mut inner = self.0.write();

		if inner.state == SessionState::Refreshing {
			inner.state = SessionState::Authenticated;
		}
	}

	/// Replaces the cached user profile.
	pub(crate) fn set_user(&self, user: UserProfile) {
		self.0.write().user = Some(user);
	}

	/// Flags the cached user as verified.
	pub(crate) fn mark_email_verified(&self) {
		if let Some(user) = self.0.write().user.as_mut() {
			user.email_verified = true;
		}
	}

	/// Drops credentials and user, returning to `Unauthenticated`; returns the new epoch.
	pub(crate) fn terminate(&self) -> u64 {
		let mut inner = self.0.write();

		inner.state = SessionState::Unauthenticated;
		inner.credentials = None;
		inner.user = None;
		inner.epoch += 1;

		inner.epoch
	}

	/// Terminates the session only if it is still at `expected_epoch`.
	pub(crate) fn expire(&self, expected_epoch: u64) -> Option<u64> {
		let mut inner = self.0.write();

		if inner.epoch != expected_epoch {
			return None;
		}

		inner.state = SessionState::Unauthenticated;
		inner.credentials = None;
		inner.user = None;
		inner.epoch += 1;

		Some(inner.epoch)
	}
}

/// Holds a session in `Refreshing`; dropping it returns the session to `Authenticated`.
#[derive(Debug)]
pub(crate) struct RefreshingGuard<'a>(&'a Session);
impl Drop for RefreshingGuard<'_> {
	fn drop(&mut self) {
		self.0.end_refresh();
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::auth::SubscriptionTier;

	fn user() -> UserProfile {
		UserProfile {
			id: "1".into(),
			email: "ada@example.com".into(),
			first_name: None,
			last_name: None,
			email_verified: false,
			subscription: SubscriptionTier::Free,
		}
	}

	#[test]
	fn login_refresh_logout_cycle() {
		let session = Session::default();

		assert_eq!(session.state(), SessionState::Unauthenticated);

		let previous = session.begin_authentication();

		assert_eq!(session.state(), SessionState::Authenticating);

		let epoch = session.establish(CredentialPair::new("a1", "r1"), Some(user()));

		assert_eq!(previous, SessionState::Unauthenticated);
		assert_eq!(session.state(), SessionState::Authenticated);

		let refreshing = session.begin_refresh();

		assert_eq!(session.state(), SessionState::Refreshing);
		assert!(session.is_authenticated());

		let rotated = session.rotate(epoch, CredentialPair::new("a2", "r1"));

		drop(refreshing);

		assert_eq!(rotated, Some(epoch + 1));
		assert_eq!(session.rotate(epoch, CredentialPair::new("a3", "r1")), None);
		assert_eq!(session.state(), SessionState::Authenticated);
		assert_eq!(session.user().map(|u| u.email), Some("ada@example.com".into()));

		session.terminate();

		let snapshot = session.snapshot();

		assert_eq!(snapshot.state, SessionState::Unauthenticated);
		assert!(snapshot.credentials.is_none());
		assert!(snapshot.user.is_none());
		assert_eq!(snapshot.epoch, epoch + 2);
	}

	#[test]
	fn failed_login_restores_previous_state() {
		let session = Session::default();

		session.establish(CredentialPair::new("a1", "r1"), None);

		let previous = session.begin_authentication();

		session.abort_authentication(previous);

		assert_eq!(session.state(), SessionState::Authenticated);

		let fresh = Session::default();
		let previous = fresh.begin_authentication();

		fresh.abort_authentication(previous);

		assert_eq!(fresh.state(), SessionState::Unauthenticated);
	}

	#[test]
	fn refresh_only_starts_from_authenticated() {
		let session = Session::default();

		drop(session.begin_refresh());

		assert_eq!(session.state(), SessionState::Unauthenticated);

		session.establish(CredentialPair::new("a1", "r1"), Some(user()));

		let refreshing = session.begin_refresh();

		assert_eq!(session.state(), SessionState::Refreshing);

		drop(refreshing);

		assert_eq!(session.state(), SessionState::Authenticated);

		session.mark_email_verified();

		assert!(session.user().is_some_and(|u| u.email_verified));
	}

	#[test]
	fn expiry_is_ignored_after_a_newer_login() {
		let session = Session::default();
		let stale = session.establish(CredentialPair::new("a1", "r1"), None);
		let current = session.establish(CredentialPair::new("a2", "r2"), Some(user()));

		assert_eq!(session.expire(stale), None);
		assert!(session.is_authenticated());
		assert_eq!(session.expire(current), Some(current + 1));
		assert_eq!(session.state(), SessionState::Unauthenticated);
	}

	#[test]
	fn relogin_keeps_the_current_pair_usable() {
		let session = Session::default();

		session.establish(CredentialPair::new("a1", "r1"), Some(user()));

		let refreshing = session.begin_refresh();
		let previous = session.begin_authentication();

		assert_eq!(session.state(), SessionState::Authenticating);
		assert!(session.is_authenticated());

		drop(refreshing);
		session.abort_authentication(previous);

		assert_eq!(previous, SessionState::Refreshing);
		assert_eq!(session.state(), SessionState::Authenticated);
	}
}
