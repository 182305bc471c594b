//! Single-flight refresh of the access credential.
//!
//! Callers pass the session epoch they observed. The first caller to take the refresh guard
//! while the epoch is unchanged performs the exchange; everyone queued behind it sees a
//! newer epoch and receives the outcome of that exchange instead of starting another one.
//! A failed exchange is terminal: stored credentials are cleared, the session returns to
//! `Unauthenticated`, and waiters get the same [`Error::SessionExpired`].

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{CredentialPair, TokenSecret},
	client::ApiClient,
	http::{ApiTransport, Method},
	obs::{self, OpKind},
	store::CompareAndSwapOutcome,
};

/// Shared guard serializing refresh exchanges plus the outcome of the last failed one.
#[derive(Debug, Default)]
pub(crate) struct RefreshSlot {
	guard: AsyncMutex<()>,
	last_failure: Mutex<Option<(u64, RefreshFailure)>>,
}
impl RefreshSlot {
	/// Error recorded for the failure that moved the session to `epoch`, if any.
	fn failure_at(&self, epoch: u64) -> Option<Error> {
		self.last_failure
			.lock()
			.as_ref()
			.filter(|(at, _)| *at == epoch)
			.map(|(_, failure)| failure.clone().into())
	}
}

#[derive(Clone, Debug)]
struct RefreshFailure {
	reason: String,
	status: Option<u16>,
}
impl From<Error> for RefreshFailure {
	fn from(e: Error) -> Self {
		Self { status: e.status(), reason: e.to_string().trim_end_matches('.').to_owned() }
	}
}
impl From<RefreshFailure> for Error {
	fn from(failure: RefreshFailure) -> Self {
		Self::SessionExpired { reason: failure.reason, status: failure.status }
	}
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
	refresh: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
	#[serde(alias = "access_token")]
	access: String,
	#[serde(default, alias = "refresh_token")]
	refresh: Option<String>,
}

impl<T> ApiClient<T>
where
	T: ApiTransport,
{
	/// Exchanges the refresh credential for a new access credential.
	///
	/// Concurrent callers share one exchange. On failure the session is cleared and
	/// [`Error::SessionExpired`] is returned; the exchange is never retried automatically.
	pub async fn refresh(&self) -> Result<CredentialPair> {
		self.refresh_from(self.session.epoch()).await.map(|(_, credentials)| credentials)
	}

	/// Refreshes unless the credentials already moved past `observed_epoch`.
	pub(crate) async fn refresh_from(&self, observed_epoch: u64) -> Result<(u64, CredentialPair)> {
		self.refresh_metrics.record_attempt();

		let result =
			obs::observe(OpKind::Refresh, "refresh", self.refresh_once(observed_epoch)).await;

		match &result {
			Ok(_) => self.refresh_metrics.record_success(),
			Err(_) => self.refresh_metrics.record_failure(),
		}

		result
	}

	async fn refresh_once(&self, observed_epoch: u64) -> Result<(u64, CredentialPair)> {
		let _singleflight = self.refresh_slot.guard.lock().await;
		let snapshot = self.session.snapshot();

		if snapshot.epoch != observed_epoch {
			return match snapshot.credentials {
				Some(credentials) => Ok((snapshot.epoch, credentials)),
				None => Err(self
					.refresh_slot
					.failure_at(snapshot.epoch)
					.unwrap_or(Error::NotAuthenticated)),
			};
		}

		let Some(current) = snapshot.credentials else {
			return Err(Error::NotAuthenticated);
		};

		let _refreshing = self.session.begin_refresh();

		self.refresh_metrics.record_exchange();

		match self.exchange(&current).await {
			Ok(renewed) => self.install(observed_epoch, &current, renewed).await,
			Err(failure) => Err(self.expire(observed_epoch, failure).await),
		}
	}

	async fn exchange(&self, current: &CredentialPair) -> Result<CredentialPair, RefreshFailure> {
		let body = RefreshRequest { refresh: current.refresh.expose() };
		let response = self
			.send_unauthenticated(Method::Post, &self.config.endpoints.refresh, Some(&body))
			.await?;
		let issued = response.json::<RefreshResponse>()?;

		if issued.access.trim().is_empty() {
			return Err(RefreshFailure {
				reason: "refresh response carried an empty access credential".into(),
				status: Some(response.status),
			});
		}

		let rotated = issued.refresh.filter(|refresh| !refresh.trim().is_empty());

		Ok(current.rotated(issued.access, rotated.map(TokenSecret::from)))
	}

	/// Persists the renewed pair with compare-and-swap and installs it in the session.
	///
	/// A newer pair found in the store wins over `renewed`. Store failures are logged; the
	/// in-memory session still moves to the renewed credentials.
	async fn install(
		&self,
		observed_epoch: u64,
		current: &CredentialPair,
		renewed: CredentialPair,
	) -> Result<(u64, CredentialPair)> {
		let outcome = self
			.store
			.compare_and_swap_refresh(current.refresh.expose(), renewed.clone())
			.await
			.inspect_err(|e| obs::warn(OpKind::Refresh, "compare_and_swap_refresh", e))
			.ok();
		let credentials = match outcome {
			Some(CompareAndSwapOutcome::RefreshMismatch) => match self.store.load().await {
				Ok(Some(newer)) => newer,
				Ok(None) => renewed,
				Err(e) => {
					obs::warn(OpKind::Refresh, "load", &e);

					renewed
				},
			},
			_ => renewed,
		};
		let Some(epoch) = self.session.rotate(observed_epoch, credentials.clone()) else {
			// Logout or a new login replaced the session while the exchange was in flight.
			let snapshot = self.session.snapshot();

			return snapshot
				.credentials
				.map(|credentials| (snapshot.epoch, credentials))
				.ok_or(Error::NotAuthenticated);
		};

		if outcome == Some(CompareAndSwapOutcome::Missing) {
			if let Err(e) = self.store.save(credentials.clone()).await {
				obs::warn(OpKind::Refresh, "save", &e);
			}
		}

		Ok((epoch, credentials))
	}

	async fn expire(&self, observed_epoch: u64, failure: RefreshFailure) -> Error {
		if let Some(epoch) = self.session.expire(observed_epoch) {
			if let Err(e) = self.store.clear().await {
				obs::warn(OpKind::Refresh, "clear", &e);
			}

			*self.refresh_slot.last_failure.lock() = Some((epoch, failure.clone()));
		}

		failure.into()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn failures_become_session_expired_with_status() {
		let failure = RefreshFailure::from(Error::Unauthorized { status: 401 });

		match Error::from(failure) {
			Error::SessionExpired { reason, status } => {
				assert_eq!(status, Some(401));
				assert_eq!(reason, "Request was not authorized (HTTP 401)");
			},
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}

	#[test]
	fn recorded_failure_is_only_shared_with_its_epoch() {
		let slot = RefreshSlot::default();

		*slot.last_failure.lock() =
			Some((4, RefreshFailure { reason: "refresh rejected".into(), status: Some(401) }));

		assert!(matches!(slot.failure_at(4), Some(Error::SessionExpired { status: Some(401), .. })));
		assert!(slot.failure_at(5).is_none());
	}

	#[test]
	fn refresh_response_accepts_aliases_and_missing_rotation() {
		let issued: RefreshResponse = serde_json::from_str(r#"{"access_token":"a2"}"#)
			.expect("Aliased refresh response should decode.");

		assert_eq!(issued.access, "a2");
		assert!(issued.refresh.is_none());
	}
}
