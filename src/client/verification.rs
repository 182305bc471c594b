//! Email verification status checks and polling.

// crates.io
use rand::Rng;
// self
use crate::{
	_prelude::*,
	client::ApiClient,
	http::{ApiTransport, Method},
	obs::{self, OpKind},
};

/// Verification state reported by the backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationStatus {
	/// Whether the address has been verified.
	#[serde(alias = "is_verified", alias = "verified", alias = "is_email_verified")]
	pub email_verified: bool,
	/// Address the status refers to, when the backend includes it.
	#[serde(default)]
	pub email: Option<String>,
}

/// How [`ApiClient::wait_for_email_verification`] polls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollPolicy {
	/// Base delay between checks.
	pub interval: Duration,
	/// Upper bound of the random delay added to each interval.
	pub max_jitter: Duration,
	/// Number of checks before giving up; values below 1 are treated as 1.
	pub max_attempts: u32,
}
impl PollPolicy {
	/// Creates a policy with the default jitter.
	pub fn new(interval: Duration, max_attempts: u32) -> Self {
		Self { interval, max_attempts, ..Default::default() }
	}

	/// Overrides the jitter bound.
	pub fn with_jitter(mut self, max_jitter: Duration) -> Self {
		self.max_jitter = max_jitter;

		self
	}

	fn attempts(&self) -> u32 {
		self.max_attempts.max(1)
	}

	fn next_delay(&self) -> std::time::Duration {
		let base = std::time::Duration::try_from(self.interval).unwrap_or_default();
		let jitter_ms = u64::try_from(self.max_jitter.whole_milliseconds()).unwrap_or(0);
		let jitter = if jitter_ms == 0 { 0 } else { rand::rng().random_range(0..=jitter_ms) };

		base + std::time::Duration::from_millis(jitter)
	}
}
impl Default for PollPolicy {
	fn default() -> Self {
		Self { interval: Duration::seconds(5), max_jitter: Duration::seconds(1), max_attempts: 60 }
	}
}

/// Serializes status checks and keeps the latest result for the dedup window.
#[derive(Debug, Default)]
pub(crate) struct VerificationSlot {
	guard: AsyncMutex<()>,
	last: Mutex<Option<CachedStatus>>,
}
impl VerificationSlot {
	fn fresh(&self, epoch: u64, now: OffsetDateTime, window: Duration) -> Option<VerificationStatus> {
		self.last
			.lock()
			.as_ref()
			.filter(|cached| cached.epoch == epoch && now - cached.checked_at < window)
			.map(|cached| cached.status.clone())
	}

	fn remember(&self, epoch: u64, status: VerificationStatus) {
		*self.last.lock() =
			Some(CachedStatus { epoch, checked_at: OffsetDateTime::now_utc(), status });
	}

	/// Drops the cached status.
	pub(crate) fn forget(&self) {
		self.last.lock().take();
	}
}

#[derive(Debug)]
struct CachedStatus {
	epoch: u64,
	checked_at: OffsetDateTime,
	status: VerificationStatus,
}

impl<T> ApiClient<T>
where
	T: ApiTransport,
{
	/// Returns the signed-in user's verification status.
	///
	/// Concurrent callers share one request, and a result younger than
	/// [`ClientConfig::verification_dedup_window`](crate::config::ClientConfig::verification_dedup_window)
	/// is returned without contacting the backend.
	pub async fn verification_status(&self) -> Result<VerificationStatus> {
		obs::observe(OpKind::Verification, "verification_status", self.check_verification()).await
	}

	/// Polls [`verification_status`](Self::verification_status) until the address is
	/// verified or `policy.max_attempts` checks were made.
	///
	/// Returns [`Error::VerificationPending`] when the budget runs out. Any other error
	/// stops polling immediately.
	pub async fn wait_for_email_verification(
		&self,
		policy: PollPolicy,
	) -> Result<VerificationStatus> {
		let attempts = policy.attempts();

		for attempt in 1..=attempts {
			let status = self.verification_status().await?;

			if status.email_verified {
				return Ok(status);
			}
			if attempt < attempts {
				tokio::time::sleep(policy.next_delay()).await;
			}
		}

		Err(Error::VerificationPending { attempts })
	}

	async fn check_verification(&self) -> Result<VerificationStatus> {
		let window = self.config.verification_dedup_window;

		if let Some(status) =
			self.verification_slot.fresh(self.session.epoch(), OffsetDateTime::now_utc(), window)
		{
			return Ok(status);
		}

		let _inflight = self.verification_slot.guard.lock().await;

		// Another caller may have finished a check while this one waited.
		if let Some(status) =
			self.verification_slot.fresh(self.session.epoch(), OffsetDateTime::now_utc(), window)
		{
			return Ok(status);
		}
		if !self.session.is_authenticated() {
			return Err(Error::NotAuthenticated);
		}

		let url = self.config.url(&self.config.endpoints.verification_status)?;
		let status =
			self.send_authorized(Method::Get, url, None).await?.json::<VerificationStatus>()?;

		if status.email_verified {
			self.session.mark_email_verified();
		}

		self.verification_slot.remember(self.session.epoch(), status.clone());

		Ok(status)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn status(verified: bool) -> VerificationStatus {
		VerificationStatus { email_verified: verified, email: None }
	}

	#[test]
	fn cached_status_expires_with_window_and_epoch() {
		let slot = VerificationSlot::default();
		let now = OffsetDateTime::now_utc();

		slot.remember(3, status(false));

		assert_eq!(slot.fresh(3, now, Duration::seconds(2)), Some(status(false)));
		assert_eq!(slot.fresh(4, now, Duration::seconds(2)), None);
		assert_eq!(slot.fresh(3, now + Duration::seconds(3), Duration::seconds(2)), None);
		assert_eq!(slot.fresh(3, now, Duration::ZERO), None);

		slot.forget();

		assert_eq!(slot.fresh(3, now, Duration::seconds(2)), None);
	}

	#[test]
	fn poll_delay_stays_within_jitter_bound() {
		let policy =
			PollPolicy::new(Duration::milliseconds(100), 0).with_jitter(Duration::milliseconds(50));

		assert_eq!(policy.attempts(), 1);

		for _ in 0..32 {
			let delay = policy.next_delay();

			assert!(delay >= std::time::Duration::from_millis(100));
			assert!(delay <= std::time::Duration::from_millis(150));
		}

		let fixed = PollPolicy::new(Duration::milliseconds(10), 3).with_jitter(Duration::ZERO);

		assert_eq!(fixed.next_delay(), std::time::Duration::from_millis(10));
	}

	#[test]
	fn status_accepts_backend_aliases() {
		let decoded: VerificationStatus =
			serde_json::from_str(r#"{"is_verified":true,"email":"ada@example.com"}"#)
				.expect("Aliased status should decode.");

		assert!(decoded.email_verified);
		assert_eq!(decoded.email.as_deref(), Some("ada@example.com"));
	}
}
