//! Credential storage contract and built-in store implementations.
//!
//! A store holds exactly two string entries, [`ACCESS_TOKEN_KEY`] and [`REFRESH_TOKEN_KEY`],
//! the same two values a browser client keeps in local storage. A pair is
//! only reported by [`CredentialStore::load`] when both entries are present.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{ACCESS_TOKEN_KEY, CredentialPair, REFRESH_TOKEN_KEY, TokenSecret},
};

/// Boxed future returned by [`CredentialStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Raw key/value view of a credential store.
pub type StoreEntries = BTreeMap<String, String>;

/// Storage backend contract for the session's credential pair.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Loads the stored pair, if both entries are present.
	fn load(&self) -> StoreFuture<'_, Option<CredentialPair>>;

	/// Persists or replaces the pair.
	fn save(&self, pair: CredentialPair) -> StoreFuture<'_, ()>;

	/// Replaces the pair only if the stored refresh credential equals `expected_refresh`.
	fn compare_and_swap_refresh<'a>(
		&'a self,
		expected_refresh: &'a str,
		replacement: CredentialPair,
	) -> StoreFuture<'a, CompareAndSwapOutcome>;

	/// Removes both entries.
	fn clear(&self) -> StoreFuture<'_, ()>;
}

/// Result of a refresh-credential compare-and-swap attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareAndSwapOutcome {
	/// The refresh credential matched and the pair was replaced.
	Updated,
	/// A pair exists but its refresh credential differs from the expected one.
	RefreshMismatch,
	/// No pair is stored.
	Missing,
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

pub(crate) fn read_pair(entries: &StoreEntries) -> Option<CredentialPair> {
	let access = entries.get(ACCESS_TOKEN_KEY)?;
	let refresh = entries.get(REFRESH_TOKEN_KEY)?;

	Some(CredentialPair::new(access.as_str(), refresh.as_str()))
}

pub(crate) fn write_pair(entries: &mut StoreEntries, pair: CredentialPair) {
	entries.insert(ACCESS_TOKEN_KEY.into(), pair.access.expose().to_owned());
	entries.insert(REFRESH_TOKEN_KEY.into(), pair.refresh.expose().to_owned());
}

pub(crate) fn clear_pair(entries: &mut StoreEntries) {
	entries.remove(ACCESS_TOKEN_KEY);
	entries.remove(REFRESH_TOKEN_KEY);
}

/// Applies a compare-and-swap against the entries; returns whether they changed.
pub(crate) fn swap_if_refresh_matches(
	entries: &mut StoreEntries,
	expected_refresh: &str,
	replacement: CredentialPair,
) -> CompareAndSwapOutcome {
	let outcome = match read_pair(entries) {
		Some(existing) if existing.refresh == TokenSecret::from(expected_refresh) =>
			CompareAndSwapOutcome::Updated,
		Some(_) => CompareAndSwapOutcome::RefreshMismatch,
		None => CompareAndSwapOutcome::Missing,
	};

	if matches!(outcome, CompareAndSwapOutcome::Updated) {
		write_pair(entries, replacement);
	}

	outcome
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;
	use crate::error::Error;

	#[test]
	fn store_error_converts_into_client_error_with_source() {
		let store_error = StoreError::Backend { message: "disk unavailable".into() };
		let client_error: Error = store_error.clone().into();

		assert!(matches!(client_error, Error::Storage(_)));
		assert!(client_error.to_string().contains("disk unavailable"));

		let source = StdError::source(&client_error)
			.expect("Client error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn half_written_entries_are_not_a_pair() {
		let mut entries = StoreEntries::new();

		entries.insert(ACCESS_TOKEN_KEY.into(), "access-only".into());

		assert!(read_pair(&entries).is_none());

		write_pair(&mut entries, CredentialPair::new("a", "r"));
		clear_pair(&mut entries);

		assert!(entries.is_empty());
	}

	#[test]
	fn swap_requires_matching_refresh() {
		let mut entries = StoreEntries::new();

		assert_eq!(
			swap_if_refresh_matches(&mut entries, "r1", CredentialPair::new("a2", "r2")),
			CompareAndSwapOutcome::Missing
		);

		write_pair(&mut entries, CredentialPair::new("a1", "r1"));

		assert_eq!(
			swap_if_refresh_matches(&mut entries, "stale", CredentialPair::new("a2", "r2")),
			CompareAndSwapOutcome::RefreshMismatch
		);
		assert_eq!(
			swap_if_refresh_matches(&mut entries, "r1", CredentialPair::new("a2", "r2")),
			CompareAndSwapOutcome::Updated
		);
		assert_eq!(entries.get(ACCESS_TOKEN_KEY).map(String::as_str), Some("a2"));
	}
}
