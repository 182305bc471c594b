//! Thread-safe in-memory [`CredentialStore`] for tests and in-process sessions.

// self
use crate::{
	_prelude::*,
	auth::CredentialPair,
	store::{self, CompareAndSwapOutcome, CredentialStore, StoreEntries, StoreFuture},
};

type EntryMap = Arc<RwLock<StoreEntries>>;

/// Storage backend that keeps the credential entries in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(EntryMap);
impl MemoryStore {
	/// Creates a store pre-populated with `pair`.
	pub fn with_credentials(pair: CredentialPair) -> Self {
		let mut entries = StoreEntries::new();

		store::write_pair(&mut entries, pair);

		Self(Arc::new(RwLock::new(entries)))
	}

	/// Returns a copy of the raw entries.
	pub fn entries(&self) -> StoreEntries {
		self.0.read().clone()
	}

	/// Returns the stored pair synchronously.
	pub fn current(&self) -> Option<CredentialPair> {
		store::read_pair(&self.0.read())
	}
}
impl CredentialStore for MemoryStore {
	fn load(&self) -> StoreFuture<'_, Option<CredentialPair>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(store::read_pair(&map.read())) })
	}

	fn save(&self, pair: CredentialPair) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			store::write_pair(&mut map.write(), pair);

			Ok(())
		})
	}

	fn compare_and_swap_refresh<'a>(
		&'a self,
		expected_refresh: &'a str,
		replacement: CredentialPair,
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		let map = self.0.clone();

		Box::pin(async move {
			Ok(store::swap_if_refresh_matches(&mut map.write(), expected_refresh, replacement))
		})
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			store::clear_pair(&mut map.write());

			Ok(())
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::auth::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};

	#[tokio::test]
	async fn save_load_and_clear() {
		let store = MemoryStore::default();

		assert!(store.load().await.expect("Load should succeed.").is_none());

		store.save(CredentialPair::new("a1", "r1")).await.expect("Save should succeed.");

		let loaded = store.load().await.expect("Load should succeed.").expect("Pair should exist.");

		assert_eq!(loaded.access.expose(), "a1");
		assert_eq!(store.entries().get(REFRESH_TOKEN_KEY).map(String::as_str), Some("r1"));

		store.clear().await.expect("Clear should succeed.");

		assert!(store.entries().get(ACCESS_TOKEN_KEY).is_none());
		assert!(store.current().is_none());
	}

	#[tokio::test]
	async fn compare_and_swap_rotates_only_matching_refresh() {
		let store = MemoryStore::with_credentials(CredentialPair::new("a1", "r1"));
		let outcome = store
			.compare_and_swap_refresh("r0", CredentialPair::new("a2", "r2"))
			.await
			.expect("CAS should succeed.");

		assert_eq!(outcome, CompareAndSwapOutcome::RefreshMismatch);
		assert_eq!(store.current().map(|p| p.access), Some("a1".into()));

		let outcome = store
			.compare_and_swap_refresh("r1", CredentialPair::new("a2", "r2"))
			.await
			.expect("CAS should succeed.");

		assert_eq!(outcome, CompareAndSwapOutcome::Updated);
		assert_eq!(store.current().map(|p| p.refresh), Some("r2".into()));
	}
}
