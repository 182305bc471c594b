#![allow(dead_code)]

// std
use std::sync::Arc;
// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::json;
// self
use receipt_api_client::{
	auth::CredentialPair,
	config::ClientConfig,
	store::MemoryStore,
	time::{Duration, OffsetDateTime},
	url::Url,
};
#[cfg(feature = "reqwest")] use receipt_api_client::client::ReqwestApiClient;

/// Builds an unsigned JWT whose payload carries `exp` and a distinguishing `jti`.
pub fn jwt(expires_at: OffsetDateTime, jti: &str) -> String {
	let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
	let payload = json!({
		"exp": expires_at.unix_timestamp(),
		"iat": (expires_at - Duration::minutes(15)).unix_timestamp(),
		"jti": jti,
		"token_type": "access",
		"user_id": 42,
	});

	format!("{header}.{}.c2lnbmF0dXJl", URL_SAFE_NO_PAD.encode(payload.to_string()))
}

/// Access credential that expired a minute ago.
pub fn expired_jwt(jti: &str) -> String {
	jwt(OffsetDateTime::now_utc() - Duration::minutes(1), jti)
}

/// Access credential valid for another hour.
pub fn fresh_jwt(jti: &str) -> String {
	jwt(OffsetDateTime::now_utc() + Duration::hours(1), jti)
}

pub fn config(base_url: &str) -> ClientConfig {
	ClientConfig::builder(Url::parse(base_url).expect("Base URL fixture should parse."))
		.verification_dedup_window(Duration::ZERO)
		.build()
		.expect("Client config fixture should build.")
}

/// Store already holding `access` and `refresh`.
pub fn seeded_store(access: &str, refresh: &str) -> MemoryStore {
	MemoryStore::with_credentials(CredentialPair::new(access, refresh))
}

#[cfg(feature = "reqwest")]
pub fn reqwest_client(base_url: &str, store: &MemoryStore) -> ReqwestApiClient {
	ReqwestApiClient::new(config(base_url), Arc::new(store.clone()))
}

#[cfg(feature = "reqwest")]
/// Client whose session was restored from `store`.
pub async fn restored_client(base_url: &str, store: &MemoryStore) -> ReqwestApiClient {
	let client = reqwest_client(base_url, store);

	assert!(client.restore().await.expect("Restoring from the store should succeed."));

	client
}
