//! Authenticated request pipeline.
//!
//! Every call goes through [`ApiClient::request_raw`]: the access credential is refreshed
//! first when it is expired or inside the configured buffer window, attached as a bearer
//! header, and a `401` on the first attempt triggers exactly one refresh plus one retry.
//! A `401` on the retry is surfaced as [`Error::Unauthorized`].

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::CredentialPair,
	client::ApiClient,
	error::{ConfigError, FieldErrors},
	http::{ApiRequest, ApiResponse, ApiTransport, Method},
	obs::{self, OpKind},
};

const UNAUTHORIZED: u16 = 401;

impl<T> ApiClient<T>
where
	T: ApiTransport,
{
	/// Sends a request and decodes the JSON response.
	pub async fn request<B, R>(&self, method: Method, path: &str, body: Option<&B>) -> Result<R>
	where
		B: ?Sized + Serialize,
		R: DeserializeOwned,
	{
		self.request_raw(method, path, body).await?.json()
	}

	/// `GET` helper.
	pub async fn get<R>(&self, path: &str) -> Result<R>
	where
		R: DeserializeOwned,
	{
		self.request(Method::Get, path, None::<&()>).await
	}

	/// `POST` helper.
	pub async fn post<B, R>(&self, path: &str, body: &B) -> Result<R>
	where
		B: ?Sized + Serialize,
		R: DeserializeOwned,
	{
		self.request(Method::Post, path, Some(body)).await
	}

	/// `PUT` helper.
	pub async fn put<B, R>(&self, path: &str, body: &B) -> Result<R>
	where
		B: ?Sized + Serialize,
		R: DeserializeOwned,
	{
		self.request(Method::Put, path, Some(body)).await
	}

	/// `PATCH` helper.
	pub async fn patch<B, R>(&self, path: &str, body: &B) -> Result<R>
	where
		B: ?Sized + Serialize,
		R: DeserializeOwned,
	{
		self.request(Method::Patch, path, Some(body)).await
	}

	/// `DELETE` helper; the response body is discarded.
	pub async fn delete(&self, path: &str) -> Result<()> {
		self.request_raw(Method::Delete, path, None::<&()>).await.map(|_| ())
	}

	/// Sends a request and returns the successful response without decoding it.
	///
	/// Non-2xx responses are mapped onto [`Error`] variants.
	pub async fn request_raw<B>(
		&self,
		method: Method,
		path: &str,
		body: Option<&B>,
	) -> Result<ApiResponse>
	where
		B: ?Sized + Serialize,
	{
		let url = self.config.url(path)?;
		let body = encode_body(body)?;

		obs::observe(OpKind::Request, "request_raw", self.send_authorized(method, url, body)).await
	}

	pub(crate) async fn send_authorized(
		&self,
		method: Method,
		url: Url,
		body: Option<Vec<u8>>,
	) -> Result<ApiResponse> {
		let (epoch, credentials) = self.usable_credentials().await?;
		let Some(credentials) = credentials else {
			return classify_response(self.send_once(method, url, body, None).await?);
		};
		let response =
			self.send_once(method, url.clone(), body.clone(), Some(&credentials)).await?;

		if response.status != UNAUTHORIZED {
			return classify_response(response);
		}

		let (_, renewed) = self.refresh_from(epoch).await?;

		classify_response(self.send_once(method, url, body, Some(&renewed)).await?)
	}

	/// Current credentials, refreshed first if they are about to expire.
	async fn usable_credentials(&self) -> Result<(u64, Option<CredentialPair>)> {
		let snapshot = self.session().snapshot();
		let Some(credentials) = snapshot.credentials else {
			return Ok((snapshot.epoch, None));
		};

		if credentials.needs_refresh_at(OffsetDateTime::now_utc(), self.config.expiry_buffer) {
			let (epoch, renewed) = self.refresh_from(snapshot.epoch).await?;

			return Ok((epoch, Some(renewed)));
		}

		Ok((snapshot.epoch, Some(credentials)))
	}

	pub(crate) async fn send_once(
		&self,
		method: Method,
		url: Url,
		body: Option<Vec<u8>>,
		credentials: Option<&CredentialPair>,
	) -> Result<ApiResponse> {
		let request = ApiRequest::new(method, url)
			.with_bearer(credentials.map(|pair| pair.access.clone()))
			.with_body(body);

		Ok(self.transport.send(request).await?)
	}

	pub(crate) async fn send_unauthenticated<B>(
		&self,
		method: Method,
		path: &str,
		body: Option<&B>,
	) -> Result<ApiResponse>
	where
		B: ?Sized + Serialize,
	{
		let url = self.config.url(path)?;
		let body = encode_body(body)?;

		classify_response(self.send_once(method, url, body, None).await?)
	}
}

pub(crate) fn encode_body<B>(body: Option<&B>) -> Result<Option<Vec<u8>>>
where
	B: ?Sized + Serialize,
{
	body.map(serde_json::to_vec).transpose().map_err(|e| ConfigError::RequestBody(e).into())
}

/// Maps non-2xx responses onto the error taxonomy.
pub(crate) fn classify_response(response: ApiResponse) -> Result<ApiResponse> {
	let status = response.status;

	match status {
		200..=299 => Ok(response),
		UNAUTHORIZED => Err(Error::Unauthorized { status }),
		400 | 422 => {
			let (message, fields) = parse_error_body(&response.body);
			let message = message
				.or_else(|| fields.values().flatten().next().cloned())
				.unwrap_or_else(|| "Invalid input".into());

			Err(Error::Validation { status, message, fields })
		},
		500..=599 => Err(Error::Server {
			status,
			message: parse_error_body(&response.body).0.unwrap_or_else(|| status_reason(status)),
			retry_after: response.retry_after,
		}),
		_ => Err(Error::Rejected {
			status,
			message: parse_error_body(&response.body).0.unwrap_or_else(|| status_reason(status)),
		}),
	}
}

/// Extracts a top-level message and field errors from a JSON error body.
///
/// Accepts flat bodies (`{"email": ["taken"], "detail": "..."}`) as well as bodies that
/// nest field errors under `errors`. Non-JSON bodies become the message when short.
fn parse_error_body(body: &[u8]) -> (Option<String>, FieldErrors) {
	let mut fields = FieldErrors::new();
	let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(body) else {
		let text = String::from_utf8_lossy(body).trim().to_owned();
		let message = (!text.is_empty() && text.len() <= 200).then_some(text);

		return (message, fields);
	};
	let mut message = None;

	for (key, value) in map {
		match (key.as_str(), value) {
			("detail" | "message" | "error", Value::String(text)) if message.is_none() =>
				message = Some(text),
			("errors", Value::Object(nested)) =>
				for (field, value) in nested {
					push_messages(&mut fields, field, value);
				},
			(_, value) => push_messages(&mut fields, key.clone(), value),
		}
	}

	(message, fields)
}

fn push_messages(fields: &mut FieldErrors, field: String, value: Value) {
	let messages = match value {
		Value::Null => Vec::new(),
		Value::String(text) => vec![text],
		Value::Array(items) => items
			.into_iter()
			.filter_map(|item| match item {
				Value::Null => None,
				Value::String(text) => Some(text),
				other => Some(other.to_string()),
			})
			.collect(),
		other => vec![other.to_string()],
	};

	if !messages.is_empty() {
		fields.entry(field).or_default().extend(messages);
	}
}

fn status_reason(status: u16) -> String {
	let reason = match status {
		403 => "Forbidden",
		404 => "Not Found",
		405 => "Method Not Allowed",
		409 => "Conflict",
		429 => "Too Many Requests",
		500 => "Internal Server Error",
		502 => "Bad Gateway",
		503 => "Service Unavailable",
		504 => "Gateway Timeout",
		_ => return format!("HTTP {status}"),
	};

	reason.into()
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	#[test]
	fn success_passes_through() {
		let response = ApiResponse::json_body(201, &json!({ "id": 3 }));

		assert!(classify_response(response).is_ok());
	}

	#[test]
	fn validation_collects_flat_and_nested_field_errors() {
		let flat = ApiResponse::json_body(
			400,
			&json!({ "email": ["A user with that email already exists."], "password": "Too short." }),
		);

		match classify_response(flat) {
			Err(Error::Validation { status, message, fields }) => {
				assert_eq!(status, 400);
				assert_eq!(message, "A user with that email already exists.");
				assert_eq!(fields["password"], vec!["Too short.".to_string()]);
			},
			other => panic!("Unexpected classification: {other:?}."),
		}

		let nested = ApiResponse::json_body(
			422,
			&json!({ "message": "Invalid receipt", "errors": { "total": ["Must be positive."] } }),
		);

		match classify_response(nested) {
			Err(Error::Validation { message, fields, .. }) => {
				assert_eq!(message, "Invalid receipt");
				assert_eq!(fields["total"], vec!["Must be positive.".to_string()]);
				assert!(!fields.contains_key("message"));
			},
			other => panic!("Unexpected classification: {other:?}."),
		}
	}

	#[test]
	fn server_errors_keep_retry_after_and_fallback_reason() {
		let response = ApiResponse {
			status: 503,
			retry_after: Some(Duration::seconds(30)),
			body: b"<html>maintenance</html>".repeat(20),
		};

		match classify_response(response) {
			Err(Error::Server { status, message, retry_after }) => {
				assert_eq!(status, 503);
				assert_eq!(message, "Service Unavailable");
				assert_eq!(retry_after, Some(Duration::seconds(30)));
			},
			other => panic!("Unexpected classification: {other:?}."),
		}
	}

	#[test]
	fn other_client_errors_are_rejections() {
		let response = ApiResponse::json_body(404, &json!({ "detail": "Receipt not found." }));

		assert!(matches!(
			classify_response(response),
			Err(Error::Rejected { status: 404, message }) if message == "Receipt not found."
		));
		assert!(matches!(
			classify_response(ApiResponse { status: UNAUTHORIZED, ..Default::default() }),
			Err(Error::Unauthorized { status: UNAUTHORIZED })
		));
	}
}
