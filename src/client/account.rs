//! Account flows: credential issuance, registration, logout, profile and password reset.

// self
use crate::{
	_prelude::*,
	auth::{CredentialPair, UserProfile},
	client::{
		ApiClient,
		request::{classify_response, encode_body},
	},
	http::{ApiTransport, Method},
	obs::{self, OpKind},
};

/// Payload for account registration.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationRequest {
	/// Account email address.
	pub email: String,
	/// Chosen password.
	pub password: String,
	/// Optional given name.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub first_name: Option<String>,
	/// Optional family name.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub last_name: Option<String>,
}
impl RegistrationRequest {
	/// Creates a registration payload without names.
	pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
		Self { email: email.into(), password: password.into(), first_name: None, last_name: None }
	}

	/// Sets the given and family names.
	pub fn with_name(mut self, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
		self.first_name = Some(first_name.into());
		self.last_name = Some(last_name.into());

		self
	}
}
impl Debug for RegistrationRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RegistrationRequest")
			.field("email", &self.email)
			.field("password", &"<redacted>")
			.field("first_name", &self.first_name)
			.field("last_name", &self.last_name)
			.finish()
	}
}

#[derive(Serialize)]
struct LoginRequest<'a> {
	email: &'a str,
	password: &'a str,
}

#[derive(Serialize)]
struct LogoutRequest<'a> {
	refresh: &'a str,
}

#[derive(Serialize)]
struct EmailRequest<'a> {
	email: &'a str,
}

#[derive(Serialize)]
struct VerifyEmailRequest<'a> {
	token: &'a str,
}

#[derive(Serialize)]
struct PasswordResetConfirmation<'a> {
	uid: &'a str,
	token: &'a str,
	new_password: &'a str,
}

/// Login/registration response body.
#[derive(Deserialize)]
struct IssuedCredentials {
	#[serde(alias = "access_token")]
	access: String,
	#[serde(alias = "refresh_token")]
	refresh: String,
	#[serde(default)]
	user: Option<UserProfile>,
}

impl<T> ApiClient<T>
where
	T: ApiTransport,
{
	/// Exchanges email and password for a credential pair and returns the user profile.
	///
	/// The pair is persisted before the session becomes `Authenticated`. On failure the
	/// session returns to the state it held before the call.
	pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile> {
		let body = LoginRequest { email, password };

		obs::observe(
			OpKind::Login,
			"login",
			self.authenticate(&self.config.endpoints.login, &body),
		)
		.await
	}

	/// Creates an account and signs in with the credentials the backend issues.
	///
	/// Rejected payloads (duplicate email, weak password) surface as
	/// [`Error::Validation`] with per-field messages.
	pub async fn register(&self, registration: &RegistrationRequest) -> Result<UserProfile> {
		obs::observe(
			OpKind::Register,
			"register",
			self.authenticate(&self.config.endpoints.register, registration),
		)
		.await
	}

	/// Ends the session.
	///
	/// The backend is told to revoke the refresh credential on a best-effort basis; local
	/// credentials and the cached profile are dropped whatever the remote outcome.
	pub async fn logout(&self) -> Result<()> {
		obs::observe(OpKind::Logout, "logout", self.end_session()).await
	}

	/// Fetches the current user's profile and caches it in the session.
	pub async fn fetch_profile(&self) -> Result<UserProfile> {
		obs::observe(OpKind::Profile, "fetch_profile", self.load_profile()).await
	}

	/// Loads a previously stored credential pair; returns `true` if the session was restored.
	///
	/// No request is made. The profile can be loaded afterwards with
	/// [`fetch_profile`](Self::fetch_profile).
	pub async fn restore(&self) -> Result<bool> {
		let Some(credentials) = self.store.load().await? else {
			return Ok(false);
		};

		self.session.establish(credentials, None);

		Ok(true)
	}

	/// Submits an email verification token received out of band.
	pub async fn verify_email(&self, token: &str) -> Result<()> {
		obs::observe(OpKind::Verification, "verify_email", async move {
			let body = VerifyEmailRequest { token };

			self.send_unauthenticated(Method::Post, &self.config.endpoints.verify_email, Some(&body))
				.await?;
			self.session.mark_email_verified();
			self.verification_slot.forget();

			Ok::<_, Error>(())
		})
		.await
	}

	/// Asks the backend to send another verification email to the signed-in user.
	pub async fn resend_verification_email(&self) -> Result<()> {
		obs::observe(OpKind::Verification, "resend_verification_email", async move {
			if !self.session.is_authenticated() {
				return Err(Error::NotAuthenticated);
			}

			let url = self.config.url(&self.config.endpoints.resend_verification)?;

			self.send_authorized(Method::Post, url, None).await.map(|_| ())
		})
		.await
	}

	/// Requests a password reset email.
	pub async fn request_password_reset(&self, email: &str) -> Result<()> {
		obs::observe(OpKind::PasswordReset, "request_password_reset", async move {
			let body = EmailRequest { email };

			self.send_unauthenticated(Method::Post, &self.config.endpoints.password_reset, Some(&body))
				.await
				.map(|_| ())
		})
		.await
	}

	/// Completes a password reset with the `uid` and `token` from the reset link.
	pub async fn confirm_password_reset(
		&self,
		uid: &str,
		token: &str,
		new_password: &str,
	) -> Result<()> {
		obs::observe(OpKind::PasswordReset, "confirm_password_reset", async move {
			let body = PasswordResetConfirmation { uid, token, new_password };

			self.send_unauthenticated(
				Method::Post,
				&self.config.endpoints.password_reset_confirm,
				Some(&body),
			)
			.await
			.map(|_| ())
		})
		.await
	}

	async fn authenticate<B>(&self, path: &str, body: &B) -> Result<UserProfile>
	where
		B: ?Sized + Serialize,
	{
		let previous = self.session.begin_authentication();

		match self.issue(path, body).await {
			Ok((credentials, user)) => {
				self.session.establish(credentials, Some(user.clone()));
				self.verification_slot.forget();

				Ok(user)
			},
			Err(e) => {
				self.session.abort_authentication(previous);

				Err(e)
			},
		}
	}

	/// Obtains a pair plus profile and persists the pair.
	async fn issue<B>(&self, path: &str, body: &B) -> Result<(CredentialPair, UserProfile)>
	where
		B: ?Sized + Serialize,
	{
		let issued = self
			.send_unauthenticated(Method::Post, path, Some(body))
			.await?
			.json::<IssuedCredentials>()?;
		let credentials = CredentialPair::new(issued.access, issued.refresh);
		let user = match issued.user {
			Some(user) => user,
			None => {
				let url = self.config.url(&self.config.endpoints.profile)?;
				let response = self.send_once(Method::Get, url, None, Some(&credentials)).await?;

				classify_response(response)?.json()?
			},
		};

		self.store.save(credentials.clone()).await?;

		Ok((credentials, user))
	}

	async fn end_session(&self) -> Result<()> {
		if let Some(credentials) = self.session.credentials() {
			if let Err(e) = self.revoke_remote(&credentials).await {
				obs::warn(OpKind::Logout, "revoke_remote", &e);
			}
		}

		self.session.terminate();
		self.verification_slot.forget();
		self.store.clear().await?;

		Ok(())
	}

	async fn revoke_remote(&self, credentials: &CredentialPair) -> Result<()> {
		let url = self.config.url(&self.config.endpoints.logout)?;
		let body = encode_body(Some(&LogoutRequest { refresh: credentials.refresh.expose() }))?;

		classify_response(self.send_once(Method::Post, url, body, Some(credentials)).await?)?;

		Ok(())
	}

	async fn load_profile(&self) -> Result<UserProfile> {
		if !self.session.is_authenticated() {
			return Err(Error::NotAuthenticated);
		}

		let url = self.config.url(&self.config.endpoints.profile)?;
		let user = self.send_authorized(Method::Get, url, None).await?.json::<UserProfile>()?;

		self.session.set_user(user.clone());

		Ok(user)
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	#[test]
	fn registration_omits_missing_names_and_redacts_password() {
		let request = RegistrationRequest::new("ada@example.com", "hunter22");
		let encoded = serde_json::to_value(&request).expect("Registration should serialize.");

		assert_eq!(encoded, json!({ "email": "ada@example.com", "password": "hunter22" }));
		assert!(!format!("{request:?}").contains("hunter22"));

		let named = request.with_name("Ada", "Lovelace");
		let encoded = serde_json::to_value(&named).expect("Registration should serialize.");

		assert_eq!(encoded["first_name"], "Ada");
		assert_eq!(encoded["last_name"], "Lovelace");
	}

	#[test]
	fn issued_credentials_accept_embedded_user_and_aliases() {
		let issued: IssuedCredentials = serde_json::from_value(json!({
			"access_token": "a1",
			"refresh_token": "r1",
			"user": { "id": 7, "email": "ada@example.com" }
		}))
		.expect("Issued credentials should decode.");

		assert_eq!(issued.access, "a1");
		assert_eq!(issued.refresh, "r1");
		assert_eq!(issued.user.map(|user| user.id), Some("7".into()));
	}
}
