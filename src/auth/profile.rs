//! Denormalized user profile returned by the backend after authentication.

// crates.io
use serde::{Deserializer, de::Error as DeError};
// self
use crate::_prelude::*;

/// Subscription plan attached to a user account.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
	/// No paid plan.
	#[default]
	Free,
	/// Entry-level paid plan.
	Basic,
	/// Full-featured individual plan.
	Premium,
	/// Multi-seat plan.
	Business,
	/// Plan label this client does not know about.
	#[serde(other)]
	Unknown,
}
impl SubscriptionTier {
	/// Returns a stable label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Free => "free",
			Self::Basic => "basic",
			Self::Premium => "premium",
			Self::Business => "business",
			Self::Unknown => "unknown",
		}
	}

	/// Returns `true` for any plan that is billed.
	pub const fn is_paid(self) -> bool {
		matches!(self, Self::Basic | Self::Premium | Self::Business)
	}
}
impl Display for SubscriptionTier {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// User record cached by the session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
	/// Backend user identifier (numeric ids are stringified).
	#[serde(deserialize_with = "id_from_string_or_number")]
	pub id: String,
	/// Login email address.
	pub email: String,
	/// Given name.
	#[serde(default)]
	pub first_name: Option<String>,
	/// Family name.
	#[serde(default)]
	pub last_name: Option<String>,
	/// Whether the email address has been verified.
	#[serde(default, alias = "is_verified", alias = "is_email_verified")]
	pub email_verified: bool,
	/// Current subscription plan.
	#[serde(default, alias = "subscription_tier", alias = "plan")]
	pub subscription: SubscriptionTier,
}
impl UserProfile {
	/// Name suitable for greetings, falling back to the email address.
	pub fn display_name(&self) -> String {
		match (self.first_name.as_deref(), self.last_name.as_deref()) {
			(Some(first), Some(last)) if !first.is_empty() && !last.is_empty() =>
				format!("{first} {last}"),
			(Some(first), _) if !first.is_empty() => first.to_owned(),
			_ => self.email.clone(),
		}
	}
}

fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
	D: Deserializer<'de>,
{
	match serde_json::Value::deserialize(deserializer)? {
		serde_json::Value::String(id) => Ok(id),
		serde_json::Value::Number(id) => Ok(id.to_string()),
		other => Err(D::Error::custom(format!("expected a string or number id, found {other}"))),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn profile_accepts_backend_aliases() {
		let profile: UserProfile = serde_json::from_str(
			r#"{"id":7,"email":"ada@example.com","first_name":"Ada","is_verified":true,"subscription_tier":"premium"}"#,
		)
		.expect("Profile should deserialize.");

		assert_eq!(profile.id, "7");
		assert!(profile.email_verified);
		assert_eq!(profile.subscription, SubscriptionTier::Premium);
		assert!(profile.subscription.is_paid());
		assert_eq!(profile.display_name(), "Ada");
	}

	#[test]
	fn unknown_plans_and_missing_fields_fall_back() {
		let profile: UserProfile = serde_json::from_str(
			r#"{"id":"6f1c","email":"bob@example.com","plan":"enterprise-trial"}"#,
		)
		.expect("Profile should deserialize.");

		assert_eq!(profile.subscription, SubscriptionTier::Unknown);
		assert!(!profile.email_verified);
		assert_eq!(profile.display_name(), "bob@example.com");
		assert!(serde_json::from_str::<UserProfile>(r#"{"id":true,"email":"x"}"#).is_err());
	}
}
