//! Credential, claim, and user-profile models for the authenticated session.

pub mod claims;
pub mod credentials;
pub mod profile;
pub mod secret;

pub use claims::*;
pub use credentials::*;
pub use profile::*;
pub use secret::*;
