//! Bearer credential held by the gateway.

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

/// Access token currently in use plus the instant it was issued.
///
/// The server supplies no expiry in this model, so freshness is inferred purely from the
/// elapsed time since [`issued_at`](Credential::issued_at). Every refresh produces a new
/// credential with a strictly larger [`generation`](Credential::generation), which lets
/// concurrent callers tell whether a rotation already happened after they observed a 401.
#[derive(Clone)]
pub struct Credential {
	/// Access token secret; callers must avoid logging it.
	pub access_token: AccessToken,
	/// Instant the gateway received the token.
	pub issued_at: OffsetDateTime,
	/// Rotation counter, starting at 1 for the first issued token.
	pub generation: u64,
}
impl Credential {
	/// Creates a credential issued at `issued_at`.
	pub fn new(access_token: AccessToken, issued_at: OffsetDateTime, generation: u64) -> Self {
		Self { access_token, issued_at, generation }
	}

	/// Elapsed time since issuance, measured at `now`.
	pub fn age_at(&self, now: OffsetDateTime) -> Duration {
		now - self.issued_at
	}

	/// Returns `true` once `threshold` or more has elapsed since issuance.
	pub fn is_stale_at(&self, now: OffsetDateTime, threshold: Duration) -> bool {
		self.age_at(now) >= threshold
	}

	/// Formats the `Authorization` header value, e.g. `Zoho-oauthtoken <token>`.
	pub fn authorization_value(&self, scheme: &str) -> String {
		format!("{scheme} {}", self.access_token.secret())
	}

	/// Short, non-reversible token digest that is safe to log.
	pub fn fingerprint(&self) -> String {
		let digest = Sha256::digest(self.access_token.secret().as_bytes());
		let mut encoded = URL_SAFE_NO_PAD.encode(digest);

		encoded.truncate(12);

		encoded
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("fingerprint", &self.fingerprint())
			.field("issued_at", &self.issued_at)
			.field("generation", &self.generation)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	fn credential(token: &str) -> Credential {
		Credential::new(AccessToken::new(token.into()), datetime!(2025-01-01 12:00 UTC), 1)
	}

	#[test]
	fn staleness_starts_at_the_threshold() {
		let credential = credential("token");
		let threshold = Duration::minutes(50);

		assert!(!credential.is_stale_at(datetime!(2025-01-01 12:49:59.999 UTC), threshold));
		assert!(credential.is_stale_at(datetime!(2025-01-01 12:50 UTC), threshold));
		assert!(credential.is_stale_at(datetime!(2025-01-01 12:51 UTC), threshold));
	}

	#[test]
	fn debug_output_redacts_the_token() {
		let credential = credential("super-secret-token");
		let rendered = format!("{credential:?}");

		assert!(!rendered.contains("super-secret-token"));
		assert!(rendered.contains(&credential.fingerprint()));
		assert_eq!(credential.fingerprint().len(), 12);
	}

	#[test]
	fn authorization_value_uses_scheme() {
		assert_eq!(credential("abc").authorization_value("Zoho-oauthtoken"), "Zoho-oauthtoken abc");
	}
}
