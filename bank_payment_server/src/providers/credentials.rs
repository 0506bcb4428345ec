use bpg_common::Secret;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// Compares a presented credential against the configured secret in constant time.
///
/// Both values are run through HMAC-SHA256 keyed with the secret and the tags are compared with
/// [`Mac::verify_slice`], so neither the comparison time nor the tag length depends on where the two values first
/// differ, or on the length of the presented value.
pub fn verify_credential(presented: Option<&str>, secret: &Secret<String>) -> Result<(), AuthError> {
    if !secret.is_configured() {
        return Err(AuthError::NotConfigured);
    }
    let presented = presented.map(str::trim).filter(|s| !s.is_empty()).ok_or(AuthError::MissingCredential)?;
    let key = secret.reveal().trim().as_bytes();
    let mut expected = HmacSha256::new_from_slice(key).map_err(|_| AuthError::InvalidCredential)?;
    expected.update(key);
    let expected = expected.finalize().into_bytes();
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| AuthError::InvalidCredential)?;
    mac.update(presented.as_bytes());
    mac.verify_slice(&expected).map_err(|_| AuthError::InvalidCredential)
}
