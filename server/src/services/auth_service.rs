// marketplace/src/services/auth_service.rs

//! Password hashing and signed bearer tokens.

use crate::errors::AppError;
use argon2::{
  password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
  Argon2,
};
use hmac::{Hmac, Mac};
use rand_core::OsRng;
use sha2::Sha256;
use tracing::{debug, error, instrument};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

pub const MIN_PASSWORD_LEN: usize = 8;

#[instrument(name = "auth_service::hash_password", skip(password), err(Display))]
pub fn hash_password(password: &str) -> Result<String, AppError> {
  if password.is_empty() {
    return Err(AppError::Validation("Password cannot be empty.".to_string()));
  }
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| {
      error!(error = %e, "Argon2 password hashing failed.");
      AppError::Internal(format!("Password hashing failed: {}", e))
    })
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash is unusable.
#[instrument(name = "auth_service::verify_password", skip_all, err(Display))]
pub fn verify_password(stored_hash: &str, provided_password: &str) -> Result<bool, AppError> {
  if provided_password.is_empty() {
    return Ok(false);
  }
  let parsed = PasswordHash::new(stored_hash).map_err(|e| {
    error!(error = %e, "Stored password hash could not be parsed.");
    AppError::Internal(format!("Invalid stored password hash: {}", e))
  })?;
  match Argon2::default().verify_password(provided_password.as_bytes(), &parsed) {
    Ok(()) => Ok(true),
    Err(argon2::password_hash::Error::Password) => {
      debug!("Password mismatch.");
      Ok(false)
    }
    Err(e) => Err(AppError::Internal(format!("Password verification failed: {}", e))),
  }
}

pub fn validate_new_password(password: &str) -> Result<(), AppError> {
  if password.chars().count() < MIN_PASSWORD_LEN {
    return Err(AppError::Validation(format!(
      "Password must be at least {} characters long.",
      MIN_PASSWORD_LEN
    )));
  }
  Ok(())
}

fn token_mac(secret: &str, payload: &str) -> Result<HmacSha256, AppError> {
  let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
    .map_err(|e| AppError::Config(format!("Invalid session secret: {}", e)))?;
  mac.update(payload.as_bytes());
  Ok(mac)
}

/// Issues `"{user_id}.{expires_at}.{hex hmac}"`.
pub fn issue_session_token(user_id: Uuid, secret: &str, ttl_secs: i64, now: i64) -> Result<String, AppError> {
  let expires_at = now
    .checked_add(ttl_secs)
    .ok_or_else(|| AppError::Config(format!("Session TTL of {}s overflows the expiry time.", ttl_secs)))?;
  let payload = format!("{}.{}", user_id, expires_at);
  let signature = hex::encode(token_mac(secret, &payload)?.finalize().into_bytes());
  Ok(format!("{}.{}", payload, signature))
}

/// Returns the user id carried by a valid, unexpired token.
pub fn validate_session_token(token: &str, secret: &str, now: i64) -> Result<Uuid, AppError> {
  let invalid = || AppError::Auth("Invalid or expired session token.".to_string());

  let mut parts = token.trim().splitn(3, '.');
  let (Some(user_part), Some(expiry_part), Some(signature_part)) = (parts.next(), parts.next(), parts.next()) else {
    return Err(invalid());
  };
  let signature = hex::decode(signature_part).map_err(|_| invalid())?;
  token_mac(secret, &format!("{}.{}", user_part, expiry_part))?
    .verify_slice(&signature)
    .map_err(|_| invalid())?;

  let expires_at: i64 = expiry_part.parse().map_err(|_| invalid())?;
  if expires_at <= now {
    return Err(invalid());
  }
  Uuid::parse_str(user_part).map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
  use super::*;

  const SECRET: &str = "test-session-secret";

  #[test]
  fn hashed_password_verifies_and_rejects_others() {
    let hash = hash_password("correct horse").unwrap();
    assert!(verify_password(&hash, "correct horse").unwrap());
    assert!(!verify_password(&hash, "battery staple").unwrap());
    assert!(!verify_password(&hash, "").unwrap());
  }

  #[test]
  fn short_passwords_are_rejected() {
    assert!(validate_new_password("short").is_err());
    assert!(validate_new_password("long enough").is_ok());
  }

  #[test]
  fn token_round_trips_until_expiry() {
    let user_id = Uuid::new_v4();
    let token = issue_session_token(user_id, SECRET, 60, 1_000).unwrap();
    assert_eq!(validate_session_token(&token, SECRET, 1_059).unwrap(), user_id);
    assert!(matches!(validate_session_token(&token, SECRET, 1_060), Err(AppError::Auth(_))));
  }

  #[test]
  fn tampered_or_foreign_tokens_are_rejected() {
    let token = issue_session_token(Uuid::new_v4(), SECRET, 60, 0).unwrap();
    let forged_user = format!("{}{}", Uuid::new_v4(), &token[36..]);
    assert!(validate_session_token(&forged_user, SECRET, 1).is_err());
    assert!(validate_session_token(&token, "other-secret", 1).is_err());
    assert!(validate_session_token("garbage", SECRET, 1).is_err());
  }

  #[test]
  fn expiry_overflow_is_an_error_not_a_panic() {
    let err = issue_session_token(Uuid::new_v4(), SECRET, i64::MAX, 1_000).unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
  }
}
