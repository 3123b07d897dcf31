// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Salted, peppered password hashing.
//!
//! Stored format: `v1$<salt hex>$<mac hex>` where
//! `mac = HMAC-SHA256(pepper, salt || password)`.

use hmac::{Hmac, Mac};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const SALT_LEN: usize = 16;
const VERSION: &str = "v1";
pub const MIN_PASSWORD_LEN: u64 = 6;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Random number generation failed")]
    Rng,

    #[error("Invalid HMAC key")]
    Key,

    #[error("Malformed password hash")]
    Malformed,
}

fn mac(pepper: &[u8], salt: &[u8], password: &str) -> Result<Vec<u8>, PasswordError> {
    let mut mac = HmacSha256::new_from_slice(pepper).map_err(|_| PasswordError::Key)?;
    mac.update(salt);
    mac.update(password.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Hash a password with a fresh random salt.
pub fn hash_password(pepper: &[u8], password: &str) -> Result<String, PasswordError> {
    let mut salt = [0u8; SALT_LEN];
    SystemRandom::new()
        .fill(&mut salt)
        .map_err(|_| PasswordError::Rng)?;
    let digest = mac(pepper, &salt, password)?;
    Ok(format!(
        "{}${}${}",
        VERSION,
        hex::encode(salt),
        hex::encode(digest)
    ))
}

/// Check a password against a stored hash in constant time.
pub fn verify_password(pepper: &[u8], password: &str, stored: &str) -> Result<bool, PasswordError> {
    let mut parts = stored.split('$');
    let (Some(VERSION), Some(salt_hex), Some(mac_hex), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(PasswordError::Malformed);
    };
    let salt = hex::decode(salt_hex).map_err(|_| PasswordError::Malformed)?;
    let expected = hex::decode(mac_hex).map_err(|_| PasswordError::Malformed)?;
    let actual = mac(pepper, &salt, password)?;
    Ok(actual.ct_eq(&expected).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEPPER: &[u8] = b"pepper_for_tests_32_bytes_long!!";

    #[test]
    fn test_hash_and_verify() {
        let stored = hash_password(PEPPER, "admin123").unwrap();
        assert!(stored.starts_with("v1$"));
        assert!(verify_password(PEPPER, "admin123", &stored).unwrap());
        assert!(!verify_password(PEPPER, "admin124", &stored).unwrap());
    }

    #[test]
    fn test_salt_makes_hashes_unique() {
        let a = hash_password(PEPPER, "same").unwrap();
        let b = hash_password(PEPPER, "same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_pepper_is_required_to_verify() {
        let stored = hash_password(PEPPER, "secret").unwrap();
        assert!(!verify_password(b"another pepper", "secret", &stored).unwrap());
    }

    #[test]
    fn test_malformed_hash() {
        assert!(matches!(
            verify_password(PEPPER, "x", "5e884898da28047151d0e56f8dc6292773603d0d"),
            Err(PasswordError::Malformed)
        ));
    }
}
