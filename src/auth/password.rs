use argon2::{
    password_hash::{
        rand_core::OsRng, Error as HashError, PasswordHash, PasswordHasher, PasswordVerifier,
        SaltString,
    },
    Algorithm, Argon2, Params,
};
use lazy_static::lazy_static;
use tracing::{error, warn};

use crate::error::AuthError;

/// Hash a plaintext password into a PHC string (Argon2id, random salt).
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

/// Check `plain` against a stored PHC hash.
///
/// `Ok(false)` means the password is wrong. A hash that cannot be parsed or
/// that names an algorithm we do not support is a `HashMismatch`.
pub fn verify_password(stored_hash: &str, plain: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| {
        error!(error = %e, "stored password hash is malformed");
        AuthError::HashMismatch(e.to_string())
    })?;

    match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(HashError::Password) => Ok(false),
        Err(e) => {
            error!(error = %e, algorithm = %parsed.algorithm, "password hash not verifiable");
            Err(AuthError::HashMismatch(e.to_string()))
        }
    }
}

lazy_static! {
    // Verified against when the email is unknown, so that path costs the same
    // as a wrong password.
    static ref DECOY_HASH: Option<String> = hash_password("decoy-password-never-matches")
        .map_err(|e| warn!(error = %e, "could not build decoy password hash"))
        .ok();
}

/// Run a full verification whose outcome is discarded.
pub fn verify_decoy(plain: &str) {
    if let Some(hash) = DECOY_HASH.as_deref() {
        let _ = verify_password(hash, plain);
    }
}

/// True when a stored hash was produced with other parameters than the
/// current default hasher, so it should be replaced after the next login.
pub fn needs_rehash(stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    if parsed.algorithm != Algorithm::Argon2id.ident() {
        return true;
    }
    match Params::try_from(&parsed) {
        Ok(params) => {
            let current = Params::default();
            (params.m_cost(), params.t_cost(), params.p_cost())
                != (current.m_cost(), current.t_cost(), current.p_cost())
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(verify_password(&hash, password).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hash = hash_password("correct-horse-battery-staple").expect("hashing should succeed");
        assert!(!verify_password(&hash, "wrong-password").expect("verify should not error"));
    }

    #[test]
    fn salts_differ_between_hashes() {
        let a = hash_password("same").unwrap();
        let b = hash_password("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_hash_is_a_mismatch_not_a_wrong_password() {
        let err = verify_password("not-a-valid-hash", "anything").unwrap_err();
        assert!(matches!(err, AuthError::HashMismatch(_)));
    }

    #[test]
    fn foreign_algorithm_is_a_mismatch() {
        // pbkdf2 PHC string; argon2 cannot verify it
        let foreign = "$pbkdf2-sha256$i=1000$c2FsdHNhbHQ$YWJjZGVmZ2hpamtsbW5vcHFyc3R1dnd4eXo";
        let err = verify_password(foreign, "anything").unwrap_err();
        assert!(matches!(err, AuthError::HashMismatch(_)));
    }

    #[test]
    fn decoy_hash_is_built() {
        assert!(DECOY_HASH.is_some());
        verify_decoy("anything");
    }

    #[test]
    fn fresh_hash_does_not_need_rehash() {
        let hash = hash_password("fresh").unwrap();
        assert!(!needs_rehash(&hash));
    }

    #[test]
    fn weaker_params_need_rehash() {
        let params = Params::new(8 * 1024, 1, 1, None).unwrap();
        let weak = Argon2::new(Algorithm::Argon2id, argon2::Version::V0x13, params);
        let salt = SaltString::generate(&mut OsRng);
        let hash = weak.hash_password(b"old", &salt).unwrap().to_string();
        assert!(needs_rehash(&hash));
        assert!(verify_password(&hash, "old").unwrap());
    }

    #[test]
    fn unparseable_hash_is_left_alone() {
        assert!(!needs_rehash("not-a-valid-hash"));
    }
}
