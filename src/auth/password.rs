use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

pub const MIN_PASSWORD_LEN: usize = 8;

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Checks the password rules in order and returns the first one that fails.
pub fn check_strength(plain: &str) -> Result<(), &'static str> {
    if plain.chars().count() < MIN_PASSWORD_LEN {
        return Err("Password must be at least 8 characters long");
    }
    if !plain.chars().any(|c| c.is_ascii_uppercase()) {
        return Err("Password must contain an uppercase letter (A-Z)");
    }
    if !plain.chars().any(|c| c.is_ascii_lowercase()) {
        return Err("Password must contain a lowercase letter (a-z)");
    }
    if !plain.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain a digit");
    }
    if !plain.chars().any(|c| !c.is_ascii_alphanumeric()) {
        return Err("Password must contain a symbol such as @ or !");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hash = hash_password("Abc123!@").expect("hashing should succeed");
        assert!(!verify_password("Abc123!#", &hash).expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = verify_password("anything", "not-a-valid-hash").unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn strength_accepts_mixed_password() {
        assert_eq!(check_strength("Abc123!@"), Ok(()));
    }

    #[test]
    fn strength_rejects_each_missing_class() {
        assert!(check_strength("abc12345").is_err());
        assert_eq!(
            check_strength("Ab1!"),
            Err("Password must be at least 8 characters long")
        );
        assert_eq!(
            check_strength("abc123!@"),
            Err("Password must contain an uppercase letter (A-Z)")
        );
        assert_eq!(
            check_strength("ABC123!@"),
            Err("Password must contain a lowercase letter (a-z)")
        );
        assert_eq!(check_strength("Abcdef!@"), Err("Password must contain a digit"));
        assert_eq!(
            check_strength("Abcd1234"),
            Err("Password must contain a symbol such as @ or !")
        );
    }

    #[test]
    fn non_ascii_letters_count_as_symbols_only() {
        // Letters outside ASCII satisfy neither case rule.
        assert!(check_strength("ÄÖÜäöü12").is_err());
        assert_eq!(check_strength("Abc1234é"), Ok(()));
    }
}
