use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use std::sync::OnceLock;
use subtle::ConstantTimeEq;

const HASH_PREFIX: &str = "pbkdf2_sha256";
const DEFAULT_ITERATIONS: u32 = 200_000;
const SALT_BYTES: usize = 16;
const DERIVED_BYTES: usize = 32;

pub const MIN_PASSWORD_LEN: usize = 8;

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    hash_password_with_iterations(password, DEFAULT_ITERATIONS)
}

pub fn hash_password_with_iterations(password: &str, iterations: u32) -> anyhow::Result<String> {
    if password.is_empty() {
        anyhow::bail!("Password cannot be blank");
    }
    if iterations == 0 {
        anyhow::bail!("iterations must be positive");
    }

    let mut salt = [0u8; SALT_BYTES];
    OsRng.fill_bytes(&mut salt);
    let derived = derive(password.as_bytes(), &salt, iterations);

    Ok(format!(
        "{}${}${}${}",
        HASH_PREFIX,
        iterations,
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(derived)
    ))
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    if password.is_empty() {
        return false;
    }

    let mut parts = password_hash.splitn(4, '$');
    let (Some(prefix), Some(iterations_text), Some(salt_b64), Some(hash_b64)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    if prefix != HASH_PREFIX {
        return false;
    }
    let Ok(iterations) = iterations_text.parse::<u32>() else {
        return false;
    };
    if iterations == 0 {
        return false;
    }
    let Ok(salt) = STANDARD_NO_PAD.decode(salt_b64) else {
        return false;
    };
    let Ok(expected) = STANDARD_NO_PAD.decode(hash_b64) else {
        return false;
    };

    let derived = derive(password.as_bytes(), &salt, iterations);
    derived.ct_eq(expected.as_slice()).into()
}

/// Burns the same work as a real check so unknown accounts answer as slowly as
/// wrong passwords.
pub fn verify_against_dummy(password: &str) {
    static DUMMY: OnceLock<String> = OnceLock::new();
    let hash = DUMMY.get_or_init(|| {
        hash_password("dummy-password-for-timing").unwrap_or_else(|_| String::new())
    });
    let _ = verify_password(password, hash);
}

fn derive(password: &[u8], salt: &[u8], iterations: u32) -> [u8; DERIVED_BYTES] {
    let mut out = [0u8; DERIVED_BYTES];
    pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password_with_iterations("password123", 1_000).unwrap();
        assert!(hash.starts_with("pbkdf2_sha256$1000$"));
        assert!(verify_password("password123", &hash));
        assert!(!verify_password("password124", &hash));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let a = hash_password_with_iterations("password123", 1_000).unwrap();
        let b = hash_password_with_iterations("password123", 1_000).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn whitespace_is_significant() {
        let hash = hash_password_with_iterations(" spaced out ", 1_000).unwrap();
        assert!(verify_password(" spaced out ", &hash));
        assert!(!verify_password("spaced out", &hash));
    }

    #[test]
    fn malformed_hashes_never_verify() {
        assert!(!verify_password("password123", ""));
        assert!(!verify_password("password123", "bcrypt$10$abc$def"));
        assert!(!verify_password("password123", "pbkdf2_sha256$zero$abc$def"));
        assert!(!verify_password("password123", "pbkdf2_sha256$0$abc$def"));
        assert!(!verify_password("password123", "pbkdf2_sha256$1000$!!$def"));
    }

    #[test]
    fn blank_password_is_rejected() {
        assert!(hash_password_with_iterations("", 1_000).is_err());
    }
}
