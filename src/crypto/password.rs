use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::PasswordError;

pub const PBKDF2_ITERATIONS: u32 = 600_000;
pub const SALT_LENGTH: usize = 16;
pub const HASH_LENGTH: usize = 32;

const SCHEME: &str = "pbkdf2-sha256";

/// Hash a password as `pbkdf2-sha256$<iterations>$<salt b64>$<hash b64>`.
pub fn hash_password_with(password: &str, iterations: u32) -> String {
    let salt = generate_salt();
    let hash = derive(password, &salt, iterations);
    format!(
        "{SCHEME}${iterations}${}${}",
        STANDARD.encode(salt),
        STANDARD.encode(hash)
    )
}

/// Check a password against a stored hash string in constant time.
///
/// The iteration count is read from the stored string, so hashes written
/// with an older count keep verifying.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, PasswordError> {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(iterations), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return Err(PasswordError::MalformedHash);
    };

    if scheme != SCHEME {
        return Err(PasswordError::UnsupportedScheme(scheme.to_string()));
    }
    let iterations: u32 = iterations
        .parse()
        .map_err(|_| PasswordError::MalformedHash)?;
    if iterations == 0 {
        return Err(PasswordError::MalformedHash);
    }
    let salt = STANDARD
        .decode(salt)
        .map_err(|_| PasswordError::MalformedHash)?;
    let expected = STANDARD
        .decode(expected)
        .map_err(|_| PasswordError::MalformedHash)?;
    if expected.len() != HASH_LENGTH {
        return Err(PasswordError::MalformedHash);
    }

    let actual = derive(password, &salt, iterations);
    Ok(actual.ct_eq(expected.as_slice()).unwrap_u8() == 1)
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; HASH_LENGTH] {
    let mut out = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    out
}

/// Generate a cryptographically random salt
pub fn generate_salt() -> [u8; SALT_LENGTH] {
    use rand::RngCore;
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}
