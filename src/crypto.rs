//! Utilities for cryptographic operations.

use argon2::{
    password_hash::{Salt, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use rand::{
    distr::{Distribution, Uniform},
    RngCore,
};
use ring::digest::{digest, Digest, SHA256};

/// Hashes the input using SHA-256.
///
/// Salt is necessary for secrets that may be short or guessable, so use [`hash_with_salt`] instead
/// for such inputs. Session tokens are the only secrets hashed this way: they're high entropy, and
/// the database must be able to look them up by hash.
pub(crate) fn hash_without_salt<T: AsRef<[u8]>>(bytes: &T) -> Digest {
    digest(&SHA256, bytes.as_ref())
}

/// Salts and hashes the input using Argon2, returning a hash in PHC string format.
///
/// Salt is necessary for secrets that may be short or guessable, but it has a drawback: a database
/// can't index salted hashes, since salting and hashing the same input produces a different output
/// each time. If the input can't be a short or guessable secret, use [`hash_without_salt`] instead.
pub(crate) fn hash_with_salt<T: AsRef<[u8]>>(bytes: &T) -> String {
    let mut salt = [0; Salt::RECOMMENDED_LENGTH];
    rand::rng().fill_bytes(&mut salt);

    let salt_string = SaltString::encode_b64(&salt).expect("salt should be valid");

    Argon2::default()
        .hash_password(bytes.as_ref(), &salt_string)
        .expect("password hashing should be infallible")
        .to_string()
}

/// Checks if the input bytes match the Argon2 hash specified in PHC string format (as outputted by
/// [`hash_with_salt`]).
///
/// If the hash string is invalid, returns `false`.
pub(crate) fn verify_hash<T: AsRef<[u8]>>(bytes: &T, hash_phc_format: &str) -> bool {
    let Ok(hash) = PasswordHash::new(hash_phc_format) else {
        return false;
    };

    Argon2::default()
        .verify_password(bytes.as_ref(), &hash)
        .is_ok()
}

/// The digits an email verification code is composed of.
const VERIFICATION_CODE_CHARS: [char; 10] = ['0', '1', '2', '3', '4', '5', '6', '7', '8', '9'];

/// The length of a string outputted by [`generate_verification_code`].
const VERIFICATION_CODE_LENGTH: usize = 6;

/// Generates a cryptographically secure pseudorandom numeric code that's short and easy to type,
/// uniformly distributed over its digit space.
pub(crate) fn generate_verification_code() -> String {
    Uniform::try_from(0..VERIFICATION_CODE_CHARS.len())
        .expect("`VERIFICATION_CODE_CHARS` should be nonempty and finite")
        .sample_iter(rand::rng())
        .take(VERIFICATION_CODE_LENGTH)
        .map(|i| VERIFICATION_CODE_CHARS[i])
        .collect()
}

/// The number of random bytes in a string outputted by [`generate_reset_token`].
const RESET_TOKEN_BYTES: usize = 36;

/// Generates a cryptographically secure pseudorandom password reset token as a lowercase hex
/// string.
pub(crate) fn generate_reset_token() -> String {
    let mut bytes = [0; RESET_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);

    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_code_is_six_digits() {
        for _ in 0..64 {
            let code = generate_verification_code();

            assert_eq!(code.len(), 6, "verification code should be 6 characters");
            assert!(
                code.chars().all(|char| char.is_ascii_digit()),
                "verification code should only contain digits"
            );
        }
    }

    #[test]
    fn reset_token_is_lowercase_hex() {
        let token = generate_reset_token();

        assert_eq!(token.len(), 72, "reset token should be 36 bytes of hex");
        assert!(
            token
                .chars()
                .all(|char| char.is_ascii_hexdigit() && !char.is_ascii_uppercase()),
            "reset token should be lowercase hex"
        );
    }

    #[test]
    fn salted_hash_verifies_only_the_original_input() {
        let hash = hash_with_salt(&"Abc12345!");

        assert!(
            verify_hash(&"Abc12345!", &hash),
            "original input should verify against its own hash"
        );
        assert!(
            !verify_hash(&"Abc12345?", &hash),
            "different input shouldn't verify"
        );
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(
            !verify_hash(&"anything", "not a PHC string"),
            "malformed digest should verify nothing"
        );
    }

    #[test]
    fn unsalted_hash_is_deterministic() {
        let token = generate_reset_token();

        assert_eq!(
            hash_without_salt(&token).as_ref(),
            hash_without_salt(&token).as_ref(),
            "SHA-256 of the same input should be identical"
        );
    }
}
