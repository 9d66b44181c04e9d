// Obscura — Password Hasher
//
// Account passwords are stored as Argon2id PHC strings
// (`$argon2id$v=19$m=…,t=…,p=…$salt$hash`). The parameters travel inside
// each hash, so raising the cost later does not invalidate existing accounts.
//
// Verification against an unknown address still runs a full Argon2
// computation (against a decoy hash) so "no such address" and "wrong
// password" cost the same.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;

use super::HashError;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Random salt length in bytes.
const SALT_LEN: usize = 16;

// Argon2id defaults: m=19 MiB, t=2, p=1. Hashing runs once per request, so
// memory is kept well below the 64 MiB used for one-off key derivation.
pub const DEFAULT_M_COST: u32 = 19_456;
pub const DEFAULT_T_COST: u32 = 2;
pub const DEFAULT_P_COST: u32 = 1;

/// Secret fed to the decoy hash. Its value is irrelevant; a decoy match is
/// always reported as a mismatch.
const DECOY_SECRET: &str = "obscura-decoy-secret";

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over password hashing, so stores can be tested with cheap
/// parameters and the algorithm can be swapped without touching SQL.
pub trait SecretHasher: Send + Sync {
    /// Hash a secret with a fresh random salt. Returns a PHC string.
    fn hash(&self, secret: &str) -> Result<String, HashError>;

    /// Verify `secret` against a stored PHC string.
    ///
    /// `stored = None` means the account does not exist; the hasher still
    /// performs a verification and returns `Ok(false)`.
    fn verify(&self, secret: &str, stored: Option<&str>) -> Result<bool, HashError>;
}

// ─── Argon2id Implementation ────────────────────────────────────────────────

pub struct Argon2Hasher {
    params: Params,
    decoy: String,
}

impl Argon2Hasher {
    /// Build a hasher with explicit cost parameters.
    /// `memory_kib` must be at least `8 * parallelism`.
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, HashError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| HashError::Params(e.to_string()))?;

        let mut hasher = Self {
            params,
            decoy: String::new(),
        };
        hasher.decoy = hasher.hash(DECOY_SECRET)?;
        Ok(hasher)
    }

    /// Hasher with the production defaults.
    pub fn with_defaults() -> Result<Self, HashError> {
        Self::new(DEFAULT_M_COST, DEFAULT_T_COST, DEFAULT_P_COST)
    }

    /// Minimum-cost hasher for unit tests.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self::new(8, 1, 1).expect("minimum Argon2 params are valid")
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl SecretHasher for Argon2Hasher {
    fn hash(&self, secret: &str) -> Result<String, HashError> {
        let mut salt_bytes = [0u8; SALT_LEN];
        rand::rng().fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| HashError::Hash(e.to_string()))?;

        let phc = self
            .argon2()
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| HashError::Hash(e.to_string()))?;

        Ok(phc.to_string())
    }

    fn verify(&self, secret: &str, stored: Option<&str>) -> Result<bool, HashError> {
        let phc = stored.unwrap_or(&self.decoy);
        let parsed = PasswordHash::new(phc).map_err(|e| HashError::Malformed(e.to_string()))?;

        match self.argon2().verify_password(secret.as_bytes(), &parsed) {
            Ok(()) => Ok(stored.is_some()),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(HashError::Hash(e.to_string())),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_argon2id_phc_string() {
        let hasher = Argon2Hasher::for_tests();
        let phc = hasher.hash("hunter2").unwrap();
        assert!(phc.starts_with("$argon2id$v=19$"), "unexpected PHC prefix: {}", phc);
        assert!(!phc.contains("hunter2"), "hash must not embed the plaintext");
    }

    #[test]
    fn test_same_secret_gets_distinct_salts() {
        let hasher = Argon2Hasher::for_tests();
        let a = hasher.hash("same").unwrap();
        let b = hasher.hash("same").unwrap();
        assert_ne!(a, b, "each hash must use a fresh salt");
    }

    #[test]
    fn test_verify_accepts_correct_secret() {
        let hasher = Argon2Hasher::for_tests();
        let phc = hasher.hash("correct horse").unwrap();
        assert!(hasher.verify("correct horse", Some(&phc)).unwrap());
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let hasher = Argon2Hasher::for_tests();
        let phc = hasher.hash("correct horse").unwrap();
        assert!(!hasher.verify("battery staple", Some(&phc)).unwrap());
    }

    #[test]
    fn test_verify_without_stored_hash_is_false() {
        let hasher = Argon2Hasher::for_tests();
        assert!(!hasher.verify(DECOY_SECRET, None).unwrap());
        assert!(!hasher.verify("anything", None).unwrap());
    }

    #[test]
    fn test_verify_uses_params_embedded_in_hash() {
        let cheap = Argon2Hasher::for_tests();
        let other = Argon2Hasher::new(16, 2, 1).unwrap();
        let phc = cheap.hash("pw").unwrap();
        assert!(other.verify("pw", Some(&phc)).unwrap());
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        let hasher = Argon2Hasher::for_tests();
        let err = hasher.verify("pw", Some("plaintext-password")).unwrap_err();
        assert!(matches!(err, HashError::Malformed(_)));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let result = Argon2Hasher::new(1, 1, 1);
        assert!(matches!(result, Err(HashError::Params(_))));
    }
}
