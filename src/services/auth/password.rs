/*
 * Responsibility
 * - Password hashing behind a small trait so stores / tests can swap the cost
 * - Default: Argon2id raw hash, hex hash + hex 16 byte random salt stored as user properties
 */
use argon2::{Algorithm, Argon2, Params, Version};
use thiserror::Error;

/// Argon2id memory cost in KiB.
pub const DEFAULT_MEMORY_KIB: u32 = 19 * 1024;
pub const DEFAULT_ITERATIONS: u32 = 2;
const KEY_LENGTH: usize = 64;
const SALT_LENGTH: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasswordError {
    #[error("failed to generate salt: {0}")]
    Random(String),

    #[error("invalid hashing parameters: {0}")]
    Parameters(String),

    #[error("password hashing failed: {0}")]
    Hash(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedPassword {
    pub hash: String,
    pub salt: String,
}

pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &[u8]) -> Result<HashedPassword, PasswordError>;

    /// `hash` and `salt` are the stored hex strings.
    fn verify(&self, password: &[u8], hash: &str, salt: &str) -> bool;
}

#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    pub fn new(memory_kib: u32, iterations: u32) -> Result<Self, PasswordError> {
        let params = Params::new(memory_kib, iterations, 1, Some(KEY_LENGTH))
            .map_err(|e| PasswordError::Parameters(e.to_string()))?;
        Ok(Self { params })
    }

    fn derive(&self, password: &[u8], salt: &[u8]) -> Result<[u8; KEY_LENGTH], PasswordError> {
        let mut key = [0u8; KEY_LENGTH];
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
            .hash_password_into(password, salt, &mut key)
            .map_err(|e| PasswordError::Hash(e.to_string()))?;
        Ok(key)
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &[u8]) -> Result<HashedPassword, PasswordError> {
        let mut salt = [0u8; SALT_LENGTH];
        getrandom::fill(&mut salt).map_err(|e| PasswordError::Random(e.to_string()))?;

        Ok(HashedPassword {
            hash: hex::encode(self.derive(password, &salt)?),
            salt: hex::encode(salt),
        })
    }

    fn verify(&self, password: &[u8], hash: &str, salt: &str) -> bool {
        let (Ok(expected), Ok(salt)) = (hex::decode(hash), hex::decode(salt)) else {
            return false;
        };
        let Ok(actual) = self.derive(password, &salt) else {
            return false;
        };

        expected.len() == actual.len()
            && expected
                .iter()
                .zip(actual.iter())
                .fold(0u8, |diff, (a, b)| diff | (a ^ b))
                == 0
    }
}
