//! Signing keys for JWTs (Ed25519) and tickets (HMAC secret).
//!
//! Responsibility:
//! - Load keys from the key directory, or generate and persist them on first start
//!
//! Notes:
//! - `jwt_private.pem` is PKCS#8 PEM; the public key is derived from it on every load.
//! - `ticket.key` holds the hex-encoded HMAC secret.
//! - Key material is never printed via Debug.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use ed25519_dalek::SigningKey;
use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey};
use tracing::info;

use crate::error::AppError;

pub const JWT_PRIVATE_KEY_FILE: &str = "jwt_private.pem";
pub const TICKET_KEY_FILE: &str = "ticket.key";
const TICKET_KEY_LENGTH: usize = 32;

#[derive(Clone)]
pub struct KeyMaterial {
    pub jwt_private_pem: String,
    pub jwt_public_pem: String,
    pub ticket_key: Vec<u8>,
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial").finish_non_exhaustive()
    }
}

impl KeyMaterial {
    /// Fresh in-memory keys.
    pub fn generate() -> Result<Self, AppError> {
        let signing_key = generate_signing_key()?;
        Ok(Self {
            jwt_private_pem: private_pem(&signing_key)?,
            jwt_public_pem: public_pem(&signing_key)?,
            ticket_key: random_bytes::<TICKET_KEY_LENGTH>()?.to_vec(),
        })
    }

    pub fn load_or_generate(dir: &Path) -> Result<Self, AppError> {
        fs::create_dir_all(dir)?;

        let private_path = dir.join(JWT_PRIVATE_KEY_FILE);
        let signing_key = match fs::read_to_string(&private_path) {
            Ok(pem) => SigningKey::from_pkcs8_pem(&pem)
                .map_err(|e| AppError::KeyMaterial(format!("{}: {}", private_path.display(), e)))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let signing_key = generate_signing_key()?;
                fs::write(&private_path, private_pem(&signing_key)?)?;
                info!(path = %private_path.display(), "generated jwt signing key");
                signing_key
            }
            Err(e) => return Err(e.into()),
        };

        let ticket_path = dir.join(TICKET_KEY_FILE);
        let ticket_key = match fs::read_to_string(&ticket_path) {
            Ok(encoded) => hex::decode(encoded.trim())
                .map_err(|e| AppError::KeyMaterial(format!("{}: {}", ticket_path.display(), e)))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let key = random_bytes::<TICKET_KEY_LENGTH>()?.to_vec();
                fs::write(&ticket_path, hex::encode(&key))?;
                info!(path = %ticket_path.display(), "generated ticket signing key");
                key
            }
            Err(e) => return Err(e.into()),
        };
        if ticket_key.is_empty() {
            return Err(AppError::KeyMaterial(format!("{} is empty", ticket_path.display())));
        }

        Ok(Self {
            jwt_private_pem: private_pem(&signing_key)?,
            jwt_public_pem: public_pem(&signing_key)?,
            ticket_key,
        })
    }
}

fn random_bytes<const N: usize>() -> Result<[u8; N], AppError> {
    let mut bytes = [0u8; N];
    getrandom::fill(&mut bytes).map_err(|e| AppError::KeyMaterial(format!("getrandom failed: {}", e)))?;
    Ok(bytes)
}

fn generate_signing_key() -> Result<SigningKey, AppError> {
    Ok(SigningKey::from_bytes(&random_bytes::<32>()?))
}

fn private_pem(key: &SigningKey) -> Result<String, AppError> {
    key.to_pkcs8_pem(LineEnding::LF)
        .map(|pem| pem.as_str().to_owned())
        .map_err(|e| AppError::KeyMaterial(format!("encode private key: {}", e)))
}

fn public_pem(key: &SigningKey) -> Result<String, AppError> {
    key.verifying_key()
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| AppError::KeyMaterial(format!("encode public key: {}", e)))
}
