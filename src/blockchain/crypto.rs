use ed25519_dalek::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use log::info;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use std::fmt;
use std::fs;
use std::path::Path;

/// Errors that can occur during cryptographic operations
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Failed to encode private key: {0}")]
    KeyEncoding(String),

    #[error("Failed to read or write wallet file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decoding error: {0}")]
    Decoding(String),

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
}

/// An owner address: the hex encoding of a wallet's public key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Address(pub String);

impl Address {
    /// Creates a new address from a public key
    pub fn from_public_key(public_key: &VerifyingKey) -> Self {
        Address(hex::encode(public_key.as_bytes()))
    }

    /// Converts the address back to a public key
    pub fn to_public_key(&self) -> Result<VerifyingKey, CryptoError> {
        let bytes = hex::decode(&self.0).map_err(|e| CryptoError::Decoding(e.to_string()))?;

        let bytes: [u8; 32] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidPublicKey("Invalid public key length".to_string())
        })?;

        VerifyingKey::from_bytes(&bytes).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Address(s.to_string())
    }
}

/// The node's signing identity.
///
/// One wallet exists per node. It is loaded from (or created at) the credential
/// file once at startup and shared by handle afterwards.
#[derive(Debug, Clone)]
pub struct Wallet {
    signing_key: SigningKey,
    address: Address,
}

impl Wallet {
    /// Creates a new wallet with a random keypair
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self::from_signing_key(signing_key)
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = Address::from_public_key(&signing_key.verifying_key());
        Wallet {
            signing_key,
            address,
        }
    }

    /// Loads the private key from `path`, or generates one and persists it
    /// there if the file does not exist yet.
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self, CryptoError> {
        let path = path.as_ref();

        if path.exists() {
            let der = fs::read(path)?;
            let signing_key = SigningKey::from_pkcs8_der(&der)
                .map_err(|e| CryptoError::Decoding(e.to_string()))?;
            let wallet = Self::from_signing_key(signing_key);
            info!("Loaded wallet {} from {}", wallet.address, path.display());
            return Ok(wallet);
        }

        let wallet = Self::generate();
        let der = wallet
            .signing_key
            .to_pkcs8_der()
            .map_err(|e| CryptoError::KeyEncoding(e.to_string()))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, der.as_bytes())?;

        info!("Created wallet {} at {}", wallet.address, path.display());
        Ok(wallet)
    }

    /// Gets the wallet's address
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Signs a hex encoded payload (a transaction id).
    ///
    /// The signature is the hex encoding of its two 32-byte components, `R`
    /// followed by `s`.
    pub fn sign(&self, payload: &str) -> Result<String, CryptoError> {
        let payload = hex::decode(payload).map_err(|e| CryptoError::Decoding(e.to_string()))?;
        let signature = self.signing_key.sign(&payload);

        let mut bytes = Vec::with_capacity(64);
        bytes.extend_from_slice(signature.r_bytes());
        bytes.extend_from_slice(signature.s_bytes());
        Ok(hex::encode(bytes))
    }
}

fn split_halves(encoded: &str) -> Result<([u8; 32], [u8; 32]), CryptoError> {
    let bytes = hex::decode(encoded).map_err(|e| CryptoError::Decoding(e.to_string()))?;
    if bytes.len() != 64 {
        return Err(CryptoError::InvalidSignature(format!(
            "expected 64 bytes, got {}",
            bytes.len()
        )));
    }

    let (first, second) = bytes.split_at(32);
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(first);
    s.copy_from_slice(second);
    Ok((r, s))
}

/// Verifies `signature` over the hex `payload` against the public key encoded
/// in `address`. Malformed input of any kind verifies as `false`.
pub fn verify(signature: &str, payload: &str, address: &Address) -> bool {
    let Ok((r, s)) = split_halves(signature) else {
        return false;
    };
    let Ok(public_key) = address.to_public_key() else {
        return false;
    };
    let Ok(payload) = hex::decode(payload) else {
        return false;
    };

    let signature = Signature::from_components(r, s);
    public_key.verify(&payload, &signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";

    #[test]
    fn test_sign_and_verify() {
        let wallet = Wallet::generate();
        let signature = wallet.sign(PAYLOAD).unwrap();

        assert_eq!(signature.len(), 128);
        assert!(verify(&signature, PAYLOAD, wallet.address()));
    }

    #[test]
    fn test_verify_with_other_address_fails() {
        let wallet = Wallet::generate();
        let other = Wallet::generate();
        let signature = wallet.sign(PAYLOAD).unwrap();

        assert!(!verify(&signature, PAYLOAD, other.address()));
    }

    #[test]
    fn test_verify_rejects_malformed_input() {
        let wallet = Wallet::generate();
        let signature = wallet.sign(PAYLOAD).unwrap();

        assert!(!verify("zz", PAYLOAD, wallet.address()));
        assert!(!verify(&signature, PAYLOAD, &Address::from("bob")));
        assert!(!verify(&signature[..64], PAYLOAD, wallet.address()));
    }

    #[test]
    fn test_sign_rejects_non_hex_payload() {
        let wallet = Wallet::generate();
        assert!(wallet.sign("not hex").is_err());
    }

    #[test]
    fn test_load_or_create_persists_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coin.wallet");

        let created = Wallet::load_or_create(&path).unwrap();
        assert!(path.exists());

        let loaded = Wallet::load_or_create(&path).unwrap();
        assert_eq!(created.address(), loaded.address());

        let signature = created.sign(PAYLOAD).unwrap();
        assert!(verify(&signature, PAYLOAD, loaded.address()));
    }

    #[test]
    fn test_address_conversion() {
        let wallet = Wallet::generate();
        let public_key = wallet.address().to_public_key().unwrap();

        assert_eq!(Address::from_public_key(&public_key), *wallet.address());
    }
}
