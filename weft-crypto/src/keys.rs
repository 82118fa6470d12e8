// src/keys.rs

//! ECDSA keypair generation, signing, and verification.
//!
//! Accounts on the tangle are secp256k1 public keys. Transaction inputs are
//! authorized by an ECDSA signature over the unsigned transaction encoding,
//! produced with the account's private half.

use crate::errors::{CryptoError, Result};
use crate::hash::{sha256, Hash};
use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use k256::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// A secp256k1 public key in SEC1-compressed form (33 bytes)
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(Vec<u8>);

impl PublicKey {
    /// Creates a public key from SEC1-compressed bytes, validating the point
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        VerifyingKey::from_sec1_bytes(&bytes)
            .map_err(|e| CryptoError::InvalidKey(format!("Invalid public key bytes: {}", e)))?;
        Ok(Self(bytes))
    }

    /// Raw SEC1-compressed bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Verifies an ECDSA signature over `data` under this key
    ///
    /// # Returns
    /// `Ok(true)` if the signature is valid, `Ok(false)` if it is malformed
    /// or does not verify, `Err` if the key itself cannot be decoded.
    pub fn verify(&self, data: &[u8], signature: &[u8]) -> Result<bool> {
        let verifying_key = VerifyingKey::from_sec1_bytes(&self.0)
            .map_err(|e| CryptoError::InvalidKey(format!("Invalid public key bytes: {}", e)))?;

        let signature = match Signature::from_slice(signature) {
            Ok(sig) => sig,
            Err(_) => return Ok(false),
        };

        Ok(verifying_key.verify(data, &signature).is_ok())
    }

    /// The account hash: hex SHA-256 of the compressed key bytes
    ///
    /// Used wherever an account needs a short printable identity, for
    /// example transfer targets on the command line.
    pub fn account_hash(&self) -> String {
        hex::encode(self.account_digest())
    }

    /// The raw SHA-256 digest of the compressed key bytes
    pub fn account_digest(&self) -> Hash {
        sha256(&self.0)
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", self.account_hash())
    }
}

/// An ECDSA keypair over secp256k1
pub struct KeyPair {
    signing_key: SigningKey,
    public_key: PublicKey,
}

impl KeyPair {
    /// Generates a new keypair using system randomness
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut rand::thread_rng());
        Self::from_signing_key(signing_key)
    }

    /// Generates a deterministic keypair from a 32-byte seed
    ///
    /// Useful for tests and reproducible fixtures.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let mut rng = StdRng::from_seed(*seed);
        let signing_key = SigningKey::random(&mut rng);
        Self::from_signing_key(signing_key)
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let public_key = PublicKey(signing_key.verifying_key().to_sec1_bytes().to_vec());
        Self {
            signing_key,
            public_key,
        }
    }

    /// The public half of the keypair
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Signs `data`, returning a 64-byte `r || s` signature
    pub fn sign(&self, data: &[u8]) -> Vec<u8> {
        let signature: Signature = self.signing_key.sign(data);
        signature.to_bytes().to_vec()
    }

    /// Verifies that the stored public half corresponds to the private half
    pub fn validate(&self) -> Result<()> {
        let derived = self.signing_key.verifying_key().to_sec1_bytes().to_vec();
        if derived != self.public_key.0 {
            return Err(CryptoError::InvalidKey(
                "Public key does not correspond to private key".to_string(),
            ));
        }
        Ok(())
    }

    /// Exports the keypair as PKCS#8 DER bytes
    ///
    /// The returned buffer is zeroized on drop.
    pub fn to_pkcs8_der(&self) -> Result<Zeroizing<Vec<u8>>> {
        let secret = k256::SecretKey::from_bytes(&self.signing_key.to_bytes())
            .map_err(|e| CryptoError::KeyEncoding(format!("Invalid secret scalar: {}", e)))?;
        let document = secret
            .to_pkcs8_der()
            .map_err(|e| CryptoError::KeyEncoding(format!("DER encoding failed: {}", e)))?;
        Ok(Zeroizing::new(document.as_bytes().to_vec()))
    }

    /// Imports a keypair from PKCS#8 DER bytes
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self> {
        let secret = k256::SecretKey::from_pkcs8_der(der)
            .map_err(|e| CryptoError::KeyEncoding(format!("DER decoding failed: {}", e)))?;
        Ok(Self::from_signing_key(secret.into()))
    }
}

impl Clone for KeyPair {
    fn clone(&self) -> Self {
        Self {
            signing_key: self.signing_key.clone(),
            public_key: self.public_key.clone(),
        }
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print private key material
        write!(f, "KeyPair({})", self.public_key.account_hash())
    }
}
