// src/keystore.rs

//! Key-file save and load.

use crate::errors::{Result, WalletError};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use weft_crypto::KeyPair;
use zeroize::Zeroizing;

/// Writes a keypair to `path` as deflate-compressed PKCS#8 DER
pub fn save_key_file<P: AsRef<Path>>(keypair: &KeyPair, path: P) -> Result<()> {
    let der = keypair.to_pkcs8_der()?;

    let file = File::create(path)?;
    let mut encoder = DeflateEncoder::new(file, Compression::default());
    encoder.write_all(&der)?;
    encoder
        .finish()
        .map_err(|e| WalletError::CompressionError(e.to_string()))?;
    Ok(())
}

/// Reads a keypair from `path` and validates it
pub fn load_key_file<P: AsRef<Path>>(path: P) -> Result<KeyPair> {
    let file = File::open(path)?;
    let mut decoder = DeflateDecoder::new(file);

    let mut der = Zeroizing::new(Vec::new());
    decoder
        .read_to_end(&mut der)
        .map_err(|e| WalletError::CompressionError(e.to_string()))?;

    let keypair = KeyPair::from_pkcs8_der(&der)?;
    keypair.validate()?;
    Ok(keypair)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("account.key");

        let keypair = KeyPair::generate();
        save_key_file(&keypair, &path).unwrap();

        let loaded = load_key_file(&path).unwrap();
        assert_eq!(loaded.public_key(), keypair.public_key());
    }

    #[test]
    fn test_key_file_is_compressed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("account.key");

        let keypair = KeyPair::generate();
        save_key_file(&keypair, &path).unwrap();

        let raw = std::fs::read(&path).unwrap();
        let der = keypair.to_pkcs8_der().unwrap();
        assert_ne!(raw.as_slice(), der.as_slice());
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = load_key_file("/nonexistent/account.key");
        assert!(matches!(result, Err(WalletError::IoError(_))));
    }

    #[test]
    fn test_load_garbage_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("garbage.key");
        std::fs::write(&path, b"definitely not a key file").unwrap();

        assert!(load_key_file(&path).is_err());
    }
}
