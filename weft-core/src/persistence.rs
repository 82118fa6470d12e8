// src/persistence.rs

//! Tangle save/load.
//!
//! The persisted format is the magic bytes, a version byte, a LEB128
//! varint transaction count, then every transaction in topological order
//! using the same bincode encoding as the wire. Loading installs the first
//! transaction as the genesis, replays the rest with weight updates
//! disabled, and finishes with one full weight pass from the tips upward.

use crate::errors::{Result, TangleError};
use crate::tangle::{AddOptions, Tangle};
use crate::transaction::Transaction;
use std::io::{Read, Write};

/// Leading bytes of a persisted tangle
pub const TANGLE_MAGIC: &[u8; 4] = b"WEFT";

/// Current persisted-format version
pub const TANGLE_VERSION: u8 = 1;

/// Writes `value` as a LEB128 unsigned varint
pub fn write_uvarint<W: Write>(sink: &mut W, mut value: u64) -> Result<()> {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        sink.write_all(&[byte])?;
        if value == 0 {
            return Ok(());
        }
    }
}

/// Reads a LEB128 unsigned varint
pub fn read_uvarint<R: Read>(source: &mut R) -> Result<u64> {
    let mut value: u64 = 0;
    let mut shift = 0u32;
    loop {
        let mut byte = [0u8; 1];
        source.read_exact(&mut byte)?;
        if shift >= 64 {
            return Err(TangleError::Decode("Varint overflows u64".to_string()));
        }
        value |= u64::from(byte[0] & 0x7f) << shift;
        if byte[0] & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
    }
}

impl Tangle {
    /// Serializes the whole graph to a byte sink
    pub fn save_tangle<W: Write>(&self, sink: &mut W) -> Result<()> {
        sink.write_all(TANGLE_MAGIC)?;
        sink.write_all(&[TANGLE_VERSION])?;

        let nodes = self.list_transactions()?;
        write_uvarint(sink, nodes.len() as u64)?;
        for node in &nodes {
            bincode::serialize_into(&mut *sink, node.transaction())
                .map_err(|e| TangleError::Decode(format!("Serialization failed: {}", e)))?;
        }
        Ok(())
    }

    /// Replaces the local graph with one read from a byte source
    ///
    /// `len` bounds how many bytes of `source` belong to the tangle.
    pub fn load_tangle<R: Read>(&self, source: &mut R, len: u64) -> Result<()> {
        let mut source = source.take(len);

        let mut magic = [0u8; 4];
        source.read_exact(&mut magic)?;
        if &magic != TANGLE_MAGIC {
            return Err(TangleError::Decode(format!(
                "Bad magic bytes: {:?}",
                magic
            )));
        }

        let mut version = [0u8; 1];
        source.read_exact(&mut version)?;
        if version[0] != TANGLE_VERSION {
            return Err(TangleError::Decode(format!(
                "Unsupported tangle version {}",
                version[0]
            )));
        }

        let count = read_uvarint(&mut source)?;
        for i in 0..count {
            let tx: Transaction = bincode::deserialize_from(&mut source)
                .map_err(|e| TangleError::Decode(format!("Deserialization failed: {}", e)))?;
            if i == 0 {
                self.set_genesis(tx)?;
            } else {
                self.add_with(
                    tx,
                    AddOptions {
                        check_balance: true,
                        update_weights: false,
                    },
                )?;
            }
        }

        self.update_weights()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Output;
    use crate::transaction_builder::{MineControl, TransactionBuilder};
    use std::io::Cursor;
    use weft_crypto::KeyPair;

    #[test]
    fn test_uvarint_round_trip() {
        for value in [0u64, 1, 127, 128, 300, 16_384, u64::MAX] {
            let mut buf = Vec::new();
            write_uvarint(&mut buf, value).unwrap();
            let decoded = read_uvarint(&mut Cursor::new(&buf)).unwrap();
            assert_eq!(decoded, value);
        }
    }

    #[test]
    fn test_uvarint_compactness() {
        let mut buf = Vec::new();
        write_uvarint(&mut buf, 5).unwrap();
        assert_eq!(buf, vec![5]);

        buf.clear();
        write_uvarint(&mut buf, 300).unwrap();
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_save_load_round_trip() {
        let alice = KeyPair::from_seed(&[11u8; 32]);
        let bob = KeyPair::from_seed(&[12u8; 32]);

        let tangle = Tangle::new(Transaction::genesis(vec![Output {
            account: alice.public_key().clone(),
            amount: 10_000.0,
        }]))
        .unwrap();

        let mut parent = tangle.genesis_hash().unwrap();
        for _ in 0..3 {
            let tx = TransactionBuilder::new()
                .parent(parent)
                .spend(&alice, 100.0)
                .pay(bob.public_key().clone(), 100.0)
                .difficulty(1)
                .build_and_mine(&MineControl::new())
                .unwrap();
            parent = tangle.add(tx).unwrap();
        }

        let mut buf = Vec::new();
        tangle.save_tangle(&mut buf).unwrap();

        let other = Tangle::new(Transaction::genesis(vec![])).unwrap();
        other
            .load_tangle(&mut Cursor::new(&buf), buf.len() as u64)
            .unwrap();

        assert_eq!(other.len().unwrap(), tangle.len().unwrap());
        assert_eq!(other.genesis_hash().unwrap(), tangle.genesis_hash().unwrap());
        assert_eq!(other.tips().unwrap(), tangle.tips().unwrap());
        assert_eq!(
            other.query_balance(bob.public_key(), 0.0).unwrap(),
            300.0
        );

        // Children ordering is deterministic with respect to insertion order
        let originals = tangle.list_transactions().unwrap();
        let loaded = other.list_transactions().unwrap();
        for (a, b) in originals.iter().zip(&loaded) {
            assert_eq!(a.transaction(), b.transaction());
            assert_eq!(a.children().unwrap(), b.children().unwrap());
        }
    }

    #[test]
    fn test_load_rejects_bad_magic() {
        let tangle = Tangle::new(Transaction::genesis(vec![])).unwrap();
        let mut buf = b"NOPE".to_vec();
        buf.push(TANGLE_VERSION);

        match tangle.load_tangle(&mut Cursor::new(&buf), buf.len() as u64) {
            Err(TangleError::Decode(_)) => {}
            other => panic!("expected Decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_rejects_bad_version() {
        let tangle = Tangle::new(Transaction::genesis(vec![])).unwrap();
        let mut buf = TANGLE_MAGIC.to_vec();
        buf.push(99);
        write_uvarint(&mut buf, 0).unwrap();

        match tangle.load_tangle(&mut Cursor::new(&buf), buf.len() as u64) {
            Err(TangleError::Decode(_)) => {}
            other => panic!("expected Decode error, got {:?}", other),
        }
    }
}
