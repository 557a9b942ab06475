//! Storage encodings for fingerprints.
//!
//! - Bit vectors are stored as their packed bytes, MSB first, exactly
//!   `ceil(m / 8)` bytes wide. The bit length is part of the fingerprint space
//!   and is not repeated in the value.
//! - Bigram histograms are stored as bincode-encoded sparse cells.
//! - External digests are stored as their UTF-8 text.

use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};

use crate::bitshred::BitVector;
use crate::config::FingerprintError;
use crate::histogram::BigramHistogram;

pub fn encode_bits(bits: &BitVector) -> Vec<u8> {
    bits.as_bytes().to_vec()
}

pub fn decode_bits(m: usize, bytes: &[u8]) -> Result<BitVector, FingerprintError> {
    BitVector::from_bytes(m, bytes)
}

pub fn encode_bigrams(hist: &BigramHistogram) -> Result<Vec<u8>, FingerprintError> {
    encode_to_vec(hist.cells(), standard()).map_err(|e| FingerprintError::Encode(e.to_string()))
}

pub fn decode_bigrams(bytes: &[u8]) -> Result<BigramHistogram, FingerprintError> {
    let (cells, read): (Vec<(u16, u32)>, usize) =
        decode_from_slice(bytes, standard()).map_err(|e| FingerprintError::Decode(e.to_string()))?;
    if read != bytes.len() {
        return Err(FingerprintError::Decode(format!(
            "{} trailing bytes after bigram histogram",
            bytes.len() - read
        )));
    }
    BigramHistogram::from_cells(cells)
}

pub fn encode_digest(digest: &str) -> Vec<u8> {
    digest.as_bytes().to_vec()
}

pub fn decode_digest(bytes: &[u8]) -> Result<String, FingerprintError> {
    String::from_utf8(bytes.to_vec()).map_err(|e| FingerprintError::Decode(e.to_string()))
}
