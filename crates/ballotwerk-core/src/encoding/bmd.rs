// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Binary payload carried in the QR code of machine-printed summary ballots.
//
//   offset  size  field
//   0       2     magic "VX"
//   2       1     version (1)
//   3       10    election fingerprint prefix
//   13      2     precinct index (big-endian)
//   15      2     ballot style index (big-endian)
//   17      1     flags (bit 0: test mode)
//   18      n     vote bitmap, one bit per option of the ballot style in
//                 contest/option order, MSB first, zero padded

use thiserror::Error;

pub const MAGIC: [u8; 2] = *b"VX";
pub const VERSION: u8 = 1;
/// Fingerprint bytes carried in the payload (20 hex characters).
pub const FINGERPRINT_BYTES: usize = 10;

const HEADER_LEN: usize = 18;
const TEST_MODE_FLAG: u8 = 0b0000_0001;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BmdCodecError {
    #[error("payload is {0} bytes, shorter than the {HEADER_LEN}-byte header")]
    TooShort(usize),

    #[error("payload does not start with the ballot magic bytes")]
    BadMagic,

    #[error("unsupported payload version {0}")]
    UnsupportedVersion(u8),

    #[error("invalid election fingerprint: {0}")]
    InvalidFingerprint(String),

    #[error("unknown flag bits {0:#010b}")]
    UnknownFlags(u8),

    #[error("vote bitmap has {actual} bytes, ballot style needs {expected}")]
    SelectionCountMismatch { expected: usize, actual: usize },

    #[error("vote bitmap padding is not zero")]
    NonZeroPadding,
}

/// Decoded (or to-be-encoded) summary ballot contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BmdPayload {
    /// Lowercase hex, `2 * FINGERPRINT_BYTES` characters.
    pub fingerprint_prefix: String,
    pub precinct_index: u16,
    pub ballot_style_index: u16,
    pub is_test_mode: bool,
    /// One entry per option; after decoding, padded to a whole number of bytes.
    pub selections: Vec<bool>,
}

impl BmdPayload {
    pub fn encode(&self) -> Result<Vec<u8>, BmdCodecError> {
        let prefix = self
            .fingerprint_prefix
            .get(..FINGERPRINT_BYTES * 2)
            .ok_or_else(|| BmdCodecError::InvalidFingerprint(self.fingerprint_prefix.clone()))?;
        let fingerprint = hex::decode(prefix)
            .map_err(|err| BmdCodecError::InvalidFingerprint(err.to_string()))?;

        let mut bytes = Vec::with_capacity(HEADER_LEN + self.selections.len().div_ceil(8));
        bytes.extend_from_slice(&MAGIC);
        bytes.push(VERSION);
        bytes.extend_from_slice(&fingerprint);
        bytes.extend_from_slice(&self.precinct_index.to_be_bytes());
        bytes.extend_from_slice(&self.ballot_style_index.to_be_bytes());
        bytes.push(if self.is_test_mode { TEST_MODE_FLAG } else { 0 });
        for chunk in self.selections.chunks(8) {
            let byte = chunk
                .iter()
                .enumerate()
                .fold(0u8, |acc, (i, &bit)| acc | ((bit as u8) << (7 - i)));
            bytes.push(byte);
        }
        Ok(bytes)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, BmdCodecError> {
        if bytes.len() < HEADER_LEN {
            return Err(BmdCodecError::TooShort(bytes.len()));
        }
        if bytes[..2] != MAGIC {
            return Err(BmdCodecError::BadMagic);
        }
        if bytes[2] != VERSION {
            return Err(BmdCodecError::UnsupportedVersion(bytes[2]));
        }
        let fingerprint_prefix = hex::encode(&bytes[3..3 + FINGERPRINT_BYTES]);
        let precinct_index = u16::from_be_bytes([bytes[13], bytes[14]]);
        let ballot_style_index = u16::from_be_bytes([bytes[15], bytes[16]]);
        let flags = bytes[17];
        if flags & !TEST_MODE_FLAG != 0 {
            return Err(BmdCodecError::UnknownFlags(flags));
        }
        let selections = bytes[HEADER_LEN..]
            .iter()
            .flat_map(|byte| (0..8).rev().map(move |shift| (byte >> shift) & 1 == 1))
            .collect();

        Ok(Self {
            fingerprint_prefix,
            precinct_index,
            ballot_style_index,
            is_test_mode: flags & TEST_MODE_FLAG != 0,
            selections,
        })
    }

    /// The first `option_count` selections, checking the bitmap has exactly the
    /// right length and zero padding.
    pub fn selections_for(&self, option_count: usize) -> Result<&[bool], BmdCodecError> {
        let expected = option_count.div_ceil(8);
        let actual = self.selections.len() / 8;
        if expected != actual {
            return Err(BmdCodecError::SelectionCountMismatch { expected, actual });
        }
        if self.selections[option_count..].iter().any(|&bit| bit) {
            return Err(BmdCodecError::NonZeroPadding);
        }
        Ok(&self.selections[..option_count])
    }
}
