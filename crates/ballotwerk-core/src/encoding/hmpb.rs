// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bottom-row timing-mark encoding for hand-marked pages.
//
// Column layout (presence of a mark = 1):
//
//   0            corner, always present
//   1            orientation anchor, always absent
//   2..32        30 data bits
//   32..cols-1   padding, always absent (includes the anchor at cols-2)
//   cols-1       corner, always present
//
// Data bits, MSB first: page number - 1 (3), test mode (1), ballot style
// index (4), precinct index (5), fingerprint prefix (12), checksum (5).

use thiserror::Error;

/// Fewest columns that fit the corners, anchors and data bits.
pub const MIN_COLUMNS: usize = 34;

const DATA_START: usize = 2;
const DATA_BITS: usize = 30;
const PAYLOAD_BITS: usize = 25;

const PAGE_BITS: usize = 3;
const TEST_MODE_BITS: usize = 1;
const STYLE_BITS: usize = 4;
const PRECINCT_BITS: usize = 5;
const FINGERPRINT_BITS: usize = 12;
const CHECKSUM_BITS: usize = 5;

const CHECKSUM_MASK: u32 = 0b10101;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HmpbCodecError {
    #[error("bottom row has {0} columns, need at least {MIN_COLUMNS}")]
    TooFewColumns(usize),

    #[error("corner timing mark missing at column {0}")]
    MissingCorner(usize),

    #[error("reserved column {0} carries a mark")]
    ReservedColumnSet(usize),

    #[error("checksum mismatch: encoded {expected:#07b}, computed {actual:#07b}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    #[error("{field} value {value} does not fit (max {max})")]
    FieldOutOfRange {
        field: &'static str,
        value: u32,
        max: u32,
    },
}

/// Metadata fields carried by a hand-marked page's bottom row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HmpbMetadataBits {
    /// 1-based, at most 8.
    pub page_number: u32,
    pub is_test_mode: bool,
    pub ballot_style_index: u32,
    pub precinct_index: u32,
    /// First 12 bits of the election fingerprint.
    pub fingerprint_prefix: u16,
}

impl HmpbMetadataBits {
    /// Presence pattern for a bottom row of `columns` marks.
    pub fn encode(&self, columns: usize) -> Result<Vec<bool>, HmpbCodecError> {
        if columns < MIN_COLUMNS {
            return Err(HmpbCodecError::TooFewColumns(columns));
        }
        if self.page_number == 0 {
            return Err(HmpbCodecError::FieldOutOfRange {
                field: "page_number",
                value: 0,
                max: 1 << PAGE_BITS,
            });
        }

        let mut payload = Vec::with_capacity(DATA_BITS);
        push_field(&mut payload, "page_number", self.page_number - 1, PAGE_BITS)?;
        push_field(&mut payload, "test_mode", self.is_test_mode as u32, TEST_MODE_BITS)?;
        push_field(&mut payload, "ballot_style_index", self.ballot_style_index, STYLE_BITS)?;
        push_field(&mut payload, "precinct_index", self.precinct_index, PRECINCT_BITS)?;
        push_field(
            &mut payload,
            "fingerprint_prefix",
            self.fingerprint_prefix as u32,
            FINGERPRINT_BITS,
        )?;
        let checksum = checksum(&payload);
        push_field(&mut payload, "checksum", checksum as u32, CHECKSUM_BITS)?;

        let mut row = vec![false; columns];
        row[0] = true;
        row[columns - 1] = true;
        row[DATA_START..DATA_START + DATA_BITS].copy_from_slice(&payload);
        Ok(row)
    }

    /// Decode a bottom-row presence pattern.
    pub fn decode(row: &[bool]) -> Result<Self, HmpbCodecError> {
        let columns = row.len();
        if columns < MIN_COLUMNS {
            return Err(HmpbCodecError::TooFewColumns(columns));
        }
        for corner in [0, columns - 1] {
            if !row[corner] {
                return Err(HmpbCodecError::MissingCorner(corner));
            }
        }
        let reserved = std::iter::once(1).chain(DATA_START + DATA_BITS..columns - 1);
        for column in reserved {
            if row[column] {
                return Err(HmpbCodecError::ReservedColumnSet(column));
            }
        }

        let data = &row[DATA_START..DATA_START + DATA_BITS];
        let mut reader = BitReader { bits: data, pos: 0 };
        let page_number = reader.read(PAGE_BITS) + 1;
        let is_test_mode = reader.read(TEST_MODE_BITS) == 1;
        let ballot_style_index = reader.read(STYLE_BITS);
        let precinct_index = reader.read(PRECINCT_BITS);
        let fingerprint_prefix = reader.read(FINGERPRINT_BITS) as u16;
        let encoded = reader.read(CHECKSUM_BITS) as u8;

        let computed = checksum(&data[..PAYLOAD_BITS]);
        if encoded != computed {
            return Err(HmpbCodecError::ChecksumMismatch {
                expected: encoded,
                actual: computed,
            });
        }

        Ok(Self {
            page_number,
            is_test_mode,
            ballot_style_index,
            precinct_index,
            fingerprint_prefix,
        })
    }

    /// The fingerprint prefix as three lowercase hex characters.
    pub fn fingerprint_hex(&self) -> String {
        format!("{:03x}", self.fingerprint_prefix)
    }

    /// The 12-bit prefix of a hex fingerprint, if it has one.
    pub fn fingerprint_prefix_of(fingerprint: &str) -> Option<u16> {
        let prefix = fingerprint.get(..FINGERPRINT_BITS / 4)?;
        u16::from_str_radix(prefix, 16).ok()
    }
}

fn push_field(
    bits: &mut Vec<bool>,
    field: &'static str,
    value: u32,
    width: usize,
) -> Result<(), HmpbCodecError> {
    let max = (1u32 << width) - 1;
    if value > max {
        return Err(HmpbCodecError::FieldOutOfRange { field, value, max });
    }
    bits.extend((0..width).rev().map(|shift| (value >> shift) & 1 == 1));
    Ok(())
}

struct BitReader<'a> {
    bits: &'a [bool],
    pos: usize,
}

impl BitReader<'_> {
    fn read(&mut self, width: usize) -> u32 {
        let value = self.bits[self.pos..self.pos + width]
            .iter()
            .fold(0u32, |acc, &bit| (acc << 1) | bit as u32);
        self.pos += width;
        value
    }
}

/// Sum of the 5-bit chunks, mod 32, masked so an empty payload has a non-empty checksum.
fn checksum(payload: &[bool]) -> u8 {
    let sum: u32 = payload
        .chunks(CHECKSUM_BITS)
        .map(|chunk| chunk.iter().fold(0u32, |acc, &bit| (acc << 1) | bit as u32))
        .sum();
    ((sum % 32) ^ CHECKSUM_MASK) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HmpbMetadataBits {
        HmpbMetadataBits {
            page_number: 2,
            is_test_mode: true,
            ballot_style_index: 5,
            precinct_index: 17,
            fingerprint_prefix: 0xa3f,
        }
    }

    #[test]
    fn encoded_row_keeps_corners_and_anchors() {
        let row = sample().encode(34).expect("encode");
        assert_eq!(row.len(), 34);
        assert!(row[0] && row[33]);
        assert!(!row[1] && !row[32]);
        assert_eq!(HmpbMetadataBits::decode(&row), Ok(sample()));
    }

    #[test]
    fn wider_grids_pad_with_empty_columns() {
        let row = sample().encode(40).expect("encode");
        assert!(row[32..39].iter().all(|bit| !bit));
        assert_eq!(HmpbMetadataBits::decode(&row), Ok(sample()));
    }

    /// Any single flipped data bit is caught.
    #[test]
    fn single_bit_errors_fail_checksum() {
        let row = sample().encode(34).expect("encode");
        for column in 2..32 {
            let mut damaged = row.clone();
            damaged[column] = !damaged[column];
            assert!(
                matches!(
                    HmpbMetadataBits::decode(&damaged),
                    Err(HmpbCodecError::ChecksumMismatch { .. })
                ),
                "flip at column {column} went undetected"
            );
        }
    }

    #[test]
    fn reserved_columns_must_be_empty() {
        let mut row = sample().encode(34).expect("encode");
        row[1] = true;
        assert_eq!(
            HmpbMetadataBits::decode(&row),
            Err(HmpbCodecError::ReservedColumnSet(1))
        );
    }

    #[test]
    fn out_of_range_fields_are_rejected() {
        let bits = HmpbMetadataBits {
            ballot_style_index: 16,
            ..sample()
        };
        assert!(matches!(
            bits.encode(34),
            Err(HmpbCodecError::FieldOutOfRange {
                field: "ballot_style_index",
                ..
            })
        ));
        let bits = HmpbMetadataBits {
            page_number: 9,
            ..sample()
        };
        assert!(bits.encode(34).is_err());
    }

    #[test]
    fn fingerprint_prefix_parsing() {
        assert_eq!(HmpbMetadataBits::fingerprint_prefix_of("a3f91c"), Some(0xa3f));
        assert_eq!(HmpbMetadataBits::fingerprint_prefix_of("a3"), None);
        assert_eq!(sample().fingerprint_hex(), "a3f");
    }
}
