//! Shortened Reed-Solomon RS(6, 4) over GF(16)
//!
//! Every 4 data nibbles gain 2 parity nibbles, so each block of 6 symbols can
//! correct any single symbol error. Two or more errors in a block are either
//! detected here or caught later by the frame CRC.

use crate::error::{ChirpError, Result};

/// Data nibbles per block
pub const DATA_SYMBOLS_PER_BLOCK: usize = 4;

/// Transmitted symbols per block (data + parity)
pub const SYMBOLS_PER_BLOCK: usize = 6;

const GF16_EXP: [u8; 30] = [
    1, 2, 4, 8, 3, 6, 12, 11, 5, 10, 7, 14, 15, 13, 9, 1, 2, 4, 8, 3, 6, 12, 11, 5, 10, 7, 14, 15,
    13, 9,
];

const GF16_LOG: [i8; 16] = [-1, 0, 1, 4, 2, 8, 5, 10, 3, 14, 9, 7, 6, 13, 11, 12];
const RS_GEN_G1: u8 = 6; // alpha^1 + alpha^2
const RS_GEN_G0: u8 = 8; // alpha^1 * alpha^2

/// Split bytes into nibbles, high nibble first
pub fn to_nibbles(bytes: &[u8]) -> Vec<u8> {
    bytes
        .iter()
        .flat_map(|&b| [(b >> 4) & 0x0F, b & 0x0F])
        .collect()
}

/// Join nibble pairs back into bytes; a trailing odd nibble is dropped
pub fn from_nibbles(nibbles: &[u8]) -> Vec<u8> {
    nibbles
        .chunks_exact(2)
        .map(|pair| (pair[0] << 4) | (pair[1] & 0x0F))
        .collect()
}

/// Number of transmitted symbols needed to carry `data_nibbles` nibbles
pub fn encoded_len(data_nibbles: usize) -> usize {
    data_nibbles.div_ceil(DATA_SYMBOLS_PER_BLOCK) * SYMBOLS_PER_BLOCK
}

/// Append parity to every 4-nibble block, zero-padding the final block
pub fn encode_blocks(nibbles: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(encoded_len(nibbles.len()));
    for chunk in nibbles.chunks(DATA_SYMBOLS_PER_BLOCK) {
        let mut data = [0u8; DATA_SYMBOLS_PER_BLOCK];
        for (slot, &nibble) in data.iter_mut().zip(chunk) {
            *slot = nibble & 0x0F;
        }
        let parity = rs_encode(&data);
        output.extend_from_slice(&data);
        output.extend_from_slice(&parity);
    }
    output
}

/// Correct and strip parity from a sequence of whole blocks
pub fn decode_blocks(symbols: &[u8]) -> Result<Vec<u8>> {
    if symbols.len() % SYMBOLS_PER_BLOCK != 0 {
        return Err(ChirpError::InvalidInputSize);
    }

    let mut output = Vec::with_capacity(symbols.len() / SYMBOLS_PER_BLOCK * DATA_SYMBOLS_PER_BLOCK);
    for chunk in symbols.chunks_exact(SYMBOLS_PER_BLOCK) {
        let mut block = [0u8; SYMBOLS_PER_BLOCK];
        block.copy_from_slice(chunk);
        output.extend_from_slice(&decode_block(&block)?);
    }
    Ok(output)
}

/// Correct at most one symbol error in a block and return its data nibbles
pub fn decode_block(block: &[u8; SYMBOLS_PER_BLOCK]) -> Result<[u8; DATA_SYMBOLS_PER_BLOCK]> {
    if block.iter().any(|&s| s > 0x0F) {
        return Err(ChirpError::InvalidInputSize);
    }

    let mut data = [block[0], block[1], block[2], block[3]];
    let parity = [block[4], block[5]];
    let expected = rs_encode(&data);

    if expected == parity {
        return Ok(data);
    }

    // A single damaged parity nibble leaves the data intact
    let parity_mismatches = expected
        .iter()
        .zip(parity.iter())
        .filter(|(a, b)| a != b)
        .count();

    for idx in 0..DATA_SYMBOLS_PER_BLOCK {
        let original = data[idx];
        for cand in 0..16 {
            if cand == original {
                continue;
            }
            data[idx] = cand;
            if rs_encode(&data) == parity {
                return Ok(data);
            }
        }
        data[idx] = original;
    }

    if parity_mismatches == 1 {
        return Ok(data);
    }

    Err(ChirpError::UncorrectableBlock)
}

fn rs_encode(data: &[u8; DATA_SYMBOLS_PER_BLOCK]) -> [u8; 2] {
    let mut parity = [0u8; 2];
    for &symbol in data {
        let feedback = symbol ^ parity[0];
        parity[0] = parity[1] ^ gf16_mul(feedback, RS_GEN_G1);
        parity[1] = gf16_mul(feedback, RS_GEN_G0);
    }
    parity
}

fn gf16_mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    let log_a = GF16_LOG[a as usize] as i32;
    let log_b = GF16_LOG[b as usize] as i32;
    let idx = ((log_a + log_b) % 15) as usize;
    GF16_EXP[idx]
}
