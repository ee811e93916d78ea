use crate::error::{ChirpError, Result};
use crate::FRAME_OVERHEAD_BYTES;

/// CRC-16-CCITT for payload integrity verification
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u32 = 0xFFFF;
    for &byte in data {
        crc ^= (byte as u32) << 8;
        for _ in 0..8 {
            crc <<= 1;
            if crc & 0x10000 != 0 {
                crc ^= 0x1021;
            }
        }
    }
    (crc & 0xFFFF) as u16
}

/// Number of bytes a frame occupies for a payload of `payload_len` bytes
pub fn frame_len(payload_len: usize) -> usize {
    payload_len + FRAME_OVERHEAD_BYTES
}

/// Wrap a payload as `[len][payload...][crc16 hi][crc16 lo]`
///
/// The CRC covers the length byte and the payload, so a corrupted length is
/// caught even when the payload bytes survive.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > u8::MAX as usize {
        return Err(ChirpError::InvalidFrameSize);
    }

    let mut frame = Vec::with_capacity(frame_len(payload.len()));
    frame.push(payload.len() as u8);
    frame.extend_from_slice(payload);

    let crc = crc16(&frame);
    frame.push((crc >> 8) as u8);
    frame.push(crc as u8);

    Ok(frame)
}

/// Read the declared payload length from the first frame byte
pub fn declared_len(data: &[u8]) -> Option<usize> {
    data.first().map(|&len| len as usize)
}

/// Unwrap a frame and verify its CRC
///
/// Trailing bytes beyond the frame (symbol padding) are ignored.
pub fn decode_frame(data: &[u8], max_payload_len: usize) -> Result<Vec<u8>> {
    let payload_len = declared_len(data).ok_or(ChirpError::InvalidFrameSize)?;
    if payload_len == 0 || payload_len > max_payload_len {
        return Err(ChirpError::InvalidFrameSize);
    }
    if data.len() < frame_len(payload_len) {
        return Err(ChirpError::InvalidFrameSize);
    }

    let body_end = 1 + payload_len;
    let received_crc = ((data[body_end] as u16) << 8) | (data[body_end + 1] as u16);
    if received_crc != crc16(&data[..body_end]) {
        return Err(ChirpError::CrcMismatch);
    }

    Ok(data[1..body_end].to_vec())
}
