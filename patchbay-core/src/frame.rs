//! Checksummed packet framing for router-bound announcements.
//!
//! Frame format: `[length:4][checksum:4][tag:1][payload:N]`
//!
//! - **length**: Total frame size including header (little-endian u32)
//! - **checksum**: CRC32C of (tag + payload)
//! - **tag**: Message kind, interpreted by the receiving layer
//! - **payload**: Encoded wire data

/// Header size: 4 (length) + 4 (checksum) + 1 (tag) = 9 bytes.
pub const FRAME_HEADER_SIZE: usize = 9;

/// Maximum payload size (1MB). Larger frames are rejected outright.
pub const MAX_FRAME_PAYLOAD: usize = 1024 * 1024;

/// Framing error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// Not enough data to parse the frame.
    #[error("insufficient data: need {needed} bytes, have {have}")]
    InsufficientData {
        /// Minimum bytes required to parse.
        needed: usize,
        /// Actual bytes available.
        have: usize,
    },

    /// Checksum verification failed.
    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        /// Expected checksum from the header.
        expected: u32,
        /// Computed checksum from the data.
        actual: u32,
    },

    /// Payload exceeds [`MAX_FRAME_PAYLOAD`].
    #[error("frame too large: {size} bytes")]
    FrameTooLarge {
        /// Actual payload size in bytes.
        size: usize,
    },

    /// Length field has an invalid value.
    #[error("invalid frame length: {length}")]
    InvalidLength {
        /// The invalid length value from the header.
        length: u32,
    },
}

fn compute_checksum(tag: u8, payload: &[u8]) -> u32 {
    let mut data = Vec::with_capacity(1 + payload.len());
    data.push(tag);
    data.extend_from_slice(payload);
    crc32c::crc32c(&data)
}

/// Serialize a frame with tag and payload.
///
/// # Errors
///
/// Returns `FrameTooLarge` if the payload exceeds [`MAX_FRAME_PAYLOAD`].
pub fn write_frame(tag: u8, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    if payload.len() > MAX_FRAME_PAYLOAD {
        return Err(FrameError::FrameTooLarge {
            size: payload.len(),
        });
    }

    let total = FRAME_HEADER_SIZE + payload.len();
    let mut data = Vec::with_capacity(total);
    data.extend_from_slice(&(total as u32).to_le_bytes());
    data.extend_from_slice(&compute_checksum(tag, payload).to_le_bytes());
    data.push(tag);
    data.extend_from_slice(payload);
    Ok(data)
}

/// Deserialize a frame, validating length and checksum.
///
/// # Errors
///
/// - `InsufficientData`: not enough bytes for header or full frame
/// - `ChecksumMismatch`: data was corrupted
/// - `InvalidLength`: length field is malformed
pub fn read_frame(data: &[u8]) -> Result<(u8, Vec<u8>), FrameError> {
    match try_read_frame(data)? {
        Some((tag, payload, _consumed)) => Ok((tag, payload)),
        None => Err(FrameError::InsufficientData {
            needed: expected_len(data),
            have: data.len(),
        }),
    }
}

fn expected_len(data: &[u8]) -> usize {
    if data.len() < 4 {
        return FRAME_HEADER_SIZE;
    }
    u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize
}

/// Try to deserialize from a buffer that may hold partial data.
///
/// # Returns
///
/// - `Ok(Some((tag, payload, consumed)))` if a complete frame was parsed
/// - `Ok(None)` if more data is needed (not an error)
/// - `Err` if the data is malformed
pub fn try_read_frame(data: &[u8]) -> Result<Option<(u8, Vec<u8>, usize)>, FrameError> {
    if data.len() < FRAME_HEADER_SIZE {
        return Ok(None);
    }

    let length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let checksum = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    let tag = data[8];

    if (length as usize) < FRAME_HEADER_SIZE {
        return Err(FrameError::InvalidLength { length });
    }
    let total = length as usize;
    if total - FRAME_HEADER_SIZE > MAX_FRAME_PAYLOAD {
        return Err(FrameError::FrameTooLarge {
            size: total - FRAME_HEADER_SIZE,
        });
    }
    if data.len() < total {
        return Ok(None);
    }

    let payload = &data[FRAME_HEADER_SIZE..total];
    let computed = compute_checksum(tag, payload);
    if computed != checksum {
        return Err(FrameError::ChecksumMismatch {
            expected: checksum,
            actual: computed,
        });
    }

    Ok(Some((tag, payload.to_vec(), total)))
}
