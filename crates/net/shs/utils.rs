use super::crypto::NONCE_SIZE;

/// Increments a 24-byte nonce as a big-endian 192-bit counter, wrapping to
/// zero on overflow. The carry walks the whole buffer regardless of where it
/// settles.
pub fn inc_nonce(nonce: &[u8; NONCE_SIZE]) -> [u8; NONCE_SIZE] {
    let mut out = *nonce;
    let mut carry = 1u16;
    for byte in out.iter_mut().rev() {
        carry += u16::from(*byte);
        *byte = carry as u8;
        carry >>= 8;
    }
    out
}

/// Consecutive non-overlapping slices of `data` of at most `max` bytes; the
/// final slice may be shorter, empty input yields nothing.
pub fn split_chunks(data: &[u8], max: usize) -> std::slice::Chunks<'_, u8> {
    data.chunks(max)
}
