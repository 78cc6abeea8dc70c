//! Frame checksum
//!
//! The checksum is the bitwise inversion of the one-byte sum of every byte
//! from the address MSB up to the byte preceding the checksum.

/// Compute the checksum of a checksum region.
///
/// `sum(region) + checksum(region)` is always `0xFF` modulo 256, so an empty
/// region yields `0xFF`.
pub fn checksum(region: &[u8]) -> u8 {
    !region.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Check the trailing checksum byte of a complete frame.
///
/// The region is everything between the lead byte and the checksum. Frames
/// shorter than three bytes never verify.
pub fn verify(frame: &[u8]) -> bool {
    match frame {
        [_, region @ .., last] if !region.is_empty() => checksum(region) == *last,
        _ => false,
    }
}
