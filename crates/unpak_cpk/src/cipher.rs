//! The byte stream cipher CRI tools apply to `@UTF` tables.
//!
//! Each byte is XORed with the low byte of a 32-bit multiplicative state that starts at
//! [`SEED`] and is multiplied by [`MULTIPLIER`] after every byte. XOR makes the transform its
//! own inverse.

/// Initial cipher state
pub const SEED: u32 = 0x0000_655F;

/// Factor applied to the state after each byte
pub const MULTIPLIER: u32 = 0x0000_4115;

/// Deciphers (or enciphers) `data` in place
pub fn decipher(data: &mut [u8]) {
    let mut state = SEED;
    for byte in data {
        *byte ^= state as u8;
        state = state.wrapping_mul(MULTIPLIER);
    }
}

/// Whether `data` starts with `tag` once deciphered, without modifying it
pub fn matches_enciphered(data: &[u8], tag: &[u8]) -> bool {
    if data.len() < tag.len() {
        return false;
    }
    let mut head = data[..tag.len()].to_vec();
    decipher(&mut head);
    head == tag
}
