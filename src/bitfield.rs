//! Tag-presence bitfield in the destination board's template format.
//!
//! One bit per tag code, bit index = code value, MSB-first within each byte.
//! The destination uses the field to decide which rendering rules apply to a
//! stored body, so the encoding must be byte-for-byte compatible.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Growable bit buffer over tag codes.
#[derive(Debug, Clone)]
pub struct Bitfield {
    data: Vec<u8>,
}

impl Bitfield {
    pub fn new() -> Self {
        Self { data: vec![0; 30] }
    }

    /// Set the bit for tag code `n`, growing the buffer when the code falls
    /// past the current end.
    pub fn set(&mut self, n: u32) {
        let i = (n / 8) as usize;
        let d = n % 8;
        if i >= self.data.len() {
            self.data.resize(i + 1, 0);
        }
        self.data[i] |= 1 << (7 - d);
    }

    /// Base64 of the buffer with trailing all-zero bytes trimmed. An empty
    /// field encodes as the empty string, not a zero-filled payload.
    pub fn to_base64(&self) -> String {
        let end = self
            .data
            .iter()
            .rposition(|&b| b != 0)
            .map(|p| p + 1)
            .unwrap_or(0);
        if end == 0 {
            return String::new();
        }
        STANDARD.encode(&self.data[..end])
    }
}

impl Default for Bitfield {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a set of tag codes. Duplicates and ordering do not affect the
/// output.
pub fn encode(codes: &[u32]) -> String {
    let mut field = Bitfield::new();
    for &code in codes {
        field.set(code);
    }
    field.to_base64()
}

/// Force-all variant: every bit from 0 through `max_code` inclusive.
pub fn encode_all(max_code: u32) -> String {
    let mut field = Bitfield::new();
    for code in 0..=max_code {
        field.set(code);
    }
    field.to_base64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_set_is_empty_string() {
        assert_eq!(encode(&[]), "");
    }

    #[test]
    fn bit_zero_is_msb() {
        // code 0 -> 0b1000_0000
        assert_eq!(encode(&[0]), STANDARD.encode([0x80]));
    }

    #[test]
    fn bit_seven_is_lsb() {
        // code 7 -> 0b0000_0001
        assert_eq!(encode(&[7]), STANDARD.encode([0x01]));
    }

    #[test]
    fn known_encodings() {
        // b=1 and u=7 in the default tag table
        assert_eq!(encode(&[1, 7]), "QQ==");
        // quote, b, i plus an extended code in the second byte
        assert_eq!(encode(&[0, 1, 2, 8]), "4IA=");
    }

    #[test]
    fn order_and_duplicates_do_not_matter() {
        assert_eq!(encode(&[7, 1]), encode(&[1, 7]));
        assert_eq!(encode(&[1, 1, 7, 7, 7]), encode(&[1, 7]));
    }

    #[test]
    fn trailing_zero_bytes_are_trimmed() {
        // Only code 1 set: a single byte survives even though the buffer
        // starts at 30 bytes.
        assert_eq!(encode(&[1]), STANDARD.encode([0x40]));
    }

    #[test]
    fn grows_past_initial_capacity() {
        let s = encode(&[245]);
        assert!(!s.is_empty());
        let decoded = STANDARD.decode(s).unwrap();
        assert_eq!(decoded.len(), 31);
        assert_eq!(decoded[30], 1 << (7 - 245 % 8));
    }

    #[test]
    fn encode_all_sets_every_bit() {
        let decoded = STANDARD.decode(encode_all(17)).unwrap();
        // 18 bits -> bytes 0xFF 0xFF 0xC0
        assert_eq!(decoded, vec![0xFF, 0xFF, 0xC0]);
    }
}
