//! Text <-> characteristic payload conversion
//! The peripheral firmware sends one ASCII byte per notification payload and
//! expects UTF-8 text on writes.

/// Encodes text into the UTF-8 bytes written to a characteristic.
pub fn encode(text: &str) -> Vec<u8> {
    text.as_bytes().to_vec()
}

/// Decodes a characteristic payload, one char per byte.
///
/// Every byte maps to the char with the same code point (0..=255), so this
/// never fails. It is not multi-byte aware: `decode(&encode(s)) == s` only
/// holds when every char of `s` is ASCII.
pub fn decode(data: &[u8]) -> String {
    data.iter().map(|&b| char::from(b)).collect()
}
