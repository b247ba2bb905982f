/// Deterministic hash of a string, used as the identity of set elements.
///
/// CRC32 (IEEE) of the UTF-8 bytes. Stable across processes and releases,
/// which matters because hashes of stored set elements are compared against
/// hashes of freshly parsed configuration.
pub fn string(s: &str) -> u32 {
    let mut crc = flate2::Crc::new();
    crc.update(s.as_bytes());
    crc.sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_crc32_value() {
        // Standard CRC32 check value.
        assert_eq!(string("123456789"), 0xCBF4_3926);
    }

    #[test]
    fn empty_string_hashes_to_zero() {
        assert_eq!(string(""), 0);
    }

    #[test]
    fn different_inputs_differ() {
        assert_ne!(string("sg-1"), string("sg-2"));
    }
}
