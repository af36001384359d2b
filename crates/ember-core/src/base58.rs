//! Base58 encoding (Bitcoin alphabet: excludes `0`, `O`, `I`, `l`).

/// Encode raw bytes as Base58.
pub fn encode(data: &[u8]) -> String {
    bs58::encode(data).into_string()
}

/// Decode a Base58 string back to raw bytes.
pub fn decode(s: &str) -> Result<Vec<u8>, bs58::decode::Error> {
    bs58::decode(s).into_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let data = b"ember wallet address payload".to_vec();
        let encoded = encode(&data);
        assert_eq!(decode(&encoded).unwrap(), data);
    }

    #[test]
    fn round_trip_empty() {
        assert_eq!(decode(&encode(&[])).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn alphabet_excludes_ambiguous_chars() {
        let data: Vec<u8> = (0u8..=255).collect();
        let encoded = encode(&data);
        for c in ['0', 'O', 'I', 'l'] {
            assert!(!encoded.contains(c), "encoded output should not contain {c}");
        }
    }

    #[test]
    fn decode_rejects_invalid_character() {
        assert!(decode("0Invalid").is_err() || decode("Invalid0").is_err());
    }
}
