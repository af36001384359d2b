//! Base58Check wallet addresses: `Base58(version || pub_key_hash || checksum)`.
//!
//! `checksum` is the first 4 bytes of `SHA256(SHA256(version || pub_key_hash))`.

use crate::base58;
use crate::constants::PUBKEY_HASH_LEN;
use crate::error::AddressError;
use crate::hash::double_sha256;

/// Address version byte. A single, fixed value — the protocol has no
/// notion of testnet/mainnet variants.
pub const VERSION: u8 = 0x00;

const CHECKSUM_LEN: usize = 4;

/// Encode a public-key hash as a Base58Check address string.
pub fn encode(pub_key_hash: &[u8; PUBKEY_HASH_LEN]) -> String {
    let mut payload = Vec::with_capacity(1 + PUBKEY_HASH_LEN + CHECKSUM_LEN);
    payload.push(VERSION);
    payload.extend_from_slice(pub_key_hash);
    let checksum = &double_sha256(&payload)[..CHECKSUM_LEN];
    payload.extend_from_slice(checksum);
    base58::encode(&payload)
}

/// Decode and validate a Base58Check address, returning its public-key hash.
pub fn decode(address: &str) -> Result<[u8; PUBKEY_HASH_LEN], AddressError> {
    let payload = base58::decode(address).map_err(|_| AddressError::InvalidBase58)?;
    if payload.len() != 1 + PUBKEY_HASH_LEN + CHECKSUM_LEN {
        return Err(AddressError::InvalidLength);
    }

    let version = payload[0];
    if version != VERSION {
        return Err(AddressError::InvalidVersion(version));
    }

    let body = &payload[..1 + PUBKEY_HASH_LEN];
    let want_checksum = &payload[1 + PUBKEY_HASH_LEN..];
    let got_checksum = &double_sha256(body)[..CHECKSUM_LEN];
    if got_checksum != want_checksum {
        return Err(AddressError::InvalidChecksum);
    }

    let mut pub_key_hash = [0u8; PUBKEY_HASH_LEN];
    pub_key_hash.copy_from_slice(&payload[1..1 + PUBKEY_HASH_LEN]);
    Ok(pub_key_hash)
}

/// Validate an address string without needing its public-key hash back.
pub fn is_valid(address: &str) -> bool {
    decode(address).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pkh() -> [u8; PUBKEY_HASH_LEN] {
        [0x42; PUBKEY_HASH_LEN]
    }

    #[test]
    fn round_trip() {
        let pkh = sample_pkh();
        let address = encode(&pkh);
        assert_eq!(decode(&address).unwrap(), pkh);
    }

    #[test]
    fn valid_address_passes_is_valid() {
        assert!(is_valid(&encode(&sample_pkh())));
    }

    #[test]
    fn rejects_bad_checksum() {
        let mut address = encode(&sample_pkh()).into_bytes();
        let last = address.len() - 1;
        address[last] = if address[last] == b'1' { b'2' } else { b'1' };
        let address = String::from_utf8(address).unwrap();
        assert!(matches!(decode(&address), Err(AddressError::InvalidChecksum)) || !is_valid(&address));
    }

    #[test]
    fn rejects_wrong_version() {
        let pkh = sample_pkh();
        let mut payload = vec![0x05u8];
        payload.extend_from_slice(&pkh);
        let checksum = &double_sha256(&payload)[..CHECKSUM_LEN];
        payload.extend_from_slice(checksum);
        let address = base58::encode(&payload);
        assert_eq!(decode(&address), Err(AddressError::InvalidVersion(0x05)));
    }

    #[test]
    fn rejects_malformed_base58() {
        assert_eq!(decode("not-valid-base58-0OIl"), Err(AddressError::InvalidBase58));
    }

    #[test]
    fn rejects_truncated_payload() {
        let short = base58::encode(&[VERSION, 1, 2, 3]);
        assert_eq!(decode(&short), Err(AddressError::InvalidLength));
    }

    #[test]
    fn different_hashes_produce_different_addresses() {
        assert_ne!(encode(&[0x01; PUBKEY_HASH_LEN]), encode(&[0x02; PUBKEY_HASH_LEN]));
    }
}
