//! ECDSA over P-256, with the raw fixed-width encodings the wire and
//! storage formats expect: a 64-byte `X || Y` public key and a 64-byte
//! `r || s` signature, rather than DER.

use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use p256::{EncodedPoint, PublicKey as P256PublicKey};
use rand::rngs::OsRng;

use crate::error::CryptoError;
use crate::hash::hash160;

/// Width, in bytes, of one coordinate of a P-256 point, and of one half of
/// an ECDSA (r, s) signature.
const FIELD_LEN: usize = 32;

/// A P-256 key pair. Holds the private scalar; never serialized as a whole.
#[derive(Debug)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a fresh key pair from the system RNG.
    pub fn generate() -> KeyPair {
        KeyPair {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    /// Reconstruct a key pair from a 32-byte private scalar.
    pub fn from_bytes(bytes: &[u8]) -> Result<KeyPair, CryptoError> {
        let signing_key =
            SigningKey::from_slice(bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(KeyPair { signing_key })
    }

    /// The 32-byte private scalar, for wallet persistence.
    pub fn to_bytes(&self) -> [u8; FIELD_LEN] {
        let mut out = [0u8; FIELD_LEN];
        out.copy_from_slice(&self.signing_key.to_bytes());
        out
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_verifying_key(self.signing_key.verifying_key())
    }

    /// Sign a 32-byte digest, returning a fixed-width `r || s` signature.
    ///
    /// The caller is responsible for computing the digest (see
    /// [`crate::types::Transaction`] signing, which hashes a per-input
    /// trimmed copy of the transaction, not the raw transaction bytes).
    pub fn sign_prehash(&self, digest: &[u8; 32]) -> Result<[u8; 64], CryptoError> {
        let signature: Signature = self
            .signing_key
            .sign_prehash(digest)
            .map_err(|_| CryptoError::InvalidSignature)?;
        let mut out = [0u8; 64];
        out.copy_from_slice(&signature.to_bytes());
        Ok(out)
    }
}

/// A P-256 public key, stored and transmitted as `X || Y` (64 bytes,
/// uncompressed, no SEC1 tag byte).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey {
    x: [u8; FIELD_LEN],
    y: [u8; FIELD_LEN],
}

impl PublicKey {
    fn from_verifying_key(vk: &VerifyingKey) -> PublicKey {
        let point = vk.to_encoded_point(false);
        let mut x = [0u8; FIELD_LEN];
        let mut y = [0u8; FIELD_LEN];
        x.copy_from_slice(point.x().expect("uncompressed point has x"));
        y.copy_from_slice(point.y().expect("uncompressed point has y"));
        PublicKey { x, y }
    }

    fn to_p256_public_key(&self) -> Result<P256PublicKey, CryptoError> {
        let encoded = EncodedPoint::from_affine_coordinates(&self.x.into(), &self.y.into(), false);
        Option::from(P256PublicKey::from_encoded_point(&encoded)).ok_or(CryptoError::InvalidPublicKey)
    }

    /// Parse a 64-byte `X || Y` public key.
    pub fn from_bytes(bytes: &[u8]) -> Result<PublicKey, CryptoError> {
        if bytes.len() != 2 * FIELD_LEN {
            return Err(CryptoError::InvalidPublicKey);
        }
        let mut x = [0u8; FIELD_LEN];
        let mut y = [0u8; FIELD_LEN];
        x.copy_from_slice(&bytes[..FIELD_LEN]);
        y.copy_from_slice(&bytes[FIELD_LEN..]);
        let candidate = PublicKey { x, y };
        // Validate the point actually lies on the curve.
        candidate.to_p256_public_key()?;
        Ok(candidate)
    }

    /// The 64-byte `X || Y` encoding.
    pub fn to_bytes(&self) -> [u8; 2 * FIELD_LEN] {
        let mut out = [0u8; 2 * FIELD_LEN];
        out[..FIELD_LEN].copy_from_slice(&self.x);
        out[FIELD_LEN..].copy_from_slice(&self.y);
        out
    }

    /// RIPEMD-160(SHA-256(pub_key)) — what a [`TxOutput`](crate::types::TxOutput) locks to.
    pub fn hash160(&self) -> [u8; 20] {
        hash160(&self.to_bytes())
    }

    /// Verify a 64-byte `r || s` signature over a 32-byte digest.
    pub fn verify_prehash(&self, digest: &[u8; 32], signature: &[u8]) -> Result<(), CryptoError> {
        if signature.len() != 2 * FIELD_LEN {
            return Err(CryptoError::InvalidSignature);
        }
        let point = self.to_p256_public_key()?;
        let verifying_key =
            VerifyingKey::from_affine(*point.as_affine()).map_err(|_| CryptoError::InvalidPublicKey)?;
        let sig = Signature::from_slice(signature).map_err(|_| CryptoError::InvalidSignature)?;
        verifying_key
            .verify_prehash(digest, &sig)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}
