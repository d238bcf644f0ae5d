use crate::algorithms::PSSAlgorithm;
use crate::error::*;

/// Key format version understood by this crate
pub const SUPPORTED_KEY_VERSION: u32 = 0;

/// Smallest accepted RSA modulus, in bits
pub const MIN_RSA_MODULUS_BITS: usize = 2048;

/// Public exponents must be strictly greater than this value
pub const MIN_RSA_PUBLIC_EXPONENT: u64 = 65536;

/// Public exponents must be strictly lower than this value (2^32)
pub const MAX_RSA_PUBLIC_EXPONENT: u64 = 1 << 32;

/// An RSA-PSS public key, as supplied by a key distribution mechanism.
///
/// The modulus and the exponent are unsigned big-endian integers.
/// The material must pass `validate()` before being turned into a usable key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyMaterial {
    pub algorithm: PSSAlgorithm,
    pub n: Vec<u8>,
    pub e: Vec<u8>,
    pub version: u32,
}

impl PublicKeyMaterial {
    /// Public key material in the current format version
    pub fn new(algorithm: PSSAlgorithm, n: Vec<u8>, e: Vec<u8>) -> Self {
        PublicKeyMaterial {
            algorithm,
            n,
            e,
            version: SUPPORTED_KEY_VERSION,
        }
    }

    /// Check the structural properties of the key: format version, modulus size and public exponent.
    ///
    /// Every property is checked; the first violation (in that order) is reported.
    pub fn validate(&self, expected_version: u32) -> Result<(), Error> {
        let version_ok = self.version == expected_version;
        let modulus_ok = modulus_bits(&self.n) >= MIN_RSA_MODULUS_BITS;
        let exponent_ok = is_valid_public_exponent(&self.e);
        ensure!(version_ok, JWTError::KeyVersionMismatch);
        ensure!(modulus_ok, JWTError::ModulusTooSmall);
        ensure!(exponent_ok, JWTError::InvalidPublicExponent);
        Ok(())
    }

    /// Size of the modulus, in bits
    pub fn modulus_bits(&self) -> usize {
        modulus_bits(&self.n)
    }
}

fn strip_leading_zeros(be: &[u8]) -> &[u8] {
    let first = be.iter().position(|&b| b != 0).unwrap_or(be.len());
    &be[first..]
}

fn modulus_bits(n: &[u8]) -> usize {
    let n = strip_leading_zeros(n);
    match n.first() {
        None => 0,
        Some(&msb) => n.len() * 8 - msb.leading_zeros() as usize,
    }
}

fn is_valid_public_exponent(e: &[u8]) -> bool {
    let e = strip_leading_zeros(e);
    if e.len() > 8 {
        return false;
    }
    let e = e.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64);
    e & 1 == 1 && e > MIN_RSA_PUBLIC_EXPONENT && e < MAX_RSA_PUBLIC_EXPONENT
}
