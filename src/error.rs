#[allow(unused)]
pub use anyhow::{anyhow, bail, ensure, Error};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JWTError {
    #[error("Internal error: [{0}]")]
    InternalError(String),
    #[error("Unsupported algorithm")]
    UnsupportedAlgorithm,
    #[error("Key format version mismatch")]
    KeyVersionMismatch,
    #[error("RSA modulus is too small")]
    ModulusTooSmall,
    #[error("Invalid RSA public exponent")]
    InvalidPublicExponent,
    #[error("Malformed key material")]
    MalformedKeyMaterial,
    #[error("Unsupported RSA modulus")]
    UnsupportedRSAModulus,
    #[error("Token contains non-ASCII characters")]
    NonAsciiToken,
    #[error("Only tokens in JWS compact serialization are supported")]
    MalformedCompactSerialization,
    #[error("Token is too long")]
    TokenTooLong,
    #[error("JWT header too large")]
    HeaderTooLarge,
    #[error("Invalid signature encoding")]
    InvalidSignatureEncoding,
    #[error("Invalid token encoding")]
    InvalidTokenEncoding,
    #[error("Invalid JWT header")]
    InvalidHeader,
    #[error("Tokens with critical header parameters are not supported")]
    UnsupportedCriticalHeader,
    #[error("Invalid JWT payload")]
    InvalidPayload,
    #[error("Signature didn't verify")]
    InvalidSignature,
    #[error("JWT algorithm mismatch")]
    AlgorithmMismatch,
    #[error("JWT key identifier mismatch")]
    KeyIdentifierMismatch,
    #[error("Missing JWT key identifier")]
    MissingJWTKeyIdentifier,
    #[error("Token has no expiration date")]
    MissingExpiration,
    #[error("Token has expired")]
    TokenHasExpired,
    #[error("Token not valid yet")]
    TokenNotValidYet,
    #[error("Clock drift detected")]
    ClockDrift,
    #[error("Required issuer mismatch")]
    RequiredIssuerMismatch,
    #[error("Required issuer missing")]
    RequiredIssuerMissing,
    #[error("Required subject mismatch")]
    RequiredSubjectMismatch,
    #[error("Required subject missing")]
    RequiredSubjectMissing,
    #[error("Required audience missing")]
    RequiredAudienceMissing,
    #[error("Required audience mismatch")]
    RequiredAudienceMismatch,
}
