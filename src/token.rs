use ct_codecs::{Base64UrlSafeNoPadding, Decoder, Encoder};
use serde::Serialize;
use serde_json::Value;

use crate::claims::*;
use crate::common::*;
use crate::error::*;
use crate::jwt_header::*;

pub const MAX_HEADER_LENGTH: usize = 8192;

/// Utilities to encode, split and verify compact tokens
pub struct Token;

/// The three segments of a token in JWS compact serialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactParts<'t> {
    /// Base64url-encoded header
    pub header: &'t str,
    /// Base64url-encoded payload
    pub payload: &'t str,
    /// Base64url-encoded signature
    pub signature: &'t str,
    /// `header.payload`, exactly as found in the token: the signed message
    pub unsigned: &'t str,
}

/// JWT token information useful before signature verification
#[derive(Debug, Clone)]
pub struct TokenMetadata {
    jwt_header: JWTHeader,
}

impl TokenMetadata {
    /// The JWT algorithm for this token ("alg")
    /// This information should not be trusted: it is unprotected and can be
    /// freely modified by a third party. Verifiers ignore it and use the
    /// algorithm their key was configured with.
    pub fn algorithm(&self) -> &str {
        &self.jwt_header.algorithm
    }

    /// The key identifier for this token ("kid")
    /// Only useful to pick a key; not trusted either.
    pub fn key_id(&self) -> Option<&str> {
        self.jwt_header.key_id.as_deref()
    }

    /// The signature type for this token ("typ")
    pub fn signature_type(&self) -> Option<&str> {
        self.jwt_header.signature_type.as_deref()
    }

    /// The content type for this token ("cty")
    pub fn content_type(&self) -> Option<&str> {
        self.jwt_header.content_type.as_deref()
    }
}

impl Token {
    pub(crate) fn build<Payload, SignatureFn>(
        jwt_header: &JWTHeader,
        payload: &Payload,
        signature_fn: SignatureFn,
    ) -> Result<String, Error>
    where
        Payload: Serialize + ?Sized,
        SignatureFn: FnOnce(&str) -> Result<Vec<u8>, Error>,
    {
        let jwt_header_json = serde_json::to_vec(jwt_header)?;
        let payload_json = serde_json::to_vec(payload)?;
        Self::build_from_json(&jwt_header_json, &payload_json, signature_fn)
    }

    pub(crate) fn build_from_json<SignatureFn>(
        jwt_header_json: &[u8],
        payload_json: &[u8],
        signature_fn: SignatureFn,
    ) -> Result<String, Error>
    where
        SignatureFn: FnOnce(&str) -> Result<Vec<u8>, Error>,
    {
        let unsigned = format!(
            "{}.{}",
            Base64UrlSafeNoPadding::encode_to_string(jwt_header_json)?,
            Base64UrlSafeNoPadding::encode_to_string(payload_json)?
        );
        let signature = signature_fn(&unsigned)?;
        let mut token = unsigned;
        token.push('.');
        token.push_str(&Base64UrlSafeNoPadding::encode_to_string(signature)?);
        Ok(token)
    }

    /// Split a token into its three segments.
    ///
    /// Only US-ASCII tokens with exactly three segments are accepted. Empty
    /// segments are kept, so that `a..c` has an empty payload.
    pub fn parse(token: &str) -> Result<CompactParts<'_>, Error> {
        ensure!(token.is_ascii(), JWTError::NonAsciiToken);
        let mut parts = token.split('.');
        let (header, payload, signature) = match (parts.next(), parts.next(), parts.next()) {
            (Some(header), Some(payload), Some(signature)) => (header, payload, signature),
            _ => bail!(JWTError::MalformedCompactSerialization),
        };
        ensure!(
            parts.next().is_none(),
            JWTError::MalformedCompactSerialization
        );
        let unsigned = &token[..header.len() + 1 + payload.len()];
        Ok(CompactParts {
            header,
            payload,
            signature,
            unsigned,
        })
    }

    /// Decode the signature segment
    pub fn decode_signature(signature_b64: &str) -> Result<Vec<u8>, Error> {
        Base64UrlSafeNoPadding::decode_to_vec(signature_b64, None)
            .map_err(|_| JWTError::InvalidSignatureEncoding.into())
    }

    /// Decode the payload segment as UTF-8 text
    pub fn decode_payload(payload_b64: &str) -> Result<String, Error> {
        decode_text(payload_b64)
    }

    pub(crate) fn decode_header(jwt_header_b64: &str) -> Result<JWTHeader, Error> {
        let jwt_header_json = decode_text(jwt_header_b64)?;
        let jwt_header = match serde_json::from_str::<Value>(&jwt_header_json) {
            Ok(jwt_header @ Value::Object(_)) => jwt_header,
            _ => bail!(JWTError::InvalidHeader),
        };
        serde_json::from_value(jwt_header).map_err(|_| JWTError::InvalidHeader.into())
    }

    /// Verify a token, then hand its claims over to `validator`.
    ///
    /// The steps run in a fixed order, and the header is only decoded once
    /// the signature has been checked with the key's own parameters.
    /// `signature_fn` receives the signed message and the raw signature.
    pub(crate) fn verify<Validator, SignatureFn>(
        jwt_alg_name: &str,
        token: &str,
        options: &VerificationOptions,
        validator: &Validator,
        signature_fn: SignatureFn,
    ) -> Result<VerifiedToken, Error>
    where
        Validator: ClaimValidator + ?Sized,
        SignatureFn: FnOnce(&str, &[u8]) -> Result<(), Error>,
    {
        if let Some(max_token_length) = options.max_token_length {
            ensure!(token.len() <= max_token_length, JWTError::TokenTooLong);
        }
        let parts = Self::parse(token)?;
        ensure!(
            parts.header.len() <= options.max_header_length.unwrap_or(MAX_HEADER_LENGTH),
            JWTError::HeaderTooLarge
        );

        let signature = Self::decode_signature(parts.signature)?;
        if signature_fn(parts.unsigned, &signature).is_err() {
            bail!(JWTError::InvalidSignature);
        }

        let jwt_header = Self::decode_header(parts.header)?;
        ensure!(
            jwt_header.algorithm == jwt_alg_name,
            JWTError::AlgorithmMismatch
        );
        ensure!(!jwt_header.critical, JWTError::UnsupportedCriticalHeader);
        if let Some(required_key_id) = &options.required_key_id {
            if let Some(key_id) = &jwt_header.key_id {
                ensure!(key_id == required_key_id, JWTError::KeyIdentifierMismatch);
            } else {
                bail!(JWTError::MissingJWTKeyIdentifier)
            }
        }

        let payload = Self::decode_payload(parts.payload)?;
        let claims = RawClaims::from_json_payload(&payload)?;
        validator.validate(claims)
    }

    /// Decode token information that can be useful prior to signature
    /// verification, such as the identifier of the key to use
    pub fn decode_metadata(token: &str) -> Result<TokenMetadata, Error> {
        Self::decode_metadata_with_options(token, &VerificationOptions::default())
    }

    /// Same as `decode_metadata()`, with the token and header length limits of `options`
    pub fn decode_metadata_with_options(
        token: &str,
        options: &VerificationOptions,
    ) -> Result<TokenMetadata, Error> {
        if let Some(max_token_length) = options.max_token_length {
            ensure!(token.len() <= max_token_length, JWTError::TokenTooLong);
        }
        let parts = Self::parse(token)?;
        ensure!(
            parts.header.len() <= options.max_header_length.unwrap_or(MAX_HEADER_LENGTH),
            JWTError::HeaderTooLarge
        );
        let jwt_header = Self::decode_header(parts.header)?;
        Ok(TokenMetadata { jwt_header })
    }
}

fn decode_text(b64: &str) -> Result<String, Error> {
    let bin = Base64UrlSafeNoPadding::decode_to_vec(b64, None)
        .map_err(|_| JWTError::InvalidTokenEncoding)?;
    String::from_utf8(bin).map_err(|_| JWTError::InvalidTokenEncoding.into())
}
