#![forbid(unsafe_code)]

pub mod algorithms;
pub mod claims;
pub mod common;
pub mod error;
pub mod key_material;
pub mod token;

mod jwt_header;

pub use coarsetime;
pub use serde;

pub mod prelude {
    pub use crate::algorithms::*;
    pub use crate::claims::*;
    pub use crate::common::*;
    pub use crate::error::{Error, JWTError};
    pub use crate::key_material::*;
    pub use crate::token::*;
    pub use coarsetime::{self, Clock, Duration, UnixTimeStamp};
    pub use serde::{Deserialize, Serialize};
}

#[cfg(test)]
mod tests {
    use std::sync::OnceLock;

    use ct_codecs::{Base64UrlSafeNoPadding, Encoder};
    use serde_json::json;

    use crate::algorithms::pss_sign;
    use crate::error::*;
    use crate::prelude::*;

    fn ps256_key_pair() -> &'static PSSKeyPair {
        static KEY_PAIR: OnceLock<PSSKeyPair> = OnceLock::new();
        KEY_PAIR.get_or_init(|| PSSKeyPair::generate(PSSAlgorithm::PS256, 2048).unwrap())
    }

    fn accept_all(claims: RawClaims) -> Result<VerifiedToken, Error> {
        Ok(VerifiedToken::new(claims))
    }

    fn kind(res: Result<VerifiedToken, Error>) -> JWTError {
        res.unwrap_err().downcast::<JWTError>().unwrap()
    }

    fn replace_char(s: &str, pos: usize) -> String {
        let mut bytes = s.as_bytes().to_vec();
        bytes[pos] = if bytes[pos] == b'A' { b'B' } else { b'A' };
        String::from_utf8(bytes).unwrap()
    }

    fn resign(jwt_header_json: &str, payload_json: &str, parameters: &PSSParameters) -> String {
        Token::build_from_json(
            jwt_header_json.as_bytes(),
            payload_json.as_bytes(),
            |unsigned| pss_sign(ps256_key_pair().as_ref(), parameters, unsigned.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn ps256() {
        let key_pair = ps256_key_pair();
        let token = key_pair.sign(&json!({"sub": "alice"})).unwrap();
        let verifier = key_pair.verifier().unwrap();
        let validator = JWTValidator::new().allow_missing_expiration();
        let verified = verifier.verify_token(&token, &validator).unwrap();
        assert_eq!(verified.subject(), Some("alice"));
        assert_eq!(
            serde_json::Value::Object(verified.claims().as_json().clone()),
            json!({"sub": "alice"})
        );
    }

    #[test]
    fn ps384_and_ps512() {
        for &(algorithm, modulus_bits) in &[(PSSAlgorithm::PS384, 3072), (PSSAlgorithm::PS512, 2048)] {
            let key_pair = PSSKeyPair::generate(algorithm, modulus_bits).unwrap();
            let token = key_pair.sign(&json!({"sub": "alice"})).unwrap();
            assert_eq!(Token::decode_metadata(&token).unwrap().algorithm(), algorithm.name());
            let verifier = key_pair.verifier().unwrap();
            assert_eq!(verifier.algorithm(), algorithm);
            assert_eq!(verifier.public_key().modulus_bits(), modulus_bits);
            verifier.verify_token(&token, &accept_all).unwrap();
        }
    }

    #[test]
    fn tampered_signature() {
        let key_pair = ps256_key_pair();
        let token = key_pair.sign(&json!({"sub": "alice"})).unwrap();
        let parts = Token::parse(&token).unwrap();
        let pos = parts.unsigned.len() + 1 + parts.signature.len() / 2;
        let tampered = replace_char(&token, pos);
        let verifier = key_pair.verifier().unwrap();
        assert_eq!(kind(verifier.verify_token(&tampered, &accept_all)), JWTError::InvalidSignature);

        let stripped = format!("{}.", parts.unsigned);
        assert_eq!(kind(verifier.verify_token(&stripped, &accept_all)), JWTError::InvalidSignature);
    }

    #[test]
    fn tampered_payload() {
        let key_pair = ps256_key_pair();
        let token = key_pair.sign(&json!({"sub": "alice", "admin": false})).unwrap();
        let parts = Token::parse(&token).unwrap();
        let verifier = key_pair.verifier().unwrap();
        let start = parts.header.len() + 1;
        for pos in start..start + parts.payload.len() {
            for bit in 0..6 {
                let mut bytes = token.as_bytes().to_vec();
                bytes[pos] ^= 1 << bit;
                let tampered = String::from_utf8(bytes).unwrap();
                assert_eq!(
                    kind(verifier.verify_token(&tampered, &accept_all)),
                    JWTError::InvalidSignature
                );
            }
        }
    }

    #[test]
    fn header_alg_changed_without_resigning() {
        let key_pair = ps256_key_pair();
        let token = key_pair.sign(&json!({"sub": "alice"})).unwrap();
        let parts = Token::parse(&token).unwrap();
        let jwt_header = Base64UrlSafeNoPadding::encode_to_string(br#"{"alg":"PS512","typ":"JWT"}"#)
            .unwrap();
        let forged = format!("{}.{}.{}", jwt_header, parts.payload, parts.signature);
        let verifier = key_pair.verifier().unwrap();
        assert_eq!(kind(verifier.verify_token(&forged, &accept_all)), JWTError::InvalidSignature);
    }

    #[test]
    fn header_alg_changed_and_resigned() {
        let verifier = ps256_key_pair().verifier().unwrap();
        let ps256 = PSSAlgorithm::PS256.parameters();
        for alg in &["PS512", "PS384", "ps256", "RS256", "none"] {
            let jwt_header = format!(r#"{{"alg":"{}"}}"#, alg);
            let token = resign(&jwt_header, r#"{"sub":"alice"}"#, &ps256);
            assert_eq!(kind(verifier.verify_token(&token, &accept_all)), JWTError::AlgorithmMismatch);
        }
        let token = resign(r#"{"alg":"PS256"}"#, r#"{"sub":"alice"}"#, &ps256);
        verifier.verify_token(&token, &accept_all).unwrap();
    }

    #[test]
    fn no_algorithm_substitution() {
        // Same RSA key, configured for PS256; the token claims PS384 and is signed accordingly.
        let verifier = ps256_key_pair().verifier().unwrap();
        let ps384 = PSSAlgorithm::PS384.parameters();
        let token = resign(r#"{"alg":"PS384"}"#, r#"{"sub":"alice"}"#, &ps384);
        assert_eq!(kind(verifier.verify_token(&token, &accept_all)), JWTError::InvalidSignature);

        let mut material = ps256_key_pair().public_key_material();
        material.algorithm = PSSAlgorithm::PS384;
        PSSVerifier::new(&material)
            .unwrap()
            .verify_token(&token, &accept_all)
            .unwrap();
    }

    #[test]
    fn other_key() {
        let other = PSSKeyPair::generate(PSSAlgorithm::PS256, 2048).unwrap();
        let token = other.sign(&json!({"sub": "alice"})).unwrap();
        let verifier = ps256_key_pair().verifier().unwrap();
        assert_eq!(kind(verifier.verify_token(&token, &accept_all)), JWTError::InvalidSignature);
    }

    #[test]
    fn signed_part_round_trip() {
        let mut signed = String::new();
        let token = Token::build_from_json(br#"{"alg":"PS256"}"#, br#"{"sub":"alice"}"#, |unsigned| {
            signed = unsigned.to_string();
            pss_sign(
                ps256_key_pair().as_ref(),
                &PSSAlgorithm::PS256.parameters(),
                unsigned.as_bytes(),
            )
        })
        .unwrap();
        let parts = Token::parse(&token).unwrap();
        assert_eq!(parts.unsigned, signed);
        let mut segments = signed.split('.');
        assert_eq!(segments.next(), Some(parts.header));
        assert_eq!(segments.next(), Some(parts.payload));
        assert_eq!(
            Token::decode_payload(parts.payload).unwrap(),
            r#"{"sub":"alice"}"#
        );
    }

    #[test]
    fn key_loading() {
        let mut material = ps256_key_pair().public_key_material();
        material.version = 1;
        let err = PSSVerifier::new(&material).unwrap_err();
        assert_eq!(err.downcast_ref::<JWTError>(), Some(&JWTError::KeyVersionMismatch));

        let mut material = ps256_key_pair().public_key_material();
        material.e = vec![3];
        let err = PSSVerifier::new(&material).unwrap_err();
        assert_eq!(err.downcast_ref::<JWTError>(), Some(&JWTError::InvalidPublicExponent));

        let mut material = ps256_key_pair().public_key_material();
        material.n.truncate(128);
        let err = PSSVerifier::new(&material).unwrap_err();
        assert_eq!(err.downcast_ref::<JWTError>(), Some(&JWTError::ModulusTooSmall));
    }

    #[test]
    fn registered_claims() {
        let key_pair = ps256_key_pair();
        let claims = json!({
            "iss": "auth.example.com",
            "sub": "alice",
            "aud": ["billing", "storage"],
            "iat": 1_000_000,
            "exp": 1_000_600,
        });
        let token = key_pair.sign(&claims).unwrap();
        let verifier = key_pair.verifier().unwrap();
        let validator = JWTValidator::new()
            .with_issuer("auth.example.com")
            .with_audience("storage")
            .with_time_tolerance(Duration::from_secs(0))
            .with_artificial_time(UnixTimeStamp::from_secs(1_000_300));
        let verified = verifier.verify_token(&token, &validator).unwrap();
        assert_eq!(verified.audiences(), Some(vec!["billing", "storage"]));
        assert_eq!(verified.expires_at(), Some(UnixTimeStamp::from_secs(1_000_600)));

        let expired = validator.with_artificial_time(UnixTimeStamp::from_secs(1_000_600));
        assert_eq!(kind(verifier.verify_token(&token, &expired)), JWTError::TokenHasExpired);
    }

    #[test]
    fn validator_errors_are_not_reinterpreted() {
        #[derive(Debug, thiserror::Error)]
        #[error("account locked")]
        struct AccountLocked;

        let key_pair = ps256_key_pair();
        let token = key_pair.sign(&json!({"sub": "mallory"})).unwrap();
        let validator = |claims: RawClaims| -> Result<VerifiedToken, Error> {
            ensure!(claims.subject() != Some("mallory"), AccountLocked);
            Ok(VerifiedToken::new(claims))
        };
        let err = key_pair
            .verifier()
            .unwrap()
            .verify_token(&token, &validator)
            .unwrap_err();
        assert!(err.downcast_ref::<AccountLocked>().is_some());
        assert!(err.downcast_ref::<JWTError>().is_none());
    }

    #[test]
    fn key_id() {
        let key_pair = ps256_key_pair().clone().with_key_id("key-1");
        assert_eq!(key_pair.key_id(), Some("key-1"));
        let token = key_pair.sign(&json!({"sub": "alice"})).unwrap();
        assert_eq!(Token::decode_metadata(&token).unwrap().key_id(), Some("key-1"));

        let options = VerificationOptions {
            required_key_id: Some("key-1".to_string()),
            ..Default::default()
        };
        let verifier = key_pair.verifier().unwrap().with_options(options);
        verifier.verify_token(&token, &accept_all).unwrap();

        let token = ps256_key_pair().sign(&json!({"sub": "alice"})).unwrap();
        assert_eq!(
            kind(verifier.verify_token(&token, &accept_all)),
            JWTError::MissingJWTKeyIdentifier
        );
    }

    #[test]
    fn shared_between_threads() {
        let key_pair = ps256_key_pair();
        let verifier = key_pair.verifier().unwrap();
        let token = key_pair.sign(&json!({"sub": "alice"})).unwrap();
        let tampered = replace_char(&token, token.len() / 2);
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..8 {
                        verifier.verify_token(&token, &accept_all).unwrap();
                        assert!(verifier.verify_token(&tampered, &accept_all).is_err());
                    }
                });
            }
        });
    }
}
