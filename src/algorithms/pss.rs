use std::convert::TryFrom;
use std::fmt;

use boring::bn::BigNum;
use boring::hash::MessageDigest;
use boring::pkey::{PKey, Private, Public};
use boring::rsa::{Padding, Rsa};
use boring::sign::{RsaPssSaltlen, Signer, Verifier};
use ct_codecs::{Base64UrlSafeNoPadding, Encoder};
use hmac_sha256::Hash as SHA256;
use serde::Serialize;
use tracing::debug;

use crate::claims::*;
use crate::common::*;
use crate::error::*;
use crate::jwt_header::*;
use crate::key_material::*;
use crate::token::*;

/// RSA-PSS JWS algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PSSAlgorithm {
    PS256,
    PS384,
    PS512,
}

impl PSSAlgorithm {
    /// The JOSE name of the algorithm ("alg")
    pub fn name(self) -> &'static str {
        match self {
            PSSAlgorithm::PS256 => "PS256",
            PSSAlgorithm::PS384 => "PS384",
            PSSAlgorithm::PS512 => "PS512",
        }
    }

    /// Hash function and salt length (RFC 7518, section 3.5)
    pub fn parameters(self) -> PSSParameters {
        match self {
            PSSAlgorithm::PS256 => PSSParameters {
                hash: HashFunction::SHA256,
                salt_length: 32,
            },
            PSSAlgorithm::PS384 => PSSParameters {
                hash: HashFunction::SHA384,
                salt_length: 48,
            },
            PSSAlgorithm::PS512 => PSSParameters {
                hash: HashFunction::SHA512,
                salt_length: 64,
            },
        }
    }

    /// Look an algorithm up by its exact JOSE name
    pub fn from_name(name: &str) -> Result<Self, Error> {
        match name {
            "PS256" => Ok(PSSAlgorithm::PS256),
            "PS384" => Ok(PSSAlgorithm::PS384),
            "PS512" => Ok(PSSAlgorithm::PS512),
            _ => bail!(JWTError::UnsupportedAlgorithm),
        }
    }
}

/// Numbering used by stored key records. `0` is the unknown algorithm.
impl TryFrom<u32> for PSSAlgorithm {
    type Error = Error;

    fn try_from(id: u32) -> Result<Self, Error> {
        match id {
            1 => Ok(PSSAlgorithm::PS256),
            2 => Ok(PSSAlgorithm::PS384),
            3 => Ok(PSSAlgorithm::PS512),
            _ => bail!(JWTError::UnsupportedAlgorithm),
        }
    }
}

impl fmt::Display for PSSAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashFunction {
    SHA256,
    SHA384,
    SHA512,
}

impl HashFunction {
    /// Digest size, in bytes
    pub fn output_len(self) -> usize {
        match self {
            HashFunction::SHA256 => 32,
            HashFunction::SHA384 => 48,
            HashFunction::SHA512 => 64,
        }
    }

    fn message_digest(self) -> MessageDigest {
        match self {
            HashFunction::SHA256 => MessageDigest::sha256(),
            HashFunction::SHA384 => MessageDigest::sha384(),
            HashFunction::SHA512 => MessageDigest::sha512(),
        }
    }
}

/// Parameters of an RSA-PSS signature. MGF1 always uses the signature hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PSSParameters {
    pub hash: HashFunction,
    pub salt_length: usize,
}

impl PSSParameters {
    /// Parameters for the algorithm named `alg_name`.
    ///
    /// Anything but "PS256", "PS384" and "PS512" is rejected.
    pub fn resolve(alg_name: &str) -> Result<Self, Error> {
        Ok(PSSAlgorithm::from_name(alg_name)?.parameters())
    }
}

fn pss_verify(
    pk: &Rsa<Public>,
    parameters: &PSSParameters,
    message: &[u8],
    signature: &[u8],
) -> Result<(), Error> {
    let digest = parameters.hash.message_digest();
    let salt_length = i32::try_from(parameters.salt_length)?;
    let pkey = PKey::from_rsa(pk.clone())?;
    let mut verifier = Verifier::new(digest, &pkey)?;
    verifier.set_rsa_padding(Padding::PKCS1_PSS)?;
    verifier.set_rsa_mgf1_md(digest)?;
    verifier.set_rsa_pss_saltlen(RsaPssSaltlen::custom(salt_length))?;
    verifier.update(message)?;
    if !(verifier
        .verify(signature)
        .map_err(|_| JWTError::InvalidSignature)?)
    {
        bail!(JWTError::InvalidSignature);
    }
    Ok(())
}

pub(crate) fn pss_sign(
    sk: &Rsa<Private>,
    parameters: &PSSParameters,
    message: &[u8],
) -> Result<Vec<u8>, Error> {
    let digest = parameters.hash.message_digest();
    let salt_length = i32::try_from(parameters.salt_length)?;
    let pkey = PKey::from_rsa(sk.clone())?;
    let mut signer = Signer::new(digest, &pkey)?;
    signer.set_rsa_padding(Padding::PKCS1_PSS)?;
    signer.set_rsa_mgf1_md(digest)?;
    signer.set_rsa_pss_saltlen(RsaPssSaltlen::custom(salt_length))?;
    signer.update(message)?;
    Ok(signer.sign_to_vec()?)
}

/// An RSA public key, ready to verify signatures.
///
/// It is never modified after having been built, and can be shared between threads.
#[derive(Debug, Clone)]
pub struct PSSPublicKey(Rsa<Public>);

impl AsRef<Rsa<Public>> for PSSPublicKey {
    fn as_ref(&self) -> &Rsa<Public> {
        &self.0
    }
}

pub struct RSAPublicKeyComponents {
    pub n: Vec<u8>,
    pub e: Vec<u8>,
}

impl PSSPublicKey {
    /// Build a key from validated key material.
    ///
    /// Size and exponent policies are not checked again here: call
    /// `PublicKeyMaterial::validate()` first, or use `PSSVerifier::new()`.
    pub fn build(material: &PublicKeyMaterial) -> Result<Self, Error> {
        Self::from_components(&material.n, &material.e)
    }

    pub fn from_components(n: &[u8], e: &[u8]) -> Result<Self, Error> {
        ensure!(
            !n.is_empty() && !e.is_empty(),
            JWTError::MalformedKeyMaterial
        );
        let n = BigNum::from_slice(n).map_err(|_| JWTError::MalformedKeyMaterial)?;
        let e = BigNum::from_slice(e).map_err(|_| JWTError::MalformedKeyMaterial)?;
        ensure!(
            n.num_bits() > 0 && e.num_bits() > 0,
            JWTError::MalformedKeyMaterial
        );
        let rsa_pk = Rsa::<Public>::from_public_components(n, e)
            .map_err(|_| JWTError::MalformedKeyMaterial)?;
        Ok(PSSPublicKey(rsa_pk))
    }

    pub fn to_components(&self) -> RSAPublicKeyComponents {
        let n = self.0.n().to_vec();
        let e = self.0.e().to_vec();
        RSAPublicKeyComponents { n, e }
    }

    pub fn modulus_bits(&self) -> usize {
        self.0.n().num_bits() as usize
    }

    pub fn to_der(&self) -> Result<Vec<u8>, Error> {
        self.0.public_key_to_der().map_err(Into::into)
    }

    /// URL-safe base64 encoding of the SHA-256 hash of the DER-encoded key
    pub fn sha256_thumbprint(&self) -> Result<String, Error> {
        Ok(Base64UrlSafeNoPadding::encode_to_string(SHA256::hash(
            &self.to_der()?,
        ))?)
    }

    /// A stable key identifier, suitable for the "kid" header
    pub fn create_key_id(&self) -> Result<String, Error> {
        let thumbprint = self.sha256_thumbprint()?;
        Ok(thumbprint[..16].to_string())
    }
}

/// Verifies tokens signed with a single RSA-PSS key.
///
/// The hash function, salt length and expected "alg" header are all bound to
/// the key when the verifier is created; nothing in a token can change them.
#[derive(Debug, Clone)]
pub struct PSSVerifier {
    pk: PSSPublicKey,
    algorithm: PSSAlgorithm,
    parameters: PSSParameters,
    options: VerificationOptions,
}

impl PSSVerifier {
    /// Validate key material, and turn it into a verifier
    pub fn new(material: &PublicKeyMaterial) -> Result<Self, Error> {
        material.validate(SUPPORTED_KEY_VERSION)?;
        let pk = PSSPublicKey::build(material)?;
        debug!(
            algorithm = material.algorithm.name(),
            modulus_bits = pk.modulus_bits(),
            "loaded RSA-PSS public key"
        );
        Ok(PSSVerifier {
            pk,
            algorithm: material.algorithm,
            parameters: material.algorithm.parameters(),
            options: VerificationOptions::default(),
        })
    }

    pub fn with_options(mut self, options: VerificationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn algorithm(&self) -> PSSAlgorithm {
        self.algorithm
    }

    pub fn parameters(&self) -> &PSSParameters {
        &self.parameters
    }

    pub fn public_key(&self) -> &PSSPublicKey {
        &self.pk
    }

    /// Verify the signature of a token, and validate its claims
    pub fn verify_token<V>(&self, token: &str, validator: &V) -> Result<VerifiedToken, Error>
    where
        V: ClaimValidator + ?Sized,
    {
        let res = Token::verify(
            self.algorithm.name(),
            token,
            &self.options,
            validator,
            |unsigned, signature| {
                pss_verify(
                    self.pk.as_ref(),
                    &self.parameters,
                    unsigned.as_bytes(),
                    signature,
                )
            },
        );
        if let Err(err) = &res {
            debug!(algorithm = self.algorithm.name(), error = %err, "rejected token");
        }
        res
    }
}

/// An RSA-PSS key pair, to sign tokens
#[derive(Debug, Clone)]
pub struct PSSKeyPair {
    rsa_sk: Rsa<Private>,
    algorithm: PSSAlgorithm,
    key_id: Option<String>,
}

impl AsRef<Rsa<Private>> for PSSKeyPair {
    fn as_ref(&self) -> &Rsa<Private> {
        &self.rsa_sk
    }
}

impl PSSKeyPair {
    /// Generate a new key pair with a 2048, 3072 or 4096 bit modulus and the public exponent 65537
    pub fn generate(algorithm: PSSAlgorithm, modulus_bits: usize) -> Result<Self, Error> {
        match modulus_bits {
            2048 | 3072 | 4096 => {}
            _ => bail!(JWTError::UnsupportedRSAModulus),
        };
        let rsa_sk = Rsa::<Private>::generate(modulus_bits as _)?;
        let key_pair = PSSKeyPair {
            rsa_sk,
            algorithm,
            key_id: None,
        };
        key_pair.self_test()?;
        Ok(key_pair)
    }

    fn self_test(&self) -> Result<(), Error> {
        let parameters = self.algorithm.parameters();
        let message = b"RSA-PSS key pair self test";
        let signature = pss_sign(&self.rsa_sk, &parameters, message)?;
        pss_verify(self.public_key()?.as_ref(), &parameters, message, &signature).map_err(
            |_| {
                JWTError::InternalError(
                    "signing with the private key followed by verifying with the public key failed"
                        .to_string(),
                )
            },
        )?;
        Ok(())
    }

    pub fn with_key_id(mut self, key_id: &str) -> Self {
        self.key_id = Some(key_id.to_string());
        self
    }

    pub fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    pub fn algorithm(&self) -> PSSAlgorithm {
        self.algorithm
    }

    pub fn public_key(&self) -> Result<PSSPublicKey, Error> {
        let rsa_pk = Rsa::<Public>::from_public_components(
            self.rsa_sk.n().to_owned()?,
            self.rsa_sk.e().to_owned()?,
        )?;
        Ok(PSSPublicKey(rsa_pk))
    }

    /// The public half, as key material in the current format version
    pub fn public_key_material(&self) -> PublicKeyMaterial {
        PublicKeyMaterial::new(
            self.algorithm,
            self.rsa_sk.n().to_vec(),
            self.rsa_sk.e().to_vec(),
        )
    }

    /// A verifier for tokens signed with this key pair
    pub fn verifier(&self) -> Result<PSSVerifier, Error> {
        PSSVerifier::new(&self.public_key_material())
    }

    /// Serialize `payload` as the claims of a new token, and sign it
    pub fn sign<Payload: Serialize + ?Sized>(&self, payload: &Payload) -> Result<String, Error> {
        let jwt_header = JWTHeader::new(self.algorithm.name().to_string(), self.key_id.clone());
        let parameters = self.algorithm.parameters();
        Token::build(&jwt_header, payload, |unsigned| {
            pss_sign(&self.rsa_sk, &parameters, unsigned.as_bytes())
        })
    }
}
