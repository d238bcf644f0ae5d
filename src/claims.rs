use std::collections::HashSet;

use coarsetime::{Clock, Duration, UnixTimeStamp};
use serde_json::{Map, Value};

use crate::error::*;

pub const DEFAULT_TIME_TOLERANCE_SECS: u64 = 900;

/// Largest accepted timestamp (9999-12-31T23:59:59Z)
pub const MAX_TIMESTAMP_SECS: u64 = 253_402_300_799;

const STRING_CLAIMS: [&str; 3] = ["iss", "sub", "jti"];
const TIMESTAMP_CLAIMS: [&str; 3] = ["exp", "nbf", "iat"];

/// The decoded payload of a token whose signature has been verified, but
/// whose claims haven't been validated yet.
///
/// Registered claims are guaranteed to have the expected JSON type.
#[derive(Debug, Clone, PartialEq)]
pub struct RawClaims {
    claims: Map<String, Value>,
}

impl RawClaims {
    pub(crate) fn from_json_payload(payload: &str) -> Result<Self, Error> {
        let claims = match serde_json::from_str::<Value>(payload) {
            Ok(Value::Object(claims)) => claims,
            _ => bail!(JWTError::InvalidPayload),
        };
        for name in STRING_CLAIMS.iter() {
            if let Some(value) = claims.get(*name) {
                ensure!(value.is_string(), JWTError::InvalidPayload);
            }
        }
        for name in TIMESTAMP_CLAIMS.iter() {
            if let Some(value) = claims.get(*name) {
                timestamp_from_json(value)?;
            }
        }
        match claims.get("aud") {
            None | Some(Value::String(_)) => {}
            Some(Value::Array(audiences)) => {
                ensure!(
                    audiences.iter().all(Value::is_string),
                    JWTError::InvalidPayload
                );
            }
            Some(_) => bail!(JWTError::InvalidPayload),
        }
        Ok(RawClaims { claims })
    }

    /// Issuer ("iss")
    pub fn issuer(&self) -> Option<&str> {
        self.string_claim("iss")
    }

    /// Subject ("sub")
    pub fn subject(&self) -> Option<&str> {
        self.string_claim("sub")
    }

    /// JWT identifier ("jti")
    pub fn jwt_id(&self) -> Option<&str> {
        self.string_claim("jti")
    }

    /// Audiences ("aud"), normalized to a list even if the token used a single string
    pub fn audiences(&self) -> Option<Vec<&str>> {
        match self.claims.get("aud")? {
            Value::String(audience) => Some(vec![audience.as_str()]),
            Value::Array(audiences) => Some(audiences.iter().filter_map(Value::as_str).collect()),
            _ => None,
        }
    }

    /// Expiration time ("exp")
    pub fn expires_at(&self) -> Option<UnixTimeStamp> {
        self.timestamp_claim("exp")
    }

    /// Time before which the token must not be accepted ("nbf")
    pub fn not_before(&self) -> Option<UnixTimeStamp> {
        self.timestamp_claim("nbf")
    }

    /// Creation time ("iat")
    pub fn issued_at(&self) -> Option<UnixTimeStamp> {
        self.timestamp_claim("iat")
    }

    /// Any claim, registered or application-defined
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// The whole payload
    pub fn as_json(&self) -> &Map<String, Value> {
        &self.claims
    }

    fn string_claim(&self, name: &str) -> Option<&str> {
        self.claims.get(name).and_then(Value::as_str)
    }

    fn timestamp_claim(&self, name: &str) -> Option<UnixTimeStamp> {
        let secs = self
            .claims
            .get(name)
            .and_then(|value| timestamp_from_json(value).ok())?;
        Some(UnixTimeStamp::from_secs(secs))
    }
}

fn timestamp_from_json(value: &Value) -> Result<u64, Error> {
    let secs = value.as_f64().ok_or(JWTError::InvalidPayload)?;
    ensure!(
        secs.is_finite() && secs >= 0.0 && secs <= MAX_TIMESTAMP_SECS as f64,
        JWTError::InvalidPayload
    );
    Ok(secs as u64)
}

/// A token whose signature and claims have both been verified.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedToken {
    claims: RawClaims,
}

impl VerifiedToken {
    /// Mark a set of claims as validated.
    ///
    /// `RawClaims` values only come out of a successful signature check, so this
    /// is the last step of the pipeline, normally taken by a `ClaimValidator`.
    pub fn new(claims: RawClaims) -> Self {
        VerifiedToken { claims }
    }

    pub fn claims(&self) -> &RawClaims {
        &self.claims
    }

    pub fn into_claims(self) -> RawClaims {
        self.claims
    }

    pub fn issuer(&self) -> Option<&str> {
        self.claims.issuer()
    }

    pub fn subject(&self) -> Option<&str> {
        self.claims.subject()
    }

    pub fn audiences(&self) -> Option<Vec<&str>> {
        self.claims.audiences()
    }

    pub fn expires_at(&self) -> Option<UnixTimeStamp> {
        self.claims.expires_at()
    }
}

/// Application-specific validation of the claims of a token whose signature has been verified.
///
/// Errors returned by a validator are passed to the caller untouched.
pub trait ClaimValidator {
    fn validate(&self, claims: RawClaims) -> Result<VerifiedToken, Error>;
}

impl<F> ClaimValidator for F
where
    F: Fn(RawClaims) -> Result<VerifiedToken, Error>,
{
    fn validate(&self, claims: RawClaims) -> Result<VerifiedToken, Error> {
        self(claims)
    }
}

/// Validation of the registered JWT claims
#[derive(Clone, Debug, Default)]
pub struct JWTValidator {
    expected_issuer: Option<String>,
    expected_subject: Option<String>,
    expected_audience: Option<String>,
    allow_missing_expiration: bool,
    expect_issued_in_the_past: bool,
    time_tolerance: Option<Duration>,
    artificial_time: Option<UnixTimeStamp>,
}

impl JWTValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the issuer to be present and equal to `issuer`
    pub fn with_issuer(mut self, issuer: impl ToString) -> Self {
        self.expected_issuer = Some(issuer.to_string());
        self
    }

    /// Require the subject to be present and equal to `subject`
    pub fn with_subject(mut self, subject: impl ToString) -> Self {
        self.expected_subject = Some(subject.to_string());
        self
    }

    /// Require `audience` to be one of the token audiences
    pub fn with_audience(mut self, audience: impl ToString) -> Self {
        self.expected_audience = Some(audience.to_string());
        self
    }

    /// Accept tokens without an "exp" claim
    pub fn allow_missing_expiration(mut self) -> Self {
        self.allow_missing_expiration = true;
        self
    }

    /// Reject tokens whose "iat" claim is in the future
    pub fn expect_issued_in_the_past(mut self) -> Self {
        self.expect_issued_in_the_past = true;
        self
    }

    /// Tolerance for clock differences between the issuer and the verifier
    pub fn with_time_tolerance(mut self, time_tolerance: Duration) -> Self {
        self.time_tolerance = Some(time_tolerance);
        self
    }

    /// Validate as if the current time was `now`
    pub fn with_artificial_time(mut self, now: UnixTimeStamp) -> Self {
        self.artificial_time = Some(now);
        self
    }

    fn check(&self, claims: &RawClaims) -> Result<(), Error> {
        let now = self
            .artificial_time
            .unwrap_or_else(Clock::now_since_epoch)
            .as_secs();
        let tolerance = self
            .time_tolerance
            .map(|tolerance| tolerance.as_secs())
            .unwrap_or(DEFAULT_TIME_TOLERANCE_SECS);

        match claims.expires_at() {
            Some(expires_at) => ensure!(
                now < expires_at.as_secs().saturating_add(tolerance),
                JWTError::TokenHasExpired
            ),
            None => ensure!(self.allow_missing_expiration, JWTError::MissingExpiration),
        }
        if let Some(not_before) = claims.not_before() {
            ensure!(
                now.saturating_add(tolerance) >= not_before.as_secs(),
                JWTError::TokenNotValidYet
            );
        }
        if self.expect_issued_in_the_past {
            if let Some(issued_at) = claims.issued_at() {
                ensure!(
                    issued_at.as_secs() <= now.saturating_add(tolerance),
                    JWTError::ClockDrift
                );
            }
        }
        if let Some(expected_issuer) = &self.expected_issuer {
            if let Some(issuer) = claims.issuer() {
                ensure!(issuer == expected_issuer.as_str(), JWTError::RequiredIssuerMismatch);
            } else {
                bail!(JWTError::RequiredIssuerMissing);
            }
        }
        if let Some(expected_subject) = &self.expected_subject {
            if let Some(subject) = claims.subject() {
                ensure!(
                    subject == expected_subject.as_str(),
                    JWTError::RequiredSubjectMismatch
                );
            } else {
                bail!(JWTError::RequiredSubjectMissing);
            }
        }
        if let Some(expected_audience) = &self.expected_audience {
            if let Some(audiences) = claims.audiences() {
                let audiences: HashSet<&str> = audiences.into_iter().collect();
                ensure!(
                    audiences.contains(expected_audience.as_str()),
                    JWTError::RequiredAudienceMismatch
                );
            } else {
                bail!(JWTError::RequiredAudienceMissing);
            }
        }
        Ok(())
    }
}

impl ClaimValidator for JWTValidator {
    fn validate(&self, claims: RawClaims) -> Result<VerifiedToken, Error> {
        self.check(&claims)?;
        Ok(VerifiedToken::new(claims))
    }
}
