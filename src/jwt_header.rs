use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct JWTHeader {
    #[serde(rename = "alg")]
    pub(crate) algorithm: String,

    #[serde(rename = "typ", default, skip_serializing_if = "Option::is_none")]
    pub(crate) signature_type: Option<String>,

    #[serde(rename = "cty", default, skip_serializing_if = "Option::is_none")]
    pub(crate) content_type: Option<String>,

    #[serde(rename = "kid", default, skip_serializing_if = "Option::is_none")]
    pub(crate) key_id: Option<String>,

    // Set whenever the member is present, even with a `null` value.
    #[serde(
        rename = "crit",
        default,
        deserialize_with = "member_is_present",
        skip_serializing
    )]
    pub(crate) critical: bool,
}

fn member_is_present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    IgnoredAny::deserialize(deserializer)?;
    Ok(true)
}

impl JWTHeader {
    pub(crate) fn new(algorithm: String, key_id: Option<String>) -> Self {
        JWTHeader {
            algorithm,
            key_id,
            ..Default::default()
        }
    }
}

impl Default for JWTHeader {
    fn default() -> Self {
        JWTHeader {
            algorithm: "Not set".to_string(),
            signature_type: Some("JWT".to_string()),
            content_type: None,
            key_id: None,
            critical: false,
        }
    }
}
