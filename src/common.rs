/// Additional constraints to enforce while verifying a token
#[derive(Clone, Debug, Default)]
pub struct VerificationOptions {
    /// Reject tokens longer than this, before any decoding takes place
    pub max_token_length: Option<usize>,

    /// Maximum length of the base64-encoded header (defaults to `MAX_HEADER_LENGTH`)
    pub max_header_length: Option<usize>,

    /// Require a specific key identifier to be present in the header
    ///
    /// The header is only looked at after the signature has been verified.
    pub required_key_id: Option<String>,
}
