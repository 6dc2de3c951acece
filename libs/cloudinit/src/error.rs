//! Error types for cloud-config handling.

use thiserror::Error;

/// Errors that can occur when decoding, parsing or rendering cloud-config.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CloudInitError {
    /// The user-data is not valid base64, or does not decode to UTF-8.
    #[error("failed to decode user-data: {0}")]
    Decode(String),

    /// The document does not start with the `#cloud-config` header.
    #[error("user-data is not a cloud-config document (first line: '{first_line}')")]
    NoCloudConfig { first_line: String },

    /// The document is not a parsable YAML mapping.
    #[error("malformed cloud-config data: {0}")]
    MalformedData(String),

    /// The document could not be serialized back to YAML.
    #[error("failed to marshal cloud-config: {0}")]
    Marshal(String),
}

impl CloudInitError {
    /// Returns true if the input could not be decoded.
    pub fn is_decode_error(&self) -> bool {
        matches!(self, CloudInitError::Decode(_))
    }

    /// Returns true if the decoded input is not a usable cloud-config.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            CloudInitError::NoCloudConfig { .. } | CloudInitError::MalformedData(_)
        )
    }
}

impl From<base64::DecodeError> for CloudInitError {
    fn from(err: base64::DecodeError) -> Self {
        CloudInitError::Decode(err.to_string())
    }
}

impl From<std::string::FromUtf8Error> for CloudInitError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        CloudInitError::Decode(err.to_string())
    }
}
