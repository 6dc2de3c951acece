//! Error types for substitution resolution.

use fleetinit_cloudinit::CloudInitError;
use fleetinit_networking::NetworkError;
use thiserror::Error;

/// Errors that can occur while resolving substitutions for a replica.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubstitutionError {
    /// The replica identifier is empty.
    #[error("replica identifier cannot be empty")]
    EmptyIdentifier,

    /// The substitution declaration itself is invalid.
    #[error("invalid substitution '{key}': {reason}")]
    InvalidSubstitution { key: String, reason: String },

    /// No handler is registered for the substitution type.
    #[error("unknown substitution type: {0}")]
    UnknownSubstitutionType(String),

    /// An address substitution has no `cidr` property.
    #[error("substitution '{key}' is missing the 'cidr' property")]
    MissingCidr { key: String },

    /// The `cidr` property could not be parsed.
    #[error("invalid CIDR '{cidr}': {source}")]
    InvalidCidr {
        cidr: String,
        #[source]
        source: NetworkError,
    },

    /// A handler-specific property has an unusable value.
    #[error("invalid property '{property}' on substitution '{key}': {reason}")]
    InvalidProperty {
        key: String,
        property: String,
        reason: String,
    },

    /// The CIDR belongs to the wrong address family for the handler.
    #[error("{handler} cannot allocate from {cidr}")]
    AddressFamilyMismatch { handler: String, cidr: String },

    /// Every candidate in the CIDR was reserved or already taken.
    #[error("address space of {cidr} exhausted after {attempts} attempts")]
    ExhaustedAddressSpace { cidr: String, attempts: u32 },

    /// The cloud-config document could not be decoded or rendered.
    #[error(transparent)]
    CloudInit(#[from] CloudInitError),
}

impl SubstitutionError {
    /// Returns true if the error stems from user configuration rather than
    /// from the current allocation state.
    ///
    /// Retrying does not help for these; the fleet template must change.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            SubstitutionError::EmptyIdentifier
                | SubstitutionError::InvalidSubstitution { .. }
                | SubstitutionError::UnknownSubstitutionType(_)
                | SubstitutionError::MissingCidr { .. }
                | SubstitutionError::InvalidCidr { .. }
                | SubstitutionError::InvalidProperty { .. }
                | SubstitutionError::AddressFamilyMismatch { .. }
        )
    }

    /// Returns true if the address space ran out.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, SubstitutionError::ExhaustedAddressSpace { .. })
    }
}
