//! Substitution handlers.
//!
//! A handler turns one [`Substitution`] into a value for one replica and
//! records it in the [`GlobalState`]. The built-in handlers allocate
//! addresses from a CIDR block:
//!
//! - `ipv4Address`: network and broadcast addresses are never assigned
//! - `ipv6Address`: the network (subnet-router anycast) address is never assigned
//!
//! Both honour `unique` by checking every value already recorded for the
//! same key across the fleet, and both return a previously recorded value
//! for the replica instead of generating a new one.

use fleetinit_networking::{
    sample_host, AddressFamily, AllocationStrategy, IpPrefix, NetworkError,
};
use tracing::debug;

use crate::types::{CIDR_PROPERTY, STRATEGY_PROPERTY};
use crate::{GlobalState, Identifier, Substitution, SubstitutionError};

/// Type name of the IPv4 address handler.
pub const IPV4_ADDRESS: &str = "ipv4Address";

/// Type name of the IPv6 address handler.
pub const IPV6_ADDRESS: &str = "ipv6Address";

/// Produces and records values for one substitution type.
pub trait SubstitutionHandler: Send + Sync {
    /// Name substitutions use to select this handler.
    fn type_name(&self) -> &str;

    /// Reject a declaration this handler could never resolve.
    ///
    /// Called for every pending substitution before any value is generated.
    fn check(&self, _substitution: &Substitution) -> Result<(), SubstitutionError> {
        Ok(())
    }

    /// Produce a value for `identifier`, record it in `state` and return it.
    fn write_state(
        &self,
        identifier: &Identifier,
        state: &GlobalState,
        substitution: &Substitution,
    ) -> Result<String, SubstitutionError>;
}

/// Allocates host addresses of one family from the `cidr` property.
///
/// The optional `strategy` property selects `random` (default) or
/// `sequential` allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressHandler {
    family: AddressFamily,
}

impl AddressHandler {
    /// Handler registered as `ipv4Address`.
    pub const fn ipv4() -> Self {
        Self {
            family: AddressFamily::V4,
        }
    }

    /// Handler registered as `ipv6Address`.
    pub const fn ipv6() -> Self {
        Self {
            family: AddressFamily::V6,
        }
    }

    /// Address family this handler allocates.
    pub fn family(&self) -> AddressFamily {
        self.family
    }

    fn parse_prefix(&self, substitution: &Substitution) -> Result<IpPrefix, SubstitutionError> {
        let cidr = substitution
            .property(CIDR_PROPERTY)
            .ok_or_else(|| SubstitutionError::MissingCidr {
                key: substitution.key.clone(),
            })?;

        let prefix = IpPrefix::from_cidr(cidr).map_err(|source| SubstitutionError::InvalidCidr {
            cidr: cidr.to_string(),
            source,
        })?;

        if prefix.family() != self.family {
            return Err(SubstitutionError::AddressFamilyMismatch {
                handler: self.type_name().to_string(),
                cidr: cidr.to_string(),
            });
        }

        Ok(prefix)
    }

    fn strategy(&self, substitution: &Substitution) -> Result<AllocationStrategy, SubstitutionError> {
        let Some(raw) = substitution.property(STRATEGY_PROPERTY) else {
            return Ok(AllocationStrategy::default());
        };

        raw.parse()
            .map_err(|err: NetworkError| SubstitutionError::InvalidProperty {
                key: substitution.key.clone(),
                property: STRATEGY_PROPERTY.to_string(),
                reason: err.to_string(),
            })
    }
}

impl SubstitutionHandler for AddressHandler {
    fn type_name(&self) -> &str {
        match self.family {
            AddressFamily::V4 => IPV4_ADDRESS,
            AddressFamily::V6 => IPV6_ADDRESS,
        }
    }

    fn check(&self, substitution: &Substitution) -> Result<(), SubstitutionError> {
        self.parse_prefix(substitution)?;
        self.strategy(substitution)?;
        Ok(())
    }

    fn write_state(
        &self,
        identifier: &Identifier,
        state: &GlobalState,
        substitution: &Substitution,
    ) -> Result<String, SubstitutionError> {
        if let Some(existing) = state.get(identifier, &substitution.key) {
            return Ok(existing);
        }

        let prefix = self.parse_prefix(substitution)?;
        let strategy = self.strategy(substitution)?;

        let mut rng = rand::rng();
        let address = sample_host(&prefix, strategy, &mut rng, |candidate| {
            state.claim(
                identifier,
                &substitution.key,
                &candidate.to_string(),
                substitution.unique,
            )
        })
        .map_err(|err| match err {
            NetworkError::AddressSpaceExhausted { attempts, .. } => {
                SubstitutionError::ExhaustedAddressSpace {
                    cidr: prefix.to_string(),
                    attempts,
                }
            }
            source => SubstitutionError::InvalidCidr {
                cidr: prefix.to_string(),
                source,
            },
        })?;

        debug!(
            %identifier,
            key = %substitution.key,
            %address,
            %prefix,
            unique = substitution.unique,
            "allocated address"
        );

        Ok(address.to_string())
    }
}
