//! # fleetinit-substitution
//!
//! Per-replica value allocation for templated cloud-init content.
//!
//! A fleet template declares [`Substitution`]s such as "a unique IPv4 address
//! from 10.0.0.0/24 at `$ipv4Address`". For each replica the
//! [`SubstitutionManager`] resolves every declaration through the
//! [`Registry`] and writes the values into the replica's cloud-config.
//!
//! ## Invariants
//!
//! - A `unique` value never repeats across identifiers for the same key
//! - Re-resolving `(identifier, key)` returns the recorded value
//! - Generated addresses lie inside the CIDR and are never the network
//!   address (nor, for IPv4, the broadcast address)
//! - Address sampling is bounded and fails with
//!   [`SubstitutionError::ExhaustedAddressSpace`] instead of looping
//!
//! ## Lifetime of allocations
//!
//! [`GlobalState`] lives for one fleet-reconcile pass and is shared by all
//! replicas in it. Callers that need allocations to survive restarts store a
//! [`StateSnapshot`] (e.g. in the managed resource's status) and restore it
//! with [`GlobalState::from_snapshot`] before the next pass.

mod error;
mod handler;
mod manager;
mod registry;
mod state;
mod template;
mod types;

pub use error::SubstitutionError;
pub use handler::{AddressHandler, SubstitutionHandler, IPV4_ADDRESS, IPV6_ADDRESS};
pub use manager::SubstitutionManager;
pub use registry::Registry;
pub use state::{GlobalState, StateSnapshot};
pub use template::replace_tokens;
pub use types::{Identifier, State, Substitution, CIDR_PROPERTY, STRATEGY_PROPERTY};
