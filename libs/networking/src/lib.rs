//! Networking utilities for fleet provisioning.
//!
//! This library provides helpers for:
//! - IPv4 and IPv6 prefixes parsed from CIDR notation
//! - Host-bit arithmetic (masking, reserved addresses, usable host counts)
//! - Bounded address sampling for per-replica IPAM

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use rand::Rng;
use thiserror::Error;
use tracing::debug;

/// Networking errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    /// Invalid IP address.
    #[error("invalid IP address: {0}")]
    InvalidAddress(String),

    /// Invalid CIDR prefix.
    #[error("invalid CIDR prefix: {0}")]
    InvalidPrefix(String),

    /// Unknown allocation strategy name.
    #[error("unknown allocation strategy: {0} (expected 'random' or 'sequential')")]
    InvalidStrategy(String),

    /// No acceptable host address could be found in the prefix.
    #[error("address space of {prefix} exhausted after {attempts} attempts")]
    AddressSpaceExhausted { prefix: String, attempts: u32 },
}

// ============================================================================
// Prefixes
// ============================================================================

/// IP address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    /// Address width in bits.
    pub const fn width(self) -> u8 {
        match self {
            Self::V4 => 32,
            Self::V6 => 128,
        }
    }
}

impl std::fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V4 => write!(f, "IPv4"),
            Self::V6 => write!(f, "IPv6"),
        }
    }
}

/// IPv4 prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Prefix {
    /// Network address of the prefix.
    pub address: Ipv4Addr,

    /// Prefix length (e.g., 24 for /24).
    pub prefix_len: u8,
}

impl Ipv4Prefix {
    /// Create a new prefix, masking host bits out of `address`.
    pub fn new(address: Ipv4Addr, prefix_len: u8) -> Result<Self, NetworkError> {
        if prefix_len > 32 {
            return Err(NetworkError::InvalidPrefix(format!(
                "prefix length {} exceeds 32",
                prefix_len
            )));
        }

        let masked = u32::from(address) & (prefix_mask(prefix_len, 32) as u32);

        Ok(Self {
            address: Ipv4Addr::from(masked),
            prefix_len,
        })
    }

    /// Parse from CIDR notation (e.g., "10.0.0.0/24").
    pub fn from_cidr(s: &str) -> Result<Self, NetworkError> {
        let (addr_str, prefix_len) = split_cidr(s)?;
        let address = Ipv4Addr::from_str(addr_str)
            .map_err(|_| NetworkError::InvalidAddress(addr_str.to_string()))?;
        Self::new(address, prefix_len)
    }

    /// Check if an address is within this prefix.
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let mask = prefix_mask(self.prefix_len, 32) as u32;
        u32::from(addr) & mask == u32::from(self.address)
    }

    /// Number of host bits.
    pub fn host_bits(&self) -> u8 {
        32 - self.prefix_len
    }

    /// Calculate the number of addresses in this prefix.
    pub fn size(&self) -> u64 {
        1u64 << self.host_bits()
    }

    /// The broadcast address (all host bits set).
    pub fn broadcast(&self) -> Ipv4Addr {
        let host = host_mask(self.host_bits()) as u32;
        Ipv4Addr::from(u32::from(self.address) | host)
    }
}

impl std::fmt::Display for Ipv4Prefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

/// IPv6 prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv6Prefix {
    /// Base address of the prefix.
    pub address: Ipv6Addr,

    /// Prefix length (e.g., 64 for /64).
    pub prefix_len: u8,
}

impl Ipv6Prefix {
    /// Create a new prefix.
    pub fn new(address: Ipv6Addr, prefix_len: u8) -> Result<Self, NetworkError> {
        if prefix_len > 128 {
            return Err(NetworkError::InvalidPrefix(format!(
                "prefix length {} exceeds 128",
                prefix_len
            )));
        }

        // Mask the address to the prefix
        let masked = mask_ipv6(address, prefix_len);

        Ok(Self {
            address: masked,
            prefix_len,
        })
    }

    /// Parse from CIDR notation (e.g., "2001:db8::/32").
    pub fn from_cidr(s: &str) -> Result<Self, NetworkError> {
        let (addr_str, prefix_len) = split_cidr(s)?;
        let address = Ipv6Addr::from_str(addr_str)
            .map_err(|_| NetworkError::InvalidAddress(addr_str.to_string()))?;
        Self::new(address, prefix_len)
    }

    /// Check if an address is within this prefix.
    pub fn contains(&self, addr: Ipv6Addr) -> bool {
        let masked = mask_ipv6(addr, self.prefix_len);
        masked == self.address
    }

    /// Number of host bits.
    pub fn host_bits(&self) -> u8 {
        128 - self.prefix_len
    }

    /// Calculate the number of addresses in this prefix.
    ///
    /// Saturates at `u128::MAX` for a /0.
    pub fn size(&self) -> u128 {
        if self.prefix_len == 0 {
            u128::MAX
        } else {
            1u128 << self.host_bits()
        }
    }
}

impl std::fmt::Display for Ipv6Prefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

/// Mask an IPv6 address to a prefix length.
fn mask_ipv6(addr: Ipv6Addr, prefix_len: u8) -> Ipv6Addr {
    let bits = u128::from_be_bytes(addr.octets());
    Ipv6Addr::from((bits & prefix_mask(prefix_len, 128)).to_be_bytes())
}

/// Network mask for `prefix_len` within an address of `width` bits.
fn prefix_mask(prefix_len: u8, width: u8) -> u128 {
    host_mask(width) & !host_mask(width - prefix_len)
}

/// Mask with the low `host_bits` bits set.
fn host_mask(host_bits: u8) -> u128 {
    if host_bits >= 128 {
        u128::MAX
    } else {
        (1u128 << host_bits) - 1
    }
}

fn split_cidr(s: &str) -> Result<(&str, u8), NetworkError> {
    let Some((addr_str, prefix_str)) = s.trim().split_once('/') else {
        return Err(NetworkError::InvalidPrefix(format!(
            "missing '/' in CIDR: {}",
            s
        )));
    };

    let prefix_len = prefix_str
        .parse::<u8>()
        .map_err(|_| NetworkError::InvalidPrefix(prefix_str.to_string()))?;

    Ok((addr_str, prefix_len))
}

/// A prefix of either address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpPrefix {
    V4(Ipv4Prefix),
    V6(Ipv6Prefix),
}

impl IpPrefix {
    /// Parse from CIDR notation, detecting the address family.
    pub fn from_cidr(s: &str) -> Result<Self, NetworkError> {
        let (addr_str, _) = split_cidr(s)?;
        if addr_str.contains(':') {
            Ipv6Prefix::from_cidr(s).map(Self::V6)
        } else {
            Ipv4Prefix::from_cidr(s).map(Self::V4)
        }
    }

    /// Address family of this prefix.
    pub fn family(&self) -> AddressFamily {
        match self {
            Self::V4(_) => AddressFamily::V4,
            Self::V6(_) => AddressFamily::V6,
        }
    }

    /// Prefix length.
    pub fn prefix_len(&self) -> u8 {
        match self {
            Self::V4(p) => p.prefix_len,
            Self::V6(p) => p.prefix_len,
        }
    }

    /// Number of host bits.
    pub fn host_bits(&self) -> u8 {
        self.family().width() - self.prefix_len()
    }

    /// The network address (all host bits zero).
    pub fn network(&self) -> IpAddr {
        match self {
            Self::V4(p) => IpAddr::V4(p.address),
            Self::V6(p) => IpAddr::V6(p.address),
        }
    }

    /// Check if an address is within this prefix.
    ///
    /// Addresses of the other family are never contained.
    pub fn contains(&self, addr: IpAddr) -> bool {
        match (self, addr) {
            (Self::V4(p), IpAddr::V4(a)) => p.contains(a),
            (Self::V6(p), IpAddr::V6(a)) => p.contains(a),
            _ => false,
        }
    }

    /// Whether `addr` must never be handed out to a host.
    ///
    /// The network address is reserved for both families; IPv4 also
    /// reserves the broadcast address.
    pub fn is_reserved(&self, addr: IpAddr) -> bool {
        match (self, addr) {
            (Self::V4(p), IpAddr::V4(a)) => a == p.address || a == p.broadcast(),
            (Self::V6(p), IpAddr::V6(a)) => a == p.address,
            _ => false,
        }
    }

    /// Number of assignable host addresses (saturating).
    pub fn usable_hosts(&self) -> u128 {
        match self {
            Self::V4(p) => u128::from(p.size()).saturating_sub(2),
            Self::V6(p) => p.size().saturating_sub(1),
        }
    }

    /// Draw a full-width random address and overlay the network prefix bits.
    ///
    /// The result is always inside the prefix but may be reserved.
    pub fn random_address<R: Rng + ?Sized>(&self, rng: &mut R) -> IpAddr {
        let random = match self.family() {
            AddressFamily::V4 => u128::from(rng.random::<u32>()),
            AddressFamily::V6 => rng.random::<u128>(),
        };
        self.with_host_bits(random)
    }

    fn network_bits(&self) -> u128 {
        match self {
            Self::V4(p) => u128::from(u32::from(p.address)),
            Self::V6(p) => u128::from_be_bytes(p.address.octets()),
        }
    }

    /// Combine the network bits with the host bits of `bits`.
    fn with_host_bits(&self, bits: u128) -> IpAddr {
        let value = self.network_bits() | (bits & host_mask(self.host_bits()));
        match self.family() {
            AddressFamily::V4 => IpAddr::V4(Ipv4Addr::from(value as u32)),
            AddressFamily::V6 => IpAddr::V6(Ipv6Addr::from(value.to_be_bytes())),
        }
    }
}

impl std::fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V4(p) => p.fmt(f),
            Self::V6(p) => p.fmt(f),
        }
    }
}

impl FromStr for IpPrefix {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_cidr(s)
    }
}

// ============================================================================
// Host sampling
// ============================================================================

/// Host-bit widths up to this value fall back to a full sweep after
/// random sampling gives up.
pub const SWEEP_MAX_HOST_BITS: u8 = 16;

/// Upper bound on host offsets visited by sequential allocation.
pub const SEQUENTIAL_SCAN_LIMIT: u32 = 1 << 16;

/// How candidate host addresses are chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AllocationStrategy {
    /// Random host bits, then a sweep for small prefixes.
    #[default]
    Random,

    /// Lowest free host offset first.
    Sequential,
}

impl FromStr for AllocationStrategy {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random" => Ok(Self::Random),
            "sequential" => Ok(Self::Sequential),
            other => Err(NetworkError::InvalidStrategy(other.to_string())),
        }
    }
}

/// Number of random draws allowed for a prefix with `host_bits` host bits.
pub fn attempt_budget(host_bits: u8) -> u32 {
    4 * (1u32 << host_bits.min(10))
}

/// Pick a host address from `prefix` that `accept` agrees to.
///
/// Reserved addresses are never offered to `accept`. The search is bounded:
/// it fails with [`NetworkError::AddressSpaceExhausted`] instead of looping
/// on a full or degenerate prefix.
pub fn sample_host<R, F>(
    prefix: &IpPrefix,
    strategy: AllocationStrategy,
    rng: &mut R,
    mut accept: F,
) -> Result<IpAddr, NetworkError>
where
    R: Rng + ?Sized,
    F: FnMut(IpAddr) -> bool,
{
    let exhausted = |attempts| NetworkError::AddressSpaceExhausted {
        prefix: prefix.to_string(),
        attempts,
    };

    if prefix.usable_hosts() == 0 {
        return Err(exhausted(0));
    }

    let host_bits = prefix.host_bits();
    let mut attempts = 0u32;

    if strategy == AllocationStrategy::Sequential {
        let limit = if host_bits >= 32 {
            SEQUENTIAL_SCAN_LIMIT
        } else {
            SEQUENTIAL_SCAN_LIMIT.min(1u32 << host_bits)
        };
        for offset in 0..limit {
            let candidate = prefix.with_host_bits(u128::from(offset));
            if prefix.is_reserved(candidate) {
                continue;
            }
            attempts += 1;
            if accept(candidate) {
                return Ok(candidate);
            }
        }
        return Err(exhausted(attempts));
    }

    for _ in 0..attempt_budget(host_bits) {
        let candidate = prefix.random_address(rng);
        if prefix.is_reserved(candidate) {
            continue;
        }
        attempts += 1;
        if accept(candidate) {
            return Ok(candidate);
        }
    }

    if host_bits > SWEEP_MAX_HOST_BITS {
        return Err(exhausted(attempts));
    }

    debug!(%prefix, attempts, "random sampling failed, sweeping prefix");

    let total = 1u32 << host_bits;
    let start = rng.random_range(0..total);
    for i in 0..total {
        let offset = (start + i) % total;
        let candidate = prefix.with_host_bits(u128::from(offset));
        if prefix.is_reserved(candidate) {
            continue;
        }
        attempts += 1;
        if accept(candidate) {
            return Ok(candidate);
        }
    }

    Err(exhausted(attempts))
}
